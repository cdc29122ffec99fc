use pgmon_common::error::{PgmonError, Result};

/// One nullable cell as decoded from the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Text(String),
    Int2(i16),
    Int4(i32),
    Int8(i64),
    Float4(f32),
    Float8(f64),
}

impl SqlValue {
    fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Text(_) => "text",
            Self::Int2(_) => "int2",
            Self::Int4(_) => "int4",
            Self::Int8(_) => "int8",
            Self::Float4(_) => "float4",
            Self::Float8(_) => "float8",
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i16> for SqlValue {
    fn from(value: i16) -> Self {
        Self::Int2(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        Self::Int4(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Int8(value)
    }
}

impl From<f32> for SqlValue {
    fn from(value: f32) -> Self {
        Self::Float4(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        Self::Float8(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// A single result row with its column names.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<SqlValue>,
}

impl Row {
    pub fn new(columns: Vec<String>, values: Vec<SqlValue>) -> Self {
        Self { columns, values }
    }

    pub fn column_name(&self, index: usize) -> Option<&str> {
        self.columns.get(index).map(String::as_str)
    }

    /// Reads a nullable text cell. Any other non-null type is a scan error.
    pub fn get_opt_str(&self, index: usize) -> Result<Option<&str>> {
        match self.cell(index)? {
            SqlValue::Null => Ok(None),
            SqlValue::Text(value) => Ok(Some(value.as_str())),
            other => Err(self.mismatch(index, "text", other)),
        }
    }

    /// Reads a nullable numeric cell of any width, widened to `f64`.
    pub fn get_opt_f64(&self, index: usize) -> Result<Option<f64>> {
        match self.cell(index)? {
            SqlValue::Null => Ok(None),
            SqlValue::Int2(value) => Ok(Some(f64::from(*value))),
            SqlValue::Int4(value) => Ok(Some(f64::from(*value))),
            SqlValue::Int8(value) => Ok(Some(*value as f64)),
            SqlValue::Float4(value) => Ok(Some(f64::from(*value))),
            SqlValue::Float8(value) => Ok(Some(*value)),
            other => Err(self.mismatch(index, "numeric", other)),
        }
    }

    fn cell(&self, index: usize) -> Result<&SqlValue> {
        self.values.get(index).ok_or_else(|| {
            PgmonError::scan(
                format!("#{index}"),
                format!("row has only {} columns", self.values.len()),
            )
        })
    }

    fn mismatch(&self, index: usize, expected: &str, actual: &SqlValue) -> PgmonError {
        let column = self
            .column_name(index)
            .map_or_else(|| format!("#{index}"), str::to_string);
        PgmonError::scan(column, format!("expected {expected}, got {}", actual.kind()))
    }
}
