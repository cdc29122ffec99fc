use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use pgmon_common::error::{PgmonError, Result};
use sqlx::{
    Column, Row as _, TypeInfo,
    postgres::{PgPool, PgPoolOptions, PgRow, types::Oid},
};
use tracing::debug;

use super::{Database, RowStream, row::Row, row::SqlValue};

const DEFAULT_MAX_CONNECTIONS: u32 = 1;
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// PostgreSQL handle backed by a `sqlx` pool.
#[derive(Clone)]
pub struct PgDatabase {
    pool: PgPool,
}

impl std::fmt::Debug for PgDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgDatabase").finish_non_exhaustive()
    }
}

impl PgDatabase {
    /// Opens a small pool for a single exporter target.
    pub async fn connect(dsn: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(DEFAULT_MAX_CONNECTIONS)
            .acquire_timeout(DEFAULT_ACQUIRE_TIMEOUT)
            .connect(dsn)
            .await
            .map_err(|err| PgmonError::Query(format!("connect: {err}")))?;

        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn query<'a>(&'a self, sql: &'static str) -> Result<RowStream<'a>> {
        debug!(sql, "running collector query");
        let rows = sqlx::query(sql)
            .fetch(&self.pool)
            .map_err(|err| PgmonError::Query(err.to_string()))
            .and_then(|row| futures::future::ready(decode_row(&row)));

        Ok(rows.boxed())
    }
}

fn decode_row(row: &PgRow) -> Result<Row> {
    let mut columns = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());

    for (index, column) in row.columns().iter().enumerate() {
        let type_name = column.type_info().name();
        let value = decode_cell(row, index, type_name)
            .map_err(|err| PgmonError::scan(column.name(), err.to_string()))?;
        columns.push(column.name().to_string());
        values.push(value);
    }

    Ok(Row::new(columns, values))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Text,
    /// The single-byte internal `"char"` type.
    Char,
    Int2,
    Int4,
    Int8,
    Oid,
    Float4,
    Float8,
}

/// Maps a `sqlx` type name to the decoder for it. `sqlx` reports `bpchar`
/// as `CHAR` and the internal `"char"` type as `"CHAR"` (quoted).
fn cell_kind(type_name: &str) -> Option<CellKind> {
    let kind = match type_name {
        "TEXT" | "NAME" | "VARCHAR" | "CHAR" => CellKind::Text,
        "\"CHAR\"" => CellKind::Char,
        "INT2" => CellKind::Int2,
        "INT4" => CellKind::Int4,
        "INT8" => CellKind::Int8,
        "OID" => CellKind::Oid,
        "FLOAT4" => CellKind::Float4,
        "FLOAT8" => CellKind::Float8,
        _ => return None,
    };
    Some(kind)
}

fn decode_cell(
    row: &PgRow,
    index: usize,
    type_name: &str,
) -> std::result::Result<SqlValue, sqlx::Error> {
    let Some(kind) = cell_kind(type_name) else {
        return Err(sqlx::Error::Decode(
            format!("unsupported column type {type_name}").into(),
        ));
    };

    let value = match kind {
        CellKind::Text => SqlValue::from(row.try_get::<Option<String>, _>(index)?),
        CellKind::Char => SqlValue::from(
            row.try_get::<Option<i8>, _>(index)?
                .map(|byte| char::from(byte as u8).to_string()),
        ),
        CellKind::Int2 => SqlValue::from(row.try_get::<Option<i16>, _>(index)?),
        CellKind::Int4 => SqlValue::from(row.try_get::<Option<i32>, _>(index)?),
        CellKind::Int8 => SqlValue::from(row.try_get::<Option<i64>, _>(index)?),
        CellKind::Oid => row
            .try_get::<Option<Oid>, _>(index)?
            .map_or(SqlValue::Null, |oid| SqlValue::Int8(i64::from(oid.0))),
        CellKind::Float4 => SqlValue::from(row.try_get::<Option<f32>, _>(index)?),
        CellKind::Float8 => SqlValue::from(row.try_get::<Option<f64>, _>(index)?),
    };

    Ok(value)
}

#[cfg(test)]
mod tests {
    use futures::TryStreamExt;
    use pgmon_common::PgmonError;

    use super::{CellKind, PgDatabase, cell_kind};
    use crate::db::Database;

    #[test]
    fn type_names_map_to_decoders() {
        assert_eq!(cell_kind("NAME"), Some(CellKind::Text));
        assert_eq!(cell_kind("TEXT"), Some(CellKind::Text));
        assert_eq!(cell_kind("VARCHAR"), Some(CellKind::Text));
        assert_eq!(cell_kind("CHAR"), Some(CellKind::Text));
        assert_eq!(cell_kind("\"CHAR\""), Some(CellKind::Char));
        assert_eq!(cell_kind("INT2"), Some(CellKind::Int2));
        assert_eq!(cell_kind("INT8"), Some(CellKind::Int8));
        assert_eq!(cell_kind("OID"), Some(CellKind::Oid));
        assert_eq!(cell_kind("FLOAT4"), Some(CellKind::Float4));
        assert_eq!(cell_kind("BOOL"), None);
        assert_eq!(cell_kind("XID"), None);
    }

    const TYPED_QUERY: &str = "SELECT
    'pg_class'::name AS relname,
    'x'::\"char\" AS relkind,
    'ab'::char(2) AS padded,
    17::int2 AS relnatts,
    100.5::float4 AS reltuples,
    NULL::int4 AS relpages";

    const BOOL_QUERY: &str = "SELECT true AS flag";

    // Runs only when PGMON_DATA_SOURCE_NAME points at a live server.
    #[tokio::test]
    async fn decodes_catalog_types_from_live_server() {
        let Ok(dsn) = std::env::var("PGMON_DATA_SOURCE_NAME") else {
            return;
        };
        let db = PgDatabase::connect(&dsn).await.unwrap();

        let result: Result<Vec<_>, _> = db.query(BOOL_QUERY).await.unwrap().try_collect().await;
        match result {
            Err(PgmonError::Scan { column, reason }) => {
                assert_eq!(column, "flag");
                assert!(reason.contains("unsupported column type BOOL"), "{reason}");
            }
            other => panic!("unexpected result: {other:?}"),
        }

        let rows: Vec<_> = db.query(TYPED_QUERY).await.unwrap().try_collect().await.unwrap();
        db.close().await;

        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.get_opt_str(0).unwrap(), Some("pg_class"));
        assert_eq!(row.get_opt_str(1).unwrap(), Some("x"));
        assert_eq!(row.get_opt_str(2).unwrap(), Some("ab"));
        assert_eq!(row.get_opt_f64(3).unwrap(), Some(17.0));
        assert_eq!(row.get_opt_f64(4).unwrap(), Some(100.5));
        assert_eq!(row.get_opt_f64(5).unwrap(), None);
        assert_eq!(row.column_name(5), Some("relpages"));
    }
}
