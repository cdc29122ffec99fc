use std::sync::Arc;

use pgmon_common::error::{PgmonError, Result};

/// Namespace shared by every metric this exporter publishes.
pub const NAMESPACE: &str = "pg";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Counter,
    Gauge,
}

impl ValueType {
    pub fn as_prometheus_type(&self) -> &'static str {
        match self {
            Self::Counter => "counter",
            Self::Gauge => "gauge",
        }
    }
}

/// Immutable declaration of one metric family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Desc {
    pub fq_name: String,
    pub help: String,
    pub variable_labels: Vec<String>,
}

impl Desc {
    pub fn new(
        fq_name: impl Into<String>,
        help: impl Into<String>,
        variable_labels: &[&str],
    ) -> Self {
        Self {
            fq_name: fq_name.into(),
            help: help.into(),
            variable_labels: variable_labels.iter().map(|label| (*label).to_string()).collect(),
        }
    }
}

/// Joins the non-empty parts with `_`, e.g. `pg_class_relpages`.
pub fn build_fq_name(namespace: &str, subsystem: &str, name: &str) -> String {
    [namespace, subsystem, name]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("_")
}

/// One emitted value of a metric family.
#[derive(Debug, Clone)]
pub struct Sample {
    desc: Arc<Desc>,
    value_type: ValueType,
    value: f64,
    label_values: Vec<String>,
}

impl Sample {
    /// Builds a constant sample, rejecting label values that do not line up
    /// with the descriptor's label names.
    pub fn new_const(
        desc: &Arc<Desc>,
        value_type: ValueType,
        value: f64,
        label_values: Vec<String>,
    ) -> Result<Self> {
        if label_values.len() != desc.variable_labels.len() {
            return Err(PgmonError::InconsistentCardinality {
                metric: desc.fq_name.clone(),
                expected: desc.variable_labels.len(),
                actual: label_values.len(),
            });
        }

        Ok(Self {
            desc: Arc::clone(desc),
            value_type,
            value,
            label_values,
        })
    }

    pub fn desc(&self) -> &Desc {
        &self.desc
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Label name/value pairs in declaration order.
    pub fn labels(&self) -> Vec<(String, String)> {
        self.desc
            .variable_labels
            .iter()
            .zip(self.label_values.iter())
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    pub fn label(&self, name: &str) -> Option<&str> {
        self.desc
            .variable_labels
            .iter()
            .position(|label| label == name)
            .map(|index| self.label_values[index].as_str())
    }
}
