use thiserror::Error;

#[derive(Debug, Error)]
pub enum PgmonError {
    #[error("query failed: {0}")]
    Query(String),
    #[error("failed to scan column {column}: {reason}")]
    Scan { column: String, reason: String },
    #[error("query context cancelled")]
    Cancelled,
    #[error("query context deadline exceeded")]
    DeadlineExceeded,
    #[error("metric sink closed")]
    SinkClosed,
    #[error("inconsistent label cardinality for {metric}: expected {expected}, got {actual}")]
    InconsistentCardinality {
        metric: String,
        expected: usize,
        actual: usize,
    },
    #[error("collector already registered: {0}")]
    CollectorAlreadyRegistered(String),
    #[error("unknown collector: {0}")]
    UnknownCollector(String),
    #[error("missing configuration: {0}")]
    MissingConfig(String),
    #[error("all {0} enabled collectors failed")]
    AllCollectorsFailed(usize),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PgmonError {
    pub fn scan(column: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Scan {
            column: column.into(),
            reason: reason.into(),
        }
    }

    /// Errors that end the query context rather than the query itself.
    pub fn is_context_error(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }
}

pub type Result<T> = std::result::Result<T, PgmonError>;
