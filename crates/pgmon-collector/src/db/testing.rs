use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use futures::{StreamExt, stream};
use pgmon_common::error::{PgmonError, Result};

use super::{Database, RowStream, row::Row, row::SqlValue};

/// Scripted stream item.
#[derive(Debug, Clone)]
pub enum Step {
    Row(Vec<SqlValue>),
    Fail(String),
    Stall,
}

/// In-memory [`Database`] double.
///
/// Expects exactly the registered query text, then replays the scripted
/// steps. `Stall` never resolves, which lets tests exercise context
/// cancellation mid-stream.
pub struct MockDatabase {
    expected_sql: String,
    columns: Vec<String>,
    steps: Vec<Step>,
    query_error: Option<String>,
    queried: AtomicBool,
    released: Arc<AtomicBool>,
}

impl MockDatabase {
    pub fn new(expected_sql: &str, columns: &[&str]) -> Self {
        Self {
            expected_sql: expected_sql.to_string(),
            columns: columns.iter().map(|column| (*column).to_string()).collect(),
            steps: Vec::new(),
            query_error: None,
            queried: AtomicBool::new(false),
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn add_values(mut self, values: Vec<SqlValue>) -> Self {
        self.steps.push(Step::Row(values));
        self
    }

    pub fn fail_rows_with(mut self, message: &str) -> Self {
        self.steps.push(Step::Fail(message.to_string()));
        self
    }

    pub fn stall(mut self) -> Self {
        self.steps.push(Step::Stall);
        self
    }

    pub fn fail_query_with(mut self, message: &str) -> Self {
        self.query_error = Some(message.to_string());
        self
    }

    pub fn was_queried(&self) -> bool {
        self.queried.load(Ordering::SeqCst)
    }

    /// True once the row stream handed out by `query` has been dropped.
    pub fn rows_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

struct ReleaseGuard(Arc<AtomicBool>);

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Database for MockDatabase {
    async fn query<'a>(&'a self, sql: &'static str) -> Result<RowStream<'a>> {
        self.queried.store(true, Ordering::SeqCst);
        if sql != self.expected_sql {
            return Err(PgmonError::Query(format!("unexpected query: {sql}")));
        }
        if let Some(message) = &self.query_error {
            return Err(PgmonError::Query(message.clone()));
        }

        let guard = ReleaseGuard(Arc::clone(&self.released));
        let columns = self.columns.clone();
        let rows = stream::iter(self.steps.clone()).then(move |step| {
            let columns = columns.clone();
            async move {
                match step {
                    Step::Row(values) => Ok(Row::new(columns, values)),
                    Step::Fail(message) => Err(PgmonError::Query(message)),
                    Step::Stall => std::future::pending().await,
                }
            }
        });

        // the guard lives as long as the stream
        let rows = rows.map(move |item| {
            let _release = &guard;
            item
        });

        Ok(rows.boxed())
    }
}
