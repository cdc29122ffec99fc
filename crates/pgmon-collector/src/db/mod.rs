//! Database access seam used by collectors.
//!
//! Collectors see the database only through [`Database`]: one query in, a
//! stream of nullable-typed [`Row`]s out. [`PgDatabase`] is the production
//! implementation backed by a `sqlx` PostgreSQL pool.

mod context;
mod postgres;
mod row;
#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;
use futures::stream::BoxStream;
use pgmon_common::error::Result;

pub use context::{CancelHandle, QueryContext};
pub use postgres::PgDatabase;
pub use row::{Row, SqlValue};

/// Rows of one query. Dropping the stream releases the underlying connection.
pub type RowStream<'a> = BoxStream<'a, Result<Row>>;

#[async_trait]
pub trait Database: Send + Sync {
    async fn query<'a>(&'a self, sql: &'static str) -> Result<RowStream<'a>>;
}
