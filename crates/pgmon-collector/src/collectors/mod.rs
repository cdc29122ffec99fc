//! Built-in collector kinds.

pub mod class;

use pgmon_common::error::Result;

use crate::collector::CollectorRegistry;

pub use class::PgClassCollector;

/// Registers every built-in collector kind exactly once.
pub fn register_builtin(registry: &mut CollectorRegistry) -> Result<()> {
    class::register(registry)?;
    Ok(())
}
