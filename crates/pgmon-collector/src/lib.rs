//! PostgreSQL metric collectors.
//!
//! A [`Collector`] runs one fixed diagnostic query through a [`Database`]
//! handle and turns every result row into constant [`Sample`]s sent down a
//! [`MetricSink`]. Collector kinds are listed in a [`CollectorRegistry`]
//! filled at startup by [`collectors::register_builtin`].

pub mod collector;
pub mod collectors;
pub mod db;
pub mod metrics;

pub use collector::{Collector, CollectorConfig, CollectorRegistry, CollectorState, MetricSink};
pub use collectors::register_builtin;
pub use db::{Database, PgDatabase, QueryContext, Row, SqlValue};
pub use metrics::{Desc, Sample, ValueType, render_prometheus};
