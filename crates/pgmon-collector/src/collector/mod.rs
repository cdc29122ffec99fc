//! Collector contract.
//!
//! A collector owns one fixed query and maps its rows into metric samples.
//! The exporter creates one instance per collector kind through the
//! [`CollectorRegistry`] and calls [`Collector::update`] for every scrape.

mod registry;

use async_trait::async_trait;
use pgmon_common::error::Result;
use tokio::sync::mpsc;
use tracing::Span;

use crate::{db::Database, db::QueryContext, metrics::Sample};

pub use registry::{CollectorFactory, CollectorRegistry, CollectorState};

/// Sending half of the metric stream drained by the exporter.
pub type MetricSink = mpsc::Sender<Sample>;

/// Shared configuration handed to every collector constructor.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Parent span; collectors log inside a child of it.
    pub logger: Span,
    /// Databases whose rows collectors skip.
    pub exclude_databases: Vec<String>,
}

impl CollectorConfig {
    pub fn new(logger: Span) -> Self {
        Self {
            logger,
            exclude_databases: Vec::new(),
        }
    }

    pub fn with_exclude_databases(mut self, databases: Vec<String>) -> Self {
        self.exclude_databases = databases;
        self
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self::new(Span::current())
    }
}

#[async_trait]
pub trait Collector: Send + Sync {
    /// Runs the collector's query and writes its samples to `sink`.
    ///
    /// Returns the first query, scan, or context error; samples sent before
    /// the error stay sent. Never closes `sink`.
    async fn update(&self, ctx: &QueryContext, db: &dyn Database, sink: &MetricSink) -> Result<()>;
}
