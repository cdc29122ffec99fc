//! Per-table vacuum and visibility statistics from `pg_class`.
//!
//! Covers the 100 user tables with the most on-disk pages: frozen xid and
//! multixact horizons with their ages, planner size estimates, and
//! visibility map coverage.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use futures::TryStreamExt;
use pgmon_common::error::{PgmonError, Result};
use tracing::{Instrument, Span, debug, debug_span};

use crate::{
    collector::{Collector, CollectorConfig, CollectorRegistry, CollectorState, MetricSink},
    db::{Database, QueryContext, Row},
    metrics::{Desc, NAMESPACE, Sample, ValueType, build_fq_name},
};

pub const CLASS_SUBSYSTEM: &str = "class";

/// Label used when the catalog returns no value for an identifying column.
pub const UNKNOWN_LABEL: &str = "unknown";

const CLASS_LABELS: [&str; 3] = ["datname", "schemaname", "relname"];

// Top 100 tables by relpages. xid columns are cast so they decode as integers.
pub const PG_CLASS_QUERY: &str = "SELECT
    current_database() AS datname,
    stat.schemaname,
    stat.relname,
    cls.relfrozenxid::text::bigint AS relfrozenxid,
    age(cls.relfrozenxid) AS relfrozenxid_age,
    cls.relminmxid::text::bigint AS relminmxid,
    mxid_age(cls.relminmxid) AS relminmxid_age,
    cls.relpages,
    cls.reltuples,
    cls.relnatts,
    cls.relallvisible
FROM
    pg_stat_user_tables AS stat
LEFT JOIN
    pg_class AS cls ON stat.relid = cls.oid
ORDER BY cls.relpages DESC
LIMIT 100;";

/// One statistic column and the metric it feeds.
#[derive(Debug)]
pub struct ClassStatistic {
    pub column: &'static str,
    pub value_type: ValueType,
    pub desc: Arc<Desc>,
}

/// Descriptor table in emission order. Statistic `i` reads result column
/// `CLASS_LABELS.len() + i`.
#[derive(Debug)]
pub struct ClassDescriptors {
    pub statistics: [ClassStatistic; 8],
}

static CLASS_DESCRIPTORS: LazyLock<ClassDescriptors> = LazyLock::new(|| ClassDescriptors {
    statistics: [
        statistic(
            "relfrozenxid",
            ValueType::Counter,
            "All txids before this have been frozen on the table",
        ),
        statistic(
            "relfrozenxid_age",
            ValueType::Gauge,
            "The age of this table in vacuum cycles computed as age(relfrozenxid)",
        ),
        statistic(
            "relminmxid",
            ValueType::Counter,
            "All mxids before this one have been replaced by a transaction ID on the table",
        ),
        statistic(
            "relminmxid_age",
            ValueType::Gauge,
            "The age of this table in vacuum cycles computed as age(relminmxid)",
        ),
        statistic(
            "relpages",
            ValueType::Gauge,
            "Size of the on-disk representation of this table in pages",
        ),
        statistic(
            "reltuples",
            ValueType::Gauge,
            "Number of live rows in the table. This is only an estimate used by the planner.",
        ),
        statistic(
            "relnatts",
            ValueType::Gauge,
            "Number of user columns in the relation",
        ),
        statistic(
            "relallvisible",
            ValueType::Gauge,
            "Number of pages that are marked all-visible in the table's visibility map. This is only an estimate used by the planner.",
        ),
    ],
});

fn statistic(column: &'static str, value_type: ValueType, help: &str) -> ClassStatistic {
    ClassStatistic {
        column,
        value_type,
        desc: Arc::new(Desc::new(
            build_fq_name(NAMESPACE, CLASS_SUBSYSTEM, column),
            help,
            &CLASS_LABELS,
        )),
    }
}

pub fn class_descriptors() -> &'static ClassDescriptors {
    &CLASS_DESCRIPTORS
}

pub fn register(registry: &mut CollectorRegistry) -> Result<()> {
    registry.register(CLASS_SUBSYSTEM, CollectorState::Disabled, PgClassCollector::build)
}

pub struct PgClassCollector {
    span: Span,
    exclude_databases: Vec<String>,
}

impl PgClassCollector {
    pub fn new(config: &CollectorConfig) -> Self {
        LazyLock::force(&CLASS_DESCRIPTORS);
        Self {
            span: debug_span!(parent: &config.logger, "collector", collector = CLASS_SUBSYSTEM),
            exclude_databases: config.exclude_databases.clone(),
        }
    }

    /// Rows from an excluded database produce no samples.
    fn is_excluded(&self, row: &Row) -> Result<bool> {
        if self.exclude_databases.is_empty() {
            return Ok(false);
        }
        let datname = row.get_opt_str(0)?;
        Ok(datname.is_some_and(|name| self.exclude_databases.iter().any(|db| db == name)))
    }

    fn build(config: &CollectorConfig) -> Result<Box<dyn Collector>> {
        Ok(Box::new(Self::new(config)))
    }
}

#[async_trait]
impl Collector for PgClassCollector {
    async fn update(&self, ctx: &QueryContext, db: &dyn Database, sink: &MetricSink) -> Result<()> {
        let descriptors = class_descriptors();

        async move {
            let mut rows = ctx.run(db.query(PG_CLASS_QUERY)).await?;
            let mut row_count = 0usize;
            let mut skipped = 0usize;

            while let Some(row) = ctx.run(rows.try_next()).await? {
                if self.is_excluded(&row)? {
                    skipped += 1;
                    continue;
                }
                for sample in map_row(&row, descriptors)? {
                    ctx.run(async {
                        sink.send(sample).await.map_err(|_| PgmonError::SinkClosed)
                    })
                    .await?;
                }
                row_count += 1;
            }

            debug!(rows = row_count, skipped, "class statistics collected");
            Ok(())
        }
        .instrument(self.span.clone())
        .await
    }
}

/// Converts one result row into its eight samples.
///
/// The whole row is scanned before anything is built, so a scan failure
/// yields no samples for that row.
pub fn map_row(row: &Row, descriptors: &ClassDescriptors) -> Result<Vec<Sample>> {
    let label_values = (0..CLASS_LABELS.len())
        .map(|index| {
            row.get_opt_str(index)
                .map(|value| value.unwrap_or(UNKNOWN_LABEL).to_string())
        })
        .collect::<Result<Vec<_>>>()?;

    let values = (0..descriptors.statistics.len())
        .map(|offset| {
            row.get_opt_f64(CLASS_LABELS.len() + offset)
                .map(|value| value.unwrap_or(0.0))
        })
        .collect::<Result<Vec<_>>>()?;

    descriptors
        .statistics
        .iter()
        .zip(values)
        .map(|(statistic, value)| {
            Sample::new_const(
                &statistic.desc,
                statistic.value_type,
                value,
                label_values.clone(),
            )
        })
        .collect()
}
