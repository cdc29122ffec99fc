use std::{collections::HashMap, time::Duration};

use clap::Parser;
use pgmon_collector::{
    CollectorConfig, CollectorRegistry, PgDatabase, QueryContext, Sample, register_builtin,
    render_prometheus,
};
use pgmon_common::error::{PgmonError, Result};
use tokio::sync::mpsc;
use tracing::{info, info_span, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "pgmon",
    about = "Run PostgreSQL collectors once and print Prometheus metrics"
)]
struct Cli {
    /// PostgreSQL connection string.
    #[arg(long, env = "PGMON_DATA_SOURCE_NAME")]
    dsn: Option<String>,

    /// Enable a collector that is off by default. Repeatable.
    #[arg(long = "enable-collector", value_name = "NAME")]
    enable_collectors: Vec<String>,

    /// Disable a collector that is on by default. Repeatable.
    #[arg(long = "disable-collector", value_name = "NAME")]
    disable_collectors: Vec<String>,

    /// Comma-separated database names whose rows collectors skip.
    #[arg(long, value_delimiter = ',')]
    exclude_databases: Vec<String>,

    /// Per-collector query timeout in seconds.
    #[arg(long, default_value = "10")]
    timeout_secs: u64,

    /// Buffered samples between collectors and the renderer.
    #[arg(long, default_value = "1024")]
    sink_capacity: usize,

    /// Print registered collectors with their default state and exit.
    #[arg(long, default_value_t = false)]
    list_collectors: bool,
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::from_default_env().add_directive("pgmon=info".parse()?);
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut registry = CollectorRegistry::new();
    register_builtin(&mut registry)?;

    if cli.list_collectors {
        for name in registry.names() {
            let state = registry
                .default_state(name)
                .map_or("unknown", |state| if state.is_enabled() { "enabled" } else { "disabled" });
            println!("{name}\t{state}");
        }
        return Ok(());
    }

    let dsn = cli.dsn.as_deref().ok_or_else(|| {
        PgmonError::MissingConfig("--dsn or PGMON_DATA_SOURCE_NAME is required".to_string())
    })?;
    if cli.sink_capacity == 0 {
        return Err(
            PgmonError::InvalidArgument("--sink-capacity must be positive".to_string()).into(),
        );
    }

    let overrides = collector_overrides(&cli.enable_collectors, &cli.disable_collectors)?;
    let config = CollectorConfig::new(info_span!("pgmon"))
        .with_exclude_databases(cli.exclude_databases.clone());
    let collectors = registry.build_enabled(&config, &overrides)?;
    if collectors.is_empty() {
        warn!("no collectors enabled");
    }

    let db = PgDatabase::connect(dsn).await?;
    info!(collectors = collectors.len(), "connected to postgres");

    let (sink, mut receiver) = mpsc::channel::<Sample>(cli.sink_capacity);
    let drain = tokio::spawn(async move {
        let mut samples = Vec::new();
        while let Some(sample) = receiver.recv().await {
            samples.push(sample);
        }
        samples
    });

    let timeout = Duration::from_secs(cli.timeout_secs);
    let mut failures = 0usize;
    for (name, collector) in &collectors {
        let ctx = QueryContext::with_timeout(timeout);
        match collector.update(&ctx, &db, &sink).await {
            Ok(()) => info!(collector = name, "collector succeeded"),
            Err(err) if err.is_context_error() => {
                failures += 1;
                warn!(collector = name, error = %err, "collector timed out or was cancelled");
            }
            Err(err) => {
                failures += 1;
                warn!(collector = name, error = %err, "collector failed");
            }
        }
    }
    drop(sink);

    let samples = drain.await?;
    db.close().await;

    print!("{}", render_prometheus(&samples));
    info!(samples = samples.len(), failures, "scrape complete");

    scrape_outcome(failures, collectors.len())?;
    Ok(())
}

/// A scrape fails only when it had collectors to run and none succeeded.
fn scrape_outcome(failures: usize, enabled: usize) -> Result<()> {
    if enabled > 0 && failures == enabled {
        return Err(PgmonError::AllCollectorsFailed(failures));
    }
    Ok(())
}

/// Merges `--enable-collector` / `--disable-collector` into one override map.
fn collector_overrides(enable: &[String], disable: &[String]) -> Result<HashMap<String, bool>> {
    let mut overrides = HashMap::new();
    for name in enable {
        overrides.insert(name.clone(), true);
    }
    for name in disable {
        if overrides.insert(name.clone(), false) == Some(true) {
            return Err(PgmonError::InvalidArgument(format!(
                "collector {name} is both enabled and disabled"
            )));
        }
    }
    Ok(overrides)
}
