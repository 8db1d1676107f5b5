//! gcn-monitor binary.
//!
//! Reads `config.toml` (or the path given with `--config`), overlays
//! `GCN__SECTION__KEY` environment variables, opens the event tables and
//! consumes the spool feed until interrupted.
//!
//! ```
//! gcn-monitor --dry-run run
//! gcn-monitor ingest notice.txt --topic gcn.classic.text.SWIFT_XRT_POSITION
//! gcn-monitor visibility --ra 106.76 --dec 7.19 --series
//! ```

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::Context as _;
use chrono::{DateTime, TimeDelta, Utc};
use clap::{Parser, Subcommand};
use gcn_core::{
  Coordinates,
  store::{EventStore, TableStorage},
};
use gcn_extract::Extractor;
use gcn_monitor::{
  Consumer, DryRunSink, MonitorConfig, Pipeline, PipelineConfig, Sinks,
  WebhookSink, feed::SpoolFeed, format::format_time, settings::StoreBackend,
};
use gcn_sky::{altitude_series, evaluate_all};
use gcn_store::{CsvTables, SqliteTables};
use tokio::sync::broadcast;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "GCN transient alert monitor")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml", global = true)]
  config: PathBuf,

  /// Log notifications and requests instead of delivering them.
  #[arg(long, global = true)]
  dry_run: bool,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Consume the feed until interrupted (the default).
  Run,
  /// Push a single payload file through the pipeline.
  Ingest {
    file:  PathBuf,
    /// Topic the payload would have arrived on.
    #[arg(short, long)]
    topic: String,
  },
  /// Print the visibility of a position from every configured observer.
  Visibility {
    #[arg(long, allow_negative_numbers = true)]
    ra:     f64,
    #[arg(long, allow_negative_numbers = true)]
    dec:    f64,
    /// Evaluation time (RFC 3339); defaults to now.
    #[arg(long)]
    at:     Option<DateTime<Utc>>,
    /// Also print hourly conditions over the search horizon.
    #[arg(long)]
    series: bool,
  },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config.clone()).required(false))
    .add_source(
      config::Environment::with_prefix("GCN")
        .separator("__")
        .try_parsing(true),
    )
    .build()
    .context("failed to read config file")?;

  let cfg: MonitorConfig = settings
    .try_deserialize()
    .context("failed to deserialise MonitorConfig")?;
  cfg.validate().context("invalid configuration")?;

  let ingest = match cli.command.unwrap_or(Command::Run) {
    Command::Visibility { ra, dec, at, series } => {
      return print_visibility(&cfg, ra, dec, at.unwrap_or_else(Utc::now), series);
    }
    Command::Ingest { file, topic } => Some((file, topic)),
    Command::Run => None,
  };

  // Expand `~` in store path.
  let store_path = expand_tilde(&cfg.store.path);
  match cfg.store.backend {
    StoreBackend::Csv => {
      let tables = CsvTables::open(&store_path)
        .await
        .with_context(|| format!("failed to open csv tables at {store_path:?}"))?;
      execute(tables, &cfg, ingest, cli.dry_run).await
    }
    StoreBackend::Sqlite => {
      let tables = SqliteTables::open(&store_path)
        .await
        .with_context(|| format!("failed to open database at {store_path:?}"))?;
      execute(tables, &cfg, ingest, cli.dry_run).await
    }
  }
}

/// Build the pipeline over `storage`, then ingest one file or run the
/// consumer.
async fn execute<S: TableStorage>(
  storage: S,
  cfg: &MonitorConfig,
  ingest: Option<(PathBuf, String)>,
  dry_run: bool,
) -> anyhow::Result<()> {
  let store = EventStore::open(storage, cfg.store.merge_policy())
    .await
    .context("failed to load event tables")?;
  let extractor = Extractor::new(cfg.extract.options())
    .context("failed to compile extraction patterns")?;

  let pipeline_cfg = PipelineConfig {
    observers:     cfg.observers.clone(),
    constraints:   cfg.visibility.constraints(),
    policy:        cfg.decision.policy(),
    request:       cfg.request.clone(),
    send_requests: cfg.sinks.send_requests && !dry_run,
  };
  let mut pipeline =
    Pipeline::new(extractor, store, pipeline_cfg, build_sinks(cfg, dry_run)?);

  if let Some((file, topic)) = ingest {
    let raw = tokio::fs::read_to_string(&file)
      .await
      .with_context(|| format!("failed to read {file:?}"))?;
    let outcome = pipeline
      .process(&topic, &raw, Utc::now())
      .await
      .context("failed to store message")?;
    println!("{outcome:#?}");
    return Ok(());
  }

  let feed = SpoolFeed::new(expand_tilde(&cfg.feed.spool_dir), cfg.feed.scan_interval());
  let mut consumer = Consumer::new(feed, cfg.feed.consumer_config());

  let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(16);
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      tracing::info!("interrupt received, shutting down");
      let _ = shutdown_tx.send(());
    }
  });

  tracing::info!(
    spool = %consumer.transport().root().display(),
    dry_run,
    "gcn-monitor consuming"
  );
  consumer
    .run(&mut pipeline, shutdown_rx)
    .await
    .context("feed consumer stopped")?;
  Ok(())
}

fn build_sinks(cfg: &MonitorConfig, dry_run: bool) -> anyhow::Result<Sinks> {
  if dry_run || (cfg.sinks.notify_url.is_none() && cfg.sinks.request_url.is_none()) {
    return Ok(Sinks::DryRun(DryRunSink));
  }
  let sink = WebhookSink::new(
    cfg.sinks.notify_url.clone(),
    cfg.sinks.request_url.clone(),
    Duration::from_secs(cfg.sinks.timeout_secs),
  )
  .context("failed to build HTTP client")?;
  Ok(Sinks::Webhook(sink))
}

fn print_visibility(
  cfg: &MonitorConfig,
  ra: f64,
  dec: f64,
  at: DateTime<Utc>,
  series: bool,
) -> anyhow::Result<()> {
  let coordinates = Coordinates::new(ra, dec, None);
  let constraints = cfg.visibility.constraints();
  let results = evaluate_all(&coordinates, &cfg.observers, at, &constraints)
    .context("visibility evaluation failed")?;

  for (observer, result) in cfg.observers.iter().zip(&results) {
    println!("{}", serde_json::to_string_pretty(result)?);
    if series {
      let samples = altitude_series(
        &coordinates,
        observer,
        at,
        constraints.horizon,
        TimeDelta::hours(1),
      )?;
      for s in samples {
        println!(
          "{}  alt {:>6.1}  moon {:>6.1}  sun {:>6.1}",
          format_time(s.time),
          s.altitude_deg,
          s.moon_separation_deg,
          s.sun_altitude_deg
        );
      }
    }
  }
  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
