//! cardea-server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens an
//! in-process SQLite store, and serves the Cardea API over HTTP. The daily
//! audit scan runs as a background task on the cadence the config sets.

use std::{
  net::SocketAddr,
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use cardea_functions::{RateLimitConfig, RateLimiter, ScanConfig, run_audit_scan};
use cardea_server::{AppState, ServerConfig};
use cardea_store_sqlite::SqliteStore;
use chrono::Utc;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Cardea card directory server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Run one audit scan pass and exit instead of serving.
  #[arg(long)]
  scan_now: bool,
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
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("CARDEA"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);

  // Open SQLite store.
  let store = SqliteStore::open(&store_path, server_cfg.token_secret.as_bytes())
    .await
    .map_err(|e| anyhow::anyhow!("failed to open store at {store_path:?}: {e}"))?;

  // Helper mode: one scan pass, then exit.
  if cli.scan_now {
    let alerts = run_audit_scan(&store, &ScanConfig::default(), Utc::now())
      .await
      .map_err(|e| anyhow::anyhow!("audit scan failed: {e}"))?;
    tracing::info!(alerts = alerts.len(), "scan complete");
    return Ok(());
  }

  // Build application state.
  let state = AppState {
    store:   Arc::new(store),
    limiter: Arc::new(RateLimiter::new(RateLimitConfig {
      max_calls: server_cfg.rate_limit_per_minute,
      window:    Duration::from_secs(60),
    })),
    config:  Arc::new(server_cfg.clone()),
  };

  // The scheduled scan is independent of and non-blocking toward every
  // request path; it only reads the audit log and writes alerts.
  spawn_audit_scan(
    state.store.as_ref().clone(),
    server_cfg.audit_scan_interval_hours,
  );

  let app = cardea_server::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(
    listener,
    app.into_make_service_with_connect_info::<SocketAddr>(),
  )
  .await
  .context("server error")?;

  Ok(())
}

/// Run the audit scan on a fixed cadence until the process exits.
fn spawn_audit_scan(store: SqliteStore, interval_hours: u64) {
  let interval = Duration::from_secs(interval_hours.max(1) * 3600);
  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(interval);
    // The immediate first tick would re-scan on every restart; skip it.
    ticker.tick().await;
    loop {
      ticker.tick().await;
      if let Err(e) = run_audit_scan(&store, &ScanConfig::default(), Utc::now()).await {
        tracing::error!(error = %e, "audit scan failed");
      }
    }
  });
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
