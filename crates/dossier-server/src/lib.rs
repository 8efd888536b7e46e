//! HTTP host for the Dossier audit API.
//!
//! Loads [`ServerConfig`], opens the SQLite store and serves
//! [`dossier_api::api_router`] under `/api`.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use axum::{Router, routing::get};
use dossier_core::store::DocumentStore as _;
use dossier_store_sqlite::SqliteStore;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` layered with
/// `DOSSIER_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:            String,
  pub port:            u16,
  pub store_path:      PathBuf,
  #[serde(default = "default_busy_timeout_ms")]
  pub busy_timeout_ms: u64,
}

fn default_busy_timeout_ms() -> u64 { 5_000 }

impl ServerConfig {
  /// Read `path` (optional) and the environment into a config.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .set_default("host", "127.0.0.1")?
      .set_default("port", 8080)?
      .set_default("store_path", "dossier.db")?
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("DOSSIER"))
      .build()
      .context("failed to read config file")?;

    settings
      .try_deserialize()
      .context("failed to deserialise ServerConfig")
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn busy_timeout(&self) -> Duration {
    Duration::from_millis(self.busy_timeout_ms)
  }

  /// `store_path` with a leading `~` expanded.
  pub fn resolved_store_path(&self) -> PathBuf { expand_tilde(&self.store_path) }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// The full application: health check plus the API under `/api`.
pub fn app(store: Arc<SqliteStore>) -> Router {
  Router::new()
    .route("/health", get(|| async { "ok" }))
    .nest("/api", dossier_api::api_router(store))
    .layer(TraceLayer::new_for_http())
}

/// Open the configured store.
pub async fn open_store(cfg: &ServerConfig) -> anyhow::Result<SqliteStore> {
  let store_path = cfg.resolved_store_path();
  SqliteStore::open_with_timeout(&store_path, cfg.busy_timeout())
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))
}

/// Run the reconciliation query once; each anomaly is logged by the store.
pub async fn startup_integrity_check(store: &SqliteStore) -> anyhow::Result<usize> {
  let anomalies = store
    .integrity_anomalies()
    .await
    .context("integrity check failed")?;
  Ok(anomalies.len())
}
