//! Parley API server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`) plus
//! `PARLEY_*` environment variables, opens an in-process SQLite store, and
//! serves the JSON and SSE API over HTTP.
//!
//! # Seeding
//!
//! Users and events are owned by other services. For local use, a JSON file
//! of the form `{"users": [...], "events": [...]}` can be loaded at startup:
//!
//! ```
//! cargo run -p parley-api --bin server -- --seed fixtures.json
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use parley_api::{AppState, ServerConfig};
use parley_core::{event::EventRecord, user::User};
use parley_store_sqlite::SqliteStore;
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Parley messaging API server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// JSON file of users and events to load into the store before serving.
  #[arg(long)]
  seed: Option<PathBuf>,
}

#[derive(Deserialize)]
struct SeedFile {
  #[serde(default)]
  users:  Vec<User>,
  #[serde(default)]
  events: Vec<EventRecord>,
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
    .set_default("host", "127.0.0.1")?
    .set_default("port", 8080)?
    .set_default("store_path", "parley.db")?
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("PARLEY"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);

  // Open SQLite store.
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  if let Some(path) = &cli.seed {
    seed(&store, path).await?;
  }

  let state = AppState::new(Arc::new(store), server_cfg.session_config());
  let app = parley_api::api_router(state).layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

async fn seed(store: &SqliteStore, path: &Path) -> anyhow::Result<()> {
  let raw = std::fs::read_to_string(path)
    .with_context(|| format!("failed to read seed file {path:?}"))?;
  let file: SeedFile =
    serde_json::from_str(&raw).context("failed to parse seed file")?;

  for user in &file.users {
    store
      .upsert_user(user)
      .await
      .with_context(|| format!("failed to seed user {}", user.email))?;
  }
  for event in &file.events {
    store
      .record_event(event)
      .await
      .with_context(|| format!("failed to seed event {}", event.event_id))?;
  }

  tracing::info!(
    users = file.users.len(),
    events = file.events.len(),
    "store seeded"
  );
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
