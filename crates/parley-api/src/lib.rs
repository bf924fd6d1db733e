//! JSON and server-sent-events API for Parley.
//!
//! Exposes an axum [`Router`] backed by any
//! [`parley_core::store::MessagingStore`]. Authentication is the caller's
//! responsibility: the acting user is named explicitly in every request.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", parley_api::api_router(state))
//! ```

pub mod contacts;
pub mod error;
pub mod messages;
pub mod stream;

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{
  Router,
  routing::{get, post},
};
use parley_core::{
  session::SessionConfig,
  store::MessagingStore,
  visibility::VisibilityPolicy,
};
use serde::Deserialize;

pub use error::ApiError;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `PARLEY_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:               String,
  pub port:               u16,
  pub store_path:         PathBuf,
  /// Deadline for one-shot loads, in milliseconds. Unset waits indefinitely.
  #[serde(default)]
  pub load_timeout_ms:    Option<u64>,
  /// Hide superadmins from contact lists in addition to admins.
  #[serde(default)]
  pub exclude_superadmin: bool,
}

impl ServerConfig {
  pub fn session_config(&self) -> SessionConfig {
    SessionConfig {
      load_timeout: self.load_timeout_ms.map(Duration::from_millis),
      visibility:   VisibilityPolicy {
        exclude_superadmin: self.exclude_superadmin,
      },
    }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub store:   Arc<S>,
  pub session: SessionConfig,
}

// Manual impl: `S` itself need not be `Clone`.
impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self { store: self.store.clone(), session: self.session }
  }
}

impl<S> AppState<S> {
  pub fn new(store: Arc<S>, session: SessionConfig) -> Self {
    Self { store, session }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: AppState<S>) -> Router<()>
where
  S: MessagingStore + 'static,
{
  Router::new()
    .route("/contacts", get(contacts::list::<S>))
    .route("/messages", post(messages::send::<S>))
    .route("/chats/{chat_id}/messages", get(messages::conversation::<S>))
    .route("/users/{email}/chats", get(messages::chat_list::<S>))
    .route("/users/{email}/chats/stream", get(stream::chat_list::<S>))
    .route("/users/{email}/chats/{other}/stream", get(stream::conversation::<S>))
    .with_state(state)
}

#[cfg(test)]
mod tests;
