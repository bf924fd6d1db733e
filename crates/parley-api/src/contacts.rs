//! Handler for `/contacts`.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/contacts` | `?email` required; returns `{"users": [...]}` |

use axum::{
  Json,
  extract::{Query, State},
};
use parley_core::{
  session::ChatSession,
  store::MessagingStore,
  visibility::ContactList,
};
use serde::Deserialize;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ContactParams {
  /// The user whose contacts to resolve.
  pub email: String,
}

/// `GET /contacts?email=<email>`
///
/// A failed read surfaces as an error response, never as an empty list.
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<ContactParams>,
) -> Result<Json<ContactList>, ApiError>
where
  S: MessagingStore + 'static,
{
  let session = ChatSession::new(state.store, params.email, state.session);
  let contacts = session.contacts().await?;
  tracing::debug!(
    email = session.user_email(),
    count = contacts.len(),
    "contacts resolved"
  );
  Ok(Json(contacts))
}
