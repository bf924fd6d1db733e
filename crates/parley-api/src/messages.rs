//! Handlers for message reads and writes.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/chats/:chat_id/messages` | Oldest first |
//! | `GET`  | `/users/:email/chats` | Latest message of each chat, newest first |
//! | `POST` | `/messages` | Body: [`SendBody`]; returns 201 + stored message |

use std::time::Duration;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use parley_core::{
  message::{ChatId, Message, latest_per_chat},
  session::ChatSession,
  store::MessagingStore,
};
use serde::Deserialize;

use crate::{AppState, error::ApiError};

async fn bounded<T, E>(
  limit: Option<Duration>,
  what: &str,
  read: impl Future<Output = Result<T, E>>,
) -> Result<T, ApiError>
where
  E: std::error::Error + Send + Sync + 'static,
{
  let result = match limit {
    Some(limit) => tokio::time::timeout(limit, read)
      .await
      .map_err(|_| ApiError::Timeout(format!("loading {what}")))?,
    None => read.await,
  };
  result.map_err(|e| ApiError::Store(Box::new(e)))
}

// ─── Conversation ─────────────────────────────────────────────────────────────

/// `GET /chats/:chat_id/messages`
pub async fn conversation<S>(
  State(state): State<AppState<S>>,
  Path(chat_id): Path<String>,
) -> Result<Json<Vec<Message>>, ApiError>
where
  S: MessagingStore + 'static,
{
  let chat_id = ChatId::new(chat_id)?;
  let messages = bounded(
    state.session.load_timeout,
    &format!("chat {chat_id}"),
    state.store.query_messages_by_chat(&chat_id),
  )
  .await?;
  Ok(Json(messages))
}

// ─── Chat list ────────────────────────────────────────────────────────────────

/// `GET /users/:email/chats`
pub async fn chat_list<S>(
  State(state): State<AppState<S>>,
  Path(email): Path<String>,
) -> Result<Json<Vec<Message>>, ApiError>
where
  S: MessagingStore + 'static,
{
  let messages = bounded(
    state.session.load_timeout,
    &format!("messages of {email}"),
    state.store.query_messages_by_participant(&email),
  )
  .await?;
  Ok(Json(latest_per_chat(&messages)))
}

// ─── Send ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SendBody {
  pub sender_email:    String,
  pub recipient_email: String,
  pub body:            String,
}

/// `POST /messages`
///
/// The recipient must be among the sender's contacts at the time of sending.
pub async fn send<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<SendBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: MessagingStore + 'static,
{
  if body.sender_email == body.recipient_email {
    return Err(ApiError::BadRequest(
      "sender and recipient must differ".into(),
    ));
  }

  let session =
    ChatSession::new(state.store, body.sender_email, state.session);
  let contacts = session.contacts().await?;
  if !contacts.contains(&body.recipient_email) {
    return Err(ApiError::Forbidden(format!(
      "{} is not a contact of {}",
      body.recipient_email,
      session.user_email()
    )));
  }

  let message = session.send(&body.recipient_email, body.body).await?;
  tracing::info!(
    message_id = %message.message_id,
    chat_id = %message.chat_id,
    "message sent"
  );
  Ok((StatusCode::CREATED, Json(message)))
}
