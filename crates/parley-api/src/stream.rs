//! Server-sent-event feeds.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/users/:email/chats/stream` | `chats` events: latest message per chat |
//! | `GET`  | `/users/:email/chats/:other/stream` | `messages` events: the whole conversation |
//!
//! Every event carries the full current result set; clients replace rather
//! than merge. Each stream owns a [`ChatSession`], so a disconnecting client
//! tears its feeds down.

use std::{
  convert::identity,
  pin::Pin,
  sync::Arc,
  task::{Context, Poll},
};

use axum::{
  extract::{Path, State},
  response::sse::{Event, KeepAlive, KeepAliveStream, Sse},
};
use parley_core::{
  message::{Message, latest_per_chat},
  session::ChatSession,
  store::{ChangeHandler, MessagingStore},
};
use tokio::sync::mpsc;
use tokio_stream::Stream;

use crate::{AppState, error::ApiError};

type Projection = fn(Vec<Message>) -> Vec<Message>;

/// A live feed rendered as SSE events.
pub struct FeedStream<S: MessagingStore> {
  rx:      mpsc::UnboundedReceiver<Vec<Message>>,
  event:   &'static str,
  project: Projection,
  session: ChatSession<S>,
}

impl<S: MessagingStore> FeedStream<S> {
  /// A handler forwarding every delivery into a channel, and its receiver.
  fn channel() -> (ChangeHandler, mpsc::UnboundedReceiver<Vec<Message>>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handler: ChangeHandler = Arc::new(move |batch| {
      // The receiver only goes away together with the session.
      let _ = tx.send(batch);
    });
    (handler, rx)
  }
}

impl<S: MessagingStore> Stream for FeedStream<S> {
  type Item = Result<Event, axum::Error>;

  fn poll_next(
    self: Pin<&mut Self>,
    cx: &mut Context<'_>,
  ) -> Poll<Option<Self::Item>> {
    let this = self.get_mut();
    this.rx.poll_recv(cx).map(|batch| {
      batch.map(|b| Event::default().event(this.event).json_data((this.project)(b)))
    })
  }
}

impl<S: MessagingStore> Drop for FeedStream<S> {
  fn drop(&mut self) {
    let closed = self.session.cleanup();
    tracing::debug!(email = self.session.user_email(), closed, "stream closed");
  }
}

/// `GET /users/:email/chats/stream`
pub async fn chat_list<S>(
  State(state): State<AppState<S>>,
  Path(email): Path<String>,
) -> Result<Sse<KeepAliveStream<FeedStream<S>>>, ApiError>
where
  S: MessagingStore + 'static,
{
  let (handler, rx) = FeedStream::<S>::channel();
  let mut session = ChatSession::new(state.store, email, state.session);
  session.subscribe_chat_list(handler).await?;

  let stream = FeedStream {
    rx,
    event: "chats",
    project: |feed| latest_per_chat(&feed),
    session,
  };
  Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// `GET /users/:email/chats/:other/stream`
pub async fn conversation<S>(
  State(state): State<AppState<S>>,
  Path((email, other)): Path<(String, String)>,
) -> Result<Sse<KeepAliveStream<FeedStream<S>>>, ApiError>
where
  S: MessagingStore + 'static,
{
  let (handler, rx) = FeedStream::<S>::channel();
  let mut session = ChatSession::new(state.store, email, state.session);
  let chat_id = session.open_conversation_with(&other, handler).await?;
  tracing::debug!(%chat_id, "conversation stream opened");

  let stream = FeedStream {
    rx,
    event: "messages",
    project: identity,
    session,
  };
  Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
