//! The `MessagingStore` trait and supporting feed types.
//!
//! The trait is implemented by backing-store adapters (e.g.
//! `parley-store-sqlite`). The resolver and the chat session depend on this
//! abstraction, not on any concrete backend.

use std::{fmt, future::Future, sync::Arc};

use tokio::task::AbortHandle;

use crate::{
  error::BoxError,
  event::EventRecord,
  message::{ChatId, Message, NewMessage},
  user::User,
};

// ─── Feed descriptor ─────────────────────────────────────────────────────────

/// Which messages a live feed (or its one-shot load) covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FeedQuery {
  /// Every message of one chat, oldest first.
  Chat(ChatId),
  /// Every message a user takes part in, newest first.
  Participant(String),
}

impl FeedQuery {
  /// Whether a newly appended message changes this feed's result set.
  pub fn matches(&self, message: &Message) -> bool {
    match self {
      Self::Chat(id) => &message.chat_id == id,
      Self::Participant(email) => message.involves(email),
    }
  }
}

impl fmt::Display for FeedQuery {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Chat(id) => write!(f, "chat {id}"),
      Self::Participant(email) => write!(f, "messages of {email}"),
    }
  }
}

/// Callback invoked with the full current result set of a feed.
pub type ChangeHandler = Arc<dyn Fn(Vec<Message>) + Send + Sync>;

// ─── Subscription ────────────────────────────────────────────────────────────

type CancelFn = Box<dyn FnOnce() -> Result<(), BoxError> + Send + Sync>;

/// A cancellation handle for one live feed.
///
/// Cancelling consumes the handle, so a feed is torn down at most once.
/// Dropping a handle that was never cancelled cancels it.
pub struct Subscription {
  cancel: Option<CancelFn>,
}

impl Subscription {
  pub fn new<F>(cancel: F) -> Self
  where
    F: FnOnce() -> Result<(), BoxError> + Send + Sync + 'static,
  {
    Self { cancel: Some(Box::new(cancel)) }
  }

  /// A feed driven by a spawned task; cancelling aborts the task.
  pub fn from_task(handle: AbortHandle) -> Self {
    Self::new(move || {
      handle.abort();
      Ok(())
    })
  }

  /// Tear the feed down.
  pub fn cancel(mut self) -> Result<(), BoxError> {
    match self.cancel.take() {
      Some(f) => f(),
      None => Ok(()),
    }
  }
}

impl Drop for Subscription {
  fn drop(&mut self) {
    if let Some(f) = self.cancel.take()
      && let Err(e) = f()
    {
      tracing::warn!(error = %e, "dropped subscription failed to tear down");
    }
  }
}

impl fmt::Debug for Subscription {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Subscription")
      .field("live", &self.cancel.is_some())
      .finish()
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the backing document store.
///
/// Message writes are append-only and timestamped by the store. Users and
/// events are owned by other parts of the application and only read here.
///
/// All async methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait MessagingStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Every submitted event.
  fn query_events(
    &self,
  ) -> impl Future<Output = Result<Vec<EventRecord>, Self::Error>> + Send + '_;

  /// Every registered user.
  fn query_users(
    &self,
  ) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + '_;

  /// One-shot load of a chat, ascending by timestamp (ties in insertion
  /// order).
  fn query_messages_by_chat<'a>(
    &'a self,
    chat_id: &'a ChatId,
  ) -> impl Future<Output = Result<Vec<Message>, Self::Error>> + Send + 'a;

  /// One-shot load of every message `email` takes part in, descending by
  /// timestamp.
  fn query_messages_by_participant<'a>(
    &'a self,
    email: &'a str,
  ) -> impl Future<Output = Result<Vec<Message>, Self::Error>> + Send + 'a;

  /// One-shot load of whatever `query` covers, in that feed's order.
  fn query_feed<'a>(
    &'a self,
    query: &'a FeedQuery,
  ) -> impl Future<Output = Result<Vec<Message>, Self::Error>> + Send + 'a {
    async move {
      match query {
        FeedQuery::Chat(id) => self.query_messages_by_chat(id).await,
        FeedQuery::Participant(email) => {
          self.query_messages_by_participant(email).await
        }
      }
    }
  }

  /// Register a live feed. `on_change` receives the full current result set
  /// of `query` on attach and after every change to it.
  ///
  /// Registration errors are returned synchronously; nothing is retried.
  fn watch(
    &self,
    query: FeedQuery,
    on_change: ChangeHandler,
  ) -> Result<Subscription, Self::Error>;

  /// Append a message and return it as stored.
  fn append_message(
    &self,
    input: NewMessage,
  ) -> impl Future<Output = Result<Message, Self::Error>> + Send + '_;
}
