//! Error types for `parley-core`.

use thiserror::Error;

/// A boxed backend error, as produced by any [`crate::store::MessagingStore`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  /// A read against the backing store failed. Never downgraded to an empty
  /// or partial result.
  #[error("store read failed: {0}")]
  StoreRead(#[source] BoxError),

  /// An append against the backing store failed; nothing was recorded.
  #[error("store write failed: {0}")]
  StoreWrite(#[source] BoxError),

  /// The store refused to register a live feed.
  #[error("failed to establish subscription: {0}")]
  SubscriptionEstablish(#[source] BoxError),

  #[error("one-shot load for {0} timed out")]
  LoadTimeout(String),

  #[error("a chat needs two distinct participants, got {0:?} twice")]
  InvalidParticipants(String),

  #[error("malformed chat id: {0:?}")]
  InvalidChatId(String),

  #[error("teardown of {key} failed: {reason}")]
  Teardown { key: String, reason: String },
}

impl Error {
  pub fn store_read<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::StoreRead(Box::new(e))
  }

  pub fn store_write<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::StoreWrite(Box::new(e))
  }

  pub fn subscription_establish<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::SubscriptionEstablish(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
