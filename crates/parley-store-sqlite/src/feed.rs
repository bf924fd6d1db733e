//! Live-feed task: re-runs a feed's query whenever a relevant message is
//! appended and hands the full result set to the subscriber.

use parley_core::{
  message::Message,
  store::{ChangeHandler, FeedQuery, MessagingStore as _},
};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::SqliteStore;

/// Capacity of the in-process change broadcast.
pub const CHANGE_CAPACITY: usize = 256;

/// Drive one feed until the task is aborted.
///
/// `changes` must have been subscribed before the task was spawned so that
/// no append between registration and the first poll is missed.
pub async fn run(
  store: SqliteStore,
  query: FeedQuery,
  on_change: ChangeHandler,
  mut changes: broadcast::Receiver<Message>,
) {
  deliver(&store, &query, &on_change).await;

  loop {
    match changes.recv().await {
      Ok(message) if query.matches(&message) => {
        deliver(&store, &query, &on_change).await;
      }
      Ok(_) => {}
      Err(RecvError::Lagged(skipped)) => {
        tracing::warn!(feed = %query, skipped, "change feed lagged; re-querying");
        deliver(&store, &query, &on_change).await;
      }
      Err(RecvError::Closed) => break,
    }
  }
}

async fn deliver(store: &SqliteStore, query: &FeedQuery, on_change: &ChangeHandler) {
  match store.query_feed(query).await {
    Ok(messages) => on_change(messages),
    // The previous result set stays current; the next change retries.
    Err(e) => tracing::warn!(feed = %query, error = %e, "feed re-query failed"),
  }
}
