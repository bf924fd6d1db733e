//! In-memory `MessagingStore` used by this crate's unit tests.
//!
//! Change notification is synchronous: `watch` delivers the current result
//! set before returning and `append_message` invokes every live matching
//! handler before returning, which keeps ordering assertions deterministic.

use std::{
  sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
  },
  time::Duration,
};

use chrono::{TimeDelta, TimeZone, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::{
  event::EventRecord,
  message::{ChatId, Message, NewMessage},
  store::{ChangeHandler, FeedQuery, MessagingStore, Subscription},
  user::User,
};

#[derive(Debug, Error)]
pub enum FakeError {
  #[error("injected {0} failure")]
  Injected(&'static str),
  #[error(transparent)]
  Core(#[from] crate::Error),
}

struct Watcher {
  query:     FeedQuery,
  on_change: ChangeHandler,
  live:      Arc<AtomicBool>,
}

#[derive(Default)]
pub struct FakeStore {
  pub users:        Mutex<Vec<User>>,
  pub events:       Mutex<Vec<EventRecord>>,
  messages:         Mutex<Vec<Message>>,
  watchers:         Mutex<Vec<Watcher>>,
  pub cancels:      Arc<AtomicUsize>,
  pub watch_calls:  AtomicUsize,
  pub fail_users:   AtomicBool,
  pub fail_reads:   AtomicBool,
  pub fail_watch:   AtomicBool,
  pub fail_append:  AtomicBool,
  pub read_delay:   Mutex<Option<Duration>>,
}

impl FakeStore {
  pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

  /// Insert a message directly, bypassing notification.
  pub fn seed(&self, from: &str, to: &str, body: &str) -> Message {
    let mut messages = self.messages.lock().unwrap();
    let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap()
      + TimeDelta::seconds(messages.len() as i64);
    let m = NewMessage::new(from, to, body)
      .into_message(Uuid::new_v4(), at)
      .unwrap();
    messages.push(m.clone());
    m
  }

  pub fn live_watchers(&self) -> usize {
    self
      .watchers
      .lock()
      .unwrap()
      .iter()
      .filter(|w| w.live.load(Ordering::SeqCst))
      .count()
  }

  fn select(&self, query: &FeedQuery) -> Vec<Message> {
    let messages = self.messages.lock().unwrap();
    let mut out: Vec<_> =
      messages.iter().filter(|m| query.matches(m)).cloned().collect();
    if matches!(query, FeedQuery::Participant(_)) {
      out.reverse();
    }
    out
  }

  async fn read_gate(&self) -> Result<(), FakeError> {
    let delay = *self.read_delay.lock().unwrap();
    if let Some(d) = delay {
      tokio::time::sleep(d).await;
    }
    if self.fail_reads.load(Ordering::SeqCst) {
      return Err(FakeError::Injected("read"));
    }
    Ok(())
  }
}

impl MessagingStore for FakeStore {
  type Error = FakeError;

  async fn query_events(&self) -> Result<Vec<EventRecord>, FakeError> {
    self.read_gate().await?;
    Ok(self.events.lock().unwrap().clone())
  }

  async fn query_users(&self) -> Result<Vec<User>, FakeError> {
    self.read_gate().await?;
    if self.fail_users.load(Ordering::SeqCst) {
      return Err(FakeError::Injected("users"));
    }
    Ok(self.users.lock().unwrap().clone())
  }

  async fn query_messages_by_chat(
    &self,
    chat_id: &ChatId,
  ) -> Result<Vec<Message>, FakeError> {
    self.read_gate().await?;
    Ok(self.select(&FeedQuery::Chat(chat_id.clone())))
  }

  async fn query_messages_by_participant(
    &self,
    email: &str,
  ) -> Result<Vec<Message>, FakeError> {
    self.read_gate().await?;
    Ok(self.select(&FeedQuery::Participant(email.to_owned())))
  }

  fn watch(
    &self,
    query: FeedQuery,
    on_change: ChangeHandler,
  ) -> Result<Subscription, FakeError> {
    self.watch_calls.fetch_add(1, Ordering::SeqCst);
    if self.fail_watch.load(Ordering::SeqCst) {
      return Err(FakeError::Injected("watch"));
    }
    let live = Arc::new(AtomicBool::new(true));
    let current = self.select(&query);
    self.watchers.lock().unwrap().push(Watcher {
      query,
      on_change: on_change.clone(),
      live: live.clone(),
    });
    on_change(current);
    let cancels = self.cancels.clone();
    Ok(Subscription::new(move || {
      live.store(false, Ordering::SeqCst);
      cancels.fetch_add(1, Ordering::SeqCst);
      Ok(())
    }))
  }

  async fn append_message(&self, input: NewMessage) -> Result<Message, FakeError> {
    if self.fail_append.load(Ordering::SeqCst) {
      return Err(FakeError::Injected("append"));
    }
    let message = {
      let mut messages = self.messages.lock().unwrap();
      let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap()
        + TimeDelta::seconds(messages.len() as i64);
      let m = input.into_message(Uuid::new_v4(), at)?;
      messages.push(m.clone());
      m
    };

    let targets: Vec<(FeedQuery, ChangeHandler)> = self
      .watchers
      .lock()
      .unwrap()
      .iter()
      .filter(|w| w.live.load(Ordering::SeqCst) && w.query.matches(&message))
      .map(|w| (w.query.clone(), w.on_change.clone()))
      .collect();
    for (query, on_change) in targets {
      on_change(self.select(&query));
    }
    Ok(message)
  }
}
