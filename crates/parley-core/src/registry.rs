//! Keyed registry of live feeds.
//!
//! A session holds at most one live feed per [`SubscriptionKey`]. Registering
//! a key that is already present cancels the old feed before the new one is
//! stored, so a feed can never be leaked by re-opening the same view.

use std::{collections::HashMap, fmt};

use crate::{message::ChatId, store::Subscription, Error, Result};

/// Namespaced key of a registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubscriptionKey {
  /// The user's aggregate feed backing the chat list.
  LastMessages,
  /// One open conversation.
  Chat(ChatId),
}

impl fmt::Display for SubscriptionKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::LastMessages => f.write_str("lastMessages"),
      Self::Chat(id) => write!(f, "chat_{id}"),
    }
  }
}

/// Owned collection of cancellation handles.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
  entries: HashMap<SubscriptionKey, Subscription>,
}

impl SubscriptionRegistry {
  pub fn new() -> Self { Self::default() }

  /// Store `subscription` under `key`, cancelling whatever held the key
  /// before. The old feed is cancelled before the new one is stored.
  ///
  /// A failing cancellation of the old feed is logged; the new feed is
  /// installed regardless.
  pub fn register(&mut self, key: SubscriptionKey, subscription: Subscription) {
    if let Some(old) = self.entries.remove(&key) {
      tracing::debug!(%key, "replacing live feed");
      if let Err(e) = old.cancel() {
        tracing::warn!(%key, error = %e, "teardown of replaced feed failed");
      }
    }
    self.entries.insert(key, subscription);
  }

  /// Cancel and remove the feed under `key`. Returns `false` when nothing was
  /// registered.
  pub fn unregister(&mut self, key: &SubscriptionKey) -> Result<bool> {
    let Some(sub) = self.entries.remove(key) else {
      return Ok(false);
    };
    sub.cancel().map_err(|e| Error::Teardown {
      key:    key.to_string(),
      reason: e.to_string(),
    })?;
    tracing::debug!(%key, "feed closed");
    Ok(true)
  }

  pub fn contains(&self, key: &SubscriptionKey) -> bool {
    self.entries.contains_key(key)
  }

  /// Registered keys, sorted.
  pub fn keys(&self) -> Vec<SubscriptionKey> {
    let mut keys: Vec<_> = self.entries.keys().cloned().collect();
    keys.sort();
    keys
  }

  pub fn len(&self) -> usize { self.entries.len() }

  pub fn is_empty(&self) -> bool { self.entries.is_empty() }

  /// Cancel every feed and empty the registry. Best-effort: a failing
  /// teardown is logged and the rest still run. Returns the number of feeds
  /// that were registered.
  pub fn cleanup(&mut self) -> usize {
    let drained = std::mem::take(&mut self.entries);
    let count = drained.len();
    for (key, sub) in drained {
      if let Err(e) = sub.cancel() {
        tracing::warn!(%key, error = %e, "teardown failed during cleanup");
      }
    }
    if count > 0 {
      tracing::debug!(count, "registry cleaned up");
    }
    count
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
  };

  use super::*;

  fn counted(counter: &Arc<AtomicUsize>) -> Subscription {
    let c = counter.clone();
    Subscription::new(move || {
      c.fetch_add(1, Ordering::SeqCst);
      Ok(())
    })
  }

  fn failing() -> Subscription {
    Subscription::new(|| Err("backend went away".into()))
  }

  fn chat_key(id: &str) -> SubscriptionKey {
    SubscriptionKey::Chat(ChatId::new(id).unwrap())
  }

  #[test]
  fn keys_are_namespaced() {
    assert_eq!(SubscriptionKey::LastMessages.to_string(), "lastMessages");
    assert_eq!(chat_key("alice_bob").to_string(), "chat_alice_bob");
  }

  #[test]
  fn reregister_cancels_prior_exactly_once() {
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));
    let mut reg = SubscriptionRegistry::new();

    reg.register(chat_key("alice_bob"), counted(&first));
    reg.register(chat_key("alice_bob"), counted(&second));

    assert_eq!(first.load(Ordering::SeqCst), 1);
    assert_eq!(second.load(Ordering::SeqCst), 0);
    assert_eq!(reg.len(), 1);
  }

  #[test]
  fn cleanup_is_idempotent() {
    let counter = Arc::new(AtomicUsize::new(0));
    let mut reg = SubscriptionRegistry::new();
    reg.register(SubscriptionKey::LastMessages, counted(&counter));
    reg.register(chat_key("alice_bob"), counted(&counter));

    assert_eq!(reg.cleanup(), 2);
    assert_eq!(counter.load(Ordering::SeqCst), 2);
    assert!(reg.is_empty());

    assert_eq!(reg.cleanup(), 0);
    assert_eq!(counter.load(Ordering::SeqCst), 2);
    assert!(reg.is_empty());
  }

  #[test]
  fn cleanup_continues_past_failures() {
    let counter = Arc::new(AtomicUsize::new(0));
    let mut reg = SubscriptionRegistry::new();
    reg.register(chat_key("a_b"), failing());
    reg.register(chat_key("a_c"), counted(&counter));
    reg.register(SubscriptionKey::LastMessages, counted(&counter));

    assert_eq!(reg.cleanup(), 3);
    assert_eq!(counter.load(Ordering::SeqCst), 2);
    assert!(reg.is_empty());
  }

  #[test]
  fn unregister_surfaces_teardown_failure() {
    let mut reg = SubscriptionRegistry::new();
    reg.register(chat_key("a_b"), failing());
    let err = reg.unregister(&chat_key("a_b")).unwrap_err();
    assert!(matches!(err, Error::Teardown { ref key, .. } if key == "chat_a_b"));
    assert!(!reg.contains(&chat_key("a_b")));
  }

  #[test]
  fn unregister_missing_key_is_noop() {
    let mut reg = SubscriptionRegistry::new();
    assert!(!reg.unregister(&SubscriptionKey::LastMessages).unwrap());
  }

  #[test]
  fn keys_are_sorted() {
    let mut reg = SubscriptionRegistry::new();
    reg.register(chat_key("b_c"), Subscription::new(|| Ok(())));
    reg.register(SubscriptionKey::LastMessages, Subscription::new(|| Ok(())));
    reg.register(chat_key("a_b"), Subscription::new(|| Ok(())));
    assert_eq!(
      reg.keys(),
      vec![SubscriptionKey::LastMessages, chat_key("a_b"), chat_key("b_c")]
    );
  }
}
