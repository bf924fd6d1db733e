//! Per-user chat session: the chat-list feed, open conversations, and the
//! registry that owns their live feeds.
//!
//! Every feed is opened with the same protocol: a one-shot load, delivery of
//! its result to the caller, and only then the live feed. Callers therefore
//! always receive a full result set first and can treat every later callback
//! as a replacement of that set.

use std::{sync::Arc, time::Duration};

use crate::{
  message::{ChatId, Message, NewMessage},
  registry::{SubscriptionKey, SubscriptionRegistry},
  store::{ChangeHandler, FeedQuery, MessagingStore},
  visibility::{resolve_contacts, ContactList, VisibilityPolicy},
  Error, Result,
};

/// Tunables for a [`ChatSession`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionConfig {
  /// Deadline for each one-shot load. `None` waits indefinitely.
  pub load_timeout: Option<Duration>,
  pub visibility:   VisibilityPolicy,
}

/// Messaging state for one signed-in user.
///
/// All registry mutation goes through `&mut self`, so the registry is never
/// observed half-updated. Dropping the session cancels every live feed.
pub struct ChatSession<S: MessagingStore> {
  store:      Arc<S>,
  user_email: String,
  config:     SessionConfig,
  registry:   SubscriptionRegistry,
}

impl<S: MessagingStore> ChatSession<S> {
  pub fn new(
    store: Arc<S>,
    user_email: impl Into<String>,
    config: SessionConfig,
  ) -> Self {
    Self {
      store,
      user_email: user_email.into(),
      config,
      registry: SubscriptionRegistry::new(),
    }
  }

  pub fn user_email(&self) -> &str { &self.user_email }

  // ── Contacts ────────────────────────────────────────────────────────────

  /// Resolve who this user may message.
  pub async fn contacts(&self) -> Result<ContactList> {
    resolve_contacts(&*self.store, &self.user_email, self.config.visibility)
      .await
  }

  // ── Feeds ───────────────────────────────────────────────────────────────

  /// Load, then subscribe to, every message this user takes part in (newest
  /// first). Replaces any previous chat-list feed.
  pub async fn subscribe_chat_list(
    &mut self,
    on_change: ChangeHandler,
  ) -> Result<()> {
    let query = FeedQuery::Participant(self.user_email.clone());
    self
      .load_then_watch(SubscriptionKey::LastMessages, query, on_change)
      .await
  }

  /// Load, then subscribe to, one conversation (oldest first). Re-opening a
  /// chat that is already open replaces its feed.
  pub async fn open_conversation(
    &mut self,
    chat_id: ChatId,
    on_change: ChangeHandler,
  ) -> Result<()> {
    let key = SubscriptionKey::Chat(chat_id.clone());
    self
      .load_then_watch(key, FeedQuery::Chat(chat_id), on_change)
      .await
  }

  /// [`Self::open_conversation`] for the chat with `other_email`.
  pub async fn open_conversation_with(
    &mut self,
    other_email: &str,
    on_change: ChangeHandler,
  ) -> Result<ChatId> {
    let chat_id = ChatId::for_pair(&self.user_email, other_email)?;
    self.open_conversation(chat_id.clone(), on_change).await?;
    Ok(chat_id)
  }

  /// Tear down a conversation's feed. Returns `false` if it was not open.
  pub fn close_conversation(&mut self, chat_id: &ChatId) -> Result<bool> {
    self
      .registry
      .unregister(&SubscriptionKey::Chat(chat_id.clone()))
  }

  /// Tear down the chat-list feed.
  pub fn unsubscribe_chat_list(&mut self) -> Result<bool> {
    self.registry.unregister(&SubscriptionKey::LastMessages)
  }

  pub fn is_subscribed(&self, key: &SubscriptionKey) -> bool {
    self.registry.contains(key)
  }

  pub fn active_keys(&self) -> Vec<SubscriptionKey> { self.registry.keys() }

  /// Tear down every feed. Safe to call repeatedly.
  pub fn cleanup(&mut self) -> usize { self.registry.cleanup() }

  // ── Writes ──────────────────────────────────────────────────────────────

  /// Append a message from this user. The message is not echoed locally;
  /// it arrives through the live feeds like any other.
  pub async fn send(
    &self,
    recipient_email: &str,
    body: impl Into<String>,
  ) -> Result<Message> {
    let input = NewMessage::new(self.user_email.clone(), recipient_email, body);
    // Reject self-addressed messages before touching the store.
    input.chat_id()?;
    self
      .store
      .append_message(input)
      .await
      .map_err(Error::store_write)
  }

  // ── Internals ───────────────────────────────────────────────────────────

  async fn load_then_watch(
    &mut self,
    key: SubscriptionKey,
    query: FeedQuery,
    on_change: ChangeHandler,
  ) -> Result<()> {
    let initial = self.load(&query).await?;
    tracing::debug!(%key, count = initial.len(), "one-shot load settled");
    on_change(initial);

    let subscription = self
      .store
      .watch(query, on_change)
      .map_err(Error::subscription_establish)?;
    self.registry.register(key.clone(), subscription);
    tracing::debug!(%key, "live feed attached");
    Ok(())
  }

  async fn load(&self, query: &FeedQuery) -> Result<Vec<Message>> {
    let read = self.store.query_feed(query);
    let result = match self.config.load_timeout {
      Some(limit) => tokio::time::timeout(limit, read)
        .await
        .map_err(|_| Error::LoadTimeout(query.to_string()))?,
      None => read.await,
    };
    result.map_err(Error::store_read)
  }
}
