//! Messages and chat identity.
//!
//! A chat is never stored on its own. It is the set of messages sharing a
//! [`ChatId`], and the id is derived from the unordered participant pair so
//! either side computes it without coordination.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── ChatId ──────────────────────────────────────────────────────────────────

/// Separator placed between the two sorted participant emails.
pub const CHAT_ID_SEPARATOR: char = '_';

/// Identifier of a two-party conversation.
#[derive(
  Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ChatId(String);

impl ChatId {
  /// Canonical id for a participant pair: both emails sorted by byte order
  /// and joined with [`CHAT_ID_SEPARATOR`]. Argument order does not matter.
  ///
  /// The separator may also occur inside an address, so an id alone does not
  /// always determine its pair: `("a@x", "y_b@z")` and `("a@x_y", "b@z")`
  /// both yield `a@x_y_b@z`. Underscores in domain names are not valid
  /// hostnames, and with underscores confined to local parts the id is
  /// unambiguous. Stored messages also carry `participants`, which remain
  /// authoritative.
  pub fn for_pair(a: &str, b: &str) -> Result<Self> {
    let [lo, hi] = sorted_pair(a, b)?;
    Ok(Self(format!("{lo}{CHAT_ID_SEPARATOR}{hi}")))
  }

  /// Wrap an id received from elsewhere (a URL, a stored row). The id is
  /// opaque here; only emptiness is rejected.
  pub fn new(raw: impl Into<String>) -> Result<Self> {
    let raw = raw.into();
    if raw.trim().is_empty() {
      return Err(Error::InvalidChatId(raw));
    }
    Ok(Self(raw))
  }

  pub fn as_str(&self) -> &str { &self.0 }

  /// The participant other than `email`, when this is the canonical id of a
  /// chat `email` takes part in.
  pub fn other_participant(&self, email: &str) -> Option<&str> {
    let id = self.0.as_str();
    if let Some(hi) = id
      .strip_prefix(email)
      .and_then(|rest| rest.strip_prefix(CHAT_ID_SEPARATOR))
      && email < hi
    {
      return Some(hi);
    }
    id.strip_suffix(email)
      .and_then(|rest| rest.strip_suffix(CHAT_ID_SEPARATOR))
      .filter(|lo| *lo < email)
  }
}

impl fmt::Display for ChatId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Order two distinct emails; identical emails cannot form a chat.
fn sorted_pair(a: &str, b: &str) -> Result<[String; 2]> {
  if a == b {
    return Err(Error::InvalidParticipants(a.to_owned()));
  }
  let (lo, hi) = if a < b { (a, b) } else { (b, a) };
  Ok([lo.to_owned(), hi.to_owned()])
}

// ─── Message ─────────────────────────────────────────────────────────────────

/// A single immutable chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
  pub message_id:   Uuid,
  pub chat_id:      ChatId,
  /// Exactly two distinct emails, sorted.
  pub participants: [String; 2],
  pub body:         String,
  pub sender_email: String,
  /// Server-assigned; never set by clients.
  pub sent_at:      DateTime<Utc>,
}

impl Message {
  pub fn involves(&self, email: &str) -> bool {
    self.participants.iter().any(|p| p == email)
  }

  /// The participant that is not `email`, if `email` takes part at all.
  pub fn counterpart(&self, email: &str) -> Option<&str> {
    match &self.participants {
      [a, b] if a == email => Some(b),
      [a, b] if b == email => Some(a),
      _ => None,
    }
  }
}

/// Input to [`crate::store::MessagingStore::append_message`]. The store
/// assigns the id and timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
  pub sender_email:    String,
  pub recipient_email: String,
  pub body:            String,
}

impl NewMessage {
  pub fn new(
    sender_email: impl Into<String>,
    recipient_email: impl Into<String>,
    body: impl Into<String>,
  ) -> Self {
    Self {
      sender_email:    sender_email.into(),
      recipient_email: recipient_email.into(),
      body:            body.into(),
    }
  }

  pub fn chat_id(&self) -> Result<ChatId> {
    ChatId::for_pair(&self.sender_email, &self.recipient_email)
  }

  /// Sorted participant pair, consistent with [`Self::chat_id`].
  pub fn participants(&self) -> Result<[String; 2]> {
    sorted_pair(&self.sender_email, &self.recipient_email)
  }

  /// Build the stored message. Fails when sender and recipient coincide.
  pub fn into_message(
    self,
    message_id: Uuid,
    sent_at: DateTime<Utc>,
  ) -> Result<Message> {
    let chat_id = self.chat_id()?;
    let participants = self.participants()?;
    Ok(Message {
      message_id,
      chat_id,
      participants,
      body: self.body,
      sender_email: self.sender_email,
      sent_at,
    })
  }
}

// ─── Chat-list reduction ─────────────────────────────────────────────────────

/// Reduce an aggregate feed (newest first) to one preview per chat, keeping
/// the feed order.
pub fn latest_per_chat(messages: &[Message]) -> Vec<Message> {
  let mut seen = std::collections::HashSet::new();
  messages
    .iter()
    .filter(|m| seen.insert(m.chat_id.clone()))
    .cloned()
    .collect()
}
