//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microsecond
//! precision, `Z` suffix) so that lexical order equals chronological order.
//! Tagged requirements are stored as compact JSON. UUIDs are stored as
//! hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, Utc};
use parley_core::{
  event::{EventRecord, TaggedRequirement},
  message::{ChatId, Message},
  user::{Role, User},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Role ────────────────────────────────────────────────────────────────────

pub fn encode_role(r: Role) -> &'static str { r.as_str() }

pub fn decode_role(s: &str) -> Result<Role> {
  match s {
    "user" => Ok(Role::User),
    "admin" => Ok(Role::Admin),
    "superadmin" => Ok(Role::Superadmin),
    other => Err(Error::UnknownRole(other.to_owned())),
  }
}

// ─── Tagged requirements ─────────────────────────────────────────────────────

pub fn encode_tagged(tagged: &[TaggedRequirement]) -> Result<String> {
  Ok(serde_json::to_string(tagged)?)
}

pub fn decode_tagged(s: &str) -> Result<Vec<TaggedRequirement>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `users` row.
pub struct RawUser {
  pub user_id:    String,
  pub email:      String,
  pub department: String,
  pub role:       String,
}

impl RawUser {
  pub fn into_user(self) -> Result<User> {
    Ok(User {
      user_id:    decode_uuid(&self.user_id)?,
      email:      self.email,
      department: self.department,
      role:       decode_role(&self.role)?,
    })
  }
}

/// Raw strings read directly from an `events` row.
pub struct RawEvent {
  pub event_id:          String,
  pub title:             String,
  pub author_email:      String,
  pub author_department: String,
  pub tagged:            String,
  pub created_at:        String,
}

impl RawEvent {
  pub fn into_event(self) -> Result<EventRecord> {
    Ok(EventRecord {
      event_id:          decode_uuid(&self.event_id)?,
      title:             self.title,
      author_email:      self.author_email,
      author_department: self.author_department,
      tagged:            decode_tagged(&self.tagged)?,
      created_at:        decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `messages` row.
pub struct RawMessage {
  pub message_id:    String,
  pub chat_id:       String,
  pub participant_a: String,
  pub participant_b: String,
  pub body:          String,
  pub sender_email:  String,
  pub sent_at:       String,
}

impl RawMessage {
  pub fn into_message(self) -> Result<Message> {
    Ok(Message {
      message_id:   decode_uuid(&self.message_id)?,
      chat_id:      ChatId::new(self.chat_id)?,
      participants: [self.participant_a, self.participant_b],
      body:         self.body,
      sender_email: self.sender_email,
      sent_at:      decode_dt(&self.sent_at)?,
    })
  }
}
