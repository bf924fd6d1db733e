//! Event records and the tagging edges derived from them.
//!
//! An event submission names the departments whose action it requires. Each
//! (event, tagged department) pair is a directed tagging edge from the
//! author to that department. Edges are derived on read and never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One entry of an event's tagged-department requirements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedRequirement {
  pub department_name: String,
  /// Free-text description of what is requested from the department.
  #[serde(default)]
  pub note:            Option<String>,
}

/// A submitted event. Read-only to this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
  pub event_id:          Uuid,
  pub title:             String,
  pub author_email:      String,
  /// The author's department at submission time.
  pub author_department: String,
  pub tagged:            Vec<TaggedRequirement>,
  pub created_at:        DateTime<Utc>,
}

/// Directed relation: `from_user_email` (in `from_department` when the event
/// was created) requested action from `to_department` via `event_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggingEdge {
  pub from_user_email: String,
  pub from_department: String,
  pub to_department:   String,
  pub event_id:        Uuid,
  pub event_title:     String,
  pub timestamp:       DateTime<Utc>,
}

impl TaggingEdge {
  pub fn event_ref(&self) -> EventRef {
    EventRef {
      event_id:    self.event_id,
      event_title: self.event_title.clone(),
      timestamp:   self.timestamp,
    }
  }
}

/// Provenance entry attached to a resolved contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRef {
  pub event_id:    Uuid,
  pub event_title: String,
  pub timestamp:   DateTime<Utc>,
}
