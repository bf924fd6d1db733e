//! Contact visibility: who a user may message, and why.
//!
//! Visibility is the union of four independently derived candidate sets
//! (see [`VisibilityReason`]), minus the requesting user and excluded roles.
//! The relation is symmetric: every reason has a mirror reason on the other
//! side, and every user's department is computed by the same rule.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::{
  event::{EventRecord, EventRef},
  graph::TaggingIndex,
  message::Message,
  store::MessagingStore,
  user::{Role, User},
  Error, Result,
};

// ─── Reasons ─────────────────────────────────────────────────────────────────

/// Why a contact is visible. A contact keeps every reason it qualifies for.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
  Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VisibilityReason {
  /// Same department as the requester, or in a department the requester's
  /// events tagged.
  DepartmentPeer,
  /// Authored an event tagging the requester's department.
  TaggedMe,
  /// In a department tagged by an event the requester authored.
  #[serde(rename = "I_TAGGED_DEPARTMENT")]
  ITaggedDepartment,
  /// Has exchanged at least one message with the requester.
  Messaged,
}

// ─── Policy ──────────────────────────────────────────────────────────────────

/// Role-based exclusions applied after the candidate union.
///
/// Admins are always excluded. Whether superadmins are excluded too is a
/// deployment decision; the default keeps them visible.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityPolicy {
  #[serde(default)]
  pub exclude_superadmin: bool,
}

impl VisibilityPolicy {
  pub fn excludes(&self, role: Role) -> bool {
    match role {
      Role::Admin => true,
      Role::Superadmin => self.exclude_superadmin,
      Role::User => false,
    }
  }
}

// ─── Output ──────────────────────────────────────────────────────────────────

/// A visible user together with the provenance of its visibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
  pub user:           User,
  pub reasons:        BTreeSet<VisibilityReason>,
  /// Events this contact authored that tagged the requester's department.
  pub tagged_events:  Vec<EventRef>,
  /// Events the requester authored that tagged this contact's department.
  pub tagging_events: Vec<EventRef>,
}

/// The resolved contact list, ordered by email.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactList {
  pub users: Vec<Contact>,
}

impl ContactList {
  pub fn len(&self) -> usize { self.users.len() }

  pub fn is_empty(&self) -> bool { self.users.is_empty() }

  pub fn get(&self, email: &str) -> Option<&Contact> {
    self.users.iter().find(|c| c.user.email == email)
  }

  pub fn contains(&self, email: &str) -> bool { self.get(email).is_some() }

  /// Reason codes per contact email.
  pub fn reasons(&self) -> BTreeMap<&str, &BTreeSet<VisibilityReason>> {
    self
      .users
      .iter()
      .map(|c| (c.user.email.as_str(), &c.reasons))
      .collect()
  }
}

// ─── Resolution ──────────────────────────────────────────────────────────────

/// Resolve `current_email`'s contacts from an in-memory snapshot.
///
/// `messages` may contain unrelated messages; only those involving
/// `current_email` count. Users are deduplicated by email (first record
/// wins). Emails that appear only in events or messages, with no user
/// record, are not returned.
pub fn resolve(
  current_email: &str,
  events: &[EventRecord],
  users: &[User],
  messages: &[Message],
  policy: VisibilityPolicy,
) -> ContactList {
  let index = TaggingIndex::build(events);

  let me = users.iter().find(|u| u.email == current_email);
  let my_dept = index.department_of(current_email, me.and_then(User::department));
  let empty = BTreeSet::new();
  let my_tagged = index
    .departments_tagged_by_user(current_email)
    .unwrap_or(&empty);
  let tagged_me = my_dept
    .and_then(|d| index.taggers_of(d))
    .unwrap_or(&empty);

  let messaged: HashSet<&str> = messages
    .iter()
    .filter_map(|m| m.counterpart(current_email))
    .collect();

  let mut out: BTreeMap<&str, Contact> = BTreeMap::new();

  for user in users {
    let email = user.email.as_str();
    if email == current_email || out.contains_key(email) {
      continue;
    }

    let dept = index.department_of(email, user.department());
    let mut reasons = BTreeSet::new();

    if let Some(d) = dept {
      if my_dept == Some(d) || my_tagged.contains(d) {
        reasons.insert(VisibilityReason::DepartmentPeer);
      }
      if my_tagged.contains(d) {
        reasons.insert(VisibilityReason::ITaggedDepartment);
      }
    }
    if tagged_me.contains(email) {
      reasons.insert(VisibilityReason::TaggedMe);
    }
    if messaged.contains(email) {
      reasons.insert(VisibilityReason::Messaged);
    }

    if reasons.is_empty() {
      continue;
    }
    if policy.excludes(user.role) {
      tracing::trace!(%email, role = user.role.as_str(), "excluded by role");
      continue;
    }

    let tagged_events = my_dept
      .map(|d| index.edges_between(email, d).map(|e| e.event_ref()).collect())
      .unwrap_or_default();
    let tagging_events = dept
      .map(|d| {
        index
          .edges_between(current_email, d)
          .map(|e| e.event_ref())
          .collect()
      })
      .unwrap_or_default();

    out.insert(email, Contact {
      user: user.clone(),
      reasons,
      tagged_events,
      tagging_events,
    });
  }

  tracing::debug!(
    user = %current_email,
    department = ?my_dept,
    contacts = out.len(),
    "resolved contacts"
  );

  ContactList { users: out.into_values().collect() }
}

/// Fetch a fresh snapshot from `store` and resolve `current_email`'s
/// contacts.
///
/// The three reads run concurrently. If any of them fails, the whole
/// resolution fails; a partial list is never produced.
pub async fn resolve_contacts<S>(
  store: &S,
  current_email: &str,
  policy: VisibilityPolicy,
) -> Result<ContactList>
where
  S: MessagingStore,
{
  let (events, users, messages) = tokio::try_join!(
    async { store.query_events().await.map_err(Error::store_read) },
    async { store.query_users().await.map_err(Error::store_read) },
    async {
      store
        .query_messages_by_participant(current_email)
        .await
        .map_err(Error::store_read)
    },
  )?;

  Ok(resolve(current_email, &events, &users, &messages, policy))
}
