//! Users and departments.
//!
//! Both are owned by external collaborators (registration, department
//! administration). This crate only reads them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Access level of a user.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  #[default]
  User,
  Admin,
  Superadmin,
}

impl Role {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::User => "user",
      Self::Admin => "admin",
      Self::Superadmin => "superadmin",
    }
  }
}

/// A registered user. `email` is the stable identity used everywhere else;
/// `department` and `role` may change over time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub user_id:    Uuid,
  pub email:      String,
  /// Current department name; empty when the user has not been assigned one.
  pub department: String,
  pub role:       Role,
}

impl User {
  /// The profile department, or `None` when unassigned.
  pub fn department(&self) -> Option<&str> {
    let d = self.department.trim();
    (!d.is_empty()).then_some(d)
  }
}

/// A department, referenced everywhere by its unique name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Department {
  pub name: String,
}
