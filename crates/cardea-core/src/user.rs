//! UserDocument — the directory record backing a principal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{audit::RoleChangeSource, role::Role};

/// One document per principal in the `users` collection.
///
/// The `role` field is derived state: it exists so the directory can be
/// queried and filtered by role cheaply, and it chases the token claim. End
/// users never write it directly; the reconciler and the server triggers do.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDocument {
  pub uid:          String,
  pub email:        String,
  pub display_name: Option<String>,
  pub role:         Role,

  /// Ids of cards this user owns, in creation order, no duplicates.
  #[serde(default)]
  pub cards: Vec<String>,

  // Audit metadata for the most recent role write.
  pub role_updated_at:    Option<DateTime<Utc>>,
  pub role_updated_by:    Option<String>,
  pub role_update_source: Option<RoleChangeSource>,

  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl UserDocument {
  pub fn new(uid: &str, email: &str, role: Role, now: DateTime<Utc>) -> UserDocument {
    UserDocument {
      uid:                uid.to_owned(),
      email:              email.to_owned(),
      display_name:       None,
      role,
      cards:              Vec::new(),
      role_updated_at:    None,
      role_updated_by:    None,
      role_update_source: None,
      created_at:         now,
      updated_at:         now,
    }
  }

  /// Append a card reference, preserving uniqueness. Returns `false` if the
  /// id was already present.
  pub fn add_card(&mut self, card_id: &str) -> bool {
    if self.cards.iter().any(|c| c == card_id) {
      return false;
    }
    self.cards.push(card_id.to_owned());
    true
  }
}

/// Full snapshot written to `deleted_users` before any destructive delete.
/// The archive is the only durable record of a deleted account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletedUserRecord {
  pub uid:        String,
  pub snapshot:   UserDocument,
  pub deleted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn add_card_is_unique_and_ordered() {
    let now = Utc::now();
    let mut user = UserDocument::new("uid-1", "a@example.com", Role::User, now);

    assert!(user.add_card("card-a"));
    assert!(user.add_card("card-b"));
    assert!(!user.add_card("card-a"));
    assert_eq!(user.cards, vec!["card-a", "card-b"]);
  }
}
