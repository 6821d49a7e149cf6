//! CardDocument — a published, independently addressable business card.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Tier and status ─────────────────────────────────────────────────────────

/// Subscription tier of a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
  Basic,
  Premium,
  Executive,
}

impl Category {
  /// Premium and Executive tiers carry a subscription expiry; Basic cards
  /// never expire.
  pub fn tracks_subscription(self) -> bool {
    matches!(self, Category::Premium | Category::Executive)
  }
}

/// Administrator-controlled moderation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardStatus {
  Active,
  Suspended,
  Blocked,
}

// ─── Computed account state ──────────────────────────────────────────────────

/// The one place where `status` and `subscription_expires` combine.
///
/// Consumers must never branch on `status` alone: a Premium/Executive card
/// whose subscription has lapsed is `Expired` even while its stored status
/// still says active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountState {
  Active,
  Blocked,
  Suspended,
  Expired,
}

impl AccountState {
  /// Compute the state once; precedence blocked > suspended > expired.
  pub fn of(
    status: CardStatus,
    category: Category,
    subscription_expires: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
  ) -> AccountState {
    match status {
      CardStatus::Blocked   => AccountState::Blocked,
      CardStatus::Suspended => AccountState::Suspended,
      CardStatus::Active    => {
        match subscription_expires {
          Some(expires) if category.tracks_subscription() && expires <= now => {
            AccountState::Expired
          }
          _ => AccountState::Active,
        }
      }
    }
  }

  /// Whether the public share surface may serve the card.
  pub fn is_viewable(self) -> bool {
    matches!(self, AccountState::Active)
  }
}

// ─── The card itself ─────────────────────────────────────────────────────────

/// Contact fields rendered on the card face.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CardContact {
  pub full_name: String,
  pub title:     Option<String>,
  pub company:   Option<String>,
  pub email:     Option<String>,
  pub phone:     Option<String>,
  pub website:   Option<String>,
}

/// One document per published card in the `profiles` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardDocument {
  pub card_id:   String,
  pub owner_uid: String,
  pub contact:   CardContact,
  pub category:  Category,
  pub status:    CardStatus,

  /// Expiry for Premium/Executive tiers; `None` means no expiry.
  pub subscription_expires: Option<DateTime<Utc>>,

  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl CardDocument {
  pub fn new(
    card_id: &str,
    owner_uid: &str,
    contact: CardContact,
    now: DateTime<Utc>,
  ) -> CardDocument {
    CardDocument {
      card_id:              card_id.to_owned(),
      owner_uid:            owner_uid.to_owned(),
      contact,
      category:             Category::Basic,
      status:               CardStatus::Active,
      subscription_expires: None,
      created_at:           now,
      updated_at:           now,
    }
  }

  pub fn account_state(&self, now: DateTime<Utc>) -> AccountState {
    AccountState::of(self.status, self.category, self.subscription_expires, now)
  }
}
