//! Principal — an identity-provider record and its custom claims.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::role::Role;

// ─── Claims ──────────────────────────────────────────────────────────────────

/// The custom claim set embedded in a principal's signed ID token.
///
/// `admin` is the only claim Cardea itself interprets. Everything else rides
/// along in `extra` and must survive every claim update untouched — claim
/// writers merge into the existing set, they never replace it wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
  #[serde(default)]
  pub admin: bool,

  #[serde(flatten)]
  pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Claims {
  pub fn admin() -> Claims {
    Claims { admin: true, ..Claims::default() }
  }

  /// The role this claim set grants.
  pub fn role(&self) -> Role {
    Role::from_admin_flag(self.admin)
  }

  /// Return a copy with `admin` updated and every unrelated claim preserved.
  pub fn with_admin(&self, admin: bool) -> Claims {
    Claims { admin, extra: self.extra.clone() }
  }
}

// ─── Principal ───────────────────────────────────────────────────────────────

/// An authenticated identity managed by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
  pub uid:        String,
  pub email:      String,
  pub claims:     Claims,
  pub created_at: DateTime<Utc>,
}

/// Input for [`IdentityProvider::create_principal`](crate::identity::IdentityProvider::create_principal).
#[derive(Debug, Clone)]
pub struct NewPrincipal {
  pub email:    String,
  pub password: String,
  pub claims:   Claims,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn with_admin_preserves_unrelated_claims() {
    let mut claims = Claims::default();
    claims
      .extra
      .insert("beta_tester".into(), serde_json::json!(true));
    claims.extra.insert("plan".into(), serde_json::json!("pro"));

    let updated = claims.with_admin(true);
    assert!(updated.admin);
    assert_eq!(updated.extra, claims.extra);

    let reverted = updated.with_admin(false);
    assert!(!reverted.admin);
    assert_eq!(reverted.extra, claims.extra);
  }

  #[test]
  fn claims_flatten_round_trip() {
    let json = serde_json::json!({ "admin": true, "plan": "pro" });
    let claims: Claims = serde_json::from_value(json.clone()).unwrap();
    assert!(claims.admin);
    assert_eq!(claims.extra["plan"], "pro");
    assert_eq!(serde_json::to_value(&claims).unwrap(), json);
  }

  #[test]
  fn missing_admin_key_defaults_to_user() {
    let claims: Claims = serde_json::from_str("{}").unwrap();
    assert_eq!(claims.role(), crate::role::Role::User);
  }
}
