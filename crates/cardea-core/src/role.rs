//! Role — the two-valued privilege level carried in both stores.
//!
//! The signed token claim is the writer-of-record; the directory document's
//! `role` field is a queryable copy that chases it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  User,
  Admin,
}

impl Role {
  /// The bootstrap rule: the single configured address becomes the first
  /// administrator; everyone else starts as a plain user.
  ///
  /// This must be the only place the rule lives — the client creation path
  /// and the server `on_create` trigger both call it, so they can never
  /// disagree on a fresh principal.
  pub fn bootstrap(email: &str, bootstrap_admin_email: &str) -> Role {
    if email.eq_ignore_ascii_case(bootstrap_admin_email) {
      Role::Admin
    } else {
      Role::User
    }
  }

  pub fn from_admin_flag(admin: bool) -> Role {
    if admin { Role::Admin } else { Role::User }
  }

  pub fn is_admin(self) -> bool { matches!(self, Role::Admin) }

  pub fn as_str(self) -> &'static str {
    match self {
      Role::User  => "user",
      Role::Admin => "admin",
    }
  }
}

impl std::fmt::Display for Role {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

impl std::str::FromStr for Role {
  type Err = crate::Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "user"  => Ok(Role::User),
      "admin" => Ok(Role::Admin),
      other   => Err(crate::Error::InvalidArgument(format!(
        "unknown role: {other:?}"
      ))),
    }
  }
}
