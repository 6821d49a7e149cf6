//! The externally callable "assign role" mutation.
//!
//! The only function a client can invoke directly, and the only sanctioned
//! path for changing someone else's privilege. Check order matters and is
//! covered by tests: shape validation is pure and runs first, the rate
//! limiter is the first stateful check, then authentication, then a fresh
//! privilege lookup, then target existence. Nothing mutates until every
//! check has passed.

use cardea_core::{
  Error, Result,
  audit::{AuditAction, AuditLogEntry, RoleChangeSource},
  identity::IdentityProvider,
  role::Role,
  store::DirectoryStore,
  user::UserDocument,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::ratelimit::RateLimiter;

/// Minimum length of a target uid. Real provider uids are well past this;
/// anything shorter is a malformed request, not a missing principal.
pub const MIN_UID_LEN: usize = 10;

// ─── Request / response ──────────────────────────────────────────────────────

/// Raw request body. Fields are optional so that shape violations surface as
/// `invalid-argument` rather than as a transport-level decode failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssignRoleRequest {
  #[serde(default)]
  pub uid: Option<String>,

  #[serde(default, rename = "isAdmin")]
  pub is_admin: Option<bool>,
}

impl AssignRoleRequest {
  fn validate(self) -> Result<(String, bool)> {
    let uid = self
      .uid
      .ok_or_else(|| Error::InvalidArgument("uid is required".into()))?;
    if uid.len() < MIN_UID_LEN {
      return Err(Error::InvalidArgument(format!(
        "uid must be at least {MIN_UID_LEN} characters"
      )));
    }
    let is_admin = self
      .is_admin
      .ok_or_else(|| Error::InvalidArgument("isAdmin is required".into()))?;
    Ok((uid, is_admin))
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct AssignRoleResponse {
  pub success: bool,
}

/// Per-call context the transport layer supplies.
#[derive(Debug, Clone)]
pub struct CallContext {
  /// Caller network origin — the rate-limit key.
  pub origin: String,
  /// Verified uid from the presented token, if any. Privilege is NOT taken
  /// from here; it is re-read from the provider below.
  pub caller_uid: Option<String>,
}

// ─── The callable ────────────────────────────────────────────────────────────

pub async fn assign_role<D, I>(
  store: &D,
  identity: &I,
  limiter: &RateLimiter,
  ctx: &CallContext,
  req: AssignRoleRequest,
) -> Result<AssignRoleResponse>
where
  D: DirectoryStore,
  I: IdentityProvider,
{
  // Shape first: a malformed request must not consume rate-limit budget.
  let (target_uid, is_admin) = req.validate()?;

  limiter.check(&ctx.origin)?;

  let caller_uid = ctx.caller_uid.as_deref().ok_or(Error::Unauthenticated)?;

  // Fresh lookup — the presented token may predate a revocation.
  let caller = identity
    .principal(caller_uid)
    .await?
    .ok_or(Error::Unauthenticated)?;
  if !caller.claims.admin {
    tracing::warn!(caller = caller_uid, "non-admin attempted role assignment");
    return Err(Error::PermissionDenied);
  }

  let target = identity
    .principal(&target_uid)
    .await?
    .ok_or_else(|| Error::NotFound(format!("no principal with uid {target_uid}")))?;

  // All checks passed; a caller is waiting, so failures from here on are
  // logged and re-thrown rather than swallowed.
  apply(store, identity, caller_uid, &target, is_admin)
    .await
    .map_err(|e| {
      tracing::error!(
        caller = caller_uid,
        target = %target.uid,
        error = %e,
        "role assignment failed mid-flight"
      );
      e
    })
}

async fn apply<D, I>(
  store: &D,
  identity: &I,
  caller_uid: &str,
  target: &cardea_core::principal::Principal,
  is_admin: bool,
) -> Result<AssignRoleResponse>
where
  D: DirectoryStore,
  I: IdentityProvider,
{
  let role = Role::from_admin_flag(is_admin);
  let now = Utc::now();

  identity
    .set_claims(&target.uid, &target.claims.with_admin(is_admin))
    .await?;

  let previous = match store
    .set_user_role(
      &target.uid,
      role,
      Some(caller_uid),
      RoleChangeSource::AssignRoleCall,
      now,
    )
    .await?
  {
    Some(prev) => prev,
    None => {
      // No document yet (creation trigger lost the race or was dropped):
      // merge-create it the way on_create would have.
      let mut doc = UserDocument::new(&target.uid, &target.email, role, now);
      doc.role_updated_at = Some(now);
      doc.role_updated_by = Some(caller_uid.to_owned());
      doc.role_update_source = Some(RoleChangeSource::AssignRoleCall);
      store.put_user(&doc).await?;
      target.claims.role()
    }
  };

  let entry = AuditLogEntry::new(AuditAction::RoleAssigned, &target.uid, now)
    .with_actor(caller_uid)
    .with_roles(previous, role)
    .with_source(RoleChangeSource::AssignRoleCall);
  store.append_audit(&entry).await?;

  tracing::info!(
    caller = caller_uid,
    target = %target.uid,
    role = %role,
    "role assigned"
  );
  Ok(AssignRoleResponse { success: true })
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use cardea_core::{
    identity::IdentityProvider,
    principal::{Claims, NewPrincipal, Principal},
    store::DirectoryStore,
  };
  use cardea_store_sqlite::SqliteStore;
  use chrono::Duration;

  use super::*;
  use crate::{lifecycle::on_create, ratelimit::RateLimitConfig};

  const BOOTSTRAP: &str = "admin@example.com";

  async fn store() -> SqliteStore {
    SqliteStore::open_in_memory(b"test-secret").await.unwrap()
  }

  async fn signup(s: &SqliteStore, email: &str) -> Principal {
    let principal = s
      .create_principal(NewPrincipal {
        email:    email.into(),
        password: "hunter2hunter2".into(),
        claims:   Claims::default(),
      })
      .await
      .unwrap();
    on_create(s, s, &principal, BOOTSTRAP).await;
    principal
  }

  fn limiter() -> RateLimiter {
    RateLimiter::new(RateLimitConfig::default())
  }

  fn ctx(caller: Option<&str>) -> CallContext {
    CallContext {
      origin:     "10.0.0.1".into(),
      caller_uid: caller.map(str::to_owned),
    }
  }

  fn req(uid: &str, is_admin: bool) -> AssignRoleRequest {
    AssignRoleRequest { uid: Some(uid.into()), is_admin: Some(is_admin) }
  }

  #[tokio::test]
  async fn admin_can_promote_a_user() {
    let s = store().await;
    let admin = signup(&s, BOOTSTRAP).await;
    let alice = signup(&s, "alice@example.com").await;
    let since = Utc::now() - Duration::minutes(1);

    let resp = assign_role(
      &s,
      &s,
      &limiter(),
      &ctx(Some(&admin.uid)),
      req(&alice.uid, true),
    )
    .await
    .unwrap();
    assert!(resp.success);

    // Both stores agree afterwards.
    assert!(s.principal(&alice.uid).await.unwrap().unwrap().claims.admin);
    assert_eq!(
      s.get_user(&alice.uid).await.unwrap().unwrap().role,
      Role::Admin
    );

    let assigned: Vec<_> = s
      .audit_entries_since(since)
      .await
      .unwrap()
      .into_iter()
      .filter(|e| e.action == AuditAction::RoleAssigned)
      .collect();
    assert_eq!(assigned.len(), 1);
    assert_eq!(assigned[0].actor_uid.as_deref(), Some(admin.uid.as_str()));
  }

  #[tokio::test]
  async fn non_admin_caller_is_rejected_without_side_effects() {
    let s = store().await;
    let _admin = signup(&s, BOOTSTRAP).await;
    let alice = signup(&s, "alice@example.com").await;
    let bob = signup(&s, "bob@example.com").await;

    let err = assign_role(
      &s,
      &s,
      &limiter(),
      &ctx(Some(&bob.uid)),
      req(&alice.uid, true),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::PermissionDenied));

    // Nothing moved.
    assert!(!s.principal(&alice.uid).await.unwrap().unwrap().claims.admin);
    assert_eq!(
      s.get_user(&alice.uid).await.unwrap().unwrap().role,
      Role::User
    );
  }

  #[tokio::test]
  async fn missing_token_is_unauthenticated() {
    let s = store().await;
    let alice = signup(&s, "alice@example.com").await;

    let err = assign_role(&s, &s, &limiter(), &ctx(None), req(&alice.uid, true))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Unauthenticated));
  }

  #[tokio::test]
  async fn short_uid_rejects_before_the_rate_counter_moves() {
    let s = store().await;
    let admin = signup(&s, BOOTSTRAP).await;
    let limiter = RateLimiter::new(RateLimitConfig {
      max_calls: 1,
      window:    std::time::Duration::from_secs(60),
    });
    let ctx = ctx(Some(&admin.uid));

    let err = assign_role(&s, &s, &limiter, &ctx, req("short", true))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));

    // The budget of one call is still available: validation never counted.
    assert!(limiter.check(&ctx.origin).is_ok());
  }

  #[tokio::test]
  async fn missing_fields_are_invalid_arguments() {
    let s = store().await;
    let admin = signup(&s, BOOTSTRAP).await;

    let no_uid = AssignRoleRequest { uid: None, is_admin: Some(true) };
    let err = assign_role(&s, &s, &limiter(), &ctx(Some(&admin.uid)), no_uid)
      .await
      .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));

    let no_flag = AssignRoleRequest {
      uid:      Some("uid-1234567890".into()),
      is_admin: None,
    };
    let err = assign_role(&s, &s, &limiter(), &ctx(Some(&admin.uid)), no_flag)
      .await
      .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
  }

  #[tokio::test]
  async fn unknown_target_is_not_found() {
    let s = store().await;
    let admin = signup(&s, BOOTSTRAP).await;

    let err = assign_role(
      &s,
      &s,
      &limiter(),
      &ctx(Some(&admin.uid)),
      req("no-such-principal-uid", true),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
  }

  #[tokio::test]
  async fn thirty_first_call_in_a_minute_is_resource_exhausted() {
    let s = store().await;
    let admin = signup(&s, BOOTSTRAP).await;
    let alice = signup(&s, "alice@example.com").await;
    let limiter = limiter();
    let ctx = ctx(Some(&admin.uid));

    for _ in 0..30 {
      assign_role(&s, &s, &limiter, &ctx, req(&alice.uid, true))
        .await
        .unwrap();
    }
    let err = assign_role(&s, &s, &limiter, &ctx, req(&alice.uid, true))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::ResourceExhausted { .. }));
  }

  #[tokio::test]
  async fn privilege_is_read_fresh_not_from_the_call_context() {
    let s = store().await;
    let admin = signup(&s, BOOTSTRAP).await;
    let alice = signup(&s, "alice@example.com").await;

    // Revoke the admin's own claim out-of-band after "authentication".
    let current = s.principal(&admin.uid).await.unwrap().unwrap().claims;
    s.set_claims(&admin.uid, &current.with_admin(false))
      .await
      .unwrap();

    let err = assign_role(
      &s,
      &s,
      &limiter(),
      &ctx(Some(&admin.uid)),
      req(&alice.uid, true),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::PermissionDenied));
  }

  #[tokio::test]
  async fn demotion_preserves_unrelated_claims() {
    let s = store().await;
    let admin = signup(&s, BOOTSTRAP).await;
    let alice = signup(&s, "alice@example.com").await;

    let mut claims = s.principal(&alice.uid).await.unwrap().unwrap().claims;
    claims.extra.insert("plan".into(), serde_json::json!("pro"));
    s.set_claims(&alice.uid, &claims).await.unwrap();

    assign_role(
      &s,
      &s,
      &limiter(),
      &ctx(Some(&admin.uid)),
      req(&alice.uid, true),
    )
    .await
    .unwrap();
    assign_role(
      &s,
      &s,
      &limiter(),
      &ctx(Some(&admin.uid)),
      req(&alice.uid, false),
    )
    .await
    .unwrap();

    let final_claims = s.principal(&alice.uid).await.unwrap().unwrap().claims;
    assert!(!final_claims.admin);
    assert_eq!(final_claims.extra["plan"], "pro");
    assert_eq!(
      s.get_user(&alice.uid).await.unwrap().unwrap().role,
      Role::User
    );
  }
}
