//! Sign-up and login flows.
//!
//! Both end with a reconciliation pass so the session starts from an agreed
//! role, and both wrap the provider round-trips in the bounded backoff
//! helper — transient provider failures retry, permanent ones (duplicate
//! email, wrong password) surface immediately.

use cardea_core::{
  Result,
  audit::RoleChangeSource,
  identity::IdentityProvider,
  principal::{Claims, NewPrincipal},
  role::Role,
  store::DirectoryStore,
  user::UserDocument,
};
use chrono::Utc;

use crate::{
  reconcile::{get_role, sync_role},
  retry::{BackoffPolicy, with_backoff},
};

/// An authenticated client session.
#[derive(Debug, Clone)]
pub struct Session {
  pub uid:   String,
  pub email: String,
  pub role:  Role,
  /// The signed ID token presented on API calls.
  pub token: String,
}

/// Create a principal, pre-populate its user document, and open a session.
///
/// The document's initial role comes from the same bootstrap rule the
/// server's creation trigger applies, so the two paths can never disagree
/// on a fresh account. There is no reconciliation pass here: the claim is
/// set by the server trigger, which may not have fired yet, and running
/// `sync_role` against the not-yet-set claim would undo the pre-population.
/// The session role is still claims-derived, so until the trigger lands a
/// bootstrap administrator browses as a plain user and the next login
/// repairs nothing or everything, in one direction.
pub async fn sign_up<I, D>(
  identity: &I,
  store: &D,
  email: &str,
  password: &str,
  bootstrap_admin_email: &str,
  policy: &BackoffPolicy,
) -> Result<Session>
where
  I: IdentityProvider,
  D: DirectoryStore,
{
  let principal = with_backoff(policy, || {
    identity.create_principal(NewPrincipal {
      email:    email.to_owned(),
      password: password.to_owned(),
      claims:   Claims::default(),
    })
  })
  .await?;

  let role = Role::bootstrap(&principal.email, bootstrap_admin_email);
  if store.get_user(&principal.uid).await?.is_none() {
    let mut user =
      UserDocument::new(&principal.uid, &principal.email, role, Utc::now());
    user.role_update_source = Some(RoleChangeSource::Bootstrap);
    store.put_user(&user).await?;
  }

  open_session(identity, &principal.uid, &principal.email).await
}

/// Verify credentials and open a session.
pub async fn log_in<I, D>(
  identity: &I,
  store: &D,
  email: &str,
  password: &str,
  policy: &BackoffPolicy,
) -> Result<Session>
where
  I: IdentityProvider,
  D: DirectoryStore,
{
  let principal =
    with_backoff(policy, || identity.verify_password(email, password)).await?;

  sync_role(identity, store, &principal.uid).await?;

  open_session(identity, &principal.uid, &principal.email).await
}

async fn open_session<I>(identity: &I, uid: &str, email: &str) -> Result<Session>
where
  I: IdentityProvider,
{
  let token = identity.issue_token(uid).await?;
  let role = get_role(identity, uid).await;
  Ok(Session {
    uid: uid.to_owned(),
    email: email.to_owned(),
    role,
    token,
  })
}

#[cfg(test)]
mod tests {
  use cardea_core::Error;
  use cardea_store_sqlite::SqliteStore;

  use super::*;

  const BOOTSTRAP: &str = "admin@example.com";

  async fn store() -> SqliteStore {
    SqliteStore::open_in_memory(b"test-secret").await.unwrap()
  }

  fn policy() -> BackoffPolicy {
    BackoffPolicy {
      max_attempts: 1,
      ..BackoffPolicy::default()
    }
  }

  #[tokio::test]
  async fn sign_up_pre_populates_the_document_with_the_bootstrap_role() {
    let s = store().await;
    let session =
      sign_up(&s, &s, BOOTSTRAP, "hunter2hunter2", BOOTSTRAP, &policy())
        .await
        .unwrap();

    let user = s.get_user(&session.uid).await.unwrap().unwrap();
    assert_eq!(user.role, Role::Admin);
    assert_eq!(user.role_update_source, Some(RoleChangeSource::Bootstrap));

    // The claim is the server trigger's job; until it fires, the session
    // itself is claims-derived and therefore still a plain user.
    assert_eq!(session.role, Role::User);
  }

  #[tokio::test]
  async fn plain_sign_up_then_login_round_trip() {
    let s = store().await;
    let session = sign_up(
      &s,
      &s,
      "alice@example.com",
      "hunter2hunter2",
      BOOTSTRAP,
      &policy(),
    )
    .await
    .unwrap();
    assert_eq!(session.role, Role::User);

    let again = log_in(&s, &s, "alice@example.com", "hunter2hunter2", &policy())
      .await
      .unwrap();
    assert_eq!(again.uid, session.uid);
    assert_eq!(again.role, Role::User);
  }

  #[tokio::test]
  async fn duplicate_sign_up_is_rejected() {
    let s = store().await;
    sign_up(&s, &s, "alice@example.com", "hunter2hunter2", BOOTSTRAP, &policy())
      .await
      .unwrap();

    let err = sign_up(
      &s,
      &s,
      "alice@example.com",
      "another-password",
      BOOTSTRAP,
      &policy(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::EmailAlreadyInUse));
  }

  #[tokio::test]
  async fn login_reconciles_drift_left_by_an_offline_claim_change() {
    let s = store().await;
    let session = sign_up(
      &s,
      &s,
      "alice@example.com",
      "hunter2hunter2",
      BOOTSTRAP,
      &policy(),
    )
    .await
    .unwrap();

    // The claim changes while the client is away.
    let claims = s.principal(&session.uid).await.unwrap().unwrap().claims;
    s.set_claims(&session.uid, &claims.with_admin(true))
      .await
      .unwrap();

    let next = log_in(&s, &s, "alice@example.com", "hunter2hunter2", &policy())
      .await
      .unwrap();
    assert_eq!(next.role, Role::Admin);
    assert_eq!(
      s.get_user(&session.uid).await.unwrap().unwrap().role,
      Role::Admin
    );
  }
}
