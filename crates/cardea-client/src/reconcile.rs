//! Role reconciliation — claims are the authority, the document chases.
//!
//! Exactly one direction of correction is permitted here: claim → document.
//! The reverse path exists only as the server's privileged mutation. This
//! keeps reconciliation single-writer-wins with no conflict resolution
//! beyond "authoritative source wins".

use cardea_core::{
  Result, audit::RoleChangeSource, identity::IdentityProvider, role::Role,
  store::DirectoryStore,
};
use chrono::Utc;

/// Force a token refresh and read the claims-derived role.
async fn fresh_role<I>(identity: &I, uid: &str) -> Result<Role>
where
  I: IdentityProvider,
{
  let token = identity.issue_token(uid).await?;
  let decoded = identity.verify_token(&token).await?;
  Ok(decoded.role())
}

/// The role the principal's current claims grant.
///
/// Fails closed: any provider error is swallowed and `user` is returned.
/// Privileged surfaces stay hidden when the provider is unreachable.
pub async fn get_role<I>(identity: &I, uid: &str) -> Role
where
  I: IdentityProvider,
{
  match fresh_role(identity, uid).await {
    Ok(role) => role,
    Err(e) => {
      tracing::warn!(uid, error = %e, "role lookup failed; failing closed");
      Role::User
    }
  }
}

/// Boolean form of [`get_role`], same contract.
pub async fn is_admin<I>(identity: &I, uid: &str) -> bool
where
  I: IdentityProvider,
{
  get_role(identity, uid).await.is_admin()
}

/// Detect and correct drift between the claim and the document field.
///
/// No-ops if the user document does not exist. Writes exactly once when a
/// mismatch is found; the repaired drift is logged for audit and never
/// surfaced to the end user.
pub async fn sync_role<I, D>(identity: &I, store: &D, uid: &str) -> Result<()>
where
  I: IdentityProvider,
  D: DirectoryStore,
{
  let claim_role = fresh_role(identity, uid).await?;

  let Some(user) = store.get_user(uid).await? else {
    return Ok(());
  };

  if user.role != claim_role {
    tracing::warn!(
      uid,
      document = %user.role,
      claim = %claim_role,
      "role drift detected; overwriting document from claim"
    );
    store
      .set_user_role(uid, claim_role, None, RoleChangeSource::ClientSync, Utc::now())
      .await?;
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use cardea_core::{
    principal::{Claims, NewPrincipal, Principal},
    token::IdToken,
    user::UserDocument,
  };
  use cardea_functions::on_create;
  use cardea_store_sqlite::SqliteStore;

  use super::*;

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

  #[tokio::test]
  async fn get_role_reflects_the_claim_without_a_document() {
    let s = store().await;
    let p = s
      .create_principal(NewPrincipal {
        email:    BOOTSTRAP.into(),
        password: "hunter2hunter2".into(),
        claims:   Claims::admin(),
      })
      .await
      .unwrap();

    // No user document exists yet; the claim alone decides.
    assert!(s.get_user(&p.uid).await.unwrap().is_none());
    assert_eq!(get_role(&s, &p.uid).await, Role::Admin);
    assert!(is_admin(&s, &p.uid).await);
  }

  #[tokio::test]
  async fn sync_role_repairs_a_stale_document() {
    let s = store().await;
    let p = signup(&s, "alice@example.com").await;

    // Claim flips out-of-band; the document is now stale.
    let claims = s.principal(&p.uid).await.unwrap().unwrap().claims;
    s.set_claims(&p.uid, &claims.with_admin(true)).await.unwrap();
    assert_eq!(s.get_user(&p.uid).await.unwrap().unwrap().role, Role::User);

    sync_role(&s, &s, &p.uid).await.unwrap();

    let user = s.get_user(&p.uid).await.unwrap().unwrap();
    assert_eq!(user.role, Role::Admin);
    assert_eq!(user.role_update_source, Some(RoleChangeSource::ClientSync));
  }

  #[tokio::test]
  async fn sync_role_is_quiet_when_stores_agree() {
    let s = store().await;
    let p = signup(&s, "alice@example.com").await;

    sync_role(&s, &s, &p.uid).await.unwrap();

    let user = s.get_user(&p.uid).await.unwrap().unwrap();
    assert_eq!(user.role, Role::User);
    // The one repair write never happened: the sync source is untouched.
    assert_ne!(user.role_update_source, Some(RoleChangeSource::ClientSync));
  }

  #[tokio::test]
  async fn sync_role_noops_without_a_document() {
    let s = store().await;
    let p = s
      .create_principal(NewPrincipal {
        email:    "alice@example.com".into(),
        password: "hunter2hunter2".into(),
        claims:   Claims::default(),
      })
      .await
      .unwrap();

    sync_role(&s, &s, &p.uid).await.unwrap();
    assert!(s.get_user(&p.uid).await.unwrap().is_none());
  }

  /// An identity provider that is down hard.
  struct DownIdentity;

  impl IdentityProvider for DownIdentity {
    async fn create_principal(&self, _: NewPrincipal) -> Result<Principal> {
      Err(cardea_core::Error::external_msg("provider down"))
    }
    async fn principal(&self, _: &str) -> Result<Option<Principal>> {
      Err(cardea_core::Error::external_msg("provider down"))
    }
    async fn principal_by_email(&self, _: &str) -> Result<Option<Principal>> {
      Err(cardea_core::Error::external_msg("provider down"))
    }
    async fn verify_password(&self, _: &str, _: &str) -> Result<Principal> {
      Err(cardea_core::Error::external_msg("provider down"))
    }
    async fn set_claims(&self, _: &str, _: &Claims) -> Result<()> {
      Err(cardea_core::Error::external_msg("provider down"))
    }
    async fn issue_token(&self, _: &str) -> Result<String> {
      Err(cardea_core::Error::external_msg("provider down"))
    }
    async fn verify_token(&self, _: &str) -> Result<IdToken> {
      Err(cardea_core::Error::external_msg("provider down"))
    }
    async fn delete_principal(&self, _: &str) -> Result<()> {
      Err(cardea_core::Error::external_msg("provider down"))
    }
  }

  #[tokio::test]
  async fn get_role_fails_closed_when_the_provider_is_down() {
    assert_eq!(get_role(&DownIdentity, "uid-1234567890").await, Role::User);
    assert!(!is_admin(&DownIdentity, "uid-1234567890").await);
  }

  #[tokio::test]
  async fn sync_role_surfaces_provider_errors() {
    // Unlike get_role, sync_role reports failure: its caller decides whether
    // to retry, and a silent skip would leave drift in place unnoticed.
    let s = store().await;
    s.put_user(&UserDocument::new(
      "uid-1234567890",
      "alice@example.com",
      Role::User,
      Utc::now(),
    ))
    .await
    .unwrap();

    assert!(sync_role(&DownIdentity, &s, "uid-1234567890").await.is_err());
  }
}
