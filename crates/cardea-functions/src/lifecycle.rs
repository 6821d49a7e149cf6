//! Lifecycle triggers — the server-authoritative half of role reconciliation.
//!
//! Each trigger fires on a principal or document event with no caller
//! waiting for a response, and no retry contract from the event source.
//! Raising would simply drop the event, so every trigger logs failures and
//! returns normally.

use cardea_core::{
  Result,
  audit::{AuditAction, AuditLogEntry, RoleChangeSource},
  identity::IdentityProvider,
  principal::Principal,
  role::Role,
  store::{DELETE_BATCH_LIMIT, DirectoryStore},
  user::{DeletedUserRecord, UserDocument},
};
use chrono::Utc;

// ─── on_create ───────────────────────────────────────────────────────────────

/// Principal-created trigger: set the bootstrap claim and merge-write the
/// matching user document.
///
/// Idempotent — re-running on the same principal converges to the same end
/// state and appends no duplicate audit entries.
pub async fn on_create<D, I>(
  store: &D,
  identity: &I,
  principal: &Principal,
  bootstrap_admin_email: &str,
) where
  D: DirectoryStore,
  I: IdentityProvider,
{
  if let Err(e) = run_on_create(store, identity, principal, bootstrap_admin_email).await {
    tracing::error!(uid = %principal.uid, error = %e, "user-created trigger failed");
  }
}

async fn run_on_create<D, I>(
  store: &D,
  identity: &I,
  principal: &Principal,
  bootstrap_admin_email: &str,
) -> Result<()>
where
  D: DirectoryStore,
  I: IdentityProvider,
{
  let role = Role::bootstrap(&principal.email, bootstrap_admin_email);
  let now = Utc::now();

  // Claim first: it is the writer-of-record the document chases.
  let current = identity
    .principal(&principal.uid)
    .await?
    .map(|p| p.claims)
    .unwrap_or_default();
  identity
    .set_claims(&principal.uid, &current.with_admin(role.is_admin()))
    .await?;

  match store.get_user(&principal.uid).await? {
    Some(mut existing) => {
      // Re-delivered event: realign the role field if needed, nothing else.
      if existing.role != role {
        existing.role = role;
        existing.updated_at = now;
        store.put_user(&existing).await?;
      }
    }
    None => {
      let mut user = UserDocument::new(&principal.uid, &principal.email, role, now);
      user.role_updated_at = Some(now);
      user.role_update_source = Some(RoleChangeSource::Bootstrap);
      store.put_user(&user).await?;

      let entry = AuditLogEntry::new(AuditAction::UserCreated, &principal.uid, now)
        .with_roles(role, role)
        .with_source(RoleChangeSource::Bootstrap);
      store.append_audit(&entry).await?;
    }
  }

  tracing::info!(uid = %principal.uid, role = %role, "user created");
  Ok(())
}

// ─── on_delete ───────────────────────────────────────────────────────────────

/// Principal-deleted trigger: archive, then destroy.
///
/// The archive is attempted before anything destructive because deletion is
/// irreversible and the snapshot is the only durable record. A failed card
/// batch or analytics delete is logged and does not roll the archive back.
pub async fn on_delete<D>(store: &D, principal: &Principal)
where
  D: DirectoryStore,
{
  let uid = principal.uid.as_str();
  let now = Utc::now();

  match store.get_user(uid).await {
    Ok(Some(user)) => {
      let record = DeletedUserRecord {
        uid:        uid.to_owned(),
        snapshot:   user,
        deleted_at: now,
      };
      if let Err(e) = store.archive_user(&record).await {
        tracing::error!(uid, error = %e, "archive failed; continuing with deletes");
      }
    }
    Ok(None) => {
      tracing::warn!(uid, "no user document to archive");
    }
    Err(e) => {
      tracing::error!(uid, error = %e, "could not read user document for archive");
    }
  }

  let card_ids: Vec<String> = match store.cards_for_owner(uid).await {
    Ok(cards) => cards.into_iter().map(|c| c.card_id).collect(),
    Err(e) => {
      tracing::error!(uid, error = %e, "could not list cards for deletion");
      Vec::new()
    }
  };

  for chunk in card_ids.chunks(DELETE_BATCH_LIMIT) {
    if let Err(e) = store.delete_cards_batch(chunk).await {
      tracing::error!(uid, batch = chunk.len(), error = %e, "card batch delete failed");
    }
  }

  if let Err(e) = store.delete_analytics_for_owner(uid).await {
    tracing::error!(uid, error = %e, "analytics delete failed");
  }
  if let Err(e) = store.delete_files_for_owner(uid).await {
    tracing::error!(uid, error = %e, "file metadata delete failed");
  }
  if let Err(e) = store.delete_user(uid).await {
    tracing::error!(uid, error = %e, "user document delete failed");
  }

  let entry = AuditLogEntry::new(AuditAction::UserDeleted, uid, now);
  if let Err(e) = store.append_audit(&entry).await {
    tracing::error!(uid, error = %e, "audit append failed");
  }

  tracing::info!(uid, cards = card_ids.len(), "user deleted");
}

// ─── on_role_field_update ────────────────────────────────────────────────────

/// Document-update trigger, fired when a user document changes.
///
/// This is where a direct edit of the `role` field actually grants or
/// revokes privilege: the claim is re-derived from the document and merged
/// into the existing claim set without clobbering unrelated claims.
pub async fn on_role_field_update<D, I>(
  store: &D,
  identity: &I,
  before: &UserDocument,
  after: &UserDocument,
) where
  D: DirectoryStore,
  I: IdentityProvider,
{
  if before.role == after.role {
    return;
  }
  if let Err(e) = run_role_field_update(store, identity, before, after).await {
    tracing::error!(uid = %after.uid, error = %e, "role-sync trigger failed");
  }
}

async fn run_role_field_update<D, I>(
  store: &D,
  identity: &I,
  before: &UserDocument,
  after: &UserDocument,
) -> Result<()>
where
  D: DirectoryStore,
  I: IdentityProvider,
{
  let uid = after.uid.as_str();
  let now = Utc::now();

  let Some(principal) = identity.principal(uid).await? else {
    tracing::warn!(uid, "role changed for a principal that no longer exists");
    return Ok(());
  };

  identity
    .set_claims(uid, &principal.claims.with_admin(after.role.is_admin()))
    .await?;

  let entry = AuditLogEntry::new(AuditAction::RoleSync, uid, now)
    .with_roles(before.role, after.role)
    .with_source(RoleChangeSource::RoleFieldTrigger);
  store.append_audit(&entry).await?;

  tracing::info!(
    uid,
    previous = %before.role,
    new = %after.role,
    "claim re-derived from role field"
  );
  Ok(())
}

// ─── Tests ───────────────────────────────────────────────────────────────────
