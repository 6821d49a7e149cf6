//! Scheduled audit scan.
//!
//! Runs on a fixed daily cadence, independent of and non-blocking toward
//! every other flow. Reads the trailing window of the audit log and writes
//! findings to the `security_alerts` collection; it touches nothing else.

use std::collections::BTreeMap;

use cardea_core::{
  Result,
  audit::{AlertKind, AuditAction, RoleChangeSource, SecurityAlert},
  role::Role,
  store::DirectoryStore,
};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ScanConfig {
  /// How far back one scan looks.
  pub window: Duration,
  /// More role changes than this for one target inside the window raises an
  /// alert.
  pub role_change_threshold: usize,
}

impl Default for ScanConfig {
  fn default() -> Self {
    ScanConfig { window: Duration::hours(24), role_change_threshold: 3 }
  }
}

/// Run one scan pass as of `now`, returning the alerts written.
pub async fn run_audit_scan<D>(
  store: &D,
  config: &ScanConfig,
  now: DateTime<Utc>,
) -> Result<Vec<SecurityAlert>>
where
  D: DirectoryStore,
{
  let since = now - config.window;
  let entries = store.audit_entries_since(since).await?;

  let mut alerts = Vec::new();

  // Churn: many role changes for one target in one window.
  let mut changes_by_target: BTreeMap<&str, usize> = BTreeMap::new();
  for entry in &entries {
    if matches!(entry.action, AuditAction::RoleSync | AuditAction::RoleAssigned) {
      *changes_by_target.entry(entry.target_uid.as_str()).or_default() += 1;
    }
  }
  for (target, count) in changes_by_target {
    if count > config.role_change_threshold {
      alerts.push(SecurityAlert {
        alert_id:     Uuid::new_v4().to_string(),
        kind:         AlertKind::ExcessiveRoleChanges,
        target_uid:   target.to_owned(),
        detail:       format!("{count} role changes within the scan window"),
        window_start: since,
        window_end:   now,
        created_at:   now,
      });
    }
  }

  // Escalations that bypassed the callable path. Bootstrap grants are the
  // configured exception; everything else granting admin without the
  // callable as its source gets flagged for a human.
  for entry in &entries {
    let granted_admin = entry.new_role == Some(Role::Admin)
      && entry.previous_role != Some(Role::Admin);
    let attributed = matches!(
      entry.source,
      Some(RoleChangeSource::AssignRoleCall) | Some(RoleChangeSource::Bootstrap)
    );
    if granted_admin && !attributed {
      alerts.push(SecurityAlert {
        alert_id:     Uuid::new_v4().to_string(),
        kind:         AlertKind::UnattributedPrivilegeGrant,
        target_uid:   entry.target_uid.clone(),
        detail:       format!(
          "admin granted via {:?} rather than the callable mutation",
          entry.source
        ),
        window_start: since,
        window_end:   now,
        created_at:   now,
      });
    }
  }

  for alert in &alerts {
    store.insert_alert(alert).await?;
  }

  tracing::info!(
    entries = entries.len(),
    alerts = alerts.len(),
    "audit scan complete"
  );
  Ok(alerts)
}

#[cfg(test)]
mod tests {
  use cardea_core::audit::AuditLogEntry;
  use cardea_store_sqlite::SqliteStore;

  use super::*;

  async fn store() -> SqliteStore {
    SqliteStore::open_in_memory(b"test-secret").await.unwrap()
  }

  fn role_sync(uid: &str, from: Role, to: Role, at: DateTime<Utc>) -> AuditLogEntry {
    AuditLogEntry::new(AuditAction::RoleSync, uid, at)
      .with_roles(from, to)
      .with_source(RoleChangeSource::RoleFieldTrigger)
  }

  #[tokio::test]
  async fn quiet_log_produces_no_alerts() {
    let s = store().await;
    let now = Utc::now();
    s.append_audit(&AuditLogEntry::new(AuditAction::UserCreated, "uid-1", now))
      .await
      .unwrap();

    let alerts = run_audit_scan(&s, &ScanConfig::default(), now).await.unwrap();
    assert!(alerts.is_empty());
    assert!(s.alerts_since(now - Duration::hours(1)).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn churn_above_threshold_is_flagged() {
    let s = store().await;
    let now = Utc::now();
    for i in 0..4 {
      let (from, to) = if i % 2 == 0 {
        (Role::User, Role::Admin)
      } else {
        (Role::Admin, Role::User)
      };
      s.append_audit(&role_sync("uid-flappy", from, to, now - Duration::minutes(i)))
        .await
        .unwrap();
    }

    let alerts = run_audit_scan(&s, &ScanConfig::default(), now).await.unwrap();
    let churn: Vec<_> = alerts
      .iter()
      .filter(|a| a.kind == AlertKind::ExcessiveRoleChanges)
      .collect();
    assert_eq!(churn.len(), 1);
    assert_eq!(churn[0].target_uid, "uid-flappy");

    // Alerts land in the collection too.
    assert!(!s.alerts_since(now - Duration::hours(1)).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn field_trigger_escalation_is_flagged_but_callable_is_not() {
    let s = store().await;
    let now = Utc::now();

    s.append_audit(&role_sync("uid-direct", Role::User, Role::Admin, now))
      .await
      .unwrap();
    s.append_audit(
      &AuditLogEntry::new(AuditAction::RoleAssigned, "uid-blessed", now)
        .with_actor("uid-an-admin")
        .with_roles(Role::User, Role::Admin)
        .with_source(RoleChangeSource::AssignRoleCall),
    )
    .await
    .unwrap();

    let alerts = run_audit_scan(&s, &ScanConfig::default(), now).await.unwrap();
    let grants: Vec<_> = alerts
      .iter()
      .filter(|a| a.kind == AlertKind::UnattributedPrivilegeGrant)
      .collect();
    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0].target_uid, "uid-direct");
  }

  #[tokio::test]
  async fn entries_outside_the_window_are_ignored() {
    let s = store().await;
    let now = Utc::now();
    s.append_audit(&role_sync(
      "uid-old",
      Role::User,
      Role::Admin,
      now - Duration::hours(48),
    ))
    .await
    .unwrap();

    let alerts = run_audit_scan(&s, &ScanConfig::default(), now).await.unwrap();
    assert!(alerts.is_empty());
  }
}
