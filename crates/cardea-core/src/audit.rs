//! Audit log entries and security alerts — append-only records.
//!
//! Entries are created only by server-side code; clients never mutate or
//! delete them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::role::Role;

// ─── Audit log ───────────────────────────────────────────────────────────────

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
  UserCreated,
  UserDeleted,
  /// The document `role` field changed and the claim was re-derived from it.
  RoleSync,
  /// The callable mutation granted or revoked a role.
  RoleAssigned,
}

/// Which code path caused a role write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleChangeSource {
  Bootstrap,
  RoleFieldTrigger,
  AssignRoleCall,
  ClientSync,
}

/// One append-only record of a role change or security-relevant event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
  pub entry_id:      String,
  pub action:        AuditAction,
  pub target_uid:    String,
  /// `None` for lifecycle triggers, which have no acting principal.
  pub actor_uid:     Option<String>,
  pub previous_role: Option<Role>,
  pub new_role:      Option<Role>,
  pub source:        Option<RoleChangeSource>,
  pub recorded_at:   DateTime<Utc>,
}

impl AuditLogEntry {
  pub fn new(
    action: AuditAction,
    target_uid: &str,
    recorded_at: DateTime<Utc>,
  ) -> AuditLogEntry {
    AuditLogEntry {
      entry_id:      Uuid::new_v4().to_string(),
      action,
      target_uid:    target_uid.to_owned(),
      actor_uid:     None,
      previous_role: None,
      new_role:      None,
      source:        None,
      recorded_at,
    }
  }

  pub fn with_actor(mut self, actor_uid: &str) -> AuditLogEntry {
    self.actor_uid = Some(actor_uid.to_owned());
    self
  }

  pub fn with_roles(mut self, previous: Role, new: Role) -> AuditLogEntry {
    self.previous_role = Some(previous);
    self.new_role = Some(new);
    self
  }

  pub fn with_source(mut self, source: RoleChangeSource) -> AuditLogEntry {
    self.source = Some(source);
    self
  }
}

// ─── Security alerts ─────────────────────────────────────────────────────────

/// What the daily scan flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
  /// More role changes for one target inside the window than the threshold.
  ExcessiveRoleChanges,
  /// A privilege grant that did not come through the callable path.
  UnattributedPrivilegeGrant,
}

/// A finding written to the `security_alerts` collection by the daily scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityAlert {
  pub alert_id:     String,
  pub kind:         AlertKind,
  pub target_uid:   String,
  pub detail:       String,
  pub window_start: DateTime<Utc>,
  pub window_end:   DateTime<Utc>,
  pub created_at:   DateTime<Utc>,
}
