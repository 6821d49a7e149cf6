//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Structured fields (contact
//! blocks, claim sets, card-id lists, snapshots) are stored as compact JSON.

use cardea_core::{
  Error, Result,
  audit::{AlertKind, AuditAction, AuditLogEntry, RoleChangeSource, SecurityAlert},
  card::{CardDocument, CardStatus, Category},
  principal::{Claims, Principal},
  role::Role,
  store::{AnalyticsRecord, FileRef},
  user::{DeletedUserRecord, UserDocument},
};
use chrono::{DateTime, Utc};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Corrupt(format!("bad timestamp {s:?}: {e}")))
}

pub fn decode_dt_opt(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
  s.map(decode_dt).transpose()
}

// ─── Role ────────────────────────────────────────────────────────────────────

pub fn encode_role(r: Role) -> &'static str { r.as_str() }

pub fn decode_role(s: &str) -> Result<Role> {
  match s {
    "user"  => Ok(Role::User),
    "admin" => Ok(Role::Admin),
    other   => Err(Error::Corrupt(format!("unknown role: {other:?}"))),
  }
}

// ─── Card enums ──────────────────────────────────────────────────────────────

pub fn encode_category(c: Category) -> &'static str {
  match c {
    Category::Basic     => "basic",
    Category::Premium   => "premium",
    Category::Executive => "executive",
  }
}

pub fn decode_category(s: &str) -> Result<Category> {
  match s {
    "basic"     => Ok(Category::Basic),
    "premium"   => Ok(Category::Premium),
    "executive" => Ok(Category::Executive),
    other       => Err(Error::Corrupt(format!("unknown category: {other:?}"))),
  }
}

pub fn encode_status(s: CardStatus) -> &'static str {
  match s {
    CardStatus::Active    => "active",
    CardStatus::Suspended => "suspended",
    CardStatus::Blocked   => "blocked",
  }
}

pub fn decode_status(s: &str) -> Result<CardStatus> {
  match s {
    "active"    => Ok(CardStatus::Active),
    "suspended" => Ok(CardStatus::Suspended),
    "blocked"   => Ok(CardStatus::Blocked),
    other       => Err(Error::Corrupt(format!("unknown status: {other:?}"))),
  }
}

// ─── Audit enums ─────────────────────────────────────────────────────────────

pub fn encode_action(a: AuditAction) -> &'static str {
  match a {
    AuditAction::UserCreated  => "user_created",
    AuditAction::UserDeleted  => "user_deleted",
    AuditAction::RoleSync     => "role_sync",
    AuditAction::RoleAssigned => "role_assigned",
  }
}

pub fn decode_action(s: &str) -> Result<AuditAction> {
  match s {
    "user_created"  => Ok(AuditAction::UserCreated),
    "user_deleted"  => Ok(AuditAction::UserDeleted),
    "role_sync"     => Ok(AuditAction::RoleSync),
    "role_assigned" => Ok(AuditAction::RoleAssigned),
    other           => Err(Error::Corrupt(format!("unknown action: {other:?}"))),
  }
}

pub fn encode_source(s: RoleChangeSource) -> &'static str {
  match s {
    RoleChangeSource::Bootstrap        => "bootstrap",
    RoleChangeSource::RoleFieldTrigger => "role_field_trigger",
    RoleChangeSource::AssignRoleCall   => "assign_role_call",
    RoleChangeSource::ClientSync       => "client_sync",
  }
}

pub fn decode_source(s: &str) -> Result<RoleChangeSource> {
  match s {
    "bootstrap"          => Ok(RoleChangeSource::Bootstrap),
    "role_field_trigger" => Ok(RoleChangeSource::RoleFieldTrigger),
    "assign_role_call"   => Ok(RoleChangeSource::AssignRoleCall),
    "client_sync"        => Ok(RoleChangeSource::ClientSync),
    other                => Err(Error::Corrupt(format!("unknown source: {other:?}"))),
  }
}

pub fn encode_alert_kind(k: AlertKind) -> &'static str {
  match k {
    AlertKind::ExcessiveRoleChanges       => "excessive_role_changes",
    AlertKind::UnattributedPrivilegeGrant => "unattributed_privilege_grant",
  }
}

pub fn decode_alert_kind(s: &str) -> Result<AlertKind> {
  match s {
    "excessive_role_changes"       => Ok(AlertKind::ExcessiveRoleChanges),
    "unattributed_privilege_grant" => Ok(AlertKind::UnattributedPrivilegeGrant),
    other => Err(Error::Corrupt(format!("unknown alert kind: {other:?}"))),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `users` row.
pub struct RawUser {
  pub uid:                String,
  pub email:              String,
  pub display_name:       Option<String>,
  pub role:               String,
  pub cards_json:         String,
  pub role_updated_at:    Option<String>,
  pub role_updated_by:    Option<String>,
  pub role_update_source: Option<String>,
  pub created_at:         String,
  pub updated_at:         String,
}

impl RawUser {
  pub fn into_user(self) -> Result<UserDocument> {
    Ok(UserDocument {
      uid:                self.uid,
      email:              self.email,
      display_name:       self.display_name,
      role:               decode_role(&self.role)?,
      cards:              serde_json::from_str(&self.cards_json)?,
      role_updated_at:    decode_dt_opt(self.role_updated_at.as_deref())?,
      role_updated_by:    self.role_updated_by,
      role_update_source: self
        .role_update_source
        .as_deref()
        .map(decode_source)
        .transpose()?,
      created_at:         decode_dt(&self.created_at)?,
      updated_at:         decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings read directly from a `profiles` row.
pub struct RawCard {
  pub card_id:              String,
  pub owner_uid:            String,
  pub contact_json:         String,
  pub category:             String,
  pub status:               String,
  pub subscription_expires: Option<String>,
  pub created_at:           String,
  pub updated_at:           String,
}

impl RawCard {
  pub fn into_card(self) -> Result<CardDocument> {
    Ok(CardDocument {
      card_id:              self.card_id,
      owner_uid:            self.owner_uid,
      contact:              serde_json::from_str(&self.contact_json)?,
      category:             decode_category(&self.category)?,
      status:               decode_status(&self.status)?,
      subscription_expires: decode_dt_opt(self.subscription_expires.as_deref())?,
      created_at:           decode_dt(&self.created_at)?,
      updated_at:           decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings read directly from a `principals` row.
pub struct RawPrincipal {
  pub uid:         String,
  pub email:       String,
  pub claims_json: String,
  pub created_at:  String,
}

impl RawPrincipal {
  pub fn into_principal(self) -> Result<Principal> {
    let claims: Claims = serde_json::from_str(&self.claims_json)?;
    Ok(Principal {
      uid:        self.uid,
      email:      self.email,
      claims,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from an `audit_logs` row.
pub struct RawAudit {
  pub entry_id:      String,
  pub action:        String,
  pub target_uid:    String,
  pub actor_uid:     Option<String>,
  pub previous_role: Option<String>,
  pub new_role:      Option<String>,
  pub source:        Option<String>,
  pub recorded_at:   String,
}

impl RawAudit {
  pub fn into_entry(self) -> Result<AuditLogEntry> {
    Ok(AuditLogEntry {
      entry_id:      self.entry_id,
      action:        decode_action(&self.action)?,
      target_uid:    self.target_uid,
      actor_uid:     self.actor_uid,
      previous_role: self.previous_role.as_deref().map(decode_role).transpose()?,
      new_role:      self.new_role.as_deref().map(decode_role).transpose()?,
      source:        self.source.as_deref().map(decode_source).transpose()?,
      recorded_at:   decode_dt(&self.recorded_at)?,
    })
  }
}

/// Raw strings read directly from a `security_alerts` row.
pub struct RawAlert {
  pub alert_id:     String,
  pub kind:         String,
  pub target_uid:   String,
  pub detail:       String,
  pub window_start: String,
  pub window_end:   String,
  pub created_at:   String,
}

impl RawAlert {
  pub fn into_alert(self) -> Result<SecurityAlert> {
    Ok(SecurityAlert {
      alert_id:     self.alert_id,
      kind:         decode_alert_kind(&self.kind)?,
      target_uid:   self.target_uid,
      detail:       self.detail,
      window_start: decode_dt(&self.window_start)?,
      window_end:   decode_dt(&self.window_end)?,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from an `analytics` row.
pub struct RawAnalytics {
  pub card_id:      String,
  pub owner_uid:    String,
  pub scan_count:   i64,
  pub last_scan_at: Option<String>,
}

impl RawAnalytics {
  pub fn into_record(self) -> Result<AnalyticsRecord> {
    Ok(AnalyticsRecord {
      card_id:      self.card_id,
      owner_uid:    self.owner_uid,
      scan_count:   self.scan_count,
      last_scan_at: decode_dt_opt(self.last_scan_at.as_deref())?,
    })
  }
}

/// Raw strings read directly from a `deleted_users` row.
pub struct RawDeletedUser {
  pub uid:           String,
  pub snapshot_json: String,
  pub deleted_at:    String,
}

impl RawDeletedUser {
  pub fn into_record(self) -> Result<DeletedUserRecord> {
    Ok(DeletedUserRecord {
      uid:        self.uid,
      snapshot:   serde_json::from_str(&self.snapshot_json)?,
      deleted_at: decode_dt(&self.deleted_at)?,
    })
  }
}

/// Raw strings read directly from a `files` row.
pub struct RawFile {
  pub file_id:    String,
  pub owner_uid:  String,
  pub url:        String,
  pub media_type: Option<String>,
  pub created_at: String,
}

impl RawFile {
  pub fn into_file(self) -> Result<FileRef> {
    Ok(FileRef {
      file_id:    self.file_id,
      owner_uid:  self.owner_uid,
      url:        self.url,
      media_type: self.media_type,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}
