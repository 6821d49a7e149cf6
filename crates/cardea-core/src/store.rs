//! The `DirectoryStore` trait and supporting record types.
//!
//! The trait is implemented by storage backends (e.g. `cardea-store-sqlite`).
//! Higher layers (`cardea-functions`, `cardea-client`, `cardea-server`)
//! depend on this abstraction, not on any concrete backend.
//!
//! Collection names (`users`, `profiles`, `audit_logs`, `deleted_users`,
//! `analytics`, `security_alerts`, `files`) are part of the contract other
//! collaborators rely on.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
  Result,
  audit::{AuditLogEntry, RoleChangeSource, SecurityAlert},
  card::CardDocument,
  role::Role,
  user::{DeletedUserRecord, UserDocument},
};

/// Maximum documents per destructive batch; each batch commits atomically.
pub const DELETE_BATCH_LIMIT: usize = 500;

// ─── Supporting record types ─────────────────────────────────────────────────

/// Per-card scan counter, kept in the `analytics` collection.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AnalyticsRecord {
  pub card_id:      String,
  pub owner_uid:    String,
  pub scan_count:   i64,
  pub last_scan_at: Option<DateTime<Utc>>,
}

/// Upload metadata reference, kept in the `files` collection. The upload
/// mechanics themselves live with the external media host; only this
/// back-reference is stored.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FileRef {
  pub file_id:    String,
  pub owner_uid:  String,
  pub url:        String,
  pub media_type: Option<String>,
  pub created_at: DateTime<Utc>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the Cardea document store.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait DirectoryStore: Send + Sync {
  // ── Users ─────────────────────────────────────────────────────────────

  /// Insert or fully replace a user document. The merge-on-create semantics
  /// of the lifecycle trigger are built on top of `get_user` + this.
  fn put_user<'a>(
    &'a self,
    user: &'a UserDocument,
  ) -> impl Future<Output = Result<()>> + Send + 'a;

  /// Retrieve a user document. Returns `None` if absent.
  fn get_user<'a>(
    &'a self,
    uid: &'a str,
  ) -> impl Future<Output = Result<Option<UserDocument>>> + Send + 'a;

  /// Overwrite the `role` field and its audit metadata, returning the
  /// previous role. Returns `None` without writing if the document is
  /// absent.
  fn set_user_role<'a>(
    &'a self,
    uid: &'a str,
    role: Role,
    actor_uid: Option<&'a str>,
    source: RoleChangeSource,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<Role>>> + Send + 'a;

  /// Append a card id to the user's `cards` list if not already present.
  fn append_card_ref<'a>(
    &'a self,
    uid: &'a str,
    card_id: &'a str,
  ) -> impl Future<Output = Result<()>> + Send + 'a;

  fn delete_user<'a>(
    &'a self,
    uid: &'a str,
  ) -> impl Future<Output = Result<()>> + Send + 'a;

  /// Write the pre-deletion snapshot to `deleted_users`.
  fn archive_user<'a>(
    &'a self,
    record: &'a DeletedUserRecord,
  ) -> impl Future<Output = Result<()>> + Send + 'a;

  // ── Cards ─────────────────────────────────────────────────────────────

  fn put_card<'a>(
    &'a self,
    card: &'a CardDocument,
  ) -> impl Future<Output = Result<()>> + Send + 'a;

  fn get_card<'a>(
    &'a self,
    card_id: &'a str,
  ) -> impl Future<Output = Result<Option<CardDocument>>> + Send + 'a;

  fn cards_for_owner<'a>(
    &'a self,
    owner_uid: &'a str,
  ) -> impl Future<Output = Result<Vec<CardDocument>>> + Send + 'a;

  /// Delete the given cards in one atomic batch. Callers chunk at
  /// [`DELETE_BATCH_LIMIT`]; a failed batch deletes none of its members.
  fn delete_cards_batch<'a>(
    &'a self,
    card_ids: &'a [String],
  ) -> impl Future<Output = Result<()>> + Send + 'a;

  // ── Analytics ─────────────────────────────────────────────────────────

  /// Increment the scan counter for a card, creating the record on first
  /// scan.
  fn record_scan<'a>(
    &'a self,
    card_id: &'a str,
    owner_uid: &'a str,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<()>> + Send + 'a;

  fn get_analytics<'a>(
    &'a self,
    card_id: &'a str,
  ) -> impl Future<Output = Result<Option<AnalyticsRecord>>> + Send + 'a;

  fn delete_analytics_for_owner<'a>(
    &'a self,
    owner_uid: &'a str,
  ) -> impl Future<Output = Result<()>> + Send + 'a;

  // ── Files ─────────────────────────────────────────────────────────────

  fn record_file<'a>(
    &'a self,
    file: &'a FileRef,
  ) -> impl Future<Output = Result<()>> + Send + 'a;

  fn delete_files_for_owner<'a>(
    &'a self,
    owner_uid: &'a str,
  ) -> impl Future<Output = Result<()>> + Send + 'a;

  // ── Audit log ─────────────────────────────────────────────────────────

  /// Append-only; there is deliberately no update or delete counterpart.
  fn append_audit<'a>(
    &'a self,
    entry: &'a AuditLogEntry,
  ) -> impl Future<Output = Result<()>> + Send + 'a;

  fn audit_entries_since(
    &self,
    since: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<AuditLogEntry>>> + Send + '_;

  // ── Security alerts ───────────────────────────────────────────────────

  fn insert_alert<'a>(
    &'a self,
    alert: &'a SecurityAlert,
  ) -> impl Future<Output = Result<()>> + Send + 'a;

  fn alerts_since(
    &self,
    since: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<SecurityAlert>>> + Send + '_;
}
