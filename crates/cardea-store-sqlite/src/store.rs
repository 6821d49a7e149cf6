//! [`SqliteStore`] — the SQLite implementation of [`DirectoryStore`] and
//! [`IdentityProvider`].

use std::path::Path;

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
  password_hash::SaltString,
};
use cardea_core::{
  Error, Result,
  audit::{AuditLogEntry, RoleChangeSource, SecurityAlert},
  card::CardDocument,
  identity::IdentityProvider,
  principal::{Claims, NewPrincipal, Principal},
  role::Role,
  store::{AnalyticsRecord, DirectoryStore, FileRef},
  token::{DEFAULT_TTL_SECS, IdToken, TokenKeys},
  user::{DeletedUserRecord, UserDocument},
};
use chrono::{DateTime, Utc};
use rand_core::OsRng;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use crate::{
  encode::{
    RawAlert, RawAnalytics, RawAudit, RawCard, RawDeletedUser, RawFile,
    RawPrincipal, RawUser, encode_action, encode_alert_kind, encode_category,
    encode_dt, encode_role, encode_source, encode_status,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Cardea directory + identity backend in a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
  keys: TokenKeys,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  /// `token_secret` signs the ID tokens this backend mints.
  pub async fn open(path: impl AsRef<Path>, token_secret: &[u8]) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path)
      .await
      .map_err(Error::external)?;
    let store = Self { conn, keys: TokenKeys::from_secret(token_secret) };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory(token_secret: &[u8]) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory()
      .await
      .map_err(Error::external)?;
    let store = Self { conn, keys: TokenKeys::from_secret(token_secret) };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await
      .map_err(Error::external)
  }

  /// Read back an archived snapshot. Not part of the trait — used by tests
  /// and support tooling only.
  pub async fn get_archived(&self, uid: &str) -> Result<Option<DeletedUserRecord>> {
    let uid = uid.to_owned();
    let raw: Option<RawDeletedUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT uid, snapshot_json, deleted_at FROM deleted_users WHERE uid = ?1",
              rusqlite::params![uid],
              |row| {
                Ok(RawDeletedUser {
                  uid:           row.get(0)?,
                  snapshot_json: row.get(1)?,
                  deleted_at:    row.get(2)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await
      .map_err(Error::external)?;

    raw.map(RawDeletedUser::into_record).transpose()
  }

  /// All file references owned by `owner_uid`.
  pub async fn files_for_owner(&self, owner_uid: &str) -> Result<Vec<FileRef>> {
    let owner = owner_uid.to_owned();
    let raws: Vec<RawFile> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT file_id, owner_uid, url, media_type, created_at
             FROM files WHERE owner_uid = ?1 ORDER BY created_at",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![owner], |row| {
            Ok(RawFile {
              file_id:    row.get(0)?,
              owner_uid:  row.get(1)?,
              url:        row.get(2)?,
              media_type: row.get(3)?,
              created_at: row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(Error::external)?;

    raws.into_iter().map(RawFile::into_file).collect()
  }
}

// ─── DirectoryStore impl ─────────────────────────────────────────────────────

impl DirectoryStore for SqliteStore {
  // ── Users ─────────────────────────────────────────────────────────────

  async fn put_user(&self, user: &UserDocument) -> Result<()> {
    let uid          = user.uid.clone();
    let email        = user.email.clone();
    let display_name = user.display_name.clone();
    let role         = encode_role(user.role).to_owned();
    let cards_json   = serde_json::to_string(&user.cards)?;
    let rua          = user.role_updated_at.map(encode_dt);
    let rub          = user.role_updated_by.clone();
    let rus          = user.role_update_source.map(|s| encode_source(s).to_owned());
    let created_at   = encode_dt(user.created_at);
    let updated_at   = encode_dt(user.updated_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO users (
             uid, email, display_name, role, cards_json,
             role_updated_at, role_updated_by, role_update_source,
             created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
          rusqlite::params![
            uid, email, display_name, role, cards_json, rua, rub, rus,
            created_at, updated_at,
          ],
        )?;
        Ok(())
      })
      .await
      .map_err(Error::external)
  }

  async fn get_user(&self, uid: &str) -> Result<Option<UserDocument>> {
    let uid = uid.to_owned();
    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT uid, email, display_name, role, cards_json,
                      role_updated_at, role_updated_by, role_update_source,
                      created_at, updated_at
                 FROM users WHERE uid = ?1",
              rusqlite::params![uid],
              |row| {
                Ok(RawUser {
                  uid:                row.get(0)?,
                  email:              row.get(1)?,
                  display_name:       row.get(2)?,
                  role:               row.get(3)?,
                  cards_json:         row.get(4)?,
                  role_updated_at:    row.get(5)?,
                  role_updated_by:    row.get(6)?,
                  role_update_source: row.get(7)?,
                  created_at:         row.get(8)?,
                  updated_at:         row.get(9)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await
      .map_err(Error::external)?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn set_user_role(
    &self,
    uid: &str,
    role: Role,
    actor_uid: Option<&str>,
    source: RoleChangeSource,
    at: DateTime<Utc>,
  ) -> Result<Option<Role>> {
    let uid      = uid.to_owned();
    let role_str = encode_role(role).to_owned();
    let actor    = actor_uid.map(str::to_owned);
    let src      = encode_source(source).to_owned();
    let at_str   = encode_dt(at);

    let prev: Option<String> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let prev: Option<String> = tx
          .query_row(
            "SELECT role FROM users WHERE uid = ?1",
            rusqlite::params![uid],
            |r| r.get(0),
          )
          .optional()?;

        if prev.is_some() {
          tx.execute(
            "UPDATE users
                SET role = ?2, role_updated_at = ?3, role_updated_by = ?4,
                    role_update_source = ?5, updated_at = ?3
              WHERE uid = ?1",
            rusqlite::params![uid, role_str, at_str, actor, src],
          )?;
        }
        tx.commit()?;
        Ok(prev)
      })
      .await
      .map_err(Error::external)?;

    prev
      .as_deref()
      .map(crate::encode::decode_role)
      .transpose()
  }

  async fn append_card_ref(&self, uid: &str, card_id: &str) -> Result<()> {
    let user = self
      .get_user(uid)
      .await?
      .ok_or_else(|| Error::NotFound(format!("user {uid}")))?;

    if user.cards.iter().any(|c| c == card_id) {
      return Ok(());
    }

    let mut cards = user.cards;
    cards.push(card_id.to_owned());
    let cards_json = serde_json::to_string(&cards)?;
    let uid        = uid.to_owned();
    let at_str     = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE users SET cards_json = ?2, updated_at = ?3 WHERE uid = ?1",
          rusqlite::params![uid, cards_json, at_str],
        )?;
        Ok(())
      })
      .await
      .map_err(Error::external)
  }

  async fn delete_user(&self, uid: &str) -> Result<()> {
    let uid = uid.to_owned();
    self
      .conn
      .call(move |conn| {
        conn.execute("DELETE FROM users WHERE uid = ?1", rusqlite::params![uid])?;
        Ok(())
      })
      .await
      .map_err(Error::external)
  }

  async fn archive_user(&self, record: &DeletedUserRecord) -> Result<()> {
    let uid           = record.uid.clone();
    let snapshot_json = serde_json::to_string(&record.snapshot)?;
    let deleted_at    = encode_dt(record.deleted_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO deleted_users (uid, snapshot_json, deleted_at)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![uid, snapshot_json, deleted_at],
        )?;
        Ok(())
      })
      .await
      .map_err(Error::external)
  }

  // ── Cards ─────────────────────────────────────────────────────────────

  async fn put_card(&self, card: &CardDocument) -> Result<()> {
    let card_id      = card.card_id.clone();
    let owner_uid    = card.owner_uid.clone();
    let contact_json = serde_json::to_string(&card.contact)?;
    let category     = encode_category(card.category).to_owned();
    let status       = encode_status(card.status).to_owned();
    let expires      = card.subscription_expires.map(encode_dt);
    let created_at   = encode_dt(card.created_at);
    let updated_at   = encode_dt(card.updated_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO profiles (
             card_id, owner_uid, contact_json, category, status,
             subscription_expires, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            card_id, owner_uid, contact_json, category, status, expires,
            created_at, updated_at,
          ],
        )?;
        Ok(())
      })
      .await
      .map_err(Error::external)
  }

  async fn get_card(&self, card_id: &str) -> Result<Option<CardDocument>> {
    let card_id = card_id.to_owned();
    let raw: Option<RawCard> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT card_id, owner_uid, contact_json, category, status,
                      subscription_expires, created_at, updated_at
                 FROM profiles WHERE card_id = ?1",
              rusqlite::params![card_id],
              |row| {
                Ok(RawCard {
                  card_id:              row.get(0)?,
                  owner_uid:            row.get(1)?,
                  contact_json:         row.get(2)?,
                  category:             row.get(3)?,
                  status:               row.get(4)?,
                  subscription_expires: row.get(5)?,
                  created_at:           row.get(6)?,
                  updated_at:           row.get(7)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await
      .map_err(Error::external)?;

    raw.map(RawCard::into_card).transpose()
  }

  async fn cards_for_owner(&self, owner_uid: &str) -> Result<Vec<CardDocument>> {
    let owner = owner_uid.to_owned();
    let raws: Vec<RawCard> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT card_id, owner_uid, contact_json, category, status,
                  subscription_expires, created_at, updated_at
             FROM profiles WHERE owner_uid = ?1 ORDER BY created_at",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![owner], |row| {
            Ok(RawCard {
              card_id:              row.get(0)?,
              owner_uid:            row.get(1)?,
              contact_json:         row.get(2)?,
              category:             row.get(3)?,
              status:               row.get(4)?,
              subscription_expires: row.get(5)?,
              created_at:           row.get(6)?,
              updated_at:           row.get(7)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(Error::external)?;

    raws.into_iter().map(RawCard::into_card).collect()
  }

  async fn delete_cards_batch(&self, card_ids: &[String]) -> Result<()> {
    let ids = card_ids.to_vec();
    self
      .conn
      .call(move |conn| {
        // One transaction per batch: either every member goes or none does.
        let tx = conn.transaction()?;
        for id in &ids {
          tx.execute(
            "DELETE FROM profiles WHERE card_id = ?1",
            rusqlite::params![id],
          )?;
        }
        tx.commit()?;
        Ok(())
      })
      .await
      .map_err(Error::external)
  }

  // ── Analytics ─────────────────────────────────────────────────────────

  async fn record_scan(
    &self,
    card_id: &str,
    owner_uid: &str,
    at: DateTime<Utc>,
  ) -> Result<()> {
    let card_id = card_id.to_owned();
    let owner   = owner_uid.to_owned();
    let at_str  = encode_dt(at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO analytics (card_id, owner_uid, scan_count, last_scan_at)
           VALUES (?1, ?2, 1, ?3)
           ON CONFLICT(card_id) DO UPDATE SET
             scan_count   = scan_count + 1,
             last_scan_at = excluded.last_scan_at",
          rusqlite::params![card_id, owner, at_str],
        )?;
        Ok(())
      })
      .await
      .map_err(Error::external)
  }

  async fn get_analytics(&self, card_id: &str) -> Result<Option<AnalyticsRecord>> {
    let card_id = card_id.to_owned();
    let raw: Option<RawAnalytics> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT card_id, owner_uid, scan_count, last_scan_at
                 FROM analytics WHERE card_id = ?1",
              rusqlite::params![card_id],
              |row| {
                Ok(RawAnalytics {
                  card_id:      row.get(0)?,
                  owner_uid:    row.get(1)?,
                  scan_count:   row.get(2)?,
                  last_scan_at: row.get(3)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await
      .map_err(Error::external)?;

    raw.map(RawAnalytics::into_record).transpose()
  }

  async fn delete_analytics_for_owner(&self, owner_uid: &str) -> Result<()> {
    let owner = owner_uid.to_owned();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM analytics WHERE owner_uid = ?1",
          rusqlite::params![owner],
        )?;
        Ok(())
      })
      .await
      .map_err(Error::external)
  }

  // ── Files ─────────────────────────────────────────────────────────────

  async fn record_file(&self, file: &FileRef) -> Result<()> {
    let file_id    = file.file_id.clone();
    let owner      = file.owner_uid.clone();
    let url        = file.url.clone();
    let media_type = file.media_type.clone();
    let created_at = encode_dt(file.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO files (file_id, owner_uid, url, media_type, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![file_id, owner, url, media_type, created_at],
        )?;
        Ok(())
      })
      .await
      .map_err(Error::external)
  }

  async fn delete_files_for_owner(&self, owner_uid: &str) -> Result<()> {
    let owner = owner_uid.to_owned();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM files WHERE owner_uid = ?1",
          rusqlite::params![owner],
        )?;
        Ok(())
      })
      .await
      .map_err(Error::external)
  }

  // ── Audit log ─────────────────────────────────────────────────────────

  async fn append_audit(&self, entry: &AuditLogEntry) -> Result<()> {
    let entry_id    = entry.entry_id.clone();
    let action      = encode_action(entry.action).to_owned();
    let target      = entry.target_uid.clone();
    let actor       = entry.actor_uid.clone();
    let prev_role   = entry.previous_role.map(|r| encode_role(r).to_owned());
    let new_role    = entry.new_role.map(|r| encode_role(r).to_owned());
    let source      = entry.source.map(|s| encode_source(s).to_owned());
    let recorded_at = encode_dt(entry.recorded_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO audit_logs (
             entry_id, action, target_uid, actor_uid,
             previous_role, new_role, source, recorded_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            entry_id, action, target, actor, prev_role, new_role, source,
            recorded_at,
          ],
        )?;
        Ok(())
      })
      .await
      .map_err(Error::external)
  }

  async fn audit_entries_since(&self, since: DateTime<Utc>) -> Result<Vec<AuditLogEntry>> {
    let since_str = encode_dt(since);
    let raws: Vec<RawAudit> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT entry_id, action, target_uid, actor_uid,
                  previous_role, new_role, source, recorded_at
             FROM audit_logs WHERE recorded_at >= ?1 ORDER BY recorded_at",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![since_str], |row| {
            Ok(RawAudit {
              entry_id:      row.get(0)?,
              action:        row.get(1)?,
              target_uid:    row.get(2)?,
              actor_uid:     row.get(3)?,
              previous_role: row.get(4)?,
              new_role:      row.get(5)?,
              source:        row.get(6)?,
              recorded_at:   row.get(7)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(Error::external)?;

    raws.into_iter().map(RawAudit::into_entry).collect()
  }

  // ── Security alerts ───────────────────────────────────────────────────

  async fn insert_alert(&self, alert: &SecurityAlert) -> Result<()> {
    let alert_id     = alert.alert_id.clone();
    let kind         = encode_alert_kind(alert.kind).to_owned();
    let target       = alert.target_uid.clone();
    let detail       = alert.detail.clone();
    let window_start = encode_dt(alert.window_start);
    let window_end   = encode_dt(alert.window_end);
    let created_at   = encode_dt(alert.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO security_alerts (
             alert_id, kind, target_uid, detail,
             window_start, window_end, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            alert_id, kind, target, detail, window_start, window_end,
            created_at,
          ],
        )?;
        Ok(())
      })
      .await
      .map_err(Error::external)
  }

  async fn alerts_since(&self, since: DateTime<Utc>) -> Result<Vec<SecurityAlert>> {
    let since_str = encode_dt(since);
    let raws: Vec<RawAlert> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT alert_id, kind, target_uid, detail,
                  window_start, window_end, created_at
             FROM security_alerts WHERE created_at >= ?1 ORDER BY created_at",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![since_str], |row| {
            Ok(RawAlert {
              alert_id:     row.get(0)?,
              kind:         row.get(1)?,
              target_uid:   row.get(2)?,
              detail:       row.get(3)?,
              window_start: row.get(4)?,
              window_end:   row.get(5)?,
              created_at:   row.get(6)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(Error::external)?;

    raws.into_iter().map(RawAlert::into_alert).collect()
  }
}

// ─── IdentityProvider impl ───────────────────────────────────────────────────

impl IdentityProvider for SqliteStore {
  async fn create_principal(&self, new: NewPrincipal) -> Result<Principal> {
    let email = new.email.trim().to_lowercase();
    let salt  = SaltString::generate(&mut OsRng);
    let hash  = Argon2::default()
      .hash_password(new.password.as_bytes(), &salt)
      .map_err(|e| Error::external_msg(format!("argon2 error: {e}")))?
      .to_string();

    let principal = Principal {
      uid:        Uuid::new_v4().to_string(),
      email:      email.clone(),
      claims:     new.claims,
      created_at: Utc::now(),
    };

    let uid         = principal.uid.clone();
    let claims_json = serde_json::to_string(&principal.claims)?;
    let created_at  = encode_dt(principal.created_at);

    let inserted: bool = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let exists: bool = tx
          .query_row(
            "SELECT 1 FROM principals WHERE email = ?1",
            rusqlite::params![email],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);

        if exists {
          tx.commit()?;
          return Ok(false);
        }

        tx.execute(
          "INSERT INTO principals (uid, email, password_hash, claims_json, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![uid, email, hash, claims_json, created_at],
        )?;
        tx.commit()?;
        Ok(true)
      })
      .await
      .map_err(Error::external)?;

    if !inserted {
      return Err(Error::EmailAlreadyInUse);
    }
    Ok(principal)
  }

  async fn principal(&self, uid: &str) -> Result<Option<Principal>> {
    let uid = uid.to_owned();
    let raw: Option<RawPrincipal> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT uid, email, claims_json, created_at
                 FROM principals WHERE uid = ?1",
              rusqlite::params![uid],
              |row| {
                Ok(RawPrincipal {
                  uid:         row.get(0)?,
                  email:       row.get(1)?,
                  claims_json: row.get(2)?,
                  created_at:  row.get(3)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await
      .map_err(Error::external)?;

    raw.map(RawPrincipal::into_principal).transpose()
  }

  async fn principal_by_email(&self, email: &str) -> Result<Option<Principal>> {
    let email = email.trim().to_lowercase();
    let raw: Option<RawPrincipal> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT uid, email, claims_json, created_at
                 FROM principals WHERE email = ?1",
              rusqlite::params![email],
              |row| {
                Ok(RawPrincipal {
                  uid:         row.get(0)?,
                  email:       row.get(1)?,
                  claims_json: row.get(2)?,
                  created_at:  row.get(3)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await
      .map_err(Error::external)?;

    raw.map(RawPrincipal::into_principal).transpose()
  }

  async fn verify_password(&self, email: &str, password: &str) -> Result<Principal> {
    let lookup = email.trim().to_lowercase();
    let row: Option<(RawPrincipal, String)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT uid, email, claims_json, created_at, password_hash
                 FROM principals WHERE email = ?1",
              rusqlite::params![lookup],
              |r| {
                Ok((
                  RawPrincipal {
                    uid:         r.get(0)?,
                    email:       r.get(1)?,
                    claims_json: r.get(2)?,
                    created_at:  r.get(3)?,
                  },
                  r.get(4)?,
                ))
              },
            )
            .optional()?,
        )
      })
      .await
      .map_err(Error::external)?;

    // Unknown email and bad password are indistinguishable to the caller.
    let (raw, hash) = row.ok_or(Error::WrongCredential)?;
    let parsed = PasswordHash::new(&hash).map_err(|_| Error::WrongCredential)?;
    Argon2::default()
      .verify_password(password.as_bytes(), &parsed)
      .map_err(|_| Error::WrongCredential)?;

    raw.into_principal()
  }

  async fn set_claims(&self, uid: &str, claims: &Claims) -> Result<()> {
    let uid_owned   = uid.to_owned();
    let claims_json = serde_json::to_string(claims)?;

    let updated: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE principals SET claims_json = ?2 WHERE uid = ?1",
          rusqlite::params![uid_owned, claims_json],
        )?)
      })
      .await
      .map_err(Error::external)?;

    if updated == 0 {
      return Err(Error::NotFound(format!("principal {uid}")));
    }
    Ok(())
  }

  async fn issue_token(&self, uid: &str) -> Result<String> {
    // Always read the current claim set; never mint from a cached copy.
    let principal = self
      .principal(uid)
      .await?
      .ok_or_else(|| Error::NotFound(format!("principal {uid}")))?;

    self.keys.mint(
      &principal.uid,
      &principal.email,
      &principal.claims,
      Utc::now().timestamp(),
      DEFAULT_TTL_SECS,
    )
  }

  async fn verify_token(&self, token: &str) -> Result<IdToken> {
    self.keys.verify(token)
  }

  async fn delete_principal(&self, uid: &str) -> Result<()> {
    let uid_owned = uid.to_owned();
    let deleted: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM principals WHERE uid = ?1",
          rusqlite::params![uid_owned],
        )?)
      })
      .await
      .map_err(Error::external)?;

    if deleted == 0 {
      return Err(Error::NotFound(format!("principal {uid}")));
    }
    Ok(())
  }
}
