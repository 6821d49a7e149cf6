//! SQL schema for the Cardea SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.
//!
//! Table names mirror the document-store collection names other
//! collaborators rely on; renaming one is a breaking change.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Identity provider side: one row per principal.
-- Claims are settable only by privileged server-side code.
CREATE TABLE IF NOT EXISTS principals (
    uid           TEXT PRIMARY KEY,
    email         TEXT NOT NULL UNIQUE,  -- stored lowercased
    password_hash TEXT NOT NULL,         -- argon2 PHC string
    claims_json   TEXT NOT NULL DEFAULT '{\"admin\":false}',
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS users (
    uid                TEXT PRIMARY KEY,
    email              TEXT NOT NULL,
    display_name       TEXT,
    role               TEXT NOT NULL,    -- 'user' | 'admin'
    cards_json         TEXT NOT NULL DEFAULT '[]',
    role_updated_at    TEXT,
    role_updated_by    TEXT,
    role_update_source TEXT,
    created_at         TEXT NOT NULL,
    updated_at         TEXT NOT NULL
);

-- Published cards. 'profiles' is the collection name the share surface and
-- the dashboard both address.
CREATE TABLE IF NOT EXISTS profiles (
    card_id              TEXT PRIMARY KEY,
    owner_uid            TEXT NOT NULL,
    contact_json         TEXT NOT NULL,
    category             TEXT NOT NULL,  -- 'basic' | 'premium' | 'executive'
    status               TEXT NOT NULL,  -- 'active' | 'suspended' | 'blocked'
    subscription_expires TEXT,
    created_at           TEXT NOT NULL,
    updated_at           TEXT NOT NULL
);

-- Append-only. No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS audit_logs (
    entry_id      TEXT PRIMARY KEY,
    action        TEXT NOT NULL,
    target_uid    TEXT NOT NULL,
    actor_uid     TEXT,
    previous_role TEXT,
    new_role      TEXT,
    source        TEXT,
    recorded_at   TEXT NOT NULL
);

-- Pre-deletion snapshots; the only durable record of a deleted account.
CREATE TABLE IF NOT EXISTS deleted_users (
    uid           TEXT PRIMARY KEY,
    snapshot_json TEXT NOT NULL,
    deleted_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS analytics (
    card_id      TEXT PRIMARY KEY,
    owner_uid    TEXT NOT NULL,
    scan_count   INTEGER NOT NULL DEFAULT 0,
    last_scan_at TEXT
);

CREATE TABLE IF NOT EXISTS security_alerts (
    alert_id     TEXT PRIMARY KEY,
    kind         TEXT NOT NULL,
    target_uid   TEXT NOT NULL,
    detail       TEXT NOT NULL,
    window_start TEXT NOT NULL,
    window_end   TEXT NOT NULL,
    created_at   TEXT NOT NULL
);

-- Upload metadata back-references; binaries live with the media host.
CREATE TABLE IF NOT EXISTS files (
    file_id    TEXT PRIMARY KEY,
    owner_uid  TEXT NOT NULL,
    url        TEXT NOT NULL,
    media_type TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS profiles_owner_idx  ON profiles(owner_uid);
CREATE INDEX IF NOT EXISTS audit_recorded_idx  ON audit_logs(recorded_at);
CREATE INDEX IF NOT EXISTS analytics_owner_idx ON analytics(owner_uid);
CREATE INDEX IF NOT EXISTS files_owner_idx     ON files(owner_uid);

PRAGMA user_version = 1;
";
