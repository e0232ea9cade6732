//! SQLite schema for accounts, memberships and link maps.
//!
//! Tables:
//! - `bridge_meta`: schema version
//! - `collections`: collection id → home URL
//! - `accounts`: one row per login (case-insensitive unique)
//! - `memberships`: (account, collection) → role
//! - `role_capabilities`: role → capability grants
//! - `collection_settings`: per-collection key/value settings
//! - `account_options`: per-(account, scope) key/value options
//! - `link_maps`: resource_link_id → target
//! - `sessions`: session token digest → account

/// Current schema version recorded in `bridge_meta`.
pub const DB_VERSION: &str = "1.2";

/// Upper bound on `link_maps.resource_link_id`.
pub const MAX_RESOURCE_LINK_ID_LEN: usize = 255;

/// DDL for all bridge tables.
pub const BRIDGE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS bridge_meta (
    key              TEXT PRIMARY KEY,
    value            TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS collections (
    id               INTEGER PRIMARY KEY,
    url              TEXT NOT NULL,
    title            TEXT NOT NULL DEFAULT '',
    created_at       TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS accounts (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    login            TEXT NOT NULL UNIQUE COLLATE NOCASE,
    first_name       TEXT NOT NULL DEFAULT '',
    last_name        TEXT NOT NULL DEFAULT '',
    email            TEXT NOT NULL,
    password_digest  TEXT NOT NULL,
    created_at       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS memberships (
    account_id       INTEGER NOT NULL REFERENCES accounts(id),
    collection_id    INTEGER NOT NULL,
    role             TEXT NOT NULL,
    added_at         TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (account_id, collection_id)
);

CREATE TABLE IF NOT EXISTS role_capabilities (
    role             TEXT NOT NULL,
    capability       TEXT NOT NULL,
    PRIMARY KEY (role, capability)
);

CREATE TABLE IF NOT EXISTS collection_settings (
    collection_id    INTEGER NOT NULL,
    key              TEXT NOT NULL,
    value            TEXT NOT NULL,
    PRIMARY KEY (collection_id, key)
);

CREATE TABLE IF NOT EXISTS account_options (
    account_id       INTEGER NOT NULL REFERENCES accounts(id),
    scope_id         INTEGER NOT NULL,
    key              TEXT NOT NULL,
    value            TEXT NOT NULL,
    updated_at       TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (account_id, scope_id, key)
);

CREATE TABLE IF NOT EXISTS link_maps (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    resource_link_id TEXT NOT NULL UNIQUE CHECK (length(resource_link_id) <= 255),
    target_action    TEXT NOT NULL,
    user_id          INTEGER,
    blog_id          INTEGER
);

CREATE TABLE IF NOT EXISTS sessions (
    token_digest     TEXT PRIMARY KEY,
    account_id       INTEGER NOT NULL REFERENCES accounts(id),
    created_at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_link_maps_target
    ON link_maps(target_action);
CREATE INDEX IF NOT EXISTS idx_sessions_account
    ON sessions(account_id);
"#;
