use crate::error::{BridgeError, BridgeResult};
use crate::model::AccountId;
use chrono::Utc;
use rand::RngCore;
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};

/// Only the digest of a session token is persisted.
fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

pub(crate) fn create_session_impl(conn: &Connection, account: AccountId) -> BridgeResult<String> {
    let mut raw = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut raw);
    let token = hex::encode(raw);

    conn.execute(
        "INSERT INTO sessions (token_digest, account_id, created_at) VALUES (?1, ?2, ?3)",
        params![token_digest(&token), account.0, Utc::now().to_rfc3339()],
    )
    .map_err(BridgeError::account)?;
    Ok(token)
}

pub(crate) fn session_account_impl(
    conn: &Connection,
    token: &str,
) -> BridgeResult<Option<AccountId>> {
    conn.query_row(
        "SELECT account_id FROM sessions WHERE token_digest = ?1",
        [token_digest(token)],
        |row| row.get(0).map(AccountId),
    )
    .optional()
    .map_err(BridgeError::account)
}

pub(crate) fn revoke_session_impl(conn: &Connection, token: &str) -> BridgeResult<()> {
    conn.execute(
        "DELETE FROM sessions WHERE token_digest = ?1",
        [token_digest(token)],
    )
    .map_err(BridgeError::account)?;
    Ok(())
}
