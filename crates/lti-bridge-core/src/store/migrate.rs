use super::schema::{BRIDGE_SCHEMA, DB_VERSION};
use crate::capability::DEFAULT_GRANTS;
use crate::error::{BridgeError, BridgeResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::time::Duration;

/// Option key written by schema 1.0 and no longer read.
const LEGACY_INFO_KEY: &str = "lti_info";

pub(crate) fn init_connection_impl(conn: &Connection) -> BridgeResult<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])
        .map_err(BridgeError::account)?;
    let _ = conn.execute("PRAGMA journal_mode = WAL", []);
    let _ = conn.busy_timeout(Duration::from_millis(5000));
    conn.execute_batch(BRIDGE_SCHEMA)
        .map_err(BridgeError::account)?;
    upgrade_impl(conn)?;
    setup_capabilities_impl(conn)?;
    Ok(())
}

pub(crate) fn schema_version_impl(conn: &Connection) -> BridgeResult<Option<String>> {
    conn.query_row(
        "SELECT value FROM bridge_meta WHERE key = 'db_version'",
        [],
        |row| row.get(0),
    )
    .optional()
    .map_err(BridgeError::account)
}

/// Bring an older database up to [`DB_VERSION`].
fn upgrade_impl(conn: &Connection) -> BridgeResult<()> {
    let current = schema_version_impl(conn)?;
    if current.as_deref() == Some(DB_VERSION) {
        return Ok(());
    }

    match current.as_deref() {
        None | Some("") | Some("1.0") => {
            let removed = conn
                .execute(
                    "DELETE FROM account_options WHERE key = ?1",
                    [LEGACY_INFO_KEY],
                )
                .map_err(BridgeError::account)?;
            if removed > 0 {
                tracing::info!(event = "legacy_options_removed", count = removed);
            }
        }
        // 1.1 only lacked tables, which the schema batch above has created.
        _ => {}
    }

    conn.execute(
        r#"
        INSERT INTO bridge_meta (key, value) VALUES ('db_version', ?1)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
        [DB_VERSION],
    )
    .map_err(BridgeError::account)?;

    tracing::info!(
        event = "schema_upgraded",
        from = current.as_deref().unwrap_or("none"),
        to = DB_VERSION
    );
    Ok(())
}

pub(crate) fn setup_capabilities_impl(conn: &Connection) -> BridgeResult<()> {
    for (role, capability) in DEFAULT_GRANTS {
        conn.execute(
            r#"
            INSERT INTO role_capabilities (role, capability) VALUES (?1, ?2)
            ON CONFLICT(role, capability) DO NOTHING
            "#,
            params![role.as_str(), capability.as_str()],
        )
        .map_err(BridgeError::account)?;
    }
    Ok(())
}
