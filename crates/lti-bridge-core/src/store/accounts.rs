use crate::capability::{Capability, SiteRole};
use crate::error::{BridgeError, BridgeResult};
use crate::model::{Account, AccountId, Collection, CollectionId, EnrollmentRecord, NewAccount};
use crate::store::OPTION_ENROLLMENT;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

const ACCOUNT_COLUMNS: &str = "id, login, first_name, last_name, email, created_at";

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    let created_at: String = row.get(5)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;
    Ok(Account {
        id: AccountId(row.get(0)?),
        login: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        email: row.get(4)?,
        created_at,
    })
}

pub(crate) fn find_account_by_login_impl(
    conn: &Connection,
    login: &str,
) -> BridgeResult<Option<Account>> {
    conn.query_row(
        &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE login = ?1"),
        [login],
        account_from_row,
    )
    .optional()
    .map_err(BridgeError::account)
}

pub(crate) fn get_account_impl(conn: &Connection, id: AccountId) -> BridgeResult<Option<Account>> {
    conn.query_row(
        &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"),
        [id.0],
        account_from_row,
    )
    .optional()
    .map_err(BridgeError::account)
}

/// Caller holds the transaction.
pub(crate) fn create_account_impl(
    conn: &Connection,
    new: &NewAccount<'_>,
    baseline: (CollectionId, SiteRole),
) -> BridgeResult<(Account, bool)> {
    let inserted = conn
        .execute(
            r#"
            INSERT INTO accounts (login, email, password_digest, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(login) DO NOTHING
            "#,
            params![new.login, new.email, new.password_digest, Utc::now().to_rfc3339()],
        )
        .map_err(BridgeError::account)?;

    let account = find_account_by_login_impl(conn, new.login)?.ok_or_else(|| {
        BridgeError::account(format!("account '{}' missing after insert", new.login))
    })?;

    let created = inserted > 0;
    if created {
        let (collection, role) = baseline;
        insert_membership(conn, account.id, collection, role)?;
    }
    Ok((account, created))
}

pub(crate) fn update_names_impl(
    conn: &Connection,
    id: AccountId,
    first_name: &str,
    last_name: &str,
) -> BridgeResult<()> {
    conn.execute(
        "UPDATE accounts SET first_name = ?1, last_name = ?2 WHERE id = ?3",
        params![first_name, last_name, id.0],
    )
    .map_err(BridgeError::account)?;
    Ok(())
}

pub(crate) fn member_role_impl(
    conn: &Connection,
    account: AccountId,
    collection: CollectionId,
) -> BridgeResult<Option<SiteRole>> {
    let role: Option<String> = conn
        .query_row(
            "SELECT role FROM memberships WHERE account_id = ?1 AND collection_id = ?2",
            params![account.0, collection.0],
            |row| row.get(0),
        )
        .optional()
        .map_err(BridgeError::account)?;

    match role {
        None => Ok(None),
        Some(raw) => raw
            .parse::<SiteRole>()
            .map(Some)
            .map_err(BridgeError::account),
    }
}

fn insert_membership(
    conn: &Connection,
    account: AccountId,
    collection: CollectionId,
    role: SiteRole,
) -> BridgeResult<bool> {
    let inserted = conn
        .execute(
            r#"
            INSERT INTO memberships (account_id, collection_id, role)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(account_id, collection_id) DO NOTHING
            "#,
            params![account.0, collection.0, role.as_str()],
        )
        .map_err(BridgeError::account)?;
    Ok(inserted > 0)
}

/// Caller holds the transaction.
pub(crate) fn enroll_impl(
    conn: &Connection,
    account: AccountId,
    collection: CollectionId,
    role: SiteRole,
    record: &EnrollmentRecord,
) -> BridgeResult<bool> {
    if !insert_membership(conn, account, collection, role)? {
        return Ok(false);
    }
    let json = serde_json::to_string(record).map_err(BridgeError::account)?;
    set_account_option_impl(conn, account, collection, OPTION_ENROLLMENT, &json)?;
    Ok(true)
}

pub(crate) fn set_member_role_impl(
    conn: &Connection,
    account: AccountId,
    collection: CollectionId,
    role: SiteRole,
) -> BridgeResult<()> {
    conn.execute(
        r#"
        INSERT INTO memberships (account_id, collection_id, role)
        VALUES (?1, ?2, ?3)
        ON CONFLICT(account_id, collection_id) DO UPDATE SET role = excluded.role
        "#,
        params![account.0, collection.0, role.as_str()],
    )
    .map_err(BridgeError::account)?;
    Ok(())
}

pub(crate) fn has_capability_impl(
    conn: &Connection,
    account: AccountId,
    collection: CollectionId,
    capability: Capability,
) -> BridgeResult<bool> {
    let granted: i64 = conn
        .query_row(
            r#"
            SELECT COUNT(*) FROM memberships m
            JOIN role_capabilities rc ON rc.role = m.role
            WHERE m.account_id = ?1 AND m.collection_id = ?2 AND rc.capability = ?3
            "#,
            params![account.0, collection.0, capability.as_str()],
            |row| row.get(0),
        )
        .map_err(BridgeError::account)?;
    Ok(granted > 0)
}

pub(crate) fn get_setting_impl(
    conn: &Connection,
    collection: CollectionId,
    key: &str,
) -> BridgeResult<Option<String>> {
    conn.query_row(
        "SELECT value FROM collection_settings WHERE collection_id = ?1 AND key = ?2",
        params![collection.0, key],
        |row| row.get(0),
    )
    .optional()
    .map_err(BridgeError::account)
}

pub(crate) fn set_setting_impl(
    conn: &Connection,
    collection: CollectionId,
    key: &str,
    value: &str,
) -> BridgeResult<()> {
    conn.execute(
        r#"
        INSERT INTO collection_settings (collection_id, key, value) VALUES (?1, ?2, ?3)
        ON CONFLICT(collection_id, key) DO UPDATE SET value = excluded.value
        "#,
        params![collection.0, key, value],
    )
    .map_err(BridgeError::account)?;
    Ok(())
}

pub(crate) fn get_account_option_impl(
    conn: &Connection,
    account: AccountId,
    scope: CollectionId,
    key: &str,
) -> BridgeResult<Option<String>> {
    conn.query_row(
        "SELECT value FROM account_options WHERE account_id = ?1 AND scope_id = ?2 AND key = ?3",
        params![account.0, scope.0, key],
        |row| row.get(0),
    )
    .optional()
    .map_err(BridgeError::account)
}

pub(crate) fn set_account_option_impl(
    conn: &Connection,
    account: AccountId,
    scope: CollectionId,
    key: &str,
    value: &str,
) -> BridgeResult<()> {
    conn.execute(
        r#"
        INSERT INTO account_options (account_id, scope_id, key, value, updated_at)
        VALUES (?1, ?2, ?3, ?4, datetime('now'))
        ON CONFLICT(account_id, scope_id, key)
        DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
        params![account.0, scope.0, key, value],
    )
    .map_err(BridgeError::account)?;
    Ok(())
}

pub(crate) fn add_collection_impl(
    conn: &Connection,
    id: CollectionId,
    url: &str,
    title: &str,
) -> BridgeResult<()> {
    conn.execute(
        r#"
        INSERT INTO collections (id, url, title) VALUES (?1, ?2, ?3)
        ON CONFLICT(id) DO UPDATE SET url = excluded.url, title = excluded.title
        "#,
        params![id.0, url, title],
    )
    .map_err(BridgeError::account)?;
    Ok(())
}

pub(crate) fn get_collection_impl(
    conn: &Connection,
    id: CollectionId,
) -> BridgeResult<Option<Collection>> {
    conn.query_row(
        "SELECT id, url, title FROM collections WHERE id = ?1",
        [id.0],
        |row| {
            Ok(Collection {
                id: CollectionId(row.get(0)?),
                url: row.get(1)?,
                title: row.get(2)?,
            })
        },
    )
    .optional()
    .map_err(BridgeError::account)
}

pub(crate) fn list_collections_impl(conn: &Connection) -> BridgeResult<Vec<Collection>> {
    let mut stmt = conn
        .prepare("SELECT id, url, title FROM collections ORDER BY id")
        .map_err(BridgeError::account)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(Collection {
                id: CollectionId(row.get(0)?),
                url: row.get(1)?,
                title: row.get(2)?,
            })
        })
        .map_err(BridgeError::account)?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(BridgeError::account)
}
