use super::schema::MAX_RESOURCE_LINK_ID_LEN;
use crate::error::{BridgeError, BridgeResult};
use crate::model::{AccountId, CollectionId, LinkMap};
use rusqlite::{params, Connection, OptionalExtension, Row};

const LINK_COLUMNS: &str = "id, resource_link_id, target_action, user_id, blog_id";

fn link_from_row(row: &Row<'_>) -> rusqlite::Result<LinkMap> {
    Ok(LinkMap {
        id: row.get(0)?,
        resource_link_id: row.get(1)?,
        target_action: row.get(2)?,
        account_id: row.get::<_, Option<i64>>(3)?.map(AccountId),
        collection_id: row.get::<_, Option<i64>>(4)?.map(CollectionId),
    })
}

pub(crate) fn find_link_impl(
    conn: &Connection,
    resource_link_id: &str,
) -> BridgeResult<Option<LinkMap>> {
    conn.query_row(
        &format!("SELECT {LINK_COLUMNS} FROM link_maps WHERE resource_link_id = ?1"),
        [resource_link_id],
        link_from_row,
    )
    .optional()
    .map_err(BridgeError::mapping)
}

pub(crate) fn upsert_link_impl(
    conn: &Connection,
    resource_link_id: &str,
    target_action: &str,
    account: Option<AccountId>,
    collection: Option<CollectionId>,
) -> BridgeResult<LinkMap> {
    if resource_link_id.is_empty() {
        return Err(BridgeError::InvalidInput {
            message: "resource_link_id is empty".to_string(),
        });
    }
    if resource_link_id.len() > MAX_RESOURCE_LINK_ID_LEN {
        return Err(BridgeError::InvalidInput {
            message: format!(
                "resource_link_id is {} bytes, limit is {MAX_RESOURCE_LINK_ID_LEN}",
                resource_link_id.len()
            ),
        });
    }

    conn.query_row(
        &format!(
            r#"
            INSERT INTO link_maps (resource_link_id, target_action, user_id, blog_id)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(resource_link_id) DO UPDATE SET
                target_action = excluded.target_action,
                user_id = excluded.user_id,
                blog_id = excluded.blog_id
            RETURNING {LINK_COLUMNS}
            "#
        ),
        params![
            resource_link_id,
            target_action,
            account.map(|a| a.0),
            collection.map(|c| c.0),
        ],
        link_from_row,
    )
    .map_err(BridgeError::mapping)
}

pub(crate) fn delete_link_impl(conn: &Connection, id: i64) -> BridgeResult<bool> {
    let removed = conn
        .execute("DELETE FROM link_maps WHERE id = ?1", [id])
        .map_err(BridgeError::mapping)?;
    Ok(removed > 0)
}

fn query_links(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> BridgeResult<Vec<LinkMap>> {
    let mut stmt = conn.prepare(sql).map_err(BridgeError::mapping)?;
    let rows = stmt
        .query_map(params, link_from_row)
        .map_err(BridgeError::mapping)?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(BridgeError::mapping)
}

pub(crate) fn links_by_target_impl(
    conn: &Connection,
    target_action: &str,
) -> BridgeResult<Vec<LinkMap>> {
    query_links(
        conn,
        &format!("SELECT {LINK_COLUMNS} FROM link_maps WHERE target_action = ?1 ORDER BY id"),
        [target_action],
    )
}

pub(crate) fn list_links_impl(conn: &Connection) -> BridgeResult<Vec<LinkMap>> {
    query_links(
        conn,
        &format!("SELECT {LINK_COLUMNS} FROM link_maps ORDER BY id"),
        [],
    )
}
