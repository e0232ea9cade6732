//! Persistence: store traits and the SQLite-backed [`SqliteStore`].
//!
//! Every call carries its collection scope explicitly; there is no ambient
//! "current collection".

use crate::capability::{Capability, SiteRole};
use crate::error::{BridgeError, BridgeResult};
use crate::model::{
    Account, AccountId, Collection, CollectionId, EnrollmentRecord, LinkMap, NewAccount,
};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

mod accounts;
mod links;
mod migrate;
pub mod schema;
mod sessions;

pub use schema::{BRIDGE_SCHEMA, DB_VERSION, MAX_RESOURCE_LINK_ID_LEN};

/// Collection setting restricting self-enrollment to teachers and admins.
pub const SETTING_TEACHERS_ONLY: &str = "teachers_only";
/// Account option holding the last launched resource_link_id (primary scope).
pub const OPTION_LAST_LINK: &str = "lti_last_link";
/// Account option holding the [`EnrollmentRecord`] (collection scope).
pub const OPTION_ENROLLMENT: &str = "lti_enrollment_record";

/// Accounts, memberships, capabilities, settings and per-account options.
pub trait AccountStore {
    fn find_account_by_login(&self, login: &str) -> BridgeResult<Option<Account>>;

    fn get_account(&self, id: AccountId) -> BridgeResult<Option<Account>>;

    /// Insert unless the login exists. Returns the stored row and whether it
    /// was created by this call. A new account also gets `baseline` membership.
    fn create_account(
        &self,
        new: &NewAccount<'_>,
        baseline: (CollectionId, SiteRole),
    ) -> BridgeResult<(Account, bool)>;

    fn update_names(&self, id: AccountId, first_name: &str, last_name: &str) -> BridgeResult<()>;

    fn member_role(
        &self,
        account: AccountId,
        collection: CollectionId,
    ) -> BridgeResult<Option<SiteRole>>;

    fn is_member(&self, account: AccountId, collection: CollectionId) -> BridgeResult<bool> {
        Ok(self.member_role(account, collection)?.is_some())
    }

    /// Add a membership and write its enrollment record in one transaction.
    /// Returns false when the membership already existed.
    fn enroll(
        &self,
        account: AccountId,
        collection: CollectionId,
        role: SiteRole,
        record: &EnrollmentRecord,
    ) -> BridgeResult<bool>;

    fn has_capability(
        &self,
        account: AccountId,
        collection: CollectionId,
        capability: Capability,
    ) -> BridgeResult<bool>;

    fn get_setting(&self, collection: CollectionId, key: &str) -> BridgeResult<Option<String>>;

    fn get_account_option(
        &self,
        account: AccountId,
        scope: CollectionId,
        key: &str,
    ) -> BridgeResult<Option<String>>;

    fn set_account_option(
        &self,
        account: AccountId,
        scope: CollectionId,
        key: &str,
        value: &str,
    ) -> BridgeResult<()>;

    fn get_collection(&self, id: CollectionId) -> BridgeResult<Option<Collection>>;
}

/// The `link_maps` table.
pub trait LinkStore {
    fn find_link(&self, resource_link_id: &str) -> BridgeResult<Option<LinkMap>>;

    /// Insert or update in place, keyed on `resource_link_id`, atomically.
    fn upsert_link(
        &self,
        resource_link_id: &str,
        target_action: &str,
        account: Option<AccountId>,
        collection: Option<CollectionId>,
    ) -> BridgeResult<LinkMap>;

    /// Returns whether a row was removed.
    fn delete_link(&self, id: i64) -> BridgeResult<bool>;

    fn links_by_target(&self, target_action: &str) -> BridgeResult<Vec<LinkMap>>;

    fn list_links(&self) -> BridgeResult<Vec<LinkMap>>;
}

/// SQLite-backed store.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a file-backed store, creating and upgrading the schema.
    pub fn open(path: &Path) -> BridgeResult<Self> {
        let conn = Connection::open(path).map_err(BridgeError::account)?;
        Self::from_connection(conn)
    }

    /// Create an in-memory store (for testing).
    pub fn memory() -> BridgeResult<Self> {
        let conn = Connection::open_in_memory().map_err(BridgeError::account)?;
        Self::from_connection(conn)
    }

    pub fn from_connection(conn: Connection) -> BridgeResult<Self> {
        migrate::init_connection_impl(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("store connection mutex poisoned")
    }

    /// Recorded schema version.
    pub fn schema_version(&self) -> BridgeResult<Option<String>> {
        migrate::schema_version_impl(&self.conn())
    }

    /// Grant the default role capabilities. Idempotent.
    pub fn setup_capabilities(&self) -> BridgeResult<()> {
        migrate::setup_capabilities_impl(&self.conn())
    }

    pub fn add_collection(&self, id: CollectionId, url: &str, title: &str) -> BridgeResult<()> {
        accounts::add_collection_impl(&self.conn(), id, url, title)
    }

    pub fn list_collections(&self) -> BridgeResult<Vec<Collection>> {
        accounts::list_collections_impl(&self.conn())
    }

    pub fn set_setting(&self, collection: CollectionId, key: &str, value: &str) -> BridgeResult<()> {
        accounts::set_setting_impl(&self.conn(), collection, key, value)
    }

    /// Insert or replace a membership role (operator grants).
    pub fn set_member_role(
        &self,
        account: AccountId,
        collection: CollectionId,
        role: SiteRole,
    ) -> BridgeResult<()> {
        accounts::set_member_role_impl(&self.conn(), account, collection, role)
    }

    /// Persist a new session for `account`; returns the cookie token.
    pub fn create_session(&self, account: AccountId) -> BridgeResult<String> {
        sessions::create_session_impl(&self.conn(), account)
    }

    pub fn session_account(&self, token: &str) -> BridgeResult<Option<AccountId>> {
        sessions::session_account_impl(&self.conn(), token)
    }

    pub fn revoke_session(&self, token: &str) -> BridgeResult<()> {
        sessions::revoke_session_impl(&self.conn(), token)
    }
}

impl AccountStore for SqliteStore {
    fn find_account_by_login(&self, login: &str) -> BridgeResult<Option<Account>> {
        accounts::find_account_by_login_impl(&self.conn(), login)
    }

    fn get_account(&self, id: AccountId) -> BridgeResult<Option<Account>> {
        accounts::get_account_impl(&self.conn(), id)
    }

    fn create_account(
        &self,
        new: &NewAccount<'_>,
        baseline: (CollectionId, SiteRole),
    ) -> BridgeResult<(Account, bool)> {
        let conn = self.conn();
        in_immediate_txn(&conn, BridgeError::account, |conn| {
            accounts::create_account_impl(conn, new, baseline)
        })
    }

    fn update_names(&self, id: AccountId, first_name: &str, last_name: &str) -> BridgeResult<()> {
        accounts::update_names_impl(&self.conn(), id, first_name, last_name)
    }

    fn member_role(
        &self,
        account: AccountId,
        collection: CollectionId,
    ) -> BridgeResult<Option<SiteRole>> {
        accounts::member_role_impl(&self.conn(), account, collection)
    }

    fn enroll(
        &self,
        account: AccountId,
        collection: CollectionId,
        role: SiteRole,
        record: &EnrollmentRecord,
    ) -> BridgeResult<bool> {
        let conn = self.conn();
        in_immediate_txn(&conn, BridgeError::account, |conn| {
            accounts::enroll_impl(conn, account, collection, role, record)
        })
    }

    fn has_capability(
        &self,
        account: AccountId,
        collection: CollectionId,
        capability: Capability,
    ) -> BridgeResult<bool> {
        accounts::has_capability_impl(&self.conn(), account, collection, capability)
    }

    fn get_setting(&self, collection: CollectionId, key: &str) -> BridgeResult<Option<String>> {
        accounts::get_setting_impl(&self.conn(), collection, key)
    }

    fn get_account_option(
        &self,
        account: AccountId,
        scope: CollectionId,
        key: &str,
    ) -> BridgeResult<Option<String>> {
        accounts::get_account_option_impl(&self.conn(), account, scope, key)
    }

    fn set_account_option(
        &self,
        account: AccountId,
        scope: CollectionId,
        key: &str,
        value: &str,
    ) -> BridgeResult<()> {
        accounts::set_account_option_impl(&self.conn(), account, scope, key, value)
    }

    fn get_collection(&self, id: CollectionId) -> BridgeResult<Option<Collection>> {
        accounts::get_collection_impl(&self.conn(), id)
    }
}

impl LinkStore for SqliteStore {
    fn find_link(&self, resource_link_id: &str) -> BridgeResult<Option<LinkMap>> {
        links::find_link_impl(&self.conn(), resource_link_id)
    }

    fn upsert_link(
        &self,
        resource_link_id: &str,
        target_action: &str,
        account: Option<AccountId>,
        collection: Option<CollectionId>,
    ) -> BridgeResult<LinkMap> {
        links::upsert_link_impl(
            &self.conn(),
            resource_link_id,
            target_action,
            account,
            collection,
        )
    }

    fn delete_link(&self, id: i64) -> BridgeResult<bool> {
        links::delete_link_impl(&self.conn(), id)
    }

    fn links_by_target(&self, target_action: &str) -> BridgeResult<Vec<LinkMap>> {
        links::links_by_target_impl(&self.conn(), target_action)
    }

    fn list_links(&self) -> BridgeResult<Vec<LinkMap>> {
        links::list_links_impl(&self.conn())
    }
}

/// Run `f` inside `BEGIN IMMEDIATE`; commit on success, roll back on error.
fn in_immediate_txn<T>(
    conn: &Connection,
    on_sql_error: fn(rusqlite::Error) -> BridgeError,
    f: impl FnOnce(&Connection) -> BridgeResult<T>,
) -> BridgeResult<T> {
    conn.execute("BEGIN IMMEDIATE", []).map_err(on_sql_error)?;
    let result = f(conn);
    match &result {
        Ok(_) => {
            conn.execute("COMMIT", []).map_err(on_sql_error)?;
        }
        Err(_) => {
            let _ = conn.execute("ROLLBACK", []);
        }
    }
    result
}
