//! Resource-link mapping with capability and nonce gates.

use crate::accounts::can_manage_links;
use crate::error::{BridgeError, BridgeResult};
use crate::model::{AccountId, CollectionId, LinkLookup, LinkMap};
use crate::nonce::{NonceAction, NonceIssuer};
use crate::session::SessionStore;
use crate::store::{AccountStore, LinkStore, OPTION_LAST_LINK};

/// A request to map `resource_link_id` onto `target_action`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapRequest {
    pub resource_link_id: String,
    pub target_action: String,
    /// Collection the mapping was made from; also the capability scope.
    pub collection: Option<CollectionId>,
}

#[derive(Debug, Clone)]
pub struct LinkMapper<S> {
    store: S,
    nonces: NonceIssuer,
    primary: CollectionId,
}

impl<S: AccountStore + LinkStore> LinkMapper<S> {
    pub fn new(store: S, nonces: NonceIssuer, primary: CollectionId) -> Self {
        Self {
            store,
            nonces,
            primary,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn nonces(&self) -> &NonceIssuer {
        &self.nonces
    }

    /// Look up `resource_link_id`. An empty id with `fallback_to_last_seen`
    /// and an active session uses the account's last launched link instead.
    pub fn get_link(
        &self,
        resource_link_id: &str,
        fallback_to_last_seen: bool,
        session: &impl SessionStore,
    ) -> BridgeResult<LinkLookup> {
        let mut id = resource_link_id.to_string();
        if id.is_empty() && fallback_to_last_seen {
            if let Some(account) = session.current_session() {
                id = self.last_seen_link(account)?.unwrap_or_default();
            }
        }
        if id.is_empty() {
            return Ok(LinkLookup::NotFound {
                resource_link_id: id,
            });
        }

        Ok(match self.store.find_link(&id)? {
            Some(map) => LinkLookup::Found(map),
            None => LinkLookup::NotFound {
                resource_link_id: id,
            },
        })
    }

    pub fn last_seen_link(&self, account: AccountId) -> BridgeResult<Option<String>> {
        self.store
            .get_account_option(account, self.primary, OPTION_LAST_LINK)
    }

    pub fn remember_last_link(&self, account: AccountId, resource_link_id: &str) -> BridgeResult<()> {
        self.store
            .set_account_option(account, self.primary, OPTION_LAST_LINK, resource_link_id)?;
        tracing::debug!(event = "last_link_stored", account = %account, resource_link_id);
        Ok(())
    }

    /// Session account, provided it may manage links in `collection`.
    fn authorized_account(
        &self,
        session: &impl SessionStore,
        collection: Option<CollectionId>,
    ) -> BridgeResult<AccountId> {
        let account = session
            .current_session()
            .ok_or_else(|| BridgeError::denied("no active session"))?;
        let scope = collection.unwrap_or(self.primary);
        if !can_manage_links(&self.store, session, scope)? {
            return Err(BridgeError::denied(format!(
                "account {account} lacks link management in collection {scope}"
            )));
        }
        Ok(account)
    }

    fn check_nonce(&self, nonce: &str, action: NonceAction, account: AccountId) -> BridgeResult<()> {
        match self.nonces.verify(nonce, action, Some(account)) {
            Some(_) => Ok(()),
            None => Err(BridgeError::denied(format!(
                "invalid {} nonce",
                action.as_str()
            ))),
        }
    }

    pub fn upsert_link(
        &self,
        request: &MapRequest,
        session: &impl SessionStore,
        nonce: &str,
    ) -> BridgeResult<LinkMap> {
        let account = self.authorized_account(session, request.collection)?;
        self.check_nonce(nonce, NonceAction::MapLink, account)?;

        let map = self.store.upsert_link(
            &request.resource_link_id,
            &request.target_action,
            Some(account),
            request.collection,
        )?;
        tracing::info!(
            event = "link_mapped",
            id = map.id,
            resource_link_id = %map.resource_link_id,
            target = %map.target_action,
            account = %account
        );
        Ok(map)
    }

    /// Remove map `id`. Missing ids are not an error.
    pub fn delete_link(
        &self,
        id: i64,
        collection: Option<CollectionId>,
        session: &impl SessionStore,
        nonce: &str,
    ) -> BridgeResult<bool> {
        let account = self.authorized_account(session, collection)?;
        self.check_nonce(nonce, NonceAction::UnmapLink, account)?;

        let removed = self.store.delete_link(id)?;
        tracing::info!(event = "link_unmapped", id, removed, account = %account);
        Ok(removed)
    }

    pub fn find_links_by_target(&self, target_action: &str) -> BridgeResult<Vec<LinkMap>> {
        self.store.links_by_target(target_action)
    }

    /// Nonce for `action` bound to the session's account.
    pub fn nonce_for(&self, action: NonceAction, session: &impl SessionStore) -> String {
        self.nonces.create(action, session.current_session())
    }
}
