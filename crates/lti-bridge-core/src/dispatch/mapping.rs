use super::{LaunchDispatcher, Redirect};
use crate::accounts::can_manage_links;
use crate::error::BridgeError;
use crate::links::MapRequest;
use crate::model::CollectionId;
use crate::session::SessionStore;
use crate::store::{AccountStore, LinkStore};
use std::collections::HashMap;

/// Query of one mapping-endpoint request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingRequest {
    pub resource_link_id: String,
    pub target_action: String,
    pub collection: Option<CollectionId>,
    pub action: String,
    /// Raw `ID` parameter; only numeric values are acted on.
    pub id: String,
    pub nonce: String,
    pub referrer: Option<String>,
}

impl MappingRequest {
    pub fn from_params(params: &HashMap<String, String>, referrer: Option<String>) -> Self {
        let text = |key: &str| params.get(key).map(|v| v.trim().to_string()).unwrap_or_default();
        Self {
            resource_link_id: text("resource_link_id"),
            target_action: text("target_action"),
            collection: params.get("blog").and_then(|b| CollectionId::parse_param(b)),
            action: text("action"),
            id: text("ID"),
            nonce: text("lti_nonce"),
            referrer: referrer.filter(|r| !r.is_empty()),
        }
    }

    fn numeric_id(&self) -> Option<i64> {
        self.id.parse::<u64>().ok().and_then(|id| i64::try_from(id).ok())
    }
}

#[derive(Debug)]
pub enum MappingOutcome {
    Redirect(Redirect),
    /// A mapping write failed; the request stops with this error.
    Halt(BridgeError),
}

impl<S: AccountStore + LinkStore> LaunchDispatcher<S> {
    /// Apply a nonced map/unmap request and pick where to send the browser.
    ///
    /// Without link management rights nothing is written and `target_action`
    /// is not followed. Rejected nonces are skipped silently.
    pub fn handle_mapping_request(
        &self,
        req: &MappingRequest,
        session: &impl SessionStore,
    ) -> MappingOutcome {
        let scope = req.collection.unwrap_or(self.primary_collection());
        let allowed = match can_manage_links(self.store(), session, scope) {
            Ok(allowed) => allowed,
            Err(e) => {
                tracing::warn!(event = "mapping_capability_check_failed", error = %e);
                false
            }
        };

        if !allowed {
            tracing::info!(
                event = "mapping_denied",
                collection = %scope,
                signed_in = session.current_session().is_some()
            );
            return MappingOutcome::Redirect(self.back_or_home(req));
        }

        if !req.resource_link_id.is_empty() && !req.target_action.is_empty() {
            let map = MapRequest {
                resource_link_id: req.resource_link_id.clone(),
                target_action: req.target_action.clone(),
                collection: req.collection,
            };
            match self.mapper.upsert_link(&map, session, &req.nonce) {
                Ok(_) => {}
                Err(e) if e.is_denied() => {
                    tracing::debug!(event = "map_skipped", reason = %e);
                }
                Err(e) => {
                    tracing::error!(
                        event = "map_failed",
                        resource_link_id = %req.resource_link_id,
                        target = %req.target_action,
                        error = %e
                    );
                    return MappingOutcome::Halt(e);
                }
            }
        }

        if req.action == "delete" {
            if let Some(id) = req.numeric_id() {
                match self
                    .mapper
                    .delete_link(id, req.collection, session, &req.nonce)
                {
                    Ok(_) => {}
                    Err(e) if e.is_denied() => {
                        tracing::debug!(event = "unmap_skipped", reason = %e);
                    }
                    Err(e) => {
                        tracing::error!(event = "unmap_failed", id, error = %e);
                        return MappingOutcome::Halt(e);
                    }
                }
            }
        }

        if !req.target_action.is_empty() {
            return MappingOutcome::Redirect(Redirect::to(req.target_action.clone()));
        }
        MappingOutcome::Redirect(self.back_or_home(req))
    }

    fn back_or_home(&self, req: &MappingRequest) -> Redirect {
        match &req.referrer {
            Some(referrer) => Redirect::to(referrer.clone()),
            None => Redirect::to(self.primary_home_url.clone()),
        }
    }
}
