//! Launch dispatch: setup, routing and the mapping endpoint.
//!
//! A launch moves through [`LaunchState`] and always ends in exactly one
//! [`Redirect`]. Failures while resolving or routing fall back to the primary
//! home URL.

use crate::accounts::{can_manage_links, AccountResolver, ResolveOutcome};
use crate::config::BridgeConfig;
use crate::error::BridgeResult;
use crate::links::LinkMapper;
use crate::model::{CollectionId, LaunchContext};
use crate::nonce::NonceIssuer;
use crate::session::SessionStore;
use crate::store::{AccountStore, LinkStore};

mod mapping;
pub mod routing;

pub use mapping::{MappingOutcome, MappingRequest};
pub use routing::RouteKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchState {
    LaunchReceived,
    AccountResolved,
    Routed(RouteKind),
    Redirected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub location: String,
}

impl Redirect {
    pub fn to(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
        }
    }
}

/// Result of [`LaunchDispatcher::handle_launch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchReport {
    pub redirect: Redirect,
    pub route: RouteKind,
    pub state: LaunchState,
    /// `None` when account resolution failed.
    pub resolve: Option<ResolveOutcome>,
}

#[derive(Debug, Clone)]
pub struct LaunchDispatcher<S> {
    resolver: AccountResolver<S>,
    mapper: LinkMapper<S>,
    primary_home_url: String,
}

impl<S: AccountStore + LinkStore + Clone> LaunchDispatcher<S> {
    pub fn new(store: S, config: &BridgeConfig, nonces: NonceIssuer) -> Self {
        let primary = config.primary_collection();
        Self {
            resolver: AccountResolver::new(
                store.clone(),
                primary,
                config.default_email_domain.clone(),
            ),
            mapper: LinkMapper::new(store, nonces, primary),
            primary_home_url: config.primary_home_url.clone(),
        }
    }
}

impl<S: AccountStore + LinkStore> LaunchDispatcher<S> {
    pub fn resolver(&self) -> &AccountResolver<S> {
        &self.resolver
    }

    pub fn mapper(&self) -> &LinkMapper<S> {
        &self.mapper
    }

    pub fn store(&self) -> &S {
        self.resolver.store()
    }

    pub fn primary_collection(&self) -> CollectionId {
        self.resolver.primary_collection()
    }

    pub fn primary_home_url(&self) -> &str {
        &self.primary_home_url
    }

    /// Base URL of `collection`, or the primary home when it is unknown.
    pub fn collection_url(&self, collection: Option<CollectionId>) -> BridgeResult<String> {
        let Some(id) = collection else {
            return Ok(self.primary_home_url.clone());
        };
        match self.store().get_collection(id)? {
            Some(c) => Ok(c.url),
            None => {
                tracing::warn!(event = "collection_unknown", collection = %id);
                Ok(self.primary_home_url.clone())
            }
        }
    }

    /// Resolve the account, then remember the launch's link id for users who
    /// can manage links.
    pub fn on_launch_setup(
        &self,
        ctx: &LaunchContext,
        session: &mut impl SessionStore,
    ) -> BridgeResult<ResolveOutcome> {
        let outcome = self.resolver.resolve_account(ctx, session)?;

        if let Some(account) = session.current_session() {
            let scope = ctx.target_collection.unwrap_or(self.primary_collection());
            if !ctx.resource_link_id.is_empty()
                && can_manage_links(self.store(), &*session, scope)?
            {
                self.mapper
                    .remember_last_link(account, &ctx.resource_link_id)?;
            }
        }
        Ok(outcome)
    }

    /// Pick the redirect for a launch. First matching rule wins.
    pub fn on_launch(
        &self,
        ctx: &LaunchContext,
        session: &impl SessionStore,
    ) -> BridgeResult<(RouteKind, Redirect)> {
        if let Some(target) = ctx.target_collection {
            let base = self.collection_url(Some(target))?;
            if let Some(path) = &ctx.page_title {
                return Ok((
                    RouteKind::PageTitle,
                    Redirect::to(routing::page_title_url(&base, path)),
                ));
            }
            if let Some(page) = ctx.page_id.as_deref().filter(|p| routing::is_numeric(p)) {
                return Ok((
                    RouteKind::PageId,
                    Redirect::to(routing::page_id_url(
                        &base,
                        page,
                        &ctx.context_id,
                        ctx.post_message_navigation,
                    )),
                ));
            }
            if let Some(page) = ctx
                .custom_page_id
                .as_deref()
                .filter(|p| routing::is_numeric(p))
            {
                return Ok((
                    RouteKind::CustomPageId,
                    Redirect::to(routing::page_id_url(&base, page, &ctx.context_id, false)),
                ));
            }
        }

        if !ctx.resource_link_id.is_empty() {
            let lookup = self.mapper.get_link(&ctx.resource_link_id, false, session)?;
            if let Some(target) = lookup.target() {
                return Ok((RouteKind::LinkMap, Redirect::to(target)));
            }
        }

        if let Some(target) = ctx.target_collection {
            let base = self.collection_url(Some(target))?;
            return Ok((
                RouteKind::CollectionHome,
                Redirect::to(routing::collection_home_url(&base)),
            ));
        }

        Ok((
            RouteKind::PrimaryHome,
            Redirect::to(self.primary_home_url.clone()),
        ))
    }

    /// Run setup then routing; always produces a redirect.
    pub fn handle_launch(
        &self,
        ctx: &LaunchContext,
        session: &mut impl SessionStore,
    ) -> LaunchReport {
        let mut state = LaunchState::LaunchReceived;
        tracing::debug!(event = "launch_state", state = ?state, login = %ctx.login);

        let resolve = match self.on_launch_setup(ctx, session) {
            Ok(outcome) => {
                state = LaunchState::AccountResolved;
                tracing::debug!(event = "launch_state", state = ?state);
                Some(outcome)
            }
            Err(e) => {
                tracing::warn!(event = "launch_setup_failed", login = %ctx.login, error = %e);
                None
            }
        };

        let (route, redirect) = if resolve.is_some() {
            self.on_launch(ctx, &*session).unwrap_or_else(|e| {
                tracing::warn!(event = "launch_route_failed", error = %e);
                self.fallback()
            })
        } else {
            self.fallback()
        };
        state = LaunchState::Routed(route);
        tracing::debug!(event = "launch_state", state = ?state);

        state = LaunchState::Redirected;
        tracing::info!(
            event = "launch_redirect",
            route = route.as_str(),
            location = %redirect.location
        );

        LaunchReport {
            redirect,
            route,
            state,
            resolve,
        }
    }

    fn fallback(&self) -> (RouteKind, Redirect) {
        (
            RouteKind::PrimaryHome,
            Redirect::to(self.primary_home_url.clone()),
        )
    }
}

#[cfg(test)]
mod tests;
