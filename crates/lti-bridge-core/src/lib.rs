//! LTI launch bridge: account resolution and resource-link mapping.
//!
//! An external LTI layer validates each launch and hands its parameters to
//! this crate, which:
//!
//! - finds or creates the local account named by the launch and switches the
//!   session to it ([`AccountResolver`])
//! - enrolls the account in the launch's target collection, subject to the
//!   collection's teachers-only setting
//! - picks the redirect for the launch ([`LaunchDispatcher`])
//! - maps opaque `resource_link_id`s onto pages through a nonce-protected
//!   endpoint ([`LinkMapper`])
//!
//! # Quick Start
//!
//! ```no_run
//! use lti_bridge_core::{BridgeConfig, LaunchContext, LaunchDispatcher, RequestSession, SqliteStore};
//! use std::collections::HashMap;
//!
//! # fn example(params: HashMap<String, String>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = BridgeConfig::load(std::path::Path::new("lti-bridge.yaml"))?;
//! let store = SqliteStore::open(&config.database_path)?;
//! let dispatcher = LaunchDispatcher::new(store, &config, config.nonce.issuer());
//!
//! let ctx = LaunchContext::from_params(&params, &config.login_param);
//! let mut session = RequestSession::anonymous();
//! let report = dispatcher.handle_launch(&ctx, &mut session);
//! println!("302 -> {}", report.redirect.location);
//! # Ok(())
//! # }
//! ```

pub mod accounts;
pub mod capability;
pub mod config;
pub mod content;
pub mod dispatch;
pub mod error;
pub mod links;
pub mod model;
pub mod nonce;
pub mod roles;
pub mod session;
pub mod store;

pub use accounts::{can_manage_links, default_email, AccountResolver, ResolveOutcome};
pub use capability::{Capability, SiteRole};
pub use config::{BridgeConfig, ConfigError, LaunchMode};
pub use content::{render_link_affordances, PageView};
pub use dispatch::{
    LaunchDispatcher, LaunchReport, LaunchState, MappingOutcome, MappingRequest, Redirect,
    RouteKind,
};
pub use error::{BridgeError, BridgeResult};
pub use links::{LinkMapper, MapRequest};
pub use model::{
    Account, AccountId, Collection, CollectionId, EnrollmentRecord, LaunchContext, LinkLookup,
    LinkMap,
};
pub use nonce::{NonceAction, NonceIssuer};
pub use roles::{highest_role, parse_roles, RoleRank};
pub use session::{RequestSession, SessionChange, SessionStore};
pub use store::{AccountStore, LinkStore, SqliteStore};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
