//! Launch, account and link-map types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Default launch parameter carrying the LMS login name.
pub const DEFAULT_LOGIN_PARAM: &str = "custom_canvas_user_login_id";

/// Local account id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub i64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Collection (site) id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionId(pub i64);

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl CollectionId {
    /// Parse a `blog` parameter. Empty, zero and non-numeric values mean "none".
    pub fn parse_param(raw: &str) -> Option<Self> {
        match raw.trim().parse::<i64>() {
            Ok(id) if id > 0 => Some(Self(id)),
            _ => None,
        }
    }
}

/// Parameters of one inbound launch, already validated upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchContext {
    pub login: String,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub email: Option<String>,
    /// Canvas' `ext_roles`; wins over `roles` whenever present.
    pub ext_roles: Option<String>,
    pub roles: Option<String>,
    pub context_id: String,
    pub context_title: String,
    pub institution_id: String,
    pub institution_name: String,
    pub target_collection: Option<CollectionId>,
    pub resource_link_id: String,
    pub page_title: Option<String>,
    pub page_id: Option<String>,
    pub custom_page_id: Option<String>,
    pub post_message_navigation: bool,
}

impl LaunchContext {
    /// Build a context from the raw form/query parameter map.
    pub fn from_params(params: &HashMap<String, String>, login_param: &str) -> Self {
        let text = |key: &str| params.get(key).cloned().unwrap_or_default();
        let non_empty = |key: &str| {
            params
                .get(key)
                .filter(|v| !v.trim().is_empty())
                .cloned()
        };

        Self {
            login: text(login_param).trim().to_string(),
            given_name: non_empty("lis_person_name_given"),
            family_name: non_empty("lis_person_name_family"),
            email: non_empty("lis_person_contact_email_primary"),
            ext_roles: params.get("ext_roles").cloned(),
            roles: params.get("roles").cloned(),
            context_id: text("context_id"),
            context_title: text("context_title"),
            institution_id: text("tool_consumer_instance_guid"),
            institution_name: text("tool_consumer_instance_name"),
            target_collection: params
                .get("blog")
                .and_then(|b| CollectionId::parse_param(b)),
            resource_link_id: text("resource_link_id"),
            page_title: non_empty("page_title"),
            page_id: non_empty("page_id"),
            custom_page_id: non_empty("custom_page_id"),
            post_message_navigation: non_empty("ext_post_message_navigation").is_some(),
        }
    }

    pub fn has_login(&self) -> bool {
        !self.login.is_empty()
    }

    /// True when either name part was supplied.
    pub fn has_name(&self) -> bool {
        self.given_name.is_some() || self.family_name.is_some()
    }
}

/// A local account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub login: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Fields for a new account row.
#[derive(Debug, Clone)]
pub struct NewAccount<'a> {
    pub login: &'a str,
    pub email: &'a str,
    pub password_digest: &'a str,
}

/// Last-seen launch metadata for one (account, collection).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentRecord {
    pub lti_user_id: String,
    pub lti_context_id: String,
    pub lti_context_name: String,
    pub lti_school_id: String,
    pub lti_school_name: String,
    pub lti_role: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lti_first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lti_last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lti_email: Option<String>,
    pub timestamp: i64,
}

impl EnrollmentRecord {
    pub fn from_launch(ctx: &LaunchContext, roles: Vec<String>, now: DateTime<Utc>) -> Self {
        Self {
            lti_user_id: ctx.login.clone(),
            lti_context_id: ctx.context_id.clone(),
            lti_context_name: ctx.context_title.clone(),
            lti_school_id: ctx.institution_id.clone(),
            lti_school_name: ctx.institution_name.clone(),
            lti_role: roles,
            lti_first_name: ctx.given_name.clone(),
            lti_last_name: ctx.family_name.clone(),
            lti_email: ctx.email.clone(),
            timestamp: now.timestamp(),
        }
    }
}

/// A persisted resource-link mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkMap {
    pub id: i64,
    pub resource_link_id: String,
    pub target_action: String,
    pub account_id: Option<AccountId>,
    pub collection_id: Option<CollectionId>,
}

/// Result of a link-map lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkLookup {
    Found(LinkMap),
    /// No row; carries the identifier that was queried.
    NotFound { resource_link_id: String },
}

impl LinkLookup {
    pub fn resource_link_id(&self) -> &str {
        match self {
            Self::Found(map) => &map.resource_link_id,
            Self::NotFound { resource_link_id } => resource_link_id,
        }
    }

    /// Target of a found map, when non-empty.
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::Found(map) if !map.target_action.is_empty() => Some(&map.target_action),
            _ => None,
        }
    }

    pub fn into_found(self) -> Option<LinkMap> {
        match self {
            Self::Found(map) => Some(map),
            Self::NotFound { .. } => None,
        }
    }
}

/// A collection row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: CollectionId,
    pub url: String,
    pub title: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_from_params_maps_lti_fields() {
        let ctx = LaunchContext::from_params(
            &params(&[
                ("custom_canvas_user_login_id", " jdoe "),
                ("lis_person_name_given", "Jane"),
                ("lis_person_name_family", ""),
                ("ext_roles", "urn:lti:role:ims/lis/Instructor"),
                ("context_id", "ctx-1"),
                ("blog", "12"),
                ("resource_link_id", "rl-9"),
                ("page_id", "10"),
                ("ext_post_message_navigation", "true"),
            ]),
            DEFAULT_LOGIN_PARAM,
        );

        assert_eq!(ctx.login, "jdoe");
        assert_eq!(ctx.given_name.as_deref(), Some("Jane"));
        assert_eq!(ctx.family_name, None);
        assert_eq!(ctx.target_collection, Some(CollectionId(12)));
        assert_eq!(ctx.resource_link_id, "rl-9");
        assert_eq!(ctx.page_id.as_deref(), Some("10"));
        assert!(ctx.post_message_navigation);
        assert!(ctx.has_name());
    }

    #[test]
    fn test_from_params_honours_custom_login_param() {
        let ctx = LaunchContext::from_params(
            &params(&[("user_login", "abc"), ("custom_canvas_user_login_id", "x")]),
            "user_login",
        );
        assert_eq!(ctx.login, "abc");
    }

    #[test]
    fn test_blog_param_zero_or_garbage_is_none() {
        assert_eq!(CollectionId::parse_param("0"), None);
        assert_eq!(CollectionId::parse_param(""), None);
        assert_eq!(CollectionId::parse_param("abc"), None);
        assert_eq!(CollectionId::parse_param("7"), Some(CollectionId(7)));
    }

    #[test]
    fn test_lookup_target_ignores_empty_target() {
        let found = LinkLookup::Found(LinkMap {
            id: 1,
            resource_link_id: "rl".into(),
            target_action: String::new(),
            account_id: None,
            collection_id: None,
        });
        assert_eq!(found.target(), None);
        assert_eq!(found.resource_link_id(), "rl");

        let missing = LinkLookup::NotFound {
            resource_link_id: "other".into(),
        };
        assert_eq!(missing.resource_link_id(), "other");
        assert!(missing.into_found().is_none());
    }
}
