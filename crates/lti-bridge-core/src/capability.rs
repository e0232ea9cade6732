//! Collection roles and the capabilities they grant.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Named permission bit on an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Create and remove resource-link mappings.
    ManageLinks,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ManageLinks => "link_lti_launch",
        }
    }
}

/// Role of an account within one collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteRole {
    Administrator,
    Editor,
    Author,
    Contributor,
    Subscriber,
}

impl SiteRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Administrator => "administrator",
            Self::Editor => "editor",
            Self::Author => "author",
            Self::Contributor => "contributor",
            Self::Subscriber => "subscriber",
        }
    }
}

impl fmt::Display for SiteRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SiteRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "administrator" | "admin" => Ok(Self::Administrator),
            "editor" => Ok(Self::Editor),
            "author" => Ok(Self::Author),
            "contributor" => Ok(Self::Contributor),
            "subscriber" => Ok(Self::Subscriber),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Grants written by capability setup.
pub const DEFAULT_GRANTS: &[(SiteRole, Capability)] = &[
    (SiteRole::Administrator, Capability::ManageLinks),
    (SiteRole::Editor, Capability::ManageLinks),
];
