//! Bridge configuration: YAML file, then `LTI_BRIDGE_*` environment overrides.
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `LTI_BRIDGE_DATABASE` | SQLite database path |
//! | `LTI_BRIDGE_BIND` | HTTP listen address |
//! | `LTI_BRIDGE_PRIMARY_HOME_URL` | Redirect target of last resort |
//! | `LTI_BRIDGE_EMAIL_DOMAIN` | Domain for generated account emails |
//! | `LTI_BRIDGE_LOGIN_PARAM` | Launch parameter carrying the login |
//! | `LTI_BRIDGE_NONCE_SECRET` | Secret for mapping nonces |
//! | `LTI_BRIDGE_LAUNCH_MODE` | `strict` or `permissive` |
//! | `LTI_BRIDGE_UPSTREAM_TOKEN` | Token the upstream LTI validator sends |

use crate::model::{CollectionId, DEFAULT_LOGIN_PARAM};
use crate::nonce::{NonceIssuer, DEFAULT_NONCE_LIFETIME_SECS};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LaunchMode {
    /// Reject launches that lack the upstream token.
    #[default]
    Strict,
    /// Log launches that lack the upstream token but accept them.
    Permissive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchConfig {
    pub mode: LaunchMode,
    pub upstream_header: String,
    pub upstream_token: Option<String>,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            mode: LaunchMode::default(),
            upstream_header: "x-lti-upstream-token".to_string(),
            upstream_token: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NonceConfig {
    pub secret: Option<String>,
    pub lifetime_secs: i64,
}

impl Default for NonceConfig {
    fn default() -> Self {
        Self {
            secret: None,
            lifetime_secs: DEFAULT_NONCE_LIFETIME_SECS,
        }
    }
}

impl NonceConfig {
    pub fn issuer(&self) -> NonceIssuer {
        match &self.secret {
            Some(secret) => NonceIssuer::new(secret.as_bytes().to_vec(), self.lifetime_secs),
            None => {
                tracing::warn!(
                    event = "nonce_secret_missing",
                    "no nonce secret configured; mapping links will not survive a restart"
                );
                NonceIssuer::random(self.lifetime_secs)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub database_path: PathBuf,
    pub bind: String,
    pub primary_collection_id: i64,
    pub primary_home_url: String,
    pub default_email_domain: String,
    pub login_param: String,
    pub cookie_secure: bool,
    pub nonce: NonceConfig,
    pub launch: LaunchConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("lti-bridge.db"),
            bind: "127.0.0.1:8080".to_string(),
            primary_collection_id: 1,
            primary_home_url: "http://localhost:8080".to_string(),
            default_email_domain: "iu.edu".to_string(),
            login_param: DEFAULT_LOGIN_PARAM.to_string(),
            cookie_secure: true,
            nonce: NonceConfig::default(),
            launch: LaunchConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Load from `path` (defaults when the file is absent), apply env, validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut cfg = if path.exists() {
            Self::from_yaml_file(path)?
        } else {
            tracing::debug!(path = %path.display(), "config file absent, using defaults");
            Self::default()
        };
        cfg.apply_env();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    pub fn apply_env(&mut self) {
        if let Ok(v) = env::var("LTI_BRIDGE_DATABASE") {
            self.database_path = PathBuf::from(v);
        }
        if let Ok(v) = env::var("LTI_BRIDGE_BIND") {
            self.bind = v;
        }
        if let Ok(v) = env::var("LTI_BRIDGE_PRIMARY_HOME_URL") {
            self.primary_home_url = v;
        }
        if let Ok(v) = env::var("LTI_BRIDGE_EMAIL_DOMAIN") {
            self.default_email_domain = v;
        }
        if let Ok(v) = env::var("LTI_BRIDGE_LOGIN_PARAM") {
            self.login_param = v;
        }
        if let Ok(v) = env::var("LTI_BRIDGE_NONCE_SECRET") {
            if !v.is_empty() {
                self.nonce.secret = Some(v);
            }
        }
        if let Ok(v) = env::var("LTI_BRIDGE_LAUNCH_MODE") {
            self.launch.mode = match v.to_lowercase().as_str() {
                "permissive" => LaunchMode::Permissive,
                _ => LaunchMode::Strict,
            };
        }
        if let Ok(v) = env::var("LTI_BRIDGE_UPSTREAM_TOKEN") {
            if !v.is_empty() {
                self.launch.upstream_token = Some(v);
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.primary_collection_id <= 0 {
            return Err(ConfigError::Invalid(
                "primary_collection_id must be positive".to_string(),
            ));
        }
        url::Url::parse(&self.primary_home_url).map_err(|e| {
            ConfigError::Invalid(format!(
                "primary_home_url '{}' is not a URL: {e}",
                self.primary_home_url
            ))
        })?;
        if self.default_email_domain.trim().is_empty() || self.default_email_domain.contains('@')
        {
            return Err(ConfigError::Invalid(format!(
                "default_email_domain '{}' is not a domain",
                self.default_email_domain
            )));
        }
        if self.login_param.trim().is_empty() {
            return Err(ConfigError::Invalid("login_param is empty".to_string()));
        }
        if self.nonce.lifetime_secs < 60 {
            return Err(ConfigError::Invalid(
                "nonce.lifetime_secs must be at least 60".to_string(),
            ));
        }
        if self.launch.mode == LaunchMode::Strict && self.launch.upstream_token.is_none() {
            tracing::warn!(
                event = "launch_token_missing",
                "strict launch mode without upstream_token: every launch will be rejected"
            );
        }
        Ok(())
    }

    pub fn primary_collection(&self) -> CollectionId {
        CollectionId(self.primary_collection_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = BridgeConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.primary_collection(), CollectionId(1));
        assert_eq!(cfg.login_param, "custom_canvas_user_login_id");
        assert_eq!(cfg.default_email_domain, "iu.edu");
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let cfg = BridgeConfig::from_yaml_str(
            "primary_home_url: https://press.example.edu\nlaunch:\n  mode: permissive\n",
        )
        .unwrap();
        assert_eq!(cfg.primary_home_url, "https://press.example.edu");
        assert_eq!(cfg.launch.mode, LaunchMode::Permissive);
        assert_eq!(cfg.launch.upstream_header, "x-lti-upstream-token");
        assert_eq!(cfg.bind, "127.0.0.1:8080");
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(
            BridgeConfig::from_yaml_str("  \n").unwrap(),
            BridgeConfig::default()
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut cfg = BridgeConfig::default();
        cfg.default_email_domain = "user@iu.edu".to_string();
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));

        let mut cfg = BridgeConfig::default();
        cfg.primary_home_url = "not a url".to_string();
        assert!(cfg.validate().is_err());

        let mut cfg = BridgeConfig::default();
        cfg.primary_collection_id = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_from_yaml_file_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = BridgeConfig::from_yaml_file(&dir.path().join("absent.yaml"));
        assert!(matches!(cfg, Err(ConfigError::Read { .. })));
    }

    #[test]
    #[serial]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = BridgeConfig::load(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(cfg.primary_collection_id, 1);
    }

    #[test]
    #[serial]
    fn test_load_reads_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lti-bridge.yaml");
        std::fs::write(
            &path,
            "database_path: /tmp/x.db\nprimary_collection_id: 3\nnonce:\n  secret: abc\n",
        )
        .unwrap();
        let cfg = BridgeConfig::load(&path).unwrap();
        assert_eq!(cfg.database_path, PathBuf::from("/tmp/x.db"));
        assert_eq!(cfg.primary_collection(), CollectionId(3));
        assert_eq!(cfg.nonce.secret.as_deref(), Some("abc"));
        assert_eq!(cfg.nonce.lifetime_secs, DEFAULT_NONCE_LIFETIME_SECS);
    }

    #[test]
    fn test_malformed_yaml_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "primary_collection_id: [oops").unwrap();
        assert!(matches!(
            BridgeConfig::from_yaml_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    #[serial]
    fn test_env_overrides_file_values() {
        env::set_var("LTI_BRIDGE_EMAIL_DOMAIN", "example.edu");
        env::set_var("LTI_BRIDGE_LAUNCH_MODE", "PERMISSIVE");
        env::set_var("LTI_BRIDGE_NONCE_SECRET", "s3cret");

        let mut cfg = BridgeConfig::default();
        cfg.apply_env();

        env::remove_var("LTI_BRIDGE_EMAIL_DOMAIN");
        env::remove_var("LTI_BRIDGE_LAUNCH_MODE");
        env::remove_var("LTI_BRIDGE_NONCE_SECRET");

        assert_eq!(cfg.default_email_domain, "example.edu");
        assert_eq!(cfg.launch.mode, LaunchMode::Permissive);
        assert_eq!(cfg.nonce.secret.as_deref(), Some("s3cret"));
    }
}
