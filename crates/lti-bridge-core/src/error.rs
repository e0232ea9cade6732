//! Error types for launch resolution and link mapping.

/// Bridge errors.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Account creation, profile update, membership or session write failed.
    #[error("account persistence failed: {message}")]
    AccountPersistence { message: String },

    /// Insert, update or delete of a link map failed at the store.
    #[error("mapping persistence failed: {message}")]
    MappingPersistence { message: String },

    /// Capability or nonce check failed.
    #[error("authorization denied: {reason}")]
    AuthorizationDenied { reason: String },

    /// Caller supplied a value the store cannot hold.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl BridgeError {
    pub fn account(err: impl std::fmt::Display) -> Self {
        Self::AccountPersistence {
            message: err.to_string(),
        }
    }

    pub fn mapping(err: impl std::fmt::Display) -> Self {
        Self::MappingPersistence {
            message: err.to_string(),
        }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self::AuthorizationDenied {
            reason: reason.into(),
        }
    }

    /// Exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } | Self::InvalidInput { .. } => 2,
            Self::AuthorizationDenied { .. } => 3,
            Self::AccountPersistence { .. } | Self::MappingPersistence { .. } => 4,
        }
    }

    /// Authorization failures are skipped, not surfaced.
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::AuthorizationDenied { .. })
    }
}

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;
