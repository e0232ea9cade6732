//! Process exit codes of `lti-bridge`. Scripts rely on these values.

use lti_bridge_core::{BridgeError, ConfigError};

pub const SUCCESS: i32 = 0;
pub const RUNTIME_ERROR: i32 = 1; // Unclassified failure (I/O, bind, ...)
pub const CONFIG_ERROR: i32 = 2; // Bad config file, env or arguments
pub const DENIED: i32 = 3; // Capability or nonce check failed
pub const STORE_ERROR: i32 = 4; // SQLite read/write failed
pub const NOT_FOUND: i32 = 5; // Named account or collection does not exist

/// Map a command failure onto an exit code by its root cause.
pub fn for_error(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<BridgeError>() {
            return e.exit_code();
        }
        if cause.downcast_ref::<ConfigError>().is_some() {
            return CONFIG_ERROR;
        }
    }
    RUNTIME_ERROR
}
