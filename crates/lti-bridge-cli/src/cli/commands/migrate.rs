use super::{load_config, open_store};
use crate::exit_codes::SUCCESS;
use std::path::Path;

/// Opening the store creates and upgrades the schema; capabilities are
/// re-granted explicitly so a manual `DELETE` can be repaired.
pub fn run(config_path: &Path) -> anyhow::Result<i32> {
    let config = load_config(config_path)?;
    let store = open_store(&config)?;
    store.setup_capabilities()?;

    let version = store.schema_version()?.unwrap_or_default();
    println!(
        "database {} at schema {version}",
        config.database_path.display()
    );
    Ok(SUCCESS)
}
