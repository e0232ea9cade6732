use super::args::*;
use anyhow::Context;
use lti_bridge_core::{BridgeConfig, SqliteStore};
use std::path::Path;

pub mod collections;
pub mod launch;
pub mod maps;
pub mod members;
pub mod migrate;
pub mod serve;

use crate::exit_codes::SUCCESS;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Version => {
            println!("lti-bridge {}", lti_bridge_core::VERSION);
            Ok(SUCCESS)
        }
        Command::Serve(args) => serve::run(&cli.config, args).await,
        Command::Migrate => migrate::run(&cli.config),
        Command::Collections(args) => collections::run(&cli.config, args),
        Command::Members(args) => members::run(&cli.config, args),
        Command::Maps(args) => maps::run(&cli.config, args),
        Command::Launch(args) => launch::run(&cli.config, args),
    }
}

pub(crate) fn load_config(path: &Path) -> anyhow::Result<BridgeConfig> {
    BridgeConfig::load(path).with_context(|| format!("loading config {}", path.display()))
}

pub(crate) fn open_store(config: &BridgeConfig) -> anyhow::Result<SqliteStore> {
    SqliteStore::open(&config.database_path)
        .with_context(|| format!("opening database {}", config.database_path.display()))
}
