use super::{load_config, open_store};
use crate::cli::args::ServeArgs;
use crate::exit_codes::SUCCESS;
use crate::server::{self, AppState};
use lti_bridge_core::LaunchDispatcher;
use std::path::Path;

pub async fn run(config_path: &Path, args: ServeArgs) -> anyhow::Result<i32> {
    let mut config = load_config(config_path)?;
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    let store = open_store(&config)?;
    let dispatcher = LaunchDispatcher::new(store, &config, config.nonce.issuer());

    tracing::info!(
        event = "serve_start",
        database = %config.database_path.display(),
        primary_collection = config.primary_collection_id,
        launch_mode = ?config.launch.mode
    );
    let bind = config.bind.clone();
    server::run(AppState::new(dispatcher, config), &bind).await?;
    Ok(SUCCESS)
}
