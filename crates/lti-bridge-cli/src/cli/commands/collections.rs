use super::{load_config, open_store};
use crate::cli::args::{CollectionsArgs, CollectionsSub, Toggle};
use crate::exit_codes::{CONFIG_ERROR, SUCCESS};
use lti_bridge_core::store::{AccountStore, SETTING_TEACHERS_ONLY};
use lti_bridge_core::CollectionId;
use std::path::Path;

pub fn run(config_path: &Path, args: CollectionsArgs) -> anyhow::Result<i32> {
    let config = load_config(config_path)?;
    let store = open_store(&config)?;

    match args.cmd {
        CollectionsSub::Add { id, url, title } => {
            if id <= 0 {
                eprintln!("collection id must be positive");
                return Ok(CONFIG_ERROR);
            }
            if let Err(e) = url::Url::parse(&url) {
                eprintln!("'{url}' is not a URL: {e}");
                return Ok(CONFIG_ERROR);
            }
            store.add_collection(CollectionId(id), &url, &title)?;
            tracing::info!(event = "collection_added", collection = id, url = %url);
        }
        CollectionsSub::List => {
            for c in store.list_collections()? {
                let teachers_only = store
                    .get_setting(c.id, SETTING_TEACHERS_ONLY)?
                    .unwrap_or_else(|| "0".to_string());
                println!(
                    "{}\t{}\t{}\tteachers_only={teachers_only}",
                    c.id, c.url, c.title
                );
            }
        }
        CollectionsSub::TeachersOnly { id, state } => {
            let value = match state {
                Toggle::On => "1",
                Toggle::Off => "0",
            };
            store.set_setting(CollectionId(id), SETTING_TEACHERS_ONLY, value)?;
            tracing::info!(event = "teachers_only_set", collection = id, value);
        }
    }
    Ok(SUCCESS)
}
