use super::{load_config, open_store};
use crate::cli::args::{MapsArgs, MapsSub, OutputFormat};
use crate::exit_codes::SUCCESS;
use lti_bridge_core::store::LinkStore;
use std::path::Path;

pub fn run(config_path: &Path, args: MapsArgs) -> anyhow::Result<i32> {
    let config = load_config(config_path)?;
    let store = open_store(&config)?;

    match args.cmd {
        MapsSub::List { target, format } => {
            let maps = match target {
                Some(target) => store.links_by_target(&target)?,
                None => store.list_links()?,
            };
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&maps)?),
                OutputFormat::Text => {
                    for m in &maps {
                        let owner = m.account_id.map(|a| a.to_string()).unwrap_or_default();
                        let blog = m.collection_id.map(|c| c.to_string()).unwrap_or_default();
                        println!(
                            "{}\t{}\t{}\tuser={owner}\tblog={blog}",
                            m.id, m.resource_link_id, m.target_action
                        );
                    }
                }
            }
        }
    }
    Ok(SUCCESS)
}
