use super::{load_config, open_store};
use crate::cli::args::{MembersArgs, MembersSub};
use crate::exit_codes::{CONFIG_ERROR, NOT_FOUND, SUCCESS};
use lti_bridge_core::store::AccountStore;
use lti_bridge_core::{CollectionId, SiteRole};
use std::path::Path;

pub fn run(config_path: &Path, args: MembersArgs) -> anyhow::Result<i32> {
    let config = load_config(config_path)?;
    let store = open_store(&config)?;

    match args.cmd {
        MembersSub::Grant {
            login,
            collection,
            role,
        } => {
            let role: SiteRole = match role.parse() {
                Ok(role) => role,
                Err(e) => {
                    eprintln!("{e}");
                    return Ok(CONFIG_ERROR);
                }
            };
            let Some(account) = store.find_account_by_login(&login)? else {
                eprintln!("no account with login '{login}'");
                return Ok(NOT_FOUND);
            };
            store.set_member_role(account.id, CollectionId(collection), role)?;
            tracing::info!(
                event = "member_role_granted",
                account = %account.id,
                collection,
                role = %role
            );
            println!("{} is {role} in collection {collection}", account.login);
        }
    }
    Ok(SUCCESS)
}
