use crate::logging::LogFormat;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "lti-bridge",
    version,
    about = "Bridge LTI launches into local sessions and map resource links to pages"
)]
pub struct Cli {
    /// Config file (missing file means built-in defaults)
    #[arg(
        long,
        global = true,
        env = "LTI_BRIDGE_CONFIG",
        default_value = "lti-bridge.yaml"
    )]
    pub config: PathBuf,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Serve the launch and mapping endpoints
    Serve(ServeArgs),
    /// Create or upgrade the database schema and capability grants
    Migrate,
    /// Manage collections and their settings
    Collections(CollectionsArgs),
    /// Manage collection memberships
    Members(MembersArgs),
    /// Inspect resource-link maps
    Maps(MapsArgs),
    /// Replay a launch from a parameter file and print the redirect
    Launch(LaunchArgs),
    Version,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Listen address; overrides `bind` from config
    #[arg(long)]
    pub bind: Option<String>,
}

#[derive(Args, Debug)]
pub struct CollectionsArgs {
    #[command(subcommand)]
    pub cmd: CollectionsSub,
}

#[derive(Subcommand, Debug)]
pub enum CollectionsSub {
    /// Register a collection (or update its URL and title)
    Add {
        id: i64,
        url: String,
        #[arg(long, default_value = "")]
        title: String,
    },
    List,
    /// Restrict self-enrollment to teachers and admins
    TeachersOnly {
        id: i64,
        #[arg(value_enum)]
        state: Toggle,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

#[derive(Args, Debug)]
pub struct MembersArgs {
    #[command(subcommand)]
    pub cmd: MembersSub,
}

#[derive(Subcommand, Debug)]
pub enum MembersSub {
    /// Set an account's role in a collection
    Grant {
        login: String,
        collection: i64,
        /// administrator, editor, author, contributor or subscriber
        role: String,
    },
}

#[derive(Args, Debug)]
pub struct MapsArgs {
    #[command(subcommand)]
    pub cmd: MapsSub,
}

#[derive(Subcommand, Debug)]
pub enum MapsSub {
    List {
        /// Only maps whose target equals this URL
        #[arg(long)]
        target: Option<String>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Args, Debug)]
pub struct LaunchArgs {
    /// YAML or JSON map of launch parameters
    pub params: PathBuf,
}
