use clap::Parser;

mod cli;
pub mod exit_codes;
mod logging;
mod server;

use cli::args::Cli;
use cli::commands::dispatch;

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = logging::init_logging(cli.log_format) {
        eprintln!("warning: logging not initialised: {e}");
    }
    let code = match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("fatal: {e:?}");
            exit_codes::for_error(&e)
        }
    };
    std::process::exit(code);
}
