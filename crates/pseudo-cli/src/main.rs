mod bootstrap_helpers;
mod cli_args;
mod commands;
mod prompter;

use clap::Parser;

use crate::bootstrap_helpers::init_tracing;
use crate::cli_args::Cli;

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let code = match commands::execute(cli).await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error:#}");
            commands::EXIT_FAILURE
        }
    };
    // A pending stdin read would otherwise hold the runtime open on exit.
    std::process::exit(code);
}
