use std::path::PathBuf;

use clap::{Parser, Subcommand};

const DEFAULT_API_BASE: &str = "http://127.0.0.1:8080";

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "pseudo",
    about = "Command-line client for the pseudocode editor service",
    version
)]
pub(crate) struct Cli {
    #[arg(
        long,
        env = "PSEUDO_API_BASE",
        default_value = DEFAULT_API_BASE,
        global = true,
        help = "Base URL of the editor service"
    )]
    pub(crate) api_base: String,

    #[arg(
        long,
        env = "PSEUDO_REQUEST_TIMEOUT_MS",
        default_value_t = 30_000,
        value_parser = parse_positive_u64,
        global = true,
        help = "HTTP timeout in milliseconds for file, auth and health requests"
    )]
    pub(crate) request_timeout_ms: u64,

    #[arg(
        long,
        env = "PSEUDO_EXECUTION_TIMEOUT_MS",
        value_parser = parse_positive_u64,
        global = true,
        help = "Timeout in milliseconds for run and input requests (default: none)"
    )]
    pub(crate) execution_timeout_ms: Option<u64>,

    #[arg(long, env = "PSEUDO_USERNAME", global = true)]
    pub(crate) username: Option<String>,

    #[arg(
        long,
        env = "PSEUDO_PASSWORD",
        hide_env_values = true,
        global = true
    )]
    pub(crate) password: Option<String>,

    #[command(subcommand)]
    pub(crate) command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub(crate) enum CliCommand {
    /// Run a pseudocode program, prompting on stdin for INPUT statements.
    Run {
        path: PathBuf,
        #[arg(long, help = "Enable strict type checking")]
        strict: bool,
        #[arg(long, help = "Ask the interpreter for debug output")]
        debug: bool,
    },
    /// Sign in and list the account's files.
    Files,
    /// Check service health.
    Health,
    /// List the bundled example programs.
    Examples,
}
