use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use pseudo_remote::{HttpApiClient, RemoteConfig};
use pseudo_session::{
    shared_file_session, ExecutionOutcome, ExecutionSession, FileListing, FileSessionConfig,
    FileSessionManager, InputPrompter, RunOptions, SessionModeController,
};

use crate::cli_args::{Cli, CliCommand};
use crate::prompter::LinePrompter;

pub(crate) const EXIT_FAILURE: i32 = 1;
pub(crate) const EXIT_CANCELLED: i32 = 130;

/// Dispatches the parsed command and returns the process exit code.
pub(crate) async fn execute(cli: Cli) -> Result<i32> {
    let client = Arc::new(HttpApiClient::new(RemoteConfig {
        api_base: cli.api_base.clone(),
        request_timeout_ms: cli.request_timeout_ms,
        execution_timeout_ms: cli.execution_timeout_ms,
        user_agent: None,
    })?);

    match &cli.command {
        CliCommand::Run {
            path,
            strict,
            debug,
        } => {
            let options = RunOptions {
                strict: *strict,
                debug: *debug,
            };
            run_program(client, path, options, &LinePrompter::stdio()).await
        }
        CliCommand::Files => list_files(client, &cli).await,
        CliCommand::Health => {
            let report = client.health().await?;
            println!(
                "status={} version={} interpreter={}",
                report.status, report.version, report.interpreter
            );
            Ok(0)
        }
        CliCommand::Examples => {
            for example in client.examples().await? {
                println!("{}\t{}\t{}", example.key, example.name, example.description);
            }
            Ok(0)
        }
    }
}

async fn run_program(
    client: Arc<HttpApiClient>,
    path: &Path,
    options: RunOptions,
    prompter: &dyn InputPrompter,
) -> Result<i32> {
    let source = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let session = Arc::new(ExecutionSession::new(client));

    let interrupt_session = Arc::clone(&session);
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt_session.cancel();
        }
    });
    let outcome = session.run_interactive(&source, options, prompter).await;
    interrupt.abort();

    let mut stdout = std::io::stdout().lock();
    match outcome? {
        ExecutionOutcome::Succeeded { output } => {
            for line in output {
                writeln!(stdout, "{line}")?;
            }
            Ok(0)
        }
        ExecutionOutcome::Failed { message, output } => {
            for line in output {
                writeln!(stdout, "{line}")?;
            }
            eprintln!("error: {message}");
            Ok(EXIT_FAILURE)
        }
        ExecutionOutcome::Cancelled => {
            let notice = session
                .snapshot()
                .notice
                .unwrap_or_else(|| "cancelled".to_string());
            eprintln!("{notice}");
            Ok(EXIT_CANCELLED)
        }
        ExecutionOutcome::AwaitingInput { .. } => {
            Err(anyhow!("execution stopped while waiting for input"))
        }
    }
}

async fn list_files(client: Arc<HttpApiClient>, cli: &Cli) -> Result<i32> {
    let username = cli
        .username
        .as_deref()
        .ok_or_else(|| anyhow!("--username (or PSEUDO_USERNAME) is required"))?;
    let password = cli
        .password
        .as_deref()
        .ok_or_else(|| anyhow!("--password (or PSEUDO_PASSWORD) is required"))?;

    let files = shared_file_session(FileSessionManager::new(
        client.clone(),
        FileSessionConfig::default(),
    ));
    let mut controller = SessionModeController::new(client, files.clone()).await;
    controller.initialize().await;
    if !controller.mode().is_authenticated() {
        controller.login(username, password).await?;
    }

    let listing = files.lock().await.listing();
    let code = match listing {
        FileListing::Entries(items) => {
            for item in items {
                let marker = if item.is_current { "*" } else { " " };
                println!("{marker} {}\t{}", item.id, item.name);
            }
            0
        }
        FileListing::Unavailable => {
            eprintln!("error: the account's files could not be loaded");
            EXIT_FAILURE
        }
        FileListing::SignInPlaceholder => {
            println!("{}", pseudo_session::ANONYMOUS_PLACEHOLDER);
            0
        }
    };
    controller.logout().await;
    Ok(code)
}
