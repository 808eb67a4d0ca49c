//! # CLI Layer
//!
//! This module is **one possible UI client** for drydock. It is the only place
//! that knows about the terminal, the environment and exit codes.
//!
//! ## Responsibilities
//!
//! 1. **Argument Parsing**: shell arguments into typed commands via clap
//! 2. **Context Setup**: config discovery, tracing, `AppContext` with the API
//! 3. **API Dispatch**: call the matching `DrydockApi` method
//! 4. **Output Formatting**: `CmdResult` and deployment reports to the terminal
//! 5. **Exit Codes**:
//!    - `0` success, or a prompt the user cancelled
//!    - `1` any error, including a failed deployment step
//!    - `2` a start/stop/restart whose final state could not be confirmed
//!
//! ## Structure
//!
//! - `run()`: Main dispatch logic (called by `main.rs`)
//! - `init_context()`: Builds `AppContext` with API and configuration
//! - `handle_*()`: Per-command handlers that call the API and print

use super::print::{
    print_app_detail, print_apps, print_cancelled, print_failure, print_logs, print_messages,
    print_report, print_snapshots,
};
use super::setup::{AppsCommands, Cli, Commands, LogsCommands, SnapshotsCommands};
use clap::Parser;
use directories::BaseDirs;
use drydock::api::DrydockApi;
use drydock::commands::deploy::Deployment;
use drydock::commands::CmdResult;
use drydock::config::DrydockConfig;
use drydock::error::Result;
use drydock::prompt::TerminalPrompter;
use drydock::remote::http::HttpPlatform;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const LOG_ENV: &str = "DRYDOCK_LOG";
const UNCONFIRMED_EXIT: u8 = 2;

struct AppContext {
    api: DrydockApi<HttpPlatform, TerminalPrompter>,
}

pub fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut ctx = init_context(&cli)?;

    match cli.command {
        Commands::Deploy => Ok(handle_deploy(&mut ctx)),
        Commands::Apps(cmd) => match cmd {
            AppsCommands::Create => handle_result(ctx.api.create_app()?),
            AppsCommands::List => handle_list_apps(&ctx),
            AppsCommands::View { name } => handle_view_app(&ctx, name),
            AppsCommands::Update { name } => handle_result(ctx.api.update_app(name)?),
            AppsCommands::Destroy { name } => {
                handle_result(ctx.api.destroy_app(name, cli.yes)?)
            }
            AppsCommands::Start { name } => handle_lifecycle(ctx.api.start_app(name)?),
            AppsCommands::Stop { name } => handle_lifecycle(ctx.api.stop_app(name)?),
            AppsCommands::Restart { name } => handle_lifecycle(ctx.api.restart_app(name)?),
        },
        Commands::Snapshots(cmd) => match cmd {
            SnapshotsCommands::List { app } => handle_list_snapshots(&ctx, app),
            SnapshotsCommands::Create { version } => {
                handle_result(ctx.api.create_snapshot(version)?)
            }
            SnapshotsCommands::Activate { app, id } => {
                handle_result(ctx.api.activate_snapshot(app, id)?)
            }
            SnapshotsCommands::Destroy { app, id } => {
                handle_result(ctx.api.destroy_snapshot(app, id, cli.yes)?)
            }
        },
        Commands::Logs(cmd) => match cmd {
            LogsCommands::All { lines } => handle_logs(ctx.api.all_logs(lines)?),
            LogsCommands::App { name, lines } => handle_logs(ctx.api.app_logs(name, lines)?),
        },
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "drydock=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        )
        .try_init();
}

fn init_context(cli: &Cli) -> Result<AppContext> {
    let cwd = std::env::current_dir()?;
    let home = BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf());

    let (mut config, source) =
        DrydockConfig::discover(&cwd, cli.config.as_deref(), home.as_deref())?;
    match &source {
        Some(path) => debug!(path = %path.display(), "loaded config"),
        None => debug!("no config file found, using defaults"),
    }

    if let Some(host) = &cli.remote_host {
        config.remote_host = host.clone();
    }
    if let Some(username) = &cli.username {
        config.username = Some(username.clone());
    }
    if let Some(password) = &cli.password {
        config.password = Some(password.clone());
    }

    let platform = HttpPlatform::new(&config)?;
    let prompter = TerminalPrompter::new();
    Ok(AppContext {
        api: DrydockApi::new(platform, prompter, cwd),
    })
}

fn handle_result(result: CmdResult) -> Result<ExitCode> {
    if !result.affected_apps.is_empty() {
        print_apps(&result.affected_apps);
    }
    if !result.listed_snapshots.is_empty() {
        print_snapshots(&result.listed_snapshots, None);
    }
    print_messages(&result.messages);
    Ok(ExitCode::SUCCESS)
}

fn handle_deploy(ctx: &mut AppContext) -> ExitCode {
    match ctx.api.deploy() {
        Ok(Deployment::Deployed(report)) => {
            print_report(&report);
            ExitCode::SUCCESS
        }
        Ok(Deployment::Cancelled { step, completed }) => {
            print_cancelled(step, &completed);
            ExitCode::SUCCESS
        }
        Err(failure) => {
            print_failure(&failure);
            ExitCode::FAILURE
        }
    }
}

fn handle_list_apps(ctx: &AppContext) -> Result<ExitCode> {
    let result = ctx.api.list_apps()?;
    print_apps(&result.listed_apps);
    print_messages(&result.messages);
    Ok(ExitCode::SUCCESS)
}

fn handle_view_app(ctx: &AppContext, name: Option<String>) -> Result<ExitCode> {
    let result = ctx.api.view_app(name)?;
    for app in &result.affected_apps {
        print_app_detail(app);
    }
    print_messages(&result.messages);
    Ok(ExitCode::SUCCESS)
}

fn handle_list_snapshots(ctx: &AppContext, app: Option<String>) -> Result<ExitCode> {
    let result = ctx.api.list_snapshots(app)?;
    print_snapshots(&result.listed_snapshots, None);
    print_messages(&result.messages);
    Ok(ExitCode::SUCCESS)
}

fn handle_logs(result: CmdResult) -> Result<ExitCode> {
    print_logs(&result.log_lines);
    print_messages(&result.messages);
    Ok(ExitCode::SUCCESS)
}

/// Unconfirmed transitions print a warning and exit non-zero.
fn handle_lifecycle(result: CmdResult) -> Result<ExitCode> {
    print_messages(&result.messages);
    match &result.transition {
        Some(t) if !t.is_confirmed() => Ok(ExitCode::from(UNCONFIRMED_EXIT)),
        _ => Ok(ExitCode::SUCCESS),
    }
}
