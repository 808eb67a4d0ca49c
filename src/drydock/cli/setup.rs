use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Returns the version string, including git hash and commit date for non-release builds.
/// Format: "0.3.2" for releases, "0.3.2@abc1234 2024-01-15 14:30" for dev builds
fn get_version() -> &'static str {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    const GIT_HASH: &str = env!("GIT_HASH");
    const GIT_COMMIT_DATE: &str = env!("GIT_COMMIT_DATE");
    const IS_RELEASE: &str = env!("IS_RELEASE");

    use std::sync::OnceLock;
    static VERSION_STRING: OnceLock<String> = OnceLock::new();

    VERSION_STRING.get_or_init(|| {
        if IS_RELEASE == "true" || GIT_HASH.is_empty() {
            VERSION.to_string()
        } else {
            format!("{}@{} {}", VERSION, GIT_HASH, GIT_COMMIT_DATE)
        }
    })
}

#[derive(Parser, Debug)]
#[command(name = "drydock", bin_name = "drydock", version = get_version())]
#[command(about = "Deploy and manage applications on a hosting platform", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true, help_heading = "Options")]
    pub verbose: bool,

    /// Skip the confirmation of destroy commands
    #[arg(short, long, global = true, help_heading = "Options")]
    pub yes: bool,

    /// Use this config file instead of searching for .drydockconf
    #[arg(short, long, global = true, value_name = "PATH", help_heading = "Options")]
    pub config: Option<PathBuf>,

    /// Platform host, overrides the config file
    #[arg(long, global = true, env = "DRYDOCK_REMOTE_HOST", help_heading = "Connection")]
    pub remote_host: Option<String>,

    /// Account name, overrides the config file
    #[arg(long, global = true, env = "DRYDOCK_USERNAME", help_heading = "Connection")]
    pub username: Option<String>,

    /// Account password, overrides the config file
    #[arg(
        long,
        global = true,
        env = "DRYDOCK_PASSWORD",
        hide_env_values = true,
        help_heading = "Connection"
    )]
    pub password: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Deploy the app in the current directory
    Deploy,

    /// Manage apps
    #[command(subcommand)]
    Apps(AppsCommands),

    /// Manage snapshots
    #[command(subcommand)]
    Snapshots(SnapshotsCommands),

    /// Read recent app logs
    #[command(subcommand)]
    Logs(LogsCommands),
}

#[derive(Subcommand, Debug)]
pub enum AppsCommands {
    /// Create the app described by package.json
    Create,

    /// List your apps
    #[command(alias = "ls")]
    List,

    /// Show an app (defaults to the one in package.json)
    View { name: Option<String> },

    /// Push package.json changes without deploying code
    Update { name: Option<String> },

    /// Destroy an app and all its snapshots
    Destroy { name: Option<String> },

    /// Start an app
    Start { name: Option<String> },

    /// Stop an app
    Stop { name: Option<String> },

    /// Stop and start an app
    Restart { name: Option<String> },
}

#[derive(Subcommand, Debug)]
pub enum SnapshotsCommands {
    /// List snapshots, most recent first
    #[command(alias = "ls")]
    List { app: Option<String> },

    /// Package the current directory and upload it without activating
    Create {
        /// Snapshot version (defaults to the package.json version)
        version: Option<String>,
    },

    /// Make a snapshot the one the app runs
    Activate {
        app: Option<String>,
        /// Snapshot id; prompts when omitted and there is more than one
        #[arg(long)]
        id: Option<String>,
    },

    /// Permanently remove a snapshot
    Destroy {
        app: Option<String>,
        /// Snapshot id; prompts when omitted and there is more than one
        #[arg(long)]
        id: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum LogsCommands {
    /// Logs of every app
    All {
        /// Lines per app (default 10)
        lines: Option<usize>,
    },

    /// Logs of one app (defaults to the one in package.json)
    App {
        name: Option<String>,
        /// Lines to show (default 10)
        lines: Option<usize>,
    },
}
