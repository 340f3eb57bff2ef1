use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use taskcent_shared::{TaskPriority, TaskStatus};
use tracing::debug;
use tracing_subscriber::EnvFilter;

pub const PASSWORD_ENV: &str = "TASKCENT_PASSWORD";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "taskcent",
    version,
    about = "Taskcent: command-line client for the task service",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Sign in and remember the session.
    Login(AuthArgs),
    /// Create an account and sign in.
    Signup(AuthArgs),
    /// Forget the saved session.
    Logout,
    /// List tasks.
    List,
    /// Create a task.
    Add(AddArgs),
    /// Change fields of an existing task.
    Edit(EditArgs),
    /// Show one task.
    Show { id: String },
    /// Delete a task after confirmation.
    Delete {
        id: String,
        #[arg(short = 'y', long = "yes")]
        yes: bool,
    },
    /// Step through task details interactively.
    Browse { id: Option<String> },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Login(_) => "login",
            Self::Signup(_) => "signup",
            Self::Logout => "logout",
            Self::List => "list",
            Self::Add(_) => "add",
            Self::Edit(_) => "edit",
            Self::Show { .. } => "show",
            Self::Delete { .. } => "delete",
            Self::Browse { .. } => "browse",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct AuthArgs {
    #[arg(long)]
    pub email: String,

    /// Falls back to the TASKCENT_PASSWORD environment variable.
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    pub title: String,

    /// Due date as YYYY-MM-DD.
    #[arg(long)]
    pub due: String,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long, value_parser = parse_priority)]
    pub priority: Option<TaskPriority>,

    #[arg(long, value_parser = parse_status)]
    pub status: Option<TaskStatus>,

    #[arg(long)]
    pub category: Option<String>,
}

/// Unspecified fields keep their current value; an empty string clears an
/// optional text field.
#[derive(Args, Debug, Clone)]
pub struct EditArgs {
    pub id: String,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub due: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long, value_parser = parse_priority)]
    pub priority: Option<TaskPriority>,

    #[arg(long, value_parser = parse_status)]
    pub status: Option<TaskStatus>,

    #[arg(long)]
    pub category: Option<String>,
}

fn parse_priority(s: &str) -> Result<TaskPriority, String> {
    TaskPriority::parse(&s.trim().to_ascii_lowercase())
        .ok_or_else(|| format!("expected one of high, medium, low; got {s:?}"))
}

fn parse_status(s: &str) -> Result<TaskStatus, String> {
    TaskStatus::parse(&s.trim().to_ascii_lowercase())
        .ok_or_else(|| format!("expected one of pending, in-progress, completed; got {s:?}"))
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}
