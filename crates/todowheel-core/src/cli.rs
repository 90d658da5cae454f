use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
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
    name = "todowheel",
    version,
    about = "Todo Wheel: goal-sorted tasks, a completion ledger, and a wheel to pick what's next",
    disable_help_subcommand = true,
    infer_subcommands = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    #[arg(long = "data")]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// One line typed into the interactive shell.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "todowheel",
    no_binary_name = true,
    disable_help_subcommand = true,
    disable_version_flag = true,
    infer_subcommands = true
)]
pub struct ShellLine {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Add a task to the list.
    Add {
        /// Task title; words are joined with spaces.
        #[arg(num_args = 0..)]
        title: Vec<String>,
        /// Estimated duration, e.g. `90`, `2h` or `"3 days"`.
        #[arg(short = 't', long = "time")]
        time: Option<String>,
        /// Unit for a bare `--time` amount: minutes, hours or days.
        #[arg(short = 'u', long = "unit", requires = "time")]
        unit: Option<String>,
        /// Goal category; defaults to the selected goal.
        #[arg(short = 'g', long = "goal")]
        goal: Option<String>,
    },
    /// Show active tasks under the selected goal.
    List {
        #[arg(short = 'g', long = "goal")]
        goal: Option<String>,
    },
    /// Mark a task completed.
    Done { id: String },
    /// Delete an active task.
    Delete { id: String },
    /// List goal categories.
    Goals,
    /// Manage goal categories.
    Goal {
        #[command(subcommand)]
        action: GoalAction,
    },
    /// Pick a random task from the selected goal.
    Spin {
        #[arg(short = 'g', long = "goal")]
        goal: Option<String>,
    },
    /// Show or edit the completion ledger.
    History {
        #[command(subcommand)]
        action: Option<HistoryAction>,
    },
    /// Sign in to hosted storage.
    Login { email: String },
    /// Sign out of hosted storage.
    Logout,
    /// Show the signed-in user and storage in use.
    Whoami,
    /// Run commands interactively.
    Shell,
    /// Print the version.
    Version,
    /// Leave the interactive shell.
    #[command(hide = true, alias = "quit")]
    Exit,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum GoalAction {
    /// Register a new goal category.
    Add {
        #[arg(num_args = 1.., required = true)]
        name: Vec<String>,
    },
    /// Select the goal that filters lists and spins.
    Use {
        #[arg(num_args = 1.., required = true)]
        label: Vec<String>,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum HistoryAction {
    /// Remove every completed task.
    Clear,
    /// Remove one completed task.
    Remove { id: String },
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
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls positional `rc.key=value` (or `rc.key:value`) overrides out of the
/// argument list before clap sees it.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> PreprocessedArgs {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = rest.split_once('=').or_else(|| rest.split_once(':'));
            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k.to_string(), v.to_string()));
                continue;
            }
        }

        cleaned.push(arg);
    }

    PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    }
}
