use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

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
    name = "monthgrid",
    version,
    about = "Month-grid calendar over an external event feed",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    pub quiet: u8,

    /// Configuration overrides, e.g. --rc week.start=monday
    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append
    )]
    pub rc_overrides: Vec<KeyVal>,

    /// Path to the gridrc file (default: ~/.monthgridrc)
    #[arg(long = "gridrc")]
    pub gridrc: Option<PathBuf>,

    /// Path to the event feed, or `-` for stdin
    #[arg(long = "events")]
    pub events: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the grid for the month containing DATE (default: today)
    Show {
        date: Option<String>,
    },
    /// Print the grid one month after DATE (default: today)
    Next {
        date: Option<String>,
    },
    /// Print the grid one month before DATE (default: today)
    Prev {
        date: Option<String>,
    },
    /// Print the date a given event falls on
    Find {
        event_id: String,
    },
    /// List the events on DATE
    On {
        date: String,
    },
    /// Print the resolved configuration
    Config,
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
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Maps the `default.command` config value onto a subcommand for
/// invocations that name none.
pub fn default_command(name: &str) -> Command {
    match name.trim() {
        "next" => Command::Next { date: None },
        "prev" => Command::Prev { date: None },
        "config" => Command::Config,
        "show" => Command::Show { date: None },
        other => {
            tracing::warn!(command = %other, "unknown default.command, falling back to show");
            Command::Show { date: None }
        }
    }
}
