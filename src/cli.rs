// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::types::SchedulingStrategy;

/// Command-line arguments for `plansched`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "plansched",
    version,
    about = "Schedule a query plan described in TOML and report its status.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the plan file (TOML).
    ///
    /// Default: `Plan.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Plan.toml")]
    pub plan: String,

    /// Override `[scheduler].strategy` from the plan file.
    #[arg(long, value_enum, value_name = "STRATEGY")]
    pub strategy: Option<StrategyArg>,

    /// Worker threads of the runner executors are dispatched on.
    ///
    /// Defaults to the number of CPUs.
    #[arg(long, value_name = "N")]
    pub worker_threads: Option<usize>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PLANSCHED_LOG` (an `EnvFilter` directive list) or `info`
    /// is used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse, validate and print the plan, but don't schedule it.
    #[arg(long)]
    pub dry_run: bool,

    /// Print per-executor timings after a successful run.
    #[arg(long)]
    pub profile: bool,
}

/// Scheduling strategy as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum StrategyArg {
    Auto,
    Notify,
    Push,
}

impl From<StrategyArg> for SchedulingStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Auto => SchedulingStrategy::Auto,
            StrategyArg::Notify => SchedulingStrategy::Notify,
            StrategyArg::Push => SchedulingStrategy::Push,
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
