// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, Subcommand, ValueEnum};

use crate::engine::RunMode;

/// Command-line arguments for `assetdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "assetdag",
    version,
    about = "Build web assets from a task DAG, rebuild on changes and supervise the backend.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Assetdag.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Assetdag.toml", global = true)]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `ASSETDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the resolved run order, but don't run anything.
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Build the requested tasks once and exit.
    Build {
        /// Tasks to build; defaults to `[config].default_tasks`.
        #[arg(value_name = "TASK")]
        tasks: Vec<String>,
    },
    /// Build, start the backend and rebuild on file changes until interrupted.
    Watch {
        /// Tasks to build initially; defaults to `[config].default_tasks`.
        #[arg(value_name = "TASK")]
        tasks: Vec<String>,
    },
}

impl CliArgs {
    /// `watch` is the default when no subcommand is given.
    pub fn mode(&self) -> RunMode {
        match self.command {
            Some(Command::Build { .. }) => RunMode::Build,
            Some(Command::Watch { .. }) | None => RunMode::Watch,
        }
    }

    /// Task names given on the command line (possibly empty).
    pub fn tasks(&self) -> &[String] {
        match &self.command {
            Some(Command::Build { tasks }) | Some(Command::Watch { tasks }) => tasks,
            None => &[],
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
