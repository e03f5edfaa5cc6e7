//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - run: start a new run for the configured task
//! - resume: pick up from the last checkpoint
//! - status: inspect a checkpoint without running

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Ralph - an iterative run-loop orchestrator for external agents
#[derive(Parser, Debug)]
#[command(name = "ralph")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path (default: ./ralph.yml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a new run, overwriting any previous checkpoint
    Run {
        /// Task description, overriding the config file's task
        task: Option<String>,
    },

    /// Resume the run from its last checkpoint
    Resume,

    /// Show the state of the last checkpoint
    Status {
        /// Show the full iteration history
        #[arg(short, long)]
        detailed: bool,
    },
}
