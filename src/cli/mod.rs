//! CLI module for ralph - command-line interface and subcommands.
//!
//! Provides the entry point with subcommands for starting, resuming, and
//! inspecting a run.

pub mod commands;

pub use commands::{Cli, Commands};
