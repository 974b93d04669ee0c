//! Command-line interface for Cirrus.
//!
//! This module provides the CLI structure and output formatting.

pub mod commands;
pub mod output;

pub use commands::{Cli, Commands, OutputFormat, OverrideArgs};
pub use output::OutputFormatter;
