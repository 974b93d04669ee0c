//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Cirrus - environment-aware CloudFormation stack deployment.
#[derive(Parser, Debug)]
#[command(name = "cirrus")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the config project.
    #[arg(long, global = true, env = "CONFIG_PATH", default_value = ".")]
    pub config_path: PathBuf,

    /// Default path or repository for stack templates.
    #[arg(long, global = true, env = "TEMPLATE_PATH")]
    pub template_path: Option<String>,

    /// AWS credentials profile to use.
    #[arg(long, global = true, env = "AWS_PROFILE")]
    pub profile: Option<String>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new config project.
    Init {
        /// Directory to initialize (defaults to current directory).
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Force overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },

    /// Resolve and display a stack's configuration for an environment.
    ShowConfig {
        /// Stack config name.
        name: String,

        /// Target environment.
        environment: String,

        /// Override channels.
        #[command(flatten)]
        overrides: OverrideArgs,
    },

    /// Fully resolve a stack's configuration and report problems.
    Validate {
        /// Stack config name.
        name: String,

        /// Target environment.
        environment: String,

        /// Override channels.
        #[command(flatten)]
        overrides: OverrideArgs,
    },
}

/// Override channels shared by resolution commands.
#[derive(Args, Debug, Default)]
pub struct OverrideArgs {
    /// Variable override (key=value, repeatable).
    #[arg(long = "var", value_name = "KEY=VALUE")]
    pub vars: Vec<String>,

    /// Parameter override (key=value, repeatable).
    #[arg(long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// Structured override document (inline YAML, or @file).
    #[arg(long)]
    pub overrides: Option<String>,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
