//! Cirrus CLI entrypoint.
//!
//! This is the main entrypoint for the cirrus command-line tool.

use std::path::Path;
use std::process::ExitCode;

use cirrus_deploy_stacks::aws::AwsStackProvider;
use cirrus_deploy_stacks::cli::{Cli, Commands, OutputFormatter, OverrideArgs};
use cirrus_deploy_stacks::config::{Config, Overrides, ResolveRequest};
use cirrus_deploy_stacks::error::{CirrusError, ResolveError, Result};

use clap::Parser;
use colored::Colorize;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(CirrusError::Resolve(ResolveError::Interpolation { errors })) => {
            eprintln!("{}", OutputFormatter::format_interpolation_failures(&errors));
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);

    match cli.command {
        Commands::Init { path, force } => cmd_init(&path, force),
        Commands::ShowConfig {
            ref name,
            ref environment,
            ref overrides,
        } => {
            let config = resolve(&cli, name.clone(), environment.clone(), overrides).await?;
            println!("{}", formatter.format_config(&config));
            Ok(())
        }
        Commands::Validate {
            ref name,
            ref environment,
            ref overrides,
        } => {
            let config = resolve(&cli, name.clone(), environment.clone(), overrides).await?;
            println!(
                "{} {} resolves for {} (stack name: {})",
                "✓".green(),
                config.name,
                config.environment,
                config.core.stack_name
            );
            Ok(())
        }
    }
}

/// Runs one configuration resolution from CLI arguments.
async fn resolve(
    cli: &Cli,
    name: String,
    environment: String,
    overrides: &OverrideArgs,
) -> Result<Config> {
    let provider = AwsStackProvider::new(cli.profile.clone());
    let request = ResolveRequest {
        name,
        environment,
        config_dir: cli.config_path.clone(),
        template_path: cli.template_path.clone(),
        overrides: Overrides::from_cli(
            &overrides.vars,
            &overrides.params,
            overrides.overrides.as_deref(),
        )?,
    };
    Config::resolve(request, &provider).await
}

/// Initialize a new config project.
fn cmd_init(path: &Path, force: bool) -> Result<()> {
    info!("Initializing new Cirrus config project in: {}", path.display());

    let main_path = path.join("main.yaml");
    let includes_dir = path.join("includes");
    let common_path = includes_dir.join("common.yaml");

    if !force && main_path.exists() {
        eprintln!("Configuration file already exists: {}", main_path.display());
        eprintln!("Use --force to overwrite.");
        return Ok(());
    }

    std::fs::create_dir_all(&includes_dir)?;

    let main_template = include_str!("../templates/main.yaml");
    std::fs::write(&main_path, main_template)?;
    eprintln!("Created: {}", main_path.display());

    let common_template = include_str!("../templates/common.yaml");
    std::fs::write(&common_path, common_template)?;
    eprintln!("Created: {}", common_path.display());

    eprintln!("\nConfig project initialized. Edit main.yaml and run:");
    eprintln!("  cirrus show-config main dev --config-path {}", path.display());

    Ok(())
}
