//! CephLCM - Ceph lifecycle management through Ansible playbook plugins
//!
//! This is the main entry point for the CephLCM CLI.

mod cli;

use anyhow::Result;
use cephlcm::config::{LogFormat, Settings};
use cli::commands::{CommandContext, Runnable};
use cli::{Cli, Commands};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Application version information
const VERSION: &str = env!("CARGO_PKG_VERSION");
const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            err.downcast_ref::<cephlcm::Error>()
                .map_or(1, cephlcm::Error::exit_code)
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration
    let settings = Settings::load(cli.config.as_ref()).unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load config: {:#}", e);
        Settings::default()
    });

    // Initialize logging based on verbosity
    init_logging(cli.verbosity(), &settings);

    // Display version if verbose
    if cli.verbosity() >= 2 {
        eprintln!("CephLCM v{} by {}", VERSION, AUTHORS);
    }

    // Create command context
    let mut ctx = CommandContext::new(&cli, settings);

    // Execute the appropriate command
    match &cli.command {
        Commands::Plugins(args) => args.execute(&mut ctx),
        Commands::Build(args) => args.execute(&mut ctx),
        Commands::Run(args) => args.execute(&mut ctx),
        Commands::Inventory(args) => args.execute(&mut ctx),
    }
}

/// Initialize logging based on verbosity level and settings
///
/// Logs go to stderr: the inventory subcommand owns stdout.
fn init_logging(verbosity: u8, settings: &Settings) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_filter(verbosity, settings)));

    match settings.logging.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(verbosity >= 3)
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .init(),
    }
}

/// Filter directive for a verbosity level; `-v` flags override the config.
fn log_filter(verbosity: u8, settings: &Settings) -> &str {
    match verbosity {
        0 => settings.logging.level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}
