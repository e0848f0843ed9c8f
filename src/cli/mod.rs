//! CLI module for CephLCM
//!
//! This module provides the command-line interface: argument parsing and
//! subcommand dispatch. The dynamic inventory protocol Ansible speaks to
//! the `inventory` subcommand is part of it.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// CephLCM - Ceph lifecycle management through Ansible playbook plugins
#[derive(Parser, Debug, Clone)]
#[command(name = "cephlcm")]
#[command(author = "CephLCM Contributors")]
#[command(version)]
#[command(about = "Ceph lifecycle management through Ansible playbook plugins", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short = 'c', long, global = true, env = "CEPHLCM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "human")]
    pub output: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable output with colors
    #[default]
    Human,
    /// JSON output for scripting
    Json,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// List available plugins
    Plugins(commands::plugins::PluginsArgs),

    /// Build and store a playbook configuration
    Build(commands::build::BuildArgs),

    /// Execute a plugin for a task
    Run(commands::run::RunArgs),

    /// Dynamic inventory for the task bound through the environment
    Inventory(commands::inventory::InventoryArgs),
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Get the effective verbosity level (0-3)
    pub fn verbosity(&self) -> u8 {
        self.verbose.min(3)
    }

    /// Check if JSON output is requested
    pub fn is_json(&self) -> bool {
        matches!(self.output, OutputFormat::Json)
    }
}
