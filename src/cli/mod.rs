//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for scanfeed using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Scanfeed - scan export and SFTP delivery
#[derive(Parser, Debug)]
#[command(name = "scanfeed")]
#[command(version, about, long_about = None)]
#[command(author = "Scanfeed Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "scanfeed.toml", env = "SCANFEED_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "SCANFEED_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Log level for this invocation
    ///
    /// `export --debug` wins over `--log-level`, which wins over `fallback`.
    pub fn effective_log_level<'a>(&'a self, fallback: &'a str) -> &'a str {
        match &self.command {
            Commands::Export(args) if args.debug => "debug",
            _ => self.log_level.as_deref().unwrap_or(fallback),
        }
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export scans to CSV and deliver them to partners
    Export(commands::export::ExportArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Encrypt a partner secret for the sftp_credentials table
    EncryptSecret(commands::encrypt::EncryptArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}
