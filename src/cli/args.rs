//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Stratus - AMQP 0-10 message broker.
#[derive(Parser)]
#[command(name = "stratus")]
#[command(version)]
#[command(about = "Stratus AMQP broker")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the Stratus broker
    Start(StartArgs),

    /// Validate a configuration file and exit
    CheckConfig(CheckConfigArgs),
}

#[derive(Args)]
pub struct StartArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/stratus.toml")]
    pub config: PathBuf,
}

#[derive(Args)]
pub struct CheckConfigArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/stratus.toml")]
    pub config: PathBuf,
}
