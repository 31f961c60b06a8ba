#![deny(unused, dead_code)]
#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::uninlined_format_args)]

//! Stratus - unified CLI entrypoint.
//!
//! Usage:
//!   stratus start --config config/stratus.toml
//!   stratus check-config --config config/stratus.toml

use anyhow::Result;
use clap::Parser;
use stratus::cli::commands::{run_check_config, run_start};
use stratus::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start(args) => run_start(args).await,
        Commands::CheckConfig(args) => run_check_config(args),
    }
}
