use crate::cli::args::StartArgs;
use crate::core::broker::Broker;
use crate::core::config::Config;
use crate::core::time::SystemClock;
use anyhow::{Context, Result};

pub async fn run_start(args: StartArgs) -> Result<()> {
    let config = Config::load(&args.config)?;
    config.validate()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log.level.clone())),
        )
        .init();

    let broker = Broker::new(&config, SystemClock, None);
    tracing::info!(
        broker = broker.name(),
        config = %args.config.display(),
        "broker ready; transports attach via the connection layer"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to wait for shutdown signal")?;
    tracing::info!(broker = broker.name(), "shutdown signal received");
    Ok(())
}
