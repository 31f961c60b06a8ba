use crate::cli::args::CheckConfigArgs;
use crate::core::config::Config;
use anyhow::Result;

pub fn run_check_config(args: CheckConfigArgs) -> Result<()> {
    let config = Config::load(&args.config)?;
    config.validate()?;
    println!(
        "{}: ok (broker={}, flow stop/resume {}%/{}%)",
        args.config.display(),
        config.broker.name,
        config.flow.stop_ratio,
        config.flow.resume_ratio
    );
    Ok(())
}
