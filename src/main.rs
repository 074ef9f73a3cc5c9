use anyhow::{Context, Result};
use bygg_core::logger::{LogLevel, Logger};
use bygg_core::{Builder, Cli, Settings, Watcher};
use clap::Parser;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;
    let config = cli.build_config();

    let logger = Logger::new()
        .with_verbosity(config.verbose, config.very_verbose)
        .with_colors(settings.display.colors);

    let mut builder = Builder::new(config.clone(), settings.clone()).with_logger(logger.clone());
    builder
        .load()
        .with_context(|| format!("Failed to load {}", config.build_file_path().display()))?;

    if config.watch {
        let watcher = Watcher::new(settings.watch.poll_interval(), logger.clone());
        watcher.run(&mut builder, &config.target, |err| {
            logger.log(LogLevel::Error, &format!("bygg: {}", err));
        })?;
        return Ok(());
    }

    builder
        .build(&config.target)
        .with_context(|| format!("Failed to build {}", config.target))?;

    Ok(())
}
