//! Shelter Forecast CLI Entry Point
//!
//! This is the main entry point for the shelter-forecast command-line tool.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use shelter_forecast_cli::{forecast, Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = match &cli.log_level {
        Some(level) => EnvFilter::try_new(level)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Train(args) => forecast::execute_train(args)?,
        Commands::Predict(args) => forecast::execute_predict(args)?,
        Commands::Version => {
            println!("shelter-forecast {}", env!("CARGO_PKG_VERSION"));
            println!("Core library version: {}", shelter_forecast::VERSION);
        }
    }

    Ok(())
}
