//! Shelter Forecast CLI
//!
//! Command-line front end for shelter occupancy forecasting during extreme
//! weather events.
//!
//! # Features
//!
//! - **train**: fit the occupancy model on a historical CSV and report
//!   held-out metrics, optionally saving the model as JSON
//! - **predict**: evaluate one scenario and report expected occupancy,
//!   supplies and capacity overflow
//! - **version**: display version information
//!
//! # Usage
//!
//! ```bash
//! # Fit once and keep the model
//! shelter-forecast train --data dados_abrigo.csv --save model.json
//!
//! # Evaluate a heavy-rain scenario against the saved model
//! shelter-forecast predict --model model.json --rainfall 320 --vulnerability 8
//!
//! # Machine-readable output
//! shelter-forecast predict --data dados_abrigo.csv --capacity 150 --format json
//! ```

use clap::{Parser, Subcommand};

pub mod forecast;

/// Shelter Forecast Command Line Interface
#[derive(Parser, Debug)]
#[command(name = "shelter-forecast")]
#[command(author, version, about = "Shelter occupancy and resource forecasting for extreme weather events")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Log level (overrides RUST_LOG): trace, debug, info, warn, error
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fit the occupancy model on historical records
    Train(forecast::TrainArgs),

    /// Evaluate one scenario
    Predict(forecast::PredictArgs),

    /// Display version information
    Version,
}
