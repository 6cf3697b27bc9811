//! # Shelter Occupancy Forecasting
//!
//! This crate predicts how many people a shelter will receive during an
//! extreme weather event and derives the water, meals and medical kits that
//! occupancy requires. It includes configuration management, historical
//! dataset loading, a random-forest regressor, hold-out evaluation metrics,
//! the resource calculator and the per-scenario evaluator.
//!
//! ## Architecture
//!
//! ```text
//! OccupancyDataset (CsvDataset | InMemoryDataset | SyntheticShelterDataset)
//!       │
//!       ▼
//! ModelCache ──► TrainedModel::fit ──► RandomForestRegressor (RegressionTree × N)
//!       │                 │
//!       │          EvaluationMetrics
//!       ▼
//! ScenarioEvaluator ──► evaluate(FeatureVector) ──► calculate_resources
//!       │
//!       ▼
//! ScenarioResult
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use shelter_forecast::config::ForecastConfig;
//! use shelter_forecast::dataset::{OccupancyDataset, SyntheticConfig, SyntheticShelterDataset};
//! use shelter_forecast::features::FeatureVector;
//! use shelter_forecast::model::TrainedModel;
//! use shelter_forecast::scenario::evaluate;
//!
//! let config = ForecastConfig { n_estimators: 20, ..ForecastConfig::default() };
//! let dataset = SyntheticShelterDataset::new(100, SyntheticConfig::default());
//! let model = TrainedModel::fit_dataset(&dataset, &config).expect("fit");
//!
//! let result = evaluate(&model, &FeatureVector::default()).expect("valid scenario");
//! assert!(result.resources.medical_kits >= 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod config;
pub mod dataset;
pub mod error;
pub mod features;
pub mod forest;
pub mod metrics;
pub mod model;
pub mod resources;
pub mod rng;
pub mod scenario;
pub mod tree;

// Convenient re-exports at the crate root.
pub use cache::{DatasetKey, ModelCache};
pub use config::ForecastConfig;
pub use dataset::{CsvDataset, InMemoryDataset, OccupancyDataset, SyntheticConfig, SyntheticShelterDataset, TrainingRecord};
pub use error::{ConfigError, DatasetError, ForecastError, ForecastResult, SchemaError, ValidationError};
pub use features::{FeatureRow, FeatureVector};
pub use forest::RandomForestRegressor;
pub use metrics::EvaluationMetrics;
pub use model::{Regressor, TrainedModel};
pub use resources::{calculate_resources, ResourceEstimate};
pub use scenario::{evaluate, ScenarioEvaluator, ScenarioResult};

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
