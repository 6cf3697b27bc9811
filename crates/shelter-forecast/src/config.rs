//! Model configuration for shelter occupancy forecasting.
//!
//! [`ForecastConfig`] is the single source of truth for the hold-out split and
//! the tree-ensemble hyper-parameters. It is serializable via [`serde`] so it
//! can be stored next to a saved model and restored from JSON.
//!
//! # Example
//!
//! ```rust
//! use shelter_forecast::config::ForecastConfig;
//!
//! let cfg = ForecastConfig::default();
//! cfg.validate().expect("default config is valid");
//!
//! assert_eq!(cfg.n_estimators, 200);
//! assert_eq!(cfg.seed, 42);
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;
use crate::features::NUM_FEATURES;

// ---------------------------------------------------------------------------
// ForecastConfig
// ---------------------------------------------------------------------------

/// Complete configuration for fitting an occupancy model.
///
/// Use [`ForecastConfig::default()`] as a starting point, then override
/// individual fields as needed. Missing fields in a JSON file fall back to
/// the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    // -----------------------------------------------------------------------
    // Hold-out evaluation
    // -----------------------------------------------------------------------
    /// Fraction of records held out for evaluation. Default: **0.2**.
    pub test_fraction: f64,

    /// Seed for the train/test partition and for every bootstrap sample.
    ///
    /// Identical seeds and records always produce identical models.
    /// Default: **42**.
    pub seed: u64,

    // -----------------------------------------------------------------------
    // Ensemble
    // -----------------------------------------------------------------------
    /// Number of regression trees in the forest. Default: **200**.
    pub n_estimators: usize,

    /// Maximum tree depth; `None` grows trees until leaves are pure or too
    /// small to split. Default: **None**.
    pub max_depth: Option<usize>,

    /// Minimum number of samples required to split an internal node.
    /// Default: **2**.
    pub min_samples_split: usize,

    /// Minimum number of samples each child of a split must keep.
    /// Default: **1**.
    pub min_samples_leaf: usize,

    /// Number of features considered at each split; `None` considers all of
    /// them. Default: **None**.
    pub max_features: Option<usize>,

    /// Draw a bootstrap sample for each tree. Default: **true**.
    pub bootstrap: bool,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        ForecastConfig {
            test_fraction: 0.2,
            seed: 42,
            n_estimators: 200,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            bootstrap: true,
        }
    }
}

impl ForecastConfig {
    /// Load a [`ForecastConfig`] from a JSON file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FileRead`] if the file cannot be opened,
    /// [`ConfigError::ParseError`] if the JSON is malformed, and
    /// [`ConfigError::InvalidValue`] if a field fails validation.
    pub fn from_json(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: ForecastConfig =
            serde_json::from_str(&contents).map_err(|source| ConfigError::ParseError {
                path: path.to_path_buf(),
                source,
            })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Serialize this configuration to pretty-printed JSON and write it to
    /// `path`, creating parent directories if necessary.
    pub fn to_json(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::FileRead {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::invalid_value("(serialization)", e.to_string()))?;
        std::fs::write(path, json).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    /// Number of features examined per split after resolving `max_features`.
    pub fn features_per_split(&self) -> usize {
        self.max_features.unwrap_or(NUM_FEATURES).min(NUM_FEATURES)
    }

    /// Validate all fields and return an error describing the first problem
    /// found, or `Ok(())` if the configuration is coherent.
    ///
    /// # Validated invariants
    ///
    /// - `test_fraction` must lie strictly between 0 and 1.
    /// - `n_estimators` must be at least 1.
    /// - `max_depth`, when set, must be at least 1.
    /// - `min_samples_split` must be at least 2.
    /// - `min_samples_leaf` must be at least 1.
    /// - `max_features`, when set, must be in `[1, 6]`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.test_fraction.is_finite() || self.test_fraction <= 0.0 || self.test_fraction >= 1.0
        {
            return Err(ConfigError::invalid_value(
                "test_fraction",
                "must be in (0.0, 1.0)",
            ));
        }

        if self.n_estimators == 0 {
            return Err(ConfigError::invalid_value("n_estimators", "must be > 0"));
        }

        if self.max_depth == Some(0) {
            return Err(ConfigError::invalid_value("max_depth", "must be > 0 when set"));
        }

        if self.min_samples_split < 2 {
            return Err(ConfigError::invalid_value(
                "min_samples_split",
                "must be >= 2",
            ));
        }
        if self.min_samples_leaf == 0 {
            return Err(ConfigError::invalid_value("min_samples_leaf", "must be > 0"));
        }

        if let Some(m) = self.max_features {
            if m == 0 || m > NUM_FEATURES {
                return Err(ConfigError::invalid_value(
                    "max_features",
                    format!("must be in [1, {NUM_FEATURES}] when set"),
                ));
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
