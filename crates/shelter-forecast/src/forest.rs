//! Random forest regressor: bagged CART trees averaged at prediction time.
//!
//! Every tree draws its own bootstrap sample and feature sub-samples from an
//! [`XorShift64`] stream derived from the master seed and the tree index, so
//! a forest is fully determined by its parameters and training data.

use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ForecastConfig;
use crate::error::{ForecastError, ForecastResult};
use crate::model::Regressor;
use crate::rng::XorShift64;
use crate::tree::{RegressionTree, TreeParams};

/// Ensemble-level parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    /// Number of trees.
    pub n_estimators: usize,
    /// Draw a bootstrap sample per tree; otherwise every tree sees all rows.
    pub bootstrap: bool,
    /// Master seed for per-tree streams.
    pub seed: u64,
    /// Per-tree growth limits.
    pub tree: TreeParams,
}

impl ForestParams {
    /// Parameters taken from a validated [`ForecastConfig`].
    pub fn from_config(cfg: &ForecastConfig) -> Self {
        ForestParams {
            n_estimators: cfg.n_estimators,
            bootstrap: cfg.bootstrap,
            seed: cfg.seed,
            tree: TreeParams::from_config(cfg),
        }
    }
}

impl Default for ForestParams {
    fn default() -> Self {
        Self::from_config(&ForecastConfig::default())
    }
}

/// Random forest over regression trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    params: ForestParams,
    trees: Vec<RegressionTree>,
    n_features: usize,
}

impl RandomForestRegressor {
    /// Unfitted forest.
    pub fn new(params: ForestParams) -> Self {
        RandomForestRegressor { params, trees: Vec::new(), n_features: 0 }
    }

    /// Unfitted forest configured from `cfg`.
    pub fn from_config(cfg: &ForecastConfig) -> Self {
        Self::new(ForestParams::from_config(cfg))
    }

    /// Ensemble parameters.
    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    /// Fitted trees; empty before [`Regressor::fit`].
    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    /// Column count seen at fit time.
    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

impl Default for RandomForestRegressor {
    fn default() -> Self {
        Self::new(ForestParams::default())
    }
}

impl Regressor for RandomForestRegressor {
    fn name(&self) -> &'static str {
        "random_forest"
    }

    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> ForecastResult<()> {
        let n = x.nrows();
        if n != y.len() {
            return Err(ForecastError::ShapeMismatch { features: n, labels: y.len() });
        }
        if n == 0 {
            return Err(ForecastError::insufficient_data(0, 1));
        }

        let mut trees = Vec::with_capacity(self.params.n_estimators);
        for t in 0..self.params.n_estimators {
            let mut rng = XorShift64::derived(self.params.seed, t as u64);
            let samples: Vec<usize> = if self.params.bootstrap {
                (0..n).map(|_| rng.next_index(n)).collect()
            } else {
                (0..n).collect()
            };
            trees.push(RegressionTree::fit(x, y, &samples, &self.params.tree, &mut rng));
        }

        let mean_depth =
            trees.iter().map(|t| t.depth()).sum::<usize>() as f64 / trees.len() as f64;
        debug!(
            "random_forest: fitted {} trees on {n} rows x {} features (mean depth {mean_depth:.1})",
            trees.len(),
            x.ncols()
        );

        self.trees = trees;
        self.n_features = x.ncols();
        Ok(())
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    fn validate(&self, n_features: usize) -> ForecastResult<()> {
        if !self.is_fitted() {
            return Err(ForecastError::NotFitted(self.name()));
        }
        if self.n_features != n_features {
            return Err(ForecastError::invalid_model(format!(
                "forest was fitted on {} features, expected {n_features}",
                self.n_features
            )));
        }
        for (t, tree) in self.trees.iter().enumerate() {
            tree.validate(n_features).map_err(|e| match e {
                ForecastError::InvalidModel { reason } => {
                    ForecastError::invalid_model(format!("tree {t}: {reason}"))
                }
                other => other,
            })?;
        }
        Ok(())
    }

    fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        debug_assert_eq!(row.len(), self.n_features, "row width differs from fit time");
        let total: f64 = self.trees.iter().map(|t| t.predict_row(row)).sum();
        total / self.trees.len() as f64
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
