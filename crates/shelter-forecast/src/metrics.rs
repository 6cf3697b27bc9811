//! Hold-out evaluation metrics for occupancy regression.
//!
//! This module provides:
//!
//! - **R²** (coefficient of determination), following the convention that a
//!   constant target scores `1.0` when predicted exactly and `0.0` otherwise.
//!   With fewer than two held-out records R² is undefined and reported as
//!   `None`.
//! - **MAE** (mean absolute error) and **MSE** (mean squared error), both in
//!   people.
//!
//! The figures are computed once, on the held-out partition, when a model is
//! fitted and are stored on the model as [`EvaluationMetrics`]. They are
//! informational only and never feed back into inference.

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// EvaluationMetrics
// ---------------------------------------------------------------------------

/// Hold-out scores recorded at fit time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    /// Coefficient of determination on the held-out partition; `None` when
    /// fewer than two records were held out.
    pub r2: Option<f64>,
    /// Mean absolute error, people.
    pub mae: f64,
    /// Mean squared error, people².
    pub mse: f64,
    /// Records used for fitting.
    pub n_train: usize,
    /// Records held out.
    pub n_test: usize,
}

impl EvaluationMetrics {
    /// Score `y_pred` against `y_true`.
    ///
    /// Both views must have the same, non-zero length.
    pub fn compute(
        y_true: ArrayView1<'_, f64>,
        y_pred: ArrayView1<'_, f64>,
        n_train: usize,
    ) -> Self {
        EvaluationMetrics {
            r2: r2_score(y_true, y_pred),
            mae: mean_absolute_error(y_true, y_pred),
            mse: mean_squared_error(y_true, y_pred),
            n_train,
            n_test: y_true.len(),
        }
    }

    /// Root mean squared error, people.
    pub fn rmse(&self) -> f64 {
        self.mse.sqrt()
    }

    /// R² to `precision` decimals, or `n/a` when undefined.
    pub fn r2_label(&self, precision: usize) -> String {
        match self.r2 {
            Some(r2) => format!("{r2:.precision$}"),
            None => "n/a".to_string(),
        }
    }

    /// One-line summary for logs.
    pub fn summary(&self) -> String {
        format!(
            "R²={} MAE={:.2} RMSE={:.2} (train={}, test={})",
            self.r2_label(4),
            self.mae,
            self.rmse(),
            self.n_train,
            self.n_test
        )
    }
}

// ---------------------------------------------------------------------------
// Scores
// ---------------------------------------------------------------------------

/// Coefficient of determination `1 - SS_res / SS_tot`.
///
/// When `y_true` is constant (`SS_tot == 0`) the score is `1.0` for an exact
/// prediction and `0.0` otherwise. Fewer than two samples give `None`.
pub fn r2_score(y_true: ArrayView1<'_, f64>, y_pred: ArrayView1<'_, f64>) -> Option<f64> {
    debug_assert_eq!(y_true.len(), y_pred.len());
    let n = y_true.len();
    if n < 2 {
        return None;
    }
    let mean = y_true.sum() / n as f64;
    let ss_tot: f64 = y_true.iter().map(|&t| (t - mean).powi(2)).sum();
    let ss_res: f64 = y_true.iter().zip(y_pred).map(|(&t, &p)| (t - p).powi(2)).sum();

    if ss_tot == 0.0 {
        return Some(if ss_res == 0.0 { 1.0 } else { 0.0 });
    }
    Some(1.0 - ss_res / ss_tot)
}

/// Mean of `|y_true - y_pred|`. An empty input scores `0.0`.
pub fn mean_absolute_error(y_true: ArrayView1<'_, f64>, y_pred: ArrayView1<'_, f64>) -> f64 {
    debug_assert_eq!(y_true.len(), y_pred.len());
    if y_true.is_empty() {
        return 0.0;
    }
    let total: f64 = y_true.iter().zip(y_pred).map(|(&t, &p)| (t - p).abs()).sum();
    total / y_true.len() as f64
}

/// Mean of `(y_true - y_pred)²`. An empty input scores `0.0`.
pub fn mean_squared_error(y_true: ArrayView1<'_, f64>, y_pred: ArrayView1<'_, f64>) -> f64 {
    debug_assert_eq!(y_true.len(), y_pred.len());
    if y_true.is_empty() {
        return 0.0;
    }
    let total: f64 = y_true.iter().zip(y_pred).map(|(&t, &p)| (t - p).powi(2)).sum();
    total / y_true.len() as f64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
