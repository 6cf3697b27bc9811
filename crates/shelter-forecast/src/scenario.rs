//! Single-scenario evaluation: validate, predict, round, derive supplies.
//!
//! The evaluator returns plain data. Whether and how to warn about an
//! overflowing shelter is left to the front end.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ForecastResult, ValidationError};
use crate::features::FeatureVector;
use crate::forest::RandomForestRegressor;
use crate::metrics::EvaluationMetrics;
use crate::model::{Regressor, TrainedModel};
use crate::resources::{calculate_resources, ResourceEstimate};

/// Headroom applied above the larger of occupancy and capacity when charting.
pub const CHART_HEADROOM: f64 = 1.2;

/// Outcome of one scenario.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    /// Predicted occupancy, clamped to `>= 0` and rounded.
    pub predicted_people: u64,
    /// `predicted_people > shelter_capacity`.
    pub capacity_exceeded: bool,
    /// Supplies for `predicted_people`.
    pub resources: ResourceEstimate,
}

impl ScenarioResult {
    /// Predicted occupancy as a fraction of `capacity`.
    pub fn capacity_utilization(&self, capacity: u32) -> f64 {
        if capacity == 0 {
            return f64::INFINITY;
        }
        self.predicted_people as f64 / f64::from(capacity)
    }

    /// Upper axis limit for an occupancy-versus-capacity chart.
    pub fn chart_upper_bound(&self, capacity: u32) -> f64 {
        (self.predicted_people as f64).max(f64::from(capacity)) * CHART_HEADROOM
    }
}

/// Clamp a raw estimate to `>= 0` and round half to even.
///
/// Non-finite input maps to zero.
pub fn round_prediction(raw: f64) -> u64 {
    if !raw.is_finite() || raw <= 0.0 {
        return 0;
    }
    raw.round_ties_even() as u64
}

/// Evaluate one scenario against `model`.
///
/// # Errors
///
/// [`crate::error::ForecastError::Validation`] when a feature lies outside
/// its accepted range, or when the rounded estimate does not fit an `i64`
/// head count (reported as `OutOfRange` on `people`).
pub fn evaluate<R: Regressor>(model: &TrainedModel<R>, features: &FeatureVector) -> ForecastResult<ScenarioResult> {
    features.validate()?;

    let raw = model.predict(&features.to_row())?;
    let predicted_people = round_prediction(raw);
    let capacity_exceeded = predicted_people > u64::from(features.shelter_capacity);

    let people = i64::try_from(predicted_people)
        .map_err(|_| ValidationError::out_of_range("people", raw, 0.0, i64::MAX as f64))?;
    let resources = calculate_resources(people, features.vulnerability_index)?;

    debug!(
        "scenario: raw={raw:.3} people={predicted_people} capacity={} exceeded={capacity_exceeded}",
        features.shelter_capacity
    );

    Ok(ScenarioResult { predicted_people, capacity_exceeded, resources })
}

/// Evaluates scenarios against one shared, immutable model.
#[derive(Debug, Clone)]
pub struct ScenarioEvaluator<R = RandomForestRegressor> {
    model: Arc<TrainedModel<R>>,
}

impl<R: Regressor> ScenarioEvaluator<R> {
    /// Evaluator backed by `model`.
    pub fn new(model: Arc<TrainedModel<R>>) -> Self {
        ScenarioEvaluator { model }
    }

    /// See [`evaluate`].
    pub fn evaluate(&self, features: &FeatureVector) -> ForecastResult<ScenarioResult> {
        evaluate(self.model.as_ref(), features)
    }

    /// Hold-out scores of the underlying model, for display.
    pub fn metrics(&self) -> &EvaluationMetrics {
        self.model.metrics()
    }

    /// Shared handle to the underlying model.
    pub fn model(&self) -> &Arc<TrainedModel<R>> {
        &self.model
    }
}
