//! Integration tests for [`shelter_forecast::scenario`].
//!
//! One small forest is fitted on the synthetic history and reused by every
//! test through a [`ScenarioEvaluator`].

use std::sync::Arc;

use shelter_forecast::config::ForecastConfig;
use shelter_forecast::dataset::{SyntheticConfig, SyntheticShelterDataset};
use shelter_forecast::error::{ForecastError, ValidationError};
use shelter_forecast::features::FeatureVector;
use shelter_forecast::model::TrainedModel;
use shelter_forecast::resources::calculate_resources;
use shelter_forecast::scenario::{evaluate, round_prediction, ScenarioEvaluator};

fn evaluator() -> ScenarioEvaluator {
    let ds = SyntheticShelterDataset::new(150, SyntheticConfig::default());
    let cfg = ForecastConfig { n_estimators: 20, ..ForecastConfig::default() };
    ScenarioEvaluator::new(Arc::new(TrainedModel::fit_dataset(&ds, &cfg).unwrap()))
}

/// A grid of scenarios across the accepted ranges.
fn scenario_grid() -> Vec<FeatureVector> {
    let mut out = Vec::new();
    for rain in [0.0, 120.0, 500.0] {
        for temp in [-50.0, 25.0, 60.0] {
            for vi in [0_u8, 5, 10] {
                for capacity in [1_u32, 200, 1000] {
                    out.push(FeatureVector {
                        rainfall_mm: rain,
                        temperature_c: temp,
                        vulnerability_index: vi,
                        past_events: 20,
                        distance_to_city_km: 0.0,
                        shelter_capacity: capacity,
                    });
                }
            }
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Consistency with the model and the calculator
// ---------------------------------------------------------------------------

/// For every scenario the result agrees with the raw prediction, the
/// overflow rule and the resource calculator.
#[test]
fn results_are_consistent_across_grid() {
    let ev = evaluator();
    for f in scenario_grid() {
        let r = ev.evaluate(&f).unwrap();
        let people = round_prediction(ev.model().predict_features(&f));

        assert_eq!(r.predicted_people, people, "{f:?}");
        assert_eq!(r.capacity_exceeded, people > u64::from(f.shelter_capacity), "{f:?}");
        assert_eq!(r.resources, calculate_resources(people as i64, f.vulnerability_index).unwrap());
        assert!(r.resources.medical_kits >= 1);
    }
}

/// The free function and the evaluator agree, and repeated calls are stable.
#[test]
fn evaluation_is_deterministic() {
    let ev = evaluator();
    let f = FeatureVector { rainfall_mm: 310.0, vulnerability_index: 9, ..FeatureVector::default() };
    let first = evaluate(ev.model().as_ref(), &f).unwrap();
    for _ in 0..3 {
        assert_eq!(ev.evaluate(&f).unwrap(), first);
    }
}

/// Capacity 1 is exceeded whenever more than one person is predicted.
#[test]
fn tiny_shelter_overflows() {
    let ev = evaluator();
    let f = FeatureVector { rainfall_mm: 450.0, vulnerability_index: 10, shelter_capacity: 1, ..FeatureVector::default() };
    let r = ev.evaluate(&f).unwrap();
    assert!(r.predicted_people > 1, "heavy rain should shelter people");
    assert!(r.capacity_exceeded);
    assert!(r.capacity_utilization(1) > 1.0);
    assert_eq!(r.chart_upper_bound(1), r.predicted_people as f64 * 1.2);
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Each out-of-range field is rejected with its own name.
#[test]
fn out_of_range_fields_are_named() {
    let ev = evaluator();
    let base = FeatureVector::default();
    let cases = [
        (FeatureVector { rainfall_mm: 500.1, ..base }, "rainfall_mm"),
        (FeatureVector { temperature_c: -51.0, ..base }, "temperature_c"),
        (FeatureVector { vulnerability_index: 11, ..base }, "vulnerability_index"),
        (FeatureVector { past_events: 21, ..base }, "past_events"),
        (FeatureVector { distance_to_city_km: 501.0, ..base }, "distance_to_city_km"),
        (FeatureVector { shelter_capacity: 0, ..base }, "shelter_capacity"),
        (FeatureVector { shelter_capacity: 1001, ..base }, "shelter_capacity"),
    ];
    for (f, expected) in cases {
        match ev.evaluate(&f) {
            Err(ForecastError::Validation(ValidationError::OutOfRange { field, .. })) => {
                assert_eq!(field, expected);
            }
            other => panic!("{expected}: expected OutOfRange, got {other:?}"),
        }
    }
}

/// NaN inputs are rejected before prediction.
#[test]
fn non_finite_input_is_rejected() {
    let ev = evaluator();
    let f = FeatureVector { distance_to_city_km: f64::NAN, ..FeatureVector::default() };
    assert!(matches!(
        ev.evaluate(&f),
        Err(ForecastError::Validation(ValidationError::NonFinite { field: "distance_to_city_km" }))
    ));
}

/// Results serialise for front ends.
#[test]
fn result_serialises_to_json() {
    let ev = evaluator();
    let r = ev.evaluate(&FeatureVector::default()).unwrap();
    let json = serde_json::to_value(r).unwrap();
    assert_eq!(json["predicted_people"], r.predicted_people);
    assert_eq!(json["capacity_exceeded"], r.capacity_exceeded);
    assert_eq!(json["resources"]["medical_kits"], r.resources.medical_kits);
}
