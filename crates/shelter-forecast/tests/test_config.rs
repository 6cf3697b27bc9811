//! Integration tests for [`shelter_forecast::config`].
//!
//! All tests are deterministic and use only fixed values plus the
//! `ForecastConfig::default()` constructor. File round-trips go through a
//! [`tempfile::TempDir`].

use shelter_forecast::config::ForecastConfig;
use shelter_forecast::error::ConfigError;
use shelter_forecast::features::NUM_FEATURES;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Default config invariants
// ---------------------------------------------------------------------------

/// The default configuration must pass its own validation.
#[test]
fn default_config_is_valid() {
    ForecastConfig::default()
        .validate()
        .expect("default ForecastConfig must be valid");
}

/// Defaults mirror the documented forest settings.
#[test]
fn default_config_values() {
    let cfg = ForecastConfig::default();
    assert_eq!(cfg.n_estimators, 200);
    assert_eq!(cfg.seed, 42);
    assert!((cfg.test_fraction - 0.2).abs() < 1e-12);
    assert_eq!(cfg.max_depth, None);
    assert_eq!(cfg.min_samples_split, 2);
    assert_eq!(cfg.min_samples_leaf, 1);
    assert_eq!(cfg.max_features, None);
    assert!(cfg.bootstrap);
    assert_eq!(cfg.features_per_split(), NUM_FEATURES);
}

// ---------------------------------------------------------------------------
// JSON round-trips
// ---------------------------------------------------------------------------

/// A customised config survives a write/read cycle unchanged.
#[test]
fn json_round_trip_preserves_every_field() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("forecast.json");

    let original = ForecastConfig {
        test_fraction: 0.25,
        seed: 7,
        n_estimators: 50,
        max_depth: Some(12),
        min_samples_split: 4,
        min_samples_leaf: 2,
        max_features: Some(3),
        bootstrap: false,
    };
    original.to_json(&path).expect("write config");
    let loaded = ForecastConfig::from_json(&path).expect("read config");
    assert_eq!(loaded, original);
}

/// A file that parses but breaks an invariant is an `InvalidValue` error
/// naming the offending field.
#[test]
fn loading_invalid_values_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("forecast.json");
    std::fs::write(&path, r#"{ "test_fraction": 1.0 }"#).unwrap();

    match ForecastConfig::from_json(&path) {
        Err(ConfigError::InvalidValue { field, .. }) => assert_eq!(field, "test_fraction"),
        other => panic!("expected InvalidValue, got {other:?}"),
    }
}

/// Unknown keys are ignored so older files keep loading.
#[test]
fn unknown_keys_are_ignored() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("forecast.json");
    std::fs::write(&path, r#"{ "seed": 9, "learning_rate": 0.1 }"#).unwrap();

    let cfg = ForecastConfig::from_json(&path).expect("unknown keys are tolerated");
    assert_eq!(cfg.seed, 9);
    assert_eq!(cfg.n_estimators, 200);
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// `max_depth = Some(0)` can never grow a tree and is rejected.
#[test]
fn zero_max_depth_is_invalid() {
    let cfg = ForecastConfig { max_depth: Some(0), ..ForecastConfig::default() };
    assert!(matches!(
        cfg.validate(),
        Err(ConfigError::InvalidValue { field: "max_depth", .. })
    ));
}

/// Every `max_features` value in `1..=6` is accepted.
#[test]
fn all_feature_counts_are_valid() {
    for m in 1..=NUM_FEATURES {
        let cfg = ForecastConfig { max_features: Some(m), ..ForecastConfig::default() };
        assert!(cfg.validate().is_ok(), "max_features={m} should be valid");
        assert_eq!(cfg.features_per_split(), m);
    }
}
