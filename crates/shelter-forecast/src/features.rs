//! Scenario features and the six-column schema shared by training and
//! inference.
//!
//! [`FeatureVector`] is the typed description of one scenario. At the schema
//! boundary a scenario is carried as a [`FeatureRow`], an ordered list of
//! `(name, value)` pairs, so that a row assembled by a front end can be
//! checked against the exact feature names the model was fitted on.
//!
//! Column names follow the historical data files.

use serde::{Deserialize, Serialize};

use crate::error::{SchemaError, ValidationError};

// ---------------------------------------------------------------------------
// Schema constants
// ---------------------------------------------------------------------------

/// Number of model input features.
pub const NUM_FEATURES: usize = 6;

/// Expected rainfall, millimetres.
pub const RAINFALL: &str = "chuva_mm";
/// Mean temperature, degrees Celsius.
pub const TEMPERATURE: &str = "temperatura";
/// Site vulnerability index, 0–10.
pub const VULNERABILITY: &str = "vulnerabilidade_local";
/// Number of previous extreme events.
pub const PAST_EVENTS: &str = "eventos_passados";
/// Distance to the nearest city, kilometres.
pub const DISTANCE: &str = "distancia_cidade_km";
/// Declared shelter capacity, people.
pub const CAPACITY: &str = "capacidade_abrigo";
/// Ground-truth occupancy label column.
pub const LABEL_COLUMN: &str = "pessoas_previstas";

/// Feature names in model order.
pub const FEATURE_NAMES: [&str; NUM_FEATURES] =
    [RAINFALL, TEMPERATURE, VULNERABILITY, PAST_EVENTS, DISTANCE, CAPACITY];

// ---------------------------------------------------------------------------
// Accepted scenario ranges (inclusive)
// ---------------------------------------------------------------------------

/// Accepted rainfall range, mm.
pub const RAINFALL_RANGE: (f64, f64) = (0.0, 500.0);
/// Accepted temperature range, °C.
pub const TEMPERATURE_RANGE: (f64, f64) = (-50.0, 60.0);
/// Accepted vulnerability index range.
pub const VULNERABILITY_RANGE: (u8, u8) = (0, 10);
/// Accepted number of past events.
pub const PAST_EVENTS_RANGE: (u32, u32) = (0, 20);
/// Accepted distance range, km.
pub const DISTANCE_RANGE: (f64, f64) = (0.0, 500.0);
/// Accepted shelter capacity range, people.
pub const CAPACITY_RANGE: (u32, u32) = (1, 1000);

// ---------------------------------------------------------------------------
// FeatureVector
// ---------------------------------------------------------------------------

/// The six environmental and contextual inputs describing one scenario.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Expected rainfall in millimetres.
    pub rainfall_mm: f64,
    /// Mean temperature in degrees Celsius.
    pub temperature_c: f64,
    /// Social / infrastructural fragility of the site, 0–10.
    pub vulnerability_index: u8,
    /// Number of previous extreme events at the site.
    pub past_events: u32,
    /// Distance to the nearest city in kilometres.
    pub distance_to_city_km: f64,
    /// Maximum number of people the shelter can hold.
    pub shelter_capacity: u32,
}

impl Default for FeatureVector {
    /// The baseline scenario offered to operators before they edit anything.
    fn default() -> Self {
        FeatureVector {
            rainfall_mm: 50.0,
            temperature_c: 25.0,
            vulnerability_index: 5,
            past_events: 2,
            distance_to_city_km: 50.0,
            shelter_capacity: 200,
        }
    }
}

impl FeatureVector {
    /// Values in [`FEATURE_NAMES`] order.
    pub fn to_array(&self) -> [f64; NUM_FEATURES] {
        [
            self.rainfall_mm,
            self.temperature_c,
            f64::from(self.vulnerability_index),
            f64::from(self.past_events),
            self.distance_to_city_km,
            f64::from(self.shelter_capacity),
        ]
    }

    /// Named view of this vector, in [`FEATURE_NAMES`] order.
    pub fn to_row(&self) -> FeatureRow {
        FeatureRow {
            entries: FEATURE_NAMES
                .iter()
                .zip(self.to_array())
                .map(|(name, value)| ((*name).to_string(), value))
                .collect(),
        }
    }

    /// Check every field against the accepted scenario ranges.
    ///
    /// Front ends are expected to enforce the same ranges; this is the
    /// core's own check and runs on every evaluation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_float("rainfall_mm", self.rainfall_mm, RAINFALL_RANGE)?;
        check_float("temperature_c", self.temperature_c, TEMPERATURE_RANGE)?;
        check_int(
            "vulnerability_index",
            u32::from(self.vulnerability_index),
            (u32::from(VULNERABILITY_RANGE.0), u32::from(VULNERABILITY_RANGE.1)),
        )?;
        check_int("past_events", self.past_events, PAST_EVENTS_RANGE)?;
        check_float("distance_to_city_km", self.distance_to_city_km, DISTANCE_RANGE)?;
        check_int("shelter_capacity", self.shelter_capacity, CAPACITY_RANGE)?;
        Ok(())
    }
}

fn check_float(field: &'static str, value: f64, (min, max): (f64, f64)) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFinite { field });
    }
    if value < min || value > max {
        return Err(ValidationError::out_of_range(field, value, min, max));
    }
    Ok(())
}

fn check_int(field: &'static str, value: u32, (min, max): (u32, u32)) -> Result<(), ValidationError> {
    if value < min || value > max {
        return Err(ValidationError::out_of_range(
            field,
            f64::from(value),
            f64::from(min),
            f64::from(max),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// FeatureRow
// ---------------------------------------------------------------------------

/// Ordered `(feature name, value)` pairs describing one scenario.
///
/// A row built from a [`FeatureVector`] is always well formed. Rows assembled
/// by hand are checked against the fitted schema by [`FeatureRow::aligned`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    entries: Vec<(String, f64)>,
}

impl FeatureRow {
    /// Empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`FeatureRow::insert`].
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.insert(name, value);
        self
    }

    /// Set `name` to `value`, replacing an existing entry in place or
    /// appending a new one.
    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Drop `name` from the row, returning its value if it was present.
    pub fn remove(&mut self, name: &str) -> Option<f64> {
        let pos = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(pos).1)
    }

    /// Value stored under `name`.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    /// Feature names in row order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when the row holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Values in `schema` order.
    ///
    /// The row must carry exactly the names in `schema`, in the same order.
    /// Missing names are reported first, then extra names, then order.
    pub fn aligned(&self, schema: &[String]) -> Result<Vec<f64>, SchemaError> {
        for expected in schema {
            if self.get(expected).is_none() {
                return Err(SchemaError::MissingFeature { feature: expected.clone() });
            }
        }
        for name in self.names() {
            if !schema.iter().any(|s| s == name) {
                return Err(SchemaError::UnexpectedFeature { feature: name.to_string() });
            }
        }
        if self.entries.len() != schema.len() {
            // Only reachable through a deserialized row carrying a repeated name.
            let duplicate = self
                .names()
                .enumerate()
                .find(|(i, name)| self.names().take(*i).any(|prev| prev == *name))
                .map(|(_, name)| name.to_string())
                .unwrap_or_default();
            return Err(SchemaError::UnexpectedFeature { feature: duplicate });
        }
        for (position, ((found, _), expected)) in self.entries.iter().zip(schema).enumerate() {
            if found != expected {
                return Err(SchemaError::FeatureOrder {
                    position,
                    expected: expected.clone(),
                    found: found.clone(),
                });
            }
        }
        Ok(self.entries.iter().map(|(_, v)| *v).collect())
    }
}

impl From<&FeatureVector> for FeatureRow {
    fn from(features: &FeatureVector) -> Self {
        features.to_row()
    }
}

/// [`FEATURE_NAMES`] as owned strings, the schema stored on a fitted model.
pub fn default_schema() -> Vec<String> {
    FEATURE_NAMES.iter().map(|s| (*s).to_string()).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scenario_is_valid() {
        FeatureVector::default().validate().expect("default scenario is valid");
    }

    #[test]
    fn to_array_follows_feature_order() {
        let fv = FeatureVector {
            rainfall_mm: 120.0,
            temperature_c: -3.5,
            vulnerability_index: 7,
            past_events: 4,
            distance_to_city_km: 12.0,
            shelter_capacity: 300,
        };
        assert_eq!(fv.to_array(), [120.0, -3.5, 7.0, 4.0, 12.0, 300.0]);
    }

    #[test]
    fn row_from_vector_is_aligned() {
        let fv = FeatureVector::default();
        let row = fv.to_row();
        assert_eq!(row.names().collect::<Vec<_>>(), FEATURE_NAMES.to_vec());
        assert_eq!(row.aligned(&default_schema()).unwrap(), fv.to_array().to_vec());
    }

    #[test]
    fn range_boundaries_are_inclusive() {
        let fv = FeatureVector {
            rainfall_mm: 500.0,
            temperature_c: -50.0,
            vulnerability_index: 10,
            past_events: 20,
            distance_to_city_km: 0.0,
            shelter_capacity: 1,
        };
        assert!(fv.validate().is_ok());
    }

    #[test]
    fn out_of_range_fields_are_rejected() {
        let base = FeatureVector::default();
        let cases = [
            FeatureVector { rainfall_mm: -1.0, ..base },
            FeatureVector { rainfall_mm: 500.1, ..base },
            FeatureVector { temperature_c: 61.0, ..base },
            FeatureVector { vulnerability_index: 11, ..base },
            FeatureVector { past_events: 21, ..base },
            FeatureVector { distance_to_city_km: 501.0, ..base },
            FeatureVector { shelter_capacity: 0, ..base },
            FeatureVector { shelter_capacity: 1001, ..base },
        ];
        for fv in cases {
            assert!(
                matches!(fv.validate(), Err(ValidationError::OutOfRange { .. })),
                "{fv:?} should be out of range"
            );
        }
    }

    #[test]
    fn nan_is_rejected() {
        let fv = FeatureVector { temperature_c: f64::NAN, ..FeatureVector::default() };
        assert_eq!(
            fv.validate(),
            Err(ValidationError::NonFinite { field: "temperature_c" })
        );
    }

    #[test]
    fn missing_feature_is_schema_error() {
        let mut row = FeatureVector::default().to_row();
        row.remove(DISTANCE);
        assert_eq!(
            row.aligned(&default_schema()),
            Err(SchemaError::MissingFeature { feature: DISTANCE.to_string() })
        );
    }

    #[test]
    fn extra_feature_is_schema_error() {
        let row = FeatureVector::default().to_row().with("umidade", 0.8);
        assert_eq!(
            row.aligned(&default_schema()),
            Err(SchemaError::UnexpectedFeature { feature: "umidade".to_string() })
        );
    }

    #[test]
    fn reordered_features_are_schema_error() {
        let fv = FeatureVector::default();
        let mut row = FeatureRow::new();
        for (name, value) in FEATURE_NAMES.iter().zip(fv.to_array()).rev() {
            row.insert(*name, value);
        }
        assert!(matches!(
            row.aligned(&default_schema()),
            Err(SchemaError::FeatureOrder { position: 0, .. })
        ));
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut row = FeatureVector::default().to_row();
        row.insert(RAINFALL, 99.0);
        assert_eq!(row.len(), NUM_FEATURES);
        assert_eq!(row.get(RAINFALL), Some(99.0));
        assert_eq!(row.names().next(), Some(RAINFALL));
    }
}
