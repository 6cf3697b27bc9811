//! Occupancy model: a fitted regressor plus the schema and hold-out scores
//! it was fitted with.
//!
//! # Lifecycle
//!
//! ```text
//! &[TrainingRecord] ──► train_test_split ──► Regressor::fit (train rows)
//!                                                 │
//!                                                 ▼
//!                              EvaluationMetrics (held-out rows)
//!                                                 │
//!                                                 ▼
//!                                   TrainedModel (immutable)
//! ```
//!
//! A [`TrainedModel`] is never mutated after [`TrainedModel::fit`] returns.
//! Inference takes `&self` and touches no interior mutability, so one model
//! can serve any number of threads.
//!
//! The estimator sits behind the [`Regressor`] trait; the random forest in
//! [`crate::forest`] is the default.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ForecastConfig;
use crate::dataset::{check_schema, design_matrix, train_test_split, OccupancyDataset, TrainingRecord, MIN_RECORDS};
use crate::error::{ForecastError, ForecastResult, ValidationError};
use crate::features::{default_schema, FeatureRow, FeatureVector, FEATURE_NAMES};
use crate::forest::RandomForestRegressor;
use crate::metrics::EvaluationMetrics;

// ---------------------------------------------------------------------------
// Regressor
// ---------------------------------------------------------------------------

/// A supervised regression estimator over dense `f64` features.
pub trait Regressor: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Fit on `x` (`[n, d]`) and `y` (`[n]`), replacing any previous fit.
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> ForecastResult<()>;

    /// Whether [`Regressor::fit`] has completed.
    fn is_fitted(&self) -> bool;

    /// Check that a fitted estimator expecting `n_features` columns is safe
    /// to predict with. The default only requires [`Regressor::is_fitted`].
    fn validate(&self, _n_features: usize) -> ForecastResult<()> {
        if self.is_fitted() {
            Ok(())
        } else {
            Err(ForecastError::NotFitted(self.name()))
        }
    }

    /// Estimate for one row of width `d`. Only meaningful once fitted.
    fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64;

    /// Estimates for every row of `x`.
    fn predict(&self, x: ArrayView2<'_, f64>) -> Array1<f64> {
        x.rows().into_iter().map(|row| self.predict_row(row)).collect()
    }
}

// ---------------------------------------------------------------------------
// TrainedModel
// ---------------------------------------------------------------------------

/// Fitted occupancy model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel<R = RandomForestRegressor> {
    feature_names: Vec<String>,
    config: ForecastConfig,
    metrics: EvaluationMetrics,
    regressor: R,
}

impl TrainedModel<RandomForestRegressor> {
    /// Fit the default random forest on `records`.
    ///
    /// # Errors
    ///
    /// - [`ForecastError::InsufficientData`] with fewer than two records.
    /// - [`ForecastError::Config`] when `config` fails validation.
    pub fn fit(records: &[TrainingRecord], config: &ForecastConfig) -> ForecastResult<Self> {
        Self::fit_with(RandomForestRegressor::from_config(config), records, config)
    }

    /// Check `dataset`'s column schema, then [`TrainedModel::fit`] its records.
    pub fn fit_dataset(dataset: &dyn OccupancyDataset, config: &ForecastConfig) -> ForecastResult<Self> {
        check_schema(dataset.columns())?;
        info!("Fitting occupancy model on dataset `{}` ({} records)", dataset.name(), dataset.len());
        Self::fit(dataset.records(), config)
    }
}

impl<R: Regressor> TrainedModel<R> {
    /// Fit an arbitrary [`Regressor`] on the training partition of `records`
    /// and score it on the held-out partition.
    pub fn fit_with(mut regressor: R, records: &[TrainingRecord], config: &ForecastConfig) -> ForecastResult<Self> {
        config.validate()?;
        if records.len() < MIN_RECORDS {
            return Err(ForecastError::insufficient_data(records.len(), MIN_RECORDS));
        }

        let split = train_test_split(records.len(), config.test_fraction, config.seed)?;
        let (x, y) = design_matrix(records);

        let x_train = x.select(Axis(0), &split.train);
        let y_train = y.select(Axis(0), &split.train);
        debug!(
            "{}: fitting on {} rows, holding out {}",
            regressor.name(),
            split.train.len(),
            split.test.len()
        );
        regressor.fit(x_train.view(), y_train.view())?;

        let x_test = x.select(Axis(0), &split.test);
        let y_test = y.select(Axis(0), &split.test);
        let y_pred = regressor.predict(x_test.view());
        let metrics = EvaluationMetrics::compute(y_test.view(), y_pred.view(), split.train.len());

        info!("Model evaluation: {}", metrics.summary());

        Ok(TrainedModel {
            feature_names: default_schema(),
            config: config.clone(),
            metrics,
            regressor,
        })
    }

    /// Raw occupancy estimate for `row`, neither clamped nor rounded.
    ///
    /// # Errors
    ///
    /// - [`ForecastError::Schema`] unless `row` carries exactly the fitted
    ///   feature names in fitted order.
    /// - [`ForecastError::Validation`] if a value is NaN or infinite.
    pub fn predict(&self, row: &FeatureRow) -> ForecastResult<f64> {
        let values = row.aligned(&self.feature_names)?;
        if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
            let field = FEATURE_NAMES.get(pos).copied().unwrap_or("feature");
            return Err(ValidationError::NonFinite { field }.into());
        }
        Ok(self.regressor.predict_row(Array1::from(values).view()))
    }

    /// Raw estimate for a typed scenario.
    pub fn predict_features(&self, features: &FeatureVector) -> f64 {
        let values = Array1::from(features.to_array().to_vec());
        self.regressor.predict_row(values.view())
    }

    /// Feature names in the order the model was fitted on.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Hold-out scores recorded at fit time.
    pub fn metrics(&self) -> &EvaluationMetrics {
        &self.metrics
    }

    /// Configuration the model was fitted with.
    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// The fitted estimator.
    pub fn regressor(&self) -> &R {
        &self.regressor
    }
}

impl<R: Regressor + Serialize + DeserializeOwned> TrainedModel<R> {
    /// Write the model as JSON to `path`, creating parent directories.
    pub fn save_json(&self, path: &Path) -> ForecastResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ForecastError::model_file(parent, e))?;
        }
        let file = File::create(path).map_err(|e| ForecastError::model_file(path, e))?;
        serde_json::to_writer(BufWriter::new(file), self)?;
        info!("Saved {} model to {}", self.regressor.name(), path.display());
        Ok(())
    }

    /// Read a model written by [`TrainedModel::save_json`].
    ///
    /// # Errors
    ///
    /// - [`ForecastError::Schema`] if its feature names are not the
    ///   six-feature schema.
    /// - [`ForecastError::NotFitted`] if the file holds an unfitted estimator.
    /// - [`ForecastError::InvalidModel`] if the estimator fails
    ///   [`Regressor::validate`].
    pub fn load_json(path: &Path) -> ForecastResult<Self> {
        let file = File::open(path).map_err(|e| ForecastError::model_file(path, e))?;
        let model: Self = serde_json::from_reader(BufReader::new(file))?;
        check_feature_names(&model.feature_names)?;
        model.regressor.validate(model.feature_names.len())?;
        info!("Loaded {} model from {}", model.regressor.name(), path.display());
        Ok(model)
    }
}

fn check_feature_names(names: &[String]) -> ForecastResult<()> {
    let row = names.iter().fold(FeatureRow::new(), |row, name| row.with(name.as_str(), 0.0));
    row.aligned(&default_schema())?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{SyntheticConfig, SyntheticShelterDataset};
    use crate::error::SchemaError;
    use crate::features::RAINFALL;
    use approx::assert_abs_diff_eq;
    use std::sync::Arc;

    fn quick_config() -> ForecastConfig {
        ForecastConfig { n_estimators: 12, ..ForecastConfig::default() }
    }

    fn fitted(n: usize) -> TrainedModel {
        let ds = SyntheticShelterDataset::new(n, SyntheticConfig::default());
        TrainedModel::fit(ds.records(), &quick_config()).unwrap()
    }

    #[test]
    fn fewer_than_two_records_is_insufficient() {
        let ds = SyntheticShelterDataset::new(1, SyntheticConfig::default());
        let err = TrainedModel::fit(ds.records(), &quick_config()).unwrap_err();
        assert!(matches!(err, ForecastError::InsufficientData { found: 1, required: 2 }));
        let err = TrainedModel::fit(&[], &quick_config()).unwrap_err();
        assert!(matches!(err, ForecastError::InsufficientData { found: 0, .. }));
    }

    #[test]
    fn two_records_split_one_and_one() {
        let model = fitted(2);
        assert_eq!(model.metrics().n_train, 1);
        assert_eq!(model.metrics().n_test, 1);
    }

    #[test]
    fn default_split_is_eighty_twenty() {
        let model = fitted(50);
        assert_eq!(model.metrics().n_train, 40);
        assert_eq!(model.metrics().n_test, 10);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let ds = SyntheticShelterDataset::new(10, SyntheticConfig::default());
        let cfg = ForecastConfig { n_estimators: 0, ..ForecastConfig::default() };
        assert!(matches!(TrainedModel::fit(ds.records(), &cfg), Err(ForecastError::Config(_))));
    }

    #[test]
    fn predict_is_idempotent() {
        let model = fitted(40);
        let row = FeatureVector::default().to_row();
        let first = model.predict(&row).unwrap();
        for _ in 0..5 {
            assert_eq!(model.predict(&row).unwrap(), first);
        }
    }

    #[test]
    fn typed_and_named_paths_agree() {
        let model = fitted(40);
        let f = FeatureVector { rainfall_mm: 210.0, vulnerability_index: 8, ..FeatureVector::default() };
        assert_abs_diff_eq!(model.predict(&f.to_row()).unwrap(), model.predict_features(&f));
    }

    #[test]
    fn missing_feature_is_schema_error() {
        let model = fitted(20);
        let mut row = FeatureVector::default().to_row();
        row.remove(RAINFALL);
        let err = model.predict(&row).unwrap_err();
        assert!(matches!(
            err,
            ForecastError::Schema(SchemaError::MissingFeature { ref feature }) if feature == RAINFALL
        ));
    }

    #[test]
    fn extra_feature_is_schema_error() {
        let model = fitted(20);
        let row = FeatureVector::default().to_row().with("umidade", 80.0);
        assert!(matches!(
            model.predict(&row),
            Err(ForecastError::Schema(SchemaError::UnexpectedFeature { .. }))
        ));
    }

    #[test]
    fn non_finite_value_is_validation_error() {
        let model = fitted(20);
        let mut row = FeatureVector::default().to_row();
        row.insert(RAINFALL, f64::NAN);
        assert!(matches!(
            model.predict(&row),
            Err(ForecastError::Validation(ValidationError::NonFinite { field })) if field == RAINFALL
        ));
    }

    #[test]
    fn same_seed_same_model() {
        assert_eq!(fitted(30), fitted(30));
    }

    #[test]
    fn concurrent_predictions_agree() {
        let model = Arc::new(fitted(40));
        let f = FeatureVector::default();
        let expected = model.predict_features(&f);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let model = Arc::clone(&model);
                std::thread::spawn(move || model.predict(&f.to_row()).unwrap())
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), expected);
        }
    }

    #[test]
    fn model_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TrainedModel>();
    }
}
