//! Historical shelter records and the dataset providers that supply them.
//!
//! This module defines the [`OccupancyDataset`] trait plus three concrete
//! implementations:
//!
//! - [`CsvDataset`]: reads the historical CSV file. The header must match
//!   [`DATASET_COLUMNS`] exactly.
//! - [`InMemoryDataset`]: wraps records that are already in memory.
//! - [`SyntheticShelterDataset`]: generates fully-deterministic records from
//!   a closed-form occupancy model; useful for unit tests, benchmarks and
//!   dry runs. **Never uses random data.**
//!
//! [`train_test_split`] partitions record indices into a training and a
//! held-out evaluation set with a seeded shuffle.
//!
//! # Expected file layout
//!
//! ```text
//! chuva_mm,temperatura,vulnerabilidade_local,eventos_passados,distancia_cidade_km,capacidade_abrigo,pessoas_previstas
//! 120.0,24.5,7,3,15.0,250,180
//! ...
//! ```

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{DatasetError, ForecastError, ForecastResult, SchemaError};
use crate::features::{
    FeatureVector, CAPACITY, DISTANCE, LABEL_COLUMN, NUM_FEATURES, PAST_EVENTS,
    RAINFALL, TEMPERATURE, VULNERABILITY,
};
use crate::rng::XorShift64;

/// Minimum number of records that can be split into train and test.
pub const MIN_RECORDS: usize = 2;

/// Largest accepted `pessoas_previstas` value: 2^53, the last integer an
/// `f64` holds exactly.
pub const MAX_PEOPLE_LABEL: f64 = 9_007_199_254_740_992.0;

/// Every column of the historical file, in file order.
pub const DATASET_COLUMNS: [&str; NUM_FEATURES + 1] = [
    RAINFALL,
    TEMPERATURE,
    VULNERABILITY,
    PAST_EVENTS,
    DISTANCE,
    CAPACITY,
    LABEL_COLUMN,
];

// ---------------------------------------------------------------------------
// TrainingRecord
// ---------------------------------------------------------------------------

/// One historical observation: scenario features plus the occupancy that
/// was actually recorded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingRecord {
    /// Scenario features.
    pub features: FeatureVector,
    /// Observed number of people sheltered.
    pub people_expected: f64,
}

impl TrainingRecord {
    /// Pair `features` with its observed label.
    pub fn new(features: FeatureVector, people_expected: f64) -> Self {
        TrainingRecord { features, people_expected }
    }
}

// ---------------------------------------------------------------------------
// OccupancyDataset trait
// ---------------------------------------------------------------------------

/// Common interface for every source of historical records.
///
/// Implementations must be `Send + Sync` so a loaded dataset can be shared
/// with the model cache without additional synchronisation. Records are
/// loaded once and never change afterwards.
pub trait OccupancyDataset: Send + Sync {
    /// Column names exactly as the source declared them.
    fn columns(&self) -> &[String];

    /// All records, in source order.
    fn records(&self) -> &[TrainingRecord];

    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Total number of records.
    fn len(&self) -> usize {
        self.records().len()
    }

    /// Returns `true` when the dataset contains no records.
    fn is_empty(&self) -> bool {
        self.records().is_empty()
    }
}

/// Check a header against [`DATASET_COLUMNS`].
///
/// Missing columns are reported first, then unexpected ones, then
/// misordered ones, so the message names the most actionable problem.
pub fn check_schema<S: AsRef<str>>(columns: &[S]) -> Result<(), SchemaError> {
    for expected in DATASET_COLUMNS {
        if !columns.iter().any(|c| c.as_ref() == expected) {
            return Err(SchemaError::MissingColumn { column: expected.to_string() });
        }
    }
    for column in columns {
        if !DATASET_COLUMNS.contains(&column.as_ref()) {
            return Err(SchemaError::UnexpectedColumn { column: column.as_ref().to_string() });
        }
    }
    for (position, (found, expected)) in columns.iter().zip(DATASET_COLUMNS).enumerate() {
        if found.as_ref() != expected {
            return Err(SchemaError::ColumnOrder {
                position,
                expected: expected.to_string(),
                found: found.as_ref().to_string(),
            });
        }
    }
    if columns.len() != DATASET_COLUMNS.len() {
        // Every name is known and present, so the surplus is a repeat.
        let repeated = &columns[DATASET_COLUMNS.len()];
        return Err(SchemaError::UnexpectedColumn { column: repeated.as_ref().to_string() });
    }
    Ok(())
}

/// Design matrix `[n, 6]` and label vector `[n]` for `records`.
pub fn design_matrix(records: &[TrainingRecord]) -> (Array2<f64>, Array1<f64>) {
    let rows: Vec<[f64; NUM_FEATURES]> = records.iter().map(|r| r.features.to_array()).collect();
    let x = Array2::from_shape_fn((records.len(), NUM_FEATURES), |(i, j)| rows[i][j]);
    let y = Array1::from_iter(records.iter().map(|r| r.people_expected));
    (x, y)
}

// ---------------------------------------------------------------------------
// CsvDataset
// ---------------------------------------------------------------------------

/// One CSV row before range and integrality checks.
#[derive(Debug, Deserialize)]
struct RawRecord {
    chuva_mm: f64,
    temperatura: f64,
    vulnerabilidade_local: f64,
    eventos_passados: f64,
    distancia_cidade_km: f64,
    capacidade_abrigo: f64,
    pessoas_previstas: f64,
}

impl RawRecord {
    fn into_record(self, row: usize) -> Result<TrainingRecord, DatasetError> {
        let features = FeatureVector {
            rainfall_mm: non_negative(row, RAINFALL, self.chuva_mm)?,
            temperature_c: finite(row, TEMPERATURE, self.temperatura)?,
            vulnerability_index: integral(row, VULNERABILITY, self.vulnerabilidade_local, 0, 10)?
                as u8,
            past_events: integral(row, PAST_EVENTS, self.eventos_passados, 0, u32::MAX as u64)?
                as u32,
            distance_to_city_km: non_negative(row, DISTANCE, self.distancia_cidade_km)?,
            shelter_capacity: integral(row, CAPACITY, self.capacidade_abrigo, 1, u32::MAX as u64)?
                as u32,
        };
        let people_expected = non_negative(row, LABEL_COLUMN, self.pessoas_previstas)?;
        if people_expected > MAX_PEOPLE_LABEL {
            return Err(DatasetError::invalid_cell(
                row,
                LABEL_COLUMN,
                format!("{people_expected} exceeds the largest supported head count {MAX_PEOPLE_LABEL}"),
            ));
        }
        Ok(TrainingRecord::new(features, people_expected))
    }
}

fn finite(row: usize, column: &'static str, value: f64) -> Result<f64, DatasetError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(DatasetError::invalid_cell(row, column, "value must be finite"))
    }
}

fn non_negative(row: usize, column: &'static str, value: f64) -> Result<f64, DatasetError> {
    let value = finite(row, column, value)?;
    if value < 0.0 {
        return Err(DatasetError::invalid_cell(row, column, format!("{value} must be >= 0")));
    }
    Ok(value)
}

fn integral(
    row: usize,
    column: &'static str,
    value: f64,
    min: u64,
    max: u64,
) -> Result<u64, DatasetError> {
    let value = finite(row, column, value)?;
    if value.fract() != 0.0 {
        return Err(DatasetError::invalid_cell(row, column, format!("{value} is not an integer")));
    }
    if value < min as f64 || value > max as f64 {
        return Err(DatasetError::invalid_cell(
            row,
            column,
            format!("{value} is outside [{min}, {max}]"),
        ));
    }
    Ok(value as u64)
}

/// Historical records read from a CSV file.
///
/// The file is read eagerly at construction; a bad header fails with
/// [`SchemaError`] and a bad cell fails with [`DatasetError::InvalidCell`].
#[derive(Debug, Clone)]
pub struct CsvDataset {
    name: String,
    path: Option<PathBuf>,
    columns: Vec<String>,
    records: Vec<TrainingRecord>,
}

impl CsvDataset {
    /// Read and validate the CSV file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::IoError`] if the file cannot be opened,
    /// [`SchemaError`] if the header does not match [`DATASET_COLUMNS`], and
    /// [`DatasetError::Csv`] / [`DatasetError::InvalidCell`] for malformed
    /// rows.
    pub fn from_path(path: &Path) -> ForecastResult<Self> {
        let file =
            std::fs::File::open(path).map_err(|source| DatasetError::io_error(path, source))?;
        let mut ds = Self::from_reader(file, path.display().to_string())?;
        ds.path = Some(path.to_path_buf());
        Ok(ds)
    }

    /// Read and validate CSV data from any reader; `name` labels errors and
    /// log lines.
    pub fn from_reader<R: Read>(reader: R, name: impl Into<String>) -> ForecastResult<Self> {
        let name = name.into();
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr.headers().map_err(|e| DatasetError::csv(name.as_str(), e))?.clone();
        let columns: Vec<String> = headers.iter().map(str::to_string).collect();
        check_schema(&columns)?;

        let mut records = Vec::new();
        for (i, row) in rdr.deserialize::<RawRecord>().enumerate() {
            let raw = row.map_err(|e| DatasetError::csv(name.as_str(), e))?;
            records.push(raw.into_record(i + 1)?);
        }

        info!("CsvDataset: loaded {} records from {}", records.len(), name);
        Ok(CsvDataset { name, path: None, columns, records })
    }

    /// Path the records were read from, when loaded from disk.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl OccupancyDataset for CsvDataset {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn records(&self) -> &[TrainingRecord] {
        &self.records
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ---------------------------------------------------------------------------
// InMemoryDataset
// ---------------------------------------------------------------------------

/// Records supplied directly by the caller, always carrying the canonical
/// column set.
#[derive(Debug, Clone)]
pub struct InMemoryDataset {
    name: String,
    columns: Vec<String>,
    records: Vec<TrainingRecord>,
}

impl InMemoryDataset {
    /// Wrap `records` under `name`.
    pub fn new(name: impl Into<String>, records: Vec<TrainingRecord>) -> Self {
        InMemoryDataset {
            name: name.into(),
            columns: DATASET_COLUMNS.iter().map(|c| (*c).to_string()).collect(),
            records,
        }
    }
}

impl OccupancyDataset for InMemoryDataset {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn records(&self) -> &[TrainingRecord] {
        &self.records
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ---------------------------------------------------------------------------
// SyntheticShelterDataset
// ---------------------------------------------------------------------------

/// Configuration for [`SyntheticShelterDataset`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticConfig {
    /// Peak amplitude of the deterministic label perturbation, people.
    /// Default: **5.0**.
    pub noise_amplitude: f64,
    /// People sheltered per millimetre of rain. Default: **0.6**.
    pub rain_weight: f64,
    /// People sheltered per vulnerability point. Default: **9.0**.
    pub vulnerability_weight: f64,
    /// People sheltered per past event. Default: **4.0**.
    pub past_event_weight: f64,
    /// Reduction per kilometre from the city. Default: **0.25**.
    pub distance_weight: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        SyntheticConfig {
            noise_amplitude: 5.0,
            rain_weight: 0.6,
            vulnerability_weight: 9.0,
            past_event_weight: 4.0,
            distance_weight: 0.25,
        }
    }
}

/// Fully-deterministic synthetic history.
///
/// Features sweep their accepted ranges with co-prime periods so that no two
/// features are collinear. The label follows a closed-form occupancy model
/// plus a bounded sinusoidal perturbation, clamped at zero.
#[derive(Debug, Clone)]
pub struct SyntheticShelterDataset {
    columns: Vec<String>,
    records: Vec<TrainingRecord>,
    config: SyntheticConfig,
}

impl SyntheticShelterDataset {
    /// Generate `num_records` records.
    pub fn new(num_records: usize, config: SyntheticConfig) -> Self {
        let records = (0..num_records).map(|i| Self::record(i, &config)).collect();
        debug!("SyntheticShelterDataset: generated {num_records} records");
        SyntheticShelterDataset {
            columns: DATASET_COLUMNS.iter().map(|c| (*c).to_string()).collect(),
            records,
            config,
        }
    }

    /// Generation parameters.
    pub fn config(&self) -> &SyntheticConfig {
        &self.config
    }

    /// Closed-form occupancy for `features`, before perturbation.
    pub fn expected_people(features: &FeatureVector, cfg: &SyntheticConfig) -> f64 {
        let raw = cfg.rain_weight * features.rainfall_mm
            + cfg.vulnerability_weight * f64::from(features.vulnerability_index)
            + cfg.past_event_weight * f64::from(features.past_events)
            - cfg.distance_weight * features.distance_to_city_km
            + 0.05 * f64::from(features.shelter_capacity)
            + 0.8 * (features.temperature_c - 25.0).abs();
        raw.max(0.0)
    }

    fn record(i: usize, cfg: &SyntheticConfig) -> TrainingRecord {
        let features = FeatureVector {
            rainfall_mm: ((i * 37) % 501) as f64,
            temperature_c: -10.0 + ((i * 13) % 51) as f64,
            vulnerability_index: (i % 11) as u8,
            past_events: ((i * 7) % 21) as u32,
            distance_to_city_km: ((i * 53) % 301) as f64,
            shelter_capacity: 50 + ((i * 29) % 451) as u32,
        };
        let noise = cfg.noise_amplitude * (i as f64 * 0.7).sin();
        let people = (Self::expected_people(&features, cfg) + noise).max(0.0).round();
        TrainingRecord::new(features, people)
    }
}

impl OccupancyDataset for SyntheticShelterDataset {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn records(&self) -> &[TrainingRecord] {
        &self.records
    }

    fn name(&self) -> &str {
        "SyntheticShelterDataset"
    }
}

// ---------------------------------------------------------------------------
// Train / test partition
// ---------------------------------------------------------------------------

/// Record indices for the training and held-out partitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainTestSplit {
    /// Indices used to fit the model.
    pub train: Vec<usize>,
    /// Indices held out for evaluation.
    pub test: Vec<usize>,
}

/// Partition `0..n` with a seeded shuffle.
///
/// The held-out size is `ceil(n * test_fraction)` clamped to `[1, n - 1]`,
/// so neither side is ever empty. The first `n_test` shuffled indices form
/// the held-out set.
///
/// # Errors
///
/// Returns [`ForecastError::InsufficientData`] when `n < 2`.
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> ForecastResult<TrainTestSplit> {
    if n < MIN_RECORDS {
        return Err(ForecastError::insufficient_data(n, MIN_RECORDS));
    }
    let n_test = ((n as f64 * test_fraction).ceil() as usize).clamp(1, n - 1);

    let mut indices: Vec<usize> = (0..n).collect();
    XorShift64::new(seed).shuffle(&mut indices);
    let train = indices.split_off(n_test);

    debug!("train_test_split: n={n} train={} test={}", train.len(), indices.len());
    Ok(TrainTestSplit { train, test: indices })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
