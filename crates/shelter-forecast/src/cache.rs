//! Process-lifetime cache of fitted models keyed by dataset version.
//!
//! A model is fitted at most once per [`DatasetKey`]; later requests for the
//! same records and configuration receive a clone of the same
//! `Arc<TrainedModel>`. Inspection never triggers a fit and never waits
//! for one: fits run under a per-key lock, outside the map lock.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ForecastConfig;
use crate::dataset::{OccupancyDataset, TrainingRecord};
use crate::error::ForecastResult;
use crate::model::TrainedModel;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

struct Fnv1a(u64);

impl Fnv1a {
    fn new() -> Self {
        Fnv1a(FNV_OFFSET)
    }

    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= u64::from(b);
            self.0 = self.0.wrapping_mul(FNV_PRIME);
        }
    }

    fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    fn write_f64(&mut self, v: f64) {
        self.write_u64(v.to_bits());
    }

    fn write_opt(&mut self, v: Option<usize>) {
        match v {
            Some(v) => {
                self.write(&[1]);
                self.write_u64(v as u64);
            }
            None => self.write(&[0]),
        }
    }
}

/// Fingerprint of a record sequence plus the configuration fitted on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DatasetKey(u64);

impl DatasetKey {
    /// FNV-1a over every record (in order) and every config field.
    pub fn of(records: &[TrainingRecord], config: &ForecastConfig) -> Self {
        let mut h = Fnv1a::new();
        h.write_u64(records.len() as u64);
        for r in records {
            for v in r.features.to_array() {
                h.write_f64(v);
            }
            h.write_f64(r.people_expected);
        }
        h.write_f64(config.test_fraction);
        h.write_u64(config.seed);
        h.write_u64(config.n_estimators as u64);
        h.write_opt(config.max_depth);
        h.write_u64(config.min_samples_split as u64);
        h.write_u64(config.min_samples_leaf as u64);
        h.write_opt(config.max_features);
        h.write(&[u8::from(config.bootstrap)]);
        DatasetKey(h.0)
    }

    /// Raw 64-bit fingerprint.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DatasetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Fitted models shared across the process.
#[derive(Debug, Default)]
pub struct ModelCache {
    models: RwLock<HashMap<DatasetKey, Arc<TrainedModel>>>,
    fitting: Mutex<HashMap<DatasetKey, Arc<Mutex<()>>>>,
}

impl ModelCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached model for `dataset` and `config`, fitting it on first request.
    ///
    /// Concurrent callers with the same key wait for the one fit instead of
    /// repeating it. Callers with other keys, and readers, are not blocked.
    /// A failed fit is not cached; the next request tries again.
    pub fn get_or_fit(
        &self,
        dataset: &dyn OccupancyDataset,
        config: &ForecastConfig,
    ) -> ForecastResult<Arc<TrainedModel>> {
        let key = DatasetKey::of(dataset.records(), config);
        if let Some(model) = self.get(&key) {
            debug!("model cache hit for `{}` ({key})", dataset.name());
            return Ok(model);
        }

        let fit_lock = Arc::clone(self.fitting.lock().entry(key).or_default());
        let _fit_guard = fit_lock.lock();
        if let Some(model) = self.get(&key) {
            debug!("model cache hit for `{}` ({key}) after wait", dataset.name());
            return Ok(model);
        }

        info!("model cache miss for `{}` ({key}); fitting", dataset.name());
        let fitted = TrainedModel::fit_dataset(dataset, config).map(Arc::new);
        if let Ok(model) = &fitted {
            self.models.write().insert(key, Arc::clone(model));
        }
        self.fitting.lock().remove(&key);
        fitted
    }

    /// Cached model for `key`, without fitting.
    pub fn get(&self, key: &DatasetKey) -> Option<Arc<TrainedModel>> {
        self.models.read().get(key).cloned()
    }

    /// Number of cached models.
    pub fn len(&self) -> usize {
        self.models.read().len()
    }

    /// Returns `true` when nothing has been fitted yet.
    pub fn is_empty(&self) -> bool {
        self.models.read().is_empty()
    }

    /// Drop every cached model. Handles already given out stay valid.
    pub fn clear(&self) {
        self.models.write().clear();
    }

    /// Cached keys, sorted.
    pub fn keys(&self) -> Vec<DatasetKey> {
        let mut keys: Vec<DatasetKey> = self.models.read().keys().copied().collect();
        keys.sort_unstable();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{InMemoryDataset, SyntheticConfig, SyntheticShelterDataset};
    use crate::error::ForecastError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;

    fn cfg() -> ForecastConfig {
        ForecastConfig { n_estimators: 5, ..ForecastConfig::default() }
    }

    #[test]
    fn second_request_is_a_hit() {
        let cache = ModelCache::new();
        let ds = SyntheticShelterDataset::new(30, SyntheticConfig::default());
        assert!(cache.is_empty());

        let a = cache.get_or_fit(&ds, &cfg()).unwrap();
        let b = cache.get_or_fit(&ds, &cfg()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn config_change_is_a_new_key() {
        let cache = ModelCache::new();
        let ds = SyntheticShelterDataset::new(30, SyntheticConfig::default());
        cache.get_or_fit(&ds, &cfg()).unwrap();
        cache.get_or_fit(&ds, &ForecastConfig { seed: 7, ..cfg() }).unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.keys().len(), 2);
    }

    #[test]
    fn key_depends_on_record_contents() {
        let ds = SyntheticShelterDataset::new(10, SyntheticConfig::default());
        let mut records = ds.records().to_vec();
        let before = DatasetKey::of(&records, &cfg());
        assert_eq!(before, DatasetKey::of(&records, &cfg()));
        records[3].people_expected += 1.0;
        assert_ne!(before, DatasetKey::of(&records, &cfg()));
    }

    #[test]
    fn get_never_fits() {
        let cache = ModelCache::new();
        let ds = SyntheticShelterDataset::new(10, SyntheticConfig::default());
        let key = DatasetKey::of(ds.records(), &cfg());
        assert!(cache.get(&key).is_none());
        assert!(cache.is_empty());

        let fitted = cache.get_or_fit(&ds, &cfg()).unwrap();
        assert!(Arc::ptr_eq(&cache.get(&key).unwrap(), &fitted));
    }

    #[test]
    fn clear_keeps_outstanding_handles() {
        let cache = ModelCache::new();
        let ds = SyntheticShelterDataset::new(10, SyntheticConfig::default());
        let model = cache.get_or_fit(&ds, &cfg()).unwrap();
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(model.metrics().n_test, 2);
    }

    #[test]
    fn failed_fit_is_not_cached() {
        let cache = ModelCache::new();
        let ds = SyntheticShelterDataset::new(1, SyntheticConfig::default());
        assert!(matches!(
            cache.get_or_fit(&ds, &cfg()),
            Err(ForecastError::InsufficientData { .. })
        ));
        assert!(cache.is_empty());

        let empty = InMemoryDataset::new("empty", Vec::new());
        assert!(cache.get_or_fit(&empty, &cfg()).is_err());
        assert!(cache.is_empty());
    }

    /// Parks the first fit that reads its records until released.
    struct GatedDataset {
        inner: SyntheticShelterDataset,
        reads: AtomicUsize,
        fit_started: Barrier,
        release: Barrier,
    }

    impl OccupancyDataset for GatedDataset {
        fn columns(&self) -> &[String] {
            self.inner.columns()
        }

        fn records(&self) -> &[TrainingRecord] {
            // Read 0 computes the key; read 1 happens inside the fit.
            if self.reads.fetch_add(1, Ordering::SeqCst) == 1 {
                self.fit_started.wait();
                self.release.wait();
            }
            self.inner.records()
        }

        fn name(&self) -> &str {
            "gated"
        }
    }

    #[test]
    fn running_fit_blocks_neither_readers_nor_other_keys() {
        let cache = Arc::new(ModelCache::new());
        let gated = Arc::new(GatedDataset {
            inner: SyntheticShelterDataset::new(20, SyntheticConfig::default()),
            reads: AtomicUsize::new(0),
            fit_started: Barrier::new(2),
            release: Barrier::new(2),
        });

        let worker = {
            let cache = Arc::clone(&cache);
            let gated = Arc::clone(&gated);
            std::thread::spawn(move || cache.get_or_fit(gated.as_ref(), &cfg()).map(|_| ()))
        };

        gated.fit_started.wait();
        assert!(cache.is_empty());
        assert!(cache.keys().is_empty());
        let other = SyntheticShelterDataset::new(12, SyntheticConfig::default());
        let other_model = cache.get_or_fit(&other, &cfg()).unwrap();
        assert!(Arc::ptr_eq(&cache.get(&DatasetKey::of(other.records(), &cfg())).unwrap(), &other_model));
        gated.release.wait();

        worker.join().unwrap().unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn display_is_fixed_width_hex() {
        let s = DatasetKey(0xab).to_string();
        assert_eq!(s, "00000000000000ab");
    }
}
