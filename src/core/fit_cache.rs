/// Bounded least-recently-used cache of calibration results, keyed on the content of the
/// request and the reference data it ran against.
use crate::input::EnergyModelFitInputs;
use crate::output::EnergyModelFitResults;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_FIT_CACHE_CAPACITY: usize = 256;

pub struct FitCache {
    capacity: usize,
    /// Least recently used first
    entries: Mutex<IndexMap<String, Arc<EnergyModelFitResults>>>,
}

impl Default for FitCache {
    fn default() -> Self {
        Self::new(DEFAULT_FIT_CACHE_CAPACITY)
    }
}

impl FitCache {
    /// A capacity of zero disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(IndexMap::with_capacity(capacity)),
        }
    }

    /// The inputs are serialized in field order and maps are sorted, so equal requests give
    /// equal keys.
    pub fn key(inputs: &EnergyModelFitInputs, reference_version: u64) -> anyhow::Result<String> {
        Ok(format!("{reference_version}:{}", serde_json::to_string(inputs)?))
    }

    pub fn get(&self, key: &str) -> Option<Arc<EnergyModelFitResults>> {
        let mut entries = self.entries.lock();
        let value = entries.shift_remove(key)?;
        entries.insert(key.to_string(), value.clone());
        Some(value)
    }

    pub fn insert(&self, key: String, value: Arc<EnergyModelFitResults>) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock();
        entries.shift_remove(&key);
        entries.insert(key, value);
        while entries.len() > self.capacity {
            entries.shift_remove_index(0);
        }
    }

    /// Returns the cached result for `key` or computes and caches it. The lock is not held
    /// while computing, so concurrent misses on the same key may each compute the result.
    pub fn get_or_try_insert_with<E>(
        &self,
        key: String,
        compute: impl FnOnce() -> Result<EnergyModelFitResults, E>,
    ) -> Result<Arc<EnergyModelFitResults>, E> {
        if let Some(hit) = self.get(&key) {
            debug!(key_len = key.len(), "Fit cache hit");
            return Ok(hit);
        }
        debug!(key_len = key.len(), "Fit cache miss");

        let value = Arc::new(compute()?);
        self.insert(key, value.clone());
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
