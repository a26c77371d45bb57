//! Test stores — mock `KeyValueStore` implementations for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use odyssey_core::error::StorageError;
use odyssey_core::storage::KeyValueStore;

/// A store that always returns a backend error. Useful for testing that
/// storage failures are swallowed.
#[derive(Debug)]
pub struct FailingStore;

impl KeyValueStore for FailingStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Backend("storage unavailable".into()))
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Backend("storage unavailable".into()))
    }

    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Backend("storage unavailable".into()))
    }
}

/// A full store: reads return the seeded entries, every write fails with
/// `StorageError::QuotaExceeded`, and the rejected keys are recorded.
#[derive(Debug, Default)]
pub struct QuotaStore {
    entries: HashMap<String, String>,
    rejected: Mutex<Vec<String>>,
}

impl QuotaStore {
    /// Create a full store holding `entries`.
    #[must_use]
    pub fn new(entries: HashMap<String, String>) -> Self {
        Self {
            entries,
            rejected: Mutex::new(Vec::new()),
        }
    }

    /// Returns the keys of every rejected write, in call order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn rejected_writes(&self) -> Vec<String> {
        self.rejected.lock().unwrap().clone()
    }
}

impl KeyValueStore for QuotaStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&self, key: &str, _value: &str) -> Result<(), StorageError> {
        self.rejected.lock().unwrap().push(key.to_owned());
        Err(StorageError::QuotaExceeded {
            key: key.to_owned(),
        })
    }

    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Ok(())
    }
}
