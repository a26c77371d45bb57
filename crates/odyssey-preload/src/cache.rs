//! Two-tier anchor cache.
//!
//! The fast tier is an in-process map that lives as long as the cache. The
//! durable tier is a best-effort key-value store: reads that fail count as
//! misses and writes that fail are logged and dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use odyssey_core::asset::Asset;
use odyssey_core::id::SceneId;
use odyssey_core::storage::KeyValueStore;
use tracing::{debug, warn};

/// Anchor images by scene, in memory and in durable storage.
pub struct TwoTierCache {
    fast: Mutex<HashMap<SceneId, Arc<Asset>>>,
    durable: Arc<dyn KeyValueStore>,
    key_prefix: String,
}

impl std::fmt::Debug for TwoTierCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwoTierCache")
            .field("fast_entries", &self.fast().len())
            .field("key_prefix", &self.key_prefix)
            .finish_non_exhaustive()
    }
}

impl TwoTierCache {
    /// Creates an empty fast tier over `durable`.
    #[must_use]
    pub fn new(durable: Arc<dyn KeyValueStore>, key_prefix: impl Into<String>) -> Self {
        Self {
            fast: Mutex::new(HashMap::new()),
            durable,
            key_prefix: key_prefix.into(),
        }
    }

    fn fast(&self) -> MutexGuard<'_, HashMap<SceneId, Arc<Asset>>> {
        self.fast.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn key(&self, id: SceneId) -> String {
        format!("{}{id}", self.key_prefix)
    }

    /// Returns the anchor from the fast tier only.
    #[must_use]
    pub fn get_fast(&self, id: SceneId) -> Option<Arc<Asset>> {
        self.fast().get(&id).cloned()
    }

    /// Returns the anchor, hydrating the fast tier from durable storage on a
    /// fast-tier miss.
    #[must_use]
    pub fn get(&self, id: SceneId) -> Option<Arc<Asset>> {
        if let Some(asset) = self.get_fast(id) {
            return Some(asset);
        }
        self.hydrate(id)
    }

    /// Copies the durable entry for `id` into the fast tier, if there is a
    /// readable one.
    pub fn hydrate(&self, id: SceneId) -> Option<Arc<Asset>> {
        let key = self.key(id);
        let raw = match self.durable.get(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(scene_id = %id, error = %e, "durable cache read failed");
                return None;
            }
        };
        match Asset::from_durable(&key, &raw) {
            Ok(asset) => {
                let asset = Arc::new(asset);
                self.fast().insert(id, Arc::clone(&asset));
                debug!(scene_id = %id, "anchor hydrated from durable cache");
                Some(asset)
            }
            Err(e) => {
                warn!(scene_id = %id, error = %e, "discarding unreadable durable anchor");
                None
            }
        }
    }

    /// Stores `asset` in both tiers. The durable write may fail silently.
    pub fn insert(&self, id: SceneId, asset: Asset) -> Arc<Asset> {
        if let Err(e) = self.durable.set(&self.key(id), &asset.to_durable()) {
            warn!(scene_id = %id, error = %e, "durable cache write failed");
        }
        let asset = Arc::new(asset);
        self.fast().insert(id, Arc::clone(&asset));
        asset
    }

    /// Drops `ids` from both tiers.
    pub fn clear(&self, ids: impl IntoIterator<Item = SceneId>) {
        let mut fast = self.fast();
        for id in ids {
            fast.remove(&id);
            if let Err(e) = self.durable.remove(&self.key(id)) {
                warn!(scene_id = %id, error = %e, "durable cache remove failed");
            }
        }
    }
}
