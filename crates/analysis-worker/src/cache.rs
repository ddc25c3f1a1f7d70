//! Time-bounded cache of analysis results.
//!
//! Keyed by (normalized move list, depth). Each key owns a `OnceCell`, so a
//! second caller arriving while the first is still computing awaits the same
//! result instead of starting another oracle run. The snapshot file uses the
//! same bincode layout on save and load.

use std::collections::HashMap;
use std::fs::File;
use std::future::Future;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::analysis::AnalysisResult;
use crate::error::WorkerError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// Normalized tokens joined by single spaces.
    pub moves: String,
    pub depth: u32,
}

impl CacheKey {
    pub fn new<S: AsRef<str>>(normalized_tokens: &[S], depth: u32) -> Self {
        let moves = normalized_tokens
            .iter()
            .map(|t| t.as_ref())
            .collect::<Vec<&str>>()
            .join(" ");
        Self { moves, depth }
    }
}

#[derive(Debug, Clone)]
struct Cached {
    result: Arc<AnalysisResult>,
    stored_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotEntry {
    key: CacheKey,
    result: AnalysisResult,
    stored_at: DateTime<Utc>,
}

type Slot = Arc<OnceCell<Cached>>;

pub struct AnalysisCache {
    ttl: Duration,
    slots: Mutex<HashMap<CacheKey, Slot>>,
}

impl AnalysisCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_fresh(&self, stored_at: DateTime<Utc>) -> bool {
        // A timestamp in the future (clock skew) counts as age zero.
        let age = (Utc::now() - stored_at).to_std().unwrap_or(Duration::ZERO);
        age < self.ttl
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fresh result for `key`, if one is stored.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<AnalysisResult>> {
        let slots = self.lock();
        let cached = slots.get(key)?.get()?;
        self.is_fresh(cached.stored_at).then(|| cached.result.clone())
    }

    /// Return the cached result for `key`, or run `init` to produce it.
    ///
    /// Concurrent callers for the same key share one `init`. A failed `init`
    /// stores nothing, so the next call tries again.
    pub async fn get_or_try_init<F, Fut>(
        &self,
        key: CacheKey,
        init: F,
    ) -> Result<Arc<AnalysisResult>, WorkerError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<AnalysisResult, WorkerError>>,
    {
        let slot = {
            let mut slots = self.lock();
            let expired = slots.contains_key(&key);
            let reusable = slots
                .get(&key)
                .filter(|slot| slot.get().map_or(true, |c| self.is_fresh(c.stored_at)))
                .cloned();
            match reusable {
                Some(slot) => {
                    debug!(depth = key.depth, pending = !slot.initialized(), "Cache hit");
                    slot
                }
                None => {
                    debug!(depth = key.depth, expired, "Cache miss");
                    let slot: Slot = Arc::new(OnceCell::new());
                    slots.insert(key.clone(), slot.clone());
                    slot
                }
            }
        };

        let outcome = slot
            .get_or_try_init(|| async move {
                let result = init().await?;
                Ok::<_, WorkerError>(Cached {
                    result: Arc::new(result),
                    stored_at: Utc::now(),
                })
            })
            .await
            .map(|cached| cached.result.clone());

        if outcome.is_err() {
            let mut slots = self.lock();
            let abandoned = slots
                .get(&key)
                .is_some_and(|current| Arc::ptr_eq(current, &slot) && !current.initialized());
            if abandoned {
                slots.remove(&key);
            }
        }
        outcome
    }

    /// Number of fresh entries.
    pub fn len(&self) -> usize {
        self.lock()
            .values()
            .filter_map(|slot| slot.get())
            .filter(|c| self.is_fresh(c.stored_at))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop expired entries and empty slots nobody is computing. In-flight slots are kept.
    pub fn purge_expired(&self) {
        let mut slots = self.lock();
        let before = slots.len();
        slots.retain(|_, slot| match slot.get() {
            Some(c) => self.is_fresh(c.stored_at),
            None => Arc::strong_count(slot) > 1,
        });
        let removed = before - slots.len();
        if removed > 0 {
            debug!(removed, "Purged expired cache entries");
        }
    }

    /// Write every fresh entry to `path`. Returns how many were written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<usize, WorkerError> {
        let entries: Vec<SnapshotEntry> = self
            .lock()
            .iter()
            .filter_map(|(key, slot)| slot.get().map(|c| (key, c)))
            .filter(|(_, c)| self.is_fresh(c.stored_at))
            .map(|(key, c)| SnapshotEntry {
                key: key.clone(),
                result: (*c.result).clone(),
                stored_at: c.stored_at,
            })
            .collect();

        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        bincode::serialize_into(&mut writer, &entries).map_err(|e| WorkerError::Cache(e.to_string()))?;
        writer.flush()?;
        info!(entries = entries.len(), path = %path.as_ref().display(), "Saved analysis cache");
        Ok(entries.len())
    }

    /// Read a snapshot written by [`AnalysisCache::save`], dropping entries older than `ttl`.
    pub fn load<P: AsRef<Path>>(path: P, ttl: Duration) -> Result<Self, WorkerError> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let entries: Vec<SnapshotEntry> =
            bincode::deserialize_from(reader).map_err(|e| WorkerError::Cache(e.to_string()))?;

        let cache = Self::new(ttl);
        let total = entries.len();
        {
            let mut slots = cache.lock();
            for entry in entries {
                if !cache.is_fresh(entry.stored_at) {
                    continue;
                }
                let cached = Cached {
                    result: Arc::new(entry.result),
                    stored_at: entry.stored_at,
                };
                slots.insert(entry.key, Arc::new(OnceCell::new_with(Some(cached))));
            }
            info!(loaded = slots.len(), skipped = total - slots.len(), path = %path.as_ref().display(), "Loaded analysis cache");
        }
        Ok(cache)
    }
}
