//! Directory health cache.
//!
//! Records, per candidate website, when it was last checked and whether it
//! answered. Candidates that failed within the TTL are not probed again;
//! anything older than the TTL is forgotten and probed afresh no matter what
//! it recorded.
//!
//! The serialized form is a JSON object keyed by website, each value being
//! `{"stamp": <unix seconds>, "valid": <bool>}`.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{HealthStore, StoreError, Timestamp};

/// Health record for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthEntry {
    /// When the entry was created.
    #[serde(rename = "stamp")]
    pub last_checked: Timestamp,
    /// Whether the candidate should be probed.
    pub valid: bool,
}

impl HealthEntry {
    /// Returns `true` if this entry is older than `ttl` at `now`.
    pub fn is_stale(&self, now: Timestamp, ttl: Duration) -> bool {
        self.last_checked.elapsed_until(now) > ttl
    }
}

/// What a directory scan should do with a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeDecision {
    /// Resolve the candidate.
    Probe,
    /// The candidate failed recently; leave it alone.
    Skip,
}

/// Health records keyed by candidate website.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HealthCache {
    entries: BTreeMap<String, HealthEntry>,
}

impl HealthCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded candidates.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the entry for `website`, if any.
    pub fn get(&self, website: &str) -> Option<&HealthEntry> {
        self.entries.get(website)
    }

    /// Inserts or replaces the entry for `website`.
    pub fn insert(&mut self, website: impl Into<String>, entry: HealthEntry) {
        self.entries.insert(website.into(), entry);
    }

    /// Decides whether `website` should be probed at `now`.
    ///
    /// A stale entry is removed first, regardless of its validity. A missing
    /// entry is then created as valid and stamped `now`.
    pub fn evaluate(&mut self, website: &str, now: Timestamp, ttl: Duration) -> ProbeDecision {
        if self
            .entries
            .get(website)
            .is_some_and(|entry| entry.is_stale(now, ttl))
        {
            self.entries.remove(website);
        }

        let entry = self
            .entries
            .entry(website.to_owned())
            .or_insert(HealthEntry {
                last_checked: now,
                valid: true,
            });

        if entry.valid {
            ProbeDecision::Probe
        } else {
            ProbeDecision::Skip
        }
    }

    /// Marks `website` as failed. No-op if it has no entry.
    pub fn mark_invalid(&mut self, website: &str) {
        if let Some(entry) = self.entries.get_mut(website) {
            entry.valid = false;
        }
    }
}

/// A [`HealthStore`] that keeps the cache in memory only.
///
/// Useful for library callers that want skip-known-dead behaviour within a
/// process without touching the file system.
#[derive(Debug, Default)]
pub struct MemoryHealthStore {
    cache: Mutex<HealthCache>,
    saves: Mutex<usize>,
}

impl MemoryHealthStore {
    /// Creates a store holding an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `cache`.
    pub fn with_cache(cache: HealthCache) -> Self {
        Self {
            cache: Mutex::new(cache),
            saves: Mutex::new(0),
        }
    }

    /// Returns a copy of the stored cache.
    pub async fn snapshot(&self) -> HealthCache {
        self.cache.lock().await.clone()
    }

    /// Number of times [`HealthStore::save`] has been called.
    pub async fn save_count(&self) -> usize {
        *self.saves.lock().await
    }
}

#[async_trait]
impl HealthStore for MemoryHealthStore {
    async fn load(&self) -> HealthCache {
        self.cache.lock().await.clone()
    }

    async fn save(&self, cache: &HealthCache) -> Result<(), StoreError> {
        *self.cache.lock().await = cache.clone();
        *self.saves.lock().await += 1;
        Ok(())
    }
}
