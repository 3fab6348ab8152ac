//! Entitlement Cache
//!
//! Pull-through cache of snapshots keyed by user. Nothing is refreshed in
//! the background: an entry is refetched only when it is read after being
//! invalidated, or the first time its key is read.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::model::{EntitlementSnapshot, UserId};
use crate::store::RemoteStore;
use crate::EntitlementResult;

/// Cache entry for one user
#[derive(Debug, Clone)]
struct CacheEntry {
    snapshot: Option<EntitlementSnapshot>,
    stale: bool,
    /// Bumped on every invalidation; a fetch only marks the entry fresh if
    /// the generation it started under is still current.
    generation: u64,
    fetched_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    fn empty(generation: u64) -> Self {
        Self {
            snapshot: None,
            stale: true,
            generation,
            fetched_at: None,
        }
    }
}

/// Keyed entitlement cache
pub struct EntitlementCache {
    store: Arc<dyn RemoteStore>,
    entries: RwLock<HashMap<UserId, CacheEntry>>,
    generations: AtomicU64,
}

impl EntitlementCache {
    /// Empty cache over `store`
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self {
            store,
            entries: RwLock::new(HashMap::new()),
            generations: AtomicU64::new(0),
        }
    }

    fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Current snapshot for `user_id`, fetching it if absent or stale.
    ///
    /// Returns `Ok(None)` without touching the store when no user is given.
    /// On fetch failure the previous snapshot stays cached and the error is
    /// returned to the caller.
    pub async fn get(
        &self,
        user_id: Option<&UserId>,
    ) -> EntitlementResult<Option<EntitlementSnapshot>> {
        let Some(user_id) = user_id else {
            return Ok(None);
        };

        let generation = {
            let mut entries = self.entries.write();
            let entry = entries
                .entry(user_id.clone())
                .or_insert_with(|| CacheEntry::empty(self.next_generation()));

            if !entry.stale {
                if let Some(snapshot) = &entry.snapshot {
                    tracing::debug!(user = %user_id, "entitlement cache hit");
                    return Ok(Some(snapshot.clone()));
                }
            }
            entry.generation
        };

        tracing::debug!(user = %user_id, generation, "entitlement cache miss, fetching");

        let snapshot = match self.store.fetch_entitlement(user_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(user = %user_id, error = %e, "entitlement fetch failed");
                return Err(e);
            }
        };

        let mut entries = self.entries.write();
        match entries.get_mut(user_id) {
            Some(entry) if entry.generation == generation => {
                entry.snapshot = Some(snapshot.clone());
                entry.stale = false;
                entry.fetched_at = Some(Utc::now());
            }
            Some(entry) if entry.stale => {
                // Invalidated mid-flight: keep it displayable, refetch on next read
                tracing::debug!(user = %user_id, "fetch superseded by invalidation");
                entry.snapshot = Some(snapshot.clone());
                entry.fetched_at = Some(Utc::now());
            }
            Some(_) => {
                tracing::debug!(user = %user_id, "newer snapshot already cached, dropping fetch");
            }
            None => {
                tracing::debug!(user = %user_id, "entry evicted during fetch, not caching");
            }
        }

        Ok(Some(snapshot))
    }

    /// Mark the entry stale so the next `get` refetches. Never fetches.
    pub fn invalidate(&self, user_id: &UserId) {
        let generation = self.next_generation();
        if let Some(entry) = self.entries.write().get_mut(user_id) {
            entry.stale = true;
            entry.generation = generation;
            tracing::debug!(user = %user_id, generation, "entitlement cache invalidated");
        }
    }

    /// Drop the entry entirely (identifier no longer available)
    pub fn evict(&self, user_id: &UserId) -> Option<EntitlementSnapshot> {
        let removed = self.entries.write().remove(user_id);
        if removed.is_some() {
            tracing::debug!(user = %user_id, "entitlement cache entry evicted");
        }
        removed.and_then(|entry| entry.snapshot)
    }

    /// Last known snapshot, stale or not, without contacting the store
    pub fn peek(&self, user_id: &UserId) -> Option<EntitlementSnapshot> {
        self.entries
            .read()
            .get(user_id)
            .and_then(|entry| entry.snapshot.clone())
    }

    /// Whether the next `get` would hit the store
    pub fn is_stale(&self, user_id: &UserId) -> bool {
        self.entries
            .read()
            .get(user_id)
            .map(|entry| entry.stale || entry.snapshot.is_none())
            .unwrap_or(true)
    }

    /// When the entry was last filled from the store
    pub fn last_fetched(&self, user_id: &UserId) -> Option<DateTime<Utc>> {
        self.entries.read().get(user_id).and_then(|entry| entry.fetched_at)
    }

    /// Number of tracked users
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// No users tracked
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
