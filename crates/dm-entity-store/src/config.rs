//! Process-wide store configuration.

use dm_types::EntityType;

/// Tunables for the entity store adapter. Shared by every worker in
/// the process.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Read-cache entry cap; oldest entries are evicted past it.
    pub cache_max_entries: usize,
    /// Types never cached (always read through to the backing graph).
    pub cache_exclude_types: Vec<EntityType>,
    /// Outbound change-queue depth per subscriber beyond which writes
    /// are rejected with `Overloaded`.
    pub max_pending_updates: usize,
    /// Age after which an fq-name lock left by a partial create/delete
    /// may be reclaimed.
    pub stale_lock_seconds: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cache_max_entries: 4096,
            cache_exclude_types: Vec::new(),
            max_pending_updates: 4096,
            stale_lock_seconds: 300,
        }
    }
}

impl StoreConfig {
    pub fn with_cache_max_entries(mut self, n: usize) -> Self {
        self.cache_max_entries = n;
        self
    }

    pub fn with_cache_exclude_types(mut self, types: Vec<EntityType>) -> Self {
        self.cache_exclude_types = types;
        self
    }

    pub fn with_max_pending_updates(mut self, n: usize) -> Self {
        self.max_pending_updates = n;
        self
    }

    pub fn with_stale_lock_seconds(mut self, secs: u64) -> Self {
        self.stale_lock_seconds = secs;
        self
    }
}
