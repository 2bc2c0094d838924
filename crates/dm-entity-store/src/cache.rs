//! Bounded read cache in front of the backing graph.
//!
//! Insertion-ordered eviction with a configurable cap and a
//! type-exclusion list. Writes are serialized per entry by the inner
//! mutex. UPDATE events reconcile (replace) stale entries; DELETE
//! invalidates.

use crate::config::StoreConfig;
use dm_types::{Entity, EntityType, Uuid};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

#[derive(Debug, Default)]
struct CacheInner {
    map: HashMap<Uuid, Entity>,
    order: VecDeque<Uuid>,
    hits: u64,
    misses: u64,
}

/// Process-wide entity cache.
#[derive(Debug)]
pub struct EntityCache {
    inner: Mutex<CacheInner>,
    max_entries: usize,
    exclude_types: Vec<EntityType>,
}

impl EntityCache {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            max_entries: config.cache_max_entries,
            exclude_types: config.cache_exclude_types.clone(),
        }
    }

    fn excluded(&self, entity_type: EntityType) -> bool {
        self.exclude_types.contains(&entity_type)
    }

    /// Returns a snapshot of the cached entity, if present.
    pub fn get(&self, uuid: &Uuid) -> Option<Entity> {
        let mut inner = self.inner.lock().unwrap();
        match inner.map.get(uuid).cloned() {
            Some(entity) => {
                inner.hits += 1;
                Some(entity)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Inserts after a backing-store fetch. No-op for excluded types;
    /// evicts the oldest entry when full.
    pub fn insert(&self, entity: Entity) {
        if self.excluded(entity.entity_type()) || self.max_entries == 0 {
            return;
        }
        let mut inner = self.inner.lock().unwrap();
        if !inner.map.contains_key(&entity.uuid) {
            while inner.order.len() >= self.max_entries {
                if let Some(old) = inner.order.pop_front() {
                    inner.map.remove(&old);
                }
            }
            inner.order.push_back(entity.uuid);
        }
        inner.map.insert(entity.uuid, entity);
    }

    /// Replaces the entry with a fresh snapshot, if cached. Called
    /// when the change channel reports an UPDATE for the uuid.
    pub fn reconcile(&self, entity: &Entity) {
        let mut inner = self.inner.lock().unwrap();
        if inner.map.contains_key(&entity.uuid) {
            inner.map.insert(entity.uuid, entity.clone());
        }
    }

    pub fn invalidate(&self, uuid: &Uuid) {
        let mut inner = self.inner.lock().unwrap();
        if inner.map.remove(uuid).is_some() {
            inner.order.retain(|u| u != uuid);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// (hits, misses) counters for tracing.
    pub fn stats(&self) -> (u64, u64) {
        let inner = self.inner.lock().unwrap();
        (inner.hits, inner.misses)
    }
}
