//! Translates change events into the set of devices to regenerate.

use crate::reaction::{Hop, ReactionMap, Step};
use crate::transaction::Transaction;
use dm_entity_store::{ChangeEvent, ChangeOp, EntityStore, ListFilter};
use dm_types::{Entity, EntityType, Uuid};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Devices made dirty by one event, plus the transaction tagging the
/// pass. Ordered so iteration (and tests) are deterministic.
#[derive(Debug, Clone)]
pub struct DirtySet {
    pub devices: BTreeSet<Uuid>,
    pub transaction: Transaction,
}

impl DirtySet {
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

/// Walks the reaction map over the instance graph.
#[derive(Debug)]
pub struct DependencyTracker {
    store: Arc<EntityStore>,
    map: ReactionMap,
}

impl DependencyTracker {
    pub fn new(store: Arc<EntityStore>, map: ReactionMap) -> Self {
        Self { store, map }
    }

    /// Computes the dirty-device set for one event.
    ///
    /// DELETE events traverse the pre-delete snapshot carried on the
    /// event; the entity is already gone from the store.
    #[instrument(skip(self, event), fields(op = %event.op, entity_type = %event.entity_type, uuid = %event.uuid))]
    pub fn evaluate(&self, event: &ChangeEvent) -> DirtySet {
        let transaction = Transaction::from_event(event);
        let mut devices = BTreeSet::new();

        let start: Option<Entity> = match event.op {
            ChangeOp::Delete => match &event.pre_delete {
                Some(snapshot) => Some((**snapshot).clone()),
                None => {
                    warn!("delete event without pre-delete snapshot, skipping traversal");
                    None
                }
            },
            _ => match self.store.read_any(&event.uuid) {
                Ok(entity) => Some(entity),
                Err(e) => {
                    // The entity may already be gone; not fatal.
                    debug!(error = %e, "event entity not readable, skipping traversal");
                    None
                }
            },
        };

        if let Some(entity) = start {
            if entity.entity_type() == EntityType::PhysicalRouter {
                devices.insert(entity.uuid);
            }
            let steps = self.map.lookup(event.entity_type, &event.changed_fields);
            for step in steps {
                self.walk(&entity, step, &mut devices);
            }
        }

        debug!(dirty = devices.len(), tx = %transaction, "tracker pass done");
        DirtySet {
            devices,
            transaction,
        }
    }

    fn walk(&self, entity: &Entity, step: &Step, devices: &mut BTreeSet<Uuid>) {
        for next in self.resolve(entity, step.hop) {
            if next.entity_type() == EntityType::PhysicalRouter {
                devices.insert(next.uuid);
            }
            for sub in &step.then {
                self.walk(&next, sub, devices);
            }
        }
    }

    fn resolve(&self, entity: &Entity, hop: Hop) -> Vec<Entity> {
        match hop {
            Hop::Refs(t) => entity
                .refs_to(t)
                .filter_map(|r| self.read_or_skip(t, &r.uuid))
                .collect(),
            Hop::BackRefs(t) => entity
                .back_refs_from(t)
                .filter_map(|r| self.read_or_skip(t, &r.uuid))
                .collect(),
            Hop::Parent(t) => entity
                .parent
                .filter(|(pt, _)| *pt == t)
                .and_then(|(_, uuid)| self.read_or_skip(t, &uuid))
                .into_iter()
                .collect(),
            Hop::Children(t) => self.store.children(t, &entity.uuid),
            Hop::AllOf(t) => self.store.list(t, &ListFilter::default()),
        }
    }

    /// NotFound short-circuits the branch; the ref may point at an
    /// entity deleted between event time and traversal.
    fn read_or_skip(&self, entity_type: EntityType, uuid: &Uuid) -> Option<Entity> {
        match self.store.read(entity_type, uuid) {
            Ok(entity) => Some(entity),
            Err(e) => {
                debug!(entity_type = %entity_type, %uuid, error = %e, "branch dropped");
                None
            }
        }
    }
}
