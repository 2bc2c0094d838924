//! The per-partition generation worker.

use crate::sink::ConfigSink;
use dm_config::ConfigAssembler;
use dm_dependency::{DependencyTracker, ReactionMap};
use dm_entity_store::{ChangeEvent, EntityStore};
use dm_types::Uuid;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Static device-to-worker assignment by uuid hash.
#[derive(Debug, Clone, Copy)]
pub struct Partition {
    pub index: u32,
    pub total: u32,
}

impl Partition {
    pub fn single() -> Self {
        Self { index: 0, total: 1 }
    }

    pub fn new(index: u32, total: u32) -> anyhow::Result<Self> {
        anyhow::ensure!(total > 0, "partition count must be positive");
        anyhow::ensure!(
            index < total,
            "partition index {index} out of range for {total} partitions"
        );
        Ok(Self { index, total })
    }

    /// True when this worker owns the device.
    pub fn owns(&self, device: &Uuid) -> bool {
        let hash = device
            .as_bytes()
            .iter()
            .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(*b as u64));
        hash % self.total as u64 == self.index as u64
    }
}

/// Drives tracker evaluation and config regeneration for one
/// partition of the fabric.
pub struct DeviceWorker {
    store: Arc<EntityStore>,
    tracker: DependencyTracker,
    assembler: ConfigAssembler,
    partition: Partition,
    sink: Arc<dyn ConfigSink>,
    /// Highest transaction id published per device; older dirty marks
    /// arriving late are suppressed.
    last_published: HashMap<Uuid, u64>,
}

impl DeviceWorker {
    pub fn new(store: Arc<EntityStore>, partition: Partition, sink: Arc<dyn ConfigSink>) -> Self {
        Self {
            tracker: DependencyTracker::new(store.clone(), ReactionMap::standard()),
            assembler: ConfigAssembler::new(store.clone()),
            store,
            partition,
            sink,
            last_published: HashMap::new(),
        }
    }

    /// Consumes change events until the store shuts down.
    pub async fn run(mut self) -> anyhow::Result<()> {
        let subscription = self.store.subscribe();
        info!(
            partition = self.partition.index,
            partitions = self.partition.total,
            "worker started"
        );
        loop {
            let event = subscription.recv().await?;
            self.handle_event(&event);
            subscription.ack();
        }
    }

    /// Regenerates every owned device the event dirties. Returns the
    /// number of configs published.
    pub fn handle_event(&mut self, event: &ChangeEvent) -> usize {
        let dirty = self.tracker.evaluate(event);
        if dirty.is_empty() {
            return 0;
        }
        let mut published = 0;
        for device in &dirty.devices {
            if !self.partition.owns(device) {
                continue;
            }
            if self
                .last_published
                .get(device)
                .map_or(false, |&id| id >= dirty.transaction.id)
            {
                debug!(%device, transaction = dirty.transaction.id, "stale generation suppressed");
                continue;
            }
            match self.assembler.generate(device, &dirty.transaction) {
                Ok(Some(generated)) => match self.sink.publish(&generated) {
                    Ok(()) => {
                        self.last_published.insert(*device, dirty.transaction.id);
                        published += 1;
                    }
                    Err(err) => {
                        error!(%device, %err, "publish failed, config dropped for retry");
                    }
                },
                Ok(None) => {
                    debug!(%device, "device out of scope, nothing generated");
                }
                // One broken device must not block the rest of the
                // dirty set.
                Err(err) => {
                    error!(%device, %err, "generation failed, device skipped");
                }
            }
        }
        published
    }
}
