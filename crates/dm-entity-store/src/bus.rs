//! Change bus: per-subscriber bounded queues with redelivery.
//!
//! Publish appends to every subscriber queue; a subscriber receives
//! events in publish order and acknowledges them. Events received but
//! not acknowledged before a disconnect are redelivered after
//! reconnect, ahead of newer events. A transport fault on publish
//! parks events in a retry queue that drains, in order, once the
//! transport recovers; retry pacing follows a bounded exponential
//! backoff.

use crate::error::{StoreError, StoreResult};
use crate::event::ChangeEvent;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, warn};

const BACKOFF_BASE_MS: u64 = 50;
const BACKOFF_MAX_MS: u64 = 5_000;

#[derive(Debug, Default)]
struct SubscriberState {
    queue: VecDeque<ChangeEvent>,
    /// Delivered but not yet acknowledged.
    unacked: VecDeque<ChangeEvent>,
    connected: bool,
}

#[derive(Debug, Default)]
struct BusInner {
    subscribers: HashMap<u64, SubscriberState>,
    next_id: u64,
    /// Events parked by a transport fault, flushed in order.
    retry_queue: VecDeque<ChangeEvent>,
    /// Consecutive failed publish attempts, for backoff pacing.
    failed_attempts: u32,
}

/// The store's outbound change channel.
#[derive(Debug)]
pub struct ChangeBus {
    inner: Mutex<BusInner>,
    notify: Notify,
    max_pending: usize,
    /// Test hook: number of upcoming publishes to fail as transport
    /// errors.
    inject_failures: AtomicUsize,
}

impl ChangeBus {
    pub fn new(max_pending: usize) -> Self {
        Self {
            inner: Mutex::new(BusInner::default()),
            notify: Notify::new(),
            max_pending,
            inject_failures: AtomicUsize::new(0),
        }
    }

    /// Registers a new subscriber and returns its handle.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.insert(
            id,
            SubscriberState {
                connected: true,
                ..Default::default()
            },
        );
        Subscription {
            id,
            bus: Arc::clone(self),
        }
    }

    /// True when any subscriber queue is at the pending cap. The store
    /// consults this before accepting a write.
    pub fn at_capacity(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner
            .subscribers
            .values()
            .any(|s| s.queue.len() + s.unacked.len() >= self.max_pending)
    }

    /// Publishes one event to every subscriber.
    ///
    /// A transport fault parks the event (and any already-parked
    /// predecessors stay ahead of it); the next successful publish
    /// flushes the parked events first so nothing is lost or
    /// reordered.
    pub fn publish(&self, event: ChangeEvent) -> StoreResult<()> {
        if self.at_capacity() {
            return Err(StoreError::Overloaded);
        }

        let mut inner = self.inner.lock().unwrap();

        if self.inject_failures.load(Ordering::SeqCst) > 0 {
            self.inject_failures.fetch_sub(1, Ordering::SeqCst);
            inner.failed_attempts += 1;
            inner.retry_queue.push_back(event);
            warn!(
                attempts = inner.failed_attempts,
                "change-bus transport fault, event parked for redelivery"
            );
            return Err(StoreError::transport("change channel unavailable"));
        }

        let mut to_deliver: Vec<ChangeEvent> = inner.retry_queue.drain(..).collect();
        inner.failed_attempts = 0;
        to_deliver.push(event);

        for ev in to_deliver {
            debug!(op = %ev.op, entity_type = %ev.entity_type, uuid = %ev.uuid, "bus deliver");
            for sub in inner.subscribers.values_mut() {
                sub.queue.push_back(ev.clone());
            }
        }
        drop(inner);
        self.notify.notify_waiters();
        Ok(())
    }

    /// Current bounded-backoff delay for publish retries.
    pub fn backoff_delay(&self) -> Duration {
        let attempts = self.inner.lock().unwrap().failed_attempts;
        let exp = attempts.min(7);
        let ms = (BACKOFF_BASE_MS << exp).min(BACKOFF_MAX_MS);
        Duration::from_millis(ms)
    }

    /// Test hook: fail the next `n` publishes with a transport error.
    pub fn inject_transport_failures(&self, n: usize) {
        self.inject_failures.store(n, Ordering::SeqCst);
    }

    /// Total events queued across subscribers (for tracing).
    pub fn pending_events(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner
            .subscribers
            .values()
            .map(|s| s.queue.len() + s.unacked.len())
            .sum()
    }
}

/// Subscriber handle onto the change bus.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    bus: Arc<ChangeBus>,
}

impl Subscription {
    /// Receives the next event, waiting until one is available.
    /// Returns `Transport` while this subscriber is disconnected.
    pub async fn recv(&self) -> StoreResult<ChangeEvent> {
        loop {
            if let Some(ev) = self.try_recv()? {
                return Ok(ev);
            }
            self.bus.notify.notified().await;
        }
    }

    /// Non-blocking receive. The event moves to the unacked set until
    /// [`Subscription::ack`] is called.
    pub fn try_recv(&self) -> StoreResult<Option<ChangeEvent>> {
        let mut inner = self.bus.inner.lock().unwrap();
        let sub = inner
            .subscribers
            .get_mut(&self.id)
            .ok_or_else(|| StoreError::transport("subscription closed"))?;
        if !sub.connected {
            return Err(StoreError::transport("subscriber disconnected"));
        }
        match sub.queue.pop_front() {
            Some(ev) => {
                sub.unacked.push_back(ev.clone());
                Ok(Some(ev))
            }
            None => Ok(None),
        }
    }

    /// Acknowledges the oldest delivered event.
    pub fn ack(&self) {
        let mut inner = self.bus.inner.lock().unwrap();
        if let Some(sub) = inner.subscribers.get_mut(&self.id) {
            sub.unacked.pop_front();
        }
    }

    /// Simulates losing the transport: subsequent receives fail until
    /// [`Subscription::reconnect`].
    pub fn disconnect(&self) {
        let mut inner = self.bus.inner.lock().unwrap();
        if let Some(sub) = inner.subscribers.get_mut(&self.id) {
            sub.connected = false;
        }
    }

    /// Reconnects; unacknowledged events are requeued for redelivery
    /// ahead of anything newer.
    pub fn reconnect(&self) {
        let mut inner = self.bus.inner.lock().unwrap();
        if let Some(sub) = inner.subscribers.get_mut(&self.id) {
            sub.connected = true;
            while let Some(ev) = sub.unacked.pop_back() {
                sub.queue.push_front(ev);
            }
        }
        drop(inner);
        self.bus.notify.notify_waiters();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let mut inner = self.bus.inner.lock().unwrap();
        inner.subscribers.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ChangeOp;
    use dm_types::{EntityType, FqName, Uuid};

    fn event(name: &str) -> ChangeEvent {
        ChangeEvent::new(
            ChangeOp::Update,
            EntityType::VirtualNetwork,
            Uuid::new_v4(),
            FqName::from(["default", name]),
        )
    }

    #[test]
    fn test_recv_parks_until_publish() {
        let bus = Arc::new(ChangeBus::new(16));
        let sub = bus.subscribe();

        let mut recv = tokio_test::task::spawn(sub.recv());
        tokio_test::assert_pending!(recv.poll());

        bus.publish(event("vn1")).unwrap();
        assert!(recv.is_woken());
        let ev = tokio_test::assert_ready!(recv.poll()).unwrap();
        assert_eq!(ev.entity_name(), "vn1");
    }

    #[tokio::test]
    async fn test_publish_recv_ack() {
        let bus = Arc::new(ChangeBus::new(16));
        let sub = bus.subscribe();

        bus.publish(event("vn1")).unwrap();
        let ev = sub.recv().await.unwrap();
        assert_eq!(ev.entity_name(), "vn1");
        sub.ack();
        assert_eq!(bus.pending_events(), 0);
    }

    #[tokio::test]
    async fn test_unacked_redelivered_after_reconnect() {
        let bus = Arc::new(ChangeBus::new(16));
        let sub = bus.subscribe();

        bus.publish(event("vn1")).unwrap();
        bus.publish(event("vn2")).unwrap();

        let first = sub.recv().await.unwrap();
        assert_eq!(first.entity_name(), "vn1");
        // No ack: connection drops with vn1 in flight.
        sub.disconnect();
        assert!(sub.try_recv().is_err());

        sub.reconnect();
        let again = sub.recv().await.unwrap();
        assert_eq!(again.entity_name(), "vn1");
        sub.ack();
        let next = sub.recv().await.unwrap();
        assert_eq!(next.entity_name(), "vn2");
    }

    #[tokio::test]
    async fn test_transport_fault_parks_and_flushes() {
        let bus = Arc::new(ChangeBus::new(16));
        let sub = bus.subscribe();

        bus.inject_transport_failures(1);
        let err = bus.publish(event("vn1")).unwrap_err();
        assert!(err.is_retryable());
        assert!(bus.backoff_delay() >= Duration::from_millis(100));

        // Recovered: both the parked and the new event arrive in order.
        bus.publish(event("vn2")).unwrap();
        assert_eq!(sub.recv().await.unwrap().entity_name(), "vn1");
        sub.ack();
        assert_eq!(sub.recv().await.unwrap().entity_name(), "vn2");
        sub.ack();
    }

    #[tokio::test]
    async fn test_overload_at_capacity() {
        let bus = Arc::new(ChangeBus::new(2));
        let _sub = bus.subscribe();

        bus.publish(event("a")).unwrap();
        bus.publish(event("b")).unwrap();
        assert!(matches!(
            bus.publish(event("c")),
            Err(StoreError::Overloaded)
        ));
    }

    #[tokio::test]
    async fn test_backoff_is_bounded() {
        let bus = Arc::new(ChangeBus::new(16));
        bus.inject_transport_failures(32);
        for _ in 0..32 {
            let _ = bus.publish(event("x"));
        }
        assert!(bus.backoff_delay() <= Duration::from_millis(BACKOFF_MAX_MS));
    }
}
