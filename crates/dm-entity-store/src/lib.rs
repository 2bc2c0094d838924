//! In-memory entity store with change notification.
//!
//! The store is the single adapter through which the config generation
//! core sees the entity graph: typed reads served through a bounded
//! cache, list queries with parent/back-ref filters, and a change
//! channel delivering create/update/delete events in publish order
//! with at-least-once redelivery across reconnects.

pub mod bus;
pub mod cache;
pub mod config;
pub mod error;
pub mod event;
pub mod store;

pub use bus::{ChangeBus, Subscription};
pub use cache::EntityCache;
pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use event::{ChangeEvent, ChangeOp};
pub use store::{internal_vn_name, EntityStore, ListFilter};
