//! Entity graph data model for the device manager core.
//!
//! The device manager consumes, but does not own, a typed entity graph
//! persisted by the API server. This crate defines:
//!
//! - [`EntityType`]: every entity kind the core understands
//! - [`Entity`]: the generic wrapper (uuid, fq-name, parent, payload,
//!   refs, back-refs)
//! - Per-type payload structs carrying exactly the attributes the
//!   config generation engine reads
//! - [`schema`]: a statically enumerated field registry, replacing the
//!   runtime attribute discovery of the legacy implementation
//!
//! All cross-entity relations are expressed as uuids; the graph itself
//! lives in `dm-entity-store`.

mod entity;
mod entities;
mod ids;
mod net;
pub mod schema;

pub use entity::{Entity, EntityData, EntityType, Ref, RefAttr};
pub use entities::*;
pub use ids::{FqName, Uuid};
pub use net::{RouteTarget, Subnet};
