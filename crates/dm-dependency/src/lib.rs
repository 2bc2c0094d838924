//! Dependency tracking: from a change event to the minimal set of
//! physical-routers whose abstract config must be recomputed.

pub mod reaction;
pub mod tracker;
pub mod transaction;

pub use reaction::{Hop, ReactionMap, Step};
pub use tracker::{DependencyTracker, DirtySet};
pub use transaction::Transaction;
