//! Abstract device configuration generation.
//!
//! Turns the entity graph into per-device abstract config documents:
//! role resolution picks the enabled features, one builder per feature
//! walks the graph and emits a fragment, and the assembler merges the
//! fragments into a normalized [`model::AbstractConfig`].

pub mod assembler;
pub mod error;
pub mod feature;
pub mod features;
pub mod model;
pub mod names;
pub mod resolver;

pub use assembler::{ConfigAssembler, GeneratedConfig, GenerationReport};
pub use error::{ConfigError, ConfigResult};
pub use feature::Feature;
pub use model::{AbstractConfig, FeatureFragment};
pub use resolver::{FeatureResolver, ResolvedFeatures};
