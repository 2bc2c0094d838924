//! devicemgrd - change-driven device configuration daemon
//!
//! Subscribes to entity-store change events, walks the dependency
//! tracker to the affected devices, regenerates their abstract configs,
//! and hands them to a sink. Devices are partitioned across worker
//! instances by uuid hash.

pub mod sink;
pub mod worker;

pub use sink::{ConfigSink, JsonLogSink, MemorySink};
pub use worker::{DeviceWorker, Partition};
