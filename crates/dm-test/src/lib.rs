//! Test infrastructure for device-manager crates
//!
//! Provides:
//! - Topology fixtures for common fabric layouts
//! - Entity creation shorthands (devices, VNs, LRs, VPG attachments)
//! - Tracing initialization for tests

pub mod fixtures;

pub use fixtures::*;

use std::sync::Once;

static INIT: Once = Once::new();

/// Installs a test tracing subscriber honoring `RUST_LOG`. Safe to call
/// from every test; only the first call installs.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}
