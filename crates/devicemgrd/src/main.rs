//! devicemgrd - device-manager daemon entry point.

use clap::Parser;
use devicemgrd::{DeviceWorker, JsonLogSink, Partition};
use dm_entity_store::{EntityStore, StoreConfig};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "devicemgrd", about = "Device-manager config generation daemon")]
struct Args {
    /// Total number of worker partitions in the deployment.
    #[arg(long, default_value_t = 1)]
    partitions: u32,

    /// Zero-based partition index served by this instance.
    #[arg(long, default_value_t = 0)]
    partition_id: u32,

    /// Read-cache entry cap for the entity store.
    #[arg(long, default_value_t = 4096)]
    cache_max_entries: usize,

    /// Maximum change events held for slow subscribers.
    #[arg(long, default_value_t = 4096)]
    max_pending_updates: usize,
}

impl Args {
    fn store_config(&self) -> StoreConfig {
        StoreConfig::default()
            .with_cache_max_entries(self.cache_max_entries)
            .with_max_pending_updates(self.max_pending_updates)
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    let args = Args::parse();

    info!("--- Starting devicemgrd ---");
    let partition = match Partition::new(args.partition_id, args.partitions) {
        Ok(p) => p,
        Err(err) => {
            error!(%err, "invalid partition arguments");
            return ExitCode::FAILURE;
        }
    };

    let store = Arc::new(EntityStore::new(args.store_config()));
    let worker = DeviceWorker::new(store, partition, Arc::new(JsonLogSink));

    match worker.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "devicemgrd failed");
            ExitCode::FAILURE
        }
    }
}
