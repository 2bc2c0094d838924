//! Abstract-config sinks.

use dm_config::GeneratedConfig;
use std::sync::Mutex;
use tracing::info;

/// Receives assembled configs. The production sink forwards to the
/// southbound delivery pipeline; tests capture in memory.
pub trait ConfigSink: Send + Sync {
    fn publish(&self, generated: &GeneratedConfig) -> anyhow::Result<()>;
}

/// Serializes each config as one JSON log line.
pub struct JsonLogSink;

impl ConfigSink for JsonLogSink {
    fn publish(&self, generated: &GeneratedConfig) -> anyhow::Result<()> {
        let payload = serde_json::to_string(&generated.config)?;
        info!(
            target: "abstract_config",
            device = generated.report.device_name,
            transaction = generated.report.transaction_id,
            %payload,
            "config published"
        );
        Ok(())
    }
}

/// Captures published configs for assertions.
#[derive(Default)]
pub struct MemorySink {
    published: Mutex<Vec<GeneratedConfig>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.published.lock().expect("sink lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drains everything published so far.
    pub fn take(&self) -> Vec<GeneratedConfig> {
        std::mem::take(&mut *self.published.lock().expect("sink lock"))
    }
}

impl ConfigSink for MemorySink {
    fn publish(&self, generated: &GeneratedConfig) -> anyhow::Result<()> {
        self.published
            .lock()
            .expect("sink lock")
            .push(generated.clone());
        Ok(())
    }
}
