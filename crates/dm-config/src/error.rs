//! Generation-side errors.

use dm_entity_store::StoreError;
use thiserror::Error;

/// Errors surfaced while generating abstract config for one device.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Store access failed mid-generation.
    #[error("store: {0}")]
    Store(#[from] StoreError),

    /// Assembler-level inconsistency. The device is marked failed for
    /// the transaction; other devices proceed.
    #[error("fatal: {message}")]
    Fatal { message: String },
}

impl ConfigError {
    pub fn fatal(message: impl Into<String>) -> Self {
        ConfigError::Fatal {
            message: message.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
