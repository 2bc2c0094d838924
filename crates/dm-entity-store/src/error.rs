//! Error taxonomy for store operations.
//!
//! Mirrors the error discipline used across the workspace: one
//! `thiserror` enum per crate with constructor helpers and a
//! retryability predicate. Invariant violations are `BadRequest` and
//! are recovered locally (the write is rejected); only transport
//! conditions are retried.

use dm_types::{EntityType, Uuid};
use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by the entity store adapter.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Unknown uuid or fq-name.
    #[error("{entity_type} {key} not found")]
    NotFound {
        entity_type: EntityType,
        /// Uuid or fq-name string form.
        key: String,
    },

    /// Creation-time conflict on fq-name.
    #[error("{entity_type} '{fq_name}' already exists")]
    AlreadyExists {
        entity_type: EntityType,
        fq_name: String,
    },

    /// Deletion blocked by remaining back-references.
    #[error("{entity_type} {uuid} still referenced by {count} object(s)")]
    RefsExist {
        entity_type: EntityType,
        uuid: Uuid,
        count: usize,
    },

    /// Invariant violation detected during validation.
    #[error("Bad request: {message}")]
    BadRequest { message: String },

    /// Outbound queue is over `max_pending_updates`.
    #[error("Too many pending updates")]
    Overloaded,

    /// Transient transport failure on the change channel.
    #[error("Transport failure: {message}")]
    Transport { message: String },
}

impl StoreError {
    pub fn not_found(entity_type: EntityType, key: impl ToString) -> Self {
        Self::NotFound {
            entity_type,
            key: key.to_string(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// True for conditions that may clear on retry with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Transport { .. } | StoreError::Overloaded)
    }
}
