//! # Error Taxonomy
//!
//! Crate-wide error type for queue engine operations. Every error carries
//! enough context (entry id, attempted action) for a caller to render an
//! actionable message; the engine performs no hidden retries.

use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by queue engine operations.
///
/// Cloneable so shared in-flight reads can hand the same failure to every
/// waiting caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// Malformed or missing input, e.g. an appointment without a start time.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced record does not exist, or call-next found no eligible candidate.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The operation is not permitted in the entry's current lifecycle state.
    #[error("business rule violated: {0}")]
    BusinessRule(String),

    /// The record is already in the state the operation would produce.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Repository-level failure, opaque to the engine.
    #[error("repository error: {0}")]
    Database(String),

    /// Event publication failure.
    #[error("event error: {0}")]
    Event(String),

    /// Invalid runtime configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl QueueError {
    /// A missing record identified by a uuid.
    pub fn not_found(kind: &'static str, id: Uuid) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Call-next exhausted the schedule without an eligible candidate.
    pub fn no_candidate(staff_id: Uuid) -> Self {
        Self::NotFound {
            kind: "eligible candidate",
            id: format!("staff {staff_id}"),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn business_rule(msg: impl Into<String>) -> Self {
        Self::BusinessRule(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, QueueError>;
