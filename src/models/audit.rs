//! # Override Audit Records
//!
//! Append-only documentation of every manual or automatic change to call
//! order and presence state. Records are written together with the state
//! mutation they document and are never mutated or deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The kind of intervention being audited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideAction {
    /// A present patient was called in
    CallPresent,
    /// A patient was flagged absent
    MarkAbsent,
    /// An absent patient returned and was repositioned
    LateArrival,
    /// Emergency insertion ahead of the queue
    Emergency,
    /// Manual position change
    Reorder,
}

impl fmt::Display for OverrideAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CallPresent => write!(f, "call_present"),
            Self::MarkAbsent => write!(f, "mark_absent"),
            Self::LateArrival => write!(f, "late_arrival"),
            Self::Emergency => write!(f, "emergency"),
            Self::Reorder => write!(f, "reorder"),
        }
    }
}

/// A persisted audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueOverride {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub appointment_id: Uuid,
    pub action: OverrideAction,
    pub performed_by: Uuid,
    pub reason: Option<String>,
    pub previous_position: Option<i32>,
    pub new_position: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// Creation payload for an audit record; the repository assigns id and
/// timestamp at commit time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOverride {
    pub clinic_id: Uuid,
    pub appointment_id: Uuid,
    pub action: OverrideAction,
    pub performed_by: Uuid,
    pub reason: Option<String>,
    pub previous_position: Option<i32>,
    pub new_position: Option<i32>,
}

/// Links an appointment to its absence window and grace deadline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbsentPatient {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub marked_absent_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub grace_period_ends_at: DateTime<Utc>,
    pub notification_sent: bool,
    pub auto_cancel: bool,
}

/// Creation payload for an absence record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAbsentRecord {
    pub appointment_id: Uuid,
    pub marked_absent_at: DateTime<Utc>,
    pub grace_period_ends_at: DateTime<Utc>,
    pub auto_cancel: bool,
}
