use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::QueueEntry;
use crate::state_machine::EntryStatus;

/// Domain events emitted after a queue mutation commits.
///
/// Each payload carries the entry snapshot plus the action metadata a
/// downstream consumer (UI refresh, notification dispatch) needs without a
/// follow-up read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum QueueEvent {
    PatientAdded {
        entry: QueueEntry,
    },
    PatientCheckedIn {
        entry: QueueEntry,
    },
    PatientCalled {
        entry: QueueEntry,
        performed_by: Uuid,
    },
    PatientMarkedAbsent {
        entry: QueueEntry,
        performed_by: Uuid,
        grace_period_ends_at: DateTime<Utc>,
    },
    PatientReturned {
        entry: QueueEntry,
        performed_by: Uuid,
        previous_position: i32,
        new_position: i32,
    },
    StatusChanged {
        entry: QueueEntry,
        performed_by: Uuid,
        previous_status: EntryStatus,
        reason: Option<String>,
    },
    QueuePositionChanged {
        entry: QueueEntry,
        performed_by: Uuid,
        previous_position: i32,
        new_position: i32,
    },
    WaitlistPromoted {
        entry: QueueEntry,
        waitlist_id: Uuid,
    },
}

impl QueueEvent {
    /// Stable name for routing and logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PatientAdded { .. } => "patient_added",
            Self::PatientCheckedIn { .. } => "patient_checked_in",
            Self::PatientCalled { .. } => "patient_called",
            Self::PatientMarkedAbsent { .. } => "patient_marked_absent",
            Self::PatientReturned { .. } => "patient_returned",
            Self::StatusChanged { .. } => "status_changed",
            Self::QueuePositionChanged { .. } => "queue_position_changed",
            Self::WaitlistPromoted { .. } => "waitlist_promoted",
        }
    }

    /// The entry the event is about.
    pub fn entry(&self) -> &QueueEntry {
        match self {
            Self::PatientAdded { entry }
            | Self::PatientCheckedIn { entry }
            | Self::PatientCalled { entry, .. }
            | Self::PatientMarkedAbsent { entry, .. }
            | Self::PatientReturned { entry, .. }
            | Self::StatusChanged { entry, .. }
            | Self::QueuePositionChanged { entry, .. }
            | Self::WaitlistPromoted { entry, .. } => entry,
        }
    }
}
