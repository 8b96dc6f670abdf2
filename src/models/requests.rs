//! Operation payloads for the queue engine and the sparse patch applied
//! through the repository.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::queue_entry::{PatientRef, PredictionMode, SkipReason, TimeWindow};
use crate::state_machine::EntryStatus;

/// Booking payload entering the queue core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAppointment {
    pub clinic_id: Uuid,
    pub staff_id: Uuid,
    pub patient: PatientRef,
    pub scheduled_date: NaiveDate,
    pub slot: Option<TimeWindow>,
    pub walk_in: bool,
    pub priority_score: Option<i32>,
}

/// Scope and actor context for call-next and late-arrival planning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CallContext {
    pub clinic_id: Uuid,
    pub staff_id: Uuid,
    pub date: NaiveDate,
    pub performed_by: Uuid,
    /// Clinic-level switch for waitlist gap-filling.
    pub waitlist_enabled: bool,
}

/// Payload for flagging a patient absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkAbsentRequest {
    pub entry_id: Uuid,
    pub performed_by: Uuid,
    pub reason: Option<String>,
    /// Overrides the configured grace period when set.
    pub grace_minutes: Option<i64>,
    /// Cancel automatically when the grace deadline lapses unreturned.
    pub auto_cancel: bool,
}

/// Payload for a manual position change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReorderRequest {
    pub entry_id: Uuid,
    pub new_position: i32,
    pub performed_by: Uuid,
    pub reason: Option<String>,
}

/// Sparse update applied to a queue entry.
///
/// `expected_status` turns a status change into a compare-and-swap: the
/// repository must reject the patch with a conflict when the stored status
/// no longer matches, which is how concurrent call-next invocations are
/// prevented from transitioning the same patient twice.
///
/// Double-`Option` fields distinguish "leave unchanged" (`None`) from
/// "clear" (`Some(None)`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntryPatch {
    pub expected_status: Option<EntryStatus>,
    pub status: Option<EntryStatus>,
    pub is_present: Option<bool>,
    pub skip_reason: Option<Option<SkipReason>>,
    pub skip_count: Option<i32>,
    pub queue_position: Option<i32>,
    pub marked_absent_at: Option<Option<DateTime<Utc>>>,
    pub returned_at: Option<Option<DateTime<Utc>>>,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub actual_start_time: Option<DateTime<Utc>>,
    pub actual_end_time: Option<DateTime<Utc>>,
    pub priority_score: Option<Option<i32>>,
    pub estimated_wait_minutes: Option<i32>,
    pub prediction_mode: Option<PredictionMode>,
    pub prediction_confidence: Option<f32>,
}

impl EntryPatch {
    /// Patch for the call-next transition: CAS on the prior status, move to
    /// in-progress, stamp arrival and service start.
    pub fn call_transition(prior: EntryStatus, now: DateTime<Utc>) -> Self {
        Self {
            expected_status: Some(prior),
            status: Some(EntryStatus::InProgress),
            checked_in_at: Some(now),
            actual_start_time: Some(now),
            ..Self::default()
        }
    }
}
