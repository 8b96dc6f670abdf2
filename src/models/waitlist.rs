use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::queue_entry::PatientRef;
use crate::state_machine::WaitlistStatus;

/// A standby patient without a concrete slot, eligible for promotion into
/// freed slots in priority order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitlistEntry {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub patient: PatientRef,
    pub requested_date: NaiveDate,
    pub priority_score: i32,
    pub status: WaitlistStatus,
    pub created_at: DateTime<Utc>,
}

/// Creation payload for a waitlist entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWaitlistEntry {
    pub clinic_id: Uuid,
    pub patient: PatientRef,
    pub requested_date: NaiveDate,
    pub priority_score: i32,
}
