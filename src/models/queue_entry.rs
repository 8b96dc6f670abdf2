//! # Queue Entry
//!
//! The appointment in queue context: identity, scope references, slot
//! window, call-order position, lifecycle status, and the presence overlay
//! used by absence handling.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{QueueError, Result};
use crate::state_machine::EntryStatus;

/// A patient identity reference. Registered accounts and unauthenticated
/// guests are mutually exclusive by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum PatientRef {
    Registered(Uuid),
    Guest(Uuid),
}

impl PatientRef {
    pub fn id(&self) -> Uuid {
        match self {
            Self::Registered(id) | Self::Guest(id) => *id,
        }
    }

    pub fn is_guest(&self) -> bool {
        matches!(self, Self::Guest(_))
    }
}

impl fmt::Display for PatientRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registered(id) => write!(f, "patient:{id}"),
            Self::Guest(id) => write!(f, "guest:{id}"),
        }
    }
}

/// A concrete start/end window for a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Result<Self> {
        if ends_at <= starts_at {
            return Err(QueueError::validation(format!(
                "slot window must end after it starts ({starts_at} >= {ends_at})"
            )));
        }
        Ok(Self { starts_at, ends_at })
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.ends_at - self.starts_at).num_minutes()
    }

    /// The slot's start time has already passed.
    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        self.starts_at <= now
    }
}

/// Why an entry was passed over in call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    PatientAbsent,
    PatientPresent,
    Emergency,
    StaffPreference,
    LateArrival,
    Technical,
    Other,
}

/// How a stored wait-time estimate was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionMode {
    Model,
    Heuristic,
    Disabled,
}

/// An appointment as seen by the queue engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub staff_id: Uuid,
    pub patient: PatientRef,

    pub scheduled_date: NaiveDate,
    pub slot: Option<TimeWindow>,
    pub walk_in: bool,

    /// Call precedence within (clinic, staff, date). Unique per scope at any
    /// read, not necessarily contiguous.
    pub queue_position: i32,
    pub status: EntryStatus,

    // Presence overlay; orthogonal to status
    pub is_present: bool,
    pub skip_reason: Option<SkipReason>,
    pub skip_count: i32,
    pub marked_absent_at: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,

    pub checked_in_at: Option<DateTime<Utc>>,
    pub actual_start_time: Option<DateTime<Utc>>,
    pub actual_end_time: Option<DateTime<Utc>>,

    /// Fluid-mode ordering key; unused by the other strategies.
    pub priority_score: Option<i32>,

    // Estimator outputs; stored verbatim, never derived here
    pub estimated_wait_minutes: Option<i32>,
    pub prediction_mode: Option<PredictionMode>,
    pub prediction_confidence: Option<f32>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QueueEntry {
    /// Still waiting for a call (Scheduled or Waiting).
    pub fn is_awaiting(&self) -> bool {
        self.status.is_awaiting()
    }

    /// Marked absent and not yet returned.
    pub fn has_open_absence(&self) -> bool {
        self.marked_absent_at.is_some() && self.returned_at.is_none()
    }

    /// Eligible for call-next: awaiting, physically present, not flagged absent.
    pub fn is_callable(&self) -> bool {
        self.is_awaiting()
            && self.is_present
            && !self.has_open_absence()
            && self.skip_reason != Some(SkipReason::PatientAbsent)
    }

    /// The slot's start time has passed without the patient being present.
    pub fn is_gap(&self, now: DateTime<Utc>) -> bool {
        self.is_awaiting()
            && !self.is_present
            && self.slot.map(|w| w.has_started(now)).unwrap_or(false)
    }

    pub fn effective_priority(&self) -> i32 {
        self.priority_score.unwrap_or(0)
    }
}
