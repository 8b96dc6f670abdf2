use serde::{Deserialize, Serialize};

/// Events that drive queue entry lifecycle transitions.
///
/// Absence and return are deliberately absent here: they toggle the
/// presence overlay (`is_present`, `skip_reason`) without changing status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// Patient arrived at the clinic
    CheckIn,
    /// Staff called the patient in
    Call,
    /// Consultation finished
    Complete,
    /// Booking withdrawn
    Cancel,
    /// Booking moved to another slot
    Reschedule,
}

impl LifecycleEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckIn => "check_in",
            Self::Call => "call",
            Self::Complete => "complete",
            Self::Cancel => "cancel",
            Self::Reschedule => "reschedule",
        }
    }
}
