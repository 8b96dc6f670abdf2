//! Pure transition table for the queue entry lifecycle.
//!
//! The table is the single source of truth for which status changes are
//! legal; the engine maps [`TransitionError`] onto its business-rule error
//! before anything is persisted.

use thiserror::Error;

use super::events::LifecycleEvent;
use super::states::EntryStatus;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {from} cannot accept {}", .event.as_str())]
pub struct TransitionError {
    pub from: EntryStatus,
    pub event: LifecycleEvent,
}

/// Determine the target status for an event, or reject the transition.
pub fn target_status(
    current: EntryStatus,
    event: &LifecycleEvent,
) -> Result<EntryStatus, TransitionError> {
    use EntryStatus::*;
    use LifecycleEvent::*;

    let target = match (current, event) {
        // Arrival
        (Scheduled, CheckIn) => Waiting,
        (Waiting, CheckIn) => Waiting,
        (Rescheduled, CheckIn) => Waiting,

        // Call-next
        (Scheduled, Call) => InProgress,
        (Waiting, Call) => InProgress,

        // Completion; walk-in clinics complete entries that were never
        // formally called, so awaiting states are admitted too
        (InProgress, Complete) => Completed,
        (Scheduled, Complete) => Completed,
        (Waiting, Complete) => Completed,

        // Cancellation from any non-terminal state
        (Scheduled, Cancel) => Cancelled,
        (Waiting, Cancel) => Cancelled,
        (InProgress, Cancel) => Cancelled,
        (Rescheduled, Cancel) => Cancelled,

        // Rebooking
        (Scheduled, Reschedule) => Rescheduled,
        (Waiting, Reschedule) => Rescheduled,

        (from, event) => {
            return Err(TransitionError {
                from,
                event: event.clone(),
            })
        }
    };

    Ok(target)
}

/// All statuses reachable from `current` in a single transition.
pub fn valid_transitions(current: EntryStatus) -> Vec<EntryStatus> {
    let events = [
        LifecycleEvent::CheckIn,
        LifecycleEvent::Call,
        LifecycleEvent::Complete,
        LifecycleEvent::Cancel,
        LifecycleEvent::Reschedule,
    ];

    let mut targets: Vec<EntryStatus> = events
        .iter()
        .filter_map(|event| target_status(current, event).ok())
        .collect();
    targets.dedup();
    targets
}
