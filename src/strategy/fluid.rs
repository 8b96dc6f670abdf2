//! Fluid (priority flow) scheduling: slot times are ignored.

use super::{
    Candidate, LateArrivalDecision, OperatingMode, SchedulingStrategy, StrategyContext,
};
use crate::models::{QueueEntry, WaitlistEntry};

/// Priority-ordered call-next policy.
///
/// The present, non-skipped entry with the highest priority score goes
/// first; within a priority band the lower queue position wins, so equal
/// patients are served first-in-first-served.
#[derive(Debug, Clone, Copy)]
pub struct FluidStrategy {
    late_arrival_penalty: i32,
}

impl FluidStrategy {
    pub fn new(late_arrival_penalty: i32) -> Self {
        Self {
            late_arrival_penalty,
        }
    }
}

impl SchedulingStrategy for FluidStrategy {
    fn mode(&self) -> OperatingMode {
        OperatingMode::Fluid
    }

    fn next_candidate(
        &self,
        schedule: &[QueueEntry],
        _waitlist: &[WaitlistEntry],
        _ctx: &StrategyContext,
    ) -> Option<Candidate> {
        schedule
            .iter()
            .filter(|entry| entry.is_callable())
            .max_by(|a, b| {
                a.effective_priority()
                    .cmp(&b.effective_priority())
                    .then_with(|| b.queue_position.cmp(&a.queue_position))
            })
            .map(|entry| Candidate::Scheduled { entry_id: entry.id })
    }

    fn handle_late_arrival(
        &self,
        entry: &QueueEntry,
        _schedule: &[QueueEntry],
        _ctx: &StrategyContext,
    ) -> LateArrivalDecision {
        // Re-enter the flow at a reduced priority; position is recomputed
        // from the penalized score on the next call.
        LateArrivalDecision {
            kind: super::LateArrivalKind::Insert,
            target_position: None,
            priority_delta: Some(-self.late_arrival_penalty),
            reason: Some(format!(
                "late return, priority reduced by {}",
                self.late_arrival_penalty
            )),
        }
    }
}
