//! Hybrid scheduling: slotted base with waitlist-forward late handling.

use super::{
    Candidate, FixedStrategy, LateArrivalDecision, OperatingMode, SchedulingStrategy,
    StrategyContext,
};
use crate::models::{QueueEntry, WaitlistEntry};

/// Slotted ordering with elevated waitlist treatment.
///
/// Candidate selection matches [`FixedStrategy`]: waitlist-first on an open
/// gap, then the earliest present patient.
///
/// TODO: cascade early-arrival offers to multiple future patients and
/// auto-promote the waitlist head when a cascade round closes unanswered.
/// Until that lands the behavior is the fixed-mode fallback; only the
/// late-arrival path differs.
#[derive(Debug, Clone, Copy)]
pub struct HybridStrategy {
    waitlist_priority_boost: i32,
}

impl HybridStrategy {
    pub fn new(waitlist_priority_boost: i32) -> Self {
        Self {
            waitlist_priority_boost,
        }
    }
}

impl SchedulingStrategy for HybridStrategy {
    fn mode(&self) -> OperatingMode {
        OperatingMode::Hybrid
    }

    fn next_candidate(
        &self,
        schedule: &[QueueEntry],
        waitlist: &[WaitlistEntry],
        ctx: &StrategyContext,
    ) -> Option<Candidate> {
        FixedStrategy.next_candidate(schedule, waitlist, ctx)
    }

    fn handle_late_arrival(
        &self,
        entry: &QueueEntry,
        _schedule: &[QueueEntry],
        ctx: &StrategyContext,
    ) -> LateArrivalDecision {
        // A future slot is still honored, like fixed mode.
        if let Some(window) = entry.slot {
            if !window.has_started(ctx.now) {
                return LateArrivalDecision::insert(entry.queue_position);
            }
        }

        // Past the slot, route to the waitlist at elevated priority so the
        // returning patient outranks fresh standby arrivals.
        LateArrivalDecision::waitlist("slot passed, waitlisted at elevated priority")
            .with_priority_delta(self.waitlist_priority_boost)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testkit::*;
    use super::super::LateArrivalKind;
    use super::*;

    #[test]
    fn test_candidate_selection_matches_fixed() {
        let a = slotted_entry(1, 9, 0, true);
        let b = slotted_entry(2, 9, 15, false);
        let schedule = vec![a.clone(), b];
        let context = ctx(at(9, 20), false);

        let hybrid = HybridStrategy::new(10).next_candidate(&schedule, &[], &context);
        let fixed = FixedStrategy.next_candidate(&schedule, &[], &context);
        assert_eq!(hybrid, fixed);
        assert_eq!(hybrid, Some(Candidate::Scheduled { entry_id: a.id }));
    }

    #[test]
    fn test_gap_still_prefers_waitlist() {
        let schedule = vec![slotted_entry(1, 9, 0, false), slotted_entry(2, 9, 30, true)];
        let standby_patient = standby(3, 0);
        let waitlist = vec![standby_patient.clone()];

        let candidate = HybridStrategy::new(10)
            .next_candidate(&schedule, &waitlist, &ctx(at(9, 10), true))
            .unwrap();
        assert_eq!(
            candidate,
            Candidate::Waitlist {
                waitlist_id: standby_patient.id
            }
        );
    }

    #[test]
    fn test_late_arrival_waitlisted_with_boost() {
        let entry = slotted_entry(1, 8, 30, false);
        let decision = HybridStrategy::new(10).handle_late_arrival(&entry, &[], &ctx(at(9, 0), true));
        assert_eq!(decision.kind, LateArrivalKind::Waitlist);
        assert_eq!(decision.priority_delta, Some(10));
    }

    #[test]
    fn test_late_arrival_future_slot_kept() {
        let entry = slotted_entry(6, 14, 0, false);
        let decision = HybridStrategy::new(10).handle_late_arrival(&entry, &[], &ctx(at(9, 0), true));
        assert_eq!(decision, LateArrivalDecision::insert(6));
    }
}
