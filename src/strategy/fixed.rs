//! Fixed (slotted) scheduling: time is authoritative.

use super::{
    find_gap, waitlist_head, Candidate, LateArrivalDecision, OperatingMode, SchedulingStrategy,
    StrategyContext,
};
use crate::models::{QueueEntry, WaitlistEntry};

/// Slotted call-next policy.
///
/// A free slot goes to the waitlist head when the clinic allows it; failing
/// that, the earliest-slotted present patient is served, even ahead of their
/// nominal time. Serving an early arrival is deliberate: it frees their own
/// slot for later gap-filling instead of idling the clinician.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedStrategy;

impl FixedStrategy {
    /// Earliest present awaiting entry by slot start; unslotted walk-ins
    /// queue behind slotted entries in position order.
    fn first_present<'a>(&self, schedule: &'a [QueueEntry]) -> Option<&'a QueueEntry> {
        schedule
            .iter()
            .filter(|entry| entry.is_callable())
            .min_by_key(|entry| {
                (
                    entry.slot.map(|w| w.starts_at).is_none(),
                    entry.slot.map(|w| w.starts_at),
                    entry.queue_position,
                )
            })
    }
}

impl SchedulingStrategy for FixedStrategy {
    fn mode(&self) -> OperatingMode {
        OperatingMode::Fixed
    }

    fn next_candidate(
        &self,
        schedule: &[QueueEntry],
        waitlist: &[WaitlistEntry],
        ctx: &StrategyContext,
    ) -> Option<Candidate> {
        if ctx.waitlist_enabled && find_gap(schedule, ctx.now).is_some() {
            if let Some(head) = waitlist_head(waitlist) {
                return Some(Candidate::Waitlist {
                    waitlist_id: head.id,
                });
            }
        }

        self.first_present(schedule).map(|entry| Candidate::Scheduled {
            entry_id: entry.id,
        })
    }

    fn handle_late_arrival(
        &self,
        entry: &QueueEntry,
        schedule: &[QueueEntry],
        ctx: &StrategyContext,
    ) -> LateArrivalDecision {
        // Original slot not yet reached: the patient keeps their seat.
        if let Some(window) = entry.slot {
            if !window.has_started(ctx.now) {
                return LateArrivalDecision::insert(entry.queue_position);
            }
        }

        // Otherwise take over the earliest open slot. The returning entry's
        // own stale slot does not count as open.
        let open_slot = schedule
            .iter()
            .filter(|candidate| candidate.id != entry.id && candidate.is_gap(ctx.now))
            .min_by_key(|candidate| candidate.slot.map(|w| w.starts_at));
        if let Some(gap) = open_slot {
            return LateArrivalDecision::insert(gap.queue_position);
        }

        LateArrivalDecision::waitlist("no open slot remaining today")
    }
}
