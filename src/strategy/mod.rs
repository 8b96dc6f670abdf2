//! # Scheduling Strategies
//!
//! One policy per clinic operating mode, deciding which entry to call next
//! and how to react to a late arrival. Strategies are pure functions over a
//! schedule snapshot: no I/O, no clocks of their own, no persistence.
//!
//! Mode dispatch is closed: the three implementations are constructed once
//! in [`StrategyRegistry`] and resolved per clinic configuration, never
//! through a per-call string factory.

pub mod fixed;
pub mod fluid;
pub mod hybrid;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::config::CoreConfig;
use crate::models::{QueueEntry, WaitlistEntry};

pub use fixed::FixedStrategy;
pub use fluid::FluidStrategy;
pub use hybrid::HybridStrategy;

/// Per-clinic operating mode selecting the call-next policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatingMode {
    /// Slotted: time is authoritative
    Fixed,
    /// Priority flow: slot times are ignored
    Fluid,
    /// Slotted base with waitlist-forward extensions
    Hybrid,
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed => write!(f, "fixed"),
            Self::Fluid => write!(f, "fluid"),
            Self::Hybrid => write!(f, "hybrid"),
        }
    }
}

impl std::str::FromStr for OperatingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed" => Ok(Self::Fixed),
            "fluid" => Ok(Self::Fluid),
            "hybrid" => Ok(Self::Hybrid),
            _ => Err(format!("Invalid operating mode: {s}")),
        }
    }
}

/// Snapshot-scoped inputs for a strategy decision.
#[derive(Debug, Clone, Copy)]
pub struct StrategyContext {
    pub now: DateTime<Utc>,
    pub waitlist_enabled: bool,
}

/// Who to call next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Candidate {
    /// A scheduled entry from the day's queue
    Scheduled { entry_id: Uuid },
    /// A standby patient to promote into the open gap first
    Waitlist { waitlist_id: Uuid },
}

/// What to do with a late-returning patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LateArrivalKind {
    Insert,
    Waitlist,
    Reject,
    Nothing,
}

/// Strategy verdict for a late arrival.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LateArrivalDecision {
    pub kind: LateArrivalKind,
    /// Position to re-seat at, when `kind` is `Insert`.
    pub target_position: Option<i32>,
    /// Priority adjustment: negative penalty on reinsert, positive boost on
    /// waitlist routing.
    pub priority_delta: Option<i32>,
    pub reason: Option<String>,
}

impl LateArrivalDecision {
    pub fn insert(target_position: i32) -> Self {
        Self {
            kind: LateArrivalKind::Insert,
            target_position: Some(target_position),
            priority_delta: None,
            reason: None,
        }
    }

    pub fn waitlist(reason: impl Into<String>) -> Self {
        Self {
            kind: LateArrivalKind::Waitlist,
            target_position: None,
            priority_delta: None,
            reason: Some(reason.into()),
        }
    }

    pub fn nothing() -> Self {
        Self {
            kind: LateArrivalKind::Nothing,
            target_position: None,
            priority_delta: None,
            reason: None,
        }
    }

    pub fn with_priority_delta(mut self, delta: i32) -> Self {
        self.priority_delta = Some(delta);
        self
    }
}

/// A call-next policy for one operating mode.
pub trait SchedulingStrategy: Send + Sync {
    fn mode(&self) -> OperatingMode;

    /// Pick the next candidate from the snapshot, or none when every
    /// eligible patient is absent.
    fn next_candidate(
        &self,
        schedule: &[QueueEntry],
        waitlist: &[WaitlistEntry],
        ctx: &StrategyContext,
    ) -> Option<Candidate>;

    /// Decide how to re-seat a patient returning after their slot.
    fn handle_late_arrival(
        &self,
        entry: &QueueEntry,
        schedule: &[QueueEntry],
        ctx: &StrategyContext,
    ) -> LateArrivalDecision;
}

/// Earliest open gap: a scheduled slot whose start has passed while its
/// occupant is not present.
pub fn find_gap<'a>(schedule: &'a [QueueEntry], now: DateTime<Utc>) -> Option<&'a QueueEntry> {
    schedule
        .iter()
        .filter(|entry| entry.is_gap(now))
        .min_by_key(|entry| entry.slot.map(|w| w.starts_at))
}

/// Highest-priority promotable waitlist entry, FIFO within a priority band.
pub fn waitlist_head<'a>(waitlist: &'a [WaitlistEntry]) -> Option<&'a WaitlistEntry> {
    waitlist
        .iter()
        .filter(|w| w.status.is_promotable())
        .max_by(|a, b| {
            a.priority_score
                .cmp(&b.priority_score)
                .then_with(|| b.created_at.cmp(&a.created_at))
        })
}

/// The three strategies, constructed once per engine and resolved by mode.
pub struct StrategyRegistry {
    fixed: FixedStrategy,
    fluid: FluidStrategy,
    hybrid: HybridStrategy,
}

impl StrategyRegistry {
    pub fn new(config: &CoreConfig) -> Self {
        Self {
            fixed: FixedStrategy,
            fluid: FluidStrategy::new(config.late_arrival_priority_penalty),
            hybrid: HybridStrategy::new(config.late_arrival_waitlist_boost),
        }
    }

    pub fn for_mode(&self, mode: OperatingMode) -> &dyn SchedulingStrategy {
        match mode {
            OperatingMode::Fixed => &self.fixed,
            OperatingMode::Fluid => &self.fluid,
            OperatingMode::Hybrid => &self.hybrid,
        }
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new(&CoreConfig::default())
    }
}


#[cfg(test)]
mod tests {
    use super::testkit::*;
    use super::*;

    #[test]
    fn test_find_gap_picks_earliest_started_slot() {
        let schedule = vec![
            slotted_entry(1, 9, 0, true),
            slotted_entry(2, 9, 15, false),
            slotted_entry(3, 9, 30, false),
        ];
        let gap = find_gap(&schedule, at(10, 0)).unwrap();
        assert_eq!(gap.queue_position, 2);

        assert!(find_gap(&schedule, at(9, 10)).is_none());
    }

    #[test]
    fn test_waitlist_head_priority_then_fifo() {
        let early_high = standby(10, 0);
        let late_high = standby(10, 30);
        let low = standby(5, 0);
        let list = vec![late_high.clone(), low, early_high.clone()];

        let head = waitlist_head(&list).unwrap();
        assert_eq!(head.id, early_high.id, "FIFO within the same priority band");
    }

    #[test]
    fn test_mode_round_trip() {
        assert_eq!("fluid".parse::<OperatingMode>().unwrap(), OperatingMode::Fluid);
        assert_eq!(OperatingMode::Hybrid.to_string(), "hybrid");
        assert!("priority".parse::<OperatingMode>().is_err());
    }

    #[test]
    fn test_registry_resolves_each_mode() {
        let registry = StrategyRegistry::default();
        for mode in [OperatingMode::Fixed, OperatingMode::Fluid, OperatingMode::Hybrid] {
            assert_eq!(registry.for_mode(mode).mode(), mode);
        }
    }
}
