use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// Booked with a slot, not yet seen at the clinic
    Scheduled,
    /// Checked in and awaiting a call
    Waiting,
    /// Currently being seen
    InProgress,
    /// Consultation finished
    Completed,
    /// Cancelled by patient, staff, or system
    Cancelled,
    /// Never turned up; set by the day-closure process, not by this core
    NoShow,
    /// Moved to a different slot
    Rescheduled,
}

impl EntryStatus {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::NoShow)
    }

    /// Check if the entry is still waiting for its turn
    pub fn is_awaiting(&self) -> bool {
        matches!(self, Self::Scheduled | Self::Waiting)
    }

    /// Check if the entry is currently being served
    pub fn is_active(&self) -> bool {
        matches!(self, Self::InProgress)
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scheduled => write!(f, "scheduled"),
            Self::Waiting => write!(f, "waiting"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::NoShow => write!(f, "no_show"),
            Self::Rescheduled => write!(f, "rescheduled"),
        }
    }
}

impl std::str::FromStr for EntryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(Self::Scheduled),
            "waiting" => Ok(Self::Waiting),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            "no_show" => Ok(Self::NoShow),
            "rescheduled" => Ok(Self::Rescheduled),
            _ => Err(format!("Invalid entry status: {s}")),
        }
    }
}

impl Default for EntryStatus {
    fn default() -> Self {
        Self::Scheduled
    }
}

/// Lifecycle state of a waitlist entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitlistStatus {
    /// On standby, eligible for promotion
    Waiting,
    /// Told a slot may open; still on the list
    Notified,
    /// Converted into a queue entry
    Promoted,
    /// Requested date passed without promotion
    Expired,
    /// Withdrawn
    Cancelled,
}

impl WaitlistStatus {
    /// Promotion is only allowed from Waiting or Notified.
    pub fn is_promotable(&self) -> bool {
        matches!(self, Self::Waiting | Self::Notified)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Promoted | Self::Expired | Self::Cancelled)
    }
}

impl fmt::Display for WaitlistStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Notified => write!(f, "notified"),
            Self::Promoted => write!(f, "promoted"),
            Self::Expired => write!(f, "expired"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl Default for WaitlistStatus {
    fn default() -> Self {
        Self::Waiting
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(EntryStatus::Completed.is_terminal());
        assert!(EntryStatus::Cancelled.is_terminal());
        assert!(EntryStatus::NoShow.is_terminal());
        assert!(!EntryStatus::Scheduled.is_terminal());
        assert!(!EntryStatus::Waiting.is_terminal());
        assert!(!EntryStatus::InProgress.is_terminal());
        assert!(!EntryStatus::Rescheduled.is_terminal());
    }

    #[test]
    fn test_awaiting_statuses() {
        assert!(EntryStatus::Scheduled.is_awaiting());
        assert!(EntryStatus::Waiting.is_awaiting());
        assert!(!EntryStatus::InProgress.is_awaiting());
        assert!(!EntryStatus::Rescheduled.is_awaiting());
    }

    #[test]
    fn test_status_string_round_trip() {
        assert_eq!(EntryStatus::InProgress.to_string(), "in_progress");
        assert_eq!(
            "no_show".parse::<EntryStatus>().unwrap(),
            EntryStatus::NoShow
        );
        assert!("unknown".parse::<EntryStatus>().is_err());
    }

    #[test]
    fn test_status_serde() {
        let status = EntryStatus::InProgress;
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, "\"in_progress\"");

        let parsed: EntryStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, status);
    }

    #[test]
    fn test_waitlist_promotable() {
        assert!(WaitlistStatus::Waiting.is_promotable());
        assert!(WaitlistStatus::Notified.is_promotable());
        assert!(!WaitlistStatus::Promoted.is_promotable());
        assert!(!WaitlistStatus::Cancelled.is_promotable());
    }
}
