//! # Waitlist & Gap Manager
//!
//! Decides when a freed slot is filled from the standby list and performs
//! the promotion. A ready standby patient beats waiting on a possibly
//! absent scheduled one, so gap-filling runs before present-patient
//! selection inside the fixed and hybrid strategies.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{QueueError, Result};
use crate::events::{EventPublisher, QueueEvent};
use crate::models::{NewWaitlistEntry, QueueEntry, TimeWindow, WaitlistEntry};
use crate::repository::Repository;
use crate::strategy;

pub struct GapManager {
    repository: Arc<dyn Repository>,
    publisher: EventPublisher,
}

impl GapManager {
    pub fn new(repository: Arc<dyn Repository>, publisher: EventPublisher) -> Self {
        Self {
            repository,
            publisher,
        }
    }

    /// Put a patient on standby for a date.
    pub async fn add(&self, dto: NewWaitlistEntry) -> Result<WaitlistEntry> {
        if dto.priority_score < 0 {
            return Err(QueueError::validation(format!(
                "waitlist priority must be non-negative, got {}",
                dto.priority_score
            )));
        }
        let entry = self.repository.add_to_waitlist(dto).await?;
        debug!(
            waitlist_id = %entry.id,
            clinic_id = %entry.clinic_id,
            priority = entry.priority_score,
            "patient added to waitlist"
        );
        Ok(entry)
    }

    /// Earliest open gap in a schedule snapshot.
    pub fn find_gap<'a>(
        &self,
        schedule: &'a [QueueEntry],
        now: DateTime<Utc>,
    ) -> Option<&'a QueueEntry> {
        strategy::find_gap(schedule, now)
    }

    /// Promote a standby patient into a freed slot under `staff_id`.
    ///
    /// The conversion is atomic against concurrent promotions of the same
    /// waitlist entry; the loser observes a conflict.
    pub async fn promote(
        &self,
        waitlist_id: Uuid,
        staff_id: Uuid,
        slot: TimeWindow,
    ) -> Result<QueueEntry> {
        let (standby, entry) = self
            .repository
            .promote_waitlist(waitlist_id, staff_id, slot)
            .await?;

        info!(
            waitlist_id = %standby.id,
            entry_id = %entry.id,
            position = entry.queue_position,
            slot_starts_at = %slot.starts_at,
            "waitlist entry promoted into freed slot"
        );

        if let Err(error) = self.publisher.publish(QueueEvent::WaitlistPromoted {
            entry: entry.clone(),
            waitlist_id: standby.id,
        }) {
            tracing::warn!(%error, waitlist_id = %standby.id, "failed to publish promotion event");
        }

        Ok(entry)
    }
}
