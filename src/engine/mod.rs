//! # Queue Engine
//!
//! Owner of the appointment lifecycle: create, check-in, call-next,
//! absence and return, completion, cancellation, and manual reordering.
//! "Who is next" is delegated to the clinic's scheduling strategy; storage
//! atomicity is delegated to the repository; state changes are announced
//! through the fire-and-forget event publisher after they commit.
//!
//! Every operation validates preconditions before mutating and surfaces
//! failures synchronously. The single best-effort path is the recording of
//! observed wait/service durations at completion, which is logged and
//! swallowed so a labeling outage never blocks patient flow.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::CoreConfig;
use crate::error::{QueueError, Result};
use crate::estimator::WaitEstimate;
use crate::events::{EventPublisher, QueueEvent};
use crate::models::{
    AbsentPatient, CallContext, EntryPatch, MarkAbsentRequest, NewAbsentRecord, NewAppointment,
    NewOverride, OverrideAction, QueueEntry, ReorderRequest, SkipReason,
};
use crate::repository::Repository;
use crate::state_machine::{target_status, EntryStatus, LifecycleEvent};
use crate::strategy::{
    Candidate, LateArrivalDecision, SchedulingStrategy, StrategyContext, StrategyRegistry,
};
use crate::waitlist::GapManager;

pub struct QueueEngine {
    repository: Arc<dyn Repository>,
    publisher: EventPublisher,
    strategies: StrategyRegistry,
    gap_manager: GapManager,
    config: CoreConfig,
}

impl QueueEngine {
    pub fn new(repository: Arc<dyn Repository>, config: CoreConfig) -> Self {
        let publisher = EventPublisher::new(config.event_channel_capacity);
        Self::with_publisher(repository, publisher, config)
    }

    pub fn with_publisher(
        repository: Arc<dyn Repository>,
        publisher: EventPublisher,
        config: CoreConfig,
    ) -> Self {
        let strategies = StrategyRegistry::new(&config);
        let gap_manager = GapManager::new(Arc::clone(&repository), publisher.clone());
        Self {
            repository,
            publisher,
            strategies,
            gap_manager,
            config,
        }
    }

    /// Standby-list operations share the engine's repository and publisher.
    pub fn gap_manager(&self) -> &GapManager {
        &self.gap_manager
    }

    /// Subscribe to engine events.
    pub fn events(&self) -> &EventPublisher {
        &self.publisher
    }

    /// Book an appointment into the queue.
    ///
    /// The repository assigns the definitive queue position.
    #[instrument(skip(self, dto), fields(clinic_id = %dto.clinic_id, staff_id = %dto.staff_id))]
    pub async fn create_appointment(&self, dto: NewAppointment) -> Result<QueueEntry> {
        let slot = dto.slot.ok_or_else(|| {
            QueueError::validation("appointment requires a concrete start/end window")
        })?;

        if !dto.walk_in && slot.starts_at < Utc::now() {
            return Err(QueueError::validation(format!(
                "appointment start {} is in the past",
                slot.starts_at
            )));
        }

        let entry = self.repository.create_entry(dto).await?;
        info!(
            entry_id = %entry.id,
            position = entry.queue_position,
            walk_in = entry.walk_in,
            "appointment created"
        );

        self.publish(QueueEvent::PatientAdded {
            entry: entry.clone(),
        });
        Ok(entry)
    }

    /// Mark a patient as arrived and waiting.
    #[instrument(skip(self))]
    pub async fn check_in_patient(&self, id: Uuid) -> Result<QueueEntry> {
        let entry = self.repository.get_entry(id).await?;
        self.reject_terminal(&entry, "check in")?;

        let target = target_status(entry.status, &LifecycleEvent::CheckIn)
            .map_err(|e| QueueError::business_rule(format!("cannot check in entry {id}: {e}")))?;

        let patch = EntryPatch {
            expected_status: Some(entry.status),
            status: Some(target),
            is_present: Some(true),
            checked_in_at: Some(Utc::now()),
            ..EntryPatch::default()
        };
        let updated = self.repository.update_entry(id, patch).await?;
        info!(entry_id = %id, status = %updated.status, "patient checked in");

        self.publish(QueueEvent::PatientCheckedIn {
            entry: updated.clone(),
        });
        Ok(updated)
    }

    /// Call the next patient for a staff member's queue.
    ///
    /// Candidate choice belongs to the clinic's strategy; this method only
    /// executes the transition. No eligible candidate surfaces as
    /// [`QueueError::NotFound`] and is never retried here; the caller
    /// decides whether to wait or intervene.
    #[instrument(skip(self, ctx), fields(staff_id = %ctx.staff_id, clinic_id = %ctx.clinic_id))]
    pub async fn call_next_patient(&self, ctx: CallContext) -> Result<QueueEntry> {
        let snapshot = self
            .repository
            .get_schedule(ctx.staff_id, ctx.date)
            .await?;
        let strategy = self.strategies.for_mode(snapshot.operating_mode);

        let waitlist = if ctx.waitlist_enabled {
            self.repository
                .list_waitlist(ctx.clinic_id, ctx.date)
                .await?
        } else {
            Vec::new()
        };

        let now = Utc::now();
        let strategy_ctx = StrategyContext {
            now,
            waitlist_enabled: ctx.waitlist_enabled,
        };

        let candidate = strategy
            .next_candidate(&snapshot.entries, &waitlist, &strategy_ctx)
            .ok_or_else(|| QueueError::no_candidate(ctx.staff_id))?;

        let (entry_id, prior_status, position) = match candidate {
            Candidate::Scheduled { entry_id } => {
                let observed = snapshot
                    .entries
                    .iter()
                    .find(|e| e.id == entry_id)
                    .ok_or_else(|| QueueError::not_found("queue entry", entry_id))?;
                (entry_id, observed.status, observed.queue_position)
            }
            Candidate::Waitlist { waitlist_id } => {
                let gap = crate::strategy::find_gap(&snapshot.entries, now)
                    .ok_or_else(|| QueueError::no_candidate(ctx.staff_id))?;
                let slot = gap.slot.ok_or_else(|| {
                    QueueError::Database(format!("gap entry {} has no slot window", gap.id))
                })?;
                let promoted = self
                    .gap_manager
                    .promote(waitlist_id, ctx.staff_id, slot)
                    .await?;
                (promoted.id, promoted.status, promoted.queue_position)
            }
        };

        // Compare-and-swap on the observed status: if another terminal
        // already called this patient, the repository reports a conflict
        // instead of transitioning twice.
        let patch = EntryPatch::call_transition(prior_status, now);
        let audit = NewOverride {
            clinic_id: ctx.clinic_id,
            appointment_id: entry_id,
            action: OverrideAction::CallPresent,
            performed_by: ctx.performed_by,
            reason: None,
            previous_position: Some(position),
            new_position: Some(position),
        };
        let called = self
            .repository
            .update_entry_audited(entry_id, patch, audit)
            .await?;

        info!(
            entry_id = %called.id,
            position = called.queue_position,
            mode = %snapshot.operating_mode,
            "patient called"
        );

        self.publish(QueueEvent::PatientCalled {
            entry: called.clone(),
            performed_by: ctx.performed_by,
        });
        Ok(called)
    }

    /// Flag a patient absent and open a grace window for their return.
    #[instrument(skip(self, req), fields(entry_id = %req.entry_id))]
    pub async fn mark_patient_absent(&self, req: MarkAbsentRequest) -> Result<AbsentPatient> {
        let entry = self.repository.get_entry(req.entry_id).await?;
        self.reject_terminal(&entry, "mark absent")?;

        if entry.has_open_absence() {
            return Err(QueueError::conflict(format!(
                "entry {} is already marked absent (since {})",
                entry.id,
                entry
                    .marked_absent_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default()
            )));
        }
        if !entry.is_awaiting() {
            return Err(QueueError::business_rule(format!(
                "cannot mark entry {} absent: status is {}",
                entry.id, entry.status
            )));
        }

        let now = Utc::now();
        let grace_minutes = req
            .grace_minutes
            .unwrap_or(self.config.grace_period_minutes);
        let grace_period_ends_at = now + Duration::minutes(grace_minutes);

        let patch = EntryPatch {
            is_present: Some(false),
            skip_reason: Some(Some(SkipReason::PatientAbsent)),
            skip_count: Some(entry.skip_count + 1),
            marked_absent_at: Some(Some(now)),
            returned_at: Some(None),
            ..EntryPatch::default()
        };
        let audit = NewOverride {
            clinic_id: entry.clinic_id,
            appointment_id: entry.id,
            action: OverrideAction::MarkAbsent,
            performed_by: req.performed_by,
            reason: req.reason.clone(),
            previous_position: Some(entry.queue_position),
            new_position: Some(entry.queue_position),
        };
        // The overlay flip goes first: the repository rejects a second open
        // window, so a concurrent double-marking loses here before any
        // absence record exists for it.
        let updated = self
            .repository
            .update_entry_audited(entry.id, patch, audit)
            .await?;

        let absent = self
            .repository
            .create_absent_record(NewAbsentRecord {
                appointment_id: entry.id,
                marked_absent_at: now,
                grace_period_ends_at,
                auto_cancel: req.auto_cancel,
            })
            .await?;

        info!(
            entry_id = %entry.id,
            grace_period_ends_at = %grace_period_ends_at,
            skip_count = updated.skip_count,
            "patient marked absent"
        );

        self.publish(QueueEvent::PatientMarkedAbsent {
            entry: updated,
            performed_by: req.performed_by,
            grace_period_ends_at,
        });
        Ok(absent)
    }

    /// Close an absence window: the patient is back and re-seated at a
    /// fresh position. The original position is never reused.
    #[instrument(skip(self))]
    pub async fn mark_patient_returned(&self, id: Uuid, performed_by: Uuid) -> Result<QueueEntry> {
        let entry = self.repository.get_entry(id).await?;
        self.reject_terminal(&entry, "mark returned")?;

        if !entry.has_open_absence() {
            return Err(QueueError::business_rule(format!(
                "entry {id} has no open absence window to return from"
            )));
        }

        let new_position = self
            .repository
            .next_position(entry.clinic_id, entry.scheduled_date)
            .await?;
        let audit = NewOverride {
            clinic_id: entry.clinic_id,
            appointment_id: entry.id,
            action: OverrideAction::LateArrival,
            performed_by,
            reason: None,
            previous_position: Some(entry.queue_position),
            new_position: Some(new_position),
        };
        let updated = self
            .repository
            .mark_returned(id, new_position, audit)
            .await?;

        info!(
            entry_id = %id,
            previous_position = entry.queue_position,
            new_position,
            "absent patient returned"
        );

        self.publish(QueueEvent::PatientReturned {
            entry: updated.clone(),
            performed_by,
            previous_position: entry.queue_position,
            new_position,
        });
        Ok(updated)
    }

    /// Finish a consultation and record observed timings as ground truth.
    #[instrument(skip(self))]
    pub async fn complete_appointment(&self, id: Uuid, performed_by: Uuid) -> Result<QueueEntry> {
        let entry = self.repository.get_entry(id).await?;

        if entry.status == EntryStatus::Completed {
            return Err(QueueError::conflict(format!(
                "entry {id} is already completed"
            )));
        }
        if entry.status.is_terminal() {
            return Err(QueueError::business_rule(format!(
                "cannot complete entry {id}: status is {}",
                entry.status
            )));
        }

        let now = Utc::now();
        let patch = EntryPatch {
            expected_status: Some(entry.status),
            status: Some(EntryStatus::Completed),
            actual_end_time: Some(now),
            ..EntryPatch::default()
        };
        let updated = self.repository.update_entry(id, patch).await?;

        // Ground-truth labels for the estimator. Best effort: a labeling
        // outage must not fail the completion.
        if let Some(checked_in_at) = updated.checked_in_at {
            let baseline = updated
                .slot
                .map(|w| w.starts_at)
                .unwrap_or(checked_in_at);
            let wait_minutes = (checked_in_at - baseline).num_minutes().max(0);
            let service_minutes = (now - checked_in_at).num_minutes().max(0);
            if let Err(error) = self
                .repository
                .record_actual_timing(id, wait_minutes, service_minutes)
                .await
            {
                warn!(%error, entry_id = %id, "failed to record actual timing labels");
            }
        }

        info!(entry_id = %id, "appointment completed");

        self.publish(QueueEvent::StatusChanged {
            entry: updated.clone(),
            performed_by,
            previous_status: entry.status,
            reason: None,
        });
        Ok(updated)
    }

    /// Manually move an entry to a new position.
    ///
    /// Reordering to the current position is a silent success.
    #[instrument(skip(self, req), fields(entry_id = %req.entry_id, new_position = req.new_position))]
    pub async fn reorder_queue(&self, req: ReorderRequest) -> Result<QueueEntry> {
        if req.new_position < 1 {
            return Err(QueueError::validation(format!(
                "queue position must be >= 1, got {}",
                req.new_position
            )));
        }

        let entry = self.repository.get_entry(req.entry_id).await?;
        self.reject_terminal(&entry, "reorder")?;

        if entry.queue_position == req.new_position {
            debug!(entry_id = %entry.id, "reorder to current position, nothing to do");
            return Ok(entry);
        }

        let patch = EntryPatch {
            queue_position: Some(req.new_position),
            ..EntryPatch::default()
        };
        let audit = NewOverride {
            clinic_id: entry.clinic_id,
            appointment_id: entry.id,
            action: OverrideAction::Reorder,
            performed_by: req.performed_by,
            reason: req.reason.clone(),
            previous_position: Some(entry.queue_position),
            new_position: Some(req.new_position),
        };
        let updated = self
            .repository
            .update_entry_audited(entry.id, patch, audit)
            .await?;

        info!(
            entry_id = %entry.id,
            previous_position = entry.queue_position,
            new_position = req.new_position,
            "queue reordered"
        );

        self.publish(QueueEvent::QueuePositionChanged {
            entry: updated.clone(),
            performed_by: req.performed_by,
            previous_position: entry.queue_position,
            new_position: req.new_position,
        });
        Ok(updated)
    }

    /// Cancel an appointment. The repository's atomic cancel keeps
    /// position history consistent.
    #[instrument(skip(self, reason))]
    pub async fn cancel_appointment(
        &self,
        id: Uuid,
        performed_by: Uuid,
        reason: Option<String>,
    ) -> Result<QueueEntry> {
        let entry = self.repository.get_entry(id).await?;
        self.reject_terminal(&entry, "cancel")?;

        let updated = self
            .repository
            .cancel_atomic(id, performed_by, reason.clone())
            .await?;

        info!(entry_id = %id, "appointment cancelled");

        self.publish(QueueEvent::StatusChanged {
            entry: updated.clone(),
            performed_by,
            previous_status: entry.status,
            reason,
        });
        Ok(updated)
    }

    /// Store an externally produced wait-time estimate verbatim.
    #[instrument(skip(self, estimate))]
    pub async fn record_estimate(&self, id: Uuid, estimate: WaitEstimate) -> Result<QueueEntry> {
        let entry = self.repository.get_entry(id).await?;
        self.reject_terminal(&entry, "store estimate for")?;

        let patch = EntryPatch {
            estimated_wait_minutes: Some(estimate.minutes),
            prediction_mode: Some(estimate.mode),
            prediction_confidence: Some(estimate.confidence),
            ..EntryPatch::default()
        };
        self.repository.update_entry(id, patch).await
    }

    /// Ask the clinic's strategy how to re-seat a late-returning patient.
    pub async fn plan_late_arrival(
        &self,
        ctx: CallContext,
        id: Uuid,
    ) -> Result<LateArrivalDecision> {
        let entry = self.repository.get_entry(id).await?;
        let snapshot = self
            .repository
            .get_schedule(ctx.staff_id, ctx.date)
            .await?;
        let strategy = self.strategies.for_mode(snapshot.operating_mode);
        let strategy_ctx = StrategyContext {
            now: Utc::now(),
            waitlist_enabled: ctx.waitlist_enabled,
        };
        Ok(strategy.handle_late_arrival(&entry, &snapshot.entries, &strategy_ctx))
    }

    fn reject_terminal(&self, entry: &QueueEntry, action: &str) -> Result<()> {
        if entry.status.is_terminal() {
            return Err(QueueError::business_rule(format!(
                "cannot {action} entry {}: status is {}",
                entry.id, entry.status
            )));
        }
        Ok(())
    }

    /// Events are announcements, not part of the transaction: a publish
    /// failure after a committed mutation is logged, never surfaced.
    fn publish(&self, event: QueueEvent) {
        if let Err(error) = self.publisher.publish(event) {
            warn!(%error, "failed to publish queue event");
        }
    }
}
