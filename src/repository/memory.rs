//! # In-Memory Repository
//!
//! Reference [`Repository`] implementation backing the test suite and
//! embedded/demo deployments. Concurrency control is single-writer per
//! scope: every mutating operation serializes on a mutex keyed by
//! (clinic, date), which makes position assignment conflict-free and the
//! audit append atomic with its state mutation. Status expectations in an
//! [`EntryPatch`] are checked under the same lock, giving call-next its
//! compare-and-swap semantics.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use super::{Repository, ScheduleSnapshot};
use crate::error::{QueueError, Result};
use crate::models::{
    AbsentPatient, EntryPatch, NewAbsentRecord, NewAppointment, NewOverride, NewWaitlistEntry,
    QueueEntry, QueueOverride, TimeWindow, WaitlistEntry,
};
use crate::state_machine::EntryStatus;
use crate::strategy::OperatingMode;

type ScopeKey = (Uuid, NaiveDate);

pub struct InMemoryRepository {
    entries: DashMap<Uuid, QueueEntry>,
    waitlist: DashMap<Uuid, WaitlistEntry>,
    absences: DashMap<Uuid, Vec<AbsentPatient>>,
    overrides: RwLock<Vec<QueueOverride>>,
    timings: DashMap<Uuid, (i64, i64)>,
    modes: DashMap<Uuid, OperatingMode>,
    default_mode: OperatingMode,
    scope_locks: DashMap<ScopeKey, Arc<Mutex<()>>>,
    positions: DashMap<ScopeKey, i32>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::with_default_mode(OperatingMode::Fixed)
    }

    pub fn with_default_mode(default_mode: OperatingMode) -> Self {
        Self {
            entries: DashMap::new(),
            waitlist: DashMap::new(),
            absences: DashMap::new(),
            overrides: RwLock::new(Vec::new()),
            timings: DashMap::new(),
            modes: DashMap::new(),
            default_mode,
            scope_locks: DashMap::new(),
            positions: DashMap::new(),
        }
    }

    /// Configure the operating mode reported for one clinic's schedules.
    pub fn set_clinic_mode(&self, clinic_id: Uuid, mode: OperatingMode) {
        self.modes.insert(clinic_id, mode);
    }

    /// Recorded (wait, service) minutes for an appointment, if labeled.
    pub fn actual_timing(&self, id: Uuid) -> Option<(i64, i64)> {
        self.timings.get(&id).map(|t| *t)
    }

    fn scope_lock(&self, key: ScopeKey) -> Arc<Mutex<()>> {
        self.scope_locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Next position for a scope; caller must hold the scope lock.
    fn next_position_locked(&self, key: ScopeKey) -> i32 {
        let mut counter = self.positions.entry(key).or_insert_with(|| {
            self.entries
                .iter()
                .filter(|e| (e.clinic_id, e.scheduled_date) == key)
                .map(|e| e.queue_position)
                .max()
                .unwrap_or(0)
                + 1
        });
        let position = *counter;
        *counter += 1;
        position
    }

    /// Make room for `position` in the entry's scope by shifting any
    /// occupant at or above it; keeps positions unique without requiring
    /// contiguity. Caller must hold the scope lock.
    fn reseat_locked(&self, key: ScopeKey, entry_id: Uuid, position: i32) {
        let occupied = self.entries.iter().any(|e| {
            e.id != entry_id
                && (e.clinic_id, e.scheduled_date) == key
                && e.queue_position == position
        });
        if !occupied {
            return;
        }
        let mut shifted_max = position;
        for mut e in self.entries.iter_mut() {
            if e.id != entry_id
                && (e.clinic_id, e.scheduled_date) == key
                && e.queue_position >= position
            {
                e.queue_position += 1;
                shifted_max = shifted_max.max(e.queue_position);
            }
        }
        if let Some(mut counter) = self.positions.get_mut(&key) {
            *counter = (*counter).max(shifted_max + 1);
        }
    }

    fn insert_entry_locked(&self, dto: NewAppointment, status: EntryStatus) -> QueueEntry {
        let key = (dto.clinic_id, dto.scheduled_date);
        let now = Utc::now();
        let entry = QueueEntry {
            id: Uuid::new_v4(),
            clinic_id: dto.clinic_id,
            staff_id: dto.staff_id,
            patient: dto.patient,
            scheduled_date: dto.scheduled_date,
            slot: dto.slot,
            walk_in: dto.walk_in,
            queue_position: self.next_position_locked(key),
            status,
            is_present: dto.walk_in,
            skip_reason: None,
            skip_count: 0,
            marked_absent_at: None,
            returned_at: None,
            checked_in_at: None,
            actual_start_time: None,
            actual_end_time: None,
            priority_score: dto.priority_score,
            estimated_wait_minutes: None,
            prediction_mode: None,
            prediction_confidence: None,
            created_at: now,
            updated_at: now,
        };
        self.entries.insert(entry.id, entry.clone());
        entry
    }

    /// Apply a patch under the scope lock, honoring the CAS expectation.
    fn apply_patch_locked(&self, id: Uuid, patch: EntryPatch) -> Result<QueueEntry> {
        let mut entry = self
            .entries
            .get_mut(&id)
            .ok_or_else(|| QueueError::not_found("queue entry", id))?;

        if let Some(expected) = patch.expected_status {
            if entry.status != expected {
                return Err(QueueError::conflict(format!(
                    "entry {id} status changed concurrently: expected {expected}, found {}",
                    entry.status
                )));
            }
        }

        // An entry holds at most one open absence window.
        if let Some(Some(_)) = patch.marked_absent_at {
            if entry.has_open_absence() {
                return Err(QueueError::conflict(format!(
                    "entry {id} is already in an open absence window"
                )));
            }
        }

        if let Some(position) = patch.queue_position {
            let key = (entry.clinic_id, entry.scheduled_date);
            let entry_id = entry.id;
            // Drop the shard guard before touching other entries in reseat.
            drop(entry);
            self.reseat_locked(key, entry_id, position);
            entry = self
                .entries
                .get_mut(&id)
                .ok_or_else(|| QueueError::not_found("queue entry", id))?;
            entry.queue_position = position;
        }

        if let Some(status) = patch.status {
            entry.status = status;
        }
        if let Some(present) = patch.is_present {
            entry.is_present = present;
        }
        if let Some(skip_reason) = patch.skip_reason {
            entry.skip_reason = skip_reason;
        }
        if let Some(count) = patch.skip_count {
            entry.skip_count = count;
        }
        if let Some(at) = patch.marked_absent_at {
            entry.marked_absent_at = at;
        }
        if let Some(at) = patch.returned_at {
            entry.returned_at = at;
        }
        if let Some(at) = patch.checked_in_at {
            entry.checked_in_at = Some(at);
        }
        if let Some(at) = patch.actual_start_time {
            entry.actual_start_time = Some(at);
        }
        if let Some(at) = patch.actual_end_time {
            entry.actual_end_time = Some(at);
        }
        if let Some(score) = patch.priority_score {
            entry.priority_score = score;
        }
        if let Some(minutes) = patch.estimated_wait_minutes {
            entry.estimated_wait_minutes = Some(minutes);
        }
        if let Some(mode) = patch.prediction_mode {
            entry.prediction_mode = Some(mode);
        }
        if let Some(confidence) = patch.prediction_confidence {
            entry.prediction_confidence = Some(confidence);
        }
        entry.updated_at = Utc::now();

        Ok(entry.clone())
    }

    fn append_override_locked(&self, audit: NewOverride) -> QueueOverride {
        let record = QueueOverride {
            id: Uuid::new_v4(),
            clinic_id: audit.clinic_id,
            appointment_id: audit.appointment_id,
            action: audit.action,
            performed_by: audit.performed_by,
            reason: audit.reason,
            previous_position: audit.previous_position,
            new_position: audit.new_position,
            created_at: Utc::now(),
        };
        self.overrides.write().push(record.clone());
        record
    }

    fn entry_scope(&self, id: Uuid) -> Result<ScopeKey> {
        let entry = self
            .entries
            .get(&id)
            .ok_or_else(|| QueueError::not_found("queue entry", id))?;
        Ok((entry.clinic_id, entry.scheduled_date))
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_schedule(&self, staff_id: Uuid, date: NaiveDate) -> Result<ScheduleSnapshot> {
        let mut entries: Vec<QueueEntry> = self
            .entries
            .iter()
            .filter(|e| e.staff_id == staff_id && e.scheduled_date == date)
            .map(|e| e.clone())
            .collect();
        entries.sort_by_key(|e| e.queue_position);

        let operating_mode = entries
            .first()
            .and_then(|e| self.modes.get(&e.clinic_id).map(|m| *m))
            .unwrap_or(self.default_mode);

        Ok(ScheduleSnapshot {
            operating_mode,
            entries,
        })
    }

    async fn get_entry(&self, id: Uuid) -> Result<QueueEntry> {
        self.entries
            .get(&id)
            .map(|e| e.clone())
            .ok_or_else(|| QueueError::not_found("queue entry", id))
    }

    async fn create_entry(&self, dto: NewAppointment) -> Result<QueueEntry> {
        let lock = self.scope_lock((dto.clinic_id, dto.scheduled_date));
        let _guard = lock.lock();
        Ok(self.insert_entry_locked(dto, EntryStatus::Scheduled))
    }

    async fn update_entry(&self, id: Uuid, patch: EntryPatch) -> Result<QueueEntry> {
        let lock = self.scope_lock(self.entry_scope(id)?);
        let _guard = lock.lock();
        self.apply_patch_locked(id, patch)
    }

    async fn update_entry_audited(
        &self,
        id: Uuid,
        patch: EntryPatch,
        audit: NewOverride,
    ) -> Result<QueueEntry> {
        let lock = self.scope_lock(self.entry_scope(id)?);
        let _guard = lock.lock();
        // Patch first so a CAS failure leaves the audit log untouched.
        let entry = self.apply_patch_locked(id, patch)?;
        self.append_override_locked(audit);
        Ok(entry)
    }

    async fn next_position(&self, clinic_id: Uuid, date: NaiveDate) -> Result<i32> {
        let lock = self.scope_lock((clinic_id, date));
        let _guard = lock.lock();
        Ok(self.next_position_locked((clinic_id, date)))
    }

    async fn create_override(&self, audit: NewOverride) -> Result<QueueOverride> {
        Ok(self.append_override_locked(audit))
    }

    async fn create_absent_record(&self, record: NewAbsentRecord) -> Result<AbsentPatient> {
        let absent = AbsentPatient {
            id: Uuid::new_v4(),
            appointment_id: record.appointment_id,
            marked_absent_at: record.marked_absent_at,
            returned_at: None,
            grace_period_ends_at: record.grace_period_ends_at,
            notification_sent: false,
            auto_cancel: record.auto_cancel,
        };
        self.absences
            .entry(record.appointment_id)
            .or_default()
            .push(absent.clone());
        Ok(absent)
    }

    async fn absent_record(&self, appointment_id: Uuid) -> Result<Option<AbsentPatient>> {
        Ok(self.absences.get(&appointment_id).and_then(|records| {
            records
                .iter()
                .rev()
                .find(|r| r.returned_at.is_none())
                .cloned()
        }))
    }

    async fn mark_returned(
        &self,
        id: Uuid,
        new_position: i32,
        audit: NewOverride,
    ) -> Result<QueueEntry> {
        let lock = self.scope_lock(self.entry_scope(id)?);
        let _guard = lock.lock();

        let now = Utc::now();
        let patch = EntryPatch {
            queue_position: Some(new_position),
            status: Some(EntryStatus::Waiting),
            is_present: Some(true),
            skip_reason: Some(None),
            returned_at: Some(Some(now)),
            ..EntryPatch::default()
        };
        let entry = self.apply_patch_locked(id, patch)?;

        if let Some(mut records) = self.absences.get_mut(&id) {
            if let Some(open) = records.iter_mut().rev().find(|r| r.returned_at.is_none()) {
                open.returned_at = Some(now);
            }
        }

        self.append_override_locked(audit);
        Ok(entry)
    }

    async fn cancel_atomic(
        &self,
        id: Uuid,
        _performed_by: Uuid,
        _reason: Option<String>,
    ) -> Result<QueueEntry> {
        let lock = self.scope_lock(self.entry_scope(id)?);
        let _guard = lock.lock();

        {
            let entry = self
                .entries
                .get(&id)
                .ok_or_else(|| QueueError::not_found("queue entry", id))?;
            if entry.status.is_terminal() {
                return Err(QueueError::conflict(format!(
                    "entry {id} is already {}",
                    entry.status
                )));
            }
        }

        self.apply_patch_locked(
            id,
            EntryPatch {
                status: Some(EntryStatus::Cancelled),
                ..EntryPatch::default()
            },
        )
    }

    async fn record_actual_timing(
        &self,
        id: Uuid,
        wait_minutes: i64,
        service_minutes: i64,
    ) -> Result<()> {
        if !self.entries.contains_key(&id) {
            return Err(QueueError::not_found("queue entry", id));
        }
        self.timings.insert(id, (wait_minutes, service_minutes));
        Ok(())
    }

    async fn add_to_waitlist(&self, dto: NewWaitlistEntry) -> Result<WaitlistEntry> {
        let entry = WaitlistEntry {
            id: Uuid::new_v4(),
            clinic_id: dto.clinic_id,
            patient: dto.patient,
            requested_date: dto.requested_date,
            priority_score: dto.priority_score,
            status: crate::state_machine::WaitlistStatus::Waiting,
            created_at: Utc::now(),
        };
        self.waitlist.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn list_waitlist(&self, clinic_id: Uuid, date: NaiveDate) -> Result<Vec<WaitlistEntry>> {
        let mut entries: Vec<WaitlistEntry> = self
            .waitlist
            .iter()
            .filter(|w| w.clinic_id == clinic_id && w.requested_date == date)
            .map(|w| w.clone())
            .collect();
        entries.sort_by(|a, b| {
            b.priority_score
                .cmp(&a.priority_score)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(entries)
    }

    async fn promote_waitlist(
        &self,
        waitlist_id: Uuid,
        staff_id: Uuid,
        slot: TimeWindow,
    ) -> Result<(WaitlistEntry, QueueEntry)> {
        let scope = {
            let standby = self
                .waitlist
                .get(&waitlist_id)
                .ok_or_else(|| QueueError::not_found("waitlist entry", waitlist_id))?;
            (standby.clinic_id, standby.requested_date)
        };
        let lock = self.scope_lock(scope);
        let _guard = lock.lock();

        // Re-check under the lock: a racing promotion may have won.
        let promoted = {
            let mut standby = self
                .waitlist
                .get_mut(&waitlist_id)
                .ok_or_else(|| QueueError::not_found("waitlist entry", waitlist_id))?;
            if !standby.status.is_promotable() {
                return Err(QueueError::conflict(format!(
                    "waitlist entry {waitlist_id} is already {}",
                    standby.status
                )));
            }
            standby.status = crate::state_machine::WaitlistStatus::Promoted;
            standby.clone()
        };

        let dto = NewAppointment {
            clinic_id: promoted.clinic_id,
            staff_id,
            patient: promoted.patient,
            scheduled_date: promoted.requested_date,
            slot: Some(slot),
            walk_in: true,
            priority_score: Some(promoted.priority_score),
        };
        let entry = self.insert_entry_locked(dto, EntryStatus::Waiting);
        Ok((promoted, entry))
    }

    async fn list_overrides(&self, appointment_id: Uuid) -> Result<Vec<QueueOverride>> {
        Ok(self
            .overrides
            .read()
            .iter()
            .filter(|o| o.appointment_id == appointment_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PatientRef, TimeWindow};
    use chrono::TimeZone;

    fn booking(clinic: Uuid, staff: Uuid) -> NewAppointment {
        let starts_at = Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap();
        NewAppointment {
            clinic_id: clinic,
            staff_id: staff,
            patient: PatientRef::Registered(Uuid::new_v4()),
            scheduled_date: starts_at.date_naive(),
            slot: Some(
                TimeWindow::new(starts_at, starts_at + chrono::Duration::minutes(15)).unwrap(),
            ),
            walk_in: false,
            priority_score: None,
        }
    }

    #[tokio::test]
    async fn test_positions_unique_and_increasing() {
        let repo = InMemoryRepository::new();
        let clinic = Uuid::new_v4();
        let staff = Uuid::new_v4();

        let mut positions = Vec::new();
        for _ in 0..5 {
            let entry = repo.create_entry(booking(clinic, staff)).await.unwrap();
            positions.push(entry.queue_position);
        }

        let mut deduped = positions.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(deduped.len(), positions.len(), "positions must be unique");
    }

    #[tokio::test]
    async fn test_cas_patch_rejects_stale_expectation() {
        let repo = InMemoryRepository::new();
        let entry = repo
            .create_entry(booking(Uuid::new_v4(), Uuid::new_v4()))
            .await
            .unwrap();

        let patch = EntryPatch {
            expected_status: Some(EntryStatus::Waiting),
            status: Some(EntryStatus::InProgress),
            ..EntryPatch::default()
        };
        let err = repo.update_entry(entry.id, patch).await.unwrap_err();
        assert!(matches!(err, QueueError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_reorder_shifts_collision() {
        let repo = InMemoryRepository::new();
        let clinic = Uuid::new_v4();
        let staff = Uuid::new_v4();
        let first = repo.create_entry(booking(clinic, staff)).await.unwrap();
        let second = repo.create_entry(booking(clinic, staff)).await.unwrap();

        // Move second onto first's position; first shifts out of the way.
        let patch = EntryPatch {
            queue_position: Some(first.queue_position),
            ..EntryPatch::default()
        };
        repo.update_entry(second.id, patch).await.unwrap();

        let a = repo.get_entry(first.id).await.unwrap();
        let b = repo.get_entry(second.id).await.unwrap();
        assert_ne!(a.queue_position, b.queue_position);
        assert_eq!(b.queue_position, first.queue_position);
    }

    #[tokio::test]
    async fn test_double_promotion_conflicts() {
        let repo = InMemoryRepository::new();
        let clinic = Uuid::new_v4();
        let staff = Uuid::new_v4();
        let standby = repo
            .add_to_waitlist(NewWaitlistEntry {
                clinic_id: clinic,
                patient: PatientRef::Guest(Uuid::new_v4()),
                requested_date: booking(clinic, staff).scheduled_date,
                priority_score: 5,
            })
            .await
            .unwrap();

        let slot = booking(clinic, staff).slot.unwrap();
        let (_, entry) = repo.promote_waitlist(standby.id, staff, slot).await.unwrap();
        assert_eq!(entry.status, EntryStatus::Waiting);
        assert!(entry.is_present);

        let err = repo
            .promote_waitlist(standby.id, staff, slot)
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_standalone_emergency_override_is_append_only() {
        let repo = InMemoryRepository::new();
        let entry = repo
            .create_entry(booking(Uuid::new_v4(), Uuid::new_v4()))
            .await
            .unwrap();

        // An emergency insertion is documented without an entry mutation.
        repo.create_override(NewOverride {
            clinic_id: entry.clinic_id,
            appointment_id: entry.id,
            action: crate::models::OverrideAction::Emergency,
            performed_by: Uuid::new_v4(),
            reason: Some("triage escalation".into()),
            previous_position: Some(entry.queue_position),
            new_position: Some(1),
        })
        .await
        .unwrap();

        let log = repo.list_overrides(entry.id).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].action, crate::models::OverrideAction::Emergency);

        let untouched = repo.get_entry(entry.id).await.unwrap();
        assert_eq!(untouched.queue_position, entry.queue_position);
    }

    #[tokio::test]
    async fn test_audited_update_appends_exactly_one_record() {
        let repo = InMemoryRepository::new();
        let entry = repo
            .create_entry(booking(Uuid::new_v4(), Uuid::new_v4()))
            .await
            .unwrap();

        let audit = NewOverride {
            clinic_id: entry.clinic_id,
            appointment_id: entry.id,
            action: crate::models::OverrideAction::Reorder,
            performed_by: Uuid::new_v4(),
            reason: None,
            previous_position: Some(entry.queue_position),
            new_position: Some(9),
        };
        let patch = EntryPatch {
            queue_position: Some(9),
            ..EntryPatch::default()
        };
        repo.update_entry_audited(entry.id, patch, audit).await.unwrap();

        let log = repo.list_overrides(entry.id).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].new_position, Some(9));
    }
}
