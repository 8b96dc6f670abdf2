//! # Repository Interface
//!
//! Persistence boundary consumed by the queue engine. Storage, transaction
//! scope, and consistency guarantees live behind this trait; the engine
//! relies on three contracts only:
//!
//! 1. Position assignment (`create_entry`, `next_position`) never hands the
//!    same position to two entries in one (clinic, staff, date) scope.
//! 2. A patch carrying [`EntryPatch::expected_status`] is compare-and-swap:
//!    a stale expectation fails with a conflict instead of double-applying.
//! 3. Ops that take a [`NewOverride`] commit the audit record and the state
//!    mutation together or not at all.
//!
//! How an implementation provides this (single-writer per scope, optimistic
//! versioning, serializable transactions) is its own concern. The in-memory
//! reference implementation in [`memory`] serializes each scope on a mutex.

pub mod memory;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    AbsentPatient, EntryPatch, NewAbsentRecord, NewAppointment, NewOverride, NewWaitlistEntry,
    QueueEntry, QueueOverride, TimeWindow, WaitlistEntry,
};
use crate::strategy::OperatingMode;

pub use memory::InMemoryRepository;

/// One staff member's schedule for a day, with the clinic's operating mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSnapshot {
    pub operating_mode: OperatingMode,
    pub entries: Vec<QueueEntry>,
}

#[async_trait]
pub trait Repository: Send + Sync {
    /// Load the day's schedule for a staff member, ordered by queue position.
    async fn get_schedule(&self, staff_id: Uuid, date: NaiveDate) -> Result<ScheduleSnapshot>;

    async fn get_entry(&self, id: Uuid) -> Result<QueueEntry>;

    /// Persist a new entry; the repository assigns the definitive queue
    /// position and identity.
    async fn create_entry(&self, dto: NewAppointment) -> Result<QueueEntry>;

    /// Apply a sparse patch. Honors `expected_status` as CAS.
    async fn update_entry(&self, id: Uuid, patch: EntryPatch) -> Result<QueueEntry>;

    /// Apply a patch and append its audit record atomically.
    async fn update_entry_audited(
        &self,
        id: Uuid,
        patch: EntryPatch,
        audit: NewOverride,
    ) -> Result<QueueEntry>;

    /// Next free queue position for the clinic/date scope.
    async fn next_position(&self, clinic_id: Uuid, date: NaiveDate) -> Result<i32>;

    /// Append a standalone audit record (emergency/manual interventions
    /// documented without an accompanying entry mutation).
    async fn create_override(&self, audit: NewOverride) -> Result<QueueOverride>;

    async fn create_absent_record(&self, record: NewAbsentRecord) -> Result<AbsentPatient>;

    /// The open absence record for an appointment, if any.
    async fn absent_record(&self, appointment_id: Uuid) -> Result<Option<AbsentPatient>>;

    /// Close the absence window and re-seat the entry at `new_position`,
    /// appending the audit record in the same commit.
    async fn mark_returned(
        &self,
        id: Uuid,
        new_position: i32,
        audit: NewOverride,
    ) -> Result<QueueEntry>;

    /// Atomic cancellation: status flip, history, and audit in one commit.
    async fn cancel_atomic(
        &self,
        id: Uuid,
        performed_by: Uuid,
        reason: Option<String>,
    ) -> Result<QueueEntry>;

    /// Store observed wait/service durations as training labels.
    async fn record_actual_timing(
        &self,
        id: Uuid,
        wait_minutes: i64,
        service_minutes: i64,
    ) -> Result<()>;

    async fn add_to_waitlist(&self, dto: NewWaitlistEntry) -> Result<WaitlistEntry>;

    /// Standby entries for a clinic/date, descending priority, FIFO ties.
    async fn list_waitlist(&self, clinic_id: Uuid, date: NaiveDate) -> Result<Vec<WaitlistEntry>>;

    /// Convert a waitlist entry into a queue entry occupying `slot` under
    /// `staff_id`. Must be atomic with respect to concurrent promotions of
    /// the same entry: exactly one caller wins, the rest get a conflict.
    async fn promote_waitlist(
        &self,
        waitlist_id: Uuid,
        staff_id: Uuid,
        slot: TimeWindow,
    ) -> Result<(WaitlistEntry, QueueEntry)>;

    /// Audit trail for an appointment, append-ordered.
    async fn list_overrides(&self, appointment_id: Uuid) -> Result<Vec<QueueOverride>>;
}
