//! Shared fixtures for engine-level tests: an in-memory clinic with one
//! staff member and helpers for building bookings around "now".
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use uuid::Uuid;

use cliniq_core::{
    CallContext, CoreConfig, InMemoryRepository, NewAppointment, OperatingMode, OverrideAction,
    PatientRef, QueueEngine, TimeWindow,
};

pub struct TestClinic {
    pub repo: Arc<InMemoryRepository>,
    pub engine: QueueEngine,
    pub clinic_id: Uuid,
    pub staff_id: Uuid,
    pub desk_user: Uuid,
    pub date: NaiveDate,
}

impl TestClinic {
    pub fn with_mode(mode: OperatingMode) -> Self {
        let clinic_id = Uuid::new_v4();
        let repo = Arc::new(InMemoryRepository::new());
        repo.set_clinic_mode(clinic_id, mode);
        let engine = QueueEngine::new(repo.clone(), CoreConfig::default());
        Self {
            repo,
            engine,
            clinic_id,
            staff_id: Uuid::new_v4(),
            desk_user: Uuid::new_v4(),
            date: Utc::now().date_naive(),
        }
    }

    pub fn ctx(&self, waitlist_enabled: bool) -> CallContext {
        CallContext {
            clinic_id: self.clinic_id,
            staff_id: self.staff_id,
            date: self.date,
            performed_by: self.desk_user,
            waitlist_enabled,
        }
    }

    /// A walk-in booking whose slot starts `offset_minutes` from now
    /// (negative for already-started slots). Walk-ins enter present.
    pub fn walk_in_booking(&self, offset_minutes: i64) -> NewAppointment {
        self.booking(offset_minutes, true)
    }

    /// A regular booking `minutes_ahead` in the future.
    pub fn future_booking(&self, minutes_ahead: i64) -> NewAppointment {
        assert!(minutes_ahead > 0, "regular bookings must be in the future");
        self.booking(minutes_ahead, false)
    }

    fn booking(&self, offset_minutes: i64, walk_in: bool) -> NewAppointment {
        let starts_at = Utc::now() + Duration::minutes(offset_minutes);
        NewAppointment {
            clinic_id: self.clinic_id,
            staff_id: self.staff_id,
            patient: PatientRef::Registered(Uuid::new_v4()),
            scheduled_date: self.date,
            slot: Some(TimeWindow::new(starts_at, starts_at + Duration::minutes(15)).unwrap()),
            walk_in,
            priority_score: None,
        }
    }
}

pub fn fixed_clinic() -> TestClinic {
    TestClinic::with_mode(OperatingMode::Fixed)
}

pub fn fluid_clinic() -> TestClinic {
    TestClinic::with_mode(OperatingMode::Fluid)
}

/// Count audit records of one action kind for an appointment.
pub async fn override_count(clinic: &TestClinic, entry_id: Uuid, action: OverrideAction) -> usize {
    use cliniq_core::Repository;
    clinic
        .repo
        .list_overrides(entry_id)
        .await
        .unwrap()
        .iter()
        .filter(|o| o.action == action)
        .count()
}
