#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # CliniQ Core
//!
//! Queue scheduling engine for walk-in/appointment clinics: assigns call
//! order, calls the next patient, handles absences and late returns,
//! promotes waitlisted patients into freed slots, and records the timing
//! data later used for wait estimation.
//!
//! ## Architecture
//!
//! The [`engine::QueueEngine`] owns the appointment lifecycle and delegates
//! two decisions outward: "who is next" goes to the clinic's configured
//! [`strategy::SchedulingStrategy`] (fixed slots, fluid priority, or
//! hybrid), and storage atomicity goes to the [`repository::Repository`]
//! trait. State changes are announced through a bounded fire-and-forget
//! [`events::EventPublisher`] so a slow consumer can never block the desk.
//!
//! Persistence, authentication, notification delivery, and the wait-time
//! prediction model are external collaborators; only their interfaces
//! appear here.
//!
//! ## Module Organization
//!
//! - [`models`] - Queue entries, waitlist entries, and audit records
//! - [`state_machine`] - Lifecycle statuses and the transition table
//! - [`strategy`] - Per-clinic call-next policies
//! - [`engine`] - The queue engine orchestrator
//! - [`waitlist`] - Gap detection and standby promotion
//! - [`events`] - Typed domain events and the broadcast publisher
//! - [`repository`] - Persistence interface and in-memory reference
//! - [`estimator`] - Wait-time estimator interface
//! - [`inflight`] - Per-key read coalescing
//! - [`config`] - Environment-driven configuration
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cliniq_core::config::CoreConfig;
//! use cliniq_core::engine::QueueEngine;
//! use cliniq_core::repository::InMemoryRepository;
//!
//! # async fn example() -> cliniq_core::error::Result<()> {
//! let repository = Arc::new(InMemoryRepository::new());
//! let engine = QueueEngine::new(repository, CoreConfig::from_env()?);
//!
//! let mut updates = engine.events().subscribe();
//! // feed engine operations from the transport layer...
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod estimator;
pub mod events;
pub mod inflight;
pub mod logging;
pub mod models;
pub mod repository;
pub mod state_machine;
pub mod strategy;
pub mod waitlist;

pub use config::CoreConfig;
pub use engine::QueueEngine;
pub use error::{QueueError, Result};
pub use estimator::{DisabledEstimator, WaitEstimate, WaitTimeEstimator};
pub use events::{EventPublisher, QueueEvent};
pub use models::{
    AbsentPatient, CallContext, EntryPatch, MarkAbsentRequest, NewAppointment, NewOverride,
    NewWaitlistEntry, OverrideAction, PatientRef, PredictionMode, QueueEntry, QueueOverride,
    ReorderRequest, SkipReason, TimeWindow, WaitlistEntry,
};
pub use repository::{InMemoryRepository, Repository, ScheduleSnapshot};
pub use state_machine::{EntryStatus, LifecycleEvent, WaitlistStatus};
pub use strategy::{
    Candidate, FixedStrategy, FluidStrategy, HybridStrategy, LateArrivalDecision, LateArrivalKind,
    OperatingMode, SchedulingStrategy, StrategyContext, StrategyRegistry,
};
pub use waitlist::GapManager;
