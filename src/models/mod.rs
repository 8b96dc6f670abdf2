// Domain model for the queue core.

pub mod audit;
pub mod queue_entry;
pub mod requests;
pub mod waitlist;

pub use audit::{AbsentPatient, NewAbsentRecord, NewOverride, OverrideAction, QueueOverride};
pub use queue_entry::{PatientRef, PredictionMode, QueueEntry, SkipReason, TimeWindow};
pub use requests::{CallContext, EntryPatch, MarkAbsentRequest, NewAppointment, ReorderRequest};
pub use waitlist::{NewWaitlistEntry, WaitlistEntry};
