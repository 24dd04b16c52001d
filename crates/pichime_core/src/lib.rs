//! Core scheduling and actuation logic for PiChime.
//! This crate is the single source of truth for reminder and alarm invariants.

pub mod actuator;
pub mod alarm;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod schedule;
pub mod service;
pub mod unlock;

pub use actuator::{
    Actuator, ActuatorError, AudioActuator, AudioSink, DutyCycle, FilePin, LogAudioSink, LogPin,
    OutputPin, PulseActuator, SoundLibrary,
};
#[cfg(feature = "device-audio")]
pub use actuator::CpalAudioSink;
pub use alarm::{
    Announcer, Clock, ControlLoop, LogAnnouncer, LogTokenDisplay, LoopState, LoopTiming, Outputs,
    SnoozeHandle, SystemClock, TokenDisplay,
};
pub use config::{AppConfig, AudioBackend, ConfigError};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::event::{Event, EventId};
pub use model::reminder::{Reminder, ReminderId, RepeatKind, Urgency};
pub use model::ModelValidationError;
pub use repo::event_repo::{EventRepository, RepoError, RepoResult, SqliteEventRepository};
pub use repo::reminder_store::{
    DueReminder, DueSet, MalformedReminder, ReminderScan, ReminderStore,
};
pub use schedule::aggregate::{aggregate, AffectedEvent, Aggregation, AlarmState, AdvanceFailure};
pub use schedule::calendar::{advance, next_after, CalendarError};
pub use schedule::due::fetch_due;
pub use service::event_service::{
    EventOverview, EventService, EventServiceError, ListOrder, ReminderDraft, SubmitEventRequest,
};
pub use unlock::token::unlock_url;
pub use unlock::{
    FileUnlockChannel, UnlockError, UnlockOutcome, UnlockResult, UnlockSignal, UnlockToken,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
