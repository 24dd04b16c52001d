//! Storage contract consumed by the alarm core.
//!
//! The scheduler calls exactly three things on storage: list the due
//! reminders, write back one reminder's schedule, and read everything for
//! startup diagnostics.
//!
//! Every listing returns undecodable rows next to the decoded ones, so a
//! single bad row is a data error on that row and never a failed read.

use super::event_repo::RepoResult;
use crate::model::event::EventId;
use crate::model::reminder::{Reminder, ReminderId};
use chrono::NaiveDateTime;
use serde::Serialize;

/// A due reminder joined with the fields of its owning event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueReminder {
    pub reminder: Reminder,
    pub event_title: String,
    pub event_description: String,
}

impl DueReminder {
    pub fn event_uuid(&self) -> EventId {
        self.reminder.event_uuid
    }
}

/// A stored row that could not be decoded into a [`Reminder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MalformedReminder {
    /// Raw `reminders.uuid` value.
    pub reminder_id: String,
    pub reason: String,
}

/// Result of one due-set query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DueSet {
    pub reminders: Vec<DueReminder>,
    pub malformed: Vec<MalformedReminder>,
}

impl DueSet {
    pub fn is_empty(&self) -> bool {
        self.reminders.is_empty() && self.malformed.is_empty()
    }
}

/// Decoded reminders of one listing and the rows that failed to decode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReminderScan {
    pub reminders: Vec<Reminder>,
    pub malformed: Vec<MalformedReminder>,
}

/// Reminder persistence used by the due-set resolver and the aggregator.
pub trait ReminderStore {
    /// Lists non-consumed reminders of unlocked events with `fire_at <= now`.
    fn fetch_due(&self, now: NaiveDateTime) -> RepoResult<DueSet>;

    /// Persists the outcome of firing one reminder.
    fn update_schedule(
        &self,
        id: ReminderId,
        fire_at: NaiveDateTime,
        consumed: bool,
    ) -> RepoResult<()>;

    /// Lists every reminder, consumed or not.
    fn list_reminders(&self) -> RepoResult<ReminderScan>;
}

impl<S: ReminderStore + ?Sized> ReminderStore for &S {
    fn fetch_due(&self, now: NaiveDateTime) -> RepoResult<DueSet> {
        (**self).fetch_due(now)
    }

    fn update_schedule(
        &self,
        id: ReminderId,
        fire_at: NaiveDateTime,
        consumed: bool,
    ) -> RepoResult<()> {
        (**self).update_schedule(id, fire_at, consumed)
    }

    fn list_reminders(&self) -> RepoResult<ReminderScan> {
        (**self).list_reminders()
    }
}
