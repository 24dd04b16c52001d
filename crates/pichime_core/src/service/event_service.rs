//! Event submission use-case service.
//!
//! # Responsibility
//! - Validate a submitted event with all of its reminders as one unit.
//! - List visible events for display and withdraw them.
//!
//! # Invariants
//! - A submission is persisted entirely or not at all.
//! - Every reminder of a new submission fires strictly after `now`.
//! - Withdrawal never deletes rows; it soft-locks and consumes.

use crate::model::event::{Event, EventId, MAX_DESCRIPTION_CHARS, MAX_TITLE_CHARS};
use crate::model::reminder::{Reminder, RepeatKind, Urgency};
use crate::model::ModelValidationError;
use crate::repo::event_repo::{EventRepository, RepoError};
use crate::repo::reminder_store::MalformedReminder;
use chrono::NaiveDateTime;
use log::{info, warn};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// One reminder as entered on the submission form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderDraft {
    pub fire_at: NaiveDateTime,
    pub tone: bool,
    pub vibration: bool,
    pub remote_unlock: bool,
    /// `Some` requests audio at this urgency.
    pub urgency: Option<Urgency>,
    pub repeat: RepeatKind,
}

impl ReminderDraft {
    pub fn at(fire_at: NaiveDateTime) -> Self {
        Self {
            fire_at,
            tone: false,
            vibration: false,
            remote_unlock: false,
            urgency: None,
            repeat: RepeatKind::Never,
        }
    }

    fn into_reminder(self, event_uuid: EventId) -> Reminder {
        let mut reminder = Reminder::new(event_uuid, self.fire_at, self.repeat);
        reminder.tone = self.tone;
        reminder.vibration = self.vibration;
        reminder.remote_unlock = self.remote_unlock;
        reminder.urgency = self.urgency;
        reminder
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitEventRequest {
    pub title: String,
    pub description: String,
    pub reminders: Vec<ReminderDraft>,
}

#[derive(Debug)]
pub enum EventServiceError {
    /// Every problem found in the submission, in form order.
    Invalid(Vec<String>),
    Repo(RepoError),
}

impl Display for EventServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invalid(messages) => write!(f, "invalid submission: {}", messages.join("; ")),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for EventServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Invalid(_) => None,
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<RepoError> for EventServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListOrder {
    /// Latest reminder first.
    #[default]
    Desc,
    /// Earliest reminder first.
    Asc,
}

/// One visible event with its reminders, as shown in listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventOverview {
    pub event: Event,
    pub reminders: Vec<Reminder>,
    /// Stored rows of this event that could not be decoded.
    pub malformed: Vec<MalformedReminder>,
    /// Whether every reminder has already fired for the last time. Never
    /// true while a row of the event is undecodable.
    pub all_consumed: bool,
}

impl EventOverview {
    fn earliest(&self) -> Option<NaiveDateTime> {
        self.reminders.iter().map(|r| r.fire_at).min()
    }

    fn latest(&self) -> Option<NaiveDateTime> {
        self.reminders.iter().map(|r| r.fire_at).max()
    }
}

pub struct EventService<R: EventRepository> {
    repo: R,
}

impl<R: EventRepository> EventService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Validates and stores a new event with its reminders.
    ///
    /// # Errors
    /// - `Invalid` with one message per problem; reminder messages are
    ///   prefixed with their 1-based position.
    /// - `Repo` when persistence fails.
    pub fn submit(
        &self,
        request: SubmitEventRequest,
        now: NaiveDateTime,
    ) -> Result<EventId, EventServiceError> {
        let problems = validate_submission(&request, now);
        if !problems.is_empty() {
            return Err(EventServiceError::Invalid(problems));
        }

        let event = Event::new(request.title.trim(), request.description.trim());
        let reminders: Vec<Reminder> = request
            .reminders
            .into_iter()
            .map(|draft| draft.into_reminder(event.uuid))
            .collect();
        let id = self.repo.create_event(&event, &reminders)?;
        info!(
            "event=event_submit module=service status=ok event_id={id} reminders={}",
            reminders.len()
        );
        Ok(id)
    }

    /// Lists visible events with their reminders.
    pub fn list(&self, order: ListOrder) -> Result<Vec<EventOverview>, EventServiceError> {
        let mut overviews = Vec::new();
        for event in self.repo.list_events(false)? {
            let scan = self.repo.reminders_for_event(event.uuid)?;
            for malformed in &scan.malformed {
                warn!(
                    "event=event_list module=service status=malformed event_id={} reminder_id={} error={}",
                    event.uuid, malformed.reminder_id, malformed.reason
                );
            }
            let all_consumed =
                scan.malformed.is_empty() && scan.reminders.iter().all(|r| r.consumed);
            overviews.push(EventOverview {
                event,
                reminders: scan.reminders,
                malformed: scan.malformed,
                all_consumed,
            });
        }
        match order {
            ListOrder::Desc => overviews.sort_by(|a, b| b.latest().cmp(&a.latest())),
            ListOrder::Asc => overviews.sort_by_key(|o| (o.earliest().is_none(), o.earliest())),
        }
        Ok(overviews)
    }

    /// Soft-locks an event and consumes its reminders.
    pub fn withdraw(&self, id: EventId) -> Result<(), EventServiceError> {
        self.repo.lock_event(id)?;
        info!("event=event_withdraw module=service status=ok event_id={id}");
        Ok(())
    }
}

fn validate_submission(request: &SubmitEventRequest, now: NaiveDateTime) -> Vec<String> {
    let mut problems = Vec::new();

    let title = request.title.trim();
    let title_chars = title.chars().count();
    if title.is_empty() {
        problems.push(ModelValidationError::EmptyTitle.to_string());
    } else if title_chars > MAX_TITLE_CHARS {
        problems.push(
            ModelValidationError::TitleTooLong {
                max: MAX_TITLE_CHARS,
                actual: title_chars,
            }
            .to_string(),
        );
    }

    let description_chars = request.description.trim().chars().count();
    if description_chars > MAX_DESCRIPTION_CHARS {
        problems.push(
            ModelValidationError::DescriptionTooLong {
                max: MAX_DESCRIPTION_CHARS,
                actual: description_chars,
            }
            .to_string(),
        );
    }

    if request.reminders.is_empty() {
        problems.push("at least one reminder is required".to_string());
    }
    for (index, draft) in request.reminders.iter().enumerate() {
        if draft.fire_at <= now {
            problems.push(format!(
                "reminder {}: time {} is not in the future",
                index + 1,
                draft.fire_at.format("%Y-%m-%d %H:%M")
            ));
        }
    }

    problems
}
