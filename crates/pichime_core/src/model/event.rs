//! Event domain model.
//!
//! # Responsibility
//! - Define the lifetime root that owns reminders.
//! - Provide soft-lock helpers used by withdrawal.
//!
//! # Invariants
//! - `uuid` is stable and never reused for another event.
//! - `is_locked` is the source of truth for withdrawal state; locking an
//!   event must also consume all of its reminders (enforced by the repository).

use super::ModelValidationError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for events.
pub type EventId = Uuid;

pub const MAX_TITLE_CHARS: usize = 120;
pub const MAX_DESCRIPTION_CHARS: usize = 500;

/// A user-submitted event that reminders point at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub uuid: EventId,
    /// Short title read out when the alarm is dismissed.
    pub title: String,
    /// Longer description read out after the title.
    pub description: String,
    /// Soft-delete marker.
    pub is_locked: bool,
}

impl Event {
    /// Creates a new active event with a generated stable ID.
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), title, description)
    }

    /// Creates an event with a caller-provided stable ID.
    pub fn with_id(
        uuid: EventId,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            uuid,
            title: title.into(),
            description: description.into(),
            is_locked: false,
        }
    }

    /// Validates title and description bounds.
    ///
    /// # Errors
    /// - `EmptyTitle` when the title is blank after trimming.
    /// - `TitleTooLong` / `DescriptionTooLong` when a bound is exceeded.
    pub fn validate(&self) -> Result<(), ModelValidationError> {
        if self.title.trim().is_empty() {
            return Err(ModelValidationError::EmptyTitle);
        }
        let title_chars = self.title.chars().count();
        if title_chars > MAX_TITLE_CHARS {
            return Err(ModelValidationError::TitleTooLong {
                max: MAX_TITLE_CHARS,
                actual: title_chars,
            });
        }
        let description_chars = self.description.chars().count();
        if description_chars > MAX_DESCRIPTION_CHARS {
            return Err(ModelValidationError::DescriptionTooLong {
                max: MAX_DESCRIPTION_CHARS,
                actual: description_chars,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Event, ModelValidationError, MAX_TITLE_CHARS};

    #[test]
    fn blank_title_is_rejected() {
        let event = Event::new("   ", "desc");
        assert_eq!(event.validate(), Err(ModelValidationError::EmptyTitle));
    }

    #[test]
    fn overlong_title_reports_char_count() {
        let event = Event::new("é".repeat(MAX_TITLE_CHARS + 1), "");
        assert!(matches!(
            event.validate(),
            Err(ModelValidationError::TitleTooLong { actual, .. }) if actual == MAX_TITLE_CHARS + 1
        ));
    }
}
