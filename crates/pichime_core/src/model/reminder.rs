//! Reminder domain model.
//!
//! # Responsibility
//! - Define one scheduled trigger of an event and the outputs it demands.
//! - Own the text codecs for `Urgency`, `RepeatKind` and timestamps.
//!
//! # Invariants
//! - `urgency.is_some()` is the only way to request audio output.
//! - `anchor_at <= fire_at`; recurrence is computed from `anchor_at`.
//! - `consumed` reminders are never due again.

use super::event::EventId;
use super::ModelValidationError;
use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Stable identifier for reminders.
pub type ReminderId = Uuid;

/// Storage format for reminder timestamps (local civil time).
///
/// Lexicographic order of formatted values equals chronological order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Ordered severity tag selecting which audio pool to draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    NotAtAll,
    Somewhat,
    Urgent,
    Very,
    Extremely,
}

impl Urgency {
    pub const ALL: [Urgency; 5] = [
        Urgency::NotAtAll,
        Urgency::Somewhat,
        Urgency::Urgent,
        Urgency::Very,
        Urgency::Extremely,
    ];

    /// Stable storage value, also used as the sound tier directory name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotAtAll => "not_at_all",
            Self::Somewhat => "somewhat",
            Self::Urgent => "urgent",
            Self::Very => "very",
            Self::Extremely => "extremely",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|urgency| urgency.as_str() == value)
    }
}

impl Display for Urgency {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Urgency {
    type Err = ModelValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        Self::parse(&normalized)
            .ok_or_else(|| ModelValidationError::UnknownUrgency(value.to_string()))
    }
}

/// Recurrence policy controlling how `fire_at` advances after firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatKind {
    Never,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl RepeatKind {
    pub const ALL: [RepeatKind; 6] = [
        RepeatKind::Never,
        RepeatKind::Hourly,
        RepeatKind::Daily,
        RepeatKind::Weekly,
        RepeatKind::Monthly,
        RepeatKind::Yearly,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Never => "never",
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    /// Decodes a stored value. Unknown values are `None`, never a default.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }

    pub fn is_recurring(self) -> bool {
        self != Self::Never
    }
}

impl Display for RepeatKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepeatKind {
    type Err = ModelValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(&value.trim().to_ascii_lowercase())
            .ok_or_else(|| ModelValidationError::UnknownRepeatKind(value.to_string()))
    }
}

/// One scheduled trigger of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub uuid: ReminderId,
    pub event_uuid: EventId,
    /// Next time this reminder is due.
    pub fire_at: NaiveDateTime,
    /// First occurrence; recurrence arithmetic is anchored here.
    pub anchor_at: NaiveDateTime,
    pub tone: bool,
    pub vibration: bool,
    pub remote_unlock: bool,
    /// Present only when audio output is requested.
    pub urgency: Option<Urgency>,
    pub repeat: RepeatKind,
    pub consumed: bool,
}

impl Reminder {
    /// Creates a reminder with no outputs enabled.
    ///
    /// `fire_at` is truncated to whole seconds; `anchor_at` starts equal to it.
    pub fn new(event_uuid: EventId, fire_at: NaiveDateTime, repeat: RepeatKind) -> Self {
        let fire_at = truncate_to_seconds(fire_at);
        Self {
            uuid: Uuid::new_v4(),
            event_uuid,
            fire_at,
            anchor_at: fire_at,
            tone: false,
            vibration: false,
            remote_unlock: false,
            urgency: None,
            repeat,
            consumed: false,
        }
    }

    pub fn with_tone(mut self) -> Self {
        self.tone = true;
        self
    }

    pub fn with_vibration(mut self) -> Self {
        self.vibration = true;
        self
    }

    pub fn with_remote_unlock(mut self) -> Self {
        self.remote_unlock = true;
        self
    }

    pub fn with_audio(mut self, urgency: Urgency) -> Self {
        self.urgency = Some(urgency);
        self
    }

    pub fn requests_audio(&self) -> bool {
        self.urgency.is_some()
    }

    /// Returns whether firing this reminder demands any output at all.
    pub fn requests_output(&self) -> bool {
        self.tone || self.vibration || self.remote_unlock || self.requests_audio()
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        if self.anchor_at > self.fire_at {
            return Err(ModelValidationError::AnchorAfterFireAt);
        }
        Ok(())
    }
}

pub fn format_timestamp(value: NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

/// Parses a stored or user-entered timestamp.
///
/// Accepts `YYYY-MM-DD HH:MM:SS` with optional fractional seconds, and the
/// minute-precision `YYYY-MM-DD HH:MM` form used by form input.
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, ModelValidationError> {
    let trimmed = value.trim();
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M"))
        .map(truncate_to_seconds)
        .map_err(|_| ModelValidationError::InvalidTimestamp(value.to_string()))
}

fn truncate_to_seconds(value: NaiveDateTime) -> NaiveDateTime {
    value.with_nanosecond(0).unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::{format_timestamp, parse_timestamp, Reminder, RepeatKind, Urgency};
    use chrono::NaiveDate;
    use uuid::Uuid;

    #[test]
    fn urgency_order_follows_severity() {
        assert!(Urgency::NotAtAll < Urgency::Somewhat);
        assert!(Urgency::Urgent < Urgency::Extremely);
        assert_eq!(Urgency::ALL.iter().max(), Some(&Urgency::Extremely));
    }

    #[test]
    fn urgency_from_str_accepts_form_labels() {
        assert_eq!("Not at all".parse::<Urgency>().unwrap(), Urgency::NotAtAll);
        assert_eq!("URGENT".parse::<Urgency>().unwrap(), Urgency::Urgent);
        assert!("None".parse::<Urgency>().is_err());
    }

    #[test]
    fn repeat_kind_parse_rejects_unknown_values() {
        assert_eq!(RepeatKind::parse("monthly"), Some(RepeatKind::Monthly));
        assert_eq!(RepeatKind::parse("fortnightly"), None);
        assert!("Biweekly".parse::<RepeatKind>().is_err());
    }

    #[test]
    fn timestamp_codec_accepts_minute_and_fractional_forms() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(7, 30, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2024-05-01 07:30").unwrap(), expected);
        assert_eq!(
            parse_timestamp("2024-05-01 07:30:00.250000").unwrap(),
            expected
        );
        assert_eq!(format_timestamp(expected), "2024-05-01 07:30:00");
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn new_reminder_anchors_at_fire_time_and_requests_nothing() {
        let at = NaiveDate::from_ymd_opt(2024, 1, 31)
            .unwrap()
            .and_hms_milli_opt(8, 0, 0, 500)
            .unwrap();
        let reminder = Reminder::new(Uuid::new_v4(), at, RepeatKind::Monthly);
        assert_eq!(reminder.anchor_at, reminder.fire_at);
        assert_eq!(format_timestamp(reminder.fire_at), "2024-01-31 08:00:00");
        assert!(!reminder.requests_output());
        assert!(reminder.with_audio(Urgency::Very).requests_audio());
    }
}
