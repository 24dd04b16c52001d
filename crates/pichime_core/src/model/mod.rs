//! Domain model for events and their reminders.
//!
//! # Responsibility
//! - Define the canonical records shared by storage, scheduling and the CLI.
//! - Provide validation and text codecs for persisted enum values.
//!
//! # Invariants
//! - Every record is identified by a stable v4 UUID.
//! - Withdrawal is a soft lock, never a hard delete.
//! - A reminder requests audio exactly when it carries an urgency.

pub mod event;
pub mod reminder;

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Validation failures for event and reminder records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelValidationError {
    EmptyTitle,
    TitleTooLong { max: usize, actual: usize },
    DescriptionTooLong { max: usize, actual: usize },
    AnchorAfterFireAt,
    UnknownUrgency(String),
    UnknownRepeatKind(String),
    InvalidTimestamp(String),
}

impl Display for ModelValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "event title cannot be empty"),
            Self::TitleTooLong { max, actual } => {
                write!(f, "event title is {actual} characters, max is {max}")
            }
            Self::DescriptionTooLong { max, actual } => {
                write!(f, "event description is {actual} characters, max is {max}")
            }
            Self::AnchorAfterFireAt => {
                write!(f, "reminder anchor_at must not be later than fire_at")
            }
            Self::UnknownUrgency(value) => write!(f, "unknown urgency `{value}`"),
            Self::UnknownRepeatKind(value) => write!(f, "unknown repeat kind `{value}`"),
            Self::InvalidTimestamp(value) => write!(f, "invalid timestamp `{value}`"),
        }
    }
}

impl Error for ModelValidationError {}
