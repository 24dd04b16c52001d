//! Alarm state aggregation.
//!
//! # Responsibility
//! - OR the output demands of all due reminders into one [`AlarmState`].
//! - Re-arm recurring reminders and consume one-shot reminders.
//!
//! # Invariants
//! - [`AlarmState::merge`] is commutative, associative and idempotent.
//! - Merging never clears a demand; only [`AlarmState::reset`] does.
//! - One reminder failing to persist never stops the rest of the batch.

use super::calendar::{next_after, CalendarError};
use crate::model::event::EventId;
use crate::model::reminder::{ReminderId, RepeatKind, Urgency};
use crate::repo::event_repo::RepoError;
use crate::repo::reminder_store::{DueReminder, ReminderStore};
use chrono::NaiveDateTime;
use log::{error, info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};

/// Title and description announced once when an alarm episode ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffectedEvent {
    pub event_uuid: EventId,
    pub title: String,
    pub description: String,
}

/// Merged output demand of every reminder fired in the current episode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlarmState {
    pub tone: bool,
    pub vibration: bool,
    pub remote_unlock_requested: bool,
    pub urgencies: BTreeSet<Urgency>,
    pub affected_events: BTreeMap<EventId, AffectedEvent>,
}

impl AlarmState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one due reminder's demands into this state.
    pub fn absorb(&mut self, due: &DueReminder) {
        let reminder = &due.reminder;
        self.tone |= reminder.tone;
        self.vibration |= reminder.vibration;
        self.remote_unlock_requested |= reminder.remote_unlock;
        if let Some(urgency) = reminder.urgency {
            self.urgencies.insert(urgency);
        }
        self.affected_events
            .entry(due.event_uuid())
            .or_insert_with(|| AffectedEvent {
                event_uuid: due.event_uuid(),
                title: due.event_title.clone(),
                description: due.event_description.clone(),
            });
    }

    pub fn merge(&mut self, other: AlarmState) {
        self.tone |= other.tone;
        self.vibration |= other.vibration;
        self.remote_unlock_requested |= other.remote_unlock_requested;
        self.urgencies.extend(other.urgencies);
        for (event_uuid, event) in other.affected_events {
            self.affected_events.entry(event_uuid).or_insert(event);
        }
    }

    /// Whether any output is demanded.
    pub fn is_alarming(&self) -> bool {
        self.tone || self.vibration || self.remote_unlock_requested || !self.urgencies.is_empty()
    }

    /// Audio target: the highest requested urgency.
    pub fn max_urgency(&self) -> Option<Urgency> {
        self.urgencies.last().copied()
    }

    pub fn affected_events(&self) -> Vec<AffectedEvent> {
        self.affected_events.values().cloned().collect()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Why one fired reminder could not be re-armed.
#[derive(Debug)]
pub enum AdvanceFailure {
    /// The next occurrence could not be computed; the row is left untouched.
    Calendar {
        reminder_id: ReminderId,
        error: CalendarError,
    },
    /// The update could not be written.
    Persist {
        reminder_id: ReminderId,
        error: RepoError,
    },
}

impl Display for AdvanceFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Calendar { reminder_id, error } => {
                write!(f, "reminder {reminder_id}: {error}")
            }
            Self::Persist { reminder_id, error } => {
                write!(f, "reminder {reminder_id}: persist failed: {error}")
            }
        }
    }
}

/// Result of aggregating one due batch.
#[derive(Debug, Default)]
pub struct Aggregation {
    pub state: AlarmState,
    /// Recurring reminders re-armed to a later `fire_at`.
    pub rearmed: usize,
    /// One-shot reminders marked consumed.
    pub consumed: usize,
    pub failures: Vec<AdvanceFailure>,
}

/// Merges `due` into a fresh [`AlarmState`] and persists each reminder's
/// next schedule.
///
/// A `Never` reminder is consumed in place. A recurring reminder moves to
/// its first anchored occurrence after `max(fire_at, now)`.
pub fn aggregate<S: ReminderStore + ?Sized>(
    store: &S,
    due: &[DueReminder],
    now: NaiveDateTime,
) -> Aggregation {
    let mut aggregation = Aggregation::default();

    for item in due {
        aggregation.state.absorb(item);

        let reminder = &item.reminder;
        let (fire_at, consumed) = match reminder.repeat {
            RepeatKind::Never => (reminder.fire_at, true),
            kind => {
                let after = reminder.fire_at.max(now);
                match next_after(reminder.anchor_at, kind, after) {
                    Ok(next) => (next, false),
                    Err(error) => {
                        warn!(
                            "event=reminder_advance module=schedule status=error error_code=calendar reminder_id={} error={error}",
                            reminder.uuid
                        );
                        aggregation.failures.push(AdvanceFailure::Calendar {
                            reminder_id: reminder.uuid,
                            error,
                        });
                        continue;
                    }
                }
            }
        };

        match store.update_schedule(reminder.uuid, fire_at, consumed) {
            Ok(()) if consumed => aggregation.consumed += 1,
            Ok(()) => aggregation.rearmed += 1,
            Err(error) => {
                error!(
                    "event=reminder_advance module=schedule status=error error_code=persist_failed reminder_id={} error={error}",
                    reminder.uuid
                );
                aggregation.failures.push(AdvanceFailure::Persist {
                    reminder_id: reminder.uuid,
                    error,
                });
            }
        }
    }

    info!(
        "event=aggregate module=schedule status=ok due={} rearmed={} consumed={} failed={}",
        due.len(),
        aggregation.rearmed,
        aggregation.consumed,
        aggregation.failures.len()
    );
    aggregation
}

#[cfg(test)]
mod tests {
    use super::AlarmState;
    use crate::model::reminder::{Reminder, RepeatKind, Urgency};
    use crate::repo::reminder_store::DueReminder;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn due(event: Uuid, title: &str, build: impl FnOnce(Reminder) -> Reminder) -> DueReminder {
        let fire_at = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        DueReminder {
            reminder: build(Reminder::new(event, fire_at, RepeatKind::Never)),
            event_title: title.to_string(),
            event_description: String::new(),
        }
    }

    fn state_of(items: &[DueReminder]) -> AlarmState {
        let mut state = AlarmState::new();
        for item in items {
            state.absorb(item);
        }
        state
    }

    #[test]
    fn empty_state_is_not_alarming() {
        let state = AlarmState::new();
        assert!(!state.is_alarming());
        assert_eq!(state.max_urgency(), None);
    }

    #[test]
    fn absorb_is_order_independent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let items = vec![
            due(a, "meds", |r| r.with_tone()),
            due(b, "bins", |r| r.with_audio(Urgency::Very)),
            due(a, "meds", |r| r.with_audio(Urgency::Somewhat).with_remote_unlock()),
        ];
        let mut reversed = items.clone();
        reversed.reverse();

        let forward = state_of(&items);
        assert_eq!(forward, state_of(&reversed));
        assert!(forward.tone);
        assert!(!forward.vibration);
        assert!(forward.remote_unlock_requested);
        assert_eq!(forward.max_urgency(), Some(Urgency::Very));
        assert_eq!(forward.affected_events.len(), 2);
    }

    #[test]
    fn merge_is_idempotent_and_never_clears_demands() {
        let event = Uuid::new_v4();
        let mut state = state_of(&[due(event, "walk", |r| r.with_vibration())]);
        let snapshot = state.clone();

        state.merge(snapshot.clone());
        assert_eq!(state, snapshot);

        state.merge(AlarmState::new());
        assert_eq!(state, snapshot);

        let quiet = state_of(&[due(Uuid::new_v4(), "quiet", |r| r)]);
        state.merge(quiet);
        assert!(state.vibration);
        assert_eq!(state.affected_events.len(), 2);
    }

    #[test]
    fn merge_is_commutative() {
        let left = state_of(&[due(Uuid::new_v4(), "a", |r| r.with_tone())]);
        let right = state_of(&[due(Uuid::new_v4(), "b", |r| r.with_audio(Urgency::Urgent))]);

        let mut lr = left.clone();
        lr.merge(right.clone());
        let mut rl = right;
        rl.merge(left);
        assert_eq!(lr, rl);
    }

    #[test]
    fn reset_restores_defaults() {
        let mut state = state_of(&[due(Uuid::new_v4(), "x", |r| {
            r.with_tone().with_audio(Urgency::Extremely)
        })]);
        state.reset();
        assert_eq!(state, AlarmState::default());
    }
}
