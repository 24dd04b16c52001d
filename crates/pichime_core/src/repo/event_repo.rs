//! Event/reminder repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide create/list/withdraw APIs over `events` and `reminders`.
//! - Implement [`ReminderStore`] for the alarm core.
//!
//! # Invariants
//! - An event and its reminders are inserted in one transaction.
//! - Withdrawing an event consumes all of its reminders in the same
//!   transaction.
//! - Timestamps are stored as `TIMESTAMP_FORMAT` text so that SQL string
//!   comparison matches chronological order.

use super::reminder_store::{
    DueReminder, DueSet, MalformedReminder, ReminderScan, ReminderStore,
};
use crate::db::DbError;
use crate::model::event::{Event, EventId};
use crate::model::reminder::{
    format_timestamp, parse_timestamp, Reminder, ReminderId, RepeatKind, Urgency,
};
use crate::model::ModelValidationError;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Row, Rows, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const REMINDER_COLUMNS: &str = "r.uuid AS uuid,
    r.event_uuid AS event_uuid,
    r.fire_at AS fire_at,
    r.anchor_at AS anchor_at,
    r.tone AS tone,
    r.vibration AS vibration,
    r.remote_unlock AS remote_unlock,
    r.urgency AS urgency,
    r.repeat_kind AS repeat_kind,
    r.consumed AS consumed";

const EVENT_SELECT_SQL: &str = "SELECT uuid, title, description, is_locked FROM events";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for event and reminder persistence.
#[derive(Debug)]
pub enum RepoError {
    Validation(ModelValidationError),
    Db(DbError),
    NotFound(Uuid),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "record not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<ModelValidationError> for RepoError {
    fn from(value: ModelValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface used by the event submission service.
pub trait EventRepository {
    /// Inserts one event and all of its reminders atomically.
    fn create_event(&self, event: &Event, reminders: &[Reminder]) -> RepoResult<EventId>;
    fn get_event(&self, id: EventId, include_locked: bool) -> RepoResult<Option<Event>>;
    fn list_events(&self, include_locked: bool) -> RepoResult<Vec<Event>>;
    fn reminders_for_event(&self, id: EventId) -> RepoResult<ReminderScan>;
    /// Soft-locks the event and consumes its reminders. Idempotent.
    fn lock_event(&self, id: EventId) -> RepoResult<()>;
}

/// SQLite-backed event and reminder repository.
pub struct SqliteEventRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEventRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl EventRepository for SqliteEventRepository<'_> {
    fn create_event(&self, event: &Event, reminders: &[Reminder]) -> RepoResult<EventId> {
        event.validate()?;
        for reminder in reminders {
            reminder.validate()?;
            if reminder.event_uuid != event.uuid {
                return Err(RepoError::InvalidData(format!(
                    "reminder {} belongs to event {}, not {}",
                    reminder.uuid, reminder.event_uuid, event.uuid
                )));
            }
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO events (uuid, title, description, is_locked)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                event.uuid.to_string(),
                event.title.as_str(),
                event.description.as_str(),
                bool_to_int(event.is_locked),
            ],
        )?;
        for reminder in reminders {
            insert_reminder(&tx, reminder)?;
        }
        tx.commit()?;

        Ok(event.uuid)
    }

    fn get_event(&self, id: EventId, include_locked: bool) -> RepoResult<Option<Event>> {
        let mut stmt = self.conn.prepare(&format!(
            "{EVENT_SELECT_SQL}
             WHERE uuid = ?1
               AND (?2 = 1 OR is_locked = 0);"
        ))?;
        let mut rows = stmt.query(params![id.to_string(), bool_to_int(include_locked)])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_event_row(row)?));
        }
        Ok(None)
    }

    fn list_events(&self, include_locked: bool) -> RepoResult<Vec<Event>> {
        let mut stmt = self.conn.prepare(&format!(
            "{EVENT_SELECT_SQL}
             WHERE (?1 = 1 OR is_locked = 0)
             ORDER BY created_at ASC, uuid ASC;"
        ))?;
        let mut rows = stmt.query([bool_to_int(include_locked)])?;
        let mut events = Vec::new();
        while let Some(row) = rows.next()? {
            events.push(parse_event_row(row)?);
        }
        Ok(events)
    }

    fn reminders_for_event(&self, id: EventId) -> RepoResult<ReminderScan> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {REMINDER_COLUMNS}
             FROM reminders r
             WHERE r.event_uuid = ?1
             ORDER BY r.fire_at ASC, r.uuid ASC;"
        ))?;
        let mut rows = stmt.query([id.to_string()])?;
        scan_reminders(&mut rows)
    }

    fn lock_event(&self, id: EventId) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE events SET is_locked = 1 WHERE uuid = ?1;",
            [id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        tx.execute(
            "UPDATE reminders
             SET consumed = 1,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE event_uuid = ?1;",
            [id.to_string()],
        )?;
        tx.commit()?;
        Ok(())
    }
}

impl ReminderStore for SqliteEventRepository<'_> {
    fn fetch_due(&self, now: NaiveDateTime) -> RepoResult<DueSet> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {REMINDER_COLUMNS}, e.title AS title, e.description AS description
             FROM reminders r
             JOIN events e ON e.uuid = r.event_uuid
             WHERE r.consumed = 0
               AND e.is_locked = 0
               AND r.fire_at <= ?1;"
        ))?;
        let mut rows = stmt.query([format_timestamp(now)])?;
        let mut due = DueSet::default();

        while let Some(row) = rows.next()? {
            match parse_reminder_row(row) {
                Ok(reminder) => due.reminders.push(DueReminder {
                    reminder,
                    event_title: row.get("title")?,
                    event_description: row.get("description")?,
                }),
                Err(err) => due.malformed.push(malformed_row(row, &err)),
            }
        }

        Ok(due)
    }

    fn update_schedule(
        &self,
        id: ReminderId,
        fire_at: NaiveDateTime,
        consumed: bool,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE reminders
             SET fire_at = ?1,
                 consumed = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?3;",
            params![format_timestamp(fire_at), bool_to_int(consumed), id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn list_reminders(&self) -> RepoResult<ReminderScan> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {REMINDER_COLUMNS}
             FROM reminders r
             ORDER BY r.fire_at ASC, r.uuid ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        scan_reminders(&mut rows)
    }
}

fn insert_reminder(tx: &Transaction<'_>, reminder: &Reminder) -> RepoResult<()> {
    tx.execute(
        "INSERT INTO reminders (
            uuid,
            event_uuid,
            fire_at,
            anchor_at,
            tone,
            vibration,
            remote_unlock,
            urgency,
            repeat_kind,
            consumed
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
        params![
            reminder.uuid.to_string(),
            reminder.event_uuid.to_string(),
            format_timestamp(reminder.fire_at),
            format_timestamp(reminder.anchor_at),
            bool_to_int(reminder.tone),
            bool_to_int(reminder.vibration),
            bool_to_int(reminder.remote_unlock),
            reminder.urgency.map(Urgency::as_str),
            reminder.repeat.as_str(),
            bool_to_int(reminder.consumed),
        ],
    )?;
    Ok(())
}

fn scan_reminders(rows: &mut Rows<'_>) -> RepoResult<ReminderScan> {
    let mut scan = ReminderScan::default();
    while let Some(row) = rows.next()? {
        match parse_reminder_row(row) {
            Ok(reminder) => scan.reminders.push(reminder),
            Err(err) => scan.malformed.push(malformed_row(row, &err)),
        }
    }
    Ok(scan)
}

/// Row decoding only reads values, so a decode failure is a data error
/// scoped to that row. Storage failures surface from `Rows::next` instead.
fn malformed_row(row: &Row<'_>, err: &RepoError) -> MalformedReminder {
    MalformedReminder {
        reminder_id: row
            .get::<_, String>("uuid")
            .unwrap_or_else(|_| "<unreadable>".to_string()),
        reason: err.to_string(),
    }
}

fn parse_event_row(row: &Row<'_>) -> RepoResult<Event> {
    let uuid_text: String = row.get("uuid")?;
    Ok(Event {
        uuid: parse_uuid(&uuid_text, "events.uuid")?,
        title: row.get("title")?,
        description: row.get("description")?,
        is_locked: parse_bool(row.get("is_locked")?, "events.is_locked")?,
    })
}

fn parse_reminder_row(row: &Row<'_>) -> RepoResult<Reminder> {
    let uuid_text: String = row.get("uuid")?;
    let event_text: String = row.get("event_uuid")?;

    let repeat_text: String = row.get("repeat_kind")?;
    let repeat = RepeatKind::parse(&repeat_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid repeat kind `{repeat_text}` in reminders.repeat_kind"
        ))
    })?;

    let urgency = match row.get::<_, Option<String>>("urgency")? {
        Some(value) => Some(Urgency::parse(&value).ok_or_else(|| {
            RepoError::InvalidData(format!("invalid urgency `{value}` in reminders.urgency"))
        })?),
        None => None,
    };

    let reminder = Reminder {
        uuid: parse_uuid(&uuid_text, "reminders.uuid")?,
        event_uuid: parse_uuid(&event_text, "reminders.event_uuid")?,
        fire_at: parse_timestamp_column(row, "fire_at")?,
        anchor_at: parse_timestamp_column(row, "anchor_at")?,
        tone: parse_bool(row.get("tone")?, "reminders.tone")?,
        vibration: parse_bool(row.get("vibration")?, "reminders.vibration")?,
        remote_unlock: parse_bool(row.get("remote_unlock")?, "reminders.remote_unlock")?,
        urgency,
        repeat,
        consumed: parse_bool(row.get("consumed")?, "reminders.consumed")?,
    };
    reminder
        .validate()
        .map_err(|err| RepoError::InvalidData(format!("reminder {}: {err}", reminder.uuid)))?;
    Ok(reminder)
}

fn parse_timestamp_column(row: &Row<'_>, column: &'static str) -> RepoResult<NaiveDateTime> {
    let value: String = row.get(column)?;
    parse_timestamp(&value).map_err(|_| {
        RepoError::InvalidData(format!("invalid timestamp `{value}` in reminders.{column}"))
    })
}

fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

fn parse_bool(value: i64, column: &'static str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean `{other}` in {column}"
        ))),
    }
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
