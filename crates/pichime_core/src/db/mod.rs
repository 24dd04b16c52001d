//! SQLite storage for PiChime events and their reminders.
//!
//! # Responsibility
//! - Open the one database file shared by the alarm daemon and the
//!   `add`/`list`/`withdraw` commands, creating its parent directory.
//! - Apply schema migrations in deterministic order.
//! - Report open and migration failures as [`DbError`].
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - No reminder is read or written before migrations succeed.
//! - A database newer than this build is refused rather than read.
//! - Every reminder row references an existing event (`foreign_keys=ON`).
//! - A locked database blocks a caller for at most the busy timeout, which
//!   bounds one alarm tick while a submission holds the write lock.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// Parent directory of the database file could not be created.
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::CreateDir { path, source } => write!(
                f,
                "failed to create database directory `{}`: {source}",
                path.display()
            ),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::CreateDir { source, .. } => Some(source),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
