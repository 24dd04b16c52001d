//! Due-set resolution.
//!
//! Reads the due set without mutating it and makes the three outcomes of a
//! poll distinguishable in logs: nothing due, rows due (some possibly
//! malformed), or storage unavailable.

use crate::repo::event_repo::RepoResult;
use crate::repo::reminder_store::{DueSet, ReminderStore};
use chrono::NaiveDateTime;
use log::{debug, error, warn};

/// Returns every due reminder at `now`.
///
/// Malformed rows are logged on every call and handed back in
/// [`DueSet::malformed`]; they stay untouched in storage.
pub fn fetch_due<S: ReminderStore + ?Sized>(store: &S, now: NaiveDateTime) -> RepoResult<DueSet> {
    match store.fetch_due(now) {
        Ok(due) => {
            for malformed in &due.malformed {
                warn!(
                    "event=due_fetch module=schedule status=malformed reminder_id={} error={}",
                    malformed.reminder_id, malformed.reason
                );
            }
            debug!(
                "event=due_fetch module=schedule status={} due={} malformed={}",
                if due.is_empty() { "empty" } else { "ok" },
                due.reminders.len(),
                due.malformed.len()
            );
            Ok(due)
        }
        Err(err) => {
            error!(
                "event=due_fetch module=schedule status=error error_code=storage_unavailable error={err}"
            );
            Err(err)
        }
    }
}
