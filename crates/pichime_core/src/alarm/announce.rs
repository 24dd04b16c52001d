//! Event announcements and unlock token display.

use crate::schedule::aggregate::AffectedEvent;
use crate::unlock::token::unlock_url;
use crate::unlock::UnlockToken;
use log::info;

/// Speaks or otherwise presents the events of a dismissed alarm.
pub trait Announcer {
    fn announce(&self, events: &[AffectedEvent]);
}

/// Writes announcements to the log.
#[derive(Debug, Clone, Default)]
pub struct LogAnnouncer;

impl Announcer for LogAnnouncer {
    fn announce(&self, events: &[AffectedEvent]) {
        info!(
            "event=announce module=alarm status=ok message=\"You have {} events currently\"",
            events.len()
        );
        for event in events {
            info!(
                "event=announce module=alarm event_id={} title={:?} description={:?}",
                event.event_uuid, event.title, event.description
            );
        }
    }
}

/// Shows the current unlock token to the operator.
pub trait TokenDisplay {
    fn show(&self, token: &UnlockToken);
    fn clear(&self);
}

/// Logs the unlock link and the token split into display lines.
#[derive(Debug, Clone, Default)]
pub struct LogTokenDisplay {
    base_url: Option<String>,
}

impl LogTokenDisplay {
    pub fn new(base_url: Option<String>) -> Self {
        Self { base_url }
    }
}

impl TokenDisplay for LogTokenDisplay {
    fn show(&self, token: &UnlockToken) {
        if let Some(base_url) = &self.base_url {
            info!(
                "event=token_display module=alarm url={}",
                unlock_url(base_url, token)
            );
        }
        for (index, line) in token.display_lines().iter().enumerate() {
            info!("event=token_display module=alarm line={} text={line}", index + 1);
        }
    }

    fn clear(&self) {
        info!("event=token_display module=alarm status=cleared");
    }
}
