//! Cross-process unlock channel.
//!
//! # Responsibility
//! - Let a remote collaborator cancel an alarm by presenting the most
//!   recently issued token.
//! - Keep the control loop independent of the signaling medium.
//!
//! # Invariants
//! - Active means flag set AND token non-empty.
//! - Only the most recently issued token can unlock.
//! - A rejected attempt has no side effects.

pub mod file_channel;
pub mod token;

pub use file_channel::FileUnlockChannel;
pub use token::UnlockToken;

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub type UnlockResult<T> = Result<T, UnlockError>;

#[derive(Debug)]
pub enum UnlockError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl Display for UnlockError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "unlock artifact `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for UnlockError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
        }
    }
}

/// Outcome of one remote unlock attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockOutcome {
    Unlocked,
    Rejected,
}

/// Signal shared between the control loop and a remote unlock endpoint.
pub trait UnlockSignal {
    fn read_active(&self) -> UnlockResult<bool>;

    /// Sets the active flag and issues a fresh token, replacing any
    /// previous one.
    fn activate(&self) -> UnlockResult<UnlockToken>;

    /// Clears the token, then the flag.
    fn deactivate(&self) -> UnlockResult<()>;

    /// Returns the stored token while the channel is active.
    fn current_token(&self) -> UnlockResult<Option<UnlockToken>>;

    /// Deactivates the channel iff `candidate` equals the current token.
    fn attempt_unlock(&self, candidate: &str) -> UnlockResult<UnlockOutcome> {
        let candidate = candidate.trim();
        if !token::is_well_formed(candidate) {
            return Ok(UnlockOutcome::Rejected);
        }
        let Some(current) = self.current_token()? else {
            return Ok(UnlockOutcome::Rejected);
        };
        if !current.matches(candidate) {
            return Ok(UnlockOutcome::Rejected);
        }
        self.deactivate()?;
        Ok(UnlockOutcome::Unlocked)
    }
}

impl<U: UnlockSignal + ?Sized> UnlockSignal for &U {
    fn read_active(&self) -> UnlockResult<bool> {
        (**self).read_active()
    }

    fn activate(&self) -> UnlockResult<UnlockToken> {
        (**self).activate()
    }

    fn deactivate(&self) -> UnlockResult<()> {
        (**self).deactivate()
    }

    fn current_token(&self) -> UnlockResult<Option<UnlockToken>> {
        (**self).current_token()
    }

    fn attempt_unlock(&self, candidate: &str) -> UnlockResult<UnlockOutcome> {
        (**self).attempt_unlock(candidate)
    }
}
