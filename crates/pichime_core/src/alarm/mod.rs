//! Alarm control loop and its operator-facing collaborators.
//!
//! # Responsibility
//! - Poll for due reminders and drive outputs while an alarm is active.
//! - Rotate and surface the remote unlock token.
//! - Announce affected events once when an alarm is dismissed.
//!
//! # Invariants
//! - One thread drives the loop; ticks never overlap.
//! - No tick error ends the loop.

pub mod announce;
pub mod clock;
pub mod control;

pub use announce::{Announcer, LogAnnouncer, LogTokenDisplay, TokenDisplay};
pub use clock::{Clock, SystemClock};
pub use control::{ControlLoop, LoopState, LoopTiming, Outputs, SnoozeHandle};
