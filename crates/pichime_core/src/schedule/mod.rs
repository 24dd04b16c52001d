//! Scheduling core: recurrence arithmetic, due-set resolution and alarm
//! state aggregation.
//!
//! # Responsibility
//! - Decide which reminders fire on a given tick.
//! - Fold fired reminders into one accretive [`aggregate::AlarmState`].
//! - Re-arm or consume every fired reminder in storage.
//!
//! # Invariants
//! - Nothing in this module sleeps, spawns, or touches outputs.

pub mod aggregate;
pub mod calendar;
pub mod due;
