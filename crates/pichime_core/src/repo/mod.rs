//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the storage contracts the alarm core and submission service use.
//! - Isolate SQLite query details from scheduling and service orchestration.
//!
//! # Invariants
//! - Write paths validate records before any SQL mutation.
//! - Read paths reject invalid persisted state instead of masking it; the due
//!   query reports undecodable rows separately so one bad row never hides
//!   the rest of a batch.

pub mod event_repo;
pub mod reminder_store;
