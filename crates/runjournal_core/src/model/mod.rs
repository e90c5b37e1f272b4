//! Canonical domain model for tracks and journal entries.
//!
//! # Responsibility
//! - Define the records owned by the primary store.
//! - Keep derived values (track length, run distance) as computations, not
//!   stored fields.
//!
//! # Invariants
//! - Every track is identified by a stable `TrackId`.
//! - Every journal entry is identified by a date-derived `JournalEntryId`.

pub mod journal;
pub mod track;
