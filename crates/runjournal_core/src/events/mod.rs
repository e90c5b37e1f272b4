//! Domain events and the in-process event bus.
//!
//! # Responsibility
//! - Define the closed set of notifications emitted after committed writes.
//! - Carry only the fields projection subscribers need.
//!
//! # Invariants
//! - Events are published only after the primary store write succeeded.
//! - Every event maps to exactly one `EventKind`.

mod bus;

pub use bus::{EventBus, HandlerError, HandlerResult, PublishReport};

use crate::model::journal::JournalEntryId;
use crate::model::track::TrackId;
use chrono::NaiveDate;
use std::fmt::{Display, Formatter};

/// Discriminant used as the subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    TrackUpserted,
    TrackDeleted,
    TrackMoved,
    JournalEntryUpserted,
    JournalEntryDeleted,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::TrackUpserted,
        EventKind::TrackDeleted,
        EventKind::TrackMoved,
        EventKind::JournalEntryUpserted,
        EventKind::JournalEntryDeleted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TrackUpserted => "track_upserted",
            Self::TrackDeleted => "track_deleted",
            Self::TrackMoved => "track_moved",
            Self::JournalEntryUpserted => "journal_entry_upserted",
            Self::JournalEntryDeleted => "journal_entry_deleted",
        }
    }
}

impl Display for EventKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A track was created or edited (name, parents, or waypoints).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackUpserted {
    pub id: TrackId,
    pub name: String,
    pub parents: Vec<String>,
    /// Derived route length in meters at the time of the write.
    pub length: u32,
}

/// A track was removed from the primary store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackDeleted {
    pub id: TrackId,
}

/// A track changed only its ancestor path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackMoved {
    pub id: TrackId,
    pub old_parents: Vec<String>,
    pub new_parents: Vec<String>,
}

/// A journal entry was created or edited.
///
/// `old_track_id` and `old_date` are `None` when the entry was just created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntryUpserted {
    pub id: JournalEntryId,
    pub track_id: TrackId,
    pub date: NaiveDate,
    pub old_track_id: Option<TrackId>,
    pub old_date: Option<NaiveDate>,
}

impl JournalEntryUpserted {
    /// Returns true when the edit kept the referenced track.
    pub fn keeps_track(&self) -> bool {
        self.old_track_id.as_deref() == Some(self.track_id.as_str())
    }

    /// Returns the previous date when the edit moved the entry to another day.
    pub fn moved_from(&self) -> Option<NaiveDate> {
        self.old_date.filter(|old| *old != self.date)
    }
}

/// A journal entry was removed from the primary store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntryDeleted {
    pub id: JournalEntryId,
    pub track_id: TrackId,
    pub date: NaiveDate,
}

/// Closed union of every event the primary store can emit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    TrackUpserted(TrackUpserted),
    TrackDeleted(TrackDeleted),
    TrackMoved(TrackMoved),
    JournalEntryUpserted(JournalEntryUpserted),
    JournalEntryDeleted(JournalEntryDeleted),
}

impl DomainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::TrackUpserted(_) => EventKind::TrackUpserted,
            Self::TrackDeleted(_) => EventKind::TrackDeleted,
            Self::TrackMoved(_) => EventKind::TrackMoved,
            Self::JournalEntryUpserted(_) => EventKind::JournalEntryUpserted,
            Self::JournalEntryDeleted(_) => EventKind::JournalEntryDeleted,
        }
    }

    /// Id of the record this event is about, for log lines.
    pub fn subject_id(&self) -> &str {
        match self {
            Self::TrackUpserted(event) => &event.id,
            Self::TrackDeleted(event) => &event.id,
            Self::TrackMoved(event) => &event.id,
            Self::JournalEntryUpserted(event) => &event.id,
            Self::JournalEntryDeleted(event) => &event.id,
        }
    }
}

impl From<TrackUpserted> for DomainEvent {
    fn from(value: TrackUpserted) -> Self {
        Self::TrackUpserted(value)
    }
}

impl From<TrackDeleted> for DomainEvent {
    fn from(value: TrackDeleted) -> Self {
        Self::TrackDeleted(value)
    }
}

impl From<TrackMoved> for DomainEvent {
    fn from(value: TrackMoved) -> Self {
        Self::TrackMoved(value)
    }
}

impl From<JournalEntryUpserted> for DomainEvent {
    fn from(value: JournalEntryUpserted) -> Self {
        Self::JournalEntryUpserted(value)
    }
}

impl From<JournalEntryDeleted> for DomainEvent {
    fn from(value: JournalEntryDeleted) -> Self {
        Self::JournalEntryDeleted(value)
    }
}
