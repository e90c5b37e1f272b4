//! Primary store contracts and file-based implementation.
//!
//! # Responsibility
//! - Define the read surface projections rebuild from (`PrimaryStore`).
//! - Own canonical track and journal entry files on disk.
//!
//! # Invariants
//! - Scan operations fail loudly: an unreadable record aborts the scan
//!   instead of silently disappearing from the result.
//! - Mutations publish exactly one domain event after their write succeeds.

mod file_store;
mod layout;

pub use file_store::{FileStore, NewTrack};
pub use layout::{is_journal_entry_id, is_track_id};

use crate::model::journal::{JournalEntry, JournalEntryId};
use crate::model::track::{Track, TrackId};
use chrono::NaiveDate;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::PathBuf;

/// Result type used by primary store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from primary store operations.
#[derive(Debug)]
pub enum StoreError {
    /// File system access failed.
    Io { path: PathBuf, source: io::Error },
    /// A record file exists but is not valid JSON for its schema.
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// No track with this id exists.
    TrackNotFound(TrackId),
    /// No journal entry with this id exists.
    JournalEntryNotFound(JournalEntryId),
    /// Track id contains characters unsafe for a directory name.
    InvalidTrackId(String),
    /// Journal entry id does not follow `YYYY/MM/DD[a-z]`.
    InvalidJournalEntryId(String),
    /// Track display name is blank after trim.
    InvalidTrackName,
    /// Every suffix for this date is already taken.
    NoFreeEntrySlot(NaiveDate),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Parse {
            path: path.into(),
            source,
        }
    }

    /// Returns true for the two single-record not-found variants.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::TrackNotFound(_) | Self::JournalEntryNotFound(_)
        )
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "i/o error at `{}`: {source}", path.display()),
            Self::Parse { path, source } => {
                write!(f, "could not parse `{}`: {source}", path.display())
            }
            Self::TrackNotFound(id) => write!(f, "track not found: {id}"),
            Self::JournalEntryNotFound(id) => write!(f, "journal entry not found: {id}"),
            Self::InvalidTrackId(id) => write!(f, "invalid track id: `{id}`"),
            Self::InvalidJournalEntryId(id) => write!(f, "invalid journal entry id: `{id}`"),
            Self::InvalidTrackName => write!(f, "track name must not be blank"),
            Self::NoFreeEntrySlot(date) => {
                write!(f, "all journal entry slots for {date} are taken")
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Read surface of the canonical record set.
///
/// Implementations must be shareable across the rebuild scan threads.
pub trait PrimaryStore: Send + Sync {
    /// Streams every track to `visit`.
    fn read_all_tracks(&self, visit: &mut dyn FnMut(Track)) -> StoreResult<()>;
    /// Loads every journal entry.
    fn read_all_journal_entries(&self) -> StoreResult<Vec<JournalEntry>>;
    /// Loads one track by id.
    fn read_track(&self, id: &str) -> StoreResult<Track>;
    /// Loads one journal entry by id.
    fn read_journal_entry(&self, id: &str) -> StoreResult<JournalEntry>;
}
