//! Read-side use-case services.
//!
//! # Responsibility
//! - Answer list, aggregate, and detail queries from projections.
//! - Touch the primary store only for single records named by a projection.
//!
//! # Invariants
//! - Range queries never scan the journal directory.
//! - Dangling track references degrade to placeholder values, never errors.

pub mod dashboard_service;
pub mod journal_list_service;
pub mod track_editor_service;
pub mod track_tree_service;

use crate::model::journal::JournalEntry;
use crate::model::track::{Track, TrackId};
use crate::projection::journal_index::SortedJournalIndex;
use crate::store::{PrimaryStore, StoreError};
use chrono::NaiveDate;
use log::warn;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result type used by service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors from read-side services.
#[derive(Debug)]
pub enum ServiceError {
    /// Range start lies after range end.
    InvalidRange { start: NaiveDate, end: NaiveDate },
    /// Track does not exist.
    TrackNotFound(TrackId),
    /// Primary store failure.
    Store(StoreError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRange { start, end } => {
                write!(f, "range start {start} is after range end {end}")
            }
            Self::TrackNotFound(id) => write!(f, "track not found: {id}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::TrackNotFound(id) => Self::TrackNotFound(id),
            other => Self::Store(other),
        }
    }
}

fn check_range(start: NaiveDate, end: NaiveDate) -> ServiceResult<()> {
    if start > end {
        return Err(ServiceError::InvalidRange { start, end });
    }
    Ok(())
}

/// Loads the entries the date index lists for `[start, end)`.
///
/// Ids the index knows but the store no longer has are skipped.
fn load_entries_between(
    store: &dyn PrimaryStore,
    index: &SortedJournalIndex,
    start: NaiveDate,
    end: NaiveDate,
) -> ServiceResult<Vec<JournalEntry>> {
    check_range(start, end)?;
    let mut entries = Vec::new();
    for id in index.find_ids_between(start, end) {
        match store.read_journal_entry(&id) {
            Ok(entry) => entries.push(entry),
            Err(StoreError::JournalEntryNotFound(_)) => {
                warn!(
                    "event=journal_entry_resolve module=service status=missing entry_id={}",
                    id
                );
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(entries)
}

/// Per-call track cache; unreadable tracks are remembered as `None`.
struct TrackCache<'a> {
    store: &'a dyn PrimaryStore,
    tracks: HashMap<TrackId, Option<Track>>,
}

impl<'a> TrackCache<'a> {
    fn new(store: &'a dyn PrimaryStore) -> Self {
        Self {
            store,
            tracks: HashMap::new(),
        }
    }

    fn resolve(&mut self, id: &str) -> Option<&Track> {
        if !self.tracks.contains_key(id) {
            let track = match self.store.read_track(id) {
                Ok(track) => Some(track),
                Err(err) => {
                    warn!(
                        "event=track_resolve module=service status=error track_id={} error={}",
                        id, err
                    );
                    None
                }
            };
            self.tracks.insert(id.to_string(), track);
        }
        self.tracks.get(id).and_then(Option::as_ref)
    }
}
