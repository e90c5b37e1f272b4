//! Journal list use-case service.
//!
//! # Invariants
//! - Items come back ordered by date, then id.
//! - A track that cannot be read yields `track_error = true` and the
//!   placeholder name instead of failing the list.

use super::{load_entries_between, ServiceResult, TrackCache};
use crate::model::journal::JournalEntryId;
use crate::projection::engine::ProjectionEngine;
use crate::projection::journal_index::SortedJournalIndex;
use crate::store::PrimaryStore;
use chrono::NaiveDate;
use log::debug;
use serde::Serialize;
use std::sync::Arc;

/// Display name used for entries whose track cannot be resolved.
pub const UNKNOWN_TRACK_NAME: &str = "unknown track";

/// One row of the journal list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalListItem {
    pub id: JournalEntryId,
    pub date: NaiveDate,
    pub track_name: String,
    pub track_error: bool,
    /// Run distance in meters.
    pub length: u32,
}

pub struct JournalListService {
    store: Arc<dyn PrimaryStore>,
    index: Arc<SortedJournalIndex>,
}

impl JournalListService {
    pub fn new(store: Arc<dyn PrimaryStore>, index: Arc<SortedJournalIndex>) -> Self {
        Self { store, index }
    }

    pub fn from_engine(engine: &ProjectionEngine) -> Self {
        Self::new(
            Arc::clone(engine.store()),
            Arc::clone(engine.journal_index()),
        )
    }

    /// Lists entries dated within `[start, end)`.
    pub fn list_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ServiceResult<Vec<JournalListItem>> {
        let entries = load_entries_between(self.store.as_ref(), &self.index, start, end)?;
        let mut tracks = TrackCache::new(self.store.as_ref());
        let mut items: Vec<JournalListItem> = entries
            .into_iter()
            .map(|entry| {
                let (track_name, track_error, track_length) = match tracks.resolve(&entry.track_id)
                {
                    Some(track) => (track.name.clone(), false, Some(track.length())),
                    None => (UNKNOWN_TRACK_NAME.to_string(), true, None),
                };
                JournalListItem {
                    length: entry.effective_length(track_length),
                    id: entry.id,
                    date: entry.date,
                    track_name,
                    track_error,
                }
            })
            .collect();
        items.sort_by(|left, right| (left.date, &left.id).cmp(&(right.date, &right.id)));

        debug!(
            "event=journal_list module=service status=ok start={} end={} count={}",
            start,
            end,
            items.len()
        );
        Ok(items)
    }
}
