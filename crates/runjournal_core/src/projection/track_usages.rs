//! Reverse index from track id to the journal entries that reference it.
//!
//! # Responsibility
//! - Answer "which runs used this track" without scanning the journal.
//!
//! # Invariants
//! - A key exists for every live track, possibly with an empty list.
//! - Entries are only ever added under existing keys; dangling track
//!   references are not indexed.
//! - Each list is sorted by entry id, so replay and rebuild agree on order.
//! - Removal drops at most one occurrence of an entry id.

use super::{Projection, ProjectionState};
use crate::events::{DomainEvent, EventKind, JournalEntryUpserted};
use crate::model::journal::{JournalEntry, JournalEntryId};
use crate::model::track::{Track, TrackId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Persisted state of the usage index.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackUsageMap {
    usages: BTreeMap<TrackId, Vec<JournalEntryId>>,
}

impl TrackUsageMap {
    pub fn get_usages(&self, track_id: &str) -> &[JournalEntryId] {
        self.usages
            .get(track_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn contains_track(&self, track_id: &str) -> bool {
        self.usages.contains_key(track_id)
    }

    fn ensure_track(&mut self, track_id: &str) -> bool {
        if self.usages.contains_key(track_id) {
            return false;
        }
        self.usages.insert(track_id.to_string(), Vec::new());
        true
    }

    fn remove_one(&mut self, track_id: &str, entry_id: &str) -> bool {
        let Some(list) = self.usages.get_mut(track_id) else {
            return false;
        };
        match list.iter().position(|id| id == entry_id) {
            Some(index) => {
                list.remove(index);
                true
            }
            None => false,
        }
    }

    fn insert(&mut self, track_id: &str, entry_id: &str) -> bool {
        let Some(list) = self.usages.get_mut(track_id) else {
            return false;
        };
        let position = list
            .binary_search_by(|existing| existing.as_str().cmp(entry_id))
            .unwrap_or_else(|index| index);
        list.insert(position, entry_id.to_string());
        true
    }

    fn apply_upsert(&mut self, event: &JournalEntryUpserted) -> bool {
        if event.keeps_track() {
            return false;
        }
        let removed = event
            .old_track_id
            .as_deref()
            .is_some_and(|old| self.remove_one(old, &event.id));
        let inserted = self.insert(&event.track_id, &event.id);
        removed || inserted
    }
}

impl ProjectionState for TrackUsageMap {
    const NAME: &'static str = "trackUsages";
    const INTERESTS: &'static [EventKind] = &[
        EventKind::TrackUpserted,
        EventKind::TrackDeleted,
        EventKind::JournalEntryUpserted,
        EventKind::JournalEntryDeleted,
    ];

    fn ingest_track(&mut self, track: &Track) {
        self.ensure_track(&track.id);
    }

    fn ingest_journal_entry(&mut self, entry: &JournalEntry) {
        self.insert(&entry.track_id, &entry.id);
    }

    fn apply(&mut self, event: &DomainEvent) -> bool {
        match event {
            DomainEvent::TrackUpserted(event) => self.ensure_track(&event.id),
            DomainEvent::TrackDeleted(event) => self.usages.remove(&event.id).is_some(),
            DomainEvent::JournalEntryUpserted(event) => self.apply_upsert(event),
            DomainEvent::JournalEntryDeleted(event) => self.remove_one(&event.track_id, &event.id),
            DomainEvent::TrackMoved(_) => false,
        }
    }
}

/// Live track usage index.
pub type TrackUsageIndex = Projection<TrackUsageMap>;

impl Projection<TrackUsageMap> {
    /// Journal entry ids referencing `track_id`; empty for unknown tracks.
    pub fn get_usages(&self, track_id: &str) -> Vec<JournalEntryId> {
        self.read().get_usages(track_id).to_vec()
    }
}
