//! Track id to ancestor path lookup.
//!
//! # Invariants
//! - Exactly one key per live track id.
//! - Renames and moves overwrite the value in place.

use super::{Projection, ProjectionState};
use crate::events::{DomainEvent, EventKind};
use crate::model::track::{Track, TrackId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Persisted state of the track lookup.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackIdMap {
    paths: BTreeMap<TrackId, Vec<String>>,
}

impl TrackIdMap {
    pub fn get(&self, id: &str) -> Option<&Vec<String>> {
        self.paths.get(id)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    fn upsert(&mut self, id: &str, parents: &[String]) -> bool {
        match self.paths.get_mut(id) {
            Some(existing) if existing.as_slice() == parents => false,
            Some(existing) => {
                *existing = parents.to_vec();
                true
            }
            None => {
                self.paths.insert(id.to_string(), parents.to_vec());
                true
            }
        }
    }
}

impl ProjectionState for TrackIdMap {
    const NAME: &'static str = "trackIdMap";
    const INTERESTS: &'static [EventKind] = &[
        EventKind::TrackUpserted,
        EventKind::TrackMoved,
        EventKind::TrackDeleted,
    ];

    fn ingest_track(&mut self, track: &Track) {
        self.upsert(&track.id, &track.parents);
    }

    fn apply(&mut self, event: &DomainEvent) -> bool {
        match event {
            DomainEvent::TrackUpserted(event) => self.upsert(&event.id, &event.parents),
            DomainEvent::TrackMoved(event) => self.upsert(&event.id, &event.new_parents),
            DomainEvent::TrackDeleted(event) => self.paths.remove(&event.id).is_some(),
            _ => false,
        }
    }
}

/// Live track id lookup.
pub type TrackIdLookup = Projection<TrackIdMap>;

impl Projection<TrackIdMap> {
    /// Current ancestor path of a live track, `None` when unknown.
    pub fn get(&self, id: &str) -> Option<Vec<String>> {
        self.read().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().get(id).is_some()
    }
}
