//! Track detail use-case service.

use super::{ServiceError, ServiceResult};
use crate::model::journal::JournalEntryId;
use crate::model::track::Track;
use crate::projection::engine::ProjectionEngine;
use crate::projection::track_lookup::TrackIdLookup;
use crate::projection::track_usages::TrackUsageIndex;
use crate::store::PrimaryStore;
use serde::Serialize;
use std::sync::Arc;

/// Track record enriched with derived values for the editor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackDetails {
    #[serde(flatten)]
    pub track: Track,
    pub length: u32,
    pub usages: Vec<JournalEntryId>,
}

pub struct TrackEditorService {
    store: Arc<dyn PrimaryStore>,
    lookup: Arc<TrackIdLookup>,
    usages: Arc<TrackUsageIndex>,
}

impl TrackEditorService {
    pub fn new(
        store: Arc<dyn PrimaryStore>,
        lookup: Arc<TrackIdLookup>,
        usages: Arc<TrackUsageIndex>,
    ) -> Self {
        Self {
            store,
            lookup,
            usages,
        }
    }

    pub fn from_engine(engine: &ProjectionEngine) -> Self {
        Self::new(
            Arc::clone(engine.store()),
            Arc::clone(engine.track_lookup()),
            Arc::clone(engine.track_usages()),
        )
    }

    /// Loads one live track with its length and referencing entries.
    pub fn get_track(&self, id: &str) -> ServiceResult<TrackDetails> {
        if !self.lookup.contains(id) {
            return Err(ServiceError::TrackNotFound(id.to_string()));
        }
        let track = self.store.read_track(id)?;
        Ok(TrackDetails {
            length: track.length(),
            usages: self.usages.get_usages(id),
            track,
        })
    }
}
