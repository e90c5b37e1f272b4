//! Journal entry domain model.
//!
//! # Responsibility
//! - Define the dated record of one run referencing a track.
//! - Resolve the effective run distance from laps or a custom override.
//!
//! # Invariants
//! - `id` is derived from the creation date (`YYYY/MM/DD` plus an optional
//!   collision suffix) and does not change when `date` is edited later.
//! - `track_id` may dangle after the referenced track is deleted.

use crate::model::track::TrackId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Stable journal entry identifier, e.g. `2023/01/05` or `2023/01/05a`.
pub type JournalEntryId = String;

/// Canonical journal entry record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub id: JournalEntryId,
    pub date: NaiveDate,
    pub track_id: TrackId,
    pub laps: u32,
    /// Overrides the track-derived distance when set and positive.
    pub custom_length: Option<u32>,
    pub comment: String,
    /// Free-form elapsed time, e.g. `00:42:13`.
    pub time: String,
}

impl JournalEntry {
    /// Distance of this run in meters.
    ///
    /// `track_length` is `None` when the referenced track cannot be resolved.
    pub fn effective_length(&self, track_length: Option<u32>) -> u32 {
        match self.custom_length {
            Some(custom) if custom > 0 => custom,
            _ => track_length
                .map(|length| length.saturating_mul(self.laps))
                .unwrap_or(0),
        }
    }
}

/// Input for creating a new journal entry; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJournalEntry {
    pub date: NaiveDate,
    pub track_id: TrackId,
    pub laps: u32,
    pub custom_length: Option<u32>,
    pub comment: String,
    pub time: String,
}

impl NewJournalEntry {
    pub fn new(date: NaiveDate, track_id: impl Into<TrackId>) -> Self {
        Self {
            date,
            track_id: track_id.into(),
            laps: 1,
            custom_length: None,
            comment: String::new(),
            time: String::new(),
        }
    }

    pub(crate) fn into_entry(self, id: JournalEntryId) -> JournalEntry {
        JournalEntry {
            id,
            date: self.date,
            track_id: self.track_id,
            laps: self.laps,
            custom_length: self.custom_length,
            comment: self.comment,
            time: self.time,
        }
    }
}
