//! Date-ordered secondary index over journal entry ids.
//!
//! # Responsibility
//! - Answer date range queries without scanning the journal directory.
//!
//! # Invariants
//! - Each live entry id is referenced exactly once, under its current date.
//! - Empty day, month, and year levels are removed.
//! - Range bounds are `[start, end)`.

use super::{Projection, ProjectionState};
use crate::events::{DomainEvent, EventKind, JournalEntryUpserted};
use crate::model::journal::{JournalEntry, JournalEntryId};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

type Days = BTreeMap<u32, BTreeSet<JournalEntryId>>;
type Months = BTreeMap<u32, Days>;

/// Persisted state of the journal index: year, month, day, then ids.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JournalDateTree {
    years: BTreeMap<i32, Months>,
}

impl JournalDateTree {
    /// Ids of entries dated within `[start, end)`, ascending by date and id.
    pub fn find_ids_between(&self, start: NaiveDate, end: NaiveDate) -> Vec<JournalEntryId> {
        let mut result = Vec::new();
        if start >= end {
            return result;
        }
        for (&year, months) in self.years.range(start.year()..=end.year()) {
            for (&month, days) in months {
                for (&day, ids) in days {
                    let Some(date) = NaiveDate::from_ymd_opt(year, month, day) else {
                        continue;
                    };
                    if date >= start && date < end {
                        result.extend(ids.iter().cloned());
                    }
                }
            }
        }
        result
    }

    /// Number of referenced ids.
    pub fn len(&self) -> usize {
        self.years
            .values()
            .flat_map(BTreeMap::values)
            .flat_map(BTreeMap::values)
            .map(BTreeSet::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    fn insert(&mut self, date: NaiveDate, id: &str) -> bool {
        self.years
            .entry(date.year())
            .or_default()
            .entry(date.month())
            .or_default()
            .entry(date.day())
            .or_default()
            .insert(id.to_string())
    }

    fn remove(&mut self, date: NaiveDate, id: &str) -> bool {
        let Some(months) = self.years.get_mut(&date.year()) else {
            return false;
        };
        let Some(days) = months.get_mut(&date.month()) else {
            return false;
        };
        let Some(ids) = days.get_mut(&date.day()) else {
            return false;
        };
        let removed = ids.remove(id);
        if ids.is_empty() {
            days.remove(&date.day());
        }
        if days.is_empty() {
            months.remove(&date.month());
        }
        if months.is_empty() {
            self.years.remove(&date.year());
        }
        removed
    }

    fn apply_upsert(&mut self, event: &JournalEntryUpserted) -> bool {
        let moved = event
            .moved_from()
            .is_some_and(|old| self.remove(old, &event.id));
        let inserted = self.insert(event.date, &event.id);
        moved || inserted
    }
}

impl ProjectionState for JournalDateTree {
    const NAME: &'static str = "sortedJournalEntries";
    const INTERESTS: &'static [EventKind] = &[
        EventKind::JournalEntryUpserted,
        EventKind::JournalEntryDeleted,
    ];

    fn ingest_journal_entry(&mut self, entry: &JournalEntry) {
        self.insert(entry.date, &entry.id);
    }

    fn apply(&mut self, event: &DomainEvent) -> bool {
        match event {
            DomainEvent::JournalEntryUpserted(event) => self.apply_upsert(event),
            DomainEvent::JournalEntryDeleted(event) => self.remove(event.date, &event.id),
            _ => false,
        }
    }
}

/// Live journal date index.
pub type SortedJournalIndex = Projection<JournalDateTree>;

impl Projection<JournalDateTree> {
    /// See `JournalDateTree::find_ids_between`.
    pub fn find_ids_between(&self, start: NaiveDate, end: NaiveDate) -> Vec<JournalEntryId> {
        self.read().find_ids_between(start, end)
    }
}
