//! Dashboard aggregation service.
//!
//! # Responsibility
//! - Summarize run distances over a date range, per day and per month.
//! - Rank the most frequently used tracks.
//!
//! # Invariants
//! - A "run" is a day with at least one entry; entries on one day are summed.
//! - Median is the upper median of sorted day totals; averages truncate.
//! - Entries with an unresolvable track still count toward distances but
//!   never appear in the top tracks.

use super::{load_entries_between, ServiceResult, TrackCache};
use crate::model::track::TrackId;
use crate::projection::engine::ProjectionEngine;
use crate::projection::journal_index::SortedJournalIndex;
use crate::store::PrimaryStore;
use chrono::{Datelike, NaiveDate};
use log::debug;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Dashboard query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashboardOptions {
    pub from: NaiveDate,
    /// Exclusive upper bound.
    pub to: NaiveDate,
    pub top_tracks: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopTrack {
    pub id: TrackId,
    pub name: String,
    pub parents: Vec<String>,
    pub count: usize,
    pub length: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyAnalytics {
    pub year: i32,
    pub month: u32,
    pub total_distance: u64,
    pub median_distance: u64,
    pub average_distance: u64,
    pub total_runs: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub total_distance: u64,
    pub total_runs: usize,
    pub median_distance: u64,
    pub average_distance: u64,
    pub top_tracks: Vec<TopTrack>,
    pub analytics: Vec<MonthlyAnalytics>,
}

pub struct DashboardService {
    store: Arc<dyn PrimaryStore>,
    index: Arc<SortedJournalIndex>,
}

impl DashboardService {
    pub fn new(store: Arc<dyn PrimaryStore>, index: Arc<SortedJournalIndex>) -> Self {
        Self { store, index }
    }

    pub fn from_engine(engine: &ProjectionEngine) -> Self {
        Self::new(
            Arc::clone(engine.store()),
            Arc::clone(engine.journal_index()),
        )
    }

    pub fn load(&self, options: DashboardOptions) -> ServiceResult<Dashboard> {
        let entries =
            load_entries_between(self.store.as_ref(), &self.index, options.from, options.to)?;
        let mut tracks = TrackCache::new(self.store.as_ref());
        let mut per_day: BTreeMap<NaiveDate, u64> = BTreeMap::new();
        let mut top: HashMap<TrackId, TopTrack> = HashMap::new();

        for entry in &entries {
            let track = tracks.resolve(&entry.track_id);
            let length = entry.effective_length(track.map(|track| track.length()));
            *per_day.entry(entry.date).or_default() += u64::from(length);

            if let Some(track) = track {
                top.entry(track.id.clone())
                    .or_insert_with(|| TopTrack {
                        id: track.id.clone(),
                        name: track.name.clone(),
                        parents: track.parents.clone(),
                        count: 0,
                        length: track.length(),
                    })
                    .count += 1;
            }
        }

        let mut per_month: BTreeMap<(i32, u32), Vec<u64>> = BTreeMap::new();
        for (date, total) in &per_day {
            per_month
                .entry((date.year(), date.month()))
                .or_default()
                .push(*total);
        }
        let analytics = per_month
            .into_iter()
            .map(|((year, month), totals)| {
                let stats = DistanceStats::from_totals(totals);
                MonthlyAnalytics {
                    year,
                    month,
                    total_distance: stats.total,
                    median_distance: stats.median,
                    average_distance: stats.average,
                    total_runs: stats.runs,
                }
            })
            .collect();

        let mut top_tracks: Vec<TopTrack> = top.into_values().collect();
        top_tracks.sort_by(compare_top_tracks);
        top_tracks.truncate(options.top_tracks);

        let stats = DistanceStats::from_totals(per_day.into_values().collect());
        debug!(
            "event=dashboard_load module=service status=ok from={} to={} entries={} runs={}",
            options.from,
            options.to,
            entries.len(),
            stats.runs
        );
        Ok(Dashboard {
            total_distance: stats.total,
            total_runs: stats.runs,
            median_distance: stats.median,
            average_distance: stats.average,
            top_tracks,
            analytics,
        })
    }
}

struct DistanceStats {
    total: u64,
    median: u64,
    average: u64,
    runs: usize,
}

impl DistanceStats {
    fn from_totals(mut totals: Vec<u64>) -> Self {
        totals.sort_unstable();
        let total: u64 = totals.iter().sum();
        let runs = totals.len();
        let (median, average) = match runs {
            0 => (0, 0),
            _ => (totals[runs / 2], total / runs as u64),
        };
        Self {
            total,
            median,
            average,
            runs,
        }
    }
}

fn compare_top_tracks(left: &TopTrack, right: &TopTrack) -> Ordering {
    right
        .count
        .cmp(&left.count)
        .then_with(|| left.name.cmp(&right.name))
        .then_with(|| left.parents.concat().cmp(&right.parents.concat()))
        .then_with(|| left.id.cmp(&right.id))
}

#[cfg(test)]
mod tests {
    use super::{compare_top_tracks, DistanceStats, TopTrack};
    use std::cmp::Ordering;

    fn top(name: &str, parents: &[&str], count: usize) -> TopTrack {
        TopTrack {
            id: name.to_string(),
            name: name.to_string(),
            parents: parents.iter().map(|p| p.to_string()).collect(),
            count,
            length: 0,
        }
    }

    #[test]
    fn stats_use_upper_median_and_truncating_average() {
        let stats = DistanceStats::from_totals(vec![5000, 1000, 3000, 2000]);
        assert_eq!(stats.total, 11000);
        assert_eq!(stats.median, 3000);
        assert_eq!(stats.average, 2750);
        assert_eq!(stats.runs, 4);

        let empty = DistanceStats::from_totals(Vec::new());
        assert_eq!((empty.median, empty.average, empty.runs), (0, 0, 0));
    }

    #[test]
    fn top_tracks_rank_by_count_then_name_then_parents() {
        assert_eq!(
            compare_top_tracks(&top("b", &[], 3), &top("a", &[], 1)),
            Ordering::Less
        );
        assert_eq!(
            compare_top_tracks(&top("a", &[], 2), &top("b", &[], 2)),
            Ordering::Less
        );
        assert_eq!(
            compare_top_tracks(&top("a", &["Z"], 2), &top("a", &["A"], 2)),
            Ordering::Greater
        );
    }
}
