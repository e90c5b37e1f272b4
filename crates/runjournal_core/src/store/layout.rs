//! On-disk naming rules for the primary store.
//!
//! # Invariants
//! - Journal directories are `journal/<YYYY>/<MM>/<DD[a-z]>/entry.json`.
//! - Track directories are `tracks/<track-id>/track.json`.
//! - Ids are validated before they are joined onto a path.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

pub(crate) const TRACKS_DIRECTORY: &str = "tracks";
pub(crate) const JOURNAL_DIRECTORY: &str = "journal";
pub(crate) const TRACK_FILE_NAME: &str = "track.json";
pub(crate) const ENTRY_FILE_NAME: &str = "entry.json";

static YEAR_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}$").expect("valid regex"));
static MONTH_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{2}$").expect("valid regex"));
static DAY_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{2}[a-z]?$").expect("valid regex"));
static ENTRY_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})/(\d{2})/(\d{2})[a-z]?$").expect("valid regex"));
static TRACK_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("valid regex"));

pub(crate) fn is_year_name(value: &str) -> bool {
    YEAR_NAME.is_match(value)
}

pub(crate) fn is_month_name(value: &str) -> bool {
    MONTH_NAME.is_match(value)
}

pub(crate) fn is_day_name(value: &str) -> bool {
    DAY_NAME.is_match(value)
}

/// Returns true when `value` is a well-formed journal entry id.
pub fn is_journal_entry_id(value: &str) -> bool {
    date_from_entry_id(value).is_some()
}

/// Returns true when `value` is safe to use as a track directory name.
pub fn is_track_id(value: &str) -> bool {
    TRACK_ID.is_match(value)
}

/// Parses the creation date encoded in a journal entry id.
pub(crate) fn date_from_entry_id(value: &str) -> Option<NaiveDate> {
    let captures = ENTRY_ID.captures(value)?;
    let year = captures.get(1)?.as_str().parse().ok()?;
    let month = captures.get(2)?.as_str().parse().ok()?;
    let day = captures.get(3)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Base id for entries created on `date`.
pub(crate) fn base_entry_id(date: NaiveDate) -> String {
    date.format("%Y/%m/%d").to_string()
}

/// Candidate ids for `date` in allocation order: bare date, then `a`..`z`.
pub(crate) fn candidate_entry_ids(date: NaiveDate) -> impl Iterator<Item = String> {
    let base = base_entry_id(date);
    std::iter::once(base.clone()).chain(('a'..='z').map(move |suffix| format!("{base}{suffix}")))
}
