//! File-based primary store.
//!
//! # Responsibility
//! - Read and write canonical track and journal entry JSON files.
//! - Publish one domain event per successful mutation.
//!
//! # Invariants
//! - Records are written atomically (temp file + rename).
//! - No event is published when the write fails.
//! - Journal entry ids are claimed with `create_dir`, so two entries never
//!   share a directory.
//! - Mutations are serialized: the read of previous values, the write, and
//!   the publish of one mutation never interleave with another, so events
//!   arrive in the order the files were written.

use super::layout::{
    candidate_entry_ids, date_from_entry_id, is_day_name, is_journal_entry_id, is_month_name,
    is_track_id, is_year_name, ENTRY_FILE_NAME, JOURNAL_DIRECTORY, TRACKS_DIRECTORY,
    TRACK_FILE_NAME,
};
use super::{PrimaryStore, StoreError, StoreResult};
use crate::events::{
    DomainEvent, EventBus, JournalEntryDeleted, JournalEntryUpserted, TrackDeleted, TrackMoved,
    TrackUpserted,
};
use crate::fs_util::{read_if_exists, write_atomically};
use crate::model::journal::{JournalEntry, NewJournalEntry};
use crate::model::track::{Coordinates, Track};
use chrono::NaiveDate;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Input for creating a new track; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTrack {
    pub name: String,
    pub parents: Vec<String>,
    pub waypoints: Vec<Coordinates>,
    pub comment: String,
}

impl NewTrack {
    pub fn new(name: impl Into<String>, parents: Vec<String>) -> Self {
        Self {
            name: name.into(),
            parents,
            waypoints: Vec::new(),
            comment: String::new(),
        }
    }

    pub fn with_waypoints(mut self, waypoints: Vec<Coordinates>) -> Self {
        self.waypoints = waypoints;
        self
    }
}

/// Persisted shape of `entry.json`. The id lives in the directory path.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntryFile {
    /// Older files carry no date; it is then derived from the id.
    #[serde(default)]
    date: Option<NaiveDate>,
    track: String,
    #[serde(default)]
    laps: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    custom_length: Option<u32>,
    #[serde(default)]
    comment: String,
    #[serde(default)]
    time: String,
}

impl From<&JournalEntry> for EntryFile {
    fn from(entry: &JournalEntry) -> Self {
        Self {
            date: Some(entry.date),
            track: entry.track_id.clone(),
            laps: entry.laps,
            custom_length: entry.custom_length,
            comment: entry.comment.clone(),
            time: entry.time.clone(),
        }
    }
}

struct DirItem {
    name: String,
    path: PathBuf,
}

/// Primary store rooted at one data directory.
pub struct FileStore {
    root: PathBuf,
    bus: Arc<EventBus>,
    mutation: Mutex<()>,
}

impl FileStore {
    /// Creates a store publishing its mutations to `bus`.
    pub fn new(root: impl Into<PathBuf>, bus: Arc<EventBus>) -> Self {
        Self {
            root: root.into(),
            bus,
            mutation: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the track and journal directories.
    pub fn init(&self) -> StoreResult<()> {
        for name in [TRACKS_DIRECTORY, JOURNAL_DIRECTORY] {
            let path = self.root.join(name);
            fs::create_dir_all(&path).map_err(|err| StoreError::io(&path, err))?;
        }
        info!(
            "event=store_init module=store status=ok root={}",
            self.root.display()
        );
        Ok(())
    }

    /// Creates a track with a fresh id and publishes `TrackUpserted`.
    pub fn create_track(&self, input: NewTrack) -> StoreResult<Track> {
        let mut track = Track::new(input.name, input.parents);
        track.waypoints = input.waypoints;
        track.comment = input.comment;
        let _guard = self.lock_mutations();
        self.save_track_locked(&track)?;
        Ok(track)
    }

    /// Writes a track (create or edit) and publishes `TrackUpserted`.
    ///
    /// Renames and moves through this call are reported as one upsert.
    pub fn save_track(&self, track: &Track) -> StoreResult<()> {
        let _guard = self.lock_mutations();
        self.save_track_locked(track)
    }

    fn save_track_locked(&self, track: &Track) -> StoreResult<()> {
        let mut normalized = track.clone();
        normalized.name = normalize_track_name(&track.name)?;
        normalized.parents = normalize_parents(&track.parents);

        self.write_track(&normalized)?;
        info!(
            "event=track_save module=store status=ok track_id={} depth={}",
            normalized.id,
            normalized.parents.len()
        );
        self.publish(TrackUpserted {
            id: normalized.id.clone(),
            name: normalized.name.clone(),
            length: normalized.length(),
            parents: normalized.parents,
        });
        Ok(())
    }

    /// Changes only the ancestor path of a track and publishes `TrackMoved`.
    ///
    /// Moving to the current path writes nothing and publishes nothing.
    pub fn move_track(&self, id: &str, parents: Vec<String>) -> StoreResult<Track> {
        let _guard = self.lock_mutations();
        let mut track = self.read_track(id)?;
        let new_parents = normalize_parents(&parents);
        if track.parents == new_parents {
            return Ok(track);
        }

        let old_parents = std::mem::replace(&mut track.parents, new_parents);
        self.write_track(&track)?;
        info!(
            "event=track_move module=store status=ok track_id={} depth={}",
            track.id,
            track.parents.len()
        );
        self.publish(TrackMoved {
            id: track.id.clone(),
            old_parents,
            new_parents: track.parents.clone(),
        });
        Ok(track)
    }

    /// Removes a track directory and publishes `TrackDeleted`.
    pub fn delete_track(&self, id: &str) -> StoreResult<()> {
        let _guard = self.lock_mutations();
        let dir = self.track_dir(id)?;
        if !dir.join(TRACK_FILE_NAME).is_file() {
            return Err(StoreError::TrackNotFound(id.to_string()));
        }
        fs::remove_dir_all(&dir).map_err(|err| StoreError::io(&dir, err))?;
        info!("event=track_delete module=store status=ok track_id={id}");
        self.publish(TrackDeleted { id: id.to_string() });
        Ok(())
    }

    /// Allocates an id for the entry date, writes it, and publishes
    /// `JournalEntryUpserted` without previous values.
    pub fn create_journal_entry(&self, input: NewJournalEntry) -> StoreResult<JournalEntry> {
        let _guard = self.lock_mutations();
        let id = self.claim_entry_id(input.date)?;
        let entry = input.into_entry(id);
        if let Err(err) = self.write_entry(&entry) {
            self.release_claimed_entry(&entry.id);
            return Err(err);
        }
        info!(
            "event=journal_entry_create module=store status=ok entry_id={} date={}",
            entry.id, entry.date
        );
        self.publish(JournalEntryUpserted {
            id: entry.id.clone(),
            track_id: entry.track_id.clone(),
            date: entry.date,
            old_track_id: None,
            old_date: None,
        });
        Ok(entry)
    }

    /// Overwrites an existing entry and publishes `JournalEntryUpserted` with
    /// the previous track id and date.
    pub fn save_journal_entry(&self, entry: &JournalEntry) -> StoreResult<()> {
        let _guard = self.lock_mutations();
        let previous = self.read_journal_entry(&entry.id)?;
        self.write_entry(entry)?;
        info!(
            "event=journal_entry_save module=store status=ok entry_id={} date={}",
            entry.id, entry.date
        );
        self.publish(JournalEntryUpserted {
            id: entry.id.clone(),
            track_id: entry.track_id.clone(),
            date: entry.date,
            old_track_id: Some(previous.track_id),
            old_date: Some(previous.date),
        });
        Ok(())
    }

    /// Removes an entry directory and publishes `JournalEntryDeleted`.
    pub fn delete_journal_entry(&self, id: &str) -> StoreResult<()> {
        let _guard = self.lock_mutations();
        let existing = self.read_journal_entry(id)?;
        let dir = self.entry_dir(id)?;
        fs::remove_dir_all(&dir).map_err(|err| StoreError::io(&dir, err))?;
        self.remove_empty_journal_parents(&dir);
        info!("event=journal_entry_delete module=store status=ok entry_id={id}");
        self.publish(JournalEntryDeleted {
            id: existing.id,
            track_id: existing.track_id,
            date: existing.date,
        });
        Ok(())
    }

    // Subscribers run under this guard and must not call back into
    // mutating store methods.
    fn lock_mutations(&self) -> MutexGuard<'_, ()> {
        self.mutation.lock().unwrap_or_else(|poisoned| {
            warn!("event=store_lock module=store status=recovered");
            PoisonError::into_inner(poisoned)
        })
    }

    fn release_claimed_entry(&self, id: &str) {
        let Ok(dir) = self.entry_dir(id) else {
            return;
        };
        if let Err(err) = fs::remove_dir_all(&dir) {
            warn!(
                "event=journal_entry_release module=store status=error entry_id={} dir={} error={}",
                id,
                dir.display(),
                err
            );
        }
    }

    fn publish(&self, event: impl Into<DomainEvent>) {
        let event = event.into();
        let report = self.bus.publish(&event);
        if report.failed > 0 {
            warn!(
                "event=store_publish module=store status=degraded kind={} subject={} failed_handlers={}",
                event.kind(),
                event.subject_id(),
                report.failed
            );
        }
    }

    fn track_dir(&self, id: &str) -> StoreResult<PathBuf> {
        if !is_track_id(id) {
            return Err(StoreError::InvalidTrackId(id.to_string()));
        }
        Ok(self.root.join(TRACKS_DIRECTORY).join(id))
    }

    fn entry_dir(&self, id: &str) -> StoreResult<PathBuf> {
        if !is_journal_entry_id(id) {
            return Err(StoreError::InvalidJournalEntryId(id.to_string()));
        }
        Ok(id
            .split('/')
            .fold(self.root.join(JOURNAL_DIRECTORY), |path, part| {
                path.join(part)
            }))
    }

    fn write_track(&self, track: &Track) -> StoreResult<()> {
        let path = self.track_dir(&track.id)?.join(TRACK_FILE_NAME);
        let payload = serde_json::to_vec_pretty(track).map_err(|err| StoreError::parse(&path, err))?;
        write_atomically(&path, &payload).map_err(|err| StoreError::io(&path, err))
    }

    fn write_entry(&self, entry: &JournalEntry) -> StoreResult<()> {
        let path = self.entry_dir(&entry.id)?.join(ENTRY_FILE_NAME);
        let payload = serde_json::to_vec_pretty(&EntryFile::from(entry))
            .map_err(|err| StoreError::parse(&path, err))?;
        write_atomically(&path, &payload).map_err(|err| StoreError::io(&path, err))
    }

    fn claim_entry_id(&self, date: NaiveDate) -> StoreResult<String> {
        for candidate in candidate_entry_ids(date) {
            let dir = self.entry_dir(&candidate)?;
            if let Some(parent) = dir.parent() {
                fs::create_dir_all(parent).map_err(|err| StoreError::io(parent, err))?;
            }
            match fs::create_dir(&dir) {
                Ok(()) => return Ok(candidate),
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(StoreError::io(&dir, err)),
            }
        }
        Err(StoreError::NoFreeEntrySlot(date))
    }

    fn remove_empty_journal_parents(&self, entry_dir: &Path) {
        let journal_root = self.root.join(JOURNAL_DIRECTORY);
        let mut current = entry_dir.parent();
        while let Some(dir) = current {
            if dir == journal_root {
                break;
            }
            // `remove_dir` refuses non-empty directories, which ends the walk.
            if fs::remove_dir(dir).is_err() {
                break;
            }
            debug!(
                "event=journal_dir_prune module=store status=ok dir={}",
                dir.display()
            );
            current = dir.parent();
        }
    }

    fn read_entry_at(&self, id: &str, path: &Path) -> StoreResult<JournalEntry> {
        let bytes = read_if_exists(path)
            .map_err(|err| StoreError::io(path, err))?
            .ok_or_else(|| StoreError::JournalEntryNotFound(id.to_string()))?;
        let file: EntryFile =
            serde_json::from_slice(&bytes).map_err(|err| StoreError::parse(path, err))?;
        let date = file
            .date
            .or_else(|| date_from_entry_id(id))
            .ok_or_else(|| StoreError::InvalidJournalEntryId(id.to_string()))?;
        Ok(JournalEntry {
            id: id.to_string(),
            date,
            track_id: file.track,
            laps: file.laps,
            custom_length: file.custom_length,
            comment: file.comment,
            time: file.time,
        })
    }

    fn read_track_at(&self, dir_name: &str, path: &Path) -> StoreResult<Track> {
        let bytes = read_if_exists(path)
            .map_err(|err| StoreError::io(path, err))?
            .ok_or_else(|| StoreError::TrackNotFound(dir_name.to_string()))?;
        let mut track: Track =
            serde_json::from_slice(&bytes).map_err(|err| StoreError::parse(path, err))?;
        if track.id != dir_name {
            warn!(
                "event=track_read module=store status=degraded error_code=id_mismatch dir={} file_id={}",
                dir_name, track.id
            );
            track.id = dir_name.to_string();
        }
        Ok(track)
    }
}

impl PrimaryStore for FileStore {
    fn read_all_tracks(&self, visit: &mut dyn FnMut(Track)) -> StoreResult<()> {
        let tracks_root = self.root.join(TRACKS_DIRECTORY);
        let mut count = 0usize;
        for dir in list_dirs(&tracks_root, is_track_id)? {
            let path = dir.path.join(TRACK_FILE_NAME);
            if !path.is_file() {
                warn!(
                    "event=track_scan module=store status=skip dir={} reason=missing_track_file",
                    dir.path.display()
                );
                continue;
            }
            visit(self.read_track_at(&dir.name, &path)?);
            count += 1;
        }
        debug!("event=track_scan module=store status=ok count={count}");
        Ok(())
    }

    fn read_all_journal_entries(&self) -> StoreResult<Vec<JournalEntry>> {
        let journal_root = self.root.join(JOURNAL_DIRECTORY);
        let mut entries = Vec::new();
        for year in list_dirs(&journal_root, is_year_name)? {
            for month in list_dirs(&year.path, is_month_name)? {
                for day in list_dirs(&month.path, is_day_name)? {
                    let path = day.path.join(ENTRY_FILE_NAME);
                    if !path.is_file() {
                        warn!(
                            "event=journal_scan module=store status=skip dir={} reason=missing_entry_file",
                            day.path.display()
                        );
                        continue;
                    }
                    let id = format!("{}/{}/{}", year.name, month.name, day.name);
                    entries.push(self.read_entry_at(&id, &path)?);
                }
            }
        }
        debug!(
            "event=journal_scan module=store status=ok count={}",
            entries.len()
        );
        Ok(entries)
    }

    fn read_track(&self, id: &str) -> StoreResult<Track> {
        let path = self.track_dir(id)?.join(TRACK_FILE_NAME);
        self.read_track_at(id, &path)
    }

    fn read_journal_entry(&self, id: &str) -> StoreResult<JournalEntry> {
        let path = self.entry_dir(id)?.join(ENTRY_FILE_NAME);
        self.read_entry_at(id, &path)
    }
}

/// Lists child directories whose names satisfy `accept`, sorted by name.
///
/// A missing directory yields an empty list.
fn list_dirs(path: &Path, accept: fn(&str) -> bool) -> StoreResult<Vec<DirItem>> {
    let reader = match fs::read_dir(path) {
        Ok(reader) => reader,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(StoreError::io(path, err)),
    };

    let mut items = Vec::new();
    for item in reader {
        let item = item.map_err(|err| StoreError::io(path, err))?;
        let file_type = item.file_type().map_err(|err| StoreError::io(item.path(), err))?;
        if !file_type.is_dir() {
            continue;
        }
        let Some(name) = item.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if accept(&name) {
            items.push(DirItem {
                name,
                path: item.path(),
            });
        }
    }
    items.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(items)
}

fn normalize_track_name(name: &str) -> StoreResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(StoreError::InvalidTrackName);
    }
    Ok(trimmed.to_string())
}

fn normalize_parents(parents: &[String]) -> Vec<String> {
    parents
        .iter()
        .map(|segment| segment.trim())
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}
