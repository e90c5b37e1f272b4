//! Derived, independently persisted read models.
//!
//! # Responsibility
//! - Wrap each projection state in a reader/writer lock plus its snapshot file.
//! - Apply domain events with write-through persistence.
//! - Offer a type-erased handle so the engine can bootstrap every projection
//!   uniformly.
//!
//! # Invariants
//! - Readers never observe a half-applied event: mutation and snapshot write
//!   both happen under the exclusive lock.
//! - An event that leaves the state unchanged does not touch the snapshot.
//! - A failed snapshot write keeps the in-memory state; durability catches up
//!   on the next successful write.
//! - A stale projection (failed rebuild) never writes its snapshot from
//!   `handle`; only a successful `persist` makes it durable again.

pub mod engine;
pub mod journal_index;
pub mod track_lookup;
pub mod track_tree;
pub mod track_usages;

use crate::events::{DomainEvent, EventKind};
use crate::fs_util::{read_if_exists, write_atomically};
use crate::model::journal::JournalEntry;
use crate::model::track::Track;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Result type used by projection operations.
pub type ProjectionResult<T> = Result<T, ProjectionError>;

/// Errors from projection persistence.
#[derive(Debug)]
pub enum ProjectionError {
    /// Snapshot could not be serialized.
    Encode {
        projection: &'static str,
        source: serde_json::Error,
    },
    /// Snapshot file could not be written.
    Write {
        projection: &'static str,
        path: PathBuf,
        source: io::Error,
    },
}

impl Display for ProjectionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Encode { projection, source } => {
                write!(f, "could not encode projection `{projection}`: {source}")
            }
            Self::Write {
                projection,
                path,
                source,
            } => write!(
                f,
                "could not write projection `{projection}` to `{}`: {source}",
                path.display()
            ),
        }
    }
}

impl Error for ProjectionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Encode { source, .. } => Some(source),
            Self::Write { source, .. } => Some(source),
        }
    }
}

/// Result of trying to restore a projection from its snapshot file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Snapshot parsed and installed.
    Loaded,
    /// No snapshot file exists.
    Missing,
    /// Snapshot exists but could not be read or parsed.
    Corrupt(String),
}

/// State and update rules of one projection.
///
/// Implementations are plain data: locking and persistence are handled by
/// `Projection<S>`.
pub trait ProjectionState:
    Default + Clone + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Snapshot file stem and diagnostics label.
    const NAME: &'static str;
    /// Event kinds this projection subscribes to.
    const INTERESTS: &'static [EventKind];

    /// Rebuild ingestion for one track.
    fn ingest_track(&mut self, _track: &Track) {}

    /// Rebuild ingestion for one journal entry.
    ///
    /// Called only after every track has been ingested.
    fn ingest_journal_entry(&mut self, _entry: &JournalEntry) {}

    /// Applies one incremental event and reports whether the state changed.
    fn apply(&mut self, event: &DomainEvent) -> bool;
}

/// A projection state guarded by a reader/writer lock and backed by one
/// snapshot file `<dir>/<NAME>.json`.
pub struct Projection<S: ProjectionState> {
    state: RwLock<S>,
    snapshot_path: PathBuf,
    stale: AtomicBool,
}

impl<S: ProjectionState> Projection<S> {
    /// Creates an empty projection whose snapshot lives under `dir`.
    pub fn new(dir: &Path) -> Self {
        Self {
            state: RwLock::new(S::default()),
            snapshot_path: dir.join(format!("{}.json", S::NAME)),
            stale: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &'static str {
        S::NAME
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Returns an owned copy of the current state.
    pub fn snapshot(&self) -> S {
        self.read().clone()
    }

    /// Replaces the in-memory state with the persisted snapshot, if valid.
    pub fn load(&self) -> LoadOutcome {
        let bytes = match read_if_exists(&self.snapshot_path) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return LoadOutcome::Missing,
            Err(err) => return LoadOutcome::Corrupt(err.to_string()),
        };
        match serde_json::from_slice::<S>(&bytes) {
            Ok(state) => {
                *self.write() = state;
                LoadOutcome::Loaded
            }
            Err(err) => LoadOutcome::Corrupt(err.to_string()),
        }
    }

    /// Drops all in-memory state and stops write-through until the next
    /// successful `persist`.
    pub fn invalidate(&self) {
        let mut state = self.write();
        *state = S::default();
        self.stale.store(true, Ordering::Release);
    }

    /// Whether the in-memory state is known to be incomplete.
    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }

    pub fn ingest_track(&self, track: &Track) {
        self.write().ingest_track(track);
    }

    pub fn ingest_journal_entry(&self, entry: &JournalEntry) {
        self.write().ingest_journal_entry(entry);
    }

    /// Writes the current state to the snapshot file and clears the stale
    /// flag on success.
    pub fn persist(&self) -> ProjectionResult<()> {
        let state = self.read();
        self.write_snapshot(&state)?;
        self.stale.store(false, Ordering::Release);
        Ok(())
    }

    /// Applies `event` and persists while still holding the exclusive lock.
    ///
    /// Returns whether the state changed. A stale projection applies the
    /// event in memory only.
    pub fn handle(&self, event: &DomainEvent) -> ProjectionResult<bool> {
        let mut state = self.write();
        if !state.apply(event) {
            debug!(
                "event=projection_apply module=projection status=unchanged name={} kind={} subject={}",
                S::NAME,
                event.kind(),
                event.subject_id()
            );
            return Ok(false);
        }
        if self.is_stale() {
            warn!(
                "event=projection_apply module=projection status=skip_persist name={} kind={} subject={} reason=stale",
                S::NAME,
                event.kind(),
                event.subject_id()
            );
            return Ok(true);
        }
        self.write_snapshot(&state)?;
        debug!(
            "event=projection_apply module=projection status=ok name={} kind={} subject={}",
            S::NAME,
            event.kind(),
            event.subject_id()
        );
        Ok(true)
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, S> {
        self.state.read().unwrap_or_else(|poisoned| {
            warn!(
                "event=projection_lock module=projection status=recovered name={} mode=read",
                S::NAME
            );
            PoisonError::into_inner(poisoned)
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, S> {
        self.state.write().unwrap_or_else(|poisoned| {
            warn!(
                "event=projection_lock module=projection status=recovered name={} mode=write",
                S::NAME
            );
            PoisonError::into_inner(poisoned)
        })
    }

    fn write_snapshot(&self, state: &S) -> ProjectionResult<()> {
        let payload = serde_json::to_vec(state).map_err(|source| ProjectionError::Encode {
            projection: S::NAME,
            source,
        })?;
        write_atomically(&self.snapshot_path, &payload).map_err(|source| ProjectionError::Write {
            projection: S::NAME,
            path: self.snapshot_path.clone(),
            source,
        })
    }
}

/// Object-safe view of `Projection<S>` used by the engine.
pub(crate) trait ManagedProjection: Send + Sync {
    fn name(&self) -> &'static str;
    fn interests(&self) -> &'static [EventKind];
    fn load(&self) -> LoadOutcome;
    fn invalidate(&self);
    fn ingest_track(&self, track: &Track);
    fn ingest_journal_entry(&self, entry: &JournalEntry);
    fn persist(&self) -> ProjectionResult<()>;
    fn handle(&self, event: &DomainEvent) -> ProjectionResult<bool>;
}

impl<S: ProjectionState> ManagedProjection for Projection<S> {
    fn name(&self) -> &'static str {
        S::NAME
    }

    fn interests(&self) -> &'static [EventKind] {
        S::INTERESTS
    }

    fn load(&self) -> LoadOutcome {
        Projection::load(self)
    }

    fn invalidate(&self) {
        Projection::invalidate(self);
    }

    fn ingest_track(&self, track: &Track) {
        Projection::ingest_track(self, track);
    }

    fn ingest_journal_entry(&self, entry: &JournalEntry) {
        Projection::ingest_journal_entry(self, entry);
    }

    fn persist(&self) -> ProjectionResult<()> {
        Projection::persist(self)
    }

    fn handle(&self, event: &DomainEvent) -> ProjectionResult<bool> {
        Projection::handle(self, event)
    }
}

#[cfg(test)]
mod tests {
    use super::{LoadOutcome, Projection, ProjectionState};
    use crate::events::{DomainEvent, EventKind, TrackDeleted};
    use serde::{Deserialize, Serialize};
    use tempfile::tempdir;

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    struct DeletionCounter {
        deleted: Vec<String>,
    }

    impl ProjectionState for DeletionCounter {
        const NAME: &'static str = "deletionCounter";
        const INTERESTS: &'static [EventKind] = &[EventKind::TrackDeleted];

        fn apply(&mut self, event: &DomainEvent) -> bool {
            match event {
                DomainEvent::TrackDeleted(event) if !self.deleted.contains(&event.id) => {
                    self.deleted.push(event.id.clone());
                    true
                }
                _ => false,
            }
        }
    }

    fn deleted(id: &str) -> DomainEvent {
        TrackDeleted { id: id.to_string() }.into()
    }

    #[test]
    fn handle_persists_changes_and_load_restores_them() {
        let dir = tempdir().unwrap();
        let projection = Projection::<DeletionCounter>::new(dir.path());
        assert!(projection.handle(&deleted("t1")).unwrap());

        let restored = Projection::<DeletionCounter>::new(dir.path());
        assert_eq!(restored.load(), LoadOutcome::Loaded);
        assert_eq!(restored.snapshot().deleted, vec!["t1"]);
    }

    #[test]
    fn unchanged_state_does_not_write_snapshot() {
        let dir = tempdir().unwrap();
        let projection = Projection::<DeletionCounter>::new(dir.path());
        projection.handle(&deleted("t1")).unwrap();
        std::fs::remove_file(projection.snapshot_path()).unwrap();

        assert!(!projection.handle(&deleted("t1")).unwrap());
        assert!(!projection.snapshot_path().exists());
    }

    #[test]
    fn load_reports_missing_and_corrupt_snapshots() {
        let dir = tempdir().unwrap();
        let projection = Projection::<DeletionCounter>::new(dir.path());
        assert_eq!(projection.load(), LoadOutcome::Missing);

        std::fs::write(projection.snapshot_path(), b"{not json").unwrap();
        assert!(matches!(projection.load(), LoadOutcome::Corrupt(_)));
    }

    #[test]
    fn failed_write_keeps_in_memory_state() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file, not a directory").unwrap();
        let projection = Projection::<DeletionCounter>::new(&blocker);

        assert!(projection.handle(&deleted("t1")).is_err());
        assert_eq!(projection.snapshot().deleted, vec!["t1"]);
    }

    #[test]
    fn invalidated_projection_skips_write_through_until_persisted() {
        let dir = tempdir().unwrap();
        let projection = Projection::<DeletionCounter>::new(dir.path());
        projection.invalidate();
        assert!(projection.is_stale());

        assert!(projection.handle(&deleted("t1")).unwrap());
        assert_eq!(projection.snapshot().deleted, vec!["t1"]);
        assert!(!projection.snapshot_path().exists());

        projection.persist().unwrap();
        assert!(!projection.is_stale());
        assert!(projection.handle(&deleted("t2")).unwrap());

        let restored = Projection::<DeletionCounter>::new(dir.path());
        assert_eq!(restored.load(), LoadOutcome::Loaded);
        assert_eq!(restored.snapshot().deleted, vec!["t1", "t2"]);
    }
}
