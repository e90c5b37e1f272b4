//! Projection lifecycle: bootstrap, full rebuild, and bus registration.
//!
//! # Responsibility
//! - Load each projection from its snapshot or rebuild it from the store.
//! - Register every projection on the event bus exactly once.
//!
//! # Invariants
//! - The track scan and the journal scan run concurrently, but no journal
//!   entry is ingested before every track has been ingested.
//! - A scan failure aborts the whole call; projections that were being
//!   rebuilt are reset instead of keeping partial content.
//! - A projection under rebuild is stale: bus events still update it in
//!   memory but never write its snapshot, so a failed rebuild cannot leave
//!   partial snapshots that a restart would load.

use super::journal_index::SortedJournalIndex;
use super::track_lookup::TrackIdLookup;
use super::track_tree::TrackTree;
use super::track_usages::TrackUsageIndex;
use super::{LoadOutcome, ManagedProjection, Projection, ProjectionError};
use crate::events::{EventBus, HandlerError};
use crate::model::journal::JournalEntry;
use crate::store::{PrimaryStore, StoreError, StoreResult};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

/// Result type used by engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors from engine bootstrap and rebuild.
#[derive(Debug)]
pub enum EngineError {
    /// Projection directory could not be prepared.
    Io { path: PathBuf, source: io::Error },
    /// A primary store scan failed.
    Scan(StoreError),
    /// A scan thread panicked.
    ScanPanicked(&'static str),
    /// A rebuilt projection could not be written.
    Persist(ProjectionError),
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(
                f,
                "could not prepare projection directory `{}`: {source}",
                path.display()
            ),
            Self::Scan(err) => write!(f, "primary store scan failed: {err}"),
            Self::ScanPanicked(scan) => write!(f, "{scan} scan panicked"),
            Self::Persist(err) => write!(f, "{err}"),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Scan(err) => Some(err),
            Self::ScanPanicked(_) => None,
            Self::Persist(err) => Some(err),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(value: StoreError) -> Self {
        Self::Scan(value)
    }
}

impl From<ProjectionError> for EngineError {
    fn from(value: ProjectionError) -> Self {
        Self::Persist(value)
    }
}

/// Engine settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Disposable root holding one snapshot file per projection.
    pub projection_dir: PathBuf,
}

impl EngineConfig {
    pub fn new(projection_dir: impl Into<PathBuf>) -> Self {
        Self {
            projection_dir: projection_dir.into(),
        }
    }
}

/// How a projection became ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapStatus {
    Loaded,
    Rebuilt,
}

impl BootstrapStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Loaded => "loaded",
            Self::Rebuilt => "rebuilt",
        }
    }
}

/// Per-projection outcome of `ProjectionEngine::initialize`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    pub projections: Vec<(&'static str, BootstrapStatus)>,
}

impl BootstrapReport {
    pub fn status_of(&self, name: &str) -> Option<BootstrapStatus> {
        self.projections
            .iter()
            .find(|(projection, _)| *projection == name)
            .map(|(_, status)| *status)
    }

    pub fn rebuilt_count(&self) -> usize {
        self.projections
            .iter()
            .filter(|(_, status)| *status == BootstrapStatus::Rebuilt)
            .count()
    }
}

/// Owner of every projection instance.
pub struct ProjectionEngine {
    config: EngineConfig,
    store: Arc<dyn PrimaryStore>,
    track_lookup: Arc<TrackIdLookup>,
    track_usages: Arc<TrackUsageIndex>,
    track_tree: Arc<TrackTree>,
    journal_index: Arc<SortedJournalIndex>,
}

impl ProjectionEngine {
    /// Loads or rebuilds every projection, then subscribes them to `bus`.
    ///
    /// Missing or corrupt snapshots trigger a rebuild of that projection
    /// only. Scan failures are returned and no engine is produced.
    pub fn initialize(
        config: EngineConfig,
        store: Arc<dyn PrimaryStore>,
        bus: &EventBus,
    ) -> EngineResult<(Self, BootstrapReport)> {
        let started = Instant::now();
        info!(
            "event=engine_initialize module=projection status=start dir={}",
            config.projection_dir.display()
        );
        fs::create_dir_all(&config.projection_dir).map_err(|source| EngineError::Io {
            path: config.projection_dir.clone(),
            source,
        })?;

        let engine = Self {
            track_lookup: Arc::new(Projection::new(&config.projection_dir)),
            track_usages: Arc::new(Projection::new(&config.projection_dir)),
            track_tree: Arc::new(Projection::new(&config.projection_dir)),
            journal_index: Arc::new(Projection::new(&config.projection_dir)),
            config,
            store,
        };

        let mut report = BootstrapReport::default();
        let mut stale: Vec<Arc<dyn ManagedProjection>> = Vec::new();
        for projection in engine.managed() {
            let status = match projection.load() {
                LoadOutcome::Loaded => BootstrapStatus::Loaded,
                LoadOutcome::Missing => {
                    info!(
                        "event=projection_load module=projection status=missing name={}",
                        projection.name()
                    );
                    BootstrapStatus::Rebuilt
                }
                LoadOutcome::Corrupt(reason) => {
                    warn!(
                        "event=projection_load module=projection status=corrupt name={} error={}",
                        projection.name(),
                        reason
                    );
                    BootstrapStatus::Rebuilt
                }
            };
            if status == BootstrapStatus::Rebuilt {
                stale.push(Arc::clone(&projection));
            }
            report.projections.push((projection.name(), status));
        }

        if !stale.is_empty() {
            if let Err(err) = rebuild(engine.store.as_ref(), &stale) {
                error!(
                    "event=engine_initialize module=projection status=error error={}",
                    err
                );
                return Err(err);
            }
        }

        for projection in engine.managed() {
            register(bus, projection);
        }

        info!(
            "event=engine_initialize module=projection status=ok rebuilt={} duration_ms={}",
            report.rebuilt_count(),
            started.elapsed().as_millis()
        );
        Ok((engine, report))
    }

    /// Discards the projection directory and rebuilds every projection.
    ///
    /// On error the projections are left empty and stale: `is_ready` reports
    /// false and no snapshot is written until a later `build` succeeds.
    pub fn build(&mut self) -> EngineResult<()> {
        let started = Instant::now();
        let dir = self.config.projection_dir.clone();
        info!(
            "event=engine_build module=projection status=start dir={}",
            dir.display()
        );
        recreate_dir(&dir)?;
        if let Err(err) = rebuild(self.store.as_ref(), &self.managed()) {
            error!(
                "event=engine_build module=projection status=error error={}",
                err
            );
            return Err(err);
        }
        info!(
            "event=engine_build module=projection status=ok duration_ms={}",
            started.elapsed().as_millis()
        );
        Ok(())
    }

    /// Whether every projection reflects a completed load or rebuild.
    pub fn is_ready(&self) -> bool {
        !self.track_lookup.is_stale()
            && !self.track_usages.is_stale()
            && !self.track_tree.is_stale()
            && !self.journal_index.is_stale()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn PrimaryStore> {
        &self.store
    }

    pub fn track_lookup(&self) -> &Arc<TrackIdLookup> {
        &self.track_lookup
    }

    pub fn track_usages(&self) -> &Arc<TrackUsageIndex> {
        &self.track_usages
    }

    pub fn track_tree(&self) -> &Arc<TrackTree> {
        &self.track_tree
    }

    pub fn journal_index(&self) -> &Arc<SortedJournalIndex> {
        &self.journal_index
    }

    fn managed(&self) -> Vec<Arc<dyn ManagedProjection>> {
        vec![
            Arc::clone(&self.track_lookup) as Arc<dyn ManagedProjection>,
            Arc::clone(&self.track_usages) as Arc<dyn ManagedProjection>,
            Arc::clone(&self.track_tree) as Arc<dyn ManagedProjection>,
            Arc::clone(&self.journal_index) as Arc<dyn ManagedProjection>,
        ]
    }
}

fn register(bus: &EventBus, projection: Arc<dyn ManagedProjection>) {
    for &kind in projection.interests() {
        let target = Arc::clone(&projection);
        // The bus logs handler failures with the subscriber name.
        bus.subscribe(kind, projection.name(), move |event| {
            target
                .handle(event)
                .map(|_| ())
                .map_err(HandlerError::from)
        });
    }
}

fn recreate_dir(dir: &Path) -> EngineResult<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(EngineError::Io {
                path: dir.to_path_buf(),
                source,
            })
        }
    }
    fs::create_dir_all(dir).map_err(|source| EngineError::Io {
        path: dir.to_path_buf(),
        source,
    })
}

fn rebuild(store: &dyn PrimaryStore, targets: &[Arc<dyn ManagedProjection>]) -> EngineResult<()> {
    for projection in targets {
        projection.invalidate();
    }
    let outcome = scan_and_ingest(store, targets);
    if outcome.is_err() {
        for projection in targets {
            projection.invalidate();
        }
    }
    outcome
}

fn scan_and_ingest(
    store: &dyn PrimaryStore,
    targets: &[Arc<dyn ManagedProjection>],
) -> EngineResult<()> {
    let (tracks, entries) = thread::scope(|scope| {
        let tracks = scope.spawn(|| -> StoreResult<usize> {
            let mut count = 0usize;
            store.read_all_tracks(&mut |track| {
                for projection in targets {
                    projection.ingest_track(&track);
                }
                count += 1;
            })?;
            Ok(count)
        });
        let entries = scope.spawn(|| store.read_all_journal_entries());
        (tracks.join(), entries.join())
    });

    let track_count = tracks.map_err(|_| EngineError::ScanPanicked("track"))??;
    let entries: Vec<JournalEntry> = entries.map_err(|_| EngineError::ScanPanicked("journal"))??;

    for entry in &entries {
        for projection in targets {
            projection.ingest_journal_entry(entry);
        }
    }
    for projection in targets {
        projection.persist()?;
        info!(
            "event=projection_rebuild module=projection status=ok name={} tracks={} entries={}",
            projection.name(),
            track_count,
            entries.len()
        );
    }
    Ok(())
}
