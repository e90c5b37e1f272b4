//! Wiring of bus, primary store, and projection engine for one data
//! directory.

use crate::config::{AppConfig, ConfigError};
use crate::events::EventBus;
use crate::projection::engine::{BootstrapReport, EngineError, ProjectionEngine};
use crate::service::dashboard_service::DashboardService;
use crate::service::journal_list_service::JournalListService;
use crate::service::track_editor_service::TrackEditorService;
use crate::service::track_tree_service::TrackTreeService;
use crate::store::{FileStore, PrimaryStore, StoreError};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Errors from opening a journal.
#[derive(Debug)]
pub enum OpenError {
    Config(ConfigError),
    Store(StoreError),
    Engine(EngineError),
}

impl Display for OpenError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "invalid configuration: {err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Engine(err) => write!(f, "{err}"),
        }
    }
}

impl Error for OpenError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Engine(err) => Some(err),
        }
    }
}

impl From<ConfigError> for OpenError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<StoreError> for OpenError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<EngineError> for OpenError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

/// An opened journal: one store, one bus, one set of projections.
pub struct Journal {
    config: AppConfig,
    bus: Arc<EventBus>,
    store: Arc<FileStore>,
    engine: ProjectionEngine,
}

impl Journal {
    /// Validates `config`, prepares the store, and bootstraps projections.
    ///
    /// Logging is left to the caller.
    pub fn open(config: AppConfig) -> Result<(Self, BootstrapReport), OpenError> {
        config.validate()?;
        let bus = Arc::new(EventBus::new());
        let store = Arc::new(FileStore::new(config.data_dir.clone(), Arc::clone(&bus)));
        store.init()?;

        let (engine, report) = ProjectionEngine::initialize(
            config.engine_config(),
            Arc::clone(&store) as Arc<dyn PrimaryStore>,
            &bus,
        )?;
        info!(
            "event=journal_open module=core status=ok data_dir={} rebuilt={}",
            config.data_dir.display(),
            report.rebuilt_count()
        );
        Ok((
            Self {
                config,
                bus,
                store,
                engine,
            },
            report,
        ))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    pub fn engine(&self) -> &ProjectionEngine {
        &self.engine
    }

    /// Forces a full projection rebuild.
    pub fn rebuild(&mut self) -> Result<(), EngineError> {
        self.engine.build()
    }

    pub fn track_tree_service(&self) -> TrackTreeService {
        TrackTreeService::from_engine(&self.engine)
    }

    pub fn journal_list_service(&self) -> JournalListService {
        JournalListService::from_engine(&self.engine)
    }

    pub fn dashboard_service(&self) -> DashboardService {
        DashboardService::from_engine(&self.engine)
    }

    pub fn track_editor_service(&self) -> TrackEditorService {
        TrackEditorService::from_engine(&self.engine)
    }
}
