//! Core of the running journal: file-based records of tracks and runs, and
//! the projections that keep list, tree, and range queries cheap.

pub mod app;
pub mod config;
pub mod events;
pub mod fs_util;
pub mod logging;
pub mod model;
pub mod projection;
pub mod service;
pub mod store;

pub use app::{Journal, OpenError};
pub use config::{AppConfig, ConfigError};
pub use events::{DomainEvent, EventBus, EventKind, PublishReport};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::journal::{JournalEntry, JournalEntryId, NewJournalEntry};
pub use model::track::{Coordinates, Track, TrackId};
pub use projection::engine::{
    BootstrapReport, BootstrapStatus, EngineConfig, EngineError, EngineResult, ProjectionEngine,
};
pub use projection::journal_index::SortedJournalIndex;
pub use projection::track_lookup::TrackIdLookup;
pub use projection::track_tree::{TrackTree, TrackTreeEntry, TrackTreeNode};
pub use projection::track_usages::TrackUsageIndex;
pub use projection::{LoadOutcome, ProjectionError};
pub use service::{ServiceError, ServiceResult};
pub use store::{FileStore, NewTrack, PrimaryStore, StoreError, StoreResult};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
