//! Track tree use-case service.

use crate::projection::engine::ProjectionEngine;
use crate::projection::track_tree::{TrackTree, TrackTreeNode};
use std::sync::Arc;

/// Serves the folder hierarchy of tracks.
pub struct TrackTreeService {
    tree: Arc<TrackTree>,
}

impl TrackTreeService {
    pub fn new(tree: Arc<TrackTree>) -> Self {
        Self { tree }
    }

    pub fn from_engine(engine: &ProjectionEngine) -> Self {
        Self::new(Arc::clone(engine.track_tree()))
    }

    /// Whole tree, or a pruned copy when `filter` is non-blank.
    pub fn tree(&self, filter: Option<&str>) -> TrackTreeNode {
        match filter.map(str::trim).filter(|query| !query.is_empty()) {
            Some(query) => self.tree.filter(query),
            None => self.tree.get(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TrackTreeService;
    use crate::model::track::Track;
    use crate::projection::track_tree::TrackTree;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn blank_filter_returns_whole_tree() {
        let dir = tempdir().unwrap();
        let tree = Arc::new(TrackTree::new(dir.path()));
        tree.ingest_track(&Track::with_id("t1", "Hill", vec!["Park".to_string()]));
        tree.ingest_track(&Track::with_id("t2", "Quay", Vec::new()));
        let service = TrackTreeService::new(Arc::clone(&tree));

        assert_eq!(service.tree(None).track_count(), 2);
        assert_eq!(service.tree(Some("   ")).track_count(), 2);
        let filtered = service.tree(Some("hil"));
        assert_eq!(filtered.track_count(), 1);
        assert!(filtered.tracks.is_empty());
    }
}
