//! Folder hierarchy of tracks.
//!
//! # Responsibility
//! - Group tracks under their ancestor path for tree navigation.
//! - Serve filtered copies without touching the live tree.
//!
//! # Invariants
//! - A track id appears at most once in the whole tree.
//! - Child nodes are ordered by name, tracks by `(name, id)`.
//! - Folder nodes without tracks and without children are pruned.

use super::{Projection, ProjectionState};
use crate::events::{DomainEvent, EventKind};
use crate::model::track::{Track, TrackId};
use serde::{Deserialize, Serialize};

/// One track as shown inside a tree node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackTreeEntry {
    pub id: TrackId,
    pub name: String,
    /// Route length in meters.
    pub length: u32,
}

/// A folder in the track hierarchy. The root has an empty name.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackTreeNode {
    pub name: String,
    #[serde(default)]
    pub tracks: Vec<TrackTreeEntry>,
    #[serde(default)]
    pub nodes: Vec<TrackTreeNode>,
}

impl TrackTreeNode {
    fn folder(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty() && self.nodes.is_empty()
    }

    /// Number of tracks in this subtree.
    pub fn track_count(&self) -> usize {
        self.tracks.len() + self.nodes.iter().map(Self::track_count).sum::<usize>()
    }

    /// Finds the entry for `id` anywhere in this subtree.
    pub fn find(&self, id: &str) -> Option<&TrackTreeEntry> {
        self.tracks
            .iter()
            .find(|entry| entry.id == id)
            .or_else(|| self.nodes.iter().find_map(|node| node.find(id)))
    }

    /// Returns the path of folder names leading to the entry for `id`.
    pub fn path_of(&self, id: &str) -> Option<Vec<String>> {
        if self.tracks.iter().any(|entry| entry.id == id) {
            return Some(Vec::new());
        }
        self.nodes.iter().find_map(|node| {
            node.path_of(id).map(|mut rest| {
                rest.insert(0, node.name.clone());
                rest
            })
        })
    }

    /// Returns a pruned copy that keeps only tracks whose name contains
    /// `query`, compared case-insensitively.
    ///
    /// A blank query returns the whole tree; no match returns an empty node
    /// with this node's name.
    pub fn filter(&self, query: &str) -> TrackTreeNode {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.clone();
        }
        self.filtered(&needle)
            .unwrap_or_else(|| TrackTreeNode::folder(&self.name))
    }

    fn filtered(&self, needle: &str) -> Option<TrackTreeNode> {
        let tracks: Vec<TrackTreeEntry> = self
            .tracks
            .iter()
            .filter(|entry| entry.name.to_lowercase().contains(needle))
            .cloned()
            .collect();
        let nodes: Vec<TrackTreeNode> = self
            .nodes
            .iter()
            .filter_map(|node| node.filtered(needle))
            .collect();
        if tracks.is_empty() && nodes.is_empty() {
            return None;
        }
        Some(TrackTreeNode {
            name: self.name.clone(),
            tracks,
            nodes,
        })
    }

    fn insert(&mut self, parents: &[String], entry: TrackTreeEntry) {
        let Some((head, rest)) = parents.split_first() else {
            let position = self
                .tracks
                .binary_search_by(|existing| {
                    (existing.name.as_str(), existing.id.as_str())
                        .cmp(&(entry.name.as_str(), entry.id.as_str()))
                })
                .unwrap_or_else(|index| index);
            self.tracks.insert(position, entry);
            return;
        };
        let index = match self
            .nodes
            .binary_search_by(|existing| existing.name.as_str().cmp(head.as_str()))
        {
            Ok(index) => index,
            Err(index) => {
                self.nodes.insert(index, TrackTreeNode::folder(head));
                index
            }
        };
        self.nodes[index].insert(rest, entry);
    }

    /// Removes every occurrence of `id` depth-first and prunes folders left
    /// empty. Returns the last removed entry.
    fn remove(&mut self, id: &str) -> Option<TrackTreeEntry> {
        let mut removed = None;
        self.tracks.retain(|entry| {
            if entry.id == id {
                removed = Some(entry.clone());
                false
            } else {
                true
            }
        });
        for node in &mut self.nodes {
            if let Some(entry) = node.remove(id) {
                removed = Some(entry);
            }
        }
        self.nodes.retain(|node| !node.is_empty());
        removed
    }
}

impl ProjectionState for TrackTreeNode {
    const NAME: &'static str = "trackTree";
    const INTERESTS: &'static [EventKind] = &[
        EventKind::TrackUpserted,
        EventKind::TrackMoved,
        EventKind::TrackDeleted,
    ];

    fn ingest_track(&mut self, track: &Track) {
        self.remove(&track.id);
        self.insert(
            &track.parents,
            TrackTreeEntry {
                id: track.id.clone(),
                name: track.name.clone(),
                length: track.length(),
            },
        );
    }

    fn apply(&mut self, event: &DomainEvent) -> bool {
        match event {
            DomainEvent::TrackUpserted(event) => {
                let entry = TrackTreeEntry {
                    id: event.id.clone(),
                    name: event.name.clone(),
                    length: event.length,
                };
                let unchanged = self.find(&event.id) == Some(&entry)
                    && self.path_of(&event.id).as_deref() == Some(event.parents.as_slice());
                if unchanged {
                    return false;
                }
                self.remove(&event.id);
                self.insert(&event.parents, entry);
                true
            }
            DomainEvent::TrackMoved(event) => {
                if self.path_of(&event.id).as_deref() == Some(event.new_parents.as_slice()) {
                    return false;
                }
                match self.remove(&event.id) {
                    Some(entry) => {
                        self.insert(&event.new_parents, entry);
                        true
                    }
                    None => false,
                }
            }
            DomainEvent::TrackDeleted(event) => self.remove(&event.id).is_some(),
            _ => false,
        }
    }
}

/// Live track tree.
pub type TrackTree = Projection<TrackTreeNode>;

impl Projection<TrackTreeNode> {
    /// Owned copy of the whole tree.
    pub fn get(&self) -> TrackTreeNode {
        self.snapshot()
    }

    /// Filtered copy of the tree, see `TrackTreeNode::filter`.
    pub fn filter(&self, query: &str) -> TrackTreeNode {
        self.read().filter(query)
    }
}

#[cfg(test)]
mod tests {
    use super::TrackTreeNode;
    use crate::events::{DomainEvent, TrackDeleted, TrackMoved, TrackUpserted};
    use crate::model::track::Track;
    use crate::projection::ProjectionState;

    fn path(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|part| part.to_string()).collect()
    }

    fn upserted(id: &str, name: &str, parents: &[&str]) -> DomainEvent {
        TrackUpserted {
            id: id.to_string(),
            name: name.to_string(),
            parents: path(parents),
            length: 1200,
        }
        .into()
    }

    #[test]
    fn upsert_creates_folders_and_moves_existing_entry() {
        let mut tree = TrackTreeNode::default();
        tree.apply(&upserted("t1", "River", &["Town", "North"]));
        tree.apply(&upserted("t1", "River", &["Town"]));

        assert_eq!(tree.track_count(), 1);
        assert_eq!(tree.path_of("t1"), Some(path(&["Town"])));
        assert_eq!(tree.nodes.len(), 1);
        assert!(tree.nodes[0].nodes.is_empty());
    }

    #[test]
    fn identical_upsert_reports_no_change() {
        let mut tree = TrackTreeNode::default();
        tree.apply(&upserted("t1", "River", &["Town"]));
        assert!(!tree.apply(&upserted("t1", "River", &["Town"])));
    }

    #[test]
    fn move_keeps_entry_and_ignores_unknown_ids() {
        let mut tree = TrackTreeNode::default();
        tree.apply(&upserted("t1", "A", &[]));
        let moved = |id: &str| -> DomainEvent {
            TrackMoved {
                id: id.to_string(),
                old_parents: Vec::new(),
                new_parents: path(&["Region"]),
            }
            .into()
        };

        assert!(tree.apply(&moved("t1")));
        assert!(tree.tracks.is_empty());
        assert_eq!(tree.nodes[0].name, "Region");
        assert_eq!(tree.nodes[0].tracks[0].length, 1200);
        assert!(!tree.apply(&moved("ghost")));
    }

    #[test]
    fn delete_removes_duplicates_and_prunes_folders() {
        let mut tree = TrackTreeNode::default();
        tree.ingest_track(&Track::with_id("t1", "A", path(&["X"])));
        let tracks = tree.nodes[0].tracks.clone();
        tree.nodes[0].nodes.push(TrackTreeNode {
            name: "Y".to_string(),
            tracks,
            nodes: Vec::new(),
        });

        let delete: DomainEvent = TrackDeleted {
            id: "t1".to_string(),
        }
        .into();
        assert!(tree.apply(&delete));
        assert!(tree.is_empty());
        assert!(!tree.apply(&delete));
    }

    #[test]
    fn children_are_sorted_regardless_of_insert_order() {
        let mut forward = TrackTreeNode::default();
        let mut backward = TrackTreeNode::default();
        let tracks = [
            Track::with_id("t1", "b", path(&["Z"])),
            Track::with_id("t2", "a", path(&["Z"])),
            Track::with_id("t3", "c", path(&["A"])),
        ];
        tracks.iter().for_each(|track| forward.ingest_track(track));
        tracks
            .iter()
            .rev()
            .for_each(|track| backward.ingest_track(track));

        assert_eq!(forward, backward);
        assert_eq!(forward.nodes[0].name, "A");
        assert_eq!(forward.nodes[1].tracks[0].name, "a");
    }

    #[test]
    fn filter_is_case_insensitive_and_prunes_branches() {
        let mut tree = TrackTreeNode::default();
        tree.ingest_track(&Track::with_id("t1", "Forest Loop", path(&["Park"])));
        tree.ingest_track(&Track::with_id("t2", "Harbour", path(&["City"])));

        let filtered = tree.filter("  LOOP ");
        assert_eq!(filtered.nodes.len(), 1);
        assert_eq!(filtered.nodes[0].name, "Park");
        assert_eq!(tree.track_count(), 2);

        assert_eq!(tree.filter(""), tree);
        assert!(tree.filter("nothing").is_empty());
    }
}
