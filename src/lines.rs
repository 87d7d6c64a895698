use std::collections::{HashMap, HashSet};

use crate::geo::{self, Coordinate};
use crate::plan::ItemId;

/// Identity of one entry in the expanded item stream: a top-level item, or one of its children.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeKey {
    pub item: ItemId,
    pub child: Option<usize>,
}

impl NodeKey {
    pub fn item(item: ItemId) -> Self {
        Self { item, child: None }
    }

    pub fn child(item: ItemId, index: usize) -> Self {
        Self {
            item,
            child: Some(index),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PathNode {
    pub key: NodeKey,
    pub coordinate: Coordinate,
}

/// Directed connecting segment between two adjacent path entries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WaypointLine {
    pub from: NodeKey,
    pub to: NodeKey,
    pub start: Coordinate,
    pub end: Coordinate,
    /// Horizontal length, meters.
    pub distance: f64,
    /// Degrees, [0, 360).
    pub bearing: f64,
}

impl WaypointLine {
    fn between(from: PathNode, to: PathNode) -> Self {
        Self {
            from: from.key,
            to: to.key,
            start: from.coordinate,
            end: to.coordinate,
            distance: geo::distance(from.coordinate, to.coordinate),
            bearing: geo::bearing(from.coordinate, to.coordinate),
        }
    }
}

type PairKey = (NodeKey, NodeKey);

/// Memoized segment geometry keyed by endpoint identity.
///
/// Because keys are identities, callers must invalidate a node whenever its coordinate
/// changes; the cache never compares coordinates.
#[derive(Clone, Debug, Default)]
pub struct LineCache {
    entries: HashMap<PairKey, WaypointLine>,
    computed: u64,
}

impl LineCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached segment for the pair, computing it on a miss.
    pub fn line(&mut self, from: PathNode, to: PathNode) -> WaypointLine {
        let computed = &mut self.computed;
        *self
            .entries
            .entry((from.key, to.key))
            .or_insert_with(|| {
                *computed += 1;
                WaypointLine::between(from, to)
            })
    }

    /// Drops the incoming and outgoing segments of one node.
    pub fn invalidate_node(&mut self, key: NodeKey) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(a, b), _| *a != key && *b != key);
        before - self.entries.len()
    }

    /// Drops every segment touching the item or any of its children.
    pub fn evict_item(&mut self, item: ItemId) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|(a, b), _| a.item != item && b.item != item);
        before - self.entries.len()
    }

    /// Keeps only segments whose endpoints are still adjacent.
    pub fn retain_pairs(&mut self, live: &HashSet<PairKey>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|pair, _| live.contains(pair));
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of segments computed since creation (cache misses).
    pub fn computed(&self) -> u64 {
        self.computed
    }
}
