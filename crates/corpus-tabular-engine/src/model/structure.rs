use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::item::{ContainerId, ItemId};

/// Source endpoint of a dependency edge.
///
/// Edges are created target-first while streaming; the source is attached at
/// batch end, so `Unset` is the in-flight state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeSource {
    Unset,
    /// The artificial root node.
    Root,
    Item(ItemId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: EdgeSource,
    pub target: ItemId,
}

/// A built dependency structure over one batch of items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    pub nodes: Vec<ItemId>,
    pub edges: Vec<Edge>,
    /// Container whose items the structure spans.
    pub boundary: Option<ContainerId>,
    /// Positional index mirrored from the boundary container.
    pub index: usize,
    pub augmented: bool,
    pub alive: bool,
}

impl Structure {
    /// Edges attached to the artificial root.
    pub fn root_edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges
            .iter()
            .filter(|e| e.source == EdgeSource::Root)
    }
}

/// Structure assembly contract. One builder instance is reused across
/// batches; `build` drains the accumulated state.
pub trait StructureBuilder {
    /// Creates an edge targeting `target`, with the source left unset.
    fn new_edge(&mut self, target: ItemId) -> Edge;
    fn add_nodes(&mut self, nodes: &[ItemId]);
    fn add_edges(&mut self, edges: Vec<Edge>);
    fn set_boundary_container(&mut self, container: ContainerId);
    fn build(&mut self) -> Structure;
}

/// Output cache a structure layer publishes into, keyed by the boundary
/// container's positional index.
pub trait StructureCache {
    fn publish(&mut self, index: usize, structure: Structure);
}

/// In-memory [`StructureBuilder`].
#[derive(Debug, Default)]
pub struct MemoryStructureBuilder {
    nodes: Vec<ItemId>,
    edges: Vec<Edge>,
    boundary: Option<ContainerId>,
}

impl MemoryStructureBuilder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StructureBuilder for MemoryStructureBuilder {
    fn new_edge(&mut self, target: ItemId) -> Edge {
        Edge {
            source: EdgeSource::Unset,
            target,
        }
    }

    fn add_nodes(&mut self, nodes: &[ItemId]) {
        self.nodes.extend_from_slice(nodes);
    }

    fn add_edges(&mut self, edges: Vec<Edge>) {
        self.edges.extend(edges);
    }

    fn set_boundary_container(&mut self, container: ContainerId) {
        self.boundary = Some(container);
    }

    fn build(&mut self) -> Structure {
        Structure {
            nodes: std::mem::take(&mut self.nodes),
            edges: std::mem::take(&mut self.edges),
            boundary: self.boundary.take(),
            index: 0,
            augmented: false,
            alive: false,
        }
    }
}

/// In-memory [`StructureCache`].
#[derive(Debug, Default)]
pub struct MemoryStructureCache {
    structures: BTreeMap<usize, Structure>,
}

impl MemoryStructureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: usize) -> Option<&Structure> {
        self.structures.get(&index)
    }

    pub fn len(&self) -> usize {
        self.structures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.structures.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Structure)> {
        self.structures.iter().map(|(i, s)| (*i, s))
    }
}

impl StructureCache for MemoryStructureCache {
    fn publish(&mut self, index: usize, structure: Structure) {
        self.structures.insert(index, structure);
    }
}
