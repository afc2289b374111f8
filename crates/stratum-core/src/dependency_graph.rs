//! # Dependency Graph
//!
//! Directed edges between resources, independent of the containment tree.
//!
//! Edges are kept in registration order. Two adjacency maps (forward and
//! reverse) give constant-time lookup by endpoint; query results are sorted
//! back into registration order so callers see a stable sequence.

use crate::types::{Dependency, ResourceId};
use std::collections::HashMap;

/// Position of an edge in registration order.
type EdgeIndex = usize;

#[derive(Debug, Clone)]
struct StoredEdge {
    from: ResourceId,
    to: ResourceId,
    dependency: Dependency,
}

/// Edge set with forward and reverse adjacency.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    edges: Vec<StoredEdge>,

    /// Forward adjacency: from -> (to -> edge)
    outgoing: HashMap<ResourceId, HashMap<ResourceId, EdgeIndex>>,

    /// Reverse adjacency: to -> (from -> edge)
    incoming: HashMap<ResourceId, HashMap<ResourceId, EdgeIndex>>,
}

impl DependencyGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    #[must_use]
    pub fn edge(&self, from: ResourceId, to: ResourceId) -> Option<&Dependency> {
        self.index_of(from, to)
            .and_then(|index| self.edges.get(index))
            .map(|stored| &stored.dependency)
    }

    #[must_use]
    pub fn has_edge(&self, from: ResourceId, to: ResourceId) -> bool {
        self.index_of(from, to).is_some()
    }

    /// Store an edge. If `(from, to)` is already present the stored edge is
    /// kept and returned unchanged.
    pub fn insert(&mut self, from: ResourceId, to: ResourceId, dependency: Dependency) -> &Dependency {
        let index = match self.index_of(from, to) {
            Some(existing) => existing,
            None => {
                let index = self.edges.len();
                self.edges.push(StoredEdge {
                    from,
                    to,
                    dependency,
                });
                self.outgoing.entry(from).or_default().insert(to, index);
                self.incoming.entry(to).or_default().insert(from, index);
                index
            }
        };
        &self.edges[index].dependency
    }

    /// Record the durable id assigned to an edge by persistence.
    pub fn set_id(&mut self, from: ResourceId, to: ResourceId, id: Option<u64>) {
        if let Some(index) = self.index_of(from, to) {
            if let Some(stored) = self.edges.get_mut(index) {
                stored.dependency.id = id;
            }
        }
    }

    /// Edges leaving `from`, in registration order.
    #[must_use]
    pub fn outgoing(&self, from: ResourceId) -> Vec<&Dependency> {
        self.collect(self.outgoing.get(&from))
    }

    /// Edges entering `to`, in registration order.
    #[must_use]
    pub fn incoming(&self, to: ResourceId) -> Vec<&Dependency> {
        self.collect(self.incoming.get(&to))
    }

    /// Every edge with its endpoint handles, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (ResourceId, ResourceId, &Dependency)> {
        self.edges
            .iter()
            .map(|stored| (stored.from, stored.to, &stored.dependency))
    }

    /// Remove every edge and return the ones accepted by `keep`,
    /// in registration order.
    pub fn drain_retaining(
        &mut self,
        mut keep: impl FnMut(ResourceId, ResourceId, &Dependency) -> bool,
    ) -> Vec<(ResourceId, ResourceId, Dependency)> {
        self.outgoing.clear();
        self.incoming.clear();
        std::mem::take(&mut self.edges)
            .into_iter()
            .filter(|stored| keep(stored.from, stored.to, &stored.dependency))
            .map(|stored| (stored.from, stored.to, stored.dependency))
            .collect()
    }

    fn index_of(&self, from: ResourceId, to: ResourceId) -> Option<EdgeIndex> {
        self.outgoing
            .get(&from)
            .and_then(|targets| targets.get(&to))
            .copied()
    }

    fn collect(&self, adjacency: Option<&HashMap<ResourceId, EdgeIndex>>) -> Vec<&Dependency> {
        let mut indices: Vec<EdgeIndex> = adjacency
            .map(|map| map.values().copied().collect())
            .unwrap_or_default();
        indices.sort_unstable();
        indices
            .into_iter()
            .filter_map(|index| self.edges.get(index))
            .map(|stored| &stored.dependency)
            .collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================
