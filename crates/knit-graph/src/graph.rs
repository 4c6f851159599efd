//! The per-level binding graph.
//!
//! An adjacency map keyed by [`KeyId`] with edge metadata on each
//! [`Dependency`]. Insertion order is preserved so every traversal over the
//! graph is deterministic.

use indexmap::{IndexMap, IndexSet};
use knit_common::DeclarationSite;
use rustc_hash::FxBuildHasher;

use crate::binding::{Binding, GraphId};
use crate::key::KeyId;

pub type FxIndexMap<K, V> = IndexMap<K, V, FxBuildHasher>;
pub type FxIndexSet<K> = IndexSet<K, FxBuildHasher>;

/// A collection key whose contributors were gathered by the builder but not
/// yet folded into an aggregate binding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingCollection {
    pub key: KeyId,
    /// Synthetic keys of the contributor bindings, in declaration order.
    pub contributors: Vec<KeyId>,
    /// An explicit "declare this collection" declaration was seen.
    pub declared: bool,
    /// Ordinal of the earliest declaration involved.
    pub ordinal: u32,
    pub site: Option<DeclarationSite>,
}

/// A deferred edge introduced by the cycle planner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
pub struct DeferredEdge {
    pub consumer: KeyId,
    pub dependency: KeyId,
}

#[derive(Clone, Debug)]
pub struct BindingGraph {
    graph: GraphId,
    name: String,
    bindings: FxIndexMap<KeyId, Binding>,
    pending: FxIndexMap<KeyId, PendingCollection>,
    requests: Vec<KeyId>,
}

impl BindingGraph {
    pub fn new(graph: GraphId, name: impl Into<String>) -> Self {
        Self {
            graph,
            name: name.into(),
            bindings: FxIndexMap::default(),
            pending: FxIndexMap::default(),
            requests: Vec::new(),
        }
    }

    pub fn graph(&self) -> GraphId {
        self.graph
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn requests(&self) -> &[KeyId] {
        &self.requests
    }

    pub(crate) fn set_requests(&mut self, requests: Vec<KeyId>) {
        self.requests = requests;
    }

    pub fn get(&self, key: KeyId) -> Option<&Binding> {
        self.bindings.get(&key)
    }

    pub(crate) fn get_mut(&mut self, key: KeyId) -> Option<&mut Binding> {
        self.bindings.get_mut(&key)
    }

    pub fn contains(&self, key: KeyId) -> bool {
        self.bindings.contains_key(&key) || self.pending.contains_key(&key)
    }

    /// Insert a binding, replacing any previous binding for the same key.
    pub fn insert(&mut self, binding: Binding) {
        self.bindings.insert(binding.key, binding);
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = KeyId> + '_ {
        self.bindings.keys().copied()
    }

    pub fn bindings(&self) -> impl Iterator<Item = &Binding> {
        self.bindings.values()
    }

    /// Position of `key` in insertion order.
    pub fn position(&self, key: KeyId) -> Option<usize> {
        self.bindings.get_index_of(&key)
    }

    pub fn binding_at(&self, position: usize) -> Option<&Binding> {
        self.bindings.get_index(position).map(|(_, binding)| binding)
    }

    pub(crate) fn binding_at_mut(&mut self, position: usize) -> Option<&mut Binding> {
        self.bindings
            .get_index_mut(position)
            .map(|(_, binding)| binding)
    }

    pub fn pending_collections(&self) -> impl Iterator<Item = &PendingCollection> {
        self.pending.values()
    }

    pub(crate) fn pending_mut(&mut self) -> &mut FxIndexMap<KeyId, PendingCollection> {
        &mut self.pending
    }

    pub(crate) fn take_pending(&mut self) -> FxIndexMap<KeyId, PendingCollection> {
        std::mem::take(&mut self.pending)
    }

    /// True once every contribution has been folded into an aggregate.
    pub fn is_aggregated(&self) -> bool {
        self.pending.is_empty()
    }

    /// Edges the cycle planner rewrote, in graph order.
    pub fn deferred_edges(&self) -> Vec<DeferredEdge> {
        self.bindings
            .values()
            .flat_map(|binding| {
                binding
                    .dependencies
                    .iter()
                    .filter(|dep| dep.rewritten)
                    .map(move |dep| DeferredEdge {
                        consumer: binding.key,
                        dependency: dep.key,
                    })
            })
            .collect()
    }

    /// Direct-edge adjacency by position; edges to keys outside the graph
    /// are dropped. Each entry is `(target position, dependency slot)`.
    pub fn direct_adjacency(&self) -> Vec<Vec<(usize, usize)>> {
        self.bindings
            .values()
            .map(|binding| {
                binding
                    .dependencies
                    .iter()
                    .enumerate()
                    .filter(|(_, dep)| dep.is_direct())
                    .filter_map(|(slot, dep)| self.position(dep.key).map(|target| (target, slot)))
                    .collect()
            })
            .collect()
    }

    /// Keys of inherited bindings (storage at an ancestor level).
    pub fn inherited(&self) -> impl Iterator<Item = (KeyId, GraphId)> + '_ {
        self.bindings
            .values()
            .filter_map(|binding| binding.inherited_from.map(|owner| (binding.key, owner)))
    }

    pub fn owned_set(&self) -> FxIndexSet<KeyId> {
        self.bindings.keys().copied().collect()
    }
}
