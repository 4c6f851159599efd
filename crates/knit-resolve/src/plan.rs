//! The resolution output handed to the code generator.
//!
//! Levels appear in pre-order: a graph's plan precedes the plans of its
//! nested graphs. Keys are referenced by [`KeyId`]; [`ResolutionPlan::keys`]
//! maps each id to its display form.

use knit_graph::{
    Binding, BindingGraph, CollectionKind, DeferredEdge, GraphId, Indirection, InitStep, KeyId,
    KeyInterner, Scope,
};
use serde::Serialize;

use crate::level::StorageSlot;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionPlan {
    pub keys: Vec<KeyEntry>,
    pub levels: Vec<LevelPlan>,
}

impl ResolutionPlan {
    pub fn level(&self, graph: &str) -> Option<&LevelPlan> {
        self.levels.iter().find(|level| level.graph == graph)
    }

    pub fn display(&self, key: KeyId) -> Option<&str> {
        self.keys.get(key.index()).map(|entry| entry.display.as_str())
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyEntry {
    pub id: KeyId,
    pub display: String,
}

impl KeyEntry {
    pub(crate) fn table(interner: &KeyInterner) -> Vec<Self> {
        interner
            .iter()
            .map(|(id, key)| Self {
                id,
                display: key.to_string(),
            })
            .collect()
    }
}

/// Everything the code generator needs for one graph.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelPlan {
    pub graph: String,
    #[serde(skip)]
    pub graph_id: GraphId,
    pub depth: u32,
    /// Index of the parent graph's plan in [`ResolutionPlan::levels`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<usize>,
    pub construction_order: Vec<KeyId>,
    pub bindings: Vec<BindingPlan>,
    /// Storage owned by this level, including slots read by nested graphs.
    pub slots: Vec<StorageSlot>,
    /// Keys this level reads from its ancestors; threaded into its
    /// constructor.
    pub consumed_from_parent: Vec<KeyId>,
    pub init_steps: Vec<InitStep>,
    pub deferred_edges: Vec<DeferredEdge>,
    pub aggregates: Vec<AggregatePlan>,
}

impl LevelPlan {
    pub fn binding(&self, key: KeyId) -> Option<&BindingPlan> {
        self.bindings.iter().find(|binding| binding.key == key)
    }

    pub fn slot(&self, key: KeyId) -> Option<&StorageSlot> {
        self.slots.iter().find(|slot| slot.key == key)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingPlan {
    pub key: KeyId,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
    pub source: BindingSource,
    pub dependencies: Vec<DependencyPlan>,
}

impl BindingPlan {
    pub(crate) fn new(binding: &Binding, source: BindingSource) -> Self {
        Self {
            key: binding.key,
            kind: binding.kind.label(),
            scope: binding.scope.clone(),
            source,
            dependencies: binding
                .dependencies
                .iter()
                .map(|dep| DependencyPlan {
                    key: dep.key,
                    indirection: dep.indirection,
                    rewritten: dep.rewritten,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyPlan {
    pub key: KeyId,
    pub indirection: Indirection,
    /// Deferred by the cycle planner rather than declared deferred.
    pub rewritten: bool,
}

/// How the generated code obtains a binding's value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "from", rename_all = "kebab-case")]
pub enum BindingSource {
    /// Constructed on every use.
    Local,
    /// Memoized in a slot of this level.
    OwnField { slot: String },
    /// Memoized in a slot of an ancestor level.
    AncestorField {
        /// Depth of the owning level.
        depth: usize,
        graph: String,
        slot: String,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatePlan {
    pub key: KeyId,
    pub collection: CollectionKind,
    pub contributors: Vec<KeyId>,
    /// A declared collection without contributors: one shared empty
    /// instance.
    pub is_empty: bool,
}

impl AggregatePlan {
    pub(crate) fn collect(graph: &BindingGraph) -> Vec<Self> {
        graph
            .bindings()
            .filter_map(|binding| {
                binding.aggregate().map(|aggregate| Self {
                    key: binding.key,
                    collection: aggregate.collection,
                    contributors: aggregate.contributors.clone(),
                    is_empty: aggregate.is_empty(),
                })
            })
            .collect()
    }
}
