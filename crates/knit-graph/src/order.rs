//! Construction Order Linearizer.
//!
//! Produces the single-pass initialization order of a planned graph: a
//! topological sort over `Direct` edges in which every dependency precedes
//! its consumer. Among bindings that are ready at the same time, the one
//! declared first goes first, so identical inputs always produce identical
//! orders.
//!
//! Deferred edges do not constrain the order. When a deferred edge points at
//! a binding constructed at or after its consumer, the target needs a
//! forward-reference slot: declared before anything is constructed, resolved
//! right after the target itself is constructed. [`initialization_steps`]
//! spells that protocol out step by step.

use knit_common::InternalError;
use rustc_hash::FxHashSet;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use tracing::debug;

use crate::graph::{BindingGraph, FxIndexSet};
use crate::key::{KeyId, KeyInterner};

/// Topologically sort `graph` over its direct edges.
///
/// A cycle left in the direct-edge subgraph means deferral planning did not
/// run or did not finish, and is reported as an internal error.
#[tracing::instrument(level = "debug", skip_all, fields(graph = graph.name()))]
pub fn linearize(
    graph: &BindingGraph,
    interner: &KeyInterner,
) -> Result<Vec<KeyId>, InternalError> {
    let adjacency = graph.direct_adjacency();
    let n = adjacency.len();

    // adjacency[consumer] lists dependencies; invert it so finishing a
    // dependency releases its consumers.
    let mut consumers: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut waiting = vec![0usize; n];
    for (consumer, deps) in adjacency.iter().enumerate() {
        let distinct: FxHashSet<usize> = deps.iter().map(|&(target, _)| target).collect();
        waiting[consumer] = distinct.len();
        for target in distinct {
            consumers[target].push(consumer);
        }
    }

    let rank = |position: usize| {
        let ordinal = graph
            .binding_at(position)
            .map_or(u32::MAX, |binding| binding.ordinal);
        Reverse((ordinal, position))
    };

    let mut ready: BinaryHeap<Reverse<(u32, usize)>> = (0..n)
        .filter(|&position| waiting[position] == 0)
        .map(rank)
        .collect();
    let mut order = Vec::with_capacity(n);
    while let Some(Reverse((_, position))) = ready.pop() {
        if let Some(binding) = graph.binding_at(position) {
            order.push(binding.key);
        }
        for &consumer in &consumers[position] {
            waiting[consumer] -= 1;
            if waiting[consumer] == 0 {
                ready.push(rank(consumer));
            }
        }
    }

    if order.len() != n {
        let placed: FxHashSet<KeyId> = order.iter().copied().collect();
        let path = graph
            .keys()
            .filter(|key| !placed.contains(key))
            .map(|key| interner.display(key))
            .collect::<Vec<_>>()
            .join(", ");
        return Err(InternalError::SurvivingCycle {
            path: format!("unordered bindings [{path}]"),
        });
    }

    debug!(bindings = order.len(), "linearized construction order");
    Ok(order)
}

/// Targets of deferred edges that are constructed at or after one of their
/// consumers. Inherited bindings are never constructed locally and need no
/// forward reference.
pub fn forward_references(graph: &BindingGraph, order: &[KeyId]) -> FxIndexSet<KeyId> {
    let position: rustc_hash::FxHashMap<KeyId, usize> =
        order.iter().enumerate().map(|(i, &key)| (key, i)).collect();

    let mut forward = FxIndexSet::default();
    for &consumer in order {
        let Some(binding) = graph.get(consumer) else {
            continue;
        };
        for dep in &binding.dependencies {
            if !dep.indirection.is_deferred() {
                continue;
            }
            let (Some(&at), Some(&consumer_at)) = (position.get(&dep.key), position.get(&consumer))
            else {
                continue;
            };
            let local = graph
                .get(dep.key)
                .is_some_and(|target| target.inherited_from.is_none());
            if local && at >= consumer_at {
                forward.insert(dep.key);
            }
        }
    }
    forward
}

/// One instruction of the generated initialization sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "kebab-case")]
pub enum InitStep {
    /// Allocate an empty forward-reference slot for `key`.
    DeclareForward { key: KeyId },
    Construct { key: KeyId },
    /// Point the forward reference of `key` at the constructed instance.
    ResolveForward { key: KeyId },
}

impl InitStep {
    pub fn key(self) -> KeyId {
        match self {
            Self::DeclareForward { key } | Self::Construct { key } | Self::ResolveForward { key } => {
                key
            }
        }
    }
}

/// Expand a construction order into initialization steps, including the
/// two-phase protocol for every forward reference.
pub fn initialization_steps(graph: &BindingGraph, order: &[KeyId]) -> Vec<InitStep> {
    let forward = forward_references(graph, order);
    let mut steps: Vec<InitStep> = forward
        .iter()
        .map(|&key| InitStep::DeclareForward { key })
        .collect();

    for &key in order {
        let inherited = graph
            .get(key)
            .is_some_and(|binding| binding.inherited_from.is_some());
        if inherited {
            continue;
        }
        steps.push(InitStep::Construct { key });
        if forward.contains(&key) {
            steps.push(InitStep::ResolveForward { key });
        }
    }
    steps
}
