//! Cycle Detector & Deferral Planner.
//!
//! Only `Direct` edges can form a cycle: a consumer holding a provider or
//! lazy handle does not need the value while it is being constructed.
//!
//! Planning runs in rounds:
//!
//! 1. Find the strongly connected components of the direct-edge subgraph
//!    (iterative Tarjan). Components of one node count only if the node
//!    depends on itself.
//! 2. Enumerate the elementary cycles of each component, up to
//!    `max_cycle_search` cycles and the [`SearchProfile::CycleSearch`] step
//!    budget.
//! 3. A cycle without a reclassifiable edge (direct and declared
//!    deferrable) cannot be broken and is reported with its full path.
//! 4. Otherwise each cycle not yet broken gets one edge rewritten to
//!    `ProviderWrapped`: the reclassifiable edge taking part in the fewest
//!    enumerated cycles, ties broken by declaration order of the consumer
//!    and then by dependency position.
//!
//! When enumeration runs out of budget before finding any cycle of a
//! component (very long cycles, or planning rounds used up), the component
//! itself is used: its earliest reclassifiable internal edge is deferred,
//! or, if it has none, a shortest cycle through it is reported.
//!
//! Rounds repeat until the direct-edge subgraph is acyclic. Rewritten edges
//! are flagged so the code generator emits the two-phase forward-reference
//! protocol for their targets.

use fixedbitset::FixedBitSet;
use knit_common::{Diagnostic, DiagnosticReporter, Halt, ResolverOptions, diagnostic_codes, limits};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use tracing::{debug, warn};

use crate::binding::Indirection;
use crate::graph::BindingGraph;
use crate::key::KeyInterner;
use crate::recursion::{PathGuard, PathStep, SearchProfile};

/// One direct edge, by graph position and dependency slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeRef {
    pub consumer: usize,
    pub slot: usize,
    pub target: usize,
}

type Adjacency = [Vec<(usize, usize)>];

/// Rewrite direct edges until the direct-edge subgraph of `graph` is
/// acyclic, or report the cycles that cannot be broken.
#[tracing::instrument(level = "debug", skip_all, fields(graph = graph.name()))]
pub fn plan(
    mut graph: BindingGraph,
    options: &ResolverOptions,
    interner: &KeyInterner,
    reporter: &mut dyn DiagnosticReporter,
) -> Result<BindingGraph, Halt> {
    let max_cycles = options.max_cycle_search.max(1) as usize;

    // Every round that does not fail defers at least one direct edge, so
    // the loop ends after at most one round per edge.
    let mut round = 0u32;
    loop {
        let adjacency = graph.direct_adjacency();
        let components = strongly_connected(&adjacency);
        if components.is_empty() {
            debug!(round, "direct-edge subgraph is acyclic");
            return Ok(graph);
        }
        let enumerate = round < limits::MAX_PLANNING_ROUNDS;
        if round == limits::MAX_PLANNING_ROUNDS {
            warn!(
                graph = graph.name(),
                components = components.len(),
                "planning rounds exhausted, deferring one edge per component"
            );
        }
        round = round.saturating_add(1);

        let mut fatal = false;
        let mut rewrites: Vec<EdgeRef> = Vec::new();
        for component in &components {
            let cycles = if enumerate {
                elementary_cycles(&adjacency, component, max_cycles)
            } else {
                Vec::new()
            };
            debug!(
                round,
                members = component.len(),
                cycles = cycles.len(),
                "planning cyclic component"
            );

            if cycles.is_empty() {
                // The search budget ran out before a single cycle was found.
                match component_deferral(&graph, &adjacency, component) {
                    Some(edge) => rewrites.push(edge),
                    None => {
                        let cycle = cycle_through_first(&adjacency, component);
                        report_unbreakable(&graph, &cycle, interner, reporter);
                        fatal = true;
                    }
                }
                continue;
            }

            let mut breakable = Vec::with_capacity(cycles.len());
            for cycle in cycles {
                if cycle.iter().any(|edge| is_reclassifiable(&graph, *edge)) {
                    breakable.push(cycle);
                } else {
                    report_unbreakable(&graph, &cycle, interner, reporter);
                    fatal = true;
                }
            }
            if !fatal {
                rewrites.extend(select_deferrals(&graph, &breakable));
            }
        }

        if fatal {
            return Err(Halt::SkipGraph);
        }
        for edge in rewrites {
            defer(&mut graph, edge, interner);
        }
    }
}

fn ordinal(graph: &BindingGraph, edge: &EdgeRef) -> u32 {
    graph
        .binding_at(edge.consumer)
        .map_or(u32::MAX, |binding| binding.ordinal)
}

/// The reclassifiable edge between two members of `component` with the
/// earliest declared consumer. Every such edge lies on a cycle.
fn component_deferral(
    graph: &BindingGraph,
    adjacency: &Adjacency,
    component: &[usize],
) -> Option<EdgeRef> {
    let mut members = FixedBitSet::with_capacity(adjacency.len());
    for &member in component {
        members.insert(member);
    }
    component
        .iter()
        .flat_map(|&consumer| {
            adjacency[consumer]
                .iter()
                .map(move |&(target, slot)| EdgeRef {
                    consumer,
                    slot,
                    target,
                })
        })
        .filter(|edge| members.contains(edge.target) && is_reclassifiable(graph, *edge))
        .min_by_key(|edge| (ordinal(graph, edge), edge.slot))
}

/// A shortest cycle through the smallest member of `component`, found
/// breadth first so its length is not bounded by the path guard.
fn cycle_through_first(adjacency: &Adjacency, component: &[usize]) -> Vec<EdgeRef> {
    let Some(&start) = component.first() else {
        return Vec::new();
    };
    let mut members = FixedBitSet::with_capacity(adjacency.len());
    for &member in component {
        members.insert(member);
    }

    let mut reached_by: FxHashMap<usize, EdgeRef> = FxHashMap::default();
    let mut queue = VecDeque::from([start]);
    while let Some(node) = queue.pop_front() {
        for &(target, slot) in &adjacency[node] {
            if !members.contains(target) {
                continue;
            }
            let edge = EdgeRef {
                consumer: node,
                slot,
                target,
            };
            if target == start {
                let mut cycle = vec![edge];
                let mut at = node;
                while at != start {
                    let Some(&previous) = reached_by.get(&at) else {
                        break;
                    };
                    cycle.push(previous);
                    at = previous.consumer;
                }
                cycle.reverse();
                return cycle;
            }
            if !reached_by.contains_key(&target) {
                reached_by.insert(target, edge);
                queue.push_back(target);
            }
        }
    }
    Vec::new()
}

fn is_reclassifiable(graph: &BindingGraph, edge: EdgeRef) -> bool {
    graph
        .binding_at(edge.consumer)
        .and_then(|binding| binding.dependencies.get(edge.slot))
        .is_some_and(|dep| dep.is_reclassifiable())
}

/// Pick one edge per cycle so every cycle loses at least one direct edge.
fn select_deferrals(graph: &BindingGraph, cycles: &[Vec<EdgeRef>]) -> Vec<EdgeRef> {
    let mut participation: FxHashMap<EdgeRef, usize> = FxHashMap::default();
    for cycle in cycles {
        for &edge in cycle {
            *participation.entry(edge).or_default() += 1;
        }
    }

    let mut chosen: FxHashSet<EdgeRef> = FxHashSet::default();
    let mut selected = Vec::new();
    for cycle in cycles {
        if cycle.iter().any(|edge| chosen.contains(edge)) {
            continue;
        }
        let best = cycle
            .iter()
            .filter(|edge| is_reclassifiable(graph, **edge))
            .min_by_key(|edge| (participation[*edge], ordinal(graph, edge), edge.slot));
        if let Some(&edge) = best {
            chosen.insert(edge);
            selected.push(edge);
        }
    }
    selected
}

fn defer(graph: &mut BindingGraph, edge: EdgeRef, interner: &KeyInterner) {
    let Some(binding) = graph.binding_at_mut(edge.consumer) else {
        return;
    };
    let consumer = binding.key;
    if let Some(dep) = binding.dependencies.get_mut(edge.slot) {
        dep.indirection = Indirection::ProviderWrapped;
        dep.rewritten = true;
        debug!(
            consumer = %interner.display(consumer),
            dependency = %interner.display(dep.key),
            "deferred edge to break cycle"
        );
    }
}

fn report_unbreakable(
    graph: &BindingGraph,
    cycle: &[EdgeRef],
    interner: &KeyInterner,
    reporter: &mut dyn DiagnosticReporter,
) {
    let display = |position: usize| {
        graph
            .binding_at(position)
            .map(|binding| interner.display(binding.key))
            .unwrap_or_default()
    };

    let mut path: Vec<String> = cycle.iter().map(|edge| display(edge.consumer)).collect();
    if let Some(first) = cycle.first() {
        path.push(display(first.consumer));
    }
    let path = path.join(" -> ");

    let start = cycle.first().and_then(|edge| graph.binding_at(edge.consumer));
    let mut diagnostic = Diagnostic::error(diagnostic_codes::UNBREAKABLE_CYCLE, &[&path])
        .at(start.and_then(|binding| binding.site.clone()))
        .in_graph(graph.name());
    for edge in cycle {
        if let Some(binding) = graph.binding_at(edge.consumer) {
            diagnostic = diagnostic.with_related(
                binding.site.clone(),
                format!(
                    "{} requests {} directly",
                    display(edge.consumer),
                    display(edge.target)
                ),
            );
        }
    }
    reporter.report(diagnostic);
}

// =============================================================================
// Strongly connected components
// =============================================================================

/// Cyclic strongly connected components, each sorted, ordered by their
/// smallest member.
pub fn strongly_connected(adjacency: &Adjacency) -> Vec<Vec<usize>> {
    const UNVISITED: usize = usize::MAX;

    let n = adjacency.len();
    let mut index = vec![UNVISITED; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = FixedBitSet::with_capacity(n);
    let mut stack: Vec<usize> = Vec::new();
    let mut call: Vec<(usize, usize)> = Vec::new();
    let mut next_index = 0usize;
    let mut components = Vec::new();

    for root in 0..n {
        if index[root] != UNVISITED {
            continue;
        }
        index[root] = next_index;
        lowlink[root] = next_index;
        next_index += 1;
        stack.push(root);
        on_stack.insert(root);
        call.push((root, 0));

        while let Some(frame) = call.last_mut() {
            let node = frame.0;
            if let Some(&(target, _)) = adjacency[node].get(frame.1) {
                frame.1 += 1;
                if index[target] == UNVISITED {
                    index[target] = next_index;
                    lowlink[target] = next_index;
                    next_index += 1;
                    stack.push(target);
                    on_stack.insert(target);
                    call.push((target, 0));
                } else if on_stack.contains(target) {
                    lowlink[node] = lowlink[node].min(index[target]);
                }
                continue;
            }

            call.pop();
            if let Some(&(parent, _)) = call.last() {
                lowlink[parent] = lowlink[parent].min(lowlink[node]);
            }
            if lowlink[node] != index[node] {
                continue;
            }

            let mut component = Vec::new();
            while let Some(member) = stack.pop() {
                on_stack.set(member, false);
                component.push(member);
                if member == node {
                    break;
                }
            }
            let cyclic =
                component.len() > 1 || adjacency[node].iter().any(|&(target, _)| target == node);
            if cyclic {
                component.sort_unstable();
                components.push(component);
            }
        }
    }

    components.sort_by_key(|component| component[0]);
    components
}

// =============================================================================
// Elementary cycles
// =============================================================================

struct CycleSearch<'g> {
    adjacency: &'g Adjacency,
    members: FixedBitSet,
    start: usize,
    guard: PathGuard<usize>,
    edges: Vec<EdgeRef>,
    cycles: Vec<Vec<EdgeRef>>,
    max_cycles: usize,
}

impl CycleSearch<'_> {
    fn exhausted(&self) -> bool {
        self.cycles.len() >= self.max_cycles || self.guard.is_exceeded()
    }

    /// Extend the current path from `node`, recording every way back to
    /// `start` through members greater than `start`.
    fn visit(&mut self, node: usize) {
        let adjacency = self.adjacency;
        for (slot_index, &(target, slot)) in adjacency[node].iter().enumerate() {
            if self.exhausted() {
                return;
            }
            if !self.members.contains(target) || target < self.start {
                continue;
            }
            // Parallel edges to the same target are distinct cycles only in
            // their slot; the first one stands for all of them.
            if adjacency[node][..slot_index]
                .iter()
                .any(|&(earlier, _)| earlier == target)
            {
                continue;
            }
            let edge = EdgeRef {
                consumer: node,
                slot,
                target,
            };
            if target == self.start {
                let mut cycle = self.edges.clone();
                cycle.push(edge);
                self.cycles.push(cycle);
                continue;
            }
            match self.guard.enter(target) {
                PathStep::Entered => {
                    self.edges.push(edge);
                    self.visit(target);
                    self.edges.pop();
                    self.guard.leave(target);
                }
                // Found again from its own smallest member.
                PathStep::Cycle => {}
                PathStep::DepthExceeded | PathStep::IterationExceeded => return,
            }
        }
    }
}

/// Elementary cycles of one component, as edge lists starting at the
/// cycle's smallest member.
pub fn elementary_cycles(
    adjacency: &Adjacency,
    component: &[usize],
    max_cycles: usize,
) -> Vec<Vec<EdgeRef>> {
    let mut members = FixedBitSet::with_capacity(adjacency.len());
    for &member in component {
        members.insert(member);
    }

    let mut search = CycleSearch {
        adjacency,
        members,
        start: 0,
        guard: PathGuard::with_profile(SearchProfile::CycleSearch),
        edges: Vec::new(),
        cycles: Vec::new(),
        max_cycles,
    };
    for &start in component {
        if search.exhausted() {
            break;
        }
        search.start = start;
        if search.guard.enter(start).is_entered() {
            search.visit(start);
            search.guard.leave(start);
        }
    }
    if search.guard.is_exceeded() {
        warn!(
            members = component.len(),
            found = search.cycles.len(),
            "cycle enumeration hit its step budget"
        );
    }
    std::mem::take(&mut search.cycles)
}
