//! Hierarchy traversal: runs every graph through the pipeline with its
//! level pushed on a [`ParentContext`].
//!
//! For each graph, depth first:
//!
//! 1. Stage the keys whose storage the graph owns (its self key, bound
//!    instances and bindings in one of its own scopes) and push its level.
//! 2. Build, aggregate, plan and linearize its binding graph.
//! 3. Process its nested graphs.
//! 4. Resolve storage for every binding that needs it. Keys that nested
//!    graphs read from this level without this level requesting them are
//!    added as extra roots and the graph is rebuilt until nothing is missing.
//! 5. Pop the level; the keys it read from its ancestors become
//!    `consumed_from_parent`.
//!
//! A graph with fatal diagnostics is skipped. Its nested graphs are still
//! built so their own problems are reported, but produce no plans.

use knit_common::{
    Diagnostic, DiagnosticReporter, Halt, InternalError, ResolverOptions, limits,
};
use knit_graph::{
    BindingDecl, BindingGraph, BindingGraphBuilder, BindingIndex, BindingKind, Declarations,
    GraphDecl, GraphHierarchy, GraphId, KeyId, KeyInterner, aggregate, initialization_steps,
    linearize, plan,
};
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::level::GraphLevel;
use crate::parent_context::ParentContext;
use crate::plan::{AggregatePlan, BindingPlan, BindingSource, KeyEntry, LevelPlan, ResolutionPlan};

/// Resolves a full declaration set into a [`ResolutionPlan`].
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    options: ResolverOptions,
}

impl Resolver {
    pub fn new(options: ResolverOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Resolve every graph. Declaration and graph errors go to `reporter`
    /// and only cost the affected graphs their plans; an internal error
    /// aborts the whole resolution.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(graphs = graphs.len(), bindings = bindings.len())
    )]
    pub fn resolve(
        &self,
        graphs: &[GraphDecl],
        bindings: &[BindingDecl],
        reporter: &mut dyn DiagnosticReporter,
    ) -> Result<ResolutionPlan, InternalError> {
        let options = &self.options;
        let mut interner = KeyInterner::with_aliases(options.type_aliases.clone());
        let hierarchy = GraphHierarchy::build(graphs, options, &mut interner, reporter);
        let index = BindingIndex::build(bindings, &hierarchy, options, &mut interner, reporter);

        let session = Session {
            options,
            interner: &interner,
            hierarchy: &hierarchy,
            index: &index,
            builder: BindingGraphBuilder::new(&hierarchy, &index, &interner),
        };
        let mut ctx = ParentContext::new(&interner, options);

        let mut levels = Vec::new();
        for &root in hierarchy.roots() {
            match session.process(&mut ctx, root, true, reporter) {
                Ok(subtree) => levels.extend(subtree.into_plans()),
                Err(error) => {
                    warn!(%error, "resolution aborted");
                    reporter.report(Diagnostic::internal(&error));
                    return Err(error);
                }
            }
        }

        link_parents(&mut levels, &hierarchy);
        debug!(levels = levels.len(), "resolved graph hierarchy");
        Ok(ResolutionPlan {
            keys: KeyEntry::table(&interner),
            levels,
        })
    }
}

/// Resolve `declarations` with the options embedded in them.
pub fn resolve(
    declarations: &Declarations,
    reporter: &mut dyn DiagnosticReporter,
) -> Result<ResolutionPlan, InternalError> {
    Resolver::new(declarations.options.clone()).resolve(
        &declarations.graphs,
        &declarations.bindings,
        reporter,
    )
}

fn link_parents(levels: &mut [LevelPlan], hierarchy: &GraphHierarchy) {
    let positions: FxHashMap<GraphId, usize> = levels
        .iter()
        .enumerate()
        .map(|(position, level)| (level.graph_id, position))
        .collect();
    for level in levels.iter_mut() {
        level.parent = hierarchy
            .get(level.graph_id)
            .parent
            .and_then(|parent| positions.get(&parent).copied());
    }
}

// =============================================================================
// Per-graph processing
// =============================================================================

struct Session<'s> {
    options: &'s ResolverOptions,
    interner: &'s KeyInterner,
    hierarchy: &'s GraphHierarchy,
    index: &'s BindingIndex,
    builder: BindingGraphBuilder<'s>,
}

/// A binding graph that made it through every stage.
struct Resolved {
    graph: BindingGraph,
    order: Vec<KeyId>,
}

/// Plans of one graph and its descendants, own plan first.
#[derive(Default)]
struct Subtree {
    own: Option<LevelPlan>,
    descendants: Vec<LevelPlan>,
}

impl Subtree {
    fn into_plans(self) -> impl Iterator<Item = LevelPlan> {
        self.own.into_iter().chain(self.descendants)
    }
}

impl Session<'_> {
    fn process(
        &self,
        ctx: &mut ParentContext<'_>,
        graph: GraphId,
        emit: bool,
        reporter: &mut dyn DiagnosticReporter,
    ) -> Result<Subtree, InternalError> {
        let node = self.hierarchy.get(graph);
        ctx.stage(self.storage_keys(graph));
        ctx.enter_level(GraphLevel::new(graph, node.name.clone(), node.scopes.clone()));

        // The level is popped on every path, errors included.
        let result = self.process_entered(ctx, graph, emit, reporter);
        let level = ctx.exit_level()?;
        let mut subtree = result?;

        if let Some(own) = subtree.own.as_mut() {
            own.slots = level.fields().cloned().collect();
            own.consumed_from_parent = level.used_keys().collect();
        }
        Ok(subtree)
    }

    fn process_entered(
        &self,
        ctx: &mut ParentContext<'_>,
        graph: GraphId,
        emit: bool,
        reporter: &mut dyn DiagnosticReporter,
    ) -> Result<Subtree, InternalError> {
        let node = self.hierarchy.get(graph);
        let resolved = self.resolve_level(graph, &[], reporter)?;

        let emit_children = emit && resolved.is_some();
        let mut descendants = Vec::new();
        for &child in self.hierarchy.children(graph) {
            let subtree = self.process(ctx, child, emit_children, reporter)?;
            descendants.extend(subtree.into_plans());
        }

        let Some(mut current) = resolved.filter(|_| emit) else {
            return Ok(Subtree::default());
        };

        let mut extra_roots: Vec<KeyId> = Vec::new();
        for round in 0..limits::MAX_MATERIALIZATION_ROUNDS {
            let bindings = self.sources(ctx, &current.graph)?;
            let missing: Vec<KeyId> = ctx
                .top()
                .map(|level| {
                    level
                        .served_keys()
                        .filter(|&key| !current.graph.contains(key))
                        .collect()
                })
                .unwrap_or_default();
            if missing.is_empty() {
                let depth = node.depth;
                return Ok(Subtree {
                    own: Some(level_plan(graph, &node.name, depth, current, bindings)),
                    descendants,
                });
            }

            debug!(
                graph = %node.name,
                round,
                missing = missing.len(),
                "materializing keys read by nested graphs"
            );
            extra_roots.extend(missing);
            match self.resolve_level(graph, &extra_roots, reporter)? {
                Some(rebuilt) => current = rebuilt,
                // Plans of nested graphs point at storage this graph can no
                // longer provide.
                None => return Ok(Subtree::default()),
            }
        }

        Err(InternalError::MaterializationDiverged {
            graph: node.name.clone(),
            rounds: limits::MAX_MATERIALIZATION_ROUNDS,
        })
    }

    /// Keys whose storage `graph`'s level owns from the moment it is pushed.
    fn storage_keys(&self, graph: GraphId) -> Vec<KeyId> {
        let node = self.hierarchy.get(graph);
        let owned = self
            .index
            .bindings_owned_by(graph)
            .filter(|binding| {
                matches!(binding.kind, BindingKind::Instance)
                    || binding
                        .scope
                        .as_ref()
                        .is_some_and(|scope| node.scopes.contains(scope))
            })
            .map(|binding| binding.key);
        std::iter::once(node.self_key).chain(owned).collect()
    }

    /// Run `graph` through every stage. `None` means fatal diagnostics were
    /// reported for it.
    fn resolve_level(
        &self,
        graph: GraphId,
        extra_roots: &[KeyId],
        reporter: &mut dyn DiagnosticReporter,
    ) -> Result<Option<Resolved>, InternalError> {
        match self.stages(graph, extra_roots, reporter) {
            Ok(resolved) => Ok(Some(resolved)),
            Err(Halt::SkipGraph) => {
                debug!(graph = %self.hierarchy.get(graph).name, "skipping graph");
                Ok(None)
            }
            Err(Halt::Internal(error)) => Err(error),
        }
    }

    fn stages(
        &self,
        graph: GraphId,
        extra_roots: &[KeyId],
        reporter: &mut dyn DiagnosticReporter,
    ) -> Result<Resolved, Halt> {
        let built = self.builder.build(graph, extra_roots, reporter)?;
        let aggregated = aggregate(built, self.interner, reporter)?;
        let planned = plan(aggregated, self.options, self.interner, reporter)?;
        let order = linearize(&planned, self.interner)?;
        Ok(Resolved {
            graph: planned,
            order,
        })
    }

    /// Where every binding of the top level gets its value from.
    fn sources(
        &self,
        ctx: &mut ParentContext<'_>,
        graph: &BindingGraph,
    ) -> Result<Vec<BindingPlan>, InternalError> {
        let top = ctx.depth().saturating_sub(1);
        let mut plans = Vec::with_capacity(graph.len());
        for binding in graph.bindings() {
            let source = if binding.requires_storage() {
                match ctx.resolve_field(binding.key, binding.scope.as_ref()) {
                    Some(access) if access.is_inherited(top) => BindingSource::AncestorField {
                        depth: access.level,
                        graph: self.hierarchy.get(access.graph).name.clone(),
                        slot: access.slot.name,
                    },
                    Some(access) => BindingSource::OwnField {
                        slot: access.slot.name,
                    },
                    None if binding.inherited_from.is_some() => {
                        return Err(InternalError::UnresolvedInherited {
                            key: self.interner.display(binding.key),
                        });
                    }
                    None => BindingSource::Local,
                }
            } else {
                BindingSource::Local
            };
            plans.push(BindingPlan::new(binding, source));
        }
        Ok(plans)
    }
}

fn level_plan(
    graph_id: GraphId,
    name: &str,
    depth: u32,
    resolved: Resolved,
    bindings: Vec<BindingPlan>,
) -> LevelPlan {
    let Resolved { graph, order } = resolved;
    LevelPlan {
        graph: name.to_string(),
        graph_id,
        depth,
        parent: None,
        init_steps: initialization_steps(&graph, &order),
        deferred_edges: graph.deferred_edges(),
        aggregates: AggregatePlan::collect(&graph),
        construction_order: order,
        bindings,
        slots: Vec::new(),
        consumed_from_parent: Vec::new(),
    }
}
