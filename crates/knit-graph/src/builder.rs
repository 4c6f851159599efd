//! Binding Graph Builder.
//!
//! Building happens in two steps:
//!
//! | Step | Type | Input | Output |
//! |------|------|-------|--------|
//! | index | [`BindingIndex`] | every [`BindingDecl`] | bindings grouped by owning level, contributions grouped by collection |
//! | build | [`BindingGraphBuilder`] | one graph of the hierarchy | [`BindingGraph`] reachable from that graph's requests |
//!
//! Indexing reports declaration errors that do not depend on which graph is
//! being built (unparsable types, malformed aliases and contributions,
//! duplicate bindings within one level). Building walks the graph's requests
//! breadth-first, resolving each key against the graph's ancestor chain
//! (innermost first), then against free-floating declarations, then against
//! multibinding contributions. It reports missing bindings with the request
//! path and scopes that no level can honor.

use knit_common::{
    DeclarationSite, Diagnostic, DiagnosticReporter, Halt, ResolverOptions, diagnostic_codes,
    limits,
};
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use std::collections::VecDeque;
use tracing::{debug, trace};

use crate::binding::{
    Binding, BindingKind, Contribution, ContributionKind, Dependency, GraphId, Indirection, Scope,
};
use crate::declarations::{BindingDecl, DeclKind, DependencyDecl, KeyDecl};
use crate::graph::{BindingGraph, FxIndexMap, PendingCollection};
use crate::hierarchy::GraphHierarchy;
use crate::key::{BindingKey, KeyId, KeyInterner, Qualifier};

/// Qualifier attached to the synthetic key of each multibinding contributor.
pub const MULTIBINDING_ELEMENT: &str = "MultibindingElement";

/// Label used in diagnostics for declarations without an owning graph.
const UNOWNED_LEVEL: &str = "<unowned>";

type ChainVec = SmallVec<[GraphId; 8]>;

// =============================================================================
// BindingIndex
// =============================================================================

/// Every valid binding declaration, grouped for lookup.
#[derive(Debug, Default)]
pub struct BindingIndex {
    bindings: Vec<Binding>,
    /// Owning level (`None` = free-floating) -> key -> binding indices.
    by_level: FxIndexMap<Option<GraphId>, FxIndexMap<KeyId, SmallVec<[usize; 1]>>>,
    /// Synthetic contributor key -> binding index.
    synthetic: FxHashMap<KeyId, usize>,
    /// Collection key -> contributor binding indices, in declaration order.
    contributions: FxIndexMap<KeyId, Vec<usize>>,
    /// Collection key -> explicit collection declarations.
    declared_collections: FxIndexMap<KeyId, Vec<usize>>,
    duplicated: FxHashSet<(Option<GraphId>, KeyId)>,
    levels_with_duplicates: FxHashSet<Option<GraphId>>,
}

impl BindingIndex {
    #[tracing::instrument(level = "debug", skip_all, fields(declarations = decls.len()))]
    pub fn build(
        decls: &[BindingDecl],
        hierarchy: &GraphHierarchy,
        options: &ResolverOptions,
        interner: &mut KeyInterner,
        reporter: &mut dyn DiagnosticReporter,
    ) -> Self {
        let mut index = Self::default();

        for (ordinal, decl) in decls.iter().enumerate() {
            let ordinal = ordinal as u32;
            let Some(binding) =
                convert_declaration(decl, ordinal, hierarchy, options, interner, reporter)
            else {
                continue;
            };
            index.insert(binding, interner);
        }

        index.report_duplicates(hierarchy, interner, reporter);
        debug!(
            bindings = index.bindings.len(),
            collections = index.contributions.len() + index.declared_collections.len(),
            "indexed binding declarations"
        );
        index
    }

    fn insert(&mut self, binding: Binding, interner: &mut KeyInterner) {
        let position = self.bindings.len();
        match binding.contribution() {
            Some(contribution) if contribution.kind == ContributionKind::Declared => {
                self.declared_collections
                    .entry(contribution.collection)
                    .or_default()
                    .push(position);
            }
            Some(contribution) => {
                let collection = contribution.collection;
                let element = contributor_key(interner, binding.key, collection, binding.ordinal);
                let mut binding = binding;
                binding.key = element;
                self.synthetic.insert(element, position);
                self.contributions
                    .entry(collection)
                    .or_default()
                    .push(position);
                self.bindings.push(binding);
                return;
            }
            None => {
                self.by_level
                    .entry(binding.owner)
                    .or_default()
                    .entry(binding.key)
                    .or_default()
                    .push(position);
            }
        }
        self.bindings.push(binding);
    }

    fn report_duplicates(
        &mut self,
        hierarchy: &GraphHierarchy,
        interner: &KeyInterner,
        reporter: &mut dyn DiagnosticReporter,
    ) {
        for (&level, keys) in &self.by_level {
            let level_name = level.map_or(UNOWNED_LEVEL, |g| hierarchy.get(g).name.as_str());
            for (&key, positions) in keys {
                if positions.len() < 2 {
                    continue;
                }
                let display = interner.display(key);
                let mut diagnostic =
                    Diagnostic::error(diagnostic_codes::DUPLICATE_BINDING, &[&display, level_name])
                        .at(self.bindings[positions[1]].site.clone())
                        .in_graph(level_name);
                for &position in positions.iter().filter(|&&p| p != positions[1]) {
                    let other = &self.bindings[position];
                    diagnostic = diagnostic.with_related(
                        other.site.clone(),
                        format!("{} binding for {display} declared here", other.kind.label()),
                    );
                }
                reporter.report(diagnostic);
                self.duplicated.insert((level, key));
                self.levels_with_duplicates.insert(level);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn binding(&self, position: usize) -> &Binding {
        &self.bindings[position]
    }

    /// The first binding declared for `key` at `level`.
    pub fn declared_at(&self, level: Option<GraphId>, key: KeyId) -> Option<&Binding> {
        let positions = self.by_level.get(&level)?.get(&key)?;
        positions.first().map(|&p| &self.bindings[p])
    }

    /// Bindings owned by `graph`, contributors included.
    pub fn bindings_owned_by(&self, graph: GraphId) -> impl Iterator<Item = &Binding> {
        self.bindings.iter().filter(move |binding| {
            binding.owner == Some(graph)
                && binding
                    .contribution()
                    .is_none_or(|c| c.kind != ContributionKind::Declared)
        })
    }

    pub fn is_duplicated(&self, level: Option<GraphId>, key: KeyId) -> bool {
        self.duplicated.contains(&(level, key))
    }

    pub fn has_duplicates_in(&self, graph: GraphId) -> bool {
        self.levels_with_duplicates.contains(&Some(graph))
    }

    /// Contributors (bindings with synthetic keys) of `collection`.
    pub fn contributors(&self, collection: KeyId) -> impl Iterator<Item = &Binding> {
        self.contributions
            .get(&collection)
            .into_iter()
            .flatten()
            .map(|&p| &self.bindings[p])
    }

    fn synthetic(&self, key: KeyId) -> Option<&Binding> {
        self.synthetic.get(&key).map(|&p| &self.bindings[p])
    }
}

/// Synthetic key for one contributor: the element type, qualified with the
/// collection and the contribution's ordinal.
fn contributor_key(
    interner: &mut KeyInterner,
    element: KeyId,
    collection: KeyId,
    ordinal: u32,
) -> KeyId {
    let qualifier = Qualifier::new(MULTIBINDING_ELEMENT)
        .with_arg("collection", interner.display(collection))
        .with_arg("id", ordinal.to_string());
    let key = interner.key(element).with_qualifier(qualifier);
    interner.intern(key)
}

fn report_invalid_key(
    decl: &KeyDecl,
    error: &dyn std::fmt::Display,
    site: Option<DeclarationSite>,
    reporter: &mut dyn DiagnosticReporter,
) {
    let reason = error.to_string();
    reporter.report(
        Diagnostic::error(diagnostic_codes::INVALID_TYPE_REFERENCE, &[&decl.ty, &reason]).at(site),
    );
}

fn intern_key(
    decl: &KeyDecl,
    site: Option<&DeclarationSite>,
    interner: &mut KeyInterner,
    reporter: &mut dyn DiagnosticReporter,
) -> Option<KeyId> {
    match decl.to_key() {
        Ok(key) => Some(interner.intern(key)),
        Err(error) => {
            report_invalid_key(decl, &error, site.cloned(), reporter);
            None
        }
    }
}

/// A parameter typed `Provider<T>` or `Lazy<T>` depends on `T` through that
/// wrapper even when the front-end left the indirection as `direct`.
fn classify_dependency(
    key: BindingKey,
    decl: &DependencyDecl,
    options: &ResolverOptions,
) -> (BindingKey, Indirection) {
    if decl.indirection != Indirection::Direct || key.ty.args.len() != 1 {
        return (key, decl.indirection);
    }
    let wrapper = key.ty.simple_name();
    let indirection = if wrapper == options.provider_type {
        Indirection::ProviderWrapped
    } else if wrapper == options.lazy_type {
        Indirection::LazyWrapped
    } else {
        return (key, decl.indirection);
    };
    let first = key.ty.type_arguments().next().cloned();
    match first {
        Some(inner) => {
            let inner = BindingKey {
                ty: inner,
                qualifier: key.qualifier,
            };
            (inner, indirection)
        }
        None => (key, decl.indirection),
    }
}

fn convert_declaration(
    decl: &BindingDecl,
    ordinal: u32,
    hierarchy: &GraphHierarchy,
    options: &ResolverOptions,
    interner: &mut KeyInterner,
    reporter: &mut dyn DiagnosticReporter,
) -> Option<Binding> {
    let site = decl.site.as_ref();

    let owner = match decl.graph.as_deref() {
        None => None,
        Some(name) => match hierarchy.by_name(name) {
            Some(id) => Some(id),
            None => {
                // Graphs rejected during hierarchy validation were already
                // reported; their bindings are dropped with them.
                if !hierarchy.is_declared_name(name) {
                    reporter.report(
                        Diagnostic::error(diagnostic_codes::UNKNOWN_GRAPH, &[&decl.key.ty, name])
                            .at(site.cloned()),
                    );
                }
                return None;
            }
        },
    };

    let key = intern_key(&decl.key, site, interner, reporter)?;

    let mut dependencies: SmallVec<[Dependency; 4]> = SmallVec::new();
    let mut valid = true;
    for dep in &decl.dependencies {
        match dep.key.to_key() {
            Ok(dep_key) => {
                let (dep_key, indirection) = classify_dependency(dep_key, dep, options);
                let mut dependency = Dependency::new(interner.intern(dep_key), indirection);
                dependency.deferrable = dep.deferrable;
                dependencies.push(dependency);
            }
            Err(error) => {
                report_invalid_key(&dep.key, &error, site.cloned(), reporter);
                valid = false;
            }
        }
    }
    if !valid {
        return None;
    }

    let kind = match decl.kind {
        DeclKind::Constructor => BindingKind::Constructor,
        DeclKind::Provider => BindingKind::Provider,
        DeclKind::Alias => {
            if dependencies.len() != 1 {
                let display = interner.display(key);
                let count = dependencies.len().to_string();
                reporter.report(
                    Diagnostic::error(diagnostic_codes::INVALID_ALIAS, &[&display, &count])
                        .at(site.cloned()),
                );
                return None;
            }
            BindingKind::Alias
        }
        DeclKind::Instance => {
            if owner.is_none() {
                let display = interner.display(key);
                reporter.report(
                    Diagnostic::error(diagnostic_codes::UNOWNED_BINDING, &["Instance", &display])
                        .at(site.cloned()),
                );
                return None;
            }
            BindingKind::Instance
        }
        DeclKind::Contribution => {
            let Some(contribution) = &decl.contribution else {
                let display = interner.display(key);
                reporter.report(
                    Diagnostic::error(diagnostic_codes::MISSING_CONTRIBUTION, &[&display])
                        .at(site.cloned()),
                );
                return None;
            };
            let collection = intern_key(&contribution.collection, site, interner, reporter)?;
            if contribution.kind == ContributionKind::MapEntry && contribution.map_key.is_none() {
                let display = interner.display(collection);
                reporter.report(
                    Diagnostic::error(diagnostic_codes::MISSING_MAP_KEY, &[&display])
                        .at(site.cloned()),
                );
                return None;
            }
            BindingKind::Contribution(Contribution {
                collection,
                kind: contribution.kind,
                map_key: contribution.map_key.clone(),
            })
        }
    };

    // An explicit collection declaration is stored under the collection key.
    let key = match &kind {
        BindingKind::Contribution(c) if c.kind == ContributionKind::Declared => c.collection,
        _ => key,
    };

    let mut binding = Binding::new(key, kind)
        .with_ordinal(ordinal)
        .at(decl.site.clone());
    binding.owner = owner;
    binding.scope = decl.scope.as_deref().map(Scope::new);
    binding.dependencies = dependencies;
    Some(binding)
}

// =============================================================================
// BindingGraphBuilder
// =============================================================================

enum Lookup<'a> {
    Declared {
        binding: &'a Binding,
        level: Option<GraphId>,
    },
    GraphSelf(GraphId),
    Collection(PendingCollection),
    Missing,
}

/// Breadth-first work list with the first requester of every key.
struct Walk {
    queue: VecDeque<KeyId>,
    seen: FxHashSet<KeyId>,
    requested_by: FxHashMap<KeyId, KeyId>,
}

impl Walk {
    fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            seen: FxHashSet::default(),
            requested_by: FxHashMap::default(),
        }
    }

    fn push_root(&mut self, key: KeyId) {
        if self.seen.insert(key) {
            self.queue.push_back(key);
        }
    }

    fn push(&mut self, key: KeyId, from: KeyId) {
        if self.seen.insert(key) {
            self.requested_by.insert(key, from);
            self.queue.push_back(key);
        }
    }

    /// Keys from the entry point down to `key`, inclusive.
    fn path_to(&self, key: KeyId) -> Vec<KeyId> {
        let mut path = vec![key];
        let mut current = key;
        while let Some(&from) = self.requested_by.get(&current) {
            if path.len() as u32 >= limits::MAX_DEPENDENCY_PATH {
                break;
            }
            path.push(from);
            current = from;
        }
        path.reverse();
        path
    }
}

/// Builds the binding graph of one hierarchy level.
pub struct BindingGraphBuilder<'a> {
    hierarchy: &'a GraphHierarchy,
    index: &'a BindingIndex,
    interner: &'a KeyInterner,
}

impl<'a> BindingGraphBuilder<'a> {
    pub fn new(
        hierarchy: &'a GraphHierarchy,
        index: &'a BindingIndex,
        interner: &'a KeyInterner,
    ) -> Self {
        Self {
            hierarchy,
            index,
            interner,
        }
    }

    /// Build the graph of everything reachable from `graph`'s requests plus
    /// `extra_roots`.
    ///
    /// All problems found are reported before returning
    /// [`Halt::SkipGraph`], so one call surfaces every error of the graph.
    #[tracing::instrument(level = "debug", skip_all, fields(graph = %self.hierarchy.get(graph).name))]
    pub fn build(
        &self,
        graph: GraphId,
        extra_roots: &[KeyId],
        reporter: &mut dyn DiagnosticReporter,
    ) -> Result<BindingGraph, Halt> {
        let node = self.hierarchy.get(graph);
        let chain: ChainVec = self.hierarchy.chain(graph).collect();
        let mut fatal = self.index.has_duplicates_in(graph);

        let mut out = BindingGraph::new(graph, node.name.clone());
        out.set_requests(node.requests.clone());

        let mut walk = Walk::new();
        for &key in node.requests.iter().chain(extra_roots) {
            walk.push_root(key);
        }

        while let Some(key) = walk.queue.pop_front() {
            match self.lookup(key, &chain) {
                Lookup::Declared { binding, level } => {
                    if self.index.is_duplicated(level, key) {
                        fatal = true;
                    }
                    let storage = match self.storage_level(binding, &chain, graph, reporter) {
                        Ok(storage) => storage,
                        Err(()) => {
                            fatal = true;
                            None
                        }
                    };
                    let binding = match storage {
                        Some(owner) if owner != graph => inherited(binding, owner),
                        _ => binding.clone(),
                    };
                    trace!(key = %self.interner.display(key), kind = binding.kind.label(), "resolved");
                    for dep in &binding.dependencies {
                        walk.push(dep.key, key);
                    }
                    out.insert(binding);
                }
                Lookup::GraphSelf(owner) => {
                    let mut binding = Binding::new(key, BindingKind::GraphSelf)
                        .owned_by(owner)
                        .at(self.hierarchy.get(owner).site.clone());
                    if owner != graph {
                        binding.inherited_from = Some(owner);
                    }
                    out.insert(binding);
                }
                Lookup::Collection(pending) => {
                    for &contributor in &pending.contributors {
                        walk.push(contributor, key);
                    }
                    out.pending_mut().insert(key, pending);
                }
                Lookup::Missing => {
                    self.report_missing(key, &walk, &out, graph, reporter);
                    fatal = true;
                }
            }
        }

        debug!(
            bindings = out.len(),
            collections = out.pending_collections().count(),
            fatal,
            "built binding graph"
        );
        if fatal {
            return Err(Halt::SkipGraph);
        }
        Ok(out)
    }

    fn lookup(&self, key: KeyId, chain: &[GraphId]) -> Lookup<'a> {
        if let Some(binding) = self.index.synthetic(key) {
            return Lookup::Declared {
                binding,
                level: binding.owner,
            };
        }

        for &level in chain {
            if let Some(binding) = self.index.declared_at(Some(level), key) {
                return Lookup::Declared {
                    binding,
                    level: Some(level),
                };
            }
            if self.hierarchy.get(level).self_key == key {
                return Lookup::GraphSelf(level);
            }
        }

        if let Some(binding) = self.index.declared_at(None, key) {
            return Lookup::Declared {
                binding,
                level: None,
            };
        }

        self.collection(key, chain)
            .map_or(Lookup::Missing, Lookup::Collection)
    }

    /// Contributions and explicit declarations of `key` visible from `chain`.
    fn collection(&self, key: KeyId, chain: &[GraphId]) -> Option<PendingCollection> {
        let visible =
            |binding: &&Binding| binding.owner.is_none_or(|owner| chain.contains(&owner));

        let contributors: Vec<&Binding> = self.index.contributors(key).filter(visible).collect();
        let declarations: Vec<&Binding> = self
            .index
            .declared_collections
            .get(&key)
            .into_iter()
            .flatten()
            .map(|&p| self.index.binding(p))
            .filter(visible)
            .collect();
        if contributors.is_empty() && declarations.is_empty() {
            return None;
        }

        let first = contributors
            .iter()
            .chain(&declarations)
            .min_by_key(|binding| binding.ordinal)?;
        Some(PendingCollection {
            key,
            contributors: contributors.iter().map(|binding| binding.key).collect(),
            declared: !declarations.is_empty(),
            ordinal: first.ordinal,
            site: first.site.clone(),
        })
    }

    /// The level whose storage backs `binding` when built for `graph`, or
    /// `None` when the binding is constructed on every use.
    fn storage_level(
        &self,
        binding: &Binding,
        chain: &[GraphId],
        graph: GraphId,
        reporter: &mut dyn DiagnosticReporter,
    ) -> Result<Option<GraphId>, ()> {
        if matches!(binding.kind, BindingKind::Instance | BindingKind::GraphSelf) {
            return Ok(binding.owner);
        }
        let Some(scope) = &binding.scope else {
            return Ok(None);
        };

        let (owner, holder) = match binding.owner {
            Some(owner) => (
                self.hierarchy.declares_scope(owner, scope).then_some(owner),
                owner,
            ),
            None => (
                chain
                    .iter()
                    .copied()
                    .find(|&level| self.hierarchy.declares_scope(level, scope)),
                graph,
            ),
        };
        if owner.is_none() {
            let display = self.interner.display(binding.key);
            let holder_name = &self.hierarchy.get(holder).name;
            reporter.report(
                Diagnostic::error(
                    diagnostic_codes::INCOMPATIBLY_SCOPED_BINDING,
                    &[&display, scope.as_str(), holder_name],
                )
                .at(binding.site.clone())
                .in_graph(self.hierarchy.get(graph).name.clone()),
            );
            return Err(());
        }
        Ok(owner)
    }

    fn report_missing(
        &self,
        key: KeyId,
        walk: &Walk,
        graph_so_far: &BindingGraph,
        graph: GraphId,
        reporter: &mut dyn DiagnosticReporter,
    ) {
        let node = self.hierarchy.get(graph);
        let path = walk.path_to(key);
        let mut requested_by = node.name.clone();
        for &step in &path[..path.len() - 1] {
            requested_by.push_str(" -> ");
            requested_by.push_str(&self.interner.display(step));
        }

        let site = walk
            .requested_by
            .get(&key)
            .and_then(|&from| graph_so_far.get(from))
            .and_then(|binding| binding.site.clone())
            .or_else(|| node.site.clone());
        let display = self.interner.display(key);
        reporter.report(
            Diagnostic::error(diagnostic_codes::MISSING_BINDING, &[&display, &requested_by])
                .at(site)
                .in_graph(node.name.clone()),
        );
    }
}

/// A binding whose storage lives at `owner`, seen from a descendant: a leaf.
fn inherited(binding: &Binding, owner: GraphId) -> Binding {
    let mut leaf = binding.clone();
    leaf.inherited_from = Some(owner);
    leaf.dependencies.clear();
    leaf
}
