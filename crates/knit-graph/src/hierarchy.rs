//! Validated graph hierarchy (root graphs and their nested extensions).
//!
//! Graphs that cannot be placed in a tree (duplicate names, unknown parents,
//! cyclic parent chains, excessive nesting, unparsable types) are reported
//! and left out; their descendants are left out silently.

use knit_common::{
    DeclarationSite, Diagnostic, DiagnosticReporter, ResolverOptions, diagnostic_codes,
};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::binding::{GraphId, Scope};
use crate::declarations::GraphDecl;
use crate::key::{BindingKey, KeyId, KeyInterner, TypeRef};

#[derive(Debug, Clone)]
pub struct GraphNode {
    pub id: GraphId,
    pub name: String,
    /// Key under which the graph can inject itself.
    pub self_key: KeyId,
    pub parent: Option<GraphId>,
    pub children: Vec<GraphId>,
    pub scopes: Vec<Scope>,
    pub requests: Vec<KeyId>,
    /// 0 for roots.
    pub depth: u32,
    pub site: Option<DeclarationSite>,
}

#[derive(Debug, Default)]
pub struct GraphHierarchy {
    nodes: Vec<GraphNode>,
    by_name: FxHashMap<String, GraphId>,
    /// Every name that appeared in the input, valid or not.
    declared_names: FxHashSet<String>,
    roots: Vec<GraphId>,
}

struct Candidate<'a> {
    decl: &'a GraphDecl,
    self_key: KeyId,
    requests: Vec<KeyId>,
    parent: Option<usize>,
}

impl GraphHierarchy {
    #[tracing::instrument(level = "debug", skip_all, fields(graphs = decls.len()))]
    pub fn build(
        decls: &[GraphDecl],
        options: &ResolverOptions,
        interner: &mut KeyInterner,
        reporter: &mut dyn DiagnosticReporter,
    ) -> Self {
        let declared_names: FxHashSet<String> = decls.iter().map(|d| d.name.clone()).collect();

        // First declaration of a name wins.
        let mut first_by_name: FxHashMap<&str, usize> = FxHashMap::default();
        let mut candidates: Vec<Option<Candidate<'_>>> = Vec::with_capacity(decls.len());
        for (i, decl) in decls.iter().enumerate() {
            if first_by_name.contains_key(decl.name.as_str()) {
                reporter.report(
                    Diagnostic::error(diagnostic_codes::DUPLICATE_GRAPH, &[&decl.name])
                        .at(decl.site.clone())
                        .in_graph(decl.name.clone()),
                );
                candidates.push(None);
                continue;
            }
            first_by_name.insert(decl.name.as_str(), i);
            candidates.push(Self::intern_graph(decl, interner, reporter));
        }

        // Parent links.
        for i in 0..candidates.len() {
            if candidates[i].is_none() {
                continue;
            }
            let Some(parent_name) = decls[i].parent.as_deref() else {
                continue;
            };
            match first_by_name.get(parent_name) {
                Some(&p) => {
                    if let Some(candidate) = &mut candidates[i] {
                        candidate.parent = Some(p);
                    }
                }
                None => {
                    reporter.report(
                        Diagnostic::error(
                            diagnostic_codes::UNKNOWN_PARENT_GRAPH,
                            &[&decls[i].name, parent_name],
                        )
                        .at(decls[i].site.clone())
                        .in_graph(decls[i].name.clone()),
                    );
                    candidates[i] = None;
                }
            }
        }

        // Cyclic parent chains: report every member of the cycle.
        let n = candidates.len();
        let mut in_cycle = vec![false; n];
        for i in 0..n {
            let mut path = vec![i];
            let mut cur = i;
            while let Some(p) = candidates[cur].as_ref().and_then(|c| c.parent) {
                if p == i {
                    in_cycle[i] = true;
                    break;
                }
                if path.len() > n {
                    break;
                }
                path.push(p);
                cur = p;
            }
            if in_cycle[i] {
                let mut names: Vec<&str> = path.iter().map(|&j| decls[j].name.as_str()).collect();
                names.push(decls[i].name.as_str());
                reporter.report(
                    Diagnostic::error(
                        diagnostic_codes::GRAPH_HIERARCHY_CYCLE,
                        &[&decls[i].name, &names.join(" -> ")],
                    )
                    .at(decls[i].site.clone())
                    .in_graph(decls[i].name.clone()),
                );
            }
        }

        // Depth, and silent exclusion of descendants of invalid graphs.
        let mut depths: Vec<Option<u32>> = vec![None; n];
        for i in 0..n {
            if candidates[i].is_none() || in_cycle[i] {
                continue;
            }
            let mut chain = vec![i];
            let mut valid = true;
            let mut cur = i;
            while let Some(p) = candidates[cur].as_ref().and_then(|c| c.parent) {
                if candidates[p].is_none() || in_cycle[p] || chain.len() > n {
                    valid = false;
                    break;
                }
                chain.push(p);
                cur = p;
            }
            if !valid {
                continue;
            }
            let depth = (chain.len() - 1) as u32;
            if depth > options.max_hierarchy_depth {
                // Only the first graph past the limit is worth a diagnostic.
                if depth == options.max_hierarchy_depth + 1 {
                    reporter.report(
                        Diagnostic::error(
                            diagnostic_codes::HIERARCHY_TOO_DEEP,
                            &[
                                &decls[i].name,
                                &depth.to_string(),
                                &options.max_hierarchy_depth.to_string(),
                            ],
                        )
                        .at(decls[i].site.clone())
                        .in_graph(decls[i].name.clone()),
                    );
                }
                continue;
            }
            depths[i] = Some(depth);
        }

        // Assign ids in declaration order.
        let mut ids: Vec<Option<GraphId>> = vec![None; n];
        let mut hierarchy = Self {
            declared_names,
            ..Self::default()
        };
        for i in 0..n {
            let (Some(candidate), Some(depth)) = (&candidates[i], depths[i]) else {
                continue;
            };
            let id = GraphId(hierarchy.nodes.len() as u32);
            ids[i] = Some(id);
            hierarchy.by_name.insert(candidate.decl.name.clone(), id);
            hierarchy.nodes.push(GraphNode {
                id,
                name: candidate.decl.name.clone(),
                self_key: candidate.self_key,
                parent: None,
                children: Vec::new(),
                scopes: candidate.decl.scopes.iter().map(Scope::new).collect(),
                requests: candidate.requests.clone(),
                depth,
                site: candidate.decl.site.clone(),
            });
        }
        for i in 0..n {
            let Some(id) = ids[i] else { continue };
            let parent = candidates[i]
                .as_ref()
                .and_then(|c| c.parent)
                .and_then(|p| ids[p]);
            hierarchy.nodes[id.index()].parent = parent;
            match parent {
                Some(parent) => hierarchy.nodes[parent.index()].children.push(id),
                None => hierarchy.roots.push(id),
            }
        }

        // A scope belongs to one graph per chain; the outermost declaration
        // keeps it.
        for i in 0..hierarchy.nodes.len() {
            let id = GraphId(i as u32);
            let scopes = std::mem::take(&mut hierarchy.nodes[i].scopes);
            let mut kept = Vec::with_capacity(scopes.len());
            for scope in scopes {
                let holder = hierarchy
                    .chain(id)
                    .skip(1)
                    .find(|&ancestor| hierarchy.get(ancestor).scopes.contains(&scope));
                match holder {
                    Some(ancestor) => {
                        let node = hierarchy.get(id);
                        reporter.report(
                            Diagnostic::error(
                                diagnostic_codes::SCOPE_REDECLARED,
                                &[&node.name, scope.as_str(), &hierarchy.get(ancestor).name],
                            )
                            .at(node.site.clone())
                            .in_graph(node.name.clone()),
                        );
                    }
                    None => kept.push(scope),
                }
            }
            hierarchy.nodes[i].scopes = kept;
        }

        debug!(
            valid = hierarchy.nodes.len(),
            roots = hierarchy.roots.len(),
            "graph hierarchy built"
        );
        hierarchy
    }

    fn intern_graph<'a>(
        decl: &'a GraphDecl,
        interner: &mut KeyInterner,
        reporter: &mut dyn DiagnosticReporter,
    ) -> Option<Candidate<'a>> {
        let self_type = match TypeRef::parse(&decl.ty) {
            Ok(ty) => ty,
            Err(err) => {
                reporter.report(
                    Diagnostic::error(
                        diagnostic_codes::INVALID_TYPE_REFERENCE,
                        &[&decl.ty, &err.to_string()],
                    )
                    .at(decl.site.clone())
                    .in_graph(decl.name.clone()),
                );
                return None;
            }
        };
        let self_key = interner.intern(BindingKey::new(self_type));

        let mut requests = Vec::with_capacity(decl.requests.len());
        let mut valid = true;
        for request in &decl.requests {
            match request.to_key() {
                Ok(key) => requests.push(interner.intern(key)),
                Err(err) => {
                    valid = false;
                    reporter.report(
                        Diagnostic::error(
                            diagnostic_codes::INVALID_TYPE_REFERENCE,
                            &[&request.ty, &err.to_string()],
                        )
                        .at(decl.site.clone())
                        .in_graph(decl.name.clone()),
                    );
                }
            }
        }
        valid.then_some(Candidate {
            decl,
            self_key,
            requests,
            parent: None,
        })
    }

    pub fn get(&self, id: GraphId) -> &GraphNode {
        &self.nodes[id.index()]
    }

    pub fn by_name(&self, name: &str) -> Option<GraphId> {
        self.by_name.get(name).copied()
    }

    /// Whether `name` appeared in the input at all, even if it was rejected.
    pub fn is_declared_name(&self, name: &str) -> bool {
        self.declared_names.contains(name)
    }

    pub fn roots(&self) -> &[GraphId] {
        &self.roots
    }

    pub fn children(&self, id: GraphId) -> &[GraphId] {
        &self.get(id).children
    }

    /// `id` followed by its ancestors, innermost first.
    pub fn chain(&self, id: GraphId) -> impl Iterator<Item = GraphId> + '_ {
        std::iter::successors(Some(id), move |&g| self.get(g).parent)
    }

    pub fn declares_scope(&self, id: GraphId, scope: &Scope) -> bool {
        self.get(id).scopes.contains(scope)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter()
    }
}
