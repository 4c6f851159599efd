//! Shared fixtures for the binding graph tests.

use crate::binding::{ContributionKind, Indirection};
use crate::builder::{BindingGraphBuilder, BindingIndex};
use crate::declarations::{BindingDecl, DeclKind, GraphDecl, KeyDecl};
use crate::graph::BindingGraph;
use crate::hierarchy::GraphHierarchy;
use crate::key::{BindingKey, KeyId, KeyInterner};
use knit_common::{DiagnosticCollector, Halt, ResolverOptions};

pub struct Fixture {
    pub options: ResolverOptions,
    pub interner: KeyInterner,
    pub hierarchy: GraphHierarchy,
    pub index: BindingIndex,
    pub reporter: DiagnosticCollector,
}

impl Fixture {
    pub fn new(graphs: &[GraphDecl], bindings: &[BindingDecl]) -> Self {
        Self::with_options(ResolverOptions::default(), graphs, bindings)
    }

    pub fn with_options(
        options: ResolverOptions,
        graphs: &[GraphDecl],
        bindings: &[BindingDecl],
    ) -> Self {
        let mut interner = KeyInterner::new();
        let mut reporter = DiagnosticCollector::new();
        let hierarchy = GraphHierarchy::build(graphs, &options, &mut interner, &mut reporter);
        let index =
            BindingIndex::build(bindings, &hierarchy, &options, &mut interner, &mut reporter);
        Self {
            options,
            interner,
            hierarchy,
            index,
            reporter,
        }
    }

    pub fn key(&self, text: &str) -> KeyId {
        self.interner
            .lookup(&BindingKey::parse(text).unwrap())
            .unwrap_or_else(|| panic!("{text} was never interned"))
    }

    pub fn build(&mut self, graph: &str) -> Result<BindingGraph, Halt> {
        let id = self.hierarchy.by_name(graph).unwrap();
        let builder = BindingGraphBuilder::new(&self.hierarchy, &self.index, &self.interner);
        builder.build(id, &[], &mut self.reporter)
    }

    /// Build, aggregate and plan `graph`.
    pub fn planned(&mut self, graph: &str) -> Result<BindingGraph, Halt> {
        let built = self.build(graph)?;
        let aggregated = crate::multibinding::aggregate(built, &self.interner, &mut self.reporter)?;
        crate::cycles::plan(aggregated, &self.options, &self.interner, &mut self.reporter)
    }
}

pub fn provider(graph: &str, ty: &str) -> BindingDecl {
    BindingDecl::new(DeclKind::Provider, KeyDecl::new(ty)).in_graph(graph)
}

pub fn constructor(ty: &str) -> BindingDecl {
    BindingDecl::new(DeclKind::Constructor, KeyDecl::new(ty))
}

/// `element` contributed to `collection` from `graph`.
pub fn contribution(
    graph: &str,
    element: &str,
    collection: &str,
    kind: ContributionKind,
) -> BindingDecl {
    BindingDecl::new(DeclKind::Contribution, KeyDecl::new(element))
        .in_graph(graph)
        .contributes_to(KeyDecl::new(collection), kind)
}

pub fn direct(decl: BindingDecl, dependency: &str) -> BindingDecl {
    decl.depends_on(KeyDecl::new(dependency), Indirection::Direct)
}
