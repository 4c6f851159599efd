//! Binding records: one way to produce a value for a key.

use knit_common::DeclarationSite;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

use crate::key::KeyId;

/// Index of a graph in the validated hierarchy.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct GraphId(pub u32);

impl GraphId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A scope annotation (`Singleton`, `UserScope`, ...).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope(pub String);

impl Scope {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// How a consumer obtains a dependency.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Indirection {
    /// The value itself, needed at construction time.
    #[default]
    Direct,
    /// A provider the consumer may invoke later.
    #[serde(alias = "provider")]
    ProviderWrapped,
    /// A memoizing lazy handle the consumer may invoke later.
    #[serde(alias = "lazy")]
    LazyWrapped,
}

impl Indirection {
    /// Deferred edges never take part in cycles or ordering.
    #[inline]
    pub fn is_deferred(self) -> bool {
        !matches!(self, Self::Direct)
    }
}

/// One dependency edge of a binding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dependency {
    pub key: KeyId,
    pub indirection: Indirection,
    /// The declaration allows this edge to be wrapped in a provider.
    pub deferrable: bool,
    /// Set when the cycle planner rewrote this edge from `Direct`.
    pub rewritten: bool,
}

impl Dependency {
    pub fn new(key: KeyId, indirection: Indirection) -> Self {
        Self {
            key,
            indirection,
            deferrable: false,
            rewritten: false,
        }
    }

    pub fn direct(key: KeyId) -> Self {
        Self::new(key, Indirection::Direct)
    }

    pub fn provider(key: KeyId) -> Self {
        Self::new(key, Indirection::ProviderWrapped)
    }

    pub fn lazy(key: KeyId) -> Self {
        Self::new(key, Indirection::LazyWrapped)
    }

    #[must_use]
    pub fn deferrable(mut self) -> Self {
        self.deferrable = true;
        self
    }

    #[inline]
    pub fn is_direct(&self) -> bool {
        self.indirection == Indirection::Direct
    }

    /// Whether the cycle planner may turn this edge into a provider edge.
    #[inline]
    pub fn is_reclassifiable(&self) -> bool {
        self.is_direct() && self.deferrable
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    Set,
    Map,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContributionKind {
    /// One element added to a set.
    SetElement,
    /// A whole set whose elements are added to a set.
    SetElements,
    /// One entry added to a map.
    MapEntry,
    /// Declares the collection so it may be empty.
    Declared,
}

impl ContributionKind {
    pub fn fits(self, collection: CollectionKind) -> bool {
        match self {
            Self::SetElement | Self::SetElements => collection == CollectionKind::Set,
            Self::MapEntry => collection == CollectionKind::Map,
            Self::Declared => true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Contribution {
    pub collection: KeyId,
    pub kind: ContributionKind,
    pub map_key: Option<String>,
}

/// A synthetic binding folding every contributor of one collection key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Aggregate {
    pub collection: CollectionKind,
    pub contributors: Vec<KeyId>,
}

impl Aggregate {
    /// A declared collection nobody contributes to; rendered as one shared
    /// empty instance.
    pub fn is_empty(&self) -> bool {
        self.contributors.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BindingKind {
    /// Constructor-injected class.
    Constructor,
    /// Provider function declared on a graph or module.
    Provider,
    /// `binds`: forwards to its single dependency.
    Alias,
    Aggregate(Aggregate),
    /// A value bound when the graph is created.
    Instance,
    /// The graph itself.
    GraphSelf,
    Contribution(Contribution),
}

impl BindingKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Constructor => "constructor",
            Self::Provider => "provider",
            Self::Alias => "alias",
            Self::Aggregate(_) => "aggregate",
            Self::Instance => "instance",
            Self::GraphSelf => "graph",
            Self::Contribution(_) => "contribution",
        }
    }
}

/// One way to produce a value for a key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Binding {
    pub key: KeyId,
    pub kind: BindingKind,
    pub scope: Option<Scope>,
    pub dependencies: SmallVec<[Dependency; 4]>,
    /// Graph whose declarations contain this binding; `None` for
    /// free-floating constructor-injected classes.
    pub owner: Option<GraphId>,
    pub site: Option<DeclarationSite>,
    /// Declaration order, used to break ties deterministically.
    pub ordinal: u32,
    /// Set when storage lives at an ancestor level; such bindings are leaves
    /// in a child's graph.
    pub inherited_from: Option<GraphId>,
}

impl Binding {
    pub fn new(key: KeyId, kind: BindingKind) -> Self {
        Self {
            key,
            kind,
            scope: None,
            dependencies: SmallVec::new(),
            owner: None,
            site: None,
            ordinal: 0,
            inherited_from: None,
        }
    }

    #[must_use]
    pub fn scoped(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    #[must_use]
    pub fn depends_on(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    #[must_use]
    pub fn owned_by(mut self, graph: GraphId) -> Self {
        self.owner = Some(graph);
        self
    }

    #[must_use]
    pub fn with_ordinal(mut self, ordinal: u32) -> Self {
        self.ordinal = ordinal;
        self
    }

    #[must_use]
    pub fn at(mut self, site: Option<DeclarationSite>) -> Self {
        self.site = site;
        self
    }

    pub fn contribution(&self) -> Option<&Contribution> {
        match &self.kind {
            BindingKind::Contribution(contribution) => Some(contribution),
            _ => None,
        }
    }

    pub fn aggregate(&self) -> Option<&Aggregate> {
        match &self.kind {
            BindingKind::Aggregate(aggregate) => Some(aggregate),
            _ => None,
        }
    }

    /// Whether a memoized storage slot backs this binding.
    pub fn requires_storage(&self) -> bool {
        self.scope.is_some()
            || self.inherited_from.is_some()
            || matches!(self.kind, BindingKind::Instance | BindingKind::GraphSelf)
    }

    pub fn direct_dependencies(&self) -> impl Iterator<Item = &Dependency> {
        self.dependencies.iter().filter(|dep| dep.is_direct())
    }
}
