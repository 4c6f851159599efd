//! Binding graph construction for knit.
//!
//! This crate turns front-end declarations into per-graph binding graphs
//! ready for code generation:
//!
//! - **Keys**: structured type references, qualifiers and the canonicalizing
//!   `KeyInterner` (`KeyId` comparison is key equality)
//! - **Hierarchy**: validated tree of root graphs and nested extensions
//! - **Builder**: resolves every requested key against the hierarchy
//! - **Multibindings**: folds contributions into aggregate bindings
//! - **Cycles**: finds direct-edge cycles and defers edges to break them
//! - **Order**: single-pass construction order and forward-reference steps
pub mod binding;
pub mod builder;
pub mod cycles;
pub mod declarations;
pub mod graph;
pub mod hierarchy;
pub mod key;
pub mod multibinding;
pub mod order;
pub mod recursion;

pub use binding::{
    Aggregate, Binding, BindingKind, CollectionKind, Contribution, ContributionKind, Dependency,
    GraphId, Indirection, Scope,
};
pub use builder::{BindingGraphBuilder, BindingIndex, MULTIBINDING_ELEMENT};
pub use cycles::plan;
pub use declarations::{
    BindingDecl, ContributionDecl, DeclKind, Declarations, DependencyDecl, GraphDecl, KeyDecl,
    QualifierDecl,
};
pub use graph::{BindingGraph, DeferredEdge, FxIndexMap, FxIndexSet, PendingCollection};
pub use hierarchy::{GraphHierarchy, GraphNode};
pub use key::{
    BindingKey, KeyId, KeyInterner, Qualifier, TypeArg, TypeParseError, TypeRef, Variance,
};
pub use multibinding::{aggregate, collection_kind};
pub use order::{InitStep, forward_references, initialization_steps, linearize};

#[cfg(test)]
#[path = "../tests/key_tests.rs"]
mod key_tests;
#[cfg(test)]
#[path = "../tests/hierarchy_tests.rs"]
mod hierarchy_tests;
#[cfg(test)]
#[path = "../tests/builder_tests.rs"]
mod builder_tests;
#[cfg(test)]
#[path = "../tests/multibinding_tests.rs"]
mod multibinding_tests;
#[cfg(test)]
#[path = "../tests/cycles_tests.rs"]
mod cycles_tests;
#[cfg(test)]
#[path = "../tests/order_tests.rs"]
mod order_tests;
#[cfg(test)]
#[path = "../tests/support.rs"]
mod test_support;
