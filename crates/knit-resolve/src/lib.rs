//! Hierarchy resolution for knit.
//!
//! Walks the graph hierarchy depth first, running each graph through the
//! binding-graph pipeline of `knit-graph` while its level sits on a
//! [`ParentContext`]. The context decides which level owns the storage of
//! each key and which keys every nested graph must receive from its
//! ancestors. The result is a [`ResolutionPlan`] for the code generator.
pub mod driver;
pub mod level;
pub mod parent_context;
pub mod plan;

pub use driver::{Resolver, resolve};
pub use level::{GraphLevel, NameAllocator, StorageSlot, suggest_slot_name};
pub use parent_context::{FieldAccess, ParentContext};
pub use plan::{
    AggregatePlan, BindingPlan, BindingSource, DependencyPlan, KeyEntry, LevelPlan,
    ResolutionPlan,
};

#[cfg(test)]
#[path = "../tests/parent_context_tests.rs"]
mod parent_context_tests;
#[cfg(test)]
#[path = "../tests/driver_tests.rs"]
mod driver_tests;
