//! knit: compile-time dependency-injection binding resolution.
//!
//! The engine lives in three crates, re-exported here:
//!
//! - [`knit_common`]: diagnostics, options, limits and internal errors
//! - [`knit_graph`]: binding keys, the graph hierarchy and per-graph binding
//!   graphs with multibinding aggregation, cycle deferral and ordering
//! - [`knit_resolve`]: the hierarchy walk that allocates storage slots and
//!   produces the [`ResolutionPlan`]
//!
//! ```no_run
//! use knit::{DiagnosticCollector, Declarations};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let declarations = Declarations::from_json(&std::fs::read_to_string("decls.json")?)?;
//! let mut diagnostics = DiagnosticCollector::new();
//! let plan = knit::resolve(&declarations, &mut diagnostics)?;
//! println!("{}", plan.to_json()?);
//! # Ok(())
//! # }
//! ```

pub use knit_common as common;
pub use knit_graph as graph;
pub use knit_resolve as resolver;

pub use knit_common::{
    DeclarationSite, Diagnostic, DiagnosticCategory, DiagnosticCollector, DiagnosticReporter,
    InternalError, ResolverOptions, diagnostic_codes,
};
pub use knit_graph::{
    BindingDecl, BindingKey, ContributionKind, DeclKind, Declarations, GraphDecl, Indirection,
    InitStep, KeyDecl, KeyId,
};
pub use knit_resolve::{
    BindingPlan, BindingSource, LevelPlan, ResolutionPlan, Resolver, StorageSlot, resolve,
};

pub mod tracing_config;

#[cfg(feature = "cli")]
pub mod cli;
