//! Common types and utilities for the knit binding resolver.
//!
//! This crate provides foundational types used across all knit crates:
//! - Diagnostics (`Diagnostic`, `DiagnosticReporter`, `DiagnosticCollector`)
//! - Declaration sites for user-facing error context
//! - Internal error and halt signals shared by every resolution stage
//! - Resolver options (configuration)
//! - Centralized limits and thresholds

// Diagnostics - user-facing errors and the reporter seam
pub mod diagnostics;
pub use diagnostics::{
    DeclarationSite, Diagnostic, DiagnosticCategory, DiagnosticCollector,
    DiagnosticRelatedInformation, DiagnosticReporter, diagnostic_codes, format_message,
};

// Internal invariant violations and the per-graph abort signal
pub mod error;
pub use error::{Halt, InternalError};

// Centralized limits and thresholds
pub mod limits;

// Resolver configuration
pub mod options;
pub use options::ResolverOptions;

#[cfg(test)]
#[path = "../tests/diagnostics_tests.rs"]
mod diagnostics_tests;
#[cfg(test)]
#[path = "../tests/options_tests.rs"]
mod options_tests;
