//! Internal errors and stage control signals.
//!
//! Declaration and graph errors are reported as diagnostics and surface here
//! only as [`Halt::SkipGraph`]. [`InternalError`] is reserved for states that
//! indicate a bug in the engine itself.

use thiserror::Error;

/// An invariant of the resolver was violated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InternalError {
    #[error(
        "level stack corrupt: {key} expected introducing level {expected}, found {found:?}"
    )]
    CorruptLevelStack {
        key: String,
        expected: usize,
        found: Option<usize>,
    },

    #[error("exit_level called with no level on the stack")]
    UnbalancedExit,

    #[error("a dependency cycle survived deferral planning: {path}")]
    SurvivingCycle { path: String },

    #[error("{key} is inherited from an ancestor graph but no ancestor provides storage for it")]
    UnresolvedInherited { key: String },

    #[error("graph '{graph}' did not reach a fixed point after {rounds} materialization rounds")]
    MaterializationDiverged { graph: String, rounds: u32 },
}

/// Why a stage stopped producing output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Halt {
    /// Fatal diagnostics were recorded for the current graph; skip it and
    /// keep checking the others.
    #[error("processing of the current graph was aborted")]
    SkipGraph,

    /// The engine is in an inconsistent state; abort the compilation.
    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl Halt {
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}
