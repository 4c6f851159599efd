//! Centralized limits and thresholds for the resolver.
//!
//! These bound work that is otherwise proportional to user input in the worst
//! case (cycle enumeration is exponential on dense components).

/// Maximum nesting depth of graph extensions below a root graph.
///
/// Deeper hierarchies are reported as declaration errors rather than
/// resolved.
pub const MAX_HIERARCHY_DEPTH: u32 = 64;

/// Maximum number of elementary cycles enumerated per strongly connected
/// component in one planning round.
///
/// When the cap is hit the planner defers edges for the cycles it has seen
/// and runs another round on what is left.
pub const MAX_CYCLES_PER_COMPONENT: u32 = 1_000;

/// Planning rounds that enumerate cycles. Later rounds defer one edge per
/// remaining component without enumerating.
pub const MAX_PLANNING_ROUNDS: u32 = 64;

/// Maximum length of a dependency path followed during cycle enumeration.
pub const MAX_DEPENDENCY_PATH: u32 = 4_096;

/// Maximum total steps of a single cycle enumeration.
pub const MAX_CYCLE_SEARCH_STEPS: u32 = 1_000_000;

/// How many times a level may be rebuilt to absorb keys its descendants
/// consumed from it.
pub const MAX_MATERIALIZATION_ROUNDS: u32 = 16;
