//! Path guard for bounded depth-first searches over the binding graph.
//!
//! Cycle enumeration walks dependency paths depth-first. [`PathGuard`]
//! combines the bookkeeping every such walk needs:
//! 1. **Path tracking**: the keys currently on the path, in order
//! 2. **Depth limiting** so a pathological graph cannot exhaust the stack
//! 3. **Iteration bounding** so dense components cannot run forever
//!
//! # Profiles
//!
//! [`SearchProfile`] names the limit presets used at each call site:
//!
//! ```ignore
//! let mut guard = PathGuard::with_profile(SearchProfile::CycleSearch);
//! ```
//!
//! # Safety
//!
//! - **Debug leak detection**: In debug builds, dropping a guard with keys
//!   still on the path panics, catching forgotten `leave()` calls.
//! - **Debug order detection**: leaving a key that is not the top of the path
//!   panics in debug builds.
//! - **Overflow protection**: Iteration counting uses saturating arithmetic.

use knit_common::limits;
use rustc_hash::FxHashSet;
use std::hash::Hash;

// ---------------------------------------------------------------------------
// SearchProfile
// ---------------------------------------------------------------------------

/// Named search limit presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchProfile {
    /// Elementary cycle enumeration inside one strongly connected component.
    ///
    /// depth = [`limits::MAX_DEPENDENCY_PATH`],
    /// iterations = [`limits::MAX_CYCLE_SEARCH_STEPS`]
    CycleSearch,

    /// Custom limits for one-off or test scenarios.
    Custom { max_depth: u32, max_iterations: u32 },
}

impl SearchProfile {
    pub const fn max_depth(self) -> u32 {
        match self {
            Self::CycleSearch => limits::MAX_DEPENDENCY_PATH,
            Self::Custom { max_depth, .. } => max_depth,
        }
    }

    pub const fn max_iterations(self) -> u32 {
        match self {
            Self::CycleSearch => limits::MAX_CYCLE_SEARCH_STEPS,
            Self::Custom { max_iterations, .. } => max_iterations,
        }
    }
}

// ---------------------------------------------------------------------------
// PathStep
// ---------------------------------------------------------------------------

/// Result of attempting to extend the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStep {
    /// The key was pushed onto the path.
    Entered,
    /// The key is already on the path.
    Cycle,
    DepthExceeded,
    IterationExceeded,
}

impl PathStep {
    #[inline]
    pub fn is_entered(self) -> bool {
        matches!(self, Self::Entered)
    }

    #[inline]
    pub fn is_cycle(self) -> bool {
        matches!(self, Self::Cycle)
    }

    #[inline]
    pub fn is_exceeded(self) -> bool {
        matches!(self, Self::DepthExceeded | Self::IterationExceeded)
    }
}

// ---------------------------------------------------------------------------
// PathGuard
// ---------------------------------------------------------------------------

/// Tracks the current search path with depth and iteration limits.
///
/// # Usage
///
/// ```ignore
/// match guard.enter(key) {
///     PathStep::Entered => {
///         visit_successors(&mut guard);
///         guard.leave(key);
///     }
///     PathStep::Cycle => record(guard.path_from(key)),
///     PathStep::DepthExceeded | PathStep::IterationExceeded => return,
/// }
/// ```
pub struct PathGuard<K: Hash + Eq + Copy> {
    path: Vec<K>,
    on_path: FxHashSet<K>,
    iterations: u32,
    max_depth: u32,
    max_iterations: u32,
    exceeded: bool,
}

impl<K: Hash + Eq + Copy> PathGuard<K> {
    pub fn new(max_depth: u32, max_iterations: u32) -> Self {
        Self {
            path: Vec::new(),
            on_path: FxHashSet::default(),
            iterations: 0,
            max_depth,
            max_iterations,
            exceeded: false,
        }
    }

    pub fn with_profile(profile: SearchProfile) -> Self {
        Self::new(profile.max_depth(), profile.max_iterations())
    }

    /// Try to push `key` onto the path.
    ///
    /// On [`PathStep::Entered`] the caller must call [`leave`](Self::leave)
    /// with the same key once its successors are done.
    pub fn enter(&mut self, key: K) -> PathStep {
        self.iterations = self.iterations.saturating_add(1);

        if self.iterations > self.max_iterations {
            self.exceeded = true;
            return PathStep::IterationExceeded;
        }
        if self.on_path.contains(&key) {
            return PathStep::Cycle;
        }
        if self.path.len() as u32 >= self.max_depth {
            self.exceeded = true;
            return PathStep::DepthExceeded;
        }

        self.on_path.insert(key);
        self.path.push(key);
        PathStep::Entered
    }

    /// Pop `key` off the path. It must be the most recently entered key.
    pub fn leave(&mut self, key: K) {
        let top = self.path.pop();
        debug_assert!(
            top == Some(key),
            "PathGuard::leave() called with a key that is not the top of the path. \
             This indicates a double-leave or out-of-order leave."
        );
        self.on_path.remove(&key);
    }

    /// Run `f` with `key` on the path.
    ///
    /// If `f` panics the key leaks; the debug `Drop` check is suppressed
    /// while unwinding.
    pub fn scope<T>(&mut self, key: K, f: impl FnOnce(&mut Self) -> T) -> Result<T, PathStep> {
        match self.enter(key) {
            PathStep::Entered => {
                let result = f(self);
                self.leave(key);
                Ok(result)
            }
            denied => Err(denied),
        }
    }

    #[inline]
    pub fn path(&self) -> &[K] {
        &self.path
    }

    /// The suffix of the path starting at `key`, if `key` is on the path.
    pub fn path_from(&self, key: K) -> Option<&[K]> {
        let start = self.path.iter().position(|&k| k == key)?;
        Some(&self.path[start..])
    }

    #[inline]
    pub fn is_on_path(&self, key: &K) -> bool {
        self.on_path.contains(key)
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.path.len()
    }

    #[inline]
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Sticky: stays set until [`reset`](Self::reset).
    #[inline]
    pub fn is_exceeded(&self) -> bool {
        self.exceeded
    }

    /// Clear the path and counters while keeping the limits.
    pub fn reset(&mut self) {
        self.path.clear();
        self.on_path.clear();
        self.iterations = 0;
        self.exceeded = false;
    }
}

#[cfg(debug_assertions)]
impl<K: Hash + Eq + Copy> Drop for PathGuard<K> {
    fn drop(&mut self) {
        if !std::thread::panicking() && !self.path.is_empty() {
            panic!(
                "PathGuard dropped with {} keys still on the path. \
                 This indicates enter() calls without matching leave() calls.",
                self.path.len(),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enter_and_leave_track_the_path() {
        let mut guard = PathGuard::<u32>::with_profile(SearchProfile::CycleSearch);
        assert!(guard.enter(1).is_entered());
        assert!(guard.enter(2).is_entered());
        assert_eq!(guard.path(), &[1, 2]);
        assert!(guard.enter(1).is_cycle());
        assert_eq!(guard.path_from(1), Some(&[1, 2][..]));
        guard.leave(2);
        guard.leave(1);
        assert_eq!(guard.depth(), 0);
    }

    #[test]
    fn depth_limit_is_sticky() {
        let mut guard = PathGuard::<u32>::new(1, 100);
        assert!(guard.enter(1).is_entered());
        assert_eq!(guard.enter(2), PathStep::DepthExceeded);
        guard.leave(1);
        assert!(guard.is_exceeded());
        guard.reset();
        assert!(!guard.is_exceeded());
    }

    #[test]
    fn iteration_limit_counts_every_attempt() {
        let mut guard = PathGuard::<u32>::with_profile(SearchProfile::Custom {
            max_depth: 10,
            max_iterations: 2,
        });
        assert!(guard.scope(1, |_| ()).is_ok());
        assert!(guard.scope(2, |_| ()).is_ok());
        assert_eq!(guard.enter(3), PathStep::IterationExceeded);
        assert_eq!(guard.iterations(), 3);
    }

    #[test]
    fn scope_nests() {
        let mut guard = PathGuard::<u32>::new(8, 100);
        let inner = guard.scope(1, |g| g.scope(2, |g| g.path().to_vec()));
        assert_eq!(inner, Ok(Ok(vec![1, 2])));
        assert!(guard.path().is_empty());
    }
}
