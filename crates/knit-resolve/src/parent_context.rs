//! Parent/child storage allocation across the graph hierarchy.
//!
//! [`ParentContext`] is a stack-scoped symbol table: every key introduced by
//! a level shadows the same key introduced further out, and is retracted
//! again when that level is popped. Unlike plain lexical scoping a key stays
//! available after retraction while any outer level still introduces it, so
//! each key carries its own stack of introducing level indices.
//!
//! Lookups always pick the nearest introducer (the last entry of the key's
//! stack). A key nobody introduced can still land on the stack through the
//! scope walk: the innermost level declaring the requested scope introduces
//! it on the spot.

use knit_common::{InternalError, ResolverOptions};
use knit_graph::{FxIndexSet, GraphId, KeyId, KeyInterner, Scope, TypeRef};
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::level::{GraphLevel, StorageSlot, suggest_slot_name};

/// Where a resolved key is stored, seen from the top of the stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAccess {
    /// Stack index of the owning level.
    pub level: usize,
    pub graph: GraphId,
    pub slot: StorageSlot,
}

impl FieldAccess {
    /// Whether the slot is owned by a level other than the one asking.
    pub fn is_inherited(&self, from_level: usize) -> bool {
        self.level < from_level
    }
}

/// Storage allocator for one pass over a graph hierarchy.
pub struct ParentContext<'a> {
    interner: &'a KeyInterner,
    options: &'a ResolverOptions,
    levels: Vec<GraphLevel>,
    available: FxHashSet<KeyId>,
    /// Key -> indices of the levels introducing it, innermost last.
    key_intro_stack: FxHashMap<KeyId, SmallVec<[usize; 2]>>,
    pending: FxIndexSet<KeyId>,
    /// How many levels on the stack declare each scope.
    scope_union: FxHashMap<Scope, u32>,
}

impl<'a> ParentContext<'a> {
    pub fn new(interner: &'a KeyInterner, options: &'a ResolverOptions) -> Self {
        Self {
            interner,
            options,
            levels: Vec::new(),
            available: FxHashSet::default(),
            key_intro_stack: FxHashMap::default(),
            pending: FxIndexSet::default(),
            scope_union: FxHashMap::default(),
        }
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    pub fn level(&self, index: usize) -> Option<&GraphLevel> {
        self.levels.get(index)
    }

    pub fn top(&self) -> Option<&GraphLevel> {
        self.levels.last()
    }

    /// Whether any level on the stack declares `scope`.
    pub fn has_scope(&self, scope: &Scope) -> bool {
        self.scope_union.get(scope).is_some_and(|&count| count > 0)
    }

    /// Queue keys for introduction by the next level pushed.
    pub fn stage(&mut self, keys: impl IntoIterator<Item = KeyId>) {
        self.pending.extend(keys);
    }

    /// Push `level`; every staged key is introduced by it.
    ///
    /// Returns the stack index of the new level.
    pub fn enter_level(&mut self, mut level: GraphLevel) -> usize {
        let index = self.levels.len();
        for key in self.pending.drain(..) {
            let stack = self.key_intro_stack.entry(key).or_default();
            if stack.last() != Some(&index) {
                stack.push(index);
            }
            level.introduced_keys.insert(key);
            self.available.insert(key);
        }
        for scope in &level.declared_scopes {
            *self.scope_union.entry(scope.clone()).or_default() += 1;
        }
        debug!(
            graph = %level.name,
            index,
            introduced = level.introduced_keys.len(),
            "entered level"
        );
        self.levels.push(level);
        index
    }

    /// Pop the top level and retract the keys it introduced.
    ///
    /// The returned level carries the keys it consumed from its ancestors
    /// ([`GraphLevel::used_keys`]), which the caller must thread into it.
    pub fn exit_level(&mut self) -> Result<GraphLevel, InternalError> {
        let level = self.levels.pop().ok_or(InternalError::UnbalancedExit)?;
        let index = self.levels.len();

        for &key in &level.introduced_keys {
            let Some(stack) = self.key_intro_stack.get_mut(&key) else {
                return Err(self.corrupt(key, index, None));
            };
            let found = stack.pop();
            if found != Some(index) {
                return Err(self.corrupt(key, index, found));
            }
            if stack.is_empty() {
                self.key_intro_stack.remove(&key);
                self.available.remove(&key);
            }
        }

        for scope in &level.declared_scopes {
            if let Some(count) = self.scope_union.get_mut(scope) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    self.scope_union.remove(scope);
                }
            }
        }

        debug!(
            graph = %level.name,
            index,
            used = level.used_keys.len(),
            "exited level"
        );
        Ok(level)
    }

    fn corrupt(&self, key: KeyId, expected: usize, found: Option<usize>) -> InternalError {
        InternalError::CorruptLevelStack {
            key: self.interner.display(key),
            expected,
            found,
        }
    }

    /// Run `f` with `level` pushed, popping it again however `f` returns.
    pub fn with_level<T>(
        &mut self,
        level: GraphLevel,
        f: impl FnOnce(&mut Self) -> T,
    ) -> Result<(T, GraphLevel), InternalError> {
        self.enter_level(level);
        let value = f(self);
        let level = self.exit_level()?;
        Ok((value, level))
    }

    /// Storage for `key`, creating the slot on first use.
    ///
    /// Falls back to the scope walk when no level introduces `key` and a
    /// `scope` is given. `None` means the key is local to the level asking.
    pub fn resolve_field(&mut self, key: KeyId, scope: Option<&Scope>) -> Option<FieldAccess> {
        let top = self.levels.len().checked_sub(1)?;
        let owner = match self.nearest_introducer(key) {
            Some(owner) => owner,
            None => {
                let scope = scope.filter(|scope| self.has_scope(scope))?;
                let owner = self
                    .levels
                    .iter()
                    .rposition(|level| level.declares_scope(scope))?;
                self.introduce_at(owner, key);
                trace!(
                    key = %self.interner.display(key),
                    scope = scope.as_str(),
                    owner,
                    "introduced by scope walk"
                );
                owner
            }
        };

        let slot = self.slot_at(owner, key);
        if owner < top {
            self.levels[owner].served_keys.insert(key);
            self.levels[top].used_keys.insert(key);
        }
        Some(FieldAccess {
            level: owner,
            graph: self.levels[owner].graph,
            slot,
        })
    }

    /// The existing slot of the nearest introducer of `key`, if any. Never
    /// allocates.
    pub fn peek_field(&self, key: KeyId) -> Option<&StorageSlot> {
        let owner = self.nearest_introducer(key)?;
        self.levels[owner].field(key)
    }

    /// Whether `key` is staged or introduced by a level on the stack.
    pub fn is_known(&self, key: KeyId) -> bool {
        self.pending.contains(&key) || self.available.contains(&key)
    }

    fn nearest_introducer(&self, key: KeyId) -> Option<usize> {
        self.key_intro_stack
            .get(&key)
            .and_then(|stack| stack.last().copied())
    }

    fn introduce_at(&mut self, index: usize, key: KeyId) {
        self.key_intro_stack.entry(key).or_default().push(index);
        self.levels[index].introduced_keys.insert(key);
        self.available.insert(key);
    }

    fn slot_at(&mut self, index: usize, key: KeyId) -> StorageSlot {
        let level = &mut self.levels[index];
        if let Some(slot) = level.fields.get(&key) {
            return slot.clone();
        }

        let binding_key = self.interner.key(key);
        let name = level
            .names
            .allocate(&suggest_slot_name(binding_key, &self.options.field_suffix));
        let slot = StorageSlot {
            name,
            key,
            ty: TypeRef::generic(
                self.options.provider_type.clone(),
                [binding_key.ty.clone()],
            ),
            qualifier: binding_key.qualifier.clone(),
            level: index,
        };
        trace!(graph = %level.name, slot = %slot.name, "allocated storage slot");
        level.fields.insert(key, slot.clone());
        slot
    }
}

#[cfg(debug_assertions)]
impl Drop for ParentContext<'_> {
    fn drop(&mut self) {
        if !std::thread::panicking() && !self.levels.is_empty() {
            panic!(
                "ParentContext dropped with {} level(s) still entered",
                self.levels.len()
            );
        }
    }
}
