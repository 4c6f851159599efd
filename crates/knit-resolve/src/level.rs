//! Graph levels, storage slots and slot naming.

use knit_graph::{BindingKey, FxIndexMap, FxIndexSet, GraphId, KeyId, Qualifier, Scope, TypeRef};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

/// Hands out names that are unique within one level.
///
/// The first request for a name gets it unchanged; later requests get
/// `name2`, `name3`, and so on, skipping names already handed out.
#[derive(Debug, Default, Clone)]
pub struct NameAllocator {
    taken: FxHashSet<String>,
    /// Last numeric suffix tried per base name.
    next_suffix: FxHashMap<String, u32>,
}

impl NameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, suggestion: &str) -> String {
        let base = if suggestion.is_empty() {
            "field"
        } else {
            suggestion
        };
        let counter = self.next_suffix.entry(base.to_string()).or_insert(1);
        let mut candidate = base.to_string();
        while self.taken.contains(&candidate) {
            *counter += 1;
            candidate = format!("{base}{counter}");
        }
        self.taken.insert(candidate.clone());
        candidate
    }

    pub fn is_taken(&self, name: &str) -> bool {
        self.taken.contains(name)
    }
}

/// Suggested slot name for `key`: qualifier value, then the type's simple
/// name and its type arguments, in lower camel case, then `suffix`.
pub fn suggest_slot_name(key: &BindingKey, suffix: &str) -> String {
    let mut words: Vec<&str> = Vec::new();
    if let Some(qualifier) = &key.qualifier {
        words.extend(qualifier_words(qualifier));
    }
    collect_type_words(&key.ty, &mut words);

    let mut name = String::new();
    for word in words {
        for part in word.split(|c: char| !c.is_alphanumeric()) {
            let mut chars = part.chars();
            let Some(first) = chars.next() else {
                continue;
            };
            if name.is_empty() {
                if first.is_ascii_digit() {
                    name.push('_');
                }
                name.extend(first.to_lowercase());
            } else {
                name.extend(first.to_uppercase());
            }
            name.push_str(chars.as_str());
        }
    }
    name.push_str(suffix);
    name
}

fn qualifier_words(qualifier: &Qualifier) -> impl Iterator<Item = &str> {
    qualifier.args.iter().map(|(_, value)| value.as_str())
}

fn collect_type_words<'a>(ty: &'a TypeRef, words: &mut Vec<&'a str>) {
    words.push(ty.simple_name());
    for arg in ty.type_arguments() {
        collect_type_words(arg, words);
    }
}

/// The generated field holding a memoized provider for one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSlot {
    pub name: String,
    pub key: KeyId,
    /// The deferred-wrapper of the key's type (`Provider<Db>`).
    #[serde(rename = "type")]
    pub ty: TypeRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<Qualifier>,
    /// Index of the owning level on the level stack (its depth).
    pub level: usize,
}

/// One graph of the hierarchy while it is on the level stack.
#[derive(Debug, Clone)]
pub struct GraphLevel {
    pub graph: GraphId,
    pub name: String,
    pub declared_scopes: Vec<Scope>,
    pub(crate) names: NameAllocator,
    /// Keys whose storage this level owns.
    pub(crate) introduced_keys: FxIndexSet<KeyId>,
    /// Keys this level read from an ancestor.
    pub(crate) used_keys: FxIndexSet<KeyId>,
    /// Keys of this level's storage read by descendants.
    pub(crate) served_keys: FxIndexSet<KeyId>,
    pub(crate) fields: FxIndexMap<KeyId, StorageSlot>,
}

impl GraphLevel {
    pub fn new(graph: GraphId, name: impl Into<String>, declared_scopes: Vec<Scope>) -> Self {
        Self {
            graph,
            name: name.into(),
            declared_scopes,
            names: NameAllocator::new(),
            introduced_keys: FxIndexSet::default(),
            used_keys: FxIndexSet::default(),
            served_keys: FxIndexSet::default(),
            fields: FxIndexMap::default(),
        }
    }

    pub fn declares_scope(&self, scope: &Scope) -> bool {
        self.declared_scopes.contains(scope)
    }

    pub fn introduced_keys(&self) -> impl Iterator<Item = KeyId> + '_ {
        self.introduced_keys.iter().copied()
    }

    /// Keys that must be threaded into this level from its ancestors.
    pub fn used_keys(&self) -> impl Iterator<Item = KeyId> + '_ {
        self.used_keys.iter().copied()
    }

    pub fn served_keys(&self) -> impl Iterator<Item = KeyId> + '_ {
        self.served_keys.iter().copied()
    }

    pub fn field(&self, key: KeyId) -> Option<&StorageSlot> {
        self.fields.get(&key)
    }

    pub fn fields(&self) -> impl Iterator<Item = &StorageSlot> {
        self.fields.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocator_suffixes_repeats() {
        let mut names = NameAllocator::new();
        assert_eq!(names.allocate("dbProvider"), "dbProvider");
        assert_eq!(names.allocate("dbProvider"), "dbProvider2");
        assert_eq!(names.allocate("dbProvider"), "dbProvider3");
        assert!(names.is_taken("dbProvider2"));
    }

    #[test]
    fn allocator_skips_names_taken_directly() {
        let mut names = NameAllocator::new();
        assert_eq!(names.allocate("foo2"), "foo2");
        assert_eq!(names.allocate("foo"), "foo");
        assert_eq!(names.allocate("foo"), "foo3");
    }

    #[test]
    fn slot_names_use_qualifier_and_type_arguments() {
        let key = BindingKey::parse("kotlin.collections.Set<com.app.Plugin>").unwrap();
        assert_eq!(suggest_slot_name(&key, "Provider"), "setPluginProvider");

        let sized = BindingKey::parse("Int")
            .unwrap()
            .with_qualifier(Qualifier::named("cache-size"));
        assert_eq!(suggest_slot_name(&sized, "Provider"), "cacheSizeIntProvider");
    }
}
