//! Resolver configuration.
//!
//! Options arrive either embedded in the declaration file under `"options"`
//! or from a standalone JSON file. Every field is optional in JSON.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::limits;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResolverOptions {
    /// Deferred-wrapper type used for storage slots and deferred edges.
    pub provider_type: String,
    /// Lazy wrapper type, used when rendering lazy-wrapped edges.
    pub lazy_type: String,
    /// Suffix appended to generated storage-slot names.
    pub field_suffix: String,
    /// Canonical renames applied to type names before keys are compared.
    pub type_aliases: FxHashMap<String, String>,
    /// Cap on cycles enumerated per strongly connected component.
    pub max_cycle_search: u32,
    /// Maximum nesting depth of graph extensions.
    pub max_hierarchy_depth: u32,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            provider_type: "Provider".to_string(),
            lazy_type: "Lazy".to_string(),
            field_suffix: "Provider".to_string(),
            type_aliases: FxHashMap::default(),
            max_cycle_search: limits::MAX_CYCLES_PER_COMPONENT,
            max_hierarchy_depth: limits::MAX_HIERARCHY_DEPTH,
        }
    }
}

impl ResolverOptions {
    /// Parse options from a JSON document.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Overlay the fields of `other` that differ from the defaults.
    ///
    /// Used by callers that combine file-level options with overrides.
    #[must_use]
    pub fn merged_with(mut self, other: &Self) -> Self {
        let defaults = Self::default();
        if other.provider_type != defaults.provider_type {
            self.provider_type.clone_from(&other.provider_type);
        }
        if other.lazy_type != defaults.lazy_type {
            self.lazy_type.clone_from(&other.lazy_type);
        }
        if other.field_suffix != defaults.field_suffix {
            self.field_suffix.clone_from(&other.field_suffix);
        }
        for (from, to) in &other.type_aliases {
            self.type_aliases.insert(from.clone(), to.clone());
        }
        if other.max_cycle_search != defaults.max_cycle_search {
            self.max_cycle_search = other.max_cycle_search;
        }
        if other.max_hierarchy_depth != defaults.max_hierarchy_depth {
            self.max_hierarchy_depth = other.max_hierarchy_depth;
        }
        self
    }
}
