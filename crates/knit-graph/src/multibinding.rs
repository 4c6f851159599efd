//! Multibinding Aggregator.
//!
//! Folds the contributors gathered by the builder into one synthetic
//! [`Aggregate`] binding per collection key. Each contributor becomes a
//! `ProviderWrapped` dependency of the aggregate, so a scoped contributor
//! keeps its own memoization no matter how often the collection is built.
//!
//! A collection key whose type has two type arguments (`Map<K, V>`) is a map
//! collection; every other collection key is a set.

use knit_common::{Diagnostic, DiagnosticReporter, Halt, diagnostic_codes};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::binding::{Aggregate, Binding, BindingKind, CollectionKind, Dependency};
use crate::graph::{BindingGraph, PendingCollection};
use crate::key::{KeyId, KeyInterner};

/// Classify a collection key by the shape of its type.
pub fn collection_kind(interner: &KeyInterner, key: KeyId) -> CollectionKind {
    if interner.key(key).ty.args.len() == 2 {
        CollectionKind::Map
    } else {
        CollectionKind::Set
    }
}

/// Replace every pending collection of `graph` with an aggregate binding.
///
/// A graph without pending collections is returned unchanged, so aggregating
/// twice is a no-op.
#[tracing::instrument(level = "debug", skip_all, fields(graph = graph.name()))]
pub fn aggregate(
    mut graph: BindingGraph,
    interner: &KeyInterner,
    reporter: &mut dyn DiagnosticReporter,
) -> Result<BindingGraph, Halt> {
    let pending = graph.take_pending();
    if pending.is_empty() {
        return Ok(graph);
    }

    let mut fatal = false;
    for (key, collection) in pending {
        match fold(&graph, &collection, interner, reporter) {
            Some(binding) => graph.insert(binding),
            None => fatal = true,
        }
        debug!(
            collection = %interner.display(key),
            contributors = collection.contributors.len(),
            "aggregated multibinding"
        );
    }

    if fatal {
        return Err(Halt::SkipGraph);
    }
    Ok(graph)
}

fn fold(
    graph: &BindingGraph,
    collection: &PendingCollection,
    interner: &KeyInterner,
    reporter: &mut dyn DiagnosticReporter,
) -> Option<Binding> {
    let kind = collection_kind(interner, collection.key);
    let display = interner.display(collection.key);
    let mut valid = true;

    let mut map_keys: FxHashMap<&str, &Binding> = FxHashMap::default();
    for &contributor in &collection.contributors {
        let Some(binding) = graph.get(contributor) else {
            continue;
        };
        let Some(contribution) = binding.contribution() else {
            continue;
        };

        if !contribution.kind.fits(kind) {
            reporter.report(
                Diagnostic::error(diagnostic_codes::CONTRIBUTION_KIND_MISMATCH, &[&display])
                    .at(binding.site.clone())
                    .in_graph(graph.name()),
            );
            valid = false;
            continue;
        }

        if let Some(map_key) = contribution.map_key.as_deref()
            && let Some(previous) = map_keys.insert(map_key, binding)
        {
            reporter.report(
                Diagnostic::error(diagnostic_codes::DUPLICATE_MAP_KEY, &[map_key, &display])
                    .at(binding.site.clone())
                    .in_graph(graph.name())
                    .with_related(
                        previous.site.clone(),
                        format!("'{map_key}' first contributed here"),
                    ),
            );
            valid = false;
        }
    }
    if !valid {
        return None;
    }

    let mut aggregate = Binding::new(
        collection.key,
        BindingKind::Aggregate(Aggregate {
            collection: kind,
            contributors: collection.contributors.clone(),
        }),
    )
    .owned_by(graph.graph())
    .with_ordinal(collection.ordinal)
    .at(collection.site.clone());
    for &contributor in &collection.contributors {
        aggregate = aggregate.depends_on(Dependency::provider(contributor));
    }
    Some(aggregate)
}
