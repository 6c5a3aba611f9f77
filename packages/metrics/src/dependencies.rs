//! Dependency expansion and ordering over the static metric table.

use std::collections::BTreeSet;

use crate::MetricCatalog;

/// Expands a selection with every transitive dependency.
///
/// Requested keys come first in their given order (duplicates removed),
/// followed by dependencies in discovery order. Unknown keys are kept so
/// that computation can report them.
#[must_use]
pub fn select_with_dependencies(catalog: &MetricCatalog, requested: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut selection: Vec<String> = requested
        .iter()
        .filter(|key| seen.insert(key.as_str()))
        .cloned()
        .collect();

    let mut cursor = 0;
    while cursor < selection.len() {
        for dependency in catalog.dependencies_of(&selection[cursor]) {
            if !selection.contains(dependency) {
                selection.push(dependency.clone());
            }
        }
        cursor += 1;
    }

    selection
}

/// Orders keys so that every metric follows all of its dependencies.
///
/// Dependencies not in `keys` are pulled in. Ties keep input order.
#[must_use]
pub fn compute_order(catalog: &MetricCatalog, keys: &[String]) -> Vec<String> {
    fn visit(
        catalog: &MetricCatalog,
        key: &str,
        visited: &mut BTreeSet<String>,
        order: &mut Vec<String>,
    ) {
        if !visited.insert(key.to_string()) {
            return;
        }
        for dependency in catalog.dependencies_of(key) {
            visit(catalog, dependency, visited, order);
        }
        order.push(key.to_string());
    }

    let mut visited = BTreeSet::new();
    let mut order = Vec::with_capacity(keys.len());
    for key in keys {
        visit(catalog, key, &mut visited, &mut order);
    }
    order
}
