//! Column naming rules shared by tables and function signatures

use std::collections::HashMap;

use arrow::datatypes::Field;

/// Unnamed wire columns are called `v{wire index}`.
pub fn column_name(field: &Field, wire_index: usize) -> String {
    if field.name().is_empty() {
        format!("v{}", wire_index)
    } else {
        field.name().clone()
    }
}

/// Make names unique ignoring case by suffixing `_1`, `_2`, ...
///
/// The first occurrence keeps its name; a generated name never collides
/// with one already taken.
pub fn deduplicate_names(names: &mut [String]) {
    let mut seen: HashMap<String, usize> = HashMap::new();
    for name in names.iter_mut() {
        let lower = name.to_lowercase();
        let Some(count) = seen.get(&lower).copied() else {
            seen.insert(lower, 1);
            continue;
        };
        let mut suffix = count;
        let mut candidate = format!("{}_{}", name, suffix);
        while seen.contains_key(&candidate.to_lowercase()) {
            suffix += 1;
            candidate = format!("{}_{}", name, suffix);
        }
        seen.insert(lower, suffix + 1);
        seen.insert(candidate.to_lowercase(), 1);
        *name = candidate;
    }
}
