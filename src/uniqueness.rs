//! Table-wide duplicate detection for unique fields
//!
//! Duplication is a property of the whole table, so the duplicate sets are
//! computed in a separate pass before any record is validated.

use std::collections::{HashMap, HashSet};

use crate::schema::Schema;
use crate::table::Table;

/// Placeholder that never counts as a value for uniqueness; `nan` is matched in any casing
const NONE_PLACEHOLDER: &str = "None";

fn countable(raw: Option<&str>) -> Option<&str> {
    let value = raw?.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("nan") || value == NONE_PLACEHOLDER {
        None
    } else {
        Some(value)
    }
}

/// Trimmed values of `field` that occur more than once in `table`.
///
/// An absent column yields an empty set.
pub fn find_duplicates(table: &Table, field: &str) -> HashSet<String> {
    if !table.has_column(field) {
        return HashSet::new();
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in table.column_values(field).filter_map(countable) {
        *counts.entry(value).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(value, _)| value.to_string())
        .collect()
}

/// Duplicate sets for every unique field of a schema, computed once per run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DuplicateIndex {
    duplicates: HashMap<String, HashSet<String>>,
}

impl DuplicateIndex {
    pub fn build(table: &Table, schema: &Schema) -> Self {
        let duplicates = schema
            .unique_fields()
            .iter()
            .filter(|field| table.has_column(field))
            .map(|field| (field.clone(), find_duplicates(table, field)))
            .collect();
        Self { duplicates }
    }

    /// Whether the trimmed `value` of `field` appears more than once in the table
    pub fn is_duplicate(&self, field: &str, value: &str) -> bool {
        self.duplicates
            .get(field)
            .is_some_and(|values| values.contains(value.trim()))
    }

    pub fn duplicates_of(&self, field: &str) -> Option<&HashSet<String>> {
        self.duplicates.get(field)
    }
}
