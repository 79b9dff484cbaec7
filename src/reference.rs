//! Reference lookup tables handed to custom validators
//!
//! Reference data is a keyed bag of lookup tables (the role mapping, the
//! boundary id to name mapping, ...). The engine passes it through to hooks
//! untouched; each hook decides what an empty or missing table means.

use std::collections::HashMap;
use std::io;
use std::path::Path;

use indexmap::{IndexMap, IndexSet};
use serde_json::Value;
use tracing::debug;

use crate::error::{ReferenceDataError, ReferenceResult};

/// Key of the role code mapping
pub const ROLES_KEY: &str = "roles";

/// Key of the boundary id to boundary name mapping
pub const BOUNDARIES_KEY: &str = "boundaries";

/// A single lookup table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceTable {
    Mapping(IndexMap<String, String>),
    Set(IndexSet<String>),
}

impl ReferenceTable {
    pub fn len(&self) -> usize {
        match self {
            ReferenceTable::Mapping(map) => map.len(),
            ReferenceTable::Set(set) => set.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Key membership; for sets, element membership
    pub fn contains_key(&self, key: &str) -> bool {
        match self {
            ReferenceTable::Mapping(map) => map.contains_key(key),
            ReferenceTable::Set(set) => set.contains(key),
        }
    }

    /// Value stored under `key`. Sets carry no values.
    pub fn get(&self, key: &str) -> Option<&str> {
        match self {
            ReferenceTable::Mapping(map) => map.get(key).map(String::as_str),
            ReferenceTable::Set(_) => None,
        }
    }

    pub fn contains_value(&self, value: &str) -> bool {
        match self {
            ReferenceTable::Mapping(map) => map.values().any(|v| v == value),
            ReferenceTable::Set(set) => set.contains(value),
        }
    }
}

impl FromIterator<(String, String)> for ReferenceTable {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        ReferenceTable::Mapping(iter.into_iter().collect())
    }
}

/// All lookup tables available to custom validators
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceData {
    tables: HashMap<String, ReferenceTable>,
}

impl ReferenceData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, table: ReferenceTable) -> Self {
        self.insert(key, table);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, table: ReferenceTable) {
        self.tables.insert(key.into(), table);
    }

    pub fn get(&self, key: &str) -> Option<&ReferenceTable> {
        self.tables.get(key)
    }

    /// The table under `key`, treating absent and empty the same way
    pub fn non_empty(&self, key: &str) -> Option<&ReferenceTable> {
        self.get(key).filter(|table| !table.is_empty())
    }

    /// Load the role mapping and boundary table. A `None` path leaves that
    /// table out, which disables the checks that depend on it.
    pub fn load(roles: Option<&Path>, boundaries: Option<&Path>) -> ReferenceResult<Self> {
        let mut data = Self::new();
        if let Some(path) = roles {
            let table = load_roles(path)?;
            debug!(path = %path.display(), entries = table.len(), "Loaded role mapping");
            data.insert(ROLES_KEY, table);
        }
        if let Some(path) = boundaries {
            let table = load_boundaries(path)?;
            debug!(path = %path.display(), entries = table.len(), "Loaded boundary table");
            data.insert(BOUNDARIES_KEY, table);
        }
        Ok(data)
    }
}

fn open_error(path: &Path, source: io::Error) -> ReferenceDataError {
    match source.kind() {
        io::ErrorKind::NotFound => ReferenceDataError::NotFound {
            path: path.to_path_buf(),
        },
        _ => ReferenceDataError::Io {
            path: path.to_path_buf(),
            source,
        },
    }
}

/// Load a role mapping from JSON.
///
/// An object maps role codes to descriptions (non-string values are kept as
/// JSON text); an array is a plain set of role codes.
pub fn load_roles(path: &Path) -> ReferenceResult<ReferenceTable> {
    let content = std::fs::read_to_string(path).map_err(|e| open_error(path, e))?;
    let parse_error = |details: String| ReferenceDataError::Parse {
        path: path.to_path_buf(),
        details,
    };

    let document: Value =
        serde_json::from_str(&content).map_err(|e| parse_error(e.to_string()))?;

    match document {
        Value::Object(entries) => Ok(entries
            .into_iter()
            .map(|(code, value)| {
                let text = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (code, text)
            })
            .collect()),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                other => Err(parse_error(format!("role codes must be strings, got {other}"))),
            })
            .collect::<ReferenceResult<IndexSet<String>>>()
            .map(ReferenceTable::Set),
        _ => Err(parse_error(
            "expected a JSON object or array of role codes".to_string(),
        )),
    }
}

/// Load the boundary table from a CSV with `id` and `name` columns.
///
/// Both columns are trimmed; rows with an empty id are skipped.
pub fn load_boundaries(path: &Path) -> ReferenceResult<ReferenceTable> {
    let file = std::fs::File::open(path).map_err(|e| open_error(path, e))?;
    let csv_error = |e: csv::Error| ReferenceDataError::Parse {
        path: path.to_path_buf(),
        details: e.to_string(),
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);

    let headers = reader.headers().map_err(csv_error)?.clone();
    let position = |column: &str| {
        headers
            .iter()
            .position(|header| header.trim() == column)
            .ok_or_else(|| ReferenceDataError::MissingColumn {
                path: path.to_path_buf(),
                column: column.to_string(),
            })
    };
    let id_index = position("id")?;
    let name_index = position("name")?;

    let mut mapping = IndexMap::new();
    for row in reader.records() {
        let row = row.map_err(csv_error)?;
        let id = row.get(id_index).unwrap_or_default().trim();
        if id.is_empty() {
            continue;
        }
        let name = row.get(name_index).unwrap_or_default().trim();
        mapping.insert(id.to_string(), name.to_string());
    }

    Ok(ReferenceTable::Mapping(mapping))
}
