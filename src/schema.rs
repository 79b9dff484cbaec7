//! Declarative validation schema
//!
//! The schema document is a JSON object shaped like a JSON Schema subset:
//!
//! ```json
//! {
//!   "required": ["username", "mobile_number"],
//!   "x-unique": ["mobile_number"],
//!   "properties": {
//!     "username": { "type": "string", "minLength": 3 },
//!     "mobile_number": { "type": "string", "pattern": "\\d{10}" },
//!     "gender": { "type": ["string", "null"], "enum": ["MALE", "FEMALE", null] }
//!   }
//! }
//! ```
//!
//! Property order is the expected column order. Everything is checked and
//! compiled once at load time; a loaded [`Schema`] is immutable.

use std::collections::HashSet;
use std::io;
use std::path::Path;
use std::str::FromStr;

use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{SchemaLoadError, SchemaResult};

/// Primitive type names accepted in a rule's `type`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    String,
    Number,
    Integer,
    Boolean,
    Null,
}

impl FromStr for PrimitiveType {
    type Err = SchemaLoadError;

    fn from_str(name: &str) -> SchemaResult<Self> {
        match name {
            "string" => Ok(PrimitiveType::String),
            "number" => Ok(PrimitiveType::Number),
            "integer" => Ok(PrimitiveType::Integer),
            "boolean" => Ok(PrimitiveType::Boolean),
            "null" => Ok(PrimitiveType::Null),
            other => Err(SchemaLoadError::parse(format!("unknown type '{other}'"))),
        }
    }
}

/// A rule's declared type: a single primitive or a union such as `["string", "null"]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDecl {
    variants: Vec<PrimitiveType>,
}

impl TypeDecl {
    pub fn new(variants: Vec<PrimitiveType>) -> Self {
        Self { variants }
    }

    pub fn is_nullable(&self) -> bool {
        self.variants.contains(&PrimitiveType::Null)
    }

    /// The type a non-empty value is checked against, with the null variant stripped
    pub fn value_type(&self) -> Option<PrimitiveType> {
        self.variants
            .iter()
            .copied()
            .find(|variant| *variant != PrimitiveType::Null)
    }
}

/// A compiled, whole-string regex together with its source text
#[derive(Debug, Clone)]
pub struct FieldPattern {
    source: String,
    regex: Regex,
}

impl FieldPattern {
    pub fn new(source: &str) -> SchemaResult<Self> {
        let regex = Regex::new(&format!("^(?:{source})$")).map_err(|e| {
            SchemaLoadError::parse(format!("invalid pattern '{source}': {e}"))
        })?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn is_full_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl PartialEq for FieldPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// Constraints for one field
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldRule {
    pub field_type: Option<TypeDecl>,
    pub pattern: Option<FieldPattern>,
    /// Allowed literal values in original casing, null entries removed
    pub allowed_values: Option<Vec<String>>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    /// Human-readable message reported on pattern mismatch
    pub description: Option<String>,
}

impl FieldRule {
    pub fn value_type(&self) -> Option<PrimitiveType> {
        self.field_type.as_ref().and_then(TypeDecl::value_type)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawType {
    One(String),
    Union(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFieldRule {
    #[serde(rename = "type")]
    field_type: Option<RawType>,
    pattern: Option<String>,
    #[serde(rename = "enum")]
    allowed_values: Option<Vec<Value>>,
    min_length: Option<usize>,
    max_length: Option<usize>,
    minimum: Option<f64>,
    maximum: Option<f64>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSchema {
    #[serde(default)]
    required: Vec<String>,
    #[serde(rename = "x-unique", default)]
    unique: Vec<String>,
    properties: IndexMap<String, RawFieldRule>,
}

impl TryFrom<RawFieldRule> for FieldRule {
    type Error = SchemaLoadError;

    fn try_from(raw: RawFieldRule) -> SchemaResult<Self> {
        let field_type = match raw.field_type {
            None => None,
            Some(RawType::One(name)) => Some(TypeDecl::new(vec![name.parse()?])),
            Some(RawType::Union(names)) => Some(TypeDecl::new(
                names
                    .iter()
                    .map(|name| name.parse::<PrimitiveType>())
                    .collect::<SchemaResult<_>>()?,
            )),
        };
        if let Some(decl) = &field_type
            && decl.value_type().is_none()
        {
            return Err(SchemaLoadError::parse(
                "type must name a value type other than \"null\"",
            ));
        }

        let pattern = raw.pattern.as_deref().map(FieldPattern::new).transpose()?;

        // Non-string literals compare by their JSON text; nulls only mean "nullable".
        let allowed_values = raw.allowed_values.map(|values| {
            values
                .into_iter()
                .filter_map(|value| match value {
                    Value::Null => None,
                    Value::String(s) => Some(s),
                    other => Some(other.to_string()),
                })
                .collect()
        });

        Ok(Self {
            field_type,
            pattern,
            allowed_values,
            min_length: raw.min_length,
            max_length: raw.max_length,
            minimum: raw.minimum,
            maximum: raw.maximum,
            description: raw.description,
        })
    }
}

/// The loaded schema contract
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    properties: IndexMap<String, FieldRule>,
    required: HashSet<String>,
    unique: Vec<String>,
}

impl Schema {
    /// Load a schema document from disk
    pub fn from_path(path: &Path) -> SchemaResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => SchemaLoadError::NotFound {
                path: path.to_path_buf(),
            },
            _ => SchemaLoadError::Io {
                path: path.to_path_buf(),
                source,
            },
        })?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> SchemaResult<Self> {
        let value: Value = serde_json::from_str(content)
            .map_err(|e| SchemaLoadError::parse(format!("malformed JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Build a schema from an already parsed document
    pub fn from_value(document: Value) -> SchemaResult<Self> {
        let raw: RawSchema = serde_json::from_value(document)
            .map_err(|e| SchemaLoadError::parse(e.to_string()))?;

        let mut properties = IndexMap::with_capacity(raw.properties.len());
        for (name, raw_rule) in raw.properties {
            let rule = FieldRule::try_from(raw_rule).map_err(|e| match e {
                SchemaLoadError::Parse { details } => {
                    SchemaLoadError::parse(format!("property '{name}': {details}"))
                }
                other => other,
            })?;
            properties.insert(name, rule);
        }

        for (list, names) in [("required", &raw.required), ("x-unique", &raw.unique)] {
            if let Some(unknown) = names.iter().find(|name| !properties.contains_key(*name)) {
                return Err(SchemaLoadError::parse(format!(
                    "'{list}' names undeclared property '{unknown}'"
                )));
            }
        }

        let mut unique = Vec::with_capacity(raw.unique.len());
        for name in raw.unique {
            if !unique.contains(&name) {
                unique.push(name);
            }
        }

        Ok(Self {
            properties,
            required: raw.required.into_iter().collect(),
            unique,
        })
    }

    /// Expected column names, in declaration order
    pub fn expected_columns(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    pub fn rule(&self, field: &str) -> Option<&FieldRule> {
        self.properties.get(field)
    }

    pub fn declares(&self, field: &str) -> bool {
        self.properties.contains_key(field)
    }

    pub fn is_required(&self, field: &str) -> bool {
        self.required.contains(field)
    }

    pub fn is_unique(&self, field: &str) -> bool {
        self.unique.iter().any(|name| name == field)
    }

    /// Unique fields in the order the document lists them
    pub fn unique_fields(&self) -> &[String] {
        &self.unique
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn sample_document() -> Value {
        json!({
            "required": ["username", "mobile_number"],
            "x-unique": ["mobile_number"],
            "properties": {
                "username": { "type": "string", "minLength": 3, "maxLength": 20 },
                "mobile_number": {
                    "type": "string",
                    "pattern": "\\d{10}",
                    "description": "mobile_number must be 10 digits"
                },
                "gender": { "type": ["string", "null"], "enum": ["MALE", "FEMALE", null] },
                "age": { "type": "integer", "minimum": 18, "maximum": 60 }
            }
        })
    }

    #[test]
    fn test_expected_columns_follow_document_order() {
        let schema = Schema::from_value(sample_document()).unwrap();
        let columns: Vec<&str> = schema.expected_columns().collect();
        assert_eq!(columns, vec!["username", "mobile_number", "gender", "age"]);
    }

    #[test]
    fn test_required_and_unique_sets() {
        let schema = Schema::from_value(sample_document()).unwrap();
        assert!(schema.is_required("username"));
        assert!(!schema.is_required("gender"));
        assert!(schema.is_unique("mobile_number"));
        assert_eq!(schema.unique_fields(), &["mobile_number".to_string()]);
    }

    #[test]
    fn test_rule_descriptor_is_parsed() {
        let schema = Schema::from_value(sample_document()).unwrap();

        let gender = schema.rule("gender").unwrap();
        let gender_type = gender.field_type.as_ref().unwrap();
        assert!(gender_type.is_nullable());
        assert_eq!(gender_type.value_type(), Some(PrimitiveType::String));
        assert_eq!(
            gender.allowed_values,
            Some(vec!["MALE".to_string(), "FEMALE".to_string()])
        );

        let age = schema.rule("age").unwrap();
        assert_eq!(age.value_type(), Some(PrimitiveType::Integer));
        assert_eq!(age.minimum, Some(18.0));

        let mobile = schema.rule("mobile_number").unwrap();
        let pattern = mobile.pattern.as_ref().unwrap();
        assert!(pattern.is_full_match("9999999999"));
        assert!(!pattern.is_full_match("99999999990"));
        assert_eq!(pattern.as_str(), "\\d{10}");
    }

    #[test]
    fn test_non_string_enum_entries_are_compared_as_text() {
        let schema = Schema::from_value(json!({
            "properties": { "level": { "enum": [1, 2, true, null] } }
        }))
        .unwrap();
        assert_eq!(
            schema.rule("level").unwrap().allowed_values,
            Some(vec!["1".to_string(), "2".to_string(), "true".to_string()])
        );
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let result = Schema::from_path(Path::new("/nonexistent/validation_schema.json"));
        assert!(matches!(result, Err(SchemaLoadError::NotFound { .. })));
    }

    #[test]
    fn test_malformed_document_is_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("schema.json");
        fs::write(&path, "{ not json").unwrap();

        let result = Schema::from_path(&path);
        assert!(matches!(result, Err(SchemaLoadError::Parse { .. })));
    }

    #[test]
    fn test_unknown_type_is_parse_error() {
        let result = Schema::from_value(json!({
            "properties": { "x": { "type": "date" } }
        }));
        match result {
            Err(SchemaLoadError::Parse { details }) => {
                assert!(details.contains("property 'x'"));
                assert!(details.contains("unknown type 'date'"));
            }
            other => panic!("Expected Parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_null_only_type_is_parse_error() {
        for declared in [json!("null"), json!(["null"]), json!([])] {
            let result = Schema::from_value(json!({
                "properties": { "middle_name": { "type": declared.clone() } }
            }));
            match result {
                Err(SchemaLoadError::Parse { details }) => {
                    assert!(details.contains("property 'middle_name'"));
                }
                other => panic!("Expected Parse error for {declared}, got {other:?}"),
            }
        }

        let nullable = Schema::from_value(json!({
            "properties": { "middle_name": { "type": ["null", "string"] } }
        }))
        .unwrap();
        assert_eq!(
            nullable.rule("middle_name").and_then(FieldRule::value_type),
            Some(PrimitiveType::String)
        );
    }

    #[test]
    fn test_invalid_pattern_is_parse_error() {
        let result = Schema::from_value(json!({
            "properties": { "x": { "type": "string", "pattern": "([a-z" } }
        }));
        assert!(matches!(result, Err(SchemaLoadError::Parse { .. })));
    }

    #[test]
    fn test_unique_field_must_be_declared() {
        let result = Schema::from_value(json!({
            "x-unique": ["email"],
            "properties": { "username": { "type": "string" } }
        }));
        assert!(matches!(result, Err(SchemaLoadError::Parse { .. })));
    }

    #[test]
    fn test_missing_properties_is_parse_error() {
        let result = Schema::from_value(json!({ "required": [] }));
        assert!(matches!(result, Err(SchemaLoadError::Parse { .. })));
    }
}
