//! Pluggable per-field checks beyond what the schema can express
//!
//! A [`CustomValidator`] sees the field's raw value, the whole record (for
//! cross-field checks) and the reference data. It may report nothing, one
//! message or several; [`HookOutcome`] normalises all of those into a list.
//! Plain closures implement the trait, so ad-hoc checks and test doubles can
//! be registered without defining a type.

use std::collections::HashMap;
use std::fmt;

use crate::error::FieldViolation;
use crate::reference::ReferenceData;
use crate::table::Record;

/// What a custom validator reports for one value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HookOutcome {
    #[default]
    Valid,
    Error(String),
    Errors(Vec<String>),
}

impl HookOutcome {
    /// Flatten into an ordered list of messages
    pub fn into_errors(self) -> Vec<String> {
        match self {
            HookOutcome::Valid => Vec::new(),
            HookOutcome::Error(message) => vec![message],
            HookOutcome::Errors(messages) => messages,
        }
    }

    pub fn is_valid(&self) -> bool {
        match self {
            HookOutcome::Valid => true,
            HookOutcome::Error(_) => false,
            HookOutcome::Errors(messages) => messages.is_empty(),
        }
    }
}

impl From<()> for HookOutcome {
    fn from(_: ()) -> Self {
        HookOutcome::Valid
    }
}

impl From<String> for HookOutcome {
    fn from(message: String) -> Self {
        HookOutcome::Error(message)
    }
}

impl From<&str> for HookOutcome {
    fn from(message: &str) -> Self {
        HookOutcome::Error(message.to_string())
    }
}

impl From<Vec<String>> for HookOutcome {
    fn from(messages: Vec<String>) -> Self {
        HookOutcome::Errors(messages)
    }
}

impl From<Option<String>> for HookOutcome {
    fn from(message: Option<String>) -> Self {
        message.map_or(HookOutcome::Valid, HookOutcome::Error)
    }
}

impl From<FieldViolation> for HookOutcome {
    fn from(violation: FieldViolation) -> Self {
        HookOutcome::Error(violation.to_string())
    }
}

impl From<Vec<FieldViolation>> for HookOutcome {
    fn from(violations: Vec<FieldViolation>) -> Self {
        HookOutcome::Errors(violations.iter().map(ToString::to_string).collect())
    }
}

/// A named check for one field. Null cells arrive as `""`.
pub trait CustomValidator: Send + Sync {
    fn validate(&self, value: &str, record: &Record, reference: &ReferenceData) -> HookOutcome;
}

impl<F, O> CustomValidator for F
where
    F: Fn(&str, &Record, &ReferenceData) -> O + Send + Sync,
    O: Into<HookOutcome>,
{
    fn validate(&self, value: &str, record: &Record, reference: &ReferenceData) -> HookOutcome {
        self(value, record, reference).into()
    }
}

/// Custom validators keyed by field name, at most one per field
#[derive(Default)]
pub struct HookRegistry {
    hooks: HashMap<String, Box<dyn CustomValidator>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `validator` for `field`, returning the one it replaces
    pub fn register<V>(
        &mut self,
        field: impl Into<String>,
        validator: V,
    ) -> Option<Box<dyn CustomValidator>>
    where
        V: CustomValidator + 'static,
    {
        self.hooks.insert(field.into(), Box::new(validator))
    }

    pub fn with<V>(mut self, field: impl Into<String>, validator: V) -> Self
    where
        V: CustomValidator + 'static,
    {
        self.register(field, validator);
        self
    }

    pub fn get(&self, field: &str) -> Option<&dyn CustomValidator> {
        self.hooks.get(field).map(Box::as_ref)
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fields: Vec<&str> = self.hooks.keys().map(String::as_str).collect();
        fields.sort_unstable();
        f.debug_struct("HookRegistry").field("fields", &fields).finish()
    }
}
