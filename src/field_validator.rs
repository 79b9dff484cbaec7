//! Per-field rule evaluation
//!
//! [`FieldValidator::validate_field`] checks one raw cell against the rule the
//! schema declares for that field. Every constraint is a small `check_*`
//! function that is a no-op when the rule does not carry that constraint; all
//! of them run on a non-empty value and each failure adds its own violation.

use crate::error::FieldViolation;
use crate::schema::{FieldRule, PrimitiveType, Schema};

/// Trim a raw cell and return it only if it carries a value.
///
/// Null cells, blank strings and the literal `nan` (any casing) count as empty.
pub fn present_value(raw: Option<&str>) -> Option<&str> {
    let value = raw?.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("nan") {
        None
    } else {
        Some(value)
    }
}

/// Evaluates single fields against a loaded schema
#[derive(Debug, Clone, Copy)]
pub struct FieldValidator<'s> {
    schema: &'s Schema,
}

impl<'s> FieldValidator<'s> {
    pub fn new(schema: &'s Schema) -> Self {
        Self { schema }
    }

    /// Error messages for one field value, in check order
    pub fn validate_field(&self, field: &str, raw: Option<&str>) -> Vec<String> {
        self.violations(field, raw)
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    /// Structured form of [`FieldValidator::validate_field`]
    pub fn violations(&self, field: &str, raw: Option<&str>) -> Vec<FieldViolation> {
        let mut violations = Vec::new();

        let Some(value) = present_value(raw) else {
            if self.schema.is_required(field) {
                violations.push(FieldViolation::Required {
                    field: field.to_string(),
                });
            }
            return violations;
        };

        let Some(rule) = self.schema.rule(field) else {
            return violations;
        };

        check_pattern(field, rule, value, &mut violations);
        check_enum(field, rule, value, &mut violations);
        check_length(field, rule, value, &mut violations);
        check_type(field, rule, value, &mut violations);

        violations
    }
}

/// Whole-string regex match; reports the rule description when one is set
pub fn check_pattern(field: &str, rule: &FieldRule, value: &str, out: &mut Vec<FieldViolation>) {
    let Some(pattern) = &rule.pattern else {
        return;
    };
    if !pattern.is_full_match(value) {
        let message = rule
            .description
            .clone()
            .unwrap_or_else(|| format!("Invalid {field}"));
        out.push(FieldViolation::PatternMismatch {
            field: field.to_string(),
            message,
        });
    }
}

/// Case-insensitive membership in the allowed literal list
pub fn check_enum(field: &str, rule: &FieldRule, value: &str, out: &mut Vec<FieldViolation>) {
    let Some(allowed) = &rule.allowed_values else {
        return;
    };
    let lowered = value.to_lowercase();
    if !allowed.iter().any(|candidate| candidate.to_lowercase() == lowered) {
        out.push(FieldViolation::EnumMismatch {
            field: field.to_string(),
            allowed: allowed.join(", "),
        });
    }
}

/// Character-count bounds on the trimmed value
pub fn check_length(field: &str, rule: &FieldRule, value: &str, out: &mut Vec<FieldViolation>) {
    let length = value.chars().count();
    if let Some(min) = rule.min_length
        && length < min
    {
        out.push(FieldViolation::TooShort {
            field: field.to_string(),
            min,
        });
    }
    if let Some(max) = rule.max_length
        && length > max
    {
        out.push(FieldViolation::TooLong {
            field: field.to_string(),
            max,
        });
    }
}

/// Type conformance for number, integer and boolean fields, plus numeric bounds
pub fn check_type(field: &str, rule: &FieldRule, value: &str, out: &mut Vec<FieldViolation>) {
    match rule.value_type() {
        Some(PrimitiveType::Number) => {
            if let Some(number) = parse_number(field, value, out) {
                check_range(field, rule, number, out);
            }
        }
        Some(PrimitiveType::Integer) => {
            if let Some(number) = parse_number(field, value, out) {
                if number.fract() != 0.0 {
                    out.push(FieldViolation::NotAnInteger {
                        field: field.to_string(),
                    });
                }
                check_range(field, rule, number, out);
            }
        }
        Some(PrimitiveType::Boolean) => {
            if !value.eq_ignore_ascii_case("true") && !value.eq_ignore_ascii_case("false") {
                out.push(FieldViolation::NotABoolean {
                    field: field.to_string(),
                });
            }
        }
        Some(PrimitiveType::String) | Some(PrimitiveType::Null) | None => {}
    }
}

/// Inclusive `minimum` / `maximum` bounds on a parsed number
pub fn check_range(field: &str, rule: &FieldRule, number: f64, out: &mut Vec<FieldViolation>) {
    if let Some(minimum) = rule.minimum
        && number < minimum
    {
        out.push(FieldViolation::BelowMinimum {
            field: field.to_string(),
            minimum,
        });
    }
    if let Some(maximum) = rule.maximum
        && number > maximum
    {
        out.push(FieldViolation::AboveMaximum {
            field: field.to_string(),
            maximum,
        });
    }
}

fn parse_number(field: &str, value: &str, out: &mut Vec<FieldViolation>) -> Option<f64> {
    match value.parse::<f64>() {
        Ok(number) => Some(number),
        Err(_) => {
            out.push(FieldViolation::NotANumber {
                field: field.to_string(),
            });
            None
        }
    }
}
