//! Domain checks for user ingestion: role codes, joining dates and
//! boundary/administrative-area consistency.

use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;

use crate::error::FieldViolation;
use crate::field_validator::present_value;
use crate::hooks::{CustomValidator, HookOutcome, HookRegistry};
use crate::reference::{BOUNDARIES_KEY, ROLES_KEY, ReferenceData};
use crate::table::Record;

pub const ROLES_FIELD: &str = "roles";
pub const DATE_OF_JOINING_FIELD: &str = "date_of_joining";
pub const BOUNDARY_CODE_FIELD: &str = "boundary_code";
pub const ADMINISTRATIVE_AREA_FIELD: &str = "administrative_area";

/// Comma-separated role codes, each of which must be a known role
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleValidator;

impl CustomValidator for RoleValidator {
    fn validate(&self, value: &str, _record: &Record, reference: &ReferenceData) -> HookOutcome {
        let Some(roles) = reference.non_empty(ROLES_KEY) else {
            return HookOutcome::Valid;
        };

        if present_value(Some(value)).is_none() {
            return FieldViolation::EmptyRoles.into();
        }

        let invalid: Vec<&str> = value
            .split(',')
            .map(str::trim)
            .filter(|role| !roles.contains_key(role))
            .collect();

        if invalid.is_empty() {
            HookOutcome::Valid
        } else {
            FieldViolation::InvalidRoles {
                roles: invalid.join(", "),
            }
            .into()
        }
    }
}

fn date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^(?:(0[1-9]|[12][0-9]|3[01])/(0[1-9]|1[0-2])/[0-9]{4}|(0[1-9]|[12][0-9]|3[01])-(0[1-9]|1[0-2])-[0-9]{4})$",
        )
        .expect("Failed to compile date pattern regex")
    })
}

const DATE_FORMATS: [&str; 2] = ["%d/%m/%Y", "%d-%m-%Y"];

/// Parse a `DD/MM/YYYY` or `DD-MM-YYYY` string into a calendar date.
///
/// Year zero is rejected.
pub fn parse_joining_date(value: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .filter(|date| date.year() >= 1)
}

/// Required joining date with a strict day/month/year shape
#[derive(Debug, Clone, Copy, Default)]
pub struct DateOfJoiningValidator;

impl CustomValidator for DateOfJoiningValidator {
    fn validate(&self, value: &str, _record: &Record, _reference: &ReferenceData) -> HookOutcome {
        let field = DATE_OF_JOINING_FIELD.to_string();
        let Some(date) = present_value(Some(value)) else {
            return FieldViolation::Required { field }.into();
        };

        if !date_pattern().is_match(date) {
            return FieldViolation::InvalidDateFormat { field }.into();
        }

        match parse_joining_date(date) {
            Some(_) => HookOutcome::Valid,
            None => FieldViolation::InvalidDate { field }.into(),
        }
    }
}

/// Boundary code must be known, the record's administrative area must be a
/// known boundary name, and the two must belong together
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundaryValidator;

impl CustomValidator for BoundaryValidator {
    fn validate(&self, value: &str, record: &Record, reference: &ReferenceData) -> HookOutcome {
        let Some(boundaries) = reference.non_empty(BOUNDARIES_KEY) else {
            return HookOutcome::Valid;
        };

        let code = value.trim();
        let area = record
            .get(ADMINISTRATIVE_AREA_FIELD)
            .unwrap_or_default()
            .trim();

        let mut violations = Vec::new();
        if !boundaries.contains_key(code) {
            violations.push(FieldViolation::InvalidBoundaryCode {
                code: code.to_string(),
            });
        }
        if !boundaries.contains_value(area) {
            violations.push(FieldViolation::InvalidAdministrativeArea {
                area: area.to_string(),
            });
        }

        if violations.is_empty()
            && let Some(expected) = boundaries.get(code)
            && !expected.is_empty()
            && expected != area
        {
            violations.push(FieldViolation::BoundaryMismatch {
                area: area.to_string(),
                expected: expected.to_string(),
                code: code.to_string(),
            });
        }

        violations.into()
    }
}

/// Registry with the user-ingestion checks for `roles`, `date_of_joining`
/// and `boundary_code`
pub fn default_registry() -> HookRegistry {
    HookRegistry::new()
        .with(ROLES_FIELD, RoleValidator)
        .with(DATE_OF_JOINING_FIELD, DateOfJoiningValidator)
        .with(BOUNDARY_CODE_FIELD, BoundaryValidator)
}
