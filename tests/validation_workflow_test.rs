mod common;

use common::*;
use user_ingest::{ReferenceData, Table, ValidatedTable, Verdict};

fn errors_of(table: &Table) -> Vec<Vec<String>> {
    let (validated, _) = common::engine_with(reference()).validate(table);
    validated
        .results()
        .iter()
        .map(|result| result.errors().to_vec())
        .collect()
}

fn reference() -> ReferenceData {
    let workspace = Workspace::new();
    ReferenceData::load(
        Some(workspace.roles_path().as_path()),
        Some(workspace.boundaries_path().as_path()),
    )
    .unwrap()
}

#[test]
fn test_duplicate_mobile_numbers_flag_every_occurrence() {
    let table = table(vec![
        valid_row("alice", "9999999999"),
        valid_row("bob", "9999999999"),
        valid_row("carol", "9876543210"),
    ]);

    let errors = errors_of(&table);
    assert_eq!(errors[0], vec!["Duplicate mobile_number: 9999999999"]);
    assert_eq!(errors[1], vec!["Duplicate mobile_number: 9999999999"]);
    assert!(errors[2].is_empty());
}

#[test]
fn test_impossible_calendar_date() {
    let table = table(vec![row_with("date_of_joining", "31-02-2024")]);
    assert_eq!(errors_of(&table)[0], vec!["Invalid date_of_joining"]);
}

#[test]
fn test_empty_required_date_skips_shape_checks() {
    let table = table(vec![row_with("date_of_joining", "")]);
    // Schema required check, then the hook's own required check
    assert_eq!(
        errors_of(&table)[0],
        vec!["date_of_joining is required", "date_of_joining is required"]
    );
}

#[test]
fn test_badly_shaped_date() {
    let table = table(vec![row_with("date_of_joining", "2024-02-01")]);
    assert_eq!(
        errors_of(&table)[0],
        vec!["date_of_joining must be in DD/MM/YYYY or DD-MM-YYYY format"]
    );
}

#[test]
fn test_unknown_role_is_reported() {
    let table = table(vec![row_with("roles", "SUPERVISOR, FOO")]);
    assert_eq!(errors_of(&table)[0], vec!["Invalid roles: FOO"]);
}

#[test]
fn test_unknown_code_and_area_without_mismatch() {
    let mut row = row_with("boundary_code", "99");
    row[5] = "X".to_string();
    let table = table(vec![row]);

    assert_eq!(
        errors_of(&table)[0],
        vec!["Invalid boundary_code: 99", "Invalid administrative_area: X"]
    );
}

#[test]
fn test_area_of_another_boundary_is_a_mismatch() {
    let table = table(vec![row_with("administrative_area", "South")]);
    assert_eq!(
        errors_of(&table)[0],
        vec!["administrative_area 'South' does not match boundary 'North' for code '1'"]
    );
}

#[test]
fn test_errors_follow_column_order() {
    let mut row = row_with("username", "al");
    row[1] = "12345".to_string();
    let table = table(vec![row]);

    assert_eq!(
        errors_of(&table)[0],
        vec![
            "username must be at least 3 characters",
            "mobile_number must be a 10 digit number",
        ]
    );
}

#[test]
fn test_missing_reference_data_disables_lookup_checks() {
    let mut row = row_with("roles", "ANYTHING");
    row[4] = "99".to_string();
    let table = table(vec![row]);

    let (validated, _) = common::engine_with(ReferenceData::new()).validate(&table);
    assert!(validated.results()[0].is_correct());
}

#[test]
fn test_verdict_matches_error_list() {
    let table = table(vec![
        valid_row("dave", "1111111111"),
        row_with("roles", ""),
        valid_row("bo", "1234567890"),
    ]);

    let (validated, summary) = common::engine_with(reference()).validate(&table);
    for result in validated.results() {
        assert_eq!(result.is_correct(), result.errors().is_empty());
        assert_eq!(
            result.status(),
            if result.errors().is_empty() {
                Verdict::Correct
            } else {
                Verdict::Error
            }
        );
    }
    assert_eq!(summary.total_rows, 3);
    assert_eq!(summary.correct_rows + summary.error_rows, summary.total_rows);
    assert_eq!(summary.error_rows, 2);
}

#[test]
fn test_validation_is_idempotent() {
    let table = table(vec![
        valid_row("alice", "9999999999"),
        valid_row("bob", "9999999999"),
        row_with("date_of_joining", "31/13/2024"),
    ]);
    let engine = common::engine_with(reference());

    let (first, first_summary) = engine.validate(&table);
    let (second, second_summary) = engine.validate(&table);
    assert_eq!(first, second);
    assert_eq!(first_summary, second_summary);
}

#[test]
fn test_header_mismatch_is_reported_but_rows_still_validate() {
    let table = Table::from_rows(
        ["username", "mobile_number", "roles", "date_of_joining", "boundary_code", "nickname"],
        vec![vec!["alice", "9876543210", "SUPERVISOR", "01/02/2024", "1", "Al"]],
    );

    let (validated, summary) = common::engine_with(reference()).validate(&table);
    assert_eq!(summary.header_status, Verdict::Error);
    assert_eq!(
        summary.header_message,
        "Missing columns: administrative_area. Extra columns: nickname."
    );
    assert_eq!(
        validated.results()[0].errors(),
        ["Invalid administrative_area: "]
    );
    assert!(!summary.all_correct());
}

#[test]
fn test_engine_from_files_round_trips_through_csv() {
    let workspace = Workspace::new();
    let input = workspace.write(
        "users.csv",
        "username,mobile_number,roles,date_of_joining,boundary_code,administrative_area\n\
         alice,9876543210,SUPERVISOR,01/02/2024,1,North\n\
         bob,123,\"SUPERVISOR,DISTRIBUTOR\",15-08-2023,2,South\n",
    );

    let engine = workspace.engine();
    let table = Table::from_csv_path(&input).unwrap();
    let (validated, summary) = engine.validate(&table);
    assert_eq!(summary.header_status, Verdict::Correct);
    assert_eq!(summary.correct_rows, 1);

    let output = workspace.path().join("users_validated.csv");
    validated.write_csv_path(&output).unwrap();

    let restored = ValidatedTable::from_csv_path(&output).unwrap();
    assert_eq!(restored.columns(), validated.columns());
    assert_eq!(restored.len(), 2);
    assert!(restored.results()[0].is_correct());
    assert_eq!(
        restored.results()[1].errors(),
        ["mobile_number must be a 10 digit number"]
    );
    assert_eq!(restored.results()[1].record().get("roles"), Some("SUPERVISOR,DISTRIBUTOR"));
}
