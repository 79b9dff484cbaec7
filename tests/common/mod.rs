#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use user_ingest::{ReferenceData, Schema, Table, ValidationEngine, default_registry};

pub const SCHEMA_JSON: &str = r#"{
    "type": "object",
    "required": ["username", "mobile_number", "roles", "date_of_joining", "boundary_code", "administrative_area"],
    "x-unique": ["username", "mobile_number"],
    "properties": {
        "username": { "type": "string", "minLength": 3, "maxLength": 50 },
        "mobile_number": {
            "type": "string",
            "pattern": "\\d{10}",
            "description": "mobile_number must be a 10 digit number"
        },
        "roles": { "type": "string" },
        "date_of_joining": { "type": "string" },
        "boundary_code": { "type": "string" },
        "administrative_area": { "type": "string" }
    }
}"#;

pub const ROLES_JSON: &str = r#"{"SUPERVISOR": "Supervisor", "DISTRIBUTOR": "Distributor"}"#;

pub const BOUNDARIES_CSV: &str = "id,name\n1,North\n2,South\n";

pub const COLUMNS: [&str; 6] = [
    "username",
    "mobile_number",
    "roles",
    "date_of_joining",
    "boundary_code",
    "administrative_area",
];

/// Schema, reference data and input files in a scratch directory
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("validation_schema.json"), SCHEMA_JSON).unwrap();
        fs::write(dir.path().join("rolesmapping.json"), ROLES_JSON).unwrap();
        fs::write(dir.path().join("boundary.csv"), BOUNDARIES_CSV).unwrap();
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn schema_path(&self) -> PathBuf {
        self.path().join("validation_schema.json")
    }

    pub fn roles_path(&self) -> PathBuf {
        self.path().join("rolesmapping.json")
    }

    pub fn boundaries_path(&self) -> PathBuf {
        self.path().join("boundary.csv")
    }

    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    pub fn engine(&self) -> ValidationEngine {
        ValidationEngine::from_paths(
            &self.schema_path(),
            Some(self.roles_path().as_path()),
            Some(self.boundaries_path().as_path()),
        )
        .unwrap()
    }
}

pub fn schema() -> Schema {
    Schema::from_json_str(SCHEMA_JSON).unwrap()
}

/// Engine over the test schema with the given reference data
pub fn engine_with(reference: ReferenceData) -> ValidationEngine {
    ValidationEngine::new(schema(), reference, default_registry())
}

/// A row that passes every check
pub fn valid_row(username: &str, mobile: &str) -> Vec<String> {
    [username, mobile, "SUPERVISOR", "01/02/2024", "1", "North"]
        .map(str::to_string)
        .to_vec()
}

pub fn table(rows: Vec<Vec<String>>) -> Table {
    Table::from_rows(COLUMNS, rows)
}

/// `valid_row` with one column replaced
pub fn row_with(column: &str, value: &str) -> Vec<String> {
    let mut row = valid_row("alice", "9876543210");
    let index = COLUMNS.iter().position(|c| *c == column).unwrap();
    row[index] = value.to_string();
    row
}
