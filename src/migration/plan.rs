use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::utils::ConfigError;

/// One script file applied as an ordered unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationStep {
    pub name: String,
    pub script_path: PathBuf,
    pub description: String,
}

impl MigrationStep {
    pub fn new(name: &str, script_path: PathBuf, description: &str) -> Self {
        Self {
            name: name.to_string(),
            script_path,
            description: description.to_string(),
        }
    }
}

/// Tables the runner looks at before and after applying the steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationPlan {
    /// Any of these present means the run will overwrite an existing schema.
    pub existing_tables: Vec<String>,
    /// Looked up in the catalog; at least one must exist after the run.
    pub catalog_tables: Vec<String>,
    /// Counted with `SELECT COUNT(*)` for the data summary.
    pub data_tables: Vec<String>,
}

impl Default for VerificationPlan {
    fn default() -> Self {
        let to_vec = |names: &[&str]| names.iter().map(|n| n.to_string()).collect();
        Self {
            existing_tables: to_vec(&["USERS", "PATIENTS", "DOCTORS", "MEDICAL_RECORDS"]),
            catalog_tables: to_vec(&[
                "USERS",
                "PATIENTS",
                "DOCTORS",
                "MEDICAL_RECORDS",
                "APPOINTMENTS",
            ]),
            data_tables: to_vec(&[
                "departments",
                "specializations",
                "users",
                "patients",
                "doctors",
                "appointments",
                "medical_records",
            ]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationPlan {
    pub steps: Vec<MigrationStep>,
    #[serde(flatten)]
    pub tables: VerificationPlan,
}

impl MigrationPlan {
    /// The full healthcare schema setup, with scripts under `base_dir`.
    pub fn healthcare(base_dir: &Path) -> Self {
        let steps = vec![
            MigrationStep::new(
                "Core Schema",
                base_dir.join("core").join("core_schema.sql"),
                "Creating core tables, sequences, and indexes",
            ),
            MigrationStep::new(
                "Audit Schema",
                base_dir.join("core").join("audit_schema.sql"),
                "Creating audit tables for provenance tracking",
            ),
            MigrationStep::new(
                "Audit Triggers",
                base_dir.join("triggers").join("audit_triggers.sql"),
                "Installing audit triggers for automatic change tracking",
            ),
            MigrationStep::new(
                "Cascade Triggers",
                base_dir.join("triggers").join("cascade_triggers.sql"),
                "Installing cascade triggers for business logic",
            ),
            MigrationStep::new(
                "Stored Procedures",
                base_dir.join("procedures").join("healthcare_procedures.sql"),
                "Creating stored procedures for healthcare workflows",
            ),
            MigrationStep::new(
                "Mock Data",
                base_dir.join("mock_data.sql"),
                "Injecting sample data for testing",
            ),
        ];

        Self {
            steps,
            tables: VerificationPlan::default(),
        }
    }

    /// Load a JSON plan manifest. Relative script paths resolve against the
    /// manifest's own directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let mut plan: MigrationPlan = serde_json::from_str(&content)?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        for step in &mut plan.steps {
            if step.script_path.is_relative() {
                step.script_path = base.join(&step.script_path);
            }
        }

        plan.validate()?;
        Ok(plan)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.steps.is_empty() {
            return Err(ConfigError::Validation(
                "migration plan has no steps".to_string(),
            ));
        }
        if self.tables.catalog_tables.is_empty() {
            return Err(ConfigError::Validation(
                "migration plan has no catalog tables to verify".to_string(),
            ));
        }

        let tables = &self.tables;
        for name in tables
            .existing_tables
            .iter()
            .chain(&tables.catalog_tables)
            .chain(&tables.data_tables)
        {
            if !is_valid_identifier(name) {
                return Err(ConfigError::Validation(format!(
                    "'{}' is not a valid table name",
                    name
                )));
            }
        }

        Ok(())
    }
}

/// Plain (unquoted) Oracle identifier: a letter followed by letters, digits, `_`, `$` or `#`.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    name.len() <= 128
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '#')
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_healthcare_plan_order() {
        let plan = MigrationPlan::healthcare(Path::new("db"));
        let names: Vec<&str> = plan.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Core Schema",
                "Audit Schema",
                "Audit Triggers",
                "Cascade Triggers",
                "Stored Procedures",
                "Mock Data",
            ]
        );
        assert_eq!(
            plan.steps[2].script_path,
            Path::new("db").join("triggers").join("audit_triggers.sql")
        );
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_load_manifest_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("plan.json");
        fs::write(
            &manifest,
            r#"{
                "steps": [
                    {"name": "Schema", "script_path": "schema.sql", "description": "Create tables"}
                ],
                "catalog_tables": ["ORDERS"]
            }"#,
        )
        .unwrap();

        let plan = MigrationPlan::load(&manifest).unwrap();
        assert_eq!(plan.steps[0].script_path, dir.path().join("schema.sql"));
        assert_eq!(plan.tables.catalog_tables, vec!["ORDERS".to_string()]);
        // omitted lists keep their defaults
        assert_eq!(plan.tables.data_tables, VerificationPlan::default().data_tables);
    }

    #[test]
    fn test_load_manifest_rejects_bad_table_name() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("plan.json");
        fs::write(
            &manifest,
            r#"{"steps": [{"name": "A", "script_path": "a.sql", "description": "a"}],
                "data_tables": ["users; DROP TABLE users"]}"#,
        )
        .unwrap();

        let err = MigrationPlan::load(&manifest).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)), "got {:?}", err);
    }

    #[test]
    fn test_load_manifest_rejects_empty_steps() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("plan.json");
        fs::write(&manifest, r#"{"steps": []}"#).unwrap();
        assert!(matches!(
            MigrationPlan::load(&manifest),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_load_manifest_rejects_empty_catalog_tables() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("plan.json");
        fs::write(
            &manifest,
            r#"{"steps": [{"name": "A", "script_path": "a.sql", "description": "a"}],
                "catalog_tables": []}"#,
        )
        .unwrap();

        match MigrationPlan::load(&manifest) {
            Err(ConfigError::Validation(msg)) => assert!(msg.contains("catalog tables")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_identifier_validation() {
        assert!(is_valid_identifier("MEDICAL_RECORDS"));
        assert!(is_valid_identifier("audit$log#1"));
        assert!(!is_valid_identifier("1users"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("users x"));
    }
}
