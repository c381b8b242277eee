use std::io::{self, Write};

use crate::db::Database;

use super::{SetupError, VerificationPlan};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub name: String,
    pub present: bool,
    /// Catalog statistics; `None` when the table is missing or never analyzed.
    pub row_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataCount {
    pub table: String,
    pub count: Result<i64, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationReport {
    pub catalog: Vec<CatalogEntry>,
    pub data: Vec<DataCount>,
}

impl VerificationReport {
    pub fn present_count(&self) -> usize {
        self.catalog.iter().filter(|entry| entry.present).count()
    }

    pub fn render(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "Core Tables:")?;
        for entry in &self.catalog {
            if entry.present {
                let rows = entry.row_count.unwrap_or(0);
                writeln!(out, "  [ok] {} (rows: {})", entry.name, rows)?;
            } else {
                writeln!(out, "  [missing] {}", entry.name)?;
            }
        }

        writeln!(out)?;
        writeln!(out, "Data Summary:")?;
        for data in &self.data {
            match &data.count {
                Ok(count) => writeln!(out, "  [ok] {}: {} records", data.table, count)?,
                Err(err) => writeln!(out, "  [warn] {}: Error querying ({})", data.table, err)?,
            }
        }
        Ok(())
    }
}

/// Checks catalog metadata and row counts once all steps have run.
pub struct Verifier<'a> {
    db: &'a dyn Database,
    plan: &'a VerificationPlan,
}

impl<'a> Verifier<'a> {
    pub fn new(db: &'a dyn Database, plan: &'a VerificationPlan) -> Self {
        Self { db, plan }
    }

    fn in_list(names: &[String]) -> String {
        names
            .iter()
            .map(|name| format!("'{}'", name.to_uppercase()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Whether any of the plan's existing-schema marker tables are present.
    /// A failing lookup counts as "none".
    pub fn tables_exist(&self) -> bool {
        if self.plan.existing_tables.is_empty() {
            return false;
        }
        let sql = format!(
            "SELECT COUNT(*) FROM user_tables WHERE table_name IN ({})",
            Self::in_list(&self.plan.existing_tables)
        );
        match self.db.query_scalar(&sql) {
            Ok(count) => count > 0,
            Err(err) => {
                tracing::debug!("Existing table check failed: {err}");
                false
            }
        }
    }

    pub fn verify(&self) -> Result<VerificationReport, SetupError> {
        let catalog = self.check_catalog()?;
        let mut report = VerificationReport {
            catalog,
            data: Vec::new(),
        };

        if report.present_count() == 0 {
            return Err(SetupError::VerificationFailed {
                expected: self.plan.catalog_tables.clone(),
            });
        }

        report.data = self.count_rows();
        Ok(report)
    }

    fn check_catalog(&self) -> Result<Vec<CatalogEntry>, SetupError> {
        if self.plan.catalog_tables.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT table_name, num_rows FROM user_tables WHERE table_name IN ({}) ORDER BY table_name",
            Self::in_list(&self.plan.catalog_tables)
        );
        let rows = self
            .db
            .query_rows(&sql)
            .map_err(SetupError::VerificationQuery)?;

        let found: Vec<(String, Option<u64>)> = rows
            .into_iter()
            .filter_map(|row| {
                let mut values = row.into_iter();
                let name = values.next().flatten()?;
                let num_rows = values
                    .next()
                    .flatten()
                    .and_then(|value| value.trim().parse::<u64>().ok());
                Some((name.to_uppercase(), num_rows))
            })
            .collect();

        let mut entries: Vec<CatalogEntry> = self
            .plan
            .catalog_tables
            .iter()
            .map(|expected| {
                let name = expected.to_uppercase();
                match found.iter().find(|(table, _)| *table == name) {
                    Some((_, num_rows)) => CatalogEntry {
                        name,
                        present: true,
                        row_count: *num_rows,
                    },
                    None => CatalogEntry {
                        name,
                        present: false,
                        row_count: None,
                    },
                }
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn count_rows(&self) -> Vec<DataCount> {
        self.plan
            .data_tables
            .iter()
            .map(|table| {
                let sql = format!("SELECT COUNT(*) FROM {}", table);
                DataCount {
                    table: table.clone(),
                    count: self.db.query_scalar(&sql).map_err(|err| err.to_string()),
                }
            })
            .collect()
    }
}
