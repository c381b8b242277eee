//! In-memory stand-in for an Oracle session.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::db::{Database, DbError};

type FailRule = (Box<dyn Fn(&str) -> bool>, String);

#[derive(Default)]
pub struct MockDatabase {
    pub executed: RefCell<Vec<String>>,
    pub queries: RefCell<Vec<String>>,
    fail_rules: Vec<FailRule>,
    existing_tables: i64,
    existing_query_fails: bool,
    catalog_rows: Vec<Vec<Option<String>>>,
    catalog_query_error: Option<String>,
    counts: HashMap<String, i64>,
}

impl MockDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every executed statement for which `predicate` holds.
    pub fn fail_when<P>(mut self, predicate: P, error: &str) -> Self
    where
        P: Fn(&str) -> bool + 'static,
    {
        self.fail_rules.push((Box::new(predicate), error.to_string()));
        self
    }

    pub fn fail_all(self, error: &str) -> Self {
        self.fail_when(|_| true, error)
    }

    pub fn with_existing_tables(mut self, count: i64) -> Self {
        self.existing_tables = count;
        self
    }

    pub fn with_failing_existence_check(mut self) -> Self {
        self.existing_query_fails = true;
        self
    }

    pub fn with_catalog_table(mut self, name: &str, num_rows: Option<i64>) -> Self {
        self.catalog_rows
            .push(vec![Some(name.to_string()), num_rows.map(|n| n.to_string())]);
        self
    }

    pub fn with_failing_catalog_query(mut self, error: &str) -> Self {
        self.catalog_query_error = Some(error.to_string());
        self
    }

    pub fn with_count(mut self, table: &str, count: i64) -> Self {
        self.counts.insert(table.to_lowercase(), count);
        self
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.borrow().clone()
    }
}

impl Database for MockDatabase {
    fn execute(&self, sql: &str) -> Result<(), DbError> {
        self.executed.borrow_mut().push(sql.to_string());
        for (predicate, error) in &self.fail_rules {
            if predicate(sql) {
                return Err(DbError::Message(error.clone()));
            }
        }
        Ok(())
    }

    fn query_scalar(&self, sql: &str) -> Result<i64, DbError> {
        self.queries.borrow_mut().push(sql.to_string());
        let upper = sql.to_uppercase();

        if upper.contains("FROM USER_TABLES") {
            if self.existing_query_fails {
                return Err(DbError::Message(
                    "ORA-03114: not connected to ORACLE".to_string(),
                ));
            }
            return Ok(self.existing_tables);
        }

        let table = upper
            .rsplit("FROM ")
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        self.counts.get(&table).copied().ok_or_else(|| {
            DbError::Message("ORA-00942: table or view does not exist".to_string())
        })
    }

    fn query_rows(&self, sql: &str) -> Result<Vec<Vec<Option<String>>>, DbError> {
        self.queries.borrow_mut().push(sql.to_string());
        if let Some(error) = &self.catalog_query_error {
            return Err(DbError::Message(error.clone()));
        }
        Ok(self.catalog_rows.clone())
    }
}
