use once_cell::sync::Lazy;

use crate::db::connection::Database;

use super::{ExecutionOutcome, IgnorableReason, ScriptSplitter, ScriptSummary, StatementReport};

const PREVIEW_CHARS: usize = 100;

/// A fragment of error text that marks a failure as already applied.
#[derive(Debug, Clone)]
pub struct ErrorSignature {
    pub pattern: String,
    pub reason: IgnorableReason,
}

impl ErrorSignature {
    pub fn new(pattern: &str, reason: IgnorableReason) -> Self {
        Self {
            pattern: pattern.to_string(),
            reason,
        }
    }
}

/// Maps database error text to ignorable reasons.
///
/// Signatures are checked in order; the first whose pattern occurs in the
/// error text wins.
#[derive(Debug, Clone)]
pub struct ErrorPolicy {
    signatures: Vec<ErrorSignature>,
}

static ORACLE_POLICY: Lazy<ErrorPolicy> = Lazy::new(|| {
    ErrorPolicy::new(vec![
        ErrorSignature::new("ORA-00955", IgnorableReason::AlreadyExists),
        ErrorSignature::new("ORA-00942", IgnorableReason::MissingForDrop),
        ErrorSignature::new("ORA-04043", IgnorableReason::ObjectMissing),
    ])
});

impl ErrorPolicy {
    pub fn new(signatures: Vec<ErrorSignature>) -> Self {
        Self { signatures }
    }

    /// Error codes Oracle raises when a re-run meets objects from a prior run.
    pub fn oracle() -> &'static ErrorPolicy {
        &ORACLE_POLICY
    }

    pub fn classify(&self, error_text: &str) -> Option<IgnorableReason> {
        self.signatures
            .iter()
            .find(|signature| error_text.contains(signature.pattern.as_str()))
            .map(|signature| signature.reason)
    }
}

/// Runs statements one at a time and never stops on a statement failure.
pub struct TolerantExecutor<'a> {
    db: &'a dyn Database,
    policy: &'a ErrorPolicy,
}

impl<'a> TolerantExecutor<'a> {
    pub fn new(db: &'a dyn Database, policy: &'a ErrorPolicy) -> Self {
        Self { db, policy }
    }

    pub fn execute(&self, statement: &str) -> ExecutionOutcome {
        let sql = ScriptSplitter::execution_text(statement);
        match self.db.execute(&sql) {
            Ok(()) => ExecutionOutcome::Applied,
            Err(err) => {
                let error = err.to_string();
                match self.policy.classify(&error) {
                    Some(reason) => {
                        tracing::debug!("Ignoring {reason}: {error}");
                        ExecutionOutcome::SkippedIgnorable(reason)
                    }
                    None => {
                        tracing::warn!("Statement failed: {error}");
                        ExecutionOutcome::Warned {
                            preview: Self::preview(statement.trim()),
                            error,
                        }
                    }
                }
            }
        }
    }

    /// Execute every forwarded statement in order.
    ///
    /// `on_statement` sees each report as it is produced so callers can print
    /// progress while the batch is still running.
    pub fn execute_script<F>(&self, statements: &[String], mut on_statement: F) -> ScriptSummary
    where
        F: FnMut(&StatementReport),
    {
        let mut summary = ScriptSummary::default();

        for (index, statement) in statements.iter().enumerate() {
            if !ScriptSplitter::should_execute(statement) {
                summary.filtered += 1;
                continue;
            }

            let report = StatementReport {
                number: index + 1,
                outcome: self.execute(statement),
            };
            summary.record(&report.outcome);
            on_statement(&report);
        }

        summary
    }

    fn clamp_to_char_boundary(text: &str, index: usize) -> usize {
        let idx = index.min(text.len());
        if text.is_char_boundary(idx) {
            return idx;
        }
        text.char_indices()
            .map(|(pos, _)| pos)
            .take_while(|pos| *pos < idx)
            .last()
            .unwrap_or(0)
    }

    /// First hundred bytes of a statement, cut on a char boundary.
    pub fn preview(statement: &str) -> String {
        if statement.len() <= PREVIEW_CHARS {
            return statement.to_string();
        }
        let end = Self::clamp_to_char_boundary(statement, PREVIEW_CHARS);
        format!("{}...", &statement[..end])
    }
}
