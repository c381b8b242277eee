use std::fmt;

/// Why a failed statement was treated as already applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnorableReason {
    /// The name is already used by an existing object.
    AlreadyExists,
    /// A DROP targeted a table or view that is not there.
    MissingForDrop,
    /// The referenced object does not exist.
    ObjectMissing,
}

impl IgnorableReason {
    pub fn message(&self) -> &'static str {
        match self {
            IgnorableReason::AlreadyExists => "Object already exists",
            IgnorableReason::MissingForDrop => "Object doesn't exist for DROP",
            IgnorableReason::ObjectMissing => "Object doesn't exist",
        }
    }
}

impl fmt::Display for IgnorableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// How the classifier treats a segmented statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Executable,
    Empty,
    Comment,
    /// SQL*Plus directive such as PROMPT or SET; meaningless to the server.
    ClientDirective,
}

impl StatementKind {
    pub fn is_executable(&self) -> bool {
        matches!(self, StatementKind::Executable)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Applied,
    SkippedIgnorable(IgnorableReason),
    Warned { preview: String, error: String },
}

/// Result of executing one segmented statement.
#[derive(Debug, Clone)]
pub struct StatementReport {
    /// 1-based position within the script.
    pub number: usize,
    pub outcome: ExecutionOutcome,
}

/// Output of the segmenter for one script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segmentation {
    pub statements: Vec<String>,
    /// The script ended inside a procedural block and the tail was emitted as-is.
    pub dangling_block: bool,
}

/// Per-script tallies of what the executor did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptSummary {
    pub applied: usize,
    pub skipped: usize,
    pub warned: usize,
    /// Statements the classifier held back (comments, client directives).
    pub filtered: usize,
}

impl ScriptSummary {
    pub fn record(&mut self, outcome: &ExecutionOutcome) {
        match outcome {
            ExecutionOutcome::Applied => self.applied += 1,
            ExecutionOutcome::SkippedIgnorable(_) => self.skipped += 1,
            ExecutionOutcome::Warned { .. } => self.warned += 1,
        }
    }

    pub fn executed(&self) -> usize {
        self.applied + self.skipped + self.warned
    }
}
