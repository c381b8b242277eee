use chrono::{DateTime, Local};
use std::fs;
use std::io::{self, BufRead, ErrorKind, Write};
use std::thread;
use std::time::Duration;

use crate::db::{
    Database, ErrorPolicy, ExecutionOutcome, ScriptSplitter, ScriptSummary, StatementKind,
    StatementReport, TolerantExecutor,
};

use super::{MigrationPlan, MigrationStep, SetupError, VerificationReport, Verifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Confirming,
    Running(usize),
    Verifying,
    Done,
    Failed,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Treat the confirmation prompt as already answered "yes".
    pub assume_yes: bool,
    /// Pause between steps; zero disables it.
    pub step_pause: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            assume_yes: false,
            step_pause: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StepResult {
    pub name: String,
    pub summary: ScriptSummary,
    pub dangling_block: bool,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub started_at: DateTime<Local>,
    pub cancelled: bool,
    pub steps: Vec<StepResult>,
    pub verification: Option<VerificationReport>,
}

impl RunReport {
    fn new() -> Self {
        Self {
            started_at: Local::now(),
            cancelled: false,
            steps: Vec::new(),
            verification: None,
        }
    }

    pub fn totals(&self) -> ScriptSummary {
        self.steps
            .iter()
            .fold(ScriptSummary::default(), |mut acc, step| {
                acc.applied += step.summary.applied;
                acc.skipped += step.summary.skipped;
                acc.warned += step.summary.warned;
                acc.filtered += step.summary.filtered;
                acc
            })
    }
}

/// Applies a migration plan step by step against one connection.
pub struct MigrationRunner<'a> {
    db: &'a dyn Database,
    plan: &'a MigrationPlan,
    policy: &'a ErrorPolicy,
    options: RunOptions,
    state: RunState,
}

impl<'a> MigrationRunner<'a> {
    pub fn new(
        db: &'a dyn Database,
        plan: &'a MigrationPlan,
        policy: &'a ErrorPolicy,
        options: RunOptions,
    ) -> Self {
        Self {
            db,
            plan,
            policy,
            options,
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Drive the run to `Done` or `Failed`.
    ///
    /// Confirmation is read from `input`; progress is written to `out`.
    /// Cancelling at the prompt is not an error: the report comes back with
    /// `cancelled` set.
    pub fn run<R, W>(&mut self, input: &mut R, out: &mut W) -> Result<RunReport, SetupError>
    where
        R: BufRead,
        W: Write,
    {
        let mut report = RunReport::new();

        loop {
            let next = match self.state {
                RunState::Idle => Ok(RunState::Confirming),
                RunState::Confirming => self.confirm(input, out).map(|confirmed| {
                    if confirmed {
                        RunState::Running(0)
                    } else {
                        report.cancelled = true;
                        RunState::Done
                    }
                }),
                RunState::Running(index) if index < self.plan.steps.len() => {
                    self.run_step(index, out).map(|result| {
                        report.steps.push(result);
                        RunState::Running(index + 1)
                    })
                }
                RunState::Running(_) => Ok(RunState::Verifying),
                RunState::Verifying => self.verify(out).map(|verification| {
                    report.verification = Some(verification);
                    RunState::Done
                }),
                RunState::Done | RunState::Failed => break,
            };

            match next {
                Ok(state) => {
                    tracing::debug!("Run state {:?} -> {:?}", self.state, state);
                    self.state = state;
                }
                Err(err) => {
                    tracing::debug!("Run state {:?} -> Failed: {err}", self.state);
                    self.state = RunState::Failed;
                    return Err(err);
                }
            }
        }

        if report.cancelled {
            writeln!(out, "Setup cancelled.")?;
        }
        Ok(report)
    }

    fn confirm<R, W>(&self, input: &mut R, out: &mut W) -> Result<bool, SetupError>
    where
        R: BufRead,
        W: Write,
    {
        let verifier = Verifier::new(self.db, &self.plan.tables);
        if verifier.tables_exist() {
            writeln!(out, "Some tables already exist in the database.")?;
            writeln!(out, "This will drop existing tables and recreate everything.")?;
            writeln!(out)?;
            write!(out, "Do you want to proceed with a fresh setup? (y/N): ")?;
        } else {
            writeln!(out, "This will set up the complete database:")?;
            for (i, step) in self.plan.steps.iter().enumerate() {
                writeln!(out, "{}. {}", i + 1, step.description)?;
            }
            writeln!(out)?;
            write!(out, "Do you want to proceed? (y/N): ")?;
        }

        if self.options.assume_yes {
            writeln!(out, "y (--yes)")?;
            return Ok(true);
        }
        out.flush()?;

        let mut response = String::new();
        input.read_line(&mut response)?;
        Ok(is_affirmative(&response))
    }

    fn run_step<W: Write>(&self, index: usize, out: &mut W) -> Result<StepResult, SetupError> {
        let step = &self.plan.steps[index];
        writeln!(
            out,
            "[STEP {}/{}] {}",
            index + 1,
            self.plan.steps.len(),
            step.description
        )?;

        let script = read_script(step)?;
        let segmentation = ScriptSplitter::split_script(&script);
        if segmentation.dangling_block {
            writeln!(
                out,
                "Warning: {} ends inside a PL/SQL block; the unterminated tail was sent as-is",
                step.script_path.display()
            )?;
        }

        let executor = TolerantExecutor::new(self.db, self.policy);
        let mut console_error: Option<io::Error> = None;
        let summary = executor.execute_script(&segmentation.statements, |report| {
            if console_error.is_none() {
                if let Err(err) = write_statement_report(out, report) {
                    console_error = Some(err);
                }
            }
        });
        if let Some(err) = console_error {
            return Err(err.into());
        }
        tracing::info!(
            "{}: {} statements executed, {} filtered",
            step.name,
            summary.executed(),
            summary.filtered
        );

        writeln!(
            out,
            "{} completed (applied {}, skipped {}, warned {})",
            step.name, summary.applied, summary.skipped, summary.warned
        )?;
        writeln!(out)?;

        if !self.options.step_pause.is_zero() {
            thread::sleep(self.options.step_pause);
        }

        Ok(StepResult {
            name: step.name.clone(),
            summary,
            dangling_block: segmentation.dangling_block,
        })
    }

    fn verify<W: Write>(&self, out: &mut W) -> Result<VerificationReport, SetupError> {
        writeln!(out, "Verifying database setup...")?;
        let report = Verifier::new(self.db, &self.plan.tables).verify()?;
        report.render(out)?;
        writeln!(out)?;
        Ok(report)
    }
}

fn is_affirmative(response: &str) -> bool {
    matches!(response.trim().to_lowercase().as_str(), "y" | "yes")
}

fn read_script(step: &MigrationStep) -> Result<String, SetupError> {
    fs::read_to_string(&step.script_path).map_err(|err| {
        if err.kind() == ErrorKind::NotFound {
            SetupError::FileNotFound {
                step: step.name.clone(),
                path: step.script_path.clone(),
            }
        } else {
            SetupError::FileUnreadable {
                step: step.name.clone(),
                path: step.script_path.clone(),
                source: err,
            }
        }
    })
}

fn write_statement_report<W: Write>(out: &mut W, report: &StatementReport) -> io::Result<()> {
    match &report.outcome {
        ExecutionOutcome::Applied => Ok(()),
        ExecutionOutcome::SkippedIgnorable(reason) => writeln!(
            out,
            "  {} (statement {}), continuing...",
            reason, report.number
        ),
        ExecutionOutcome::Warned { preview, error } => {
            writeln!(out, "  Warning in statement {}: {}", report.number, error)?;
            writeln!(out, "    Statement: {}", preview)
        }
    }
}

/// Print what each step would execute without touching the database.
pub fn preview_plan<W: Write>(plan: &MigrationPlan, out: &mut W) -> Result<(), SetupError> {
    for (index, step) in plan.steps.iter().enumerate() {
        writeln!(
            out,
            "-- [STEP {}/{}] {} ({})",
            index + 1,
            plan.steps.len(),
            step.name,
            step.script_path.display()
        )?;

        let script = read_script(step)?;
        let segmentation = ScriptSplitter::split_script(&script);
        for (number, statement) in segmentation.statements.iter().enumerate() {
            match ScriptSplitter::classify(statement) {
                StatementKind::Executable => {
                    writeln!(out, "-- statement {}", number + 1)?;
                    writeln!(out, "{}", ScriptSplitter::execution_text(statement))?;
                }
                kind => {
                    writeln!(out, "-- statement {} skipped ({:?})", number + 1, kind)?;
                }
            }
        }
        if segmentation.dangling_block {
            writeln!(out, "-- warning: script ends inside a PL/SQL block")?;
        }
        writeln!(out)?;
    }
    Ok(())
}
