use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use crate::db::{DatabaseConnection, ErrorPolicy};
use crate::migration::{preview_plan, MigrationPlan, MigrationRunner, RunOptions, RunReport};
use crate::utils::{credential_store, AppConfig, ConnectionOverrides};

#[derive(Parser, Debug)]
#[command(name = "space_migrate")]
#[command(about = "Apply Oracle SQL/PLSQL setup scripts in order and verify the result", long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// JSON plan manifest to run instead of the built-in healthcare plan
    #[arg(long)]
    pub plan: Option<PathBuf>,

    /// Directory holding the built-in plan's scripts
    #[arg(long)]
    pub base_dir: Option<PathBuf>,

    /// Name used for the keyring entry of this connection
    #[arg(long)]
    pub connection_name: Option<String>,

    #[arg(long, env = "DB_HOST")]
    pub host: Option<String>,

    #[arg(long, env = "DB_PORT")]
    pub port: Option<u16>,

    #[arg(long, env = "DB_SERVICE")]
    pub service: Option<String>,

    #[arg(long, env = "DB_USERNAME")]
    pub username: Option<String>,

    #[arg(long, env = "DB_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Answer "yes" to the confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Print the statements each step would run without connecting
    #[arg(long)]
    pub dry_run: bool,

    /// Pause between steps in milliseconds
    #[arg(long)]
    pub pause_ms: Option<u64>,

    /// Save the connection settings and store the password in the OS keyring
    #[arg(long)]
    pub remember: bool,
}

pub struct App {
    config: AppConfig,
    args: Args,
}

impl App {
    pub fn new(args: Args) -> Result<Self> {
        let mut config = AppConfig::load(args.config.as_deref())
            .context("Failed to load configuration")?;

        config
            .apply_overrides(ConnectionOverrides {
                name: args.connection_name.clone(),
                host: args.host.clone(),
                port: args.port,
                service_name: args.service.clone(),
                username: args.username.clone(),
                password: args.password.clone(),
            })
            .context("Invalid connection settings")?;

        if let Some(plan) = &args.plan {
            config.plan = Some(plan.clone());
        }
        if let Some(base_dir) = &args.base_dir {
            config.base_dir = base_dir.clone();
        }
        if let Some(pause_ms) = args.pause_ms {
            config.step_pause_ms = pause_ms;
        }

        Ok(Self { config, args })
    }

    fn load_plan(&self) -> Result<MigrationPlan> {
        match &self.config.plan {
            Some(path) => MigrationPlan::load(path)
                .with_context(|| format!("Failed to load plan {}", path.display())),
            None => Ok(MigrationPlan::healthcare(&self.config.base_dir)),
        }
    }

    fn resolve_password(&mut self) -> Result<()> {
        if !self.config.connection.password.is_empty() {
            return Ok(());
        }
        let name = self.config.connection.name.clone();
        match credential_store::get_password(&name).map_err(anyhow::Error::msg)? {
            Some(password) => {
                tracing::debug!("Using keyring password for connection '{name}'");
                self.config.connection.password = password;
                Ok(())
            }
            None => bail!(
                "No password for connection '{}': set DB_PASSWORD, pass --password, or store one with --remember",
                name
            ),
        }
    }

    fn remember(&self) -> Result<()> {
        let connection = &self.config.connection;
        credential_store::store_password(&connection.name, &connection.password)
            .map_err(anyhow::Error::msg)?;
        self.config
            .save(self.args.config.as_deref())
            .context("Failed to save configuration")?;
        println!("Saved connection settings for '{}'", connection.name);
        Ok(())
    }

    pub fn run(mut self) -> Result<()> {
        let plan = self.load_plan()?;
        let stdout = io::stdout();

        if self.args.dry_run {
            preview_plan(&plan, &mut stdout.lock()).context("Dry run failed")?;
            return Ok(());
        }

        println!("======================================================");
        println!("Database Setup");
        println!("======================================================");
        println!();

        self.resolve_password()?;

        let db = DatabaseConnection::connect(self.config.connection.clone())
            .map_err(crate::migration::SetupError::ConnectionFailure)?;
        if self.args.remember {
            self.remember()?;
        }
        self.config.connection.clear_password();
        println!("Connected to {}", db.info().display_string());
        println!();

        let options = RunOptions {
            assume_yes: self.args.yes,
            step_pause: Duration::from_millis(self.config.step_pause_ms),
        };
        let mut runner = MigrationRunner::new(&db, &plan, ErrorPolicy::oracle(), options);
        let result = runner.run(&mut io::stdin().lock(), &mut stdout.lock());
        tracing::debug!("Runner finished in state {:?}", runner.state());
        db.close();

        let report = result.context("Setup failed")?;
        Self::print_summary(&report);
        Ok(())
    }

    fn print_summary(report: &RunReport) {
        if report.cancelled {
            return;
        }
        let totals = report.totals();
        let elapsed = chrono::Local::now() - report.started_at;

        println!("======================================================");
        println!("Database Setup Completed Successfully!");
        println!("======================================================");
        println!(
            "Started {} ({}s)",
            report.started_at.format("%Y-%m-%d %H:%M:%S"),
            elapsed.num_seconds()
        );
        println!(
            "{} steps: {} applied, {} already present, {} warnings, {} directives skipped",
            report.steps.len(),
            totals.applied,
            totals.skipped,
            totals.warned,
            totals.filtered
        );
        for step in report.steps.iter().filter(|s| s.dangling_block) {
            println!("Note: '{}' ended inside a PL/SQL block", step.name);
        }
        println!("======================================================");
    }
}
