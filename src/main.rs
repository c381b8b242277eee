mod app;
mod db;
mod migration;
mod utils;

#[cfg(test)]
mod test_support;

use app::{App, Args};
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter =
        EnvFilter::try_from_env("SPACE_MIGRATE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn main() {
    init_logging();
    let args = Args::parse();

    if let Err(err) = App::new(args).and_then(App::run) {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}
