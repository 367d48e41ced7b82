//! optimize - MCTS content optimizer CLI
//!
//! Reads a draft from a file or stdin, runs the tree search against the
//! configured completion service, and prints the final markdown report to
//! stdout. Progress lines go to stderr so the report stays pipeable.

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use clap::Parser;
use mcts_optimizer::{Optimizer, ProgressSink};
use tracing::info;

mod config;

use crate::config::Config;

fn init_tracing(level: &str) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    Ok(())
}

/// Prints status lines to stderr; intermediate fragments go to stdout only
/// when requested via --show-intermediate.
struct ConsoleProgress {
    show_intermediate: bool,
    any_status: AtomicBool,
}

impl ProgressSink for ConsoleProgress {
    fn status(&self, message: &str) {
        self.any_status.store(true, Ordering::Relaxed);
        eprintln!("[optimize] {message}");
    }

    fn message(&self, content: &str) {
        if self.show_intermediate {
            println!("{content}");
        }
    }
}

fn read_input(path: Option<&str>) -> Result<String> {
    match path {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("failed to read {path}"))
        }
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read stdin")?;
            Ok(buffer)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    config.validate()?;

    init_tracing(&config.log_level)?;
    info!(log_level = %config.log_level, "tracing initialized");

    let text = read_input(config.input.as_deref())?;

    let optimizer = Optimizer::from_config(config.to_optimizer_config())?;
    info!(
        max_simulations = optimizer.config().max_simulations,
        strictness = %optimizer.config().grading_strictness,
        "starting optimization"
    );

    let progress = ConsoleProgress {
        show_intermediate: config.show_intermediate,
        any_status: AtomicBool::new(false),
    };

    let report = optimizer
        .improve_content(&text, config.goal.as_deref(), &progress)
        .await;

    if progress.any_status.load(Ordering::Relaxed) {
        eprintln!();
    }
    println!("{report}");

    Ok(())
}
