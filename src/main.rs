//! Subtran - Batched Subtitle Translation
//!
//! Command-line entry point: loads configuration, sets up logging and
//! runs a translation of one SRT file.

use std::path::Path;
use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn, Level};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use subtran::cli::{Args, Commands, ConfigAction};
use subtran::config::Config;
use subtran::error::SubtranError;
use subtran::translate::cancel_pair;
use subtran::workflow::Workflow;

const DEFAULT_CONFIG_FILE: &str = "subtran.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Setup logging to both console and file; the guard flushes the file log on exit
    let _log_guard = setup_logging(args.verbose)?;

    info!("Starting Subtran - Batched Subtitle Translation");

    // Load configuration
    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new(DEFAULT_CONFIG_FILE).exists() {
                info!("Found {} in current directory, loading...", DEFAULT_CONFIG_FILE);
                Config::from_file(DEFAULT_CONFIG_FILE)?
            } else {
                Config::default()
            }
        }
    };

    match args.command {
        Commands::Translate {
            input,
            output,
            target_lang,
            source_lang,
            batch_size,
            model,
            renumber,
        } => {
            if let Some(target) = target_lang {
                config.translate.target_language = target;
            }
            if let Some(source) = source_lang {
                config.translate.source_language = source;
            }
            if let Some(size) = batch_size {
                config.translate.batch_size = size;
            }
            if let Some(model) = model {
                config.completion.model = model;
            }
            config.translate.validate()?;

            let workflow = Workflow::new(config)?.renumber_input(renumber);

            let (cancel_handle, cancel) = cancel_pair();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, cancelling translation...");
                    cancel_handle.cancel();
                }
            });

            let progress_bar = ProgressBar::new(0);
            progress_bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} batches ({msg})")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );

            let result = workflow
                .translate_file(&input, &output, &cancel, |update| {
                    progress_bar.set_length(update.total as u64);
                    progress_bar.set_position(update.completed as u64);
                    progress_bar.set_message(format!("{:.0}%", update.percent()));
                })
                .await;
            progress_bar.finish_and_clear();

            match result {
                Ok(report) => {
                    println!(
                        "Translated {} -> {} ({} batches, {} kept original text)",
                        input.display(),
                        output.display(),
                        report.batches,
                        report.fallback_batches.len()
                    );
                }
                Err(SubtranError::AlignmentFailure { expected, actual }) => {
                    anyhow::bail!(
                        "Translation aborted: expected {} entries but assembled {}; no output written",
                        expected,
                        actual
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Init { path, force } => {
                if path.exists() && !force {
                    anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
                }
                Config::default().save_to_file(&path)?;
                println!("Wrote default configuration to {}", path.display());
            }
            ConfigAction::Show => {
                print!("{}", config.to_toml()?);
            }
        },
    }

    Ok(())
}

/// Daily-rotated `subtran.log` writer under `log_dir`; lines are flushed when the guard drops
fn file_writer(log_dir: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(log_dir)?;
    let file_appender = rolling::daily(log_dir, "subtran.log");
    Ok(non_blocking(file_appender))
}

fn setup_logging(verbose: bool) -> Result<WorkerGuard> {
    let log_dir = std::env::current_dir()?.join(".subtran").join("log");
    let (non_blocking_file, guard) = file_writer(&log_dir)?;

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_file(verbose)
        .with_line_number(verbose);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized - console: {}, file: {}",
          log_level, log_dir.join("subtran.log").display());

    Ok(guard)
}
