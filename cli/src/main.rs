mod cli;

use std::path::Path;
use std::sync::Arc;

use aipkit::config::{load_config, resolve_config_path};
use aipkit::{
    load_sheet, validate_sheet, BatchRunner, BatchSummary, Config, ConsoleProgress,
    PipelineConfig, ProcessRunner,
};
use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::Cli;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) -> Result<()> {
    tracing_log::LogTracer::init().context("Failed to bridge log records into tracing")?;

    // Respect RUST_LOG if set, otherwise pick a level from the verbose flag
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init()
        .context("Failed to initialize logging")?;
    Ok(())
}

fn load(cli: &Cli) -> Result<Config> {
    let path = resolve_config_path(cli.config.as_deref())?;
    tracing::info!("Using config {}", path.display());
    let mut config = load_config(&path)
        .with_context(|| format!("Could not load config from {}", path.display()))?;

    if let Some(workers) = cli.workers {
        if workers == 0 {
            bail!("--workers must be at least 1");
        }
        config.workers = workers;
    }
    if cli.no_zip {
        config.zip = false;
    }

    let problems = config.check_resources();
    if !problems.is_empty() {
        for problem in &problems {
            tracing::error!("{}", problem);
        }
        bail!("{} configuration problem(s) found", problems.len());
    }
    Ok(config)
}

fn print_summary(batch_dir: &Path, summary: &BatchSummary) {
    println!();
    println!("Processed {} AIP(s) in {}", summary.total(), batch_dir.display());
    println!("  complete:    {}", summary.completed.len());
    println!("  quarantined: {}", summary.quarantined.len());
    for (id, category) in &summary.quarantined {
        println!("    {} -> errors/{}", id, category);
    }
    if !summary.halted.is_empty() {
        println!("  stopped:     {}", summary.halted.len());
        for id in &summary.halted {
            println!("    {}", id);
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    if !cli.batch_dir.is_dir() {
        bail!("Batch directory does not exist: {}", cli.batch_dir.display());
    }

    let config = load(&cli)?;

    let rows = load_sheet(&cli.batch_dir)?;
    validate_sheet(&rows, &config.departments, &cli.batch_dir)?;
    tracing::info!("Batch sheet lists {} AIP(s)", rows.len());

    if cli.check {
        println!("Configuration and batch sheet are valid");
        return Ok(());
    }

    let pipeline_config = Arc::new(PipelineConfig::from_config(&config, &cli.batch_dir));
    let summary = BatchRunner::new(pipeline_config, Arc::new(ProcessRunner))
        .with_progress(Arc::new(ConsoleProgress::new(rows.len())))
        .run(&rows)
        .context("Batch run failed")?;

    print_summary(&cli.batch_dir, &summary);
    Ok(())
}
