//! Batch command - extract many coupons into one CSV file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use cupon_core::{is_supported, BatchRunner, DocumentReader, DocumentSource, FieldExtractionEngine};

use crate::output;

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Directory of coupons, or a glob such as 'scans/*.pdf'
    #[arg(required = true)]
    input: String,

    /// CSV file to append rows to (header written once)
    #[arg(short, long, default_value = "cupones.csv")]
    output: PathBuf,

    /// Number of parallel workers (default: from config)
    #[arg(short = 'j', long)]
    jobs: Option<usize>,

    /// Per-document timeout in seconds (default: from config)
    #[arg(long)]
    timeout: Option<u64>,

    /// Print how many coupons lacked each field
    #[arg(long)]
    summary: bool,

    #[command(flatten)]
    ocr: super::OcrArgs,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let mut config = super::load_config(config_path)?;
    if let Some(jobs) = args.jobs {
        config.batch.max_workers = jobs;
    }
    if let Some(timeout) = args.timeout {
        config.batch.task_timeout_secs = timeout;
    }
    args.ocr.apply(&mut config);

    let files = collect_inputs(&args.input)?;
    if files.is_empty() {
        anyhow::bail!("No matching files found for: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    let engine = Arc::new(FieldExtractionEngine::new(&config)?);
    let source: Arc<dyn DocumentSource> = Arc::new(DocumentReader::new(&config));
    let runner = BatchRunner::new(engine, source, &config.batch)
        .with_timeout(Duration::from_secs(config.batch.task_timeout_secs));

    let stop = runner.stop_signal();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing documents in flight");
            stop.stop();
        }
    });

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );

    let report = runner
        .run(files, |progress| {
            pb.set_position(progress.completed as u64);
            pb.set_message(progress.record.source_file().to_string());
        })
        .await;
    pb.finish_and_clear();

    let written = output::append_csv(&args.output, &report.records, &config.output.not_found_label)?;
    debug!("Appended {} rows to {}", written, args.output.display());

    let failed: Vec<_> = report.records.iter().filter(|r| r.error().is_some()).collect();

    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        report.records.len(),
        start.elapsed()
    );
    println!(
        "   {} rows appended to {}",
        style(written).green(),
        args.output.display()
    );
    if report.timed_out > 0 {
        println!("   {} timed out", style(report.timed_out).red());
    }
    if report.cancelled > 0 {
        println!("   {} not processed after interrupt", style(report.cancelled).yellow());
    }

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for record in &failed {
            println!("  - {}: {}", record.source_file(), record.error().unwrap_or_default());
        }
    }

    if args.summary {
        println!();
        output::print_missing(&report.missing);
    }

    Ok(())
}

/// Supported files directly inside a directory, or the matches of a glob, sorted.
fn collect_inputs(input: &str) -> anyhow::Result<Vec<PathBuf>> {
    let path = Path::new(input);
    let mut files: Vec<PathBuf> = if path.is_dir() {
        std::fs::read_dir(path)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .collect()
    } else {
        glob(input)?.filter_map(|r| r.ok()).collect()
    };

    files.retain(|p| p.is_file() && is_supported(p));
    files.sort();
    Ok(files)
}
