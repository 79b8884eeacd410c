//! Process command - extract fields from a single coupon.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use tracing::{debug, info};

use cupon_core::batch::{file_name, process_document};
use cupon_core::{is_supported, DocumentReader, FieldExtractionEngine};

use crate::output;

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Coupon file: PDF, page image, or saved OCR text
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Show which rule resolved each field
    #[arg(long)]
    explain: bool,

    #[command(flatten)]
    ocr: super::OcrArgs,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV header and row
    Csv,
    /// Plain text summary
    Text,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let mut config = super::load_config(config_path)?;
    args.ocr.apply(&mut config);

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }
    if !is_supported(&args.input) {
        anyhow::bail!("Unsupported file format: {}", args.input.display());
    }

    info!("Processing file: {}", args.input.display());

    let engine = FieldExtractionEngine::new(&config)?;
    let reader = DocumentReader::new(&config);
    let record = process_document(&reader, &engine, &args.input, &file_name(&args.input));

    let label = config.output.not_found_label.as_str();
    let rendered = match args.format {
        OutputFormat::Json => output::record_json(&record)?,
        OutputFormat::Csv => output::record_csv(&record, label)?,
        OutputFormat::Text => output::record_text(&record, label),
    };

    if let Some(output_path) = &args.output {
        fs::write(output_path, &rendered)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", rendered.trim_end());
    }

    if let Some(error) = record.error() {
        eprintln!("{} {}", style("⚠").yellow(), error);
    }

    if args.explain {
        println!();
        print!("{}", output::explain(&record));
    }

    debug!("Total processing time: {:?}", start.elapsed());
    Ok(())
}
