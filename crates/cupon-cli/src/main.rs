//! `cupon`: read payment coupons (digital PDFs, scans, saved OCR text) and
//! write their fields as JSON or appendable CSV rows.

mod commands;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{batch, config, fields, process};

const EXAMPLES: &str = "\
Examples:
  cupon process cupon_0042.pdf --explain
  cupon batch ./cupones --output cupones.csv --summary
  cupon batch 'scans/*.png' --ocr-text-dir ocr_text -j 8
  cupon config set output.not_found_label N/A";

/// Extract client, contract, amount, barcode and due-date fields from payment coupons
#[derive(Parser)]
#[command(name = "cupon")]
#[command(author, version, about)]
#[command(long_about = "Extract client, contract, amount, barcode and due-date fields from \
payment coupons.\n\nDigital PDFs are read from their text layer; scanned PDFs and page images \
go through OCR. Fields that cannot be found are reported as NOT_FOUND (configurable).")]
#[command(after_help = EXAMPLES)]
struct Cli {
    /// More log output on stderr (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// JSON config file (default: <config dir>/cupon/config.json)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the fields of one coupon and print them
    Process(process::ProcessArgs),

    /// Extract a directory or glob of coupons, appending one CSV row per file
    Batch(batch::BatchArgs),

    /// List the output columns and how each value is normalized
    Fields,

    /// Inspect or edit the configuration file
    Config(config::ConfigArgs),
}

/// Logs go to stderr so JSON and CSV on stdout stay clean.
fn init_logging(verbose: u8) -> anyhow::Result<()> {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Process(args) => process::run(args, config_path).await,
        Commands::Batch(args) => batch::run(args, config_path).await,
        Commands::Fields => fields::run(),
        Commands::Config(args) => config::run(args, config_path).await,
    }
}
