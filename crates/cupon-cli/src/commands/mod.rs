//! Subcommands.

pub mod batch;
pub mod config;
pub mod fields;
pub mod process;

use std::path::{Path, PathBuf};

use clap::Args;
use tracing::debug;

use cupon_core::CuponConfig;

/// Config file in the platform config directory.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cupon")
        .join("config.json")
}

/// Path given with `--config`, otherwise the default location.
pub fn config_path(explicit: Option<&str>) -> PathBuf {
    explicit.map(PathBuf::from).unwrap_or_else(default_config_path)
}

/// Explicit config must exist; the default file is optional.
pub fn load_config(explicit: Option<&str>) -> anyhow::Result<CuponConfig> {
    if let Some(path) = explicit {
        return read_config(Path::new(path));
    }

    let path = default_config_path();
    if path.exists() {
        read_config(&path)
    } else {
        debug!("No config at {}, using defaults", path.display());
        Ok(CuponConfig::default())
    }
}

fn read_config(path: &Path) -> anyhow::Result<CuponConfig> {
    CuponConfig::from_file(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))
}

/// OCR switches shared by `process` and `batch`.
#[derive(Args, Debug, Default)]
pub struct OcrArgs {
    /// Never run OCR; scanned coupons keep whatever text layer they have
    #[arg(long)]
    no_ocr: bool,

    /// Also save the OCR text of each scanned PDF as <DIR>/<name>.txt
    #[arg(long, value_name = "DIR")]
    ocr_text_dir: Option<PathBuf>,
}

impl OcrArgs {
    pub fn apply(&self, config: &mut CuponConfig) {
        if self.no_ocr {
            config.ocr.enabled = false;
        }
        if let Some(dir) = &self.ocr_text_dir {
            config.ocr.save_text_dir = Some(dir.clone());
        }
    }
}
