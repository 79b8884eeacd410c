//! Configuration structures for the extraction pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::extract::catalog::PatternCatalog;
use crate::models::record::NOT_FOUND;

/// Main configuration for cupon.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CuponConfig {
    /// Field extraction configuration.
    pub extraction: ExtractionConfig,

    /// Text-quality classifier thresholds.
    pub classifier: ClassifierConfig,

    /// PDF processing configuration.
    pub pdf: PdfConfig,

    /// OCR collaborator configuration.
    pub ocr: OcrConfig,

    /// Batch scheduling configuration.
    pub batch: BatchConfig,

    /// Output configuration.
    pub output: OutputConfig,
}

/// Field extraction configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Ordered per-field pattern lists.
    pub patterns: PatternCatalog,
}

/// Thresholds used to tell OCR output from a digital text layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Lines shorter than this (in characters) count as short.
    pub min_line_length: usize,

    /// Share of short lines above which text is treated as OCR output.
    pub short_line_ratio: f64,

    /// Share of digit/letter artifact tokens above which text is treated as OCR output.
    pub artifact_ratio: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_line_length: 10,
            short_line_ratio: 0.5,
            artifact_ratio: 0.1,
        }
    }
}

/// PDF processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Minimum text-layer length to skip OCR.
    pub min_text_length: usize,

    /// Maximum pages sent to OCR (0 = unlimited).
    pub max_pages: usize,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            min_text_length: 50,
            max_pages: 0,
        }
    }
}

/// OCR collaborator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Run OCR on image-only documents.
    pub enabled: bool,

    /// Directory containing the detection/recognition models.
    pub model_dir: PathBuf,

    /// Recognition language; selects `<language>_rec.onnx` and `<language>_dict.txt`.
    pub language: String,

    /// Keep `[UNK]` markers emitted by the recognizer.
    pub keep_unk: bool,

    /// When set, OCR output of each PDF is also written to `<stem>.txt` here.
    pub save_text_dir: Option<PathBuf>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model_dir: PathBuf::from("models"),
            language: "latin".to_string(),
            keep_unk: false,
            save_text_dir: None,
        }
    }
}

impl OcrConfig {
    /// Detection model path.
    pub fn detection_model(&self) -> PathBuf {
        self.model_dir.join("det.onnx")
    }

    /// Recognition model path for the configured language.
    pub fn recognition_model(&self) -> PathBuf {
        self.model_dir.join(format!("{}_rec.onnx", self.language))
    }

    /// Character dictionary path for the configured language.
    pub fn dictionary(&self) -> PathBuf {
        self.model_dir.join(format!("{}_dict.txt", self.language))
    }
}

/// Batch scheduling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Upper bound on concurrently processed documents.
    pub max_workers: usize,

    /// Per-document timeout in seconds.
    pub task_timeout_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            task_timeout_secs: 180,
        }
    }
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Label written for unresolved fields.
    pub not_found_label: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            not_found_label: NOT_FOUND.to_string(),
        }
    }
}

impl CuponConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: CuponConfig =
            serde_json::from_str(r#"{ "batch": { "max_workers": 8 } }"#).unwrap();
        assert_eq!(config.batch.max_workers, 8);
        assert_eq!(config.batch.task_timeout_secs, 180);
        assert_eq!(config.classifier.min_line_length, 10);
        assert_eq!(config.output.not_found_label, "NOT_FOUND");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = CuponConfig::default();
        config.ocr.language = "spa".to_string();
        config.save(&path).unwrap();

        let loaded = CuponConfig::from_file(&path).unwrap();
        assert_eq!(loaded.ocr.language, "spa");
        assert_eq!(loaded.ocr.recognition_model(), PathBuf::from("models/spa_rec.onnx"));
    }
}
