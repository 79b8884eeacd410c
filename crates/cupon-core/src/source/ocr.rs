//! Page recognizer backed by `pure-onnx-ocr`.

use std::sync::Mutex;
use std::time::Instant;

use image::{DynamicImage, GenericImageView};
use tracing::{debug, info};

use super::PageRecognizer;
use crate::error::{OcrError, Result};
use crate::models::config::OcrConfig;

/// Rows closer than this (in pixels) are read as one line.
const ROW_HEIGHT: f64 = 20.0;

/// OCR engine from the configured model directory.
pub struct PureOcrRecognizer {
    engine: Mutex<pure_onnx_ocr::engine::OcrEngine>,
    keep_unk: bool,
}

impl PureOcrRecognizer {
    /// Load detection, recognition and dictionary files named by the config.
    pub fn from_config(config: &OcrConfig) -> std::result::Result<Self, OcrError> {
        let det_path = config.detection_model();
        let rec_path = config.recognition_model();
        let dict_path = config.dictionary();

        for path in [&det_path, &rec_path, &dict_path] {
            if !path.exists() {
                return Err(OcrError::ModelLoad(format!("missing model file {}", path.display())));
            }
        }

        let engine = pure_onnx_ocr::engine::OcrEngineBuilder::new()
            .det_model_path(&det_path)
            .rec_model_path(&rec_path)
            .dictionary_path(&dict_path)
            .build()
            .map_err(|e| OcrError::ModelLoad(format!("pure-onnx-ocr: {}", e)))?;

        info!("Loaded pure-onnx-ocr engine from {}", config.model_dir.display());

        Ok(Self {
            engine: Mutex::new(engine),
            keep_unk: config.keep_unk,
        })
    }
}

impl PageRecognizer for PureOcrRecognizer {
    fn recognize(&self, page: &DynamicImage) -> Result<String> {
        let start = Instant::now();
        let (width, height) = page.dimensions();
        debug!("Recognizing page image {}x{}", width, height);

        let results = {
            let engine = self
                .engine
                .lock()
                .map_err(|_| OcrError::Recognition("OCR engine lock poisoned".to_string()))?;
            engine
                .run_from_image(page)
                .map_err(|e| OcrError::Recognition(format!("pure-onnx-ocr: {}", e)))?
        };

        let mut lines: Vec<(f64, f64, String)> = results
            .iter()
            .map(|r| {
                let (x, y) = top_left(&r.bounding_box);
                let text = if self.keep_unk {
                    r.text.clone()
                } else {
                    r.text.replace("[UNK]", " ")
                };
                (x, y, text)
            })
            .collect();

        // Reading order: rows top to bottom, then left to right.
        lines.sort_by(|a, b| {
            let row_a = (a.1 / ROW_HEIGHT) as i64;
            let row_b = (b.1 / ROW_HEIGHT) as i64;
            row_a
                .cmp(&row_b)
                .then(a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
        });

        let text = lines
            .into_iter()
            .map(|(_, _, text)| text)
            .collect::<Vec<_>>()
            .join("\n");

        info!(
            "OCR complete: {} text boxes in {}ms",
            results.len(),
            start.elapsed().as_millis()
        );
        Ok(text)
    }
}

fn top_left(polygon: &pure_onnx_ocr::Polygon<f64>) -> (f64, f64) {
    polygon
        .exterior()
        .coords()
        .fold((f64::MAX, f64::MAX), |(x, y), c| (x.min(c.x), y.min(c.y)))
}
