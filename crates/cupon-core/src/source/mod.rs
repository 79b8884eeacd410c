//! Document sources: the text layer and OCR collaborators.
//!
//! The extraction engine only ever sees one string per document. This
//! module turns a file into that string: saved text verbatim, a PDF text
//! layer, or OCR of the PDF page images when the layer is too thin.

pub mod pdf;
#[cfg(feature = "native")]
pub mod ocr;

pub use pdf::PdfExtractor;
#[cfg(feature = "native")]
pub use ocr::PureOcrRecognizer;

use std::path::{Path, PathBuf};

use image::DynamicImage;
use tracing::{debug, info, warn};

use crate::error::{CuponError, OcrError, Result};
use crate::models::config::{CuponConfig, PdfConfig};

/// File extensions read as page images.
pub const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "tif", "tiff", "bmp"];

/// Direct text-layer extraction for digital documents.
pub trait SelectableTextExtractor: Send + Sync {
    /// Text of the whole document.
    fn extract_text(&self, data: &[u8]) -> Result<String>;

    /// Page images for OCR, at most `max_pages` (0 = all).
    fn page_images(&self, _data: &[u8], _max_pages: usize) -> Result<Vec<DynamicImage>> {
        Ok(Vec::new())
    }
}

/// OCR of one page image.
pub trait PageRecognizer: Send + Sync {
    fn recognize(&self, page: &DynamicImage) -> Result<String>;
}

/// Where a document's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextOrigin {
    /// A `.txt` file, typically saved OCR output.
    Plain,
    /// The PDF text layer.
    TextLayer,
    /// OCR of page images.
    Ocr,
}

/// The single text string handed to the extraction engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    pub text: String,
    pub origin: TextOrigin,
}

/// Reads one document into text.
pub trait DocumentSource: Send + Sync {
    fn read(&self, path: &Path) -> Result<RawDocument>;
}

/// Whether a path has an extension [`DocumentReader`] can read.
pub fn is_supported(path: &Path) -> bool {
    extension(path).is_some_and(|ext| ext == "txt" || ext == "pdf" || IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// File reader combining a text-layer extractor and an optional recognizer.
pub struct DocumentReader {
    text: Box<dyn SelectableTextExtractor>,
    recognizer: Option<Box<dyn PageRecognizer>>,
    pdf: PdfConfig,
    ocr_enabled: bool,
    save_text_dir: Option<PathBuf>,
}

impl DocumentReader {
    /// Reader with the PDF extractor and, when models load, the OCR engine.
    pub fn new(config: &CuponConfig) -> Self {
        let recognizer = if config.ocr.enabled { Self::load_recognizer(config) } else { None };
        Self {
            text: Box::new(PdfExtractor::new()),
            recognizer,
            pdf: config.pdf.clone(),
            ocr_enabled: config.ocr.enabled,
            save_text_dir: config.ocr.save_text_dir.clone(),
        }
    }

    #[cfg(feature = "native")]
    fn load_recognizer(config: &CuponConfig) -> Option<Box<dyn PageRecognizer>> {
        match PureOcrRecognizer::from_config(&config.ocr) {
            Ok(recognizer) => Some(Box::new(recognizer)),
            Err(e) => {
                warn!("OCR disabled: {}", e);
                None
            }
        }
    }

    #[cfg(not(feature = "native"))]
    fn load_recognizer(_config: &CuponConfig) -> Option<Box<dyn PageRecognizer>> {
        warn!("OCR disabled: built without the native feature");
        None
    }

    /// Reader over explicit collaborators.
    pub fn with_collaborators(
        text: Box<dyn SelectableTextExtractor>,
        recognizer: Option<Box<dyn PageRecognizer>>,
        pdf: PdfConfig,
    ) -> Self {
        let ocr_enabled = recognizer.is_some();
        Self {
            text,
            recognizer,
            pdf,
            ocr_enabled,
            save_text_dir: None,
        }
    }

    /// Also write the OCR text of every PDF into `dir`.
    pub fn with_save_text_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.save_text_dir = Some(dir.into());
        self
    }

    fn recognizer(&self) -> Result<&dyn PageRecognizer> {
        self.recognizer
            .as_deref()
            .ok_or_else(|| OcrError::Unavailable("no OCR models loaded".to_string()).into())
    }

    fn read_pdf(&self, data: &[u8]) -> Result<RawDocument> {
        let layer = self.text.extract_text(data);
        if let Ok(text) = &layer {
            if text.trim().chars().count() >= self.pdf.min_text_length {
                return Ok(RawDocument {
                    text: text.clone(),
                    origin: TextOrigin::TextLayer,
                });
            }
        }

        let layer_text = match layer {
            Ok(text) => {
                debug!("Text layer has {} chars, below {}", text.trim().len(), self.pdf.min_text_length);
                Some(text)
            }
            Err(e) => {
                debug!("Text layer unavailable: {}", e);
                if !self.ocr_enabled {
                    return Err(e);
                }
                None
            }
        };

        let ocr = if self.ocr_enabled {
            self.recognize_pages(data)
        } else {
            Ok(String::new())
        };

        match (ocr, layer_text) {
            (Ok(text), _) if !text.trim().is_empty() => Ok(RawDocument {
                text,
                origin: TextOrigin::Ocr,
            }),
            (_, Some(text)) if !text.trim().is_empty() => Ok(RawDocument {
                text,
                origin: TextOrigin::TextLayer,
            }),
            (Err(e), _) => Err(e),
            _ => Err(CuponError::NoText("document has no text layer and OCR found nothing".to_string())),
        }
    }

    /// Write OCR text to `<save_text_dir>/<stem>.txt`; failures only warn.
    fn save_ocr_text(&self, path: &Path, text: &str) {
        let Some(dir) = &self.save_text_dir else {
            return;
        };
        let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        let target = dir.join(format!("{}.txt", stem));

        let written = std::fs::create_dir_all(dir).and_then(|_| std::fs::write(&target, text));
        match written {
            Ok(()) => debug!("Saved OCR text to {}", target.display()),
            Err(e) => warn!("Could not save OCR text to {}: {}", target.display(), e),
        }
    }

    fn recognize_pages(&self, data: &[u8]) -> Result<String> {
        let recognizer = self.recognizer()?;
        let pages = self.text.page_images(data, self.pdf.max_pages)?;
        info!("Running OCR on {} page images", pages.len());

        let texts = pages
            .iter()
            .map(|page| recognizer.recognize(page))
            .collect::<Result<Vec<_>>>()?;
        Ok(texts.join("\n\n"))
    }
}

impl DocumentSource for DocumentReader {
    fn read(&self, path: &Path) -> Result<RawDocument> {
        let ext = extension(path).unwrap_or_default();

        match ext.as_str() {
            "txt" => {
                let bytes = std::fs::read(path)?;
                Ok(RawDocument {
                    text: String::from_utf8_lossy(&bytes).into_owned(),
                    origin: TextOrigin::Plain,
                })
            }
            "pdf" => {
                let data = std::fs::read(path)?;
                let doc = self.read_pdf(&data)?;
                if doc.origin == TextOrigin::Ocr {
                    self.save_ocr_text(path, &doc.text);
                }
                Ok(doc)
            }
            e if IMAGE_EXTENSIONS.contains(&e) => {
                let recognizer = self.recognizer()?;
                let page = image::open(path)?;
                Ok(RawDocument {
                    text: recognizer.recognize(&page)?,
                    origin: TextOrigin::Ocr,
                })
            }
            _ => Err(CuponError::Unsupported(path.display().to_string())),
        }
    }
}
