//! Core library for payment coupon field extraction.
//!
//! This crate provides:
//! - Document sources (saved text, PDF text layer, OCR of page images)
//! - Text-quality classification into digital or scanned mode
//! - Per-mode field pipelines over a configurable pattern catalog
//! - Barcode (GS1 application identifier) and amount heuristics
//! - Concurrent batch extraction with per-document timeouts

pub mod batch;
pub mod error;
pub mod extract;
pub mod models;
pub mod source;
pub mod text;

pub use batch::{BatchReport, BatchRunner, MissingSummary, Progress, StopSignal};
pub use error::{CuponError, ExtractionError, OcrError, PdfError, Result};
pub use extract::{decode_barcode, normalize_amount, Barcode, CompiledCatalog, FieldExtractionEngine, PatternCatalog};
pub use models::config::CuponConfig;
pub use models::record::{ExtractedRecord, ExtractionMode, Field, FieldValue, NOT_FOUND};
pub use source::{is_supported, DocumentReader, DocumentSource, RawDocument, TextOrigin};
pub use text::{normalize, TextQualityClassifier};
