//! Error types for the cupon-core library.

use thiserror::Error;

use crate::models::record::Field;

/// Main error type for the cupon library.
#[derive(Error, Debug)]
pub enum CuponError {
    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// OCR processing error.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// Field extraction error.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Image decoding error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The document produced no usable text.
    #[error("no text available: {0}")]
    NoText(String),

    /// Unsupported input file type.
    #[error("unsupported input: {0}")]
    Unsupported(String),
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to extract the text layer.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),

    /// No page image could be recovered for OCR.
    #[error("failed to extract page image: {0}")]
    ImageExtraction(String),

    /// The PDF is encrypted with a non-empty password.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF has no pages.
    #[error("PDF has no pages")]
    NoPages,
}

/// Errors related to OCR processing.
#[derive(Error, Debug)]
pub enum OcrError {
    /// Failed to load OCR models.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// Text recognition failed.
    #[error("text recognition failed: {0}")]
    Recognition(String),

    /// No recognizer is configured.
    #[error("OCR is not available: {0}")]
    Unavailable(String),
}

/// Errors related to coupon field extraction.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// A catalog pattern does not compile.
    #[error("invalid pattern for {key}: {source}")]
    InvalidPattern {
        key: String,
        #[source]
        source: regex::Error,
    },

    /// A catalog entry refers to an anchor block that is not declared.
    #[error("unknown anchor block '{block}' referenced by {key}")]
    UnknownBlock { key: String, block: String },

    /// A field-level rule failed; the field resolves to NOT_FOUND.
    #[error("{field}: {reason}")]
    Field { field: Field, reason: String },
}

/// Result type for the cupon library.
pub type Result<T> = std::result::Result<T, CuponError>;
