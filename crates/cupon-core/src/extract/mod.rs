//! Coupon field extraction.

pub mod amount;
pub mod assembler;
pub mod barcode;
pub mod catalog;
pub mod client;
pub mod dates;
pub mod disambiguate;
mod engine;
pub mod pipeline;
pub mod rules;

pub use amount::normalize_amount;
pub use assembler::{RecordBuilder, ResultAssembler};
pub use barcode::{decode_barcode, Barcode, BarcodeElement};
pub use catalog::{CompiledCatalog, FieldPatterns, PatternCatalog, PatternEntry};
pub use engine::FieldExtractionEngine;
pub use pipeline::Pipeline;
pub use rules::{FieldContext, Hit, Rule, RuleChain};
