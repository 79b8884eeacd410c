//! Field extraction engine: classify, normalize, run a pipeline, assemble.

use std::time::Instant;

use tracing::{debug, info};

use crate::error::Result;
use crate::extract::catalog::CompiledCatalog;
use crate::extract::pipeline::Pipeline;
use crate::models::config::CuponConfig;
use crate::models::record::{ExtractedRecord, ExtractionMode};
use crate::text::classifier::TextQualityClassifier;
use crate::text::normalize::normalize;

/// Entry point turning one document's raw text into a record.
///
/// Built once from configuration; holds no per-document state, so one
/// engine can serve every worker of a batch.
#[derive(Debug)]
pub struct FieldExtractionEngine {
    classifier: TextQualityClassifier,
    digital: Pipeline,
    scanned: Pipeline,
}

impl FieldExtractionEngine {
    /// Compile the configured pattern catalog and build both pipelines.
    pub fn new(config: &CuponConfig) -> Result<Self> {
        let catalog = config.extraction.patterns.compile()?;
        Ok(Self::with_catalog(TextQualityClassifier::new(config.classifier.clone()), &catalog))
    }

    pub fn with_catalog(classifier: TextQualityClassifier, catalog: &CompiledCatalog) -> Self {
        Self {
            classifier,
            digital: Pipeline::digital(catalog),
            scanned: Pipeline::scanned(catalog),
        }
    }

    pub fn pipeline(&self, mode: ExtractionMode) -> &Pipeline {
        match mode {
            ExtractionMode::Digital => &self.digital,
            ExtractionMode::Scanned => &self.scanned,
        }
    }

    /// Classify the raw text and extract every field.
    ///
    /// Never fails: unresolved fields are NOT_FOUND and recovered field
    /// failures are reported in the record's `error`.
    pub fn classify_and_extract(&self, raw: &str, filename: &str) -> ExtractedRecord {
        let start = Instant::now();

        let mode = self.classifier.classify(raw);
        let text = normalize(raw);
        debug!("{}: {} chars normalized to {}", filename, raw.len(), text.len());

        let record = self.pipeline(mode).run(&text).assemble(filename);

        info!(
            "Extracted {} ({:?}): {} missing fields in {} ms",
            filename,
            mode,
            record.missing_fields().len(),
            start.elapsed().as_millis()
        );
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::catalog::PatternCatalog;
    use crate::models::record::{Field, FieldValue};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn engine() -> FieldExtractionEngine {
        FieldExtractionEngine::new(&CuponConfig::default()).unwrap()
    }

    fn value(record: &ExtractedRecord, field: Field) -> Option<&str> {
        record.get(field).as_deref()
    }

    #[test]
    fn test_client_identification_contract_line() {
        let record = engine().classify_and_extract(
            "Cliente: JUAN PEREZ GOMEZ Identificacion: 123456789 Contrato: 998877",
            "a.pdf",
        );
        assert_eq!(record.mode(), ExtractionMode::Digital);
        assert_eq!(value(&record, Field::Client), Some("JUAN PEREZ GOMEZ"));
        assert_eq!(value(&record, Field::Identification), Some("123456789"));
        assert_eq!(value(&record, Field::Contract), Some("998877"));
        assert_eq!(record.source_file(), "a.pdf");
    }

    #[test]
    fn test_currency_amount_line() {
        let record = engine().classify_and_extract("Valor a pagar: $20,000.00", "b.pdf");
        assert_eq!(value(&record, Field::AmountDue), Some("20000"));
    }

    #[test]
    fn test_barcode_only_document() {
        let record = engine().classify_and_extract("(415)123(8020)456(3900)75000(96)12345678", "c.pdf");
        assert_eq!(value(&record, Field::AmountDue), Some("75000"));
        assert_eq!(value(&record, Field::BarcodeClean), Some("41512380204563900750009612345678"));
        assert_eq!(value(&record, Field::BarcodeRaw), Some("(415)123(8020)456(3900)75000(96)12345678"));
        assert_eq!(record.provenance(Field::AmountDue), Some("barcode.ai3900"));
        // 456 is too short for a payment reference.
        assert_eq!(record.get(Field::PaymentReferenceNumber), &FieldValue::NotFound);
    }

    #[test]
    fn test_short_lines_use_scanned_pipeline() {
        let record = engine().classify_and_extract("CUPON\nPAGO\nVALOR\n$ 5O.OOO\nGRACIAS", "d.pdf");
        assert_eq!(record.mode(), ExtractionMode::Scanned);
        assert_eq!(value(&record, Field::AmountDue), Some("50000"));
    }

    #[test]
    fn test_empty_text() {
        let record = engine().classify_and_extract("", "e.pdf");
        assert_eq!(record.mode(), ExtractionMode::Digital);
        assert_eq!(record.missing_fields(), Field::ALL.to_vec());
        assert_eq!(record.error(), None);
    }

    #[test]
    fn test_amount_prefers_currency_over_total() {
        let record = engine().classify_and_extract(
            "Resumen de pagos del periodo actual\nTotal Efectivo 880.000 pesos\nValor a pagar: $ 120.500",
            "f.pdf",
        );
        assert_eq!(value(&record, Field::AmountDue), Some("120500"));
    }

    #[test]
    fn test_labelled_amount_equal_to_contract_is_kept() {
        let record = engine().classify_and_extract(
            "Contrato: 50000\nValor a pagar: 50000\nNo. Solicitud: 7654321",
            "h.pdf",
        );
        assert_eq!(value(&record, Field::Contract), Some("50000"));
        assert_eq!(value(&record, Field::RequestNumber), Some("7654321"));
        assert_eq!(value(&record, Field::AmountDue), Some("50000"));
        assert_eq!(record.provenance(Field::AmountDue), Some("digital.ValorAPagar[0]"));
    }

    #[test]
    fn test_last_resort_never_reuses_resolved_value() {
        let record = engine().classify_and_extract(
            "Contrato: 50000 referencia de servicio\nNo. Solicitud: 7654321 en tramite",
            "i.pdf",
        );
        assert_eq!(value(&record, Field::RequestNumber), Some("7654321"));
        assert_eq!(record.get(Field::AmountDue), &FieldValue::NotFound);
    }

    #[test]
    fn test_date_never_amount() {
        let record = engine().classify_and_extract(
            "Cupón de servicios públicos\nValor a pagar: 15-ENE-2025\nGracias por su pago",
            "g.pdf",
        );
        assert_eq!(record.get(Field::AmountDue), &FieldValue::NotFound);
    }

    #[test]
    fn test_invalid_catalog_fails_at_startup() {
        let mut config = CuponConfig::default();
        config.extraction.patterns = PatternCatalog::default();
        config
            .extraction
            .patterns
            .digital
            .entry(Field::Contract)
            .or_default()
            .patterns
            .push("Contrato(".into());
        assert!(FieldExtractionEngine::new(&config).is_err());
    }

    proptest! {
        /// Property: every schema field is present for arbitrary text
        #[test]
        fn record_is_total(text in "\\PC{0,300}") {
            let record = engine().classify_and_extract(&text, "p.pdf");
            prop_assert_eq!(record.fields().count(), Field::ALL.len());
            prop_assert_eq!(record.columns("NOT_FOUND").len(), ExtractedRecord::header().len());
        }

        /// Property: numeric fields hold digits only
        #[test]
        fn numeric_fields_are_digits(text in "[A-Za-z0-9 :$.,()\\-\\n]{0,200}") {
            let record = engine().classify_and_extract(&text, "p.pdf");
            for field in [
                Field::AmountDue,
                Field::Identification,
                Field::Contract,
                Field::RequestNumber,
                Field::PaymentReferenceNumber,
            ] {
                if let Some(v) = record.get(field).as_deref() {
                    prop_assert!(v.chars().all(|c| c.is_ascii_digit()), "{}: {}", field, v);
                }
            }
        }
    }
}
