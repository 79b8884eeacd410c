//! Merges per-field outcomes into one [`ExtractedRecord`].

use std::collections::BTreeMap;

use crate::models::record::{ExtractedRecord, ExtractionMode, Field, FieldValue};

/// Per-field outcomes for one document, before assembly.
#[derive(Debug, Default)]
pub struct RecordBuilder {
    mode: ExtractionMode,
    fields: BTreeMap<Field, FieldValue>,
    provenance: BTreeMap<Field, String>,
    errors: Vec<String>,
}

impl RecordBuilder {
    pub fn new(mode: ExtractionMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    /// Record a field outcome and the rule behind it.
    pub fn set(&mut self, field: Field, value: FieldValue, rule: impl Into<String>) {
        if value.is_found() {
            self.provenance.insert(field, rule.into());
        } else {
            self.provenance.remove(&field);
        }
        self.fields.insert(field, value);
    }

    /// Note a recovered failure; it ends up in the record's `error`.
    pub fn note_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Build the record. Every schema field is present afterwards.
    pub fn assemble(self, source_file: impl Into<String>) -> ExtractedRecord {
        let mut fields = self.fields;
        for field in Field::ALL {
            fields.entry(field).or_insert(FieldValue::NotFound);
        }

        let error = (!self.errors.is_empty()).then(|| self.errors.join("; "));
        ExtractedRecord::new(source_file.into(), fields, error, self.mode, self.provenance)
    }
}

/// Records that do not come out of a pipeline run.
pub struct ResultAssembler;

impl ResultAssembler {
    /// All-NOT_FOUND record for input that could not be read or timed out.
    pub fn unavailable(source_file: impl Into<String>, reason: impl Into<String>) -> ExtractedRecord {
        let mut builder = RecordBuilder::new(ExtractionMode::default());
        builder.note_error(reason);
        builder.assemble(source_file)
    }
}
