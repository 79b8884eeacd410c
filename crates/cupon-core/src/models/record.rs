//! Extracted coupon record and its fixed field schema.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::text::normalize::{collapse_whitespace, digits_only};

/// Canonical placeholder for a field that could not be resolved.
pub const NOT_FOUND: &str = "NOT_FOUND";

/// Column holding the originating document name.
pub const SOURCE_FILE_COLUMN: &str = "SourceFile";

/// Column holding the per-document error message.
pub const ERROR_COLUMN: &str = "error";

/// One field of the coupon schema.
///
/// Declaration order is the persisted column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Field {
    #[serde(rename = "Cliente")]
    Client,
    #[serde(rename = "Contrato")]
    Contract,
    #[serde(rename = "Identificacion")]
    Identification,
    #[serde(rename = "NoSolicitud")]
    RequestNumber,
    #[serde(rename = "TipoCupon")]
    CouponType,
    #[serde(rename = "ValorAPagar")]
    AmountDue,
    #[serde(rename = "NoRefPago")]
    PaymentReferenceNumber,
    #[serde(rename = "DirCliente")]
    Address,
    #[serde(rename = "ValidoHasta")]
    ValidUntil,
    #[serde(rename = "CodigoBarraRaw")]
    BarcodeRaw,
    #[serde(rename = "CodigoBarraLimpio")]
    BarcodeClean,
}

/// How a field value is post-normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Trimmed, whitespace-collapsed, uppercased.
    Text,
    /// ASCII digits only.
    Digits,
    /// ASCII digits and uppercase letters only.
    Code,
    /// Trimmed and whitespace-collapsed, case preserved.
    Raw,
}

impl Field {
    /// All schema fields in column order.
    pub const ALL: [Field; 11] = [
        Field::Client,
        Field::Contract,
        Field::Identification,
        Field::RequestNumber,
        Field::CouponType,
        Field::AmountDue,
        Field::PaymentReferenceNumber,
        Field::Address,
        Field::ValidUntil,
        Field::BarcodeRaw,
        Field::BarcodeClean,
    ];

    /// Output column name.
    pub fn column(self) -> &'static str {
        match self {
            Field::Client => "Cliente",
            Field::Contract => "Contrato",
            Field::Identification => "Identificacion",
            Field::RequestNumber => "NoSolicitud",
            Field::CouponType => "TipoCupon",
            Field::AmountDue => "ValorAPagar",
            Field::PaymentReferenceNumber => "NoRefPago",
            Field::Address => "DirCliente",
            Field::ValidUntil => "ValidoHasta",
            Field::BarcodeRaw => "CodigoBarraRaw",
            Field::BarcodeClean => "CodigoBarraLimpio",
        }
    }

    /// Normalization class of the field.
    pub fn kind(self) -> FieldKind {
        match self {
            Field::Client | Field::Address | Field::ValidUntil => FieldKind::Text,
            Field::Contract
            | Field::Identification
            | Field::RequestNumber
            | Field::AmountDue
            | Field::PaymentReferenceNumber => FieldKind::Digits,
            Field::CouponType | Field::BarcodeClean => FieldKind::Code,
            Field::BarcodeRaw => FieldKind::Raw,
        }
    }

    /// Look up a field by its column name.
    pub fn from_column(name: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|f| f.column().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// A resolved field value or the NOT_FOUND sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldValue {
    Found(String),
    #[default]
    NotFound,
}

impl FieldValue {
    /// Apply the field's post-normalization; empty results become NotFound.
    pub fn normalized(kind: FieldKind, raw: &str) -> Self {
        let value = match kind {
            FieldKind::Text => {
                let collapsed = collapse_whitespace(raw);
                collapsed
                    .trim_matches(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | ':' | '-'))
                    .to_uppercase()
            }
            FieldKind::Digits => digits_only(raw),
            FieldKind::Code => raw
                .to_uppercase()
                .chars()
                .filter(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
                .collect(),
            FieldKind::Raw => collapse_whitespace(raw),
        };

        if value.is_empty() || value == NOT_FOUND {
            FieldValue::NotFound
        } else {
            FieldValue::Found(value)
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, FieldValue::Found(_))
    }

    /// The resolved value, if any.
    pub fn as_deref(&self) -> Option<&str> {
        match self {
            FieldValue::Found(v) => Some(v),
            FieldValue::NotFound => None,
        }
    }

    /// Render with a custom sentinel label.
    pub fn display_with<'a>(&'a self, not_found_label: &'a str) -> &'a str {
        self.as_deref().unwrap_or(not_found_label)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        if value.is_empty() || value == NOT_FOUND {
            FieldValue::NotFound
        } else {
            FieldValue::Found(value)
        }
    }
}

impl From<FieldValue> for String {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Found(v) => v,
            FieldValue::NotFound => NOT_FOUND.to_string(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_with(NOT_FOUND))
    }
}

/// Which pipeline produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMode {
    /// Clean, selectable text.
    #[default]
    Digital,
    /// Noisy OCR output.
    Scanned,
}

/// One structured record per document.
///
/// Every schema field is always present; the record is immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    source_file: String,
    fields: BTreeMap<Field, FieldValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    mode: ExtractionMode,
    /// Rule that produced each resolved field.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    provenance: BTreeMap<Field, String>,
}

impl ExtractedRecord {
    pub(crate) fn new(
        source_file: String,
        fields: BTreeMap<Field, FieldValue>,
        error: Option<String>,
        mode: ExtractionMode,
        provenance: BTreeMap<Field, String>,
    ) -> Self {
        Self {
            source_file,
            fields,
            error,
            mode,
            provenance,
        }
    }

    pub fn source_file(&self) -> &str {
        &self.source_file
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn mode(&self) -> ExtractionMode {
        self.mode
    }

    /// Value of a schema field. Never absent.
    pub fn get(&self, field: Field) -> &FieldValue {
        const MISSING: &FieldValue = &FieldValue::NotFound;
        self.fields.get(&field).unwrap_or(MISSING)
    }

    /// Iterate fields in canonical order.
    pub fn fields(&self) -> impl Iterator<Item = (Field, &FieldValue)> {
        Field::ALL.into_iter().map(move |f| (f, self.get(f)))
    }

    /// Name of the rule that resolved a field.
    pub fn provenance(&self, field: Field) -> Option<&str> {
        self.provenance.get(&field).map(String::as_str)
    }

    /// Fields that resolved to NOT_FOUND.
    pub fn missing_fields(&self) -> Vec<Field> {
        self.fields()
            .filter(|(_, v)| !v.is_found())
            .map(|(f, _)| f)
            .collect()
    }

    /// Column/value pairs in persisted order: source file, schema fields, error.
    pub fn columns<'a>(&'a self, not_found_label: &'a str) -> Vec<(&'static str, &'a str)> {
        let mut row = Vec::with_capacity(Field::ALL.len() + 2);
        row.push((SOURCE_FILE_COLUMN, self.source_file.as_str()));
        for (field, value) in self.fields() {
            row.push((field.column(), value.display_with(not_found_label)));
        }
        row.push((ERROR_COLUMN, self.error.as_deref().unwrap_or("")));
        row
    }

    /// Header matching [`ExtractedRecord::columns`].
    pub fn header() -> Vec<&'static str> {
        let mut header = vec![SOURCE_FILE_COLUMN];
        header.extend(Field::ALL.iter().map(|f| f.column()));
        header.push(ERROR_COLUMN);
        header
    }
}
