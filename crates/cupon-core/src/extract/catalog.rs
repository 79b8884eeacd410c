//! Externally configurable pattern catalog.
//!
//! The catalog maps each field to an ordered list of patterns per pipeline.
//! Order is precedence: the first pattern that yields an acceptable value
//! wins. Patterns are always case-insensitive; `dot_all` lets `.` cross
//! newlines for fields whose label and value may sit on different lines.

use std::collections::BTreeMap;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::ExtractionError;
use crate::models::record::{ExtractionMode, Field};

/// One catalog entry: a bare pattern, or a pattern scoped to an anchor block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatternEntry {
    Plain(String),
    Scoped {
        pattern: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        block: Option<String>,
    },
}

impl PatternEntry {
    fn scoped(block: &str, pattern: &str) -> Self {
        PatternEntry::Scoped {
            pattern: pattern.to_string(),
            block: Some(block.to_string()),
        }
    }

    pub fn pattern(&self) -> &str {
        match self {
            PatternEntry::Plain(p) => p,
            PatternEntry::Scoped { pattern, .. } => pattern,
        }
    }

    pub fn block(&self) -> Option<&str> {
        match self {
            PatternEntry::Plain(_) => None,
            PatternEntry::Scoped { block, .. } => block.as_deref(),
        }
    }
}

impl From<&str> for PatternEntry {
    fn from(pattern: &str) -> Self {
        PatternEntry::Plain(pattern.to_string())
    }
}

/// Ordered fallback chain for one field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldPatterns {
    pub patterns: Vec<PatternEntry>,
    pub dot_all: bool,
}

impl FieldPatterns {
    fn new(dot_all: bool, patterns: Vec<PatternEntry>) -> Self {
        Self { patterns, dot_all }
    }
}

/// Pattern catalog as loaded from configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternCatalog {
    /// Named anchor regions. Group 1 (or the whole match) is the block text.
    pub blocks: BTreeMap<String, String>,

    /// Field patterns for clean, selectable text.
    pub digital: BTreeMap<Field, FieldPatterns>,

    /// Field patterns for OCR output.
    pub scanned: BTreeMap<Field, FieldPatterns>,
}

impl Default for PatternCatalog {
    fn default() -> Self {
        let blocks = BTreeMap::from([
            ("client".to_string(), r"Cliente:(.*?)Contrato".to_string()),
            ("contract".to_string(), r"(Contrato.*?)No\.?\s*Solicitud".to_string()),
        ]);

        Self {
            blocks,
            digital: default_digital(),
            scanned: default_scanned(),
        }
    }
}

fn default_digital() -> BTreeMap<Field, FieldPatterns> {
    let identification = r"Identificaci[\s\S]{0,3}?n\s*:?\s*(\d{6,})";
    let address = r"Dir\.?\s*Cliente:\s*(.+?)\s*(?:FAX:|L[íi]nea|Valor\s*a\s*pagar|Tipo\s*de|No\.|$)";

    BTreeMap::from([
        (
            Field::Client,
            FieldPatterns::new(
                true,
                vec![
                    PatternEntry::scoped("client", r"([A-ZÑÁÉÍÓÚ.\-\s]{5,}?)\s*Identificaci"),
                    r"Cliente[:\s]*([A-ZÑÁÉÍÓÚ\-.\s]{3,}?)\s+Identificaci[óo]n".into(),
                ],
            ),
        ),
        (
            Field::Identification,
            FieldPatterns::new(
                false,
                vec![PatternEntry::scoped("client", identification), identification.into()],
            ),
        ),
        (
            Field::Contract,
            FieldPatterns::new(
                false,
                vec![
                    PatternEntry::scoped("contract", r"Contrato\s*:?\s*(\d{3,})"),
                    r"Contrato[:\s\-]*([0-9]{3,20})".into(),
                ],
            ),
        ),
        (
            Field::Address,
            FieldPatterns::new(
                true,
                vec![
                    PatternEntry::scoped("contract", address),
                    address.into(),
                    r"Dir\W*\.?\W*Cliente\W*:\s*(.+?)(?:\s+(?:FAX|L[íi]nea|Valor|Tipo|No\.)|$)".into(),
                ],
            ),
        ),
        (
            Field::RequestNumber,
            FieldPatterns::new(
                true,
                vec![
                    r"No\.?\s*Solic(?:itud)?\s*:?\s*(\d{6,})".into(),
                    r"No\W*Solici(?:tud)?\W*:?\s*([0-9]{6,})".into(),
                    r"Solici[^\d]{0,20}(\d{6,})".into(),
                ],
            ),
        ),
        (
            Field::PaymentReferenceNumber,
            FieldPatterns::new(
                true,
                vec![
                    r"No\.?\s*Ref\.?[\s\S]{0,20}?(\d{6,})".into(),
                    r"No\W*Ref\W*\.?\W*(?:Pago)?\W*:?\s*([0-9]{6,})".into(),
                ],
            ),
        ),
        (
            Field::CouponType,
            FieldPatterns::new(
                true,
                vec![
                    r"Tipo\s*de\s*Cup[óo]n\s*:?\s*([A-Z]{1,4}(?:\s[A-Z]{1,3})?)\b".into(),
                    r"Cup[óo]n\s*:\s*([A-Z]{1,4})\b".into(),
                    r"Tipo\s*de\s*([A-Z]{1,4})\s*V[áa]lido".into(),
                ],
            ),
        ),
        (
            Field::ValidUntil,
            FieldPatterns::new(false, vec![r"V[áa]lido\s*hasta\s*:?\s*([0-9A-Z\-/]+)".into()]),
        ),
        (
            Field::AmountDue,
            FieldPatterns::new(false, vec![r"Valor\s*a\s*pagar[:\s]*([^\n]{1,60})".into()]),
        ),
        (
            Field::BarcodeRaw,
            FieldPatterns::new(
                true,
                vec![r"(\(415\)\d+\(8020\)\d+\(3900\)\d+\(96\)\d{8})".into()],
            ),
        ),
    ])
}

fn default_scanned() -> BTreeMap<Field, FieldPatterns> {
    BTreeMap::from([
        (
            Field::Identification,
            FieldPatterns::new(
                false,
                vec![
                    r"Identificaci[oó]n[:\s]*(\d[\d\-. ]{5,19})".into(),
                    r"Cliente[:\s].*?(\d{6,12})".into(),
                ],
            ),
        ),
        (
            Field::Contract,
            FieldPatterns::new(false, vec![r"Contrato[:\s]*([0-9]{3,20})".into()]),
        ),
        (
            Field::Address,
            FieldPatterns::new(
                false,
                vec![
                    r"Dir(?:\.|ecci[oó]n)?\s*:?\s*Cliente\s*:?\s*([^\n]+?)\s*(?:FAX|L[íi]nea|Valor|Tipo|No\.|\n|$)"
                        .into(),
                ],
            ),
        ),
        (
            Field::RequestNumber,
            FieldPatterns::new(
                false,
                vec![r"No\.?\s*Solicit(?:ud|ion)[:\s\-]*([0-9]{5,30})".into()],
            ),
        ),
        (
            Field::PaymentReferenceNumber,
            FieldPatterns::new(
                false,
                vec![
                    r"No\.?\s*Ref\.?\s*[:\s]*Pago[:\s]*([0-9]{5,30})".into(),
                    r"No\.?\s*Ref\.?\s*[:\s]*([0-9]{5,30})".into(),
                ],
            ),
        ),
        (
            Field::CouponType,
            FieldPatterns::new(
                true,
                vec![
                    r"Tipo\s*(?:de)?\s*Cup[oó]n[:\s]*([A-Z0-9\-]{1,20})".into(),
                    r"Tipo(?:\s+de)?[:\s]*([A-Z]{1,6})\b".into(),
                ],
            ),
        ),
        (
            Field::ValidUntil,
            FieldPatterns::new(
                false,
                vec![
                    r"V[áa]lido\s+hasta[:\s\-]*([0-9]{1,2}[-/][A-Z0-9]{3,}[-/][0-9]{4}|[0-9]{1,2}[-/][0-9]{1,2}[-/][0-9]{4}|[0-9]{4}[-/][0-9]{2}[-/][0-9]{2})"
                        .into(),
                ],
            ),
        ),
        (
            Field::AmountDue,
            FieldPatterns::new(false, vec![r"Valor\s*a\s*pagar[:\s\-]*([^\n]{1,60})".into()]),
        ),
    ])
}

/// A compiled catalog pattern, optionally narrowed to an anchor block.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    key: String,
    regex: Regex,
    block: Option<Regex>,
}

impl CompiledPattern {
    /// Catalog key, e.g. `digital.Contrato[1]`.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Every captured value in document order.
    ///
    /// The value is capture group 1, or the whole match for group-less
    /// patterns. Block-scoped patterns only search the first block match.
    pub fn captures<'t>(&self, text: &'t str) -> Vec<&'t str> {
        self.located(text).into_iter().map(|(_, value)| value).collect()
    }

    /// Like [`CompiledPattern::captures`], with each value's byte offset in `text`.
    pub fn located<'t>(&self, text: &'t str) -> Vec<(usize, &'t str)> {
        let scope = match &self.block {
            Some(block) => block
                .captures(text)
                .and_then(|caps| caps.get(1).or_else(|| caps.get(0)))
                .map(|m| (m.start(), m.as_str())),
            None => Some((0, text)),
        };

        let Some((base, scope)) = scope else {
            return Vec::new();
        };

        self.regex
            .captures_iter(scope)
            .filter_map(|caps| caps.get(1).or_else(|| caps.get(0)))
            .map(|m| (base + m.start(), m.as_str()))
            .collect()
    }
}

/// Immutable compiled form of a [`PatternCatalog`], built once and shared.
#[derive(Debug, Clone, Default)]
pub struct CompiledCatalog {
    digital: BTreeMap<Field, Vec<CompiledPattern>>,
    scanned: BTreeMap<Field, Vec<CompiledPattern>>,
}

impl CompiledCatalog {
    /// Patterns for a field in declared order; empty when none are configured.
    pub fn patterns(&self, mode: ExtractionMode, field: Field) -> &[CompiledPattern] {
        let table = match mode {
            ExtractionMode::Digital => &self.digital,
            ExtractionMode::Scanned => &self.scanned,
        };
        table.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl PatternCatalog {
    /// Compile every pattern, failing on the first invalid one.
    pub fn compile(&self) -> Result<CompiledCatalog, ExtractionError> {
        let mut blocks = BTreeMap::new();
        for (name, pattern) in &self.blocks {
            let key = format!("blocks.{}", name);
            blocks.insert(name.as_str(), build_regex(&key, pattern, true)?);
        }

        Ok(CompiledCatalog {
            digital: compile_table("digital", &self.digital, &blocks)?,
            scanned: compile_table("scanned", &self.scanned, &blocks)?,
        })
    }
}

fn compile_table(
    pipeline: &str,
    table: &BTreeMap<Field, FieldPatterns>,
    blocks: &BTreeMap<&str, Regex>,
) -> Result<BTreeMap<Field, Vec<CompiledPattern>>, ExtractionError> {
    let mut compiled = BTreeMap::new();

    for (field, entries) in table {
        let mut patterns = Vec::with_capacity(entries.patterns.len());
        for (idx, entry) in entries.patterns.iter().enumerate() {
            let key = format!("{}.{}[{}]", pipeline, field.column(), idx);
            let regex = build_regex(&key, entry.pattern(), entries.dot_all)?;
            let block = match entry.block() {
                Some(name) => Some(blocks.get(name).cloned().ok_or_else(|| {
                    ExtractionError::UnknownBlock {
                        key: key.clone(),
                        block: name.to_string(),
                    }
                })?),
                None => None,
            };
            patterns.push(CompiledPattern { key, regex, block });
        }
        compiled.insert(*field, patterns);
    }

    Ok(compiled)
}

fn build_regex(key: &str, pattern: &str, dot_all: bool) -> Result<Regex, ExtractionError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .dot_matches_new_line(dot_all)
        .build()
        .map_err(|source| ExtractionError::InvalidPattern {
            key: key.to_string(),
            source,
        })
}
