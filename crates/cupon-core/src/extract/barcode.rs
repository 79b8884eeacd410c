//! GS1-128 style barcode line decoding.
//!
//! A barcode line is a run of `(AI)value` groups, e.g.
//! `(415)7709998012345(8020)0012345678(3900)75000(96)20250115`.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::extract::dates::parse_compact;

lazy_static! {
    /// Whole line made of at least two `(AI)value` groups.
    static ref BARCODE_LINE: Regex = Regex::new(
        r"^(?:\(\d{2,4}\)\s*[0-9A-Za-z]+\s*){2,}$"
    ).unwrap();

    static ref AI_ELEMENT: Regex = Regex::new(r"\((\d{2,4})\)\s*([0-9A-Za-z]+)").unwrap();
}

/// Company (GLN) prefix of the collecting entity.
pub const AI_COMPANY: &str = "415";
/// Amount payload.
pub const AI_AMOUNT: &str = "3900";
/// Payment reference payload.
pub const AI_PAYMENT_REFERENCE: &str = "8020";
/// Due date payload, `yyyymmdd`.
pub const AI_DUE_DATE: &str = "96";

/// Identifiers a payment coupon barcode is built from.
pub const KNOWN_AIS: [&str; 4] = [AI_COMPANY, AI_PAYMENT_REFERENCE, AI_AMOUNT, AI_DUE_DATE];

/// One `(AI)value` group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarcodeElement {
    pub ai: String,
    pub value: String,
}

/// A decoded barcode line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Barcode {
    /// Line text as found, trimmed.
    pub raw: String,
    /// Digits and uppercase letters only.
    pub clean: String,
    pub elements: Vec<BarcodeElement>,
    /// Byte range of `raw` in the searched text.
    pub span: (usize, usize),
}

impl Barcode {
    /// Decode a text that is known to hold a barcode, e.g. a catalog match.
    ///
    /// Needs two or more groups, at least one of them a [`KNOWN_AIS`] identifier.
    pub fn parse(raw: &str, offset: usize) -> Option<Barcode> {
        let elements: Vec<BarcodeElement> = AI_ELEMENT
            .captures_iter(raw)
            .map(|caps| BarcodeElement {
                ai: caps[1].to_string(),
                value: caps[2].to_string(),
            })
            .collect();

        if elements.len() < 2 || !elements.iter().any(|e| KNOWN_AIS.contains(&e.ai.as_str())) {
            return None;
        }

        Some(Barcode {
            raw: raw.to_string(),
            clean: clean(raw),
            elements,
            span: (offset, offset + raw.len()),
        })
    }

    /// Payload of the first group with this application identifier.
    pub fn ai(&self, code: &str) -> Option<&str> {
        self.elements
            .iter()
            .find(|e| e.ai == code)
            .map(|e| e.value.as_str())
    }

    /// Integer amount from AI 3900.
    pub fn amount(&self) -> Option<String> {
        let payload = self.numeric(AI_AMOUNT)?;
        let trimmed = payload.trim_start_matches('0');
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    /// Payment reference from AI 8020: leading zeros dropped, six digits or more.
    pub fn payment_reference(&self) -> Option<String> {
        let payload = self.numeric(AI_PAYMENT_REFERENCE)?;
        let trimmed = payload.trim_start_matches('0');
        (trimmed.len() >= 6).then(|| trimmed.to_string())
    }

    /// Due date from AI 96.
    pub fn due_date(&self) -> Option<NaiveDate> {
        parse_compact(self.numeric(AI_DUE_DATE)?)
    }

    fn numeric(&self, code: &str) -> Option<&str> {
        self.ai(code)
            .filter(|v| !v.is_empty() && v.bytes().all(|b| b.is_ascii_digit()))
    }
}

/// Strip everything except ASCII digits and uppercase letters.
pub fn clean(raw: &str) -> String {
    raw.to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
        .collect()
}

/// Find the best-formed barcode line, scanning from the bottom of the text.
///
/// Only a line consisting entirely of bracketed application-identifier
/// groups qualifies; loose digit runs never do.
pub fn decode_barcode(text: &str) -> Option<Barcode> {
    let mut lines = Vec::new();
    let mut offset = 0;
    for line in text.split('\n') {
        lines.push((offset, line));
        offset += line.len() + 1;
    }

    for (offset, line) in lines.into_iter().rev() {
        let trimmed = line.trim();
        if trimmed.is_empty() || !BARCODE_LINE.is_match(trimmed) {
            continue;
        }
        let lead = line.len() - line.trim_start().len();
        if let Some(barcode) = Barcode::parse(trimmed, offset + lead) {
            debug!("Barcode line with {} groups", barcode.elements.len());
            return Some(barcode);
        }
    }
    None
}
