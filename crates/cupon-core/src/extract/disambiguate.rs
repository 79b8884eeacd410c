//! Cross-field exclusion for numeric candidates.
//!
//! One number on a coupon can look like a contract, a reference or a
//! customer id. Fields are resolved in a fixed dependency order and a
//! candidate equal (digit for digit) to an already-resolved field it may be
//! confused with is rejected, so the chain falls through to the next one.

use std::collections::BTreeMap;

use crate::models::record::Field;
use crate::text::normalize::digits_only;

/// Values resolved so far for one record. Never shared between documents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolved {
    values: BTreeMap<Field, String>,
}

impl Resolved {
    pub fn get(&self, field: Field) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    pub fn insert(&mut self, field: Field, value: impl Into<String>) {
        self.values.insert(field, value.into());
    }

    /// Any resolved field holding `candidate`, digit for digit.
    pub fn owner_of(&self, candidate: &str) -> Option<Field> {
        let digits = digits_only(candidate);
        if digits.is_empty() {
            return None;
        }
        self.values
            .iter()
            .find(|(_, v)| digits_only(v) == digits)
            .map(|(field, _)| *field)
    }
}

/// Fields whose resolved value a candidate for `field` must not repeat.
pub fn exclusions(field: Field) -> &'static [Field] {
    match field {
        Field::RequestNumber => &[
            Field::Identification,
            Field::Contract,
            Field::PaymentReferenceNumber,
        ],
        Field::PaymentReferenceNumber => &[Field::Identification],
        _ => &[],
    }
}

/// The resolved field a candidate collides with, if any.
pub fn collides(resolved: &Resolved, field: Field, candidate: &str) -> Option<Field> {
    let digits = digits_only(candidate);
    if digits.is_empty() {
        return None;
    }
    exclusions(field)
        .iter()
        .copied()
        .find(|other| resolved.get(*other).is_some_and(|v| digits_only(v) == digits))
}

/// A numeric candidate and its byte offset in the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub value: String,
    pub start: usize,
}

/// Candidate closest to the anchor; equal distances go to the earlier one.
pub fn nearest_to_anchor(candidates: &[Candidate], anchor: usize) -> Option<&Candidate> {
    candidates
        .iter()
        .min_by_key(|c| (c.start.abs_diff(anchor), c.start))
}
