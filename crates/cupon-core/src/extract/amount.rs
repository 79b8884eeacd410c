//! Amount-due heuristics.
//!
//! Stages, first success wins: currency-marked amount, labelled amount
//! (catalog `ValorAPagar` patterns), amount near a `Total` label, barcode AI
//! 3900, then any remaining digit run that is not a date, a year or another
//! field's value. The fractional part is dropped: `$20,000.00` is `20000`.

use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};
use tracing::trace;

use crate::error::ExtractionError;
use crate::extract::dates::{date_spans, is_compact_date};
use crate::extract::rules::FieldContext;
use crate::models::record::{ExtractionMode, FieldKind, FieldValue};
use crate::text::normalize::digits_only;

lazy_static! {
    /// Thousands-tolerant amount; group 1 is the integer part.
    static ref AMOUNT: Regex = Regex::new(
        r"(\d{1,3}(?:[.,]\d{3})+|\d+)(?:[.,]\d{1,2})?(?:\D|$)"
    ).unwrap();

    static ref CURRENCY_MARK: Regex = Regex::new(r"\$").unwrap();

    static ref TOTAL_KEYWORDS: Vec<Regex> = [r"\bTotal\s+Efectivo", r"\bTotal\s+Cheques", r"\bTotal\b"]
        .iter()
        .map(|p| RegexBuilder::new(p).case_insensitive(true).build().unwrap())
        .collect();
}

/// Characters searched before a `Total` keyword.
pub const TOTAL_WINDOW_BEFORE: usize = 40;
/// Characters searched from a `Total` keyword onwards.
pub const TOTAL_WINDOW_AFTER: usize = 80;

/// Characters read after a currency sign.
const CURRENCY_REGION: usize = 32;

/// An amount candidate and its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmountMatch {
    /// Integer part, digits only.
    pub digits: String,
    pub start: usize,
    pub end: usize,
}

/// Every amount shape in the text, in document order.
pub fn amounts(text: &str) -> Vec<AmountMatch> {
    AMOUNT
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| AmountMatch {
            digits: digits_only(m.as_str()),
            start: m.start(),
            end: m.end(),
        })
        .filter(|a| !a.digits.is_empty())
        .collect()
}

/// Amounts that do not start inside a date shape.
pub fn amounts_outside_dates(text: &str) -> Vec<AmountMatch> {
    let spans = date_spans(text);
    amounts(text)
        .into_iter()
        .filter(|a| !in_spans(&spans, a.start))
        .collect()
}

/// Integer part of an amount at the very start of the text.
pub fn leading_amount(text: &str) -> Option<String> {
    let trimmed = text.trim_start();
    let offset = text.len() - trimmed.len();
    amounts_outside_dates(text)
        .into_iter()
        .next()
        .filter(|a| a.start == offset)
        .map(|a| a.digits)
}

/// Read an OCR-garbled numeric region.
///
/// Confusable letters are mapped to digits (`O/o/Q→0`, `I/l/i→1`, `S/s→5`,
/// `Z/z→2`, `B/b→8`), stray `K/X` are dropped and the longest amount of at
/// least three digits wins. Only meant for regions already known to hold a
/// number; on body text it would invent digits.
pub fn correct_confusions(region: &str) -> Option<String> {
    let masked = mask_dates(region);
    let mapped: String = masked
        .chars()
        .filter_map(|c| match c {
            'O' | 'o' | 'Q' => Some('0'),
            'I' | 'l' | 'i' => Some('1'),
            'S' | 's' => Some('5'),
            'Z' | 'z' => Some('2'),
            'B' | 'b' => Some('8'),
            'K' | 'k' | 'X' | 'x' => None,
            c => Some(c),
        })
        .collect();

    let mut best: Option<String> = None;
    for candidate in amounts(&mapped) {
        if candidate.digits.len() >= 3
            && best.as_ref().is_none_or(|b| candidate.digits.len() > b.len())
        {
            best = Some(candidate.digits);
        }
    }
    best
}

/// Normalize a candidate amount text to digits, or NOT_FOUND.
pub fn normalize_amount(candidate: &str) -> FieldValue {
    let value = currency_amount(candidate, ExtractionMode::Digital).or_else(|| {
        let plain = amounts_outside_dates(candidate).into_iter().next().map(|a| a.digits);
        match plain {
            Some(digits) if digits.len() >= 3 => Some(digits),
            plain => correct_confusions(candidate).or(plain),
        }
    });
    FieldValue::normalized(FieldKind::Digits, value.as_deref().unwrap_or(""))
}

/// First currency-marked amount.
fn currency_amount(text: &str, mode: ExtractionMode) -> Option<String> {
    CURRENCY_MARK.find_iter(text).find_map(|m| {
        let region = line_tail(text, m.end(), CURRENCY_REGION);
        match mode {
            ExtractionMode::Digital => leading_amount(region),
            ExtractionMode::Scanned => correct_confusions(region),
        }
    })
}

/// Stage 1: amount preceded by a currency sign.
pub fn currency_stage(ctx: &FieldContext<'_>) -> Result<Option<String>, ExtractionError> {
    Ok(currency_amount(ctx.text, ctx.mode).and_then(|v| ctx.normalize(&v)))
}

/// Stage 2 refinement: the region captured after the "Valor a pagar" label.
pub fn labelled_region(region: &str, ctx: &FieldContext<'_>) -> Option<String> {
    match ctx.mode {
        ExtractionMode::Digital => amounts_outside_dates(region).into_iter().next().map(|a| a.digits),
        ExtractionMode::Scanned => correct_confusions(region),
    }
}

/// Stage 3: first amount within the window around a `Total` keyword.
pub fn total_window_stage(ctx: &FieldContext<'_>) -> Result<Option<String>, ExtractionError> {
    for keyword in TOTAL_KEYWORDS.iter() {
        let Some(m) = keyword.find(ctx.text) else {
            continue;
        };
        let (start, end) = char_window(ctx.text, m.start(), TOTAL_WINDOW_BEFORE, TOTAL_WINDOW_AFTER);
        let window = &ctx.text[start..end];
        if let Some(value) = amounts_outside_dates(window)
            .into_iter()
            .find_map(|a| ctx.normalize(&a.digits))
        {
            return Ok(Some(value));
        }
    }
    Ok(None)
}

/// Stage 4: barcode AI 3900 payload.
pub fn barcode_stage(ctx: &FieldContext<'_>) -> Result<Option<String>, ExtractionError> {
    Ok(ctx
        .barcode
        .and_then(|b| b.amount())
        .and_then(|v| ctx.normalize(&v)))
}

/// Stage 5: first digit run of three or more that is nothing else.
///
/// The only amount stage that rejects values already resolved for any
/// other field.
pub fn last_resort_stage(ctx: &FieldContext<'_>) -> Result<Option<String>, ExtractionError> {
    let spans = date_spans(ctx.text);
    let barcode_span = ctx.barcode.map(|b| b.span);

    for candidate in amounts(ctx.text) {
        let digits = &candidate.digits;
        if digits.len() < 3
            || is_bare_year(digits)
            || is_compact_date(digits)
            || in_spans(&spans, candidate.start)
            || barcode_span.is_some_and(|(s, e)| candidate.start >= s && candidate.start < e)
        {
            continue;
        }
        if let Some(owner) = ctx.resolved.owner_of(digits) {
            trace!("Amount candidate {} already resolved as {}", digits, owner);
            continue;
        }
        if let Some(value) = ctx.normalize(digits) {
            return Ok(Some(value));
        }
    }
    Ok(None)
}

fn is_bare_year(digits: &str) -> bool {
    digits.len() == 4 && digits.parse::<u32>().is_ok_and(|y| (1900..=2100).contains(&y))
}

fn in_spans(spans: &[(usize, usize)], pos: usize) -> bool {
    spans.iter().any(|(s, e)| pos >= *s && pos < *e)
}

/// Replace date shapes with a separator so no amount starts inside one.
fn mask_dates(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for (start, end) in date_spans(text) {
        if start < last {
            continue;
        }
        out.push_str(&text[last..start]);
        out.push('|');
        last = end;
    }
    out.push_str(&text[last..]);
    out
}

/// At most `limit` characters after `pos`, stopping at the end of the line.
fn line_tail(text: &str, pos: usize, limit: usize) -> &str {
    let rest = &text[pos..];
    let line = rest.split('\n').next().unwrap_or("");
    match line.char_indices().nth(limit) {
        Some((idx, _)) => &line[..idx],
        None => line,
    }
}

/// Byte range of `before` characters ahead of `pos` and `after` from it.
fn char_window(text: &str, pos: usize, before: usize, after: usize) -> (usize, usize) {
    let start = text[..pos]
        .char_indices()
        .rev()
        .nth(before.saturating_sub(1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    let end = text[pos..]
        .char_indices()
        .nth(after)
        .map(|(i, _)| pos + i)
        .unwrap_or(text.len());
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::barcode::decode_barcode;
    use crate::extract::disambiguate::Resolved;
    use crate::models::record::Field;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn ctx<'a>(text: &'a str, resolved: &'a Resolved, mode: ExtractionMode) -> FieldContext<'a> {
        FieldContext {
            field: Field::AmountDue,
            mode,
            text,
            resolved,
            barcode: None,
        }
    }

    #[test]
    fn test_amount_shapes() {
        assert_eq!(leading_amount("20,000.00"), Some("20000".to_string()));
        assert_eq!(leading_amount(" 1.234.567,89 COP"), Some("1234567".to_string()));
        assert_eq!(leading_amount("20000.50"), Some("20000".to_string()));
        assert_eq!(leading_amount("20.000COP"), Some("20000".to_string()));
        assert_eq!(leading_amount("COP 20.000"), None);
        assert_eq!(leading_amount("15-ENE-2025"), None);
    }

    #[test]
    fn test_normalize_amount() {
        assert_eq!(normalize_amount("Valor a pagar: $20,000.00"), FieldValue::Found("20000".to_string()));
        assert_eq!(normalize_amount("2O.OOO"), FieldValue::Found("20000".to_string()));
        assert_eq!(normalize_amount("Total 135.400"), FieldValue::Found("135400".to_string()));
        assert_eq!(normalize_amount("15-ENE-2025"), FieldValue::NotFound);
        assert_eq!(normalize_amount("sin valor"), FieldValue::NotFound);
        assert_eq!(normalize_amount(""), FieldValue::NotFound);
    }

    #[test]
    fn test_confusion_prepass() {
        assert_eq!(correct_confusions("$ 5O.OOO"), Some("50000".to_string()));
        assert_eq!(correct_confusions("K1S0.000"), Some("150000".to_string()));
        assert_eq!(correct_confusions("B,5OO"), Some("8500".to_string()));
        assert_eq!(correct_confusions("O1"), None);
        assert_eq!(correct_confusions("15-ENE-2025"), None);
    }

    #[test]
    fn test_currency_beats_total() {
        let resolved = Resolved::default();
        let text = "Total Efectivo 99.000\nValor a pagar: $20.000";
        let c = ctx(text, &resolved, ExtractionMode::Digital);
        assert_eq!(currency_stage(&c).unwrap(), Some("20000".to_string()));
        assert_eq!(total_window_stage(&c).unwrap(), Some("99000".to_string()));
    }

    #[test]
    fn test_scanned_currency_uses_prepass() {
        let resolved = Resolved::default();
        let c = ctx("Valor $ 2O.OOO", &resolved, ExtractionMode::Scanned);
        assert_eq!(currency_stage(&c).unwrap(), Some("20000".to_string()));
        // Digital text is read literally.
        let c = ctx("Valor $ 2O.OOO", &resolved, ExtractionMode::Digital);
        assert_eq!(currency_stage(&c).unwrap(), Some("2".to_string()));
    }

    #[test]
    fn test_labelled_rejects_dates() {
        let resolved = Resolved::default();
        let c = ctx("", &resolved, ExtractionMode::Digital);
        assert_eq!(labelled_region("15-ENE-2025", &c), None);
        assert_eq!(labelled_region("15/01/2025 45.000", &c), Some("45000".to_string()));
    }

    #[test]
    fn test_total_window_takes_first_amount() {
        let mut resolved = Resolved::default();
        resolved.insert(Field::Contract, "54300");
        let text = "Sucursal Centro\nTotal Efectivo 54.300";
        let c = ctx(text, &resolved, ExtractionMode::Digital);
        assert_eq!(total_window_stage(&c).unwrap(), Some("54300".to_string()));
    }

    #[test]
    fn test_last_resort_filters() {
        let mut resolved = Resolved::default();
        resolved.insert(Field::Identification, "123456789");
        resolved.insert(Field::RequestNumber, "7654321");
        let text = "Vence 15-ENE-2025 año 2025 fecha 20250115 id 123456789 sol 7654321 monto 87000";
        let c = ctx(text, &resolved, ExtractionMode::Digital);
        assert_eq!(last_resort_stage(&c).unwrap(), Some("87000".to_string()));
    }

    #[test]
    fn test_barcode_stage_and_last_resort_skip_barcode() {
        let resolved = Resolved::default();
        let text = "(415)123(8020)456(3900)75000(96)12345678";
        let barcode = decode_barcode(text);
        let c = FieldContext {
            barcode: barcode.as_ref(),
            ..ctx(text, &resolved, ExtractionMode::Digital)
        };
        assert_eq!(barcode_stage(&c).unwrap(), Some("75000".to_string()));
        assert_eq!(last_resort_stage(&c).unwrap(), None);
    }

    #[test]
    fn test_char_window_on_multibyte() {
        let text = "ñññ Total ñ 100";
        let pos = text.find("Total").unwrap();
        let (start, end) = char_window(text, pos, 2, 9);
        assert_eq!(&text[start..end], "ñ Total ñ 1");
    }

    proptest! {
        /// Property: normalized amounts are digits only
        #[test]
        fn normalize_amount_is_digits_only(s in "\\PC{0,40}") {
            if let FieldValue::Found(v) = normalize_amount(&s) {
                prop_assert!(v.chars().all(|c| c.is_ascii_digit()));
            }
        }

        /// Property: a date shape is never read as an amount
        #[test]
        fn date_never_becomes_amount(d in 1u32..=28, m in 0usize..12, y in 2000u32..2100) {
            let months = ["ENE", "FEB", "MAR", "ABR", "MAY", "JUN", "JUL", "AGO", "SEP", "OCT", "NOV", "DIC"];
            let date = format!("{:02}-{}-{}", d, months[m], y);
            prop_assert_eq!(normalize_amount(&date), FieldValue::NotFound);
        }
    }
}
