//! Date shapes on coupons: the valid-until value and date detection for
//! the amount heuristics.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// dd-MMM-yyyy; the month token may carry OCR digits (`EN0`, `0CT`).
    static ref DATE_ALPHA: Regex = Regex::new(
        r"(?i)\b(\d{1,2})[-/]([A-Z0-9]{0,8}[A-Z][A-Z0-9]{0,8})\.?[-/](\d{4}|\d{2})\b"
    ).unwrap();

    static ref DATE_DMY: Regex = Regex::new(
        r"\b(\d{1,2})[-/](\d{1,2})[-/](\d{4}|\d{2})\b"
    ).unwrap();

    static ref DATE_YMD: Regex = Regex::new(
        r"\b(\d{4})[-/](\d{1,2})[-/](\d{1,2})\b"
    ).unwrap();
}

/// A validated date found in text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateMatch {
    /// Matched text, uppercased, month token repaired.
    pub text: String,
    pub date: NaiveDate,
    pub start: usize,
    pub end: usize,
}

/// Month number for a Spanish or English month token.
///
/// Only the first three letters matter, so `SEPT` and `ENERO` resolve.
pub fn month_from_token(token: &str) -> Option<u32> {
    let fixed = fix_month_token(token);
    if fixed.chars().count() < 3 {
        return None;
    }
    let prefix: String = fixed.chars().take(3).collect();
    let month = match prefix.as_str() {
        "ENE" | "JAN" => 1,
        "FEB" => 2,
        "MAR" => 3,
        "ABR" | "APR" => 4,
        "MAY" => 5,
        "JUN" => 6,
        "JUL" => 7,
        "AGO" | "AUG" => 8,
        "SEP" | "SET" => 9,
        "OCT" => 10,
        "NOV" => 11,
        "DIC" | "DEC" => 12,
        _ => return None,
    };
    Some(month)
}

/// Uppercase a month token and read `0` as `O` when the token is alphabetic.
pub fn fix_month_token(token: &str) -> String {
    let upper = token.to_uppercase();
    if upper.chars().any(|c| c.is_alphabetic()) {
        upper.replace('0', "O")
    } else {
        upper
    }
}

/// All validated dates in document order.
pub fn find_dates(text: &str) -> Vec<DateMatch> {
    let mut found = Vec::new();

    for caps in DATE_ALPHA.captures_iter(text) {
        let whole = &caps[0];
        let Some(month) = month_from_token(&caps[2]) else {
            continue;
        };
        let day: u32 = caps[1].parse().unwrap_or(0);
        let year = parse_year(&caps[3]);
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            let m = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or_default();
            let repaired = whole.replacen(&caps[2], &fix_month_token(&caps[2]), 1);
            found.push(DateMatch {
                text: repaired.to_uppercase(),
                date,
                start: m.0,
                end: m.1,
            });
        }
    }

    for caps in DATE_DMY.captures_iter(text) {
        let day: u32 = caps[1].parse().unwrap_or(0);
        let month: u32 = caps[2].parse().unwrap_or(0);
        let year = parse_year(&caps[3]);
        push_numeric(&mut found, &caps, NaiveDate::from_ymd_opt(year, month, day));
    }

    for caps in DATE_YMD.captures_iter(text) {
        let year: i32 = caps[1].parse().unwrap_or(0);
        let month: u32 = caps[2].parse().unwrap_or(0);
        let day: u32 = caps[3].parse().unwrap_or(0);
        push_numeric(&mut found, &caps, NaiveDate::from_ymd_opt(year, month, day));
    }

    found.sort_by_key(|d| d.start);
    found
}

fn push_numeric(found: &mut Vec<DateMatch>, caps: &regex::Captures<'_>, date: Option<NaiveDate>) {
    let (Some(date), Some(m)) = (date, caps.get(0)) else {
        return;
    };
    if found.iter().any(|d| d.start < m.end() && m.start() < d.end) {
        return;
    }
    found.push(DateMatch {
        text: m.as_str().to_string(),
        date,
        start: m.start(),
        end: m.end(),
    });
}

/// First valid date inside a labelled value.
pub fn canonical_date(value: &str) -> Option<String> {
    find_dates(value).into_iter().next().map(|d| d.text)
}

/// Byte ranges of everything shaped like a date, valid or not.
pub fn date_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans: Vec<(usize, usize)> = [&*DATE_ALPHA, &*DATE_DMY, &*DATE_YMD]
        .iter()
        .flat_map(|re| re.find_iter(text).map(|m| (m.start(), m.end())))
        .collect();
    spans.sort_unstable();
    spans
}

/// Whether an 8-digit run reads as `yyyymmdd` or `ddmmyyyy`.
pub fn is_compact_date(run: &str) -> bool {
    if run.len() != 8 || !run.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    parse_compact(run).is_some() || {
        let (d, m, y) = (&run[..2], &run[2..4], &run[4..]);
        plausible(y.parse().unwrap_or(0), m.parse().unwrap_or(0), d.parse().unwrap_or(0)).is_some()
    }
}

/// Parse a `yyyymmdd` payload such as barcode AI 96.
pub fn parse_compact(run: &str) -> Option<NaiveDate> {
    if run.len() != 8 || !run.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    plausible(run[..4].parse().ok()?, run[4..6].parse().ok()?, run[6..].parse().ok()?)
}

fn plausible(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    if !(1900..=2100).contains(&year) {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

fn parse_year(s: &str) -> i32 {
    let year: i32 = s.parse().unwrap_or(0);
    if s.len() == 2 { 2000 + year } else { year }
}
