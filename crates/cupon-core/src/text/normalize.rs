//! Whitespace, encoding and glyph cleanup applied before any field matching.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref CID_ARTIFACT: Regex = Regex::new(r"\(cid:\d+\)").unwrap();
    static ref HORIZONTAL_WS: Regex = Regex::new(r"[ \t]+").unwrap();
    static ref WS_BEFORE_NEWLINE: Regex = Regex::new(r"\s+\n").unwrap();
    static ref WS_AFTER_NEWLINE: Regex = Regex::new(r"\n\s+").unwrap();
}

/// Carriage-return/line-feed pair emitted literally by some PDF text layers.
const CID_LINE_BREAK: &str = "(cid:13)(cid:10)";

/// Space code points that PDF text layers use in place of U+0020.
const SPECIAL_SPACES: [char; 5] = ['\u{00A0}', '\u{2007}', '\u{2009}', '\u{200A}', '\u{202F}'];

/// Spanish labels as they come out of text layers that lost their accented glyph.
const MISENCODED_TOKENS: [(&str, &str); 6] = [
    ("Identificacin", "Identificación"),
    ("Cupn", "Cupón"),
    ("Lnea", "Línea"),
    ("Direccin", "Dirección"),
    ("Vlido", "Válido"),
    ("Solicitd", "Solicitud"),
];

/// Ordinal indicator spellings, longest first.
const ORDINALS: [&str; 4] = ["N.º", "N.°", "Nº", "N°"];

/// Normalize raw document text.
///
/// Steps run in a fixed order and the result is a fixed point:
/// `normalize(&normalize(s)) == normalize(s)`.
pub fn normalize(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    // (a) line terminators
    let mut text = raw.replace("\r\n", "\n").replace('\r', "\n");

    // (b) PDF artifacts
    text = text.replace(CID_LINE_BREAK, " ");
    while CID_ARTIFACT.is_match(&text) {
        text = CID_ARTIFACT.replace_all(&text, "").into_owned();
    }

    // (c) special spaces
    text = text.replace(SPECIAL_SPACES, " ");

    // (d) mis-encoded tokens
    for (broken, fixed) in MISENCODED_TOKENS {
        text = text.replace(broken, fixed);
    }

    // (e) ordinal indicators; a bare "N" is left alone
    for ordinal in ORDINALS {
        text = text.replace(ordinal, "No.");
    }

    // (f) whitespace
    let text = HORIZONTAL_WS.replace_all(&text, " ");
    let text = WS_BEFORE_NEWLINE.replace_all(&text, "\n");
    WS_AFTER_NEWLINE.replace_all(&text, "\n").into_owned()
}

/// Trim and collapse every whitespace run (newlines included) to one space.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keep ASCII digits only.
pub fn digits_only(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_digit()).collect()
}
