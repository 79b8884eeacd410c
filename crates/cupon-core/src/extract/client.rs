//! Client-name cleaner.
//!
//! Reads the text after a `Cliente` label, consuming at most two
//! continuation lines, and keeps only plausible name tokens.

use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};

use crate::error::ExtractionError;
use crate::extract::rules::FieldContext;

lazy_static! {
    static ref CLIENT_LABEL: Regex = RegexBuilder::new(r"\bCliente\s*[:\-]?")
        .case_insensitive(true)
        .build()
        .unwrap();

    /// Anything that ends the name: role keywords, other field labels and
    /// long digit runs.
    static ref TERMINATOR: Regex = RegexBuilder::new(
        r"\b(?:LEADER|REPRESENTANTE|ASESOR|GERENTE|TITULAR|FIRMA)\b|\bIdentificaci\w*|\bContrato\b|\bDir\b|\bDirecci\w*|\bNo\.|\bNIT\b|\bC\.C\.|\bFAX\b|\bPBX\b|\bTel\b|\d{5,}"
    )
    .case_insensitive(true)
    .build()
    .unwrap();
}

/// Lines read after the label line.
pub const MAX_CONTINUATION_LINES: usize = 2;

/// Naming particles kept regardless of length.
const PARTICLES: [&str; 14] = [
    "DE", "DEL", "LA", "LAS", "LOS", "SAN", "SANTA", "MC", "MAC", "VAN", "VON", "DA", "DOS", "Y",
];

/// Short tokens OCR makes out of rules, borders and stamps.
const ARTIFACTS: [&str; 25] = [
    "II", "LI", "IL", "LL", "TI", "IT", "RN", "NN", "EE", "OO", "UU", "WW", "VV", "XX", "JJ", "IJ",
    "FI", "FL", "ZZ", "QQ", "SS", "III", "LLL", "ILL", "IIL",
];

/// Clean the text that follows a `Cliente` label.
pub fn clean_client_name(after_label: &str) -> Option<String> {
    let mut tokens = Vec::new();

    for line in after_label
        .split('\n')
        .filter(|l| !l.trim().is_empty())
        .take(MAX_CONTINUATION_LINES + 1)
    {
        let (segment, stop) = match TERMINATOR.find(line) {
            Some(m) => (&line[..m.start()], true),
            None => (line, false),
        };
        tokens.extend(name_tokens(segment));
        if stop {
            break;
        }
    }

    // Naming particles survive even at the end of the name.
    while tokens.last().is_some_and(|t| t.chars().count() <= 2 && !is_particle(t)) {
        tokens.pop();
    }

    (!tokens.is_empty()).then(|| tokens.join(" "))
}

/// Clean the name after the first `Cliente` label that yields one.
///
/// `Dir. Cliente` is the address label and is skipped.
pub fn client_after_label(text: &str) -> Option<String> {
    CLIENT_LABEL
        .find_iter(text)
        .filter(|m| !is_address_label(&text[..m.start()]))
        .find_map(|m| clean_client_name(&text[m.end()..]))
}

fn is_address_label(before: &str) -> bool {
    let head = before.trim_end().trim_end_matches('.').to_uppercase();
    head.ends_with("DIR") || head.ends_with("DIRECCIÓN") || head.ends_with("DIRECCION")
}

/// Heuristic: label-anchored client name.
pub fn client_cleaner(ctx: &FieldContext<'_>) -> Result<Option<String>, ExtractionError> {
    Ok(client_after_label(ctx.text).and_then(|name| ctx.accept(&name)))
}

fn name_tokens(segment: &str) -> Vec<String> {
    segment
        .split(|c: char| !c.is_alphabetic())
        .filter(|t| !t.is_empty())
        .map(str::to_uppercase)
        .filter(|t| t.chars().count() > 1 || is_particle(t))
        .filter(|t| !ARTIFACTS.contains(&t.as_str()))
        .collect()
}

fn is_particle(token: &str) -> bool {
    PARTICLES.contains(&token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn name(s: &str) -> Option<String> {
        client_after_label(s)
    }

    #[test]
    fn test_single_line() {
        assert_eq!(
            name("Cliente: JUAN PEREZ GOMEZ Identificacion: 123456789"),
            Some("JUAN PEREZ GOMEZ".to_string())
        );
    }

    #[test]
    fn test_continuation_lines() {
        let text = "Cliente: MARIA DE LOS\nANGELES RUIZ\nGARCIA\nCOMERCIAL NORTE";
        assert_eq!(name(text), Some("MARIA DE LOS ANGELES RUIZ GARCIA".to_string()));
    }

    #[test]
    fn test_role_keyword_stops_with_prefix() {
        let text = "Cliente:\nCARLOS\nANDRES LEADER COMERCIAL\nOTRA LINEA";
        assert_eq!(name(text), Some("CARLOS ANDRES".to_string()));
    }

    #[test]
    fn test_digit_run_stops() {
        let text = "Cliente: PEDRO\nPABLO 3001234567 MARMOL\nSIGUE";
        assert_eq!(name(text), Some("PEDRO PABLO".to_string()));
    }

    #[test]
    fn test_artifacts_and_single_letters_dropped() {
        let text = "Cliente: | II ANA l Y RN SOFIA DE\nContrato: 998877";
        assert_eq!(name(text), Some("ANA Y SOFIA DE".to_string()));
    }

    #[test]
    fn test_trailing_short_tokens_trimmed() {
        assert_eq!(name("Cliente: LUISA FERNANDA OP"), Some("LUISA FERNANDA".to_string()));
        assert_eq!(name("Cliente: DIEGO SAN"), Some("DIEGO SAN".to_string()));
    }

    #[test]
    fn test_trailing_particles_kept() {
        assert_eq!(name("Cliente: CAMILA ROJAS DE
Contrato 998877"), Some("CAMILA ROJAS DE".to_string()));
        assert_eq!(name("Cliente: PAULA Y OP"), Some("PAULA Y".to_string()));
    }

    #[test]
    fn test_lowercase_label_and_accents() {
        assert_eq!(name("cliente - josé núñez"), Some("JOSÉ NÚÑEZ".to_string()));
    }

    #[test]
    fn test_address_label_skipped() {
        let text = "Dir. Cliente: CALLE 10 SUR\nCliente: ROSA PARDO Contrato 1";
        assert_eq!(name(text), Some("ROSA PARDO".to_string()));
    }

    #[test]
    fn test_no_name() {
        assert_eq!(name("Cliente: 123456789"), None);
        assert_eq!(name("Sin datos"), None);
        assert_eq!(name(""), None);
    }
}
