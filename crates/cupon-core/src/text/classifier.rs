//! Text-quality classification: digital text layer vs OCR output.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::models::config::ClassifierConfig;
use crate::models::record::ExtractionMode;

lazy_static! {
    /// Digits run together with capital letters, e.g. `12AB3`.
    static ref ARTIFACT_TOKEN: Regex = Regex::new(r"\b\d+[A-Z]+\d*\b").unwrap();
}

/// Line and token counts behind a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextStats {
    pub lines: usize,
    pub short_lines: usize,
    pub tokens: usize,
    pub artifact_tokens: usize,
}

impl TextStats {
    pub fn short_line_ratio(&self) -> f64 {
        if self.lines == 0 {
            0.0
        } else {
            self.short_lines as f64 / self.lines as f64
        }
    }

    pub fn artifact_ratio(&self) -> f64 {
        if self.tokens == 0 {
            0.0
        } else {
            self.artifact_tokens as f64 / self.tokens as f64
        }
    }
}

/// Stateless classifier selecting the extraction pipeline.
#[derive(Debug, Clone, Default)]
pub struct TextQualityClassifier {
    config: ClassifierConfig,
}

impl TextQualityClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// Count short lines and artifact tokens.
    pub fn stats(&self, text: &str) -> TextStats {
        let mut stats = TextStats::default();
        for line in text.split('\n') {
            stats.lines += 1;
            if line.trim().chars().count() < self.config.min_line_length {
                stats.short_lines += 1;
            }
        }
        stats.tokens = text.split_whitespace().count();
        stats.artifact_tokens = ARTIFACT_TOKEN.find_iter(text).count();
        stats
    }

    /// Empty text is digital: the standard pipeline then resolves nothing.
    pub fn classify(&self, text: &str) -> ExtractionMode {
        if text.is_empty() {
            return ExtractionMode::Digital;
        }

        let stats = self.stats(text);
        let mode = if stats.short_line_ratio() > self.config.short_line_ratio
            || stats.artifact_ratio() > self.config.artifact_ratio
        {
            ExtractionMode::Scanned
        } else {
            ExtractionMode::Digital
        };

        debug!(
            "Classified text as {:?}: {}/{} short lines, {}/{} artifact tokens",
            mode, stats.short_lines, stats.lines, stats.artifact_tokens, stats.tokens
        );
        mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_is_digital() {
        let classifier = TextQualityClassifier::default();
        assert_eq!(classifier.classify(""), ExtractionMode::Digital);
    }

    #[test]
    fn test_short_lines_are_scanned() {
        let classifier = TextQualityClassifier::default();
        let text = "Cliente\nJUAN\nPEREZ\nValor\n$ 20.000\nNG";
        assert_eq!(classifier.classify(text), ExtractionMode::Scanned);
    }

    #[test]
    fn test_artifact_tokens_are_scanned() {
        let classifier = TextQualityClassifier::default();
        let text = "Contrato 99B877 Identificacion 12O45 67SS8 valor a pagar total";
        let stats = classifier.stats(text);
        assert_eq!(stats.artifact_tokens, 3);
        assert_eq!(classifier.classify(text), ExtractionMode::Scanned);
    }

    #[test]
    fn test_plain_digit_runs_are_not_artifacts() {
        let classifier = TextQualityClassifier::default();
        let stats = classifier.stats("Contrato 998877 Identificacion 12345 ref 99B877 valor 20.000");
        assert_eq!(stats.artifact_tokens, 1);
    }

    #[test]
    fn test_clean_layout_is_digital() {
        let classifier = TextQualityClassifier::default();
        let text = "Cliente: JUAN PEREZ GOMEZ Identificacion: 123456789\nContrato 998877 No. Solicitud 5551234";
        assert_eq!(classifier.classify(text), ExtractionMode::Digital);
    }
}
