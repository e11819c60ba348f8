//! Recognition of the trust-report labels the agent embeds in its markdown.
//!
//! Everything that depends on the literal English labels lives here so the
//! renderer itself only sees typed values.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

pub const SCORE_LABEL: &str = "Overall Trust Score:";
pub const LEVEL_LABEL: &str = "Trust Level:";

static REPORT_SCORE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Overall Trust Score:\s*(\d+\.?\d*)/10").expect("valid score regex")
});
static SCORE_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+\.?\d*)/10").expect("valid score value regex")
});
static REPORT_LEVEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Trust Level:\s*(HIGH|MEDIUM|LOW)").expect("valid level regex")
});

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreConfidence {
    High,
    Medium,
    Low,
}

impl ScoreConfidence {
    /// Thresholds: 7 and up is high, 5 up to 7 is medium, everything else low.
    /// Scores outside 0..=10 are not rejected.
    pub fn classify(score: f64) -> Self {
        if score >= 7.0 {
            ScoreConfidence::High
        } else if score >= 5.0 {
            ScoreConfidence::Medium
        } else {
            ScoreConfidence::Low
        }
    }

    pub fn css_class(&self) -> &'static str {
        match self {
            ScoreConfidence::High => "score-high",
            ScoreConfidence::Medium => "score-medium",
            ScoreConfidence::Low => "score-low",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrustLevel {
    High,
    Medium,
    Low,
}

impl TrustLevel {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "HIGH" => Some(TrustLevel::High),
            "MEDIUM" => Some(TrustLevel::Medium),
            "LOW" => Some(TrustLevel::Low),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrustLevel::High => "HIGH",
            TrustLevel::Medium => "MEDIUM",
            TrustLevel::Low => "LOW",
        }
    }

    pub fn css_class(&self) -> &'static str {
        match self {
            TrustLevel::High => "level-high",
            TrustLevel::Medium => "level-medium",
            TrustLevel::Low => "level-low",
        }
    }
}

/// Score and level found anywhere in a message. Never stored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct TrustReport {
    pub score: Option<f64>,
    pub level: Option<TrustLevel>,
}

impl TrustReport {
    pub fn is_empty(&self) -> bool {
        self.score.is_none() && self.level.is_none()
    }
}

pub fn extract_trust_score(text: &str) -> Option<f64> {
    REPORT_SCORE.captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

pub fn extract_trust_level(text: &str) -> Option<TrustLevel> {
    REPORT_LEVEL.captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| TrustLevel::from_token(m.as_str()))
}

pub fn extract_report(text: &str) -> TrustReport {
    TrustReport {
        score: extract_trust_score(text),
        level: extract_trust_level(text),
    }
}

/// Result of inspecting the flattened text of a bold span.
#[derive(Clone, Debug, PartialEq)]
pub enum StrongField {
    Score {
        score: f64,
        confidence: ScoreConfidence,
    },
    Level {
        level: Option<TrustLevel>,
        label: String,
    },
}

pub fn classify_strong(text: &str) -> Option<StrongField> {
    if let Some(pos) = text.find(SCORE_LABEL) {
        let after = &text[pos + SCORE_LABEL.len()..];
        let score = SCORE_VALUE.captures(after)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok());
        if let Some(score) = score {
            return Some(StrongField::Score {
                score,
                confidence: ScoreConfidence::classify(score),
            });
        }
    }

    if let Some(pos) = text.find(LEVEL_LABEL) {
        let label = text[pos + LEVEL_LABEL.len()..].trim().to_string();
        return Some(StrongField::Level {
            level: TrustLevel::from_token(&label),
            label,
        });
    }

    None
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    KeyFindings,
    RedFlags,
    Recommendation,
    Disclaimer,
}

impl SectionKind {
    pub fn css_class(&self) -> &'static str {
        match self {
            SectionKind::KeyFindings => "section-key-findings",
            SectionKind::RedFlags => "section-red-flags",
            SectionKind::Recommendation => "section-recommendation",
            SectionKind::Disclaimer => "section-disclaimer",
        }
    }

    /// Literal label stripped from the paragraph and shown separately.
    pub fn label(&self) -> Option<&'static str> {
        match self {
            SectionKind::Recommendation => Some("Recommendation:"),
            _ => None,
        }
    }
}

/// First matching marker wins, in the order the report emits them.
pub fn classify_paragraph(text: &str) -> Option<SectionKind> {
    if text.contains("Key Findings:") {
        Some(SectionKind::KeyFindings)
    } else if text.contains("Red Flags Detected:") {
        Some(SectionKind::RedFlags)
    } else if text.contains("Recommendation:") {
        Some(SectionKind::Recommendation)
    } else if text.contains("DISCLAIMER") || text.contains("This analysis is for informational") {
        Some(SectionKind::Disclaimer)
    } else {
        None
    }
}

pub fn is_banner_heading(text: &str) -> bool {
    text.contains("DECRYPTIFY") || text.contains("TRUST SCORE")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_thresholds() {
        assert_eq!(extract_trust_score("Overall Trust Score: 8.5/10"), Some(8.5));
        assert_eq!(ScoreConfidence::classify(8.5), ScoreConfidence::High);
        assert_eq!(ScoreConfidence::classify(7.0), ScoreConfidence::High);
        assert_eq!(ScoreConfidence::classify(6.0), ScoreConfidence::Medium);
        assert_eq!(ScoreConfidence::classify(5.0), ScoreConfidence::Medium);
        assert_eq!(ScoreConfidence::classify(4.0), ScoreConfidence::Low);
    }

    #[test]
    fn out_of_range_scores_still_classify() {
        assert_eq!(extract_trust_score("Overall Trust Score: 12/10"), Some(12.0));
        assert_eq!(ScoreConfidence::classify(12.0), ScoreConfidence::High);
        assert_eq!(ScoreConfidence::classify(-3.0), ScoreConfidence::Low);
    }

    #[test]
    fn score_requires_label_and_denominator() {
        assert_eq!(extract_trust_score("Score: 8/10"), None);
        assert_eq!(extract_trust_score("Overall Trust Score: 8"), None);
        assert_eq!(extract_trust_score("Overall Trust Score:8/10"), Some(8.0));
    }

    #[test]
    fn levels() {
        assert_eq!(extract_trust_level("Trust Level: HIGH"), Some(TrustLevel::High));
        assert_eq!(extract_trust_level("Trust Level: MEDIUM"), Some(TrustLevel::Medium));
        assert_eq!(extract_trust_level("Trust Level: LOW"), Some(TrustLevel::Low));
        assert_eq!(extract_trust_level("Trust Level: unknown"), None);
    }

    #[test]
    fn report_collects_both_fields() {
        let report = extract_report(
            "**Overall Trust Score: 6/10**\n\n**Trust Level: MEDIUM**"
        );
        assert_eq!(report.score, Some(6.0));
        assert_eq!(report.level, Some(TrustLevel::Medium));
        assert!(extract_report("plain text").is_empty());
    }

    #[test]
    fn strong_score_and_level() {
        assert_eq!(
            classify_strong("Overall Trust Score: 4/10"),
            Some(StrongField::Score { score: 4.0, confidence: ScoreConfidence::Low })
        );
        assert_eq!(
            classify_strong("Trust Level: HIGH"),
            Some(StrongField::Level { level: Some(TrustLevel::High), label: "HIGH".into() })
        );
        assert_eq!(
            classify_strong("Trust Level: SPECULATIVE"),
            Some(StrongField::Level { level: None, label: "SPECULATIVE".into() })
        );
        assert_eq!(classify_strong("Overall Trust Score:"), None);
        assert_eq!(classify_strong("Market Cap"), None);
    }

    #[test]
    fn paragraph_markers() {
        assert_eq!(classify_paragraph("Key Findings: solid team"), Some(SectionKind::KeyFindings));
        assert_eq!(classify_paragraph("Red Flags Detected: none"), Some(SectionKind::RedFlags));
        assert_eq!(classify_paragraph("Recommendation: hold"), Some(SectionKind::Recommendation));
        assert_eq!(
            classify_paragraph("This analysis is for informational purposes only."),
            Some(SectionKind::Disclaimer)
        );
        assert_eq!(classify_paragraph("Nothing to see"), None);
    }
}
