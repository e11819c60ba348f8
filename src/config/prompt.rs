use std::fs;
use std::path::Path;
use log::info;
use thiserror::Error;

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are Decryptify, an AI-powered crypto trust assessment system. You help users evaluate \
the trustworthiness of cryptocurrency projects by analyzing various aspects such as security \
audits, tokenomics, team credibility, exchange presence and scam risk.\n\n\
When a user asks about a specific cryptocurrency project, answer with a full trust report. \
For general crypto questions, use your knowledge to provide helpful information.";

const REPORT_TEMPLATE: &str =
    "Produce a trust assessment for the cryptocurrency project \"{project}\" using exactly this layout:\n\n\
**DECRYPTIFY TRUST SCORE REPORT**\n\n\
**Overall Trust Score: [SCORE]/10**\n\
**Trust Level: [HIGH/MEDIUM/LOW]**\n\n\
Key Findings: [two or three sentences]\n\n\
- [finding]\n- [finding]\n\n\
Red Flags Detected: [risks, or \"None identified\"]\n\n\
Recommendation: [one or two sentences]\n\n\
DISCLAIMER: This analysis is for informational purposes only and should not be considered \
financial advice. Cryptocurrency investments carry significant risk.";

const CRYPTO_KEYWORDS: &[&str] = &[
    "bitcoin",
    "btc",
    "ethereum",
    "eth",
    "crypto",
    "coin",
    "token",
    "trust",
    "score",
    "analysis",
    "check",
    "evaluate",
    "assess",
];

// Longest phrases first so "what's the trust score for" wins over "check".
const PROJECT_PHRASES: &[&str] = &[
    "what's the trust score for",
    "what is the trust score of",
    "what is the trust score for",
    "tell me about",
    "analyze",
    "check",
    "evaluate",
    "assess",
];

const MAX_PROJECT_WORDS: usize = 3;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Prompt file IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Prompt file '{0}' is empty")]
    Empty(String),
}

/// Reads the system prompt from `path`, or falls back to the built-in one.
pub fn load_system_prompt(path: Option<&str>) -> Result<String, PromptError> {
    let path = match path {
        Some(p) if !p.trim().is_empty() => p,
        _ => {
            return Ok(DEFAULT_SYSTEM_PROMPT.to_string());
        }
    };
    let content = fs::read_to_string(Path::new(path))?;
    let content = content.trim();
    if content.is_empty() {
        return Err(PromptError::Empty(path.to_string()));
    }
    info!("Loaded system prompt from {}", path);
    Ok(content.to_string())
}

pub fn is_crypto_query(message: &str) -> bool {
    let lower = message.to_lowercase();
    CRYPTO_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Pulls a short project name out of a crypto question such as
/// "Analyze Ethereum" or "What's the trust score for Bitcoin?".
pub fn extract_project_name(message: &str) -> Option<String> {
    if !is_crypto_query(message) {
        return None;
    }
    let lower = message.to_lowercase();
    let mut project = lower.trim().to_string();
    for phrase in PROJECT_PHRASES {
        if let Some(idx) = lower.rfind(phrase) {
            project = lower[idx + phrase.len()..].trim().to_string();
            break;
        }
    }
    let project = project
        .trim_matches(|c: char| matches!(c, '?' | '.' | ',' | '!') || c.is_whitespace())
        .to_string();
    let words = project.split_whitespace().count();
    if words == 0 || words > MAX_PROJECT_WORDS {
        return None;
    }
    Some(project)
}

pub fn report_instruction(project: &str) -> String {
    REPORT_TEMPLATE.replace("{project}", project)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn extracts_project_from_suggestions() {
        assert_eq!(
            extract_project_name("What's the trust score for Bitcoin?"),
            Some("bitcoin".to_string())
        );
        assert_eq!(extract_project_name("Analyze Ethereum"), Some("ethereum".to_string()));
        assert_eq!(extract_project_name("check shiba inu coin!"), Some("shiba inu coin".to_string()));
    }

    #[test]
    fn long_or_unrelated_questions_have_no_project() {
        assert_eq!(extract_project_name("Hello there"), None);
        assert_eq!(
            extract_project_name("Is Dogecoin a good investment for someone saving for retirement?"),
            None
        );
    }

    #[test]
    fn report_instruction_names_project() {
        let text = report_instruction("solana");
        assert!(text.contains("\"solana\""));
        assert!(text.contains("**DECRYPTIFY TRUST SCORE REPORT**"));
        assert!(text.contains("Overall Trust Score: [SCORE]/10"));
    }

    #[test]
    fn prompt_file_overrides_default() {
        assert_eq!(load_system_prompt(None).unwrap(), DEFAULT_SYSTEM_PROMPT);

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "  custom prompt ").unwrap();
        let path = file.path().to_str().unwrap().to_string();
        assert_eq!(load_system_prompt(Some(&path)).unwrap(), "custom prompt");
    }

    #[test]
    fn missing_prompt_file_is_an_error() {
        assert!(matches!(load_system_prompt(Some("/nonexistent/prompt.txt")), Err(PromptError::Io(_))));
    }
}
