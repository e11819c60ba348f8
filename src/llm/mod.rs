pub mod chat;
use serde::{ Deserialize, Serialize };
use std::str::FromStr;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmType {
    Ollama,
    OpenAI,
    Anthropic,
    Gemini,
    DeepSeek,
    XAI,
    Groq,
}

impl LlmType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmType::Ollama => "ollama",
            LlmType::OpenAI => "openai",
            LlmType::Anthropic => "anthropic",
            LlmType::Gemini => "gemini",
            LlmType::DeepSeek => "deepseek",
            LlmType::XAI => "xai",
            LlmType::Groq => "groq",
        }
    }
}

impl fmt::Display for LlmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseLlmTypeError {
    message: String,
}

impl fmt::Display for ParseLlmTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseLlmTypeError {}
impl FromStr for LlmType {
    type Err = ParseLlmTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(LlmType::Ollama),
            "openai" => Ok(LlmType::OpenAI),
            "anthropic" => Ok(LlmType::Anthropic),
            "gemini" | "google" => Ok(LlmType::Gemini),
            "deepseek" => Ok(LlmType::DeepSeek),
            "xai" => Ok(LlmType::XAI),
            "groq" => Ok(LlmType::Groq),
            _ =>
                Err(ParseLlmTypeError {
                    message: format!("Invalid LLM type: '{}'", s),
                }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub llm_type: LlmType,
    pub api_key: Option<String>,
    pub completion_model: Option<String>,
    pub base_url: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            llm_type: LlmType::Ollama,
            api_key: None,
            completion_model: None,
            base_url: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM configuration error: {0}")]
    Config(String),
    #[error("LLM request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("LLM backend returned status {0}")]
    Status(u16),
    #[error("LLM provider error: {0}")]
    Provider(String),
    #[error("Invalid LLM response: {0}")]
    Decode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_types_case_insensitively() {
        assert_eq!("OpenAI".parse::<LlmType>().unwrap(), LlmType::OpenAI);
        assert_eq!("google".parse::<LlmType>().unwrap(), LlmType::Gemini);
        assert_eq!(LlmType::XAI.to_string(), "xai");
    }

    #[test]
    fn rejects_unknown_type() {
        let err = "gpt".parse::<LlmType>().unwrap_err();
        assert_eq!(err.to_string(), "Invalid LLM type: 'gpt'");
    }
}
