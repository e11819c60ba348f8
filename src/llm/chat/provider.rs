use async_trait::async_trait;
use log::info;
use rllm::builder::{ LLMBackend, LLMBuilder };
use rllm::chat::{ ChatMessage, ChatRole, MessageType };
use rllm::LLMProvider;

use super::ChatClient;
use crate::llm::{ LlmConfig, LlmError, LlmType };
use crate::models::chat::{ LlmMessage, Role };

/// Hosted backends reached through `rllm`. Replies arrive whole.
pub struct RllmChatClient {
    llm: Box<dyn LLMProvider + Send + Sync>,
    llm_type: LlmType,
    model: String,
    base_url: Option<String>,
}

fn backend_for(llm_type: &LlmType) -> LLMBackend {
    match llm_type {
        LlmType::Ollama => LLMBackend::Ollama,
        LlmType::OpenAI => LLMBackend::OpenAI,
        LlmType::Anthropic => LLMBackend::Anthropic,
        LlmType::Gemini => LLMBackend::Google,
        LlmType::DeepSeek => LLMBackend::DeepSeek,
        LlmType::XAI => LLMBackend::XAI,
        LlmType::Groq => LLMBackend::Groq,
    }
}

fn default_model(llm_type: &LlmType) -> &'static str {
    match llm_type {
        LlmType::Ollama => "llama3.1",
        LlmType::OpenAI => "gpt-4o-mini",
        LlmType::Anthropic => "claude-3-5-haiku-latest",
        LlmType::Gemini => "gemini-1.5-flash-latest",
        LlmType::DeepSeek => "deepseek-chat",
        LlmType::XAI => "grok-2-latest",
        LlmType::Groq => "llama-3.1-8b-instant",
    }
}

/// The backends only know user and assistant turns; system text is sent as
/// a leading user turn.
fn to_rllm_messages(messages: &[LlmMessage]) -> Vec<ChatMessage> {
    messages
        .iter()
        .map(|m| ChatMessage {
            role: match m.role {
                Role::Assistant => ChatRole::Assistant,
                Role::User | Role::System => ChatRole::User,
            },
            content: m.content.clone(),
            message_type: MessageType::Text,
        })
        .collect()
}

impl RllmChatClient {
    pub fn new(
        llm_type: LlmType,
        api_key: String,
        model: Option<String>,
        base_url: Option<String>
    ) -> Result<Self, LlmError> {
        let chat_model = model.unwrap_or_else(|| default_model(&llm_type).to_string());

        let mut builder = LLMBuilder::new()
            .backend(backend_for(&llm_type))
            .api_key(api_key)
            .model(&chat_model)
            .stream(false);

        if let Some(url) = &base_url {
            builder = builder.base_url(url);
        }

        let llm = builder.build().map_err(|e| LlmError::Config(e.to_string()))?;

        Ok(Self {
            llm,
            llm_type,
            model: chat_model,
            base_url,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = match (&config.llm_type, &config.api_key) {
            (LlmType::Ollama, key) => key.clone().unwrap_or_default(),
            (_, Some(key)) if !key.is_empty() => key.clone(),
            (other, _) => {
                return Err(LlmError::Config(format!("API key is required for {}", other)));
            }
        };
        Self::new(
            config.llm_type.clone(),
            api_key,
            config.completion_model.clone(),
            config.base_url.clone()
        )
    }
}

#[async_trait]
impl ChatClient for RllmChatClient {
    async fn complete(&self, messages: &[LlmMessage]) -> Result<String, LlmError> {
        info!(
            "RllmChatClient::complete() → backend={} model={} base_url={:?}",
            self.llm_type,
            self.model,
            self.base_url
        );
        let resp = self.llm
            .chat(&to_rllm_messages(messages)).await
            .map_err(|e| LlmError::Provider(e.to_string()))?;
        let text = resp
            .text()
            .map(|s| s.to_string())
            .unwrap_or_else(|| resp.to_string());
        Ok(text)
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_turns_are_sent_as_user_turns() {
        let converted = to_rllm_messages(
            &[
                LlmMessage { role: Role::System, content: "rules".to_string() },
                LlmMessage { role: Role::Assistant, content: "hi".to_string() },
            ]
        );
        assert!(matches!(converted[0].role, ChatRole::User));
        assert!(matches!(converted[1].role, ChatRole::Assistant));
        assert_eq!(converted[0].content, "rules");
    }

    #[test]
    fn hosted_backend_requires_key() {
        let config = LlmConfig {
            llm_type: LlmType::OpenAI,
            ..Default::default()
        };
        assert!(matches!(RllmChatClient::from_config(&config), Err(LlmError::Config(_))));
    }

    #[test]
    fn gemini_maps_to_google_backend() {
        assert!(matches!(backend_for(&LlmType::Gemini), LLMBackend::Google));
    }
}
