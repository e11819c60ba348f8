use crate::history::{ initialize_history_store, HistoryStore, StoreError };
use crate::cli::Args;
use crate::config::prompt::{ extract_project_name, load_system_prompt, report_instruction };
use crate::llm::{ LlmConfig, LlmError };
use crate::llm::chat::{ ChatClient, TokenStream, new_client as new_chat_client };
use crate::models::chat::{ ApiMessage, LlmMessage, Role };

use log::{ info, warn, error };
use std::error::Error;
use std::sync::Arc;
use thiserror::Error;

/// Number of stored turns sent to the model with each new message.
const HISTORY_FOR_PROMPT_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Llm(#[from] LlmError),
}

#[derive(Clone)]
pub struct TrustAgent {
    chat_client: Arc<dyn ChatClient>,
    history_store: Arc<dyn HistoryStore>,
    system_prompt: String,
}

impl TrustAgent {
    fn initialize_chat_client(args: &Args) -> Result<Arc<dyn ChatClient>, Box<dyn Error + Send + Sync>> {
        let chat_api_key = if !args.chat_api_key.is_empty() {
            Some(args.chat_api_key.clone())
        } else {
            None
        };
        let chat_config = LlmConfig {
            llm_type: args.chat_llm_type.parse()?,
            base_url: args.chat_base_url.clone(),
            api_key: chat_api_key,
            completion_model: args.chat_model.clone(),
        };
        let chat_client = new_chat_client(&chat_config)?;
        info!(
            "Chat client configured: Type={}, Model={}, BaseURL={}",
            args.chat_llm_type,
            chat_client.get_model(),
            chat_config.base_url.as_deref().unwrap_or("adapter default")
        );
        Ok(chat_client)
    }

    pub async fn new(args: Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let chat_client = Self::initialize_chat_client(&args)?;
        let history_store = initialize_history_store(&args)?;
        let system_prompt = load_system_prompt(args.system_prompt_path.as_deref())?;
        Ok(Self::with_parts(chat_client, history_store, system_prompt))
    }

    pub fn with_parts(
        chat_client: Arc<dyn ChatClient>,
        history_store: Arc<dyn HistoryStore>,
        system_prompt: impl Into<String>
    ) -> Self {
        Self {
            chat_client,
            history_store,
            system_prompt: system_prompt.into(),
        }
    }

    pub fn model(&self) -> String {
        self.chat_client.get_model()
    }

    /// Stores the opening message, answers it, and returns the new chat id.
    pub async fn create_chat(
        &self,
        user_id: Option<&str>,
        initial_message: &str
    ) -> Result<String, AgentError> {
        let user_message = ApiMessage::new(Role::User, initial_message);
        let chat_id = self.history_store.create_session(user_id, &user_message).await?;
        info!("Created chat {} for user {:?}", chat_id, user_id);

        let reply = self.respond(&[user_message]).await;
        self.history_store.add_message(&chat_id, &reply).await?;
        Ok(chat_id)
    }

    pub async fn send_message(&self, chat_id: &str, message: &str) -> Result<ApiMessage, AgentError> {
        let mut history = self.history_store.get_conversation(chat_id).await?.messages;
        let user_message = ApiMessage::new(Role::User, message);
        self.history_store.add_message(chat_id, &user_message).await?;
        history.push(user_message);

        let reply = self.respond(&history).await;
        if let Err(e) = self.history_store.add_message(chat_id, &reply).await {
            warn!("History write (assistant) failed: {}", e);
            return Err(e.into());
        }
        Ok(reply)
    }

    pub async fn history(&self, chat_id: &str) -> Result<Vec<ApiMessage>, AgentError> {
        Ok(self.history_store.get_conversation(chat_id).await?.messages)
    }

    /// Stateless completion over caller-supplied messages.
    pub async fn complete(&self, messages: &[LlmMessage]) -> Result<String, AgentError> {
        let prompt = self.build_prompt(messages);
        Ok(self.chat_client.complete(&prompt).await?)
    }

    pub async fn stream(&self, messages: &[LlmMessage]) -> Result<TokenStream, AgentError> {
        let prompt = self.build_prompt(messages);
        Ok(self.chat_client.complete_stream(&prompt).await?)
    }

    /// Model failures become an assistant message instead of an error, so
    /// the user turn already stored still gets an answer.
    async fn respond(&self, history: &[ApiMessage]) -> ApiMessage {
        let start = history.len().saturating_sub(HISTORY_FOR_PROMPT_LEN);
        let turns: Vec<LlmMessage> = history[start..].iter().map(LlmMessage::from).collect();
        let prompt = self.build_prompt(&turns);

        match self.chat_client.complete(&prompt).await {
            Ok(text) => ApiMessage::new(Role::Assistant, text),
            Err(e) => {
                error!("LLM interaction error: {}", e);
                ApiMessage::new(
                    Role::Assistant,
                    format!("I encountered an error processing your request: {}. Please try again.", e)
                )
            }
        }
    }

    /// System prompt first, then the conversation. A short crypto question
    /// naming a project also gets the trust report layout as an instruction.
    fn build_prompt(&self, turns: &[LlmMessage]) -> Vec<LlmMessage> {
        let mut prompt = Vec::with_capacity(turns.len() + 2);
        prompt.push(LlmMessage {
            role: Role::System,
            content: self.system_prompt.clone(),
        });
        prompt.extend(turns.iter().filter(|m| m.role != Role::System).cloned());

        let project = turns
            .last()
            .filter(|m| m.role == Role::User)
            .and_then(|m| extract_project_name(&m.content));
        if let Some(project) = project {
            info!("Requesting trust report for '{}'", project);
            prompt.push(LlmMessage {
                role: Role::System,
                content: report_instruction(&project),
            });
        }
        prompt
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::history::MemoryHistoryStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Answers with a fixed reply and remembers every prompt it was sent.
    /// With `stream_failure` set, streaming yields the reply as one token
    /// and then fails.
    pub(crate) struct ScriptedClient {
        pub reply: Result<String, String>,
        pub stream_failure: Option<String>,
        pub prompts: Mutex<Vec<Vec<LlmMessage>>>,
    }

    impl ScriptedClient {
        pub fn replying(reply: &str) -> Self {
            Self { reply: Ok(reply.to_string()), stream_failure: None, prompts: Mutex::new(Vec::new()) }
        }

        pub fn failing(reason: &str) -> Self {
            Self { reply: Err(reason.to_string()), stream_failure: None, prompts: Mutex::new(Vec::new()) }
        }

        pub fn breaking_after(token: &str, reason: &str) -> Self {
            Self {
                stream_failure: Some(reason.to_string()),
                ..Self::replying(token)
            }
        }
    }

    #[async_trait]
    impl ChatClient for ScriptedClient {
        async fn complete(&self, messages: &[LlmMessage]) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(messages.to_vec());
            self.reply.clone().map_err(LlmError::Provider)
        }

        async fn complete_stream(&self, messages: &[LlmMessage]) -> Result<TokenStream, LlmError> {
            let reply = self.complete(messages).await?;
            let failure = self.stream_failure.clone();
            let mut items = vec![Ok(reply)];
            if let Some(reason) = failure {
                items.push(Err(LlmError::Provider(reason)));
            }
            Ok(Box::pin(futures::stream::iter(items)))
        }

        fn get_model(&self) -> String {
            "scripted".to_string()
        }
    }

    fn agent(client: Arc<ScriptedClient>) -> TrustAgent {
        TrustAgent::with_parts(client, Arc::new(MemoryHistoryStore::new()), "SYSTEM")
    }

    #[tokio::test]
    async fn create_chat_stores_both_turns() {
        let client = Arc::new(ScriptedClient::replying("Hi!"));
        let agent = agent(client.clone());
        let id = agent.create_chat(Some("u1"), "Hello").await.unwrap();

        let history = agent.history(&id).await.unwrap();
        let turns: Vec<(Role, &str)> = history
            .iter()
            .map(|m| (m.role, m.content.as_str()))
            .collect();
        assert_eq!(turns, vec![(Role::User, "Hello"), (Role::Assistant, "Hi!")]);

        let prompts = client.prompts.lock().unwrap();
        assert_eq!(prompts[0][0].role, Role::System);
        assert_eq!(prompts[0][0].content, "SYSTEM");
    }

    #[tokio::test]
    async fn send_message_includes_prior_turns() {
        let client = Arc::new(ScriptedClient::replying("ok"));
        let agent = agent(client.clone());
        let id = agent.create_chat(None, "Hello").await.unwrap();
        let reply = agent.send_message(&id, "And again").await.unwrap();
        assert_eq!(reply.role, Role::Assistant);
        assert_eq!(agent.history(&id).await.unwrap().len(), 4);

        let prompts = client.prompts.lock().unwrap();
        let contents: Vec<&str> = prompts[1]
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, vec!["SYSTEM", "Hello", "ok", "And again"]);
    }

    #[tokio::test]
    async fn send_to_unknown_chat_is_not_found() {
        let agent = agent(Arc::new(ScriptedClient::replying("ok")));
        let result = agent.send_message("missing", "hi").await;
        assert!(matches!(result, Err(AgentError::Store(StoreError::NotFound(_)))));
    }

    #[tokio::test]
    async fn model_failure_becomes_apology_reply() {
        let agent = agent(Arc::new(ScriptedClient::failing("quota")));
        let id = agent.create_chat(None, "Hello").await.unwrap();
        let history = agent.history(&id).await.unwrap();
        assert!(history[1].content.starts_with("I encountered an error processing your request"));
        assert!(history[1].content.contains("quota"));
    }

    #[tokio::test]
    async fn project_question_adds_report_instruction() {
        let client = Arc::new(ScriptedClient::replying("report"));
        let agent = agent(client.clone());
        agent.create_chat(None, "Analyze Ethereum").await.unwrap();

        let prompts = client.prompts.lock().unwrap();
        let last = prompts[0].last().unwrap();
        assert_eq!(last.role, Role::System);
        assert!(last.content.contains("\"ethereum\""));
    }

    #[tokio::test]
    async fn stream_falls_back_to_single_token() {
        use futures::StreamExt;
        let agent = agent(Arc::new(ScriptedClient::replying("whole reply")));
        let messages = vec![LlmMessage { role: Role::User, content: "hi".to_string() }];
        let tokens: Vec<String> = agent
            .stream(&messages).await
            .unwrap()
            .map(|t| t.unwrap())
            .collect().await;
        assert_eq!(tokens, vec!["whole reply".to_string()]);
    }
}
