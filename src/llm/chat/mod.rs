pub mod ollama;
pub mod provider;

use async_trait::async_trait;
use futures::{ Future, Stream };
use std::pin::Pin;
use std::sync::Arc;
use super::{ LlmConfig, LlmError, LlmType };
use self::ollama::OllamaChatClient;
use self::provider::RllmChatClient;
use crate::models::chat::LlmMessage;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(&self, messages: &[LlmMessage]) -> Result<String, LlmError>;

    /// Backends without native streaming deliver the whole reply as a
    /// single token.
    async fn complete_stream(&self, messages: &[LlmMessage]) -> Result<TokenStream, LlmError> {
        let reply = self.complete(messages).await?;
        full_response_as_stream(move || async move { Ok(reply) })
    }

    fn get_model(&self) -> String;

    fn supports_native_streaming(&self) -> bool {
        false
    }
}

pub fn create_streaming_response<F, Fut>(response_fn: F) -> Result<TokenStream, LlmError>
    where
        F: FnOnce(mpsc::Sender<Result<String, LlmError>>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static
{
    let (tx, rx) = mpsc::channel(32);

    tokio::spawn(async move {
        response_fn(tx).await;
    });

    Ok(Box::pin(ReceiverStream::new(rx)))
}

pub fn full_response_as_stream<F, Fut>(response_fn: F) -> Result<TokenStream, LlmError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<String, LlmError>> + Send + 'static
{
    create_streaming_response(move |tx| async move {
        match response_fn().await {
            Ok(response) => {
                let _ = tx.send(Ok(response)).await;
            }
            Err(e) => {
                let _ = tx.send(Err(e)).await;
            }
        }
    })
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, LlmError> {
    let client: Arc<dyn ChatClient> = match config.llm_type {
        LlmType::Ollama => Arc::new(OllamaChatClient::from_config(config)?),
        _ => Arc::new(RllmChatClient::from_config(config)?),
    };
    Ok(client)
}
