use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };
use async_trait::async_trait;
use super::{ create_streaming_response, ChatClient, TokenStream };
use crate::llm::{ LlmConfig, LlmError, LlmType };
use crate::models::chat::LlmMessage;
use futures::StreamExt;
use log::{ info, warn };

#[derive(Debug)]
pub struct OllamaChatClient {
    http: HttpClient,
    base_url: String,
    completion_model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [LlmMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatChunkMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct ChatChunk {
    message: Option<ChatChunkMessage>,
    #[serde(default)]
    done: bool,
}

/// One newline-delimited JSON object from `/api/chat`.
fn parse_chunk(line: &str) -> Option<Result<ChatChunk, serde_json::Error>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    Some(serde_json::from_str::<ChatChunk>(line))
}

impl OllamaChatClient {
    pub fn new(base_url: Option<String>, completion_model: Option<String>) -> Self {
        let model = completion_model.unwrap_or_else(|| "llama3.1".to_string());
        let url = base_url.unwrap_or_else(|| "http://localhost:11434".into());

        Self {
            http: HttpClient::new(),
            base_url: url.trim_end_matches('/').to_string(),
            completion_model: model,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        if config.llm_type != LlmType::Ollama {
            return Err(LlmError::Config("Invalid config type for OllamaChatClient".to_string()));
        }

        Ok(Self::new(config.base_url.clone(), config.completion_model.clone()))
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }
}

#[async_trait]
impl ChatClient for OllamaChatClient {
    async fn complete(&self, messages: &[LlmMessage]) -> Result<String, LlmError> {
        info!("OllamaChatClient::complete() → model={}", self.completion_model);
        let req = ChatRequest {
            model: &self.completion_model,
            messages,
            stream: false,
        };
        let resp = self.http.post(self.chat_url()).json(&req).send().await?;
        if !resp.status().is_success() {
            return Err(LlmError::Status(resp.status().as_u16()));
        }
        let body = resp.bytes().await?;
        let chunk = serde_json
            ::from_slice::<ChatChunk>(&body)
            .map_err(|e| LlmError::Decode(e.to_string()))?;
        Ok(chunk.message.map(|m| m.content).unwrap_or_default())
    }

    async fn complete_stream(&self, messages: &[LlmMessage]) -> Result<TokenStream, LlmError> {
        info!("OllamaChatClient::complete_stream() → model={}", self.completion_model);
        let body = serde_json
            ::to_vec(
                &(ChatRequest {
                    model: &self.completion_model,
                    messages,
                    stream: true,
                })
            )
            .map_err(|e| LlmError::Decode(e.to_string()))?;
        let request = self.http
            .post(self.chat_url())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);

        create_streaming_response(move |tx| async move {
            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    let _ = tx.send(Err(LlmError::Http(e))).await;
                    return;
                }
            };
            if !response.status().is_success() {
                let _ = tx.send(Err(LlmError::Status(response.status().as_u16()))).await;
                return;
            }

            let mut stream = response.bytes_stream();
            let mut pending = String::new();
            while let Some(chunk_result) = stream.next().await {
                let chunk = match chunk_result {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx.send(Err(LlmError::Http(e))).await;
                        return;
                    }
                };
                pending.push_str(&String::from_utf8_lossy(&chunk));
                while let Some(pos) = pending.find('\n') {
                    let line: String = pending.drain(..=pos).collect();
                    match parse_chunk(&line) {
                        Some(Ok(parsed)) => {
                            let token = parsed.message.map(|m| m.content).unwrap_or_default();
                            if !token.is_empty() && tx.send(Ok(token)).await.is_err() {
                                return;
                            }
                            if parsed.done {
                                return;
                            }
                        }
                        Some(Err(e)) => warn!("JSON parse error: {} for line: {}", e, line.trim()),
                        None => {}
                    }
                }
            }
        })
    }

    fn get_model(&self) -> String {
        self.completion_model.clone()
    }

    fn supports_native_streaming(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_streamed_chunks() {
        let chunk = parse_chunk("{\"message\":{\"role\":\"assistant\",\"content\":\"Hi\"},\"done\":false}\n")
            .unwrap()
            .unwrap();
        assert_eq!(chunk.message.unwrap().content, "Hi");
        assert!(!chunk.done);

        let last = parse_chunk("{\"done\":true}").unwrap().unwrap();
        assert!(last.done);
        assert!(parse_chunk("  \n").is_none());
    }

    #[test]
    fn defaults_to_local_server() {
        let client = OllamaChatClient::new(None, None);
        assert_eq!(client.chat_url(), "http://localhost:11434/api/chat");
        assert_eq!(client.get_model(), "llama3.1");
    }
}
