use async_trait::async_trait;
use futures::{ Stream, StreamExt };
use log::{ debug, info, warn };
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use url::Url;

use super::error::ApiError;
use crate::models::chat::{
    ApiMessage,
    ChatHistoryResponse,
    ChatRequest,
    ChatResponse,
    CompletionRequest,
    CreateChatRequest,
    CreateChatResponse,
    LlmMessage,
};
use crate::models::stream::{ parse_frame_data, StreamFrame };

pub type FrameStream = Pin<Box<dyn Stream<Item = Result<StreamFrame, ApiError>> + Send>>;

/// The persisted-session collaborator as seen from the chat view.
#[async_trait]
pub trait SessionApi: Send + Sync {
    /// Creates a session seeded with `initial_message` and returns its id.
    async fn create_session(&self, initial_message: &str) -> Result<String, ApiError>;

    /// Appends a user message and returns the assistant's reply.
    async fn append_message(&self, session_id: &str, text: &str) -> Result<ApiMessage, ApiError>;

    /// Full ordered history, including system messages.
    async fn get_history(&self, session_id: &str) -> Result<Vec<ApiMessage>, ApiError>;

    /// Token stream for a completion over `messages`, ending with `StreamFrame::Done`.
    async fn stream_completion(
        &self,
        session_id: Option<&str>,
        messages: Vec<LlmMessage>
    ) -> Result<FrameStream, ApiError>;
}

pub struct HttpSessionApi {
    http: HttpClient,
    base_url: String,
    user_id: Option<String>,
}

impl HttpSessionApi {
    pub fn new(base_url: impl Into<String>, user_id: Option<String>) -> Self {
        Self::with_client(HttpClient::new(), base_url, user_id)
    }

    pub fn with_client(http: HttpClient, base_url: impl Into<String>, user_id: Option<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        info!("Session API configured: base_url={}", base_url);
        Self { http, base_url, user_id }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, route: &str) -> String {
        format!("{}{}", self.base_url, route)
    }

    fn history_url(&self, session_id: &str) -> Result<Url, ApiError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| ApiError::Other(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::Other(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(["api", "chats", session_id, "history"]);
        Ok(url)
    }

    async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ApiError> {
        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::Status(status.as_u16()));
        }
        let body = resp.bytes().await?;
        serde_json::from_slice::<T>(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl SessionApi for HttpSessionApi {
    async fn create_session(&self, initial_message: &str) -> Result<String, ApiError> {
        let payload = CreateChatRequest {
            initial_message: initial_message.to_string(),
            user_id: self.user_id.clone(),
        };
        let resp = self.http.post(self.url("/api/chats/create")).json(&payload).send().await?;
        let created: CreateChatResponse = Self::read_json(resp).await?;
        debug!("Created chat {}", created.chat_id);
        Ok(created.chat_id)
    }

    async fn append_message(&self, session_id: &str, text: &str) -> Result<ApiMessage, ApiError> {
        let payload = ChatRequest {
            chat_id: session_id.to_string(),
            message: text.to_string(),
        };
        let resp = self.http.post(self.url("/api/chats/message")).json(&payload).send().await?;
        let reply: ChatResponse = Self::read_json(resp).await?;
        Ok(reply.message)
    }

    async fn get_history(&self, session_id: &str) -> Result<Vec<ApiMessage>, ApiError> {
        let resp = self.http.get(self.history_url(session_id)?).send().await?;
        let history: ChatHistoryResponse = Self::read_json(resp).await?;
        Ok(history.messages)
    }

    async fn stream_completion(
        &self,
        session_id: Option<&str>,
        messages: Vec<LlmMessage>
    ) -> Result<FrameStream, ApiError> {
        let payload = CompletionRequest {
            messages,
            chat_id: session_id.map(|s| s.to_string()),
            stream: true,
        };
        let resp = self.http.post(self.url("/api/chat")).json(&payload).send().await?;
        if !resp.status().is_success() {
            return Err(ApiError::Status(resp.status().as_u16()));
        }

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            let mut bytes = resp.bytes_stream();
            let mut decoder = FrameDecoder::default();
            while let Some(chunk) = bytes.next().await {
                match chunk {
                    Ok(buf) => {
                        for frame in decoder.push(&buf) {
                            let done = matches!(frame, Ok(StreamFrame::Done | StreamFrame::Error(_)));
                            if tx.send(frame).await.is_err() || done {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(ApiError::Http(e))).await;
                        return;
                    }
                }
            }
            let _ = tx.send(Err(ApiError::StreamTruncated)).await;
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

/// Splits an event-stream byte feed into frames, keeping partial lines
/// buffered across chunk boundaries. An `event:` field applies until the
/// blank line that ends its event.
#[derive(Default)]
pub struct FrameDecoder {
    pending: Vec<u8>,
    event: Option<String>,
}

impl FrameDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<StreamFrame, ApiError>> {
        self.pending.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\r', '\n']);

            if line.is_empty() {
                self.event = None;
            } else if let Some(event) = line.strip_prefix("event:") {
                self.event = Some(event.trim().to_string());
            } else if let Some(data) = line.strip_prefix("data:") {
                match parse_frame_data(self.event.as_deref(), data.trim_start()) {
                    Ok(frame) => frames.push(Ok(frame)),
                    Err(e) => {
                        warn!("Skipping malformed stream frame: {}", e);
                        frames.push(Err(ApiError::Decode(e.to_string())));
                    }
                }
            }
        }
        frames
    }
}

/// Runs `fut` with the request timeout, mapping expiry to `ApiError::Timeout`.
pub async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, ApiError>
    where F: std::future::Future<Output = Result<T, ApiError>>
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(ApiError::Timeout(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoder_handles_split_frames() {
        let mut decoder = FrameDecoder::default();
        assert!(decoder.push(b"data: {\"tok").is_empty());
        let frames = decoder.push(b"en\":\"Hi\"}\n\ndata: [DONE]\n\n");
        let frames: Vec<StreamFrame> = frames.into_iter().map(|f| f.unwrap()).collect();
        assert_eq!(frames, vec![StreamFrame::Token("Hi".to_string()), StreamFrame::Done]);
    }

    #[test]
    fn decoder_reports_bad_json() {
        let mut decoder = FrameDecoder::default();
        let frames = decoder.push(b"data: {oops}\n");
        assert!(matches!(frames.as_slice(), [Err(ApiError::Decode(_))]));
    }

    #[test]
    fn decoder_reads_error_event() {
        let mut decoder = FrameDecoder::default();
        let frames = decoder.push(
            b"data: {\"token\":\"par\"}\n\nevent: error\ndata: {\"error\":\"model down\"}\n\ndata: {\"token\":\"t\"}\n"
        );
        let frames: Vec<StreamFrame> = frames.into_iter().map(|f| f.unwrap()).collect();
        assert_eq!(
            frames,
            vec![
                StreamFrame::Token("par".to_string()),
                StreamFrame::Error("model down".to_string()),
                StreamFrame::Token("t".to_string())
            ]
        );
    }

    #[test]
    fn history_url_encodes_id_as_path_segment() {
        let api = HttpSessionApi::new("http://localhost:8000/", None);
        assert_eq!(
            api.history_url("a b/c").unwrap().as_str(),
            "http://localhost:8000/api/chats/a%20b%2Fc/history"
        );

        let api = HttpSessionApi::new("http://localhost:8000/backend", None);
        assert_eq!(
            api.history_url("s1").unwrap().as_str(),
            "http://localhost:8000/backend/api/chats/s1/history"
        );
    }

    #[tokio::test]
    async fn timeout_maps_to_timeout_error() {
        let limit = Duration::from_millis(10);
        let result: Result<(), ApiError> = with_timeout(limit, async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }).await;
        assert!(matches!(result, Err(ApiError::Timeout(d)) if d == limit));
    }
}
