use serde::{ Serialize, Deserialize };
use std::fmt;
use std::str::FromStr;
use chrono::{ DateTime, NaiveDateTime, Utc };
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            other => Err(format!("Unknown message role: {}", other)),
        }
    }
}

/// A single chat bubble held by the session controller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Some(Utc::now()),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn is_visible(&self) -> bool {
        self.role != Role::System
    }
}

/// Message shape exchanged with the session backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApiMessage {
    pub role: Role,
    pub content: String,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Reads RFC 3339 or offset-less ISO-8601 (taken as UTC). Anything else is
/// dropped rather than failing the whole message.
pub fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where D: serde::Deserializer<'de>
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

impl ApiMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Some(Utc::now()),
        }
    }

    /// Gives the message a fresh client-side id.
    pub fn into_message(self) -> Message {
        Message {
            id: Uuid::new_v4().to_string(),
            role: self.role,
            content: self.content,
            timestamp: self.timestamp,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    pub messages: Vec<ApiMessage>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: String,
    pub title: String,
    pub text: String,
}

impl Suggestion {
    fn new(id: &str, title: &str, text: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            text: text.to_string(),
        }
    }
}

pub fn default_suggestions() -> Vec<Suggestion> {
    vec![
        Suggestion::new(
            "1",
            "What's the trust score for Bitcoin?",
            "Find out the trust rating for any crypto project"
        ),
        Suggestion::new("2", "Analyze Ethereum", "Get comprehensive analysis of Ethereum"),
        Suggestion::new(
            "3",
            "Is Dogecoin a good investment?",
            "Evaluate the trustworthiness of Dogecoin"
        )
    ]
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateChatRequest {
    pub initial_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateChatResponse {
    pub chat_id: String,
    pub status: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub chat_id: String,
    pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub chat_id: String,
    pub message: ApiMessage,
    pub status: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatHistoryResponse {
    pub chat_id: String,
    pub messages: Vec<ApiMessage>,
    pub status: String,
}

/// Role-tagged message handed to the LLM collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: Role,
    pub content: String,
}

impl From<&ApiMessage> for LlmMessage {
    fn from(msg: &ApiMessage) -> Self {
        Self {
            role: msg.role,
            content: msg.content.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub messages: Vec<LlmMessage>,
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default)]
    pub stream: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
