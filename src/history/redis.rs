use async_trait::async_trait;
use crate::models::chat::{ lenient_timestamp, parse_timestamp, ApiMessage, Conversation, Role };
use crate::history::{ HistoryStore, StoreError };
use chrono::{ DateTime, Utc };
use log::{ debug, error };
use redis::{ Client, AsyncCommands };
use serde::{ Serialize, Deserialize };
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Serialize, Deserialize)]
struct StoredMessage {
    role: Role,
    content: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    timestamp: Option<DateTime<Utc>>,
}

impl From<&ApiMessage> for StoredMessage {
    fn from(msg: &ApiMessage) -> Self {
        Self {
            role: msg.role,
            content: msg.content.clone(),
            timestamp: msg.timestamp,
        }
    }
}

/// Each chat is a Redis list of JSON messages at `<prefix><chat_id>`, with
/// owner and timestamps in a hash at `<prefix><chat_id>:meta`.
pub struct RedisHistoryStore {
    client: Client,
    key_prefix: String,
}

impl RedisHistoryStore {
    pub fn new(url: &str, key_prefix: &str) -> Result<Self, StoreError> {
        Ok(Self {
            client: Client::open(url)?,
            key_prefix: key_prefix.to_string(),
        })
    }

    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection, redis::RedisError> {
        self.client.get_multiplexed_async_connection().await
    }

    fn messages_key(&self, conversation_id: &str) -> String {
        format!("{}{}", self.key_prefix, conversation_id)
    }

    fn meta_key(&self, conversation_id: &str) -> String {
        format!("{}{}:meta", self.key_prefix, conversation_id)
    }
}

#[async_trait]
impl HistoryStore for RedisHistoryStore {
    async fn create_session(
        &self,
        user_id: Option<&str>,
        initial_message: &ApiMessage
    ) -> Result<String, StoreError> {
        let mut conn = self.get_connection().await?;
        let chat_id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        let meta = [
            ("user_id", user_id.unwrap_or_default().to_string()),
            ("created_at", now.clone()),
            ("updated_at", now),
        ];
        let _: () = conn.hset_multiple(self.meta_key(&chat_id), &meta).await?;

        let json_msg = serde_json::to_string(&StoredMessage::from(initial_message))?;
        let _: i64 = conn.rpush(self.messages_key(&chat_id), &json_msg).await?;
        debug!("Created chat {} in redis", chat_id);
        Ok(chat_id)
    }

    async fn add_message(&self, conversation_id: &str, message: &ApiMessage) -> Result<(), StoreError> {
        let mut conn = self.get_connection().await?;
        let meta_key = self.meta_key(conversation_id);
        let exists: bool = conn.exists(&meta_key).await?;
        if !exists {
            return Err(StoreError::NotFound(conversation_id.to_string()));
        }

        let json_msg = serde_json::to_string(&StoredMessage::from(message))?;
        let _: i64 = conn.rpush(self.messages_key(conversation_id), &json_msg).await?;
        let _: () = conn.hset(&meta_key, "updated_at", Utc::now().to_rfc3339()).await?;
        Ok(())
    }

    async fn get_conversation(&self, conversation_id: &str) -> Result<Conversation, StoreError> {
        let mut conn = self.get_connection().await?;
        let meta: HashMap<String, String> = conn.hgetall(self.meta_key(conversation_id)).await?;
        if meta.is_empty() {
            return Err(StoreError::NotFound(conversation_id.to_string()));
        }

        let json_entries: Vec<String> = conn.lrange(self.messages_key(conversation_id), 0, -1).await?;
        let mut messages = Vec::with_capacity(json_entries.len());

        for json_entry in &json_entries {
            match serde_json::from_str::<StoredMessage>(json_entry) {
                Ok(msg) => {
                    messages.push(ApiMessage {
                        role: msg.role,
                        content: msg.content,
                        timestamp: msg.timestamp,
                    });
                }
                Err(e) => {
                    error!("Error parsing history entry: {}", e);
                }
            }
        }

        Ok(conversation_from_meta(conversation_id, &meta, messages))
    }
}

fn conversation_from_meta(
    conversation_id: &str,
    meta: &HashMap<String, String>,
    messages: Vec<ApiMessage>
) -> Conversation {
    Conversation {
        id: conversation_id.to_string(),
        user_id: meta
            .get("user_id")
            .filter(|u| !u.is_empty())
            .cloned(),
        created_at: meta.get("created_at").and_then(|t| parse_timestamp(t)),
        updated_at: meta.get("updated_at").and_then(|t| parse_timestamp(t)),
        messages,
    }
}
