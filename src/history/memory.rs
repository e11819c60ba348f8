use async_trait::async_trait;
use chrono::{ DateTime, Utc };
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ HistoryStore, StoreError };
use crate::models::chat::{ ApiMessage, Conversation };

struct StoredChat {
    user_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    messages: Vec<ApiMessage>,
}

/// Process-local store; sessions are lost on restart.
#[derive(Default)]
pub struct MemoryHistoryStore {
    chats: RwLock<HashMap<String, StoredChat>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn create_session(
        &self,
        user_id: Option<&str>,
        initial_message: &ApiMessage
    ) -> Result<String, StoreError> {
        let chat_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let chat = StoredChat {
            user_id: user_id.map(|u| u.to_string()),
            created_at: now,
            updated_at: now,
            messages: vec![initial_message.clone()],
        };
        self.chats.write().await.insert(chat_id.clone(), chat);
        Ok(chat_id)
    }

    async fn add_message(&self, conversation_id: &str, message: &ApiMessage) -> Result<(), StoreError> {
        let mut chats = self.chats.write().await;
        let chat = chats
            .get_mut(conversation_id)
            .ok_or_else(|| StoreError::NotFound(conversation_id.to_string()))?;
        chat.messages.push(message.clone());
        chat.updated_at = Utc::now();
        Ok(())
    }

    async fn get_conversation(&self, conversation_id: &str) -> Result<Conversation, StoreError> {
        let chats = self.chats.read().await;
        let chat = chats
            .get(conversation_id)
            .ok_or_else(|| StoreError::NotFound(conversation_id.to_string()))?;
        Ok(Conversation {
            id: conversation_id.to_string(),
            user_id: chat.user_id.clone(),
            created_at: Some(chat.created_at),
            updated_at: Some(chat.updated_at),
            messages: chat.messages.clone(),
        })
    }
}
