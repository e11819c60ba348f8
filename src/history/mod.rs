mod memory;
mod redis;
use async_trait::async_trait;
use log::info;
use std::sync::Arc;
use thiserror::Error;
use crate::cli::Args;
use crate::models::chat::{ ApiMessage, Conversation };

pub use self::memory::MemoryHistoryStore;
pub use self::redis::RedisHistoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Chat not found: {0}")]
    NotFound(String),
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),
    #[error("Stored message is malformed: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Unsupported history store type: {0}")]
    Unsupported(String),
}

/// Server-side persistence for chat sessions. Messages are kept in append
/// order and returned whole.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Creates a session holding `initial_message` as its first user turn.
    async fn create_session(
        &self,
        user_id: Option<&str>,
        initial_message: &ApiMessage
    ) -> Result<String, StoreError>;

    async fn add_message(&self, conversation_id: &str, message: &ApiMessage) -> Result<(), StoreError>;

    async fn get_conversation(&self, conversation_id: &str) -> Result<Conversation, StoreError>;
}

pub fn create_history_store(args: &Args) -> Result<Arc<dyn HistoryStore>, StoreError> {
    match args.history_type.to_lowercase().as_str() {
        "redis" => {
            let store = RedisHistoryStore::new(&args.history_host, &args.history_redis_prefix)?;
            Ok(Arc::new(store))
        }
        "memory" => Ok(Arc::new(MemoryHistoryStore::new())),
        other => Err(StoreError::Unsupported(other.to_string())),
    }
}

pub fn initialize_history_store(args: &Args) -> Result<Arc<dyn HistoryStore>, StoreError> {
    info!("Chat history will be stored in: {} at {}", args.history_type, args.history_host);
    create_history_store(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn unknown_store_type_is_rejected() {
        let args = Args::try_parse_from(["trust-chat", "--history-type", "firestore"]).unwrap();
        assert!(matches!(create_history_store(&args), Err(StoreError::Unsupported(t)) if t == "firestore"));
    }

    #[test]
    fn memory_store_needs_no_server() {
        let args = Args::try_parse_from(["trust-chat", "--history-type", "memory"]).unwrap();
        assert!(create_history_store(&args).is_ok());
    }
}
