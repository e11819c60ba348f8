use std::time::Duration;
use thiserror::Error;

/// Failures talking to the session backend.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP error! status: {0}")]
    Status(u16),
    #[error("Invalid response body: {0}")]
    Decode(String),
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Stream ended without a [DONE] frame")]
    StreamTruncated,
    #[error("Stream reported an error: {0}")]
    Stream(String),
    #[error("{0}")]
    Other(String),
}

/// What the chat view shows in its inline banner. All of these are advisory;
/// the controller stays usable after any of them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatErrorKind {
    CreateFailed,
    FirstReplyLoadFailed,
    SendFailed,
    HistoryLoadFailed,
    StreamFailed,
}

pub const SYNTHETIC_REPLY: &str =
    "I'm sorry, I encountered an error processing your request. Please make sure the backend server is running.";

impl ChatErrorKind {
    pub fn banner(&self) -> &'static str {
        match self {
            ChatErrorKind::CreateFailed => "Failed to create chat session.",
            ChatErrorKind::FirstReplyLoadFailed =>
                "Chat created, but the first reply could not be loaded.",
            ChatErrorKind::SendFailed => "Failed to send message.",
            ChatErrorKind::HistoryLoadFailed =>
                "Failed to load chat history. The chat may have been deleted.",
            ChatErrorKind::StreamFailed => "The response stream was interrupted.",
        }
    }

    /// Only create and send failures add an apology bubble to the thread.
    pub fn adds_synthetic_reply(&self) -> bool {
        matches!(self, ChatErrorKind::CreateFailed | ChatErrorKind::SendFailed)
    }
}
