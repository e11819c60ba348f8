use futures::StreamExt;
use log::{ debug, error, info, warn };
use std::sync::Arc;
use std::time::Duration;

use super::api::{ with_timeout, SessionApi };
use super::bus::SessionEvent;
use super::error::{ ApiError, ChatErrorKind, SYNTHETIC_REPLY };
use super::input::ChatInput;
use super::storage::{ Location, SessionSlot };
use crate::models::chat::{ default_suggestions, ApiMessage, LlmMessage, Message, Role, Suggestion };
use crate::models::stream::StreamFrame;
use crate::render::{ self, Block, Document, Inline };

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatState {
    /// No bound session; the next send creates one.
    Empty,
    Creating,
    Idle,
    Sending,
    Loading,
}

#[derive(Clone, Debug)]
pub struct ControllerConfig {
    pub request_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum SendTarget {
    Create,
    Append(String),
}

/// A create or append request detached from the controller, so the view can
/// keep rendering while it runs.
pub struct PendingSend {
    api: Arc<dyn SessionApi>,
    target: SendTarget,
    text: String,
    epoch: u64,
    timeout: Duration,
}

#[derive(Debug)]
pub enum SendResult {
    /// Session created; the first reply is fetched separately from history.
    Created {
        session_id: String,
        first_reply: Result<Option<ApiMessage>, ApiError>,
    },
    CreateFailed(ApiError),
    Replied(ApiMessage),
    SendFailed(ApiError),
}

#[derive(Debug)]
pub struct SendOutcome {
    epoch: u64,
    pub result: SendResult,
}

impl PendingSend {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_create(&self) -> bool {
        self.target == SendTarget::Create
    }

    pub async fn run(self) -> SendOutcome {
        let result = match &self.target {
            SendTarget::Create => self.create().await,
            SendTarget::Append(session_id) => {
                match with_timeout(self.timeout, self.api.append_message(session_id, &self.text)).await {
                    Ok(reply) => SendResult::Replied(reply),
                    Err(e) => SendResult::SendFailed(e),
                }
            }
        };
        SendOutcome { epoch: self.epoch, result }
    }

    async fn create(&self) -> SendResult {
        let session_id = match with_timeout(self.timeout, self.api.create_session(&self.text)).await {
            Ok(id) => id,
            Err(e) => {
                return SendResult::CreateFailed(e);
            }
        };
        let first_reply = with_timeout(self.timeout, self.api.get_history(&session_id)).await.map(
            |history| {
                history
                    .into_iter()
                    .filter(|m| m.role == Role::Assistant)
                    .last()
            }
        );
        SendResult::Created { session_id, first_reply }
    }
}

/// A history load detached from the controller. Only the most recently
/// issued resume is applied.
pub struct PendingResume {
    api: Arc<dyn SessionApi>,
    generation: u64,
    session_id: String,
    timeout: Duration,
}

#[derive(Debug)]
pub struct ResumeOutcome {
    generation: u64,
    pub session_id: String,
    pub result: Result<Vec<ApiMessage>, ApiError>,
}

impl PendingResume {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub async fn run(self) -> ResumeOutcome {
        let result = with_timeout(self.timeout, self.api.get_history(&self.session_id)).await;
        ResumeOutcome {
            generation: self.generation,
            session_id: self.session_id,
            result,
        }
    }
}

/// Owns the message list and bound session id of one mounted chat view.
pub struct ChatController {
    api: Arc<dyn SessionApi>,
    slot: Arc<dyn SessionSlot>,
    location: Location,
    config: ControllerConfig,
    messages: Vec<Message>,
    session_id: Option<String>,
    error: Option<ChatErrorKind>,
    processing: bool,
    loading: Option<u64>,
    resume_generation: u64,
    // bumped whenever the thread is replaced, so replies for an old thread are dropped
    epoch: u64,
    typing: bool,
    welcome_visible: bool,
    mounted: bool,
}

impl ChatController {
    pub fn new(
        api: Arc<dyn SessionApi>,
        slot: Arc<dyn SessionSlot>,
        location: Location,
        config: ControllerConfig
    ) -> Self {
        Self {
            api,
            slot,
            location,
            config,
            messages: Vec::new(),
            session_id: None,
            error: None,
            processing: false,
            loading: None,
            resume_generation: 0,
            epoch: 0,
            typing: false,
            welcome_visible: true,
            mounted: true,
        }
    }

    pub fn state(&self) -> ChatState {
        if self.loading.is_some() {
            ChatState::Loading
        } else if self.processing {
            if self.session_id.is_some() { ChatState::Sending } else { ChatState::Creating }
        } else if self.session_id.is_none() {
            ChatState::Empty
        } else {
            ChatState::Idle
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn visible_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.is_visible())
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn error(&self) -> Option<ChatErrorKind> {
        self.error
    }

    pub fn error_banner(&self) -> Option<&'static str> {
        self.error.map(|e| e.banner())
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_some()
    }

    /// Mutating requests are refused while either flag is set.
    pub fn is_busy(&self) -> bool {
        self.processing || self.loading.is_some()
    }

    pub fn is_welcome_visible(&self) -> bool {
        self.welcome_visible
    }

    pub fn shows_suggestions(&self) -> bool {
        self.messages.is_empty() && !self.typing
    }

    /// Starter prompts, offered only on an empty thread while the user is not typing.
    pub fn suggestions(&self) -> Vec<Suggestion> {
        if self.shows_suggestions() { default_suggestions() } else { Vec::new() }
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Mounts the view and resumes the session named by the location, or
    /// failing that the one in the durable slot.
    pub fn mount(&mut self) -> Option<PendingResume> {
        self.mounted = true;
        let target = self.location.session_id().or_else(|| self.slot.load())?;
        info!("Restoring chat session {}", target);
        self.begin_resume(&target)
    }

    /// After this every in-flight result is discarded on arrival.
    pub fn unmount(&mut self) {
        self.mounted = false;
        self.loading = None;
    }

    pub fn on_typing(&mut self, typing: bool) {
        self.typing = typing;
        if typing && self.welcome_visible && self.messages.is_empty() {
            self.welcome_visible = false;
        }
    }

    pub fn handle_event(&mut self, event: SessionEvent) -> Option<PendingResume> {
        match event {
            SessionEvent::ChatSelected(session_id) => self.begin_resume(&session_id),
            SessionEvent::NewChatRequested => {
                self.reset();
                None
            }
        }
    }

    /// Gated submission from the input field.
    pub fn submit_input(&mut self, input: &mut ChatInput) -> Option<PendingSend> {
        let text = input.submit(self.is_busy())?;
        self.on_typing(false);
        self.begin_send(&text)
    }

    pub fn select_suggestion(&mut self, suggestion: &Suggestion) -> Option<PendingSend> {
        self.begin_send(&suggestion.title)
    }

    /// Appends the user message and returns the request to run, or `None` if
    /// the text is blank or another request is outstanding.
    pub fn begin_send(&mut self, text: &str) -> Option<PendingSend> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if self.is_busy() {
            debug!("Rejecting submission while a request is in flight");
            return None;
        }

        self.welcome_visible = false;
        self.messages.push(Message::user(text));
        self.processing = true;
        self.error = None;

        let target = match &self.session_id {
            Some(id) => SendTarget::Append(id.clone()),
            None => SendTarget::Create,
        };
        Some(PendingSend {
            api: Arc::clone(&self.api),
            target,
            text: text.to_string(),
            epoch: self.epoch,
            timeout: self.config.request_timeout,
        })
    }

    pub fn apply_send(&mut self, outcome: SendOutcome) {
        self.processing = false;
        if !self.mounted {
            debug!("Dropping send result for unmounted view");
            return;
        }
        if outcome.epoch != self.epoch {
            debug!("Dropping send result for a thread that is no longer shown");
            return;
        }

        match outcome.result {
            SendResult::Created { session_id, first_reply } => {
                info!("Chat session {} created", session_id);
                self.bind(&session_id);
                match first_reply {
                    Ok(Some(reply)) => self.messages.push(reply.into_message()),
                    Ok(None) => warn!("Chat {} has no assistant reply yet", session_id),
                    Err(e) => {
                        error!("Failed to load first reply for {}: {}", session_id, e);
                        self.error = Some(ChatErrorKind::FirstReplyLoadFailed);
                    }
                }
            }
            SendResult::CreateFailed(e) => {
                error!("Failed to create chat session: {}", e);
                self.fail(ChatErrorKind::CreateFailed);
            }
            SendResult::Replied(reply) => self.messages.push(reply.into_message()),
            SendResult::SendFailed(e) => {
                error!("Failed to send message: {}", e);
                self.fail(ChatErrorKind::SendFailed);
            }
        }
    }

    /// Convenience wrapper running a whole send round-trip.
    pub async fn send_message(&mut self, text: &str) -> bool {
        match self.begin_send(text) {
            Some(pending) => {
                let outcome = pending.run().await;
                self.apply_send(outcome);
                true
            }
            None => false,
        }
    }

    pub fn begin_resume(&mut self, session_id: &str) -> Option<PendingResume> {
        let session_id = session_id.trim();
        if session_id.is_empty() {
            return None;
        }
        if self.loading.is_none() && self.session_id.as_deref() == Some(session_id) {
            debug!("Chat {} is already shown", session_id);
            return None;
        }

        self.resume_generation += 1;
        self.loading = Some(self.resume_generation);
        self.session_id = Some(session_id.to_string());

        Some(PendingResume {
            api: Arc::clone(&self.api),
            generation: self.resume_generation,
            session_id: session_id.to_string(),
            timeout: self.config.request_timeout,
        })
    }

    pub fn apply_resume(&mut self, outcome: ResumeOutcome) {
        if !self.mounted {
            debug!("Dropping history for unmounted view");
            return;
        }
        if self.loading != Some(outcome.generation) {
            debug!("Dropping superseded history load for {}", outcome.session_id);
            return;
        }
        self.loading = None;

        match outcome.result {
            Ok(history) => {
                self.epoch += 1;
                self.messages = history
                    .into_iter()
                    .filter(|m| m.role != Role::System)
                    .map(ApiMessage::into_message)
                    .collect();
                if !self.messages.is_empty() {
                    self.welcome_visible = false;
                }
                self.error = None;
                self.bind(&outcome.session_id);
                info!("Loaded chat {} ({} messages)", outcome.session_id, self.messages.len());
            }
            Err(e) => {
                error!("Failed to load chat history for {}: {}", outcome.session_id, e);
                self.session_id = None;
                self.error = Some(ChatErrorKind::HistoryLoadFailed);
                self.forget_stored_session();
            }
        }
    }

    pub async fn resume(&mut self, session_id: &str) -> bool {
        match self.begin_resume(session_id) {
            Some(pending) => {
                let outcome = pending.run().await;
                self.apply_resume(outcome);
                self.error.is_none()
            }
            None => false,
        }
    }

    pub fn reset(&mut self) {
        self.messages.clear();
        self.session_id = None;
        self.error = None;
        self.loading = None;
        self.welcome_visible = true;
        self.epoch += 1;
        self.forget_stored_session();
        info!("Started a new chat");
    }

    /// Streams a completion token by token into a single assistant message.
    /// `on_update` sees the growing message after every token.
    pub async fn send_streaming<F>(&mut self, text: &str, mut on_update: F) -> bool
        where F: FnMut(&Message)
    {
        let text = text.trim();
        if text.is_empty() || self.is_busy() {
            return false;
        }

        self.welcome_visible = false;
        self.messages.push(Message::user(text));
        self.processing = true;
        self.error = None;

        let history: Vec<LlmMessage> = self.messages
            .iter()
            .map(|m| LlmMessage { role: m.role, content: m.content.clone() })
            .collect();
        let reply = Message::assistant("");
        let reply_id = reply.id.clone();
        self.messages.push(reply);

        let limit = self.config.request_timeout;
        let opened = with_timeout(
            limit,
            self.api.stream_completion(self.session_id.as_deref(), history)
        ).await;

        let result = match opened {
            Ok(mut frames) => {
                loop {
                    match with_timeout(limit, async { Ok(frames.next().await) }).await {
                        Ok(Some(Ok(StreamFrame::Token(token)))) => {
                            if let Some(msg) = self.messages.iter_mut().find(|m| m.id == reply_id) {
                                msg.content.push_str(&token);
                                on_update(msg);
                            }
                        }
                        Ok(Some(Ok(StreamFrame::Done))) => break Ok(()),
                        Ok(Some(Ok(StreamFrame::Error(message)))) => break Err(ApiError::Stream(message)),
                        Ok(Some(Err(e))) | Err(e) => break Err(e),
                        Ok(None) => break Err(ApiError::StreamTruncated),
                    }
                }
            }
            Err(e) => Err(e),
        };

        self.processing = false;
        match result {
            Ok(()) => true,
            Err(e) => {
                error!("Streaming failed: {}", e);
                self.messages.retain(|m| m.id != reply_id || !m.content.is_empty());
                self.error = Some(ChatErrorKind::StreamFailed);
                false
            }
        }
    }

    /// Visual tree for a message: assistant text goes through the report
    /// renderer, user text is shown verbatim, system messages are never shown.
    pub fn render_message(&self, message: &Message) -> Option<Document> {
        match message.role {
            Role::Assistant => Some(render::render(&message.content)),
            Role::User =>
                Some(Document {
                    blocks: vec![Block::Paragraph {
                        children: vec![Inline::Text { text: message.content.clone() }],
                    }],
                }),
            Role::System => None,
        }
    }

    fn bind(&mut self, session_id: &str) {
        self.session_id = Some(session_id.to_string());
        if let Err(e) = self.slot.store(session_id) {
            warn!("Failed to persist session id: {}", e);
        }
        self.location.set_session_id(session_id);
    }

    fn forget_stored_session(&mut self) {
        if let Err(e) = self.slot.clear() {
            warn!("Failed to clear stored session id: {}", e);
        }
        self.location.clear_session_id();
    }

    fn fail(&mut self, kind: ChatErrorKind) {
        self.error = Some(kind);
        if kind.adds_synthetic_reply() {
            self.messages.push(Message::assistant(SYNTHETIC_REPLY));
        }
    }
}
