use crate::agent::{ AgentError, TrustAgent };
use crate::history::StoreError;
use crate::models::chat::{
    ApiMessage,
    ChatHistoryResponse,
    ChatRequest,
    ChatResponse,
    CompletionRequest,
    CreateChatRequest,
    CreateChatResponse,
    ErrorResponse,
    Role,
};
use crate::models::stream::{ StreamFrame, ERROR_EVENT };
use crate::render::{ self, fields::extract_report, Document };
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use axum::{
    routing::{ get, post },
    Json,
    Router,
    extract::{ Path, State },
    response::{ IntoResponse, Response },
    response::sse::{ Event, KeepAlive, Sse },
    http::StatusCode,
};
use futures::StreamExt;
use serde::{ Deserialize, Serialize };
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, error };

const SUCCESS: &str = "success";

#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<TrustAgent>,
    pub request_timeout: Duration,
}

/// Handler failure rendered as `{"error": ...}` with a status code.
#[derive(Debug)]
pub struct ApiFailure {
    status: StatusCode,
    message: String,
}

impl ApiFailure {
    fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.into() }
    }
}

impl From<AgentError> for ApiFailure {
    fn from(err: AgentError) -> Self {
        let status = match &err {
            AgentError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self { status, message: err.to_string() }
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("Request failed: {}", self.message);
        }
        (self.status, Json(ErrorResponse { error: self.message })).into_response()
    }
}

async fn timed<T, F>(limit: Duration, fut: F) -> Result<T, ApiFailure>
    where F: Future<Output = Result<T, AgentError>>
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(ApiFailure::from),
        Err(_) =>
            Err(ApiFailure {
                status: StatusCode::GATEWAY_TIMEOUT,
                message: format!("Request timed out after {}s", limit.as_secs()),
            }),
    }
}

#[derive(Deserialize)]
pub struct RenderRequest {
    pub text: String,
}

#[derive(Serialize)]
struct RenderResponse {
    document: Document,
    html: String,
    trust_score: Option<f64>,
    trust_level: Option<&'static str>,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root_handler))
        .route("/api/agents", get(agents_handler))
        .route("/api/model", get(model_handler))
        .route("/api/chats/create", post(create_chat_handler))
        .route("/api/chats/message", post(send_message_handler))
        .route("/api/chats/{chat_id}/history", get(history_handler))
        .route("/api/chat", post(completion_handler))
        .route("/api/render", post(render_handler))
        .layer(cors)
        .with_state(state)
}

async fn root_handler() -> impl IntoResponse {
    Json(
        json!({
        "message": "Welcome to Decryptify API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "AI-powered crypto analysis and trust assessment",
    })
    )
}

async fn agents_handler() -> impl IntoResponse {
    let agents = [
        ("Coin Info Agent", "Provides comprehensive cryptocurrency market data and analysis"),
        ("Crypto Scam Agent", "Detects and analyzes cryptocurrency scam risks"),
        ("ChainBroker Agent", "Analyzes cryptocurrency broker and exchange data"),
        ("CertiK Agent", "Analyzes smart contract security audits and vulnerabilities"),
        ("Founder Info Agent", "Investigates founder background and credibility"),
        ("Project Info Agent", "Gathers and analyzes project information from various sources"),
        ("Trust Agent", "Synthesizes all information to provide a trust score (0-10)"),
    ];
    let agents: Vec<_> = agents
        .iter()
        .map(|(name, description)| json!({ "name": name, "description": description }))
        .collect();
    Json(json!({ "agents": agents, "status": SUCCESS }))
}

async fn model_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "model": state.agent.model(), "status": SUCCESS }))
}

async fn create_chat_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateChatRequest>
) -> Result<Json<CreateChatResponse>, ApiFailure> {
    let initial = req.initial_message.trim();
    if initial.is_empty() {
        return Err(ApiFailure::bad_request("initial_message must not be empty"));
    }
    let chat_id = timed(
        state.request_timeout,
        state.agent.create_chat(req.user_id.as_deref(), initial)
    ).await?;
    Ok(Json(CreateChatResponse { chat_id, status: SUCCESS.to_string() }))
}

async fn send_message_handler(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>
) -> Result<Json<ChatResponse>, ApiFailure> {
    let text = req.message.trim();
    if text.is_empty() {
        return Err(ApiFailure::bad_request("message must not be empty"));
    }
    let message = timed(state.request_timeout, state.agent.send_message(&req.chat_id, text)).await?;
    Ok(
        Json(ChatResponse {
            chat_id: req.chat_id,
            message,
            status: SUCCESS.to_string(),
        })
    )
}

async fn history_handler(
    State(state): State<AppState>,
    Path(chat_id): Path<String>
) -> Result<Json<ChatHistoryResponse>, ApiFailure> {
    let messages = timed(state.request_timeout, state.agent.history(&chat_id)).await?;
    Ok(
        Json(ChatHistoryResponse {
            chat_id,
            messages,
            status: SUCCESS.to_string(),
        })
    )
}

/// Stateless completion. With `stream: true` the reply is sent as
/// `data: {"token": ...}` events closed by `data: [DONE]`, or cut short by
/// an `error` event.
async fn completion_handler(
    State(state): State<AppState>,
    Json(req): Json<CompletionRequest>
) -> Result<Response, ApiFailure> {
    if req.messages.is_empty() {
        return Err(ApiFailure::bad_request("messages must not be empty"));
    }
    if !req.stream {
        let reply = timed(state.request_timeout, state.agent.complete(&req.messages)).await?;
        let response = ChatResponse {
            chat_id: req.chat_id.unwrap_or_default(),
            message: ApiMessage::new(Role::Assistant, reply),
            status: SUCCESS.to_string(),
        };
        return Ok(Json(response).into_response());
    }

    let mut tokens = timed(state.request_timeout, state.agent.stream(&req.messages)).await?;
    info!("Streaming completion for chat {:?}", req.chat_id);

    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(32);
    tokio::spawn(async move {
        while let Some(token) = tokens.next().await {
            match token {
                Ok(token) => {
                    let frame = StreamFrame::Token(token);
                    if tx.send(Ok(Event::default().data(frame.data()))).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    // no [DONE] frame, so the client treats the stream as interrupted
                    error!("Completion stream failed: {}", e);
                    let frame = StreamFrame::Error(e.to_string());
                    let event = Event::default().event(ERROR_EVENT).data(frame.data());
                    let _ = tx.send(Ok(event)).await;
                    return;
                }
            }
        }
        let _ = tx.send(Ok(Event::default().data(StreamFrame::Done.data()))).await;
    });

    Ok(Sse::new(ReceiverStream::new(rx)).keep_alive(KeepAlive::default()).into_response())
}

async fn render_handler(Json(req): Json<RenderRequest>) -> impl IntoResponse {
    let document = render::render(&req.text);
    let report = extract_report(&req.text);
    Json(RenderResponse {
        html: document.to_html(),
        document,
        trust_score: report.score,
        trust_level: report.level.map(|l| l.as_str()),
    })
}
