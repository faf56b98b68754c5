//! HTTP API.
//!
//! Exposes intake sessions, form submission, tracking and statistics as
//! JSON over HTTP.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/health` | Health check (returns version) |
//! | `GET`    | `/languages` | Supported languages and locales |
//! | `POST`   | `/sessions` | Start an intake session |
//! | `GET`    | `/sessions/{id}` | Session state, transcript and current prompt |
//! | `POST`   | `/sessions/{id}/turns` | Send one turn (text, audio and/or files) |
//! | `POST`   | `/sessions/{id}/file` | File a completed session |
//! | `DELETE` | `/sessions/{id}` | Abandon a session |
//! | `POST`   | `/complaints` | Submit a complete form |
//! | `GET`    | `/complaints/{ticket}` | Track a complaint |
//! | `GET`    | `/complaints/{ticket}/report.pdf` | PDF report |
//! | `GET`    | `/stats` | Total / resolved / active counts |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "no complaint with ticket ID CYBER-1A2B3C4D" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `conflict` (409),
//! `internal` (500).
//!
//! # Sessions
//!
//! Sessions live in memory only. Each one sits behind its own async lock,
//! so a session handles one turn at a time while different sessions
//! proceed independently. A session leaves memory when it is filed,
//! deleted, or idle for longer than `[server].session_idle_minutes`; a
//! filed session's ticket is remembered for the same idle window so a
//! repeated filing gets `409`.
//!
//! Turn and form bodies may carry base64 audio and evidence files, so those
//! routes accept up to `[server].max_body_mb`.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use cyberguard_core::catalog::Language;
use cyberguard_core::categorize::Categorization;
use cyberguard_core::filing::{FilingError, FilingReceipt};
use cyberguard_core::flow::{Phase, SessionState, TranscriptEntry, TurnInput, TurnOutcome};
use cyberguard_core::form::{prepare_form, ComplaintForm, FormError};
use cyberguard_core::models::{
    format_timestamp, AnswerRecord, Attachment, Category, ComplaintStatus, TicketId,
};
use cyberguard_core::store::{ComplaintStats, StoreError};

use crate::config::{Config, ServerConfig};
use crate::report::render_complaint_pdf;
use crate::services::Services;
use crate::speech::SpeechResolution;

struct SessionEntry {
    state: SessionState,
    /// Set once filed; a request already waiting on the lock sees it.
    filed: Option<TicketId>,
    last_activity: Instant,
}

impl SessionEntry {
    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }
}

type SessionHandle = Arc<tokio::sync::Mutex<SessionEntry>>;

struct FiledSession {
    ticket: TicketId,
    at: Instant,
}

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    services: Arc<Services>,
    sessions: Arc<Mutex<HashMap<String, SessionHandle>>>,
    filed: Arc<Mutex<HashMap<String, FiledSession>>>,
    idle_timeout: Duration,
    max_body_bytes: usize,
}

impl AppState {
    pub fn new(services: Arc<Services>) -> Self {
        Self::with_settings(services, &ServerConfig::default())
    }

    pub fn with_settings(services: Arc<Services>, server: &ServerConfig) -> Self {
        Self {
            services,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            filed: Arc::new(Mutex::new(HashMap::new())),
            idle_timeout: server.session_idle_timeout(),
            max_body_bytes: server.max_body_bytes(),
        }
    }

    /// Sessions currently held in memory.
    pub fn session_count(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn session(&self, id: &str) -> Result<SessionHandle, AppError> {
        if let Some(handle) = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
        {
            return Ok(handle);
        }
        match self
            .filed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
        {
            Some(filed) => Err(conflict(format!(
                "session already filed as {}",
                filed.ticket
            ))),
            None => Err(not_found(format!("no session with id {}", id))),
        }
    }

    fn retire(&self, id: &str, ticket: TicketId) {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        self.filed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                id.to_string(),
                FiledSession {
                    ticket,
                    at: Instant::now(),
                },
            );
    }

    /// Drop sessions idle since before `now - idle_timeout`, and forget
    /// filed sessions older than that. Sessions busy with a turn are kept.
    /// Returns the number of open sessions removed.
    pub fn expire_idle_sessions(&self, now: Instant) -> usize {
        let idle = self.idle_timeout;
        let is_stale = |since: Instant| now.saturating_duration_since(since) >= idle;

        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, handle| match handle.try_lock() {
            Ok(entry) => !is_stale(entry.last_activity),
            Err(_) => true,
        });
        let expired = before - sessions.len();
        drop(sessions);

        self.filed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|_, filed| !is_stale(filed.at));

        if expired > 0 {
            info!(expired, "idle sessions discarded");
        }
        expired
    }

    /// Run [`expire_idle_sessions`](Self::expire_idle_sessions) periodically
    /// for the life of the process.
    pub fn spawn_session_sweeper(&self) -> tokio::task::JoinHandle<()> {
        let state = self.clone();
        let period = state.idle_timeout.min(Duration::from_secs(60));
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(period);
            loop {
                tick.tick().await;
                let expired = state.expire_idle_sessions(Instant::now());
                debug!(expired, open = state.session_count(), "session sweep");
            }
        })
    }
}

/// Build the router with CORS and request tracing.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = DefaultBodyLimit::max(state.max_body_bytes);

    Router::new()
        .route("/health", get(handle_health))
        .route("/languages", get(handle_languages))
        .route("/sessions", post(handle_create_session))
        .route(
            "/sessions/{id}",
            get(handle_get_session).delete(handle_delete_session),
        )
        .route(
            "/sessions/{id}/turns",
            post(handle_turn).layer(body_limit),
        )
        .route("/sessions/{id}/file", post(handle_file_session))
        .route("/complaints", post(handle_submit_form).layer(body_limit))
        .route("/complaints/{ticket}", get(handle_track))
        .route("/complaints/{ticket}/report.pdf", get(handle_report))
        .route("/stats", get(handle_stats))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind`. Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let services = Arc::new(Services::from_config(config).await?);
    let state = AppState::with_settings(services, &config.server);
    state.spawn_session_sweeper();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(bind = %config.server.bind, "CyberGuard API listening");
    println!("CyberGuard API listening on http://{}", config.server.bind);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
pub struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn error(status: StatusCode, code: &str, message: impl Into<String>) -> AppError {
    AppError {
        status,
        code: code.to_string(),
        message: message.into(),
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    error(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn not_found(message: impl Into<String>) -> AppError {
    error(StatusCode::NOT_FOUND, "not_found", message)
}

fn conflict(message: impl Into<String>) -> AppError {
    error(StatusCode::CONFLICT, "conflict", message)
}

fn internal(message: impl Into<String>) -> AppError {
    error(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(ticket) => {
                not_found(format!("no complaint with ticket ID {}", ticket))
            }
            other => internal(other.to_string()),
        }
    }
}

impl From<FilingError> for AppError {
    fn from(e: FilingError) -> Self {
        match e {
            FilingError::Store(store) => store.into(),
        }
    }
}

impl From<FormError> for AppError {
    fn from(e: FormError) -> Self {
        bad_request(e.to_string())
    }
}

// ============ GET /health, GET /languages ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Serialize)]
struct LanguageInfo {
    name: &'static str,
    locale: &'static str,
    tts_locale: String,
}

async fn handle_languages() -> Json<Vec<LanguageInfo>> {
    Json(
        Language::ALL
            .iter()
            .map(|lang| LanguageInfo {
                name: lang.name(),
                locale: lang.locale(),
                tts_locale: lang.tts_locale(),
            })
            .collect(),
    )
}

// ============ Sessions ============

#[derive(Deserialize, Default)]
#[serde(default)]
struct CreateSessionRequest {
    language: Option<String>,
}

/// Everything a client needs to render a session.
#[derive(Serialize)]
struct SessionView {
    id: String,
    language: Language,
    phase: Phase,
    current_index: usize,
    progress: f32,
    /// Current question in the session language; absent once complete.
    prompt: Option<String>,
    /// True when the client should voice `prompt` now.
    speak: bool,
    answers_native: AnswerRecord,
    answers: AnswerRecord,
    attachments: usize,
    transcript: Vec<TranscriptEntry>,
    categorization: Option<Categorization>,
}

async fn view(services: &Services, id: &str, entry: &mut SessionEntry, cue: bool) -> SessionView {
    let flow = &services.flow;
    let speak = cue && flow.take_speech_cue(&mut entry.state);
    let state = &entry.state;
    SessionView {
        id: id.to_string(),
        language: state.language(),
        phase: state.phase(),
        current_index: state.current_index(),
        progress: flow.progress(state),
        prompt: flow.current_prompt(state).await,
        speak,
        answers_native: state.answers_native().clone(),
        answers: state.answers_normalized().clone(),
        attachments: state.attachments().len(),
        transcript: state.transcript().to_vec(),
        categorization: state.categorization().cloned(),
    }
}

async fn handle_create_session(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    // An empty body starts a session in the default language.
    let request: CreateSessionRequest = if body.is_empty() {
        CreateSessionRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| bad_request(e.to_string()))?
    };
    let language = match request.language {
        Some(raw) => raw.parse::<Language>().map_err(|e| bad_request(e.to_string()))?,
        None => state.services.default_language,
    };

    let id = uuid::Uuid::new_v4().to_string();
    let mut entry = SessionEntry {
        state: state.services.flow.start(language),
        filed: None,
        last_activity: Instant::now(),
    };
    let body = view(&state.services, &id, &mut entry, true).await;

    state
        .sessions
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(id.clone(), Arc::new(tokio::sync::Mutex::new(entry)));
    info!(session = %id, %language, "session started");

    Ok((StatusCode::CREATED, Json(body)))
}

async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    let handle = state.session(&id)?;
    let mut entry = handle.lock().await;
    entry.touch();
    Ok(Json(view(&state.services, &id, &mut entry, false).await))
}

async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let removed = state
        .sessions
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(&id);
    match removed {
        Some(_) => {
            info!(session = %id, "session abandoned");
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err(not_found(format!("no session with id {}", id))),
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct TurnRequest {
    text: Option<String>,
    /// Base64-encoded WAV clip; takes precedence over `text`.
    audio: Option<String>,
    attachments: Vec<Attachment>,
}

#[derive(Serialize)]
struct TurnResponse {
    /// Text recognized from `audio`.
    heard: Option<String>,
    /// Why an audio turn produced no input.
    notice: Option<&'static str>,
    outcome: Option<TurnOutcome>,
    session: SessionView,
}

async fn handle_turn(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<TurnRequest>,
) -> Result<Json<TurnResponse>, AppError> {
    let handle = state.session(&id)?;
    let mut entry = handle.lock().await;
    entry.touch();
    if let Some(ticket) = &entry.filed {
        return Err(conflict(format!("session already filed as {}", ticket)));
    }
    let services = &state.services;

    let mut heard = None;
    let text = match request.audio {
        Some(audio) => {
            let wav = base64::engine::general_purpose::STANDARD
                .decode(audio.trim())
                .map_err(|e| bad_request(format!("audio is not valid base64: {}", e)))?;
            match services.speech.resolve(&wav, entry.state.language()).await {
                SpeechResolution::Text(text) => {
                    heard = Some(text.clone());
                    text
                }
                other => {
                    return Ok(Json(TurnResponse {
                        heard: None,
                        notice: other.notice(),
                        outcome: None,
                        session: view(services, &id, &mut entry, false).await,
                    }));
                }
            }
        }
        None => request.text.unwrap_or_default(),
    };

    let input = TurnInput::text(text).with_attachments(request.attachments);
    let outcome = services.flow.handle_turn(&mut entry.state, input).await;
    let session = view(services, &id, &mut entry, true).await;

    Ok(Json(TurnResponse {
        heard,
        notice: None,
        outcome: Some(outcome),
        session,
    }))
}

#[derive(Serialize)]
struct ReceiptResponse {
    #[serde(flatten)]
    receipt: FilingReceipt,
    warning: Option<String>,
}

impl From<FilingReceipt> for ReceiptResponse {
    fn from(receipt: FilingReceipt) -> Self {
        let warning = receipt.warning();
        Self { receipt, warning }
    }
}

async fn handle_file_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<ReceiptResponse>), AppError> {
    let handle = state.session(&id)?;
    let mut entry = handle.lock().await;
    entry.touch();

    if let Some(ticket) = &entry.filed {
        return Err(conflict(format!("session already filed as {}", ticket)));
    }
    let draft = entry
        .state
        .draft()
        .ok_or_else(|| conflict("session is not complete; answer or submit first"))?;

    // On a store error the session stays as it is so the client can retry.
    let receipt = state.services.filing.file(draft).await?;
    entry.filed = Some(receipt.ticket_id.clone());
    state.retire(&id, receipt.ticket_id.clone());
    info!(session = %id, ticket = %receipt.ticket_id, "session filed");

    Ok((StatusCode::CREATED, Json(receipt.into())))
}

// ============ Complaints ============

async fn handle_submit_form(
    State(state): State<AppState>,
    Json(form): Json<ComplaintForm>,
) -> Result<(StatusCode, Json<ReceiptResponse>), AppError> {
    let services = &state.services;
    let draft = prepare_form(
        form,
        services.flow.questions(),
        services.default_language,
        services.flow.adapters(),
    )
    .await?;
    let receipt = services.filing.file(draft).await?;
    Ok((StatusCode::CREATED, Json(receipt.into())))
}

#[derive(Serialize)]
struct TrackResponse {
    ticket_id: TicketId,
    status: ComplaintStatus,
    date_filed: String,
    last_updated: String,
    category: Category,
    explanation: String,
}

async fn handle_track(
    State(state): State<AppState>,
    Path(ticket): Path<String>,
) -> Result<Json<TrackResponse>, AppError> {
    let ticket = TicketId::from_user_input(&ticket);
    let record = state
        .services
        .store()
        .fetch(&ticket)
        .await?
        .ok_or(StoreError::NotFound(ticket))?;

    Ok(Json(TrackResponse {
        date_filed: format_timestamp(&record.filed_at),
        last_updated: format_timestamp(&record.last_updated),
        ticket_id: record.ticket_id,
        status: record.status,
        category: record.category,
        explanation: record.explanation,
    }))
}

async fn handle_report(
    State(state): State<AppState>,
    Path(ticket): Path<String>,
) -> Result<Response, AppError> {
    let ticket = TicketId::from_user_input(&ticket);
    let record = state
        .services
        .store()
        .fetch(&ticket)
        .await?
        .ok_or(StoreError::NotFound(ticket))?;

    let pdf = render_complaint_pdf(&record).map_err(|e| internal(format!("{:#}", e)))?;
    let disposition = format!("attachment; filename=\"Complaint_{}.pdf\"", record.ticket_id);
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        pdf,
    )
        .into_response())
}

async fn handle_stats(State(state): State<AppState>) -> Result<Json<ComplaintStats>, AppError> {
    Ok(Json(state.services.store().stats().await?))
}
