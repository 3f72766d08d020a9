//! HTTP API v1: per-browser chat sessions over uploaded documents.
//!
//! Endpoints (nested under `/v1`):
//!
//! - `POST   /sessions`                       Create a session
//! - `GET    /sessions/{id}`                  Connectivity, retention, stats
//! - `GET    /sessions/{id}/files`            List uploaded files
//! - `POST   /sessions/{id}/files?name=...`   Upload a file (raw body)
//! - `DELETE /sessions/{id}/files`            Remove all files
//! - `DELETE /sessions/{id}/files/{name}`     Remove one file
//! - `GET    /sessions/{id}/selection`        Files attached to prompts
//! - `PUT    /sessions/{id}/selection`        Replace the selection
//! - `POST   /sessions/{id}/chat`             Ask about the selected files
//! - `GET    /sessions/{id}/messages`         Conversation log
//! - `DELETE /sessions/{id}/messages`         Clear chat history
//! - `POST   /sessions/{id}/conversations`    Start a new conversation
//! - `GET    /sessions/{id}/export`           Download the transcript

use axum::{
    Router,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use docchat_agent::{Connectivity, Session, SessionFactory, SessionId, SessionStats};
use docchat_core::error::{Error, FileError};
use docchat_core::file::UploadedFile;
use docchat_core::message::Message;

// ── State ─────────────────────────────────────────────────────────────────

/// One session, locked for the whole of each request that touches it.
pub type SharedSession = Arc<Mutex<Session>>;

struct SessionSlot {
    created_at: DateTime<Utc>,
    session: SharedSession,
}

/// Shared state for the v1 API.
pub struct ApiV1State {
    pub factory: SessionFactory,
    /// Oldest sessions are evicted beyond this many.
    pub max_sessions: usize,
    sessions: RwLock<HashMap<SessionId, SessionSlot>>,
}

impl ApiV1State {
    pub fn new(factory: SessionFactory, max_sessions: usize) -> Self {
        Self {
            factory,
            max_sessions: max_sessions.max(1),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn create_session(&self) -> (SessionId, SharedSession) {
        let session = self.factory.new_session();
        let id = session.id();
        let created_at = session.created_at();
        let shared = Arc::new(Mutex::new(session));

        let mut sessions = self.sessions.write().await;
        while sessions.len() >= self.max_sessions {
            let Some(oldest) = sessions
                .iter()
                .min_by_key(|(_, slot)| slot.created_at)
                .map(|(k, _)| *k)
            else {
                break;
            };
            sessions.remove(&oldest);
            info!(session = %oldest, "Evicted oldest session");
        }
        sessions.insert(
            id,
            SessionSlot {
                created_at,
                session: shared.clone(),
            },
        );
        (id, shared)
    }

    async fn session(&self, id: &str) -> Result<SharedSession, ApiError> {
        let not_found = || {
            error_response(
                StatusCode::NOT_FOUND,
                format!("Session '{id}' not found"),
            )
        };
        let id: SessionId = id.parse().map_err(|_| not_found())?;
        self.sessions
            .read()
            .await
            .get(&id)
            .map(|slot| slot.session.clone())
            .ok_or_else(not_found)
    }
}

pub type SharedApiState = Arc<ApiV1State>;

// ── Router ────────────────────────────────────────────────────────────────

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedApiState) -> Router {
    Router::new()
        .route("/sessions", post(create_session_handler))
        .route("/sessions/{id}", get(get_session_handler))
        .route(
            "/sessions/{id}/files",
            get(list_files_handler)
                .post(upload_file_handler)
                .delete(clear_files_handler),
        )
        .route("/sessions/{id}/files/{name}", delete(delete_file_handler))
        .route(
            "/sessions/{id}/selection",
            get(get_selection_handler).put(put_selection_handler),
        )
        .route("/sessions/{id}/chat", post(chat_handler))
        .route(
            "/sessions/{id}/messages",
            get(list_messages_handler).delete(clear_messages_handler),
        )
        .route(
            "/sessions/{id}/conversations",
            post(new_conversation_handler),
        )
        .route("/sessions/{id}/export", get(export_handler))
        .with_state(state)
}

// ── DTOs ──────────────────────────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Serialize, Deserialize)]
struct CreateSessionResponse {
    id: String,
    connectivity: ConnectivityDto,
    retention_hours: u32,
    notice: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct ConnectivityDto {
    connected: bool,
    reason: Option<String>,
}

impl From<Connectivity> for ConnectivityDto {
    fn from(c: Connectivity) -> Self {
        match c {
            Connectivity::Connected => Self {
                connected: true,
                reason: None,
            },
            Connectivity::Disconnected { reason } => Self {
                connected: false,
                reason: Some(reason),
            },
        }
    }
}

#[derive(Serialize, Deserialize)]
struct SessionStatusResponse {
    id: String,
    connectivity: ConnectivityDto,
    retention_hours: u32,
    created_at: String,
    stats: StatsDto,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct StatsDto {
    files: usize,
    selected: usize,
    messages: usize,
    total_bytes: u64,
    total_size: String,
}

impl From<SessionStats> for StatsDto {
    fn from(s: SessionStats) -> Self {
        Self {
            files: s.files,
            selected: s.selected,
            messages: s.messages,
            total_bytes: s.total_bytes,
            total_size: docchat_core::format_file_size(s.total_bytes),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct FileDto {
    name: String,
    size_bytes: u64,
    size: String,
    mime_type: String,
    icon: String,
    uploaded_at: String,
    uploaded_time: String,
    selected: bool,
}

impl FileDto {
    fn from_file(f: &UploadedFile, selected: bool) -> Self {
        Self {
            name: f.name.clone(),
            size_bytes: f.size_bytes,
            size: f.formatted_size(),
            mime_type: f.mime_type.clone(),
            icon: f.icon().to_string(),
            uploaded_at: f.uploaded_at.to_rfc3339(),
            uploaded_time: f.uploaded_time(),
            selected,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct FileListResponse {
    files: Vec<FileDto>,
    retention_hours: u32,
}

#[derive(Deserialize)]
struct UploadQuery {
    name: String,
}

#[derive(Serialize, Deserialize)]
struct RemovedResponse {
    removed: usize,
}

#[derive(Serialize, Deserialize)]
struct SelectionBody {
    names: Vec<String>,
}

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
}

#[derive(Serialize, Deserialize)]
struct MessageDto {
    id: String,
    role: String,
    content: String,
    context_files: Vec<String>,
    timestamp: String,
}

impl From<&Message> for MessageDto {
    fn from(m: &Message) -> Self {
        Self {
            id: m.id.clone(),
            role: m.role.as_str().to_string(),
            content: m.content.clone(),
            context_files: m.context_files.clone(),
            timestamp: m.timestamp.to_rfc3339(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct ChatResponse {
    user: MessageDto,
    assistant: MessageDto,
}

#[derive(Serialize, Deserialize)]
struct MessageListResponse {
    messages: Vec<MessageDto>,
}

// ── Errors ────────────────────────────────────────────────────────────────

fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn api_error(e: Error) -> ApiError {
    let status = match &e {
        Error::Connection(_) | Error::Disconnected { .. } => StatusCode::SERVICE_UNAVAILABLE,
        Error::File(FileError::DuplicateName(_)) => StatusCode::CONFLICT,
        Error::File(FileError::FileTooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
        Error::File(FileError::RemoteUpload { .. }) | Error::Generation(_) => {
            StatusCode::BAD_GATEWAY
        }
        Error::File(FileError::NotFound(_)) => StatusCode::NOT_FOUND,
    };
    error_response(status, e.to_string())
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn create_session_handler(
    State(state): State<SharedApiState>,
) -> (StatusCode, Json<CreateSessionResponse>) {
    let (id, session) = state.create_session().await;
    let session = session.lock().await;
    let retention_hours = session.retention_hours();

    (
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            id: id.to_string(),
            connectivity: session.connectivity().into(),
            retention_hours,
            notice: format!("Files are removed automatically after {retention_hours} hours"),
        }),
    )
}

async fn get_session_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
) -> Result<Json<SessionStatusResponse>, ApiError> {
    let session = state.session(&id).await?;
    let session = session.lock().await;

    Ok(Json(SessionStatusResponse {
        id: session.id().to_string(),
        connectivity: session.connectivity().into(),
        retention_hours: session.retention_hours(),
        created_at: session.created_at().to_rfc3339(),
        stats: session.stats().into(),
    }))
}

async fn list_files_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
) -> Result<Json<FileListResponse>, ApiError> {
    let session = state.session(&id).await?;
    let session = session.lock().await;

    Ok(Json(FileListResponse {
        files: session
            .files()
            .iter()
            .map(|f| FileDto::from_file(f, session.is_selected(&f.name)))
            .collect(),
        retention_hours: session.retention_hours(),
    }))
}

/// Upload one file. The declared `Content-Length` is validated before the
/// body is read, so oversized or duplicate uploads are never buffered.
async fn upload_file_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Body,
) -> Result<(StatusCode, Json<FileDto>), ApiError> {
    let name = query.name.as_str();
    if name.trim().is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "File name is required"));
    }

    let size_bytes = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .ok_or_else(|| {
            error_response(StatusCode::LENGTH_REQUIRED, "Content-Length header is required")
        })?;

    let session = state.session(&id).await?;
    let mut session = session.lock().await;
    session.check_upload(name, size_bytes).map_err(api_error)?;

    let limit = usize::try_from(size_bytes).unwrap_or(usize::MAX);
    let bytes = axum::body::to_bytes(body, limit).await.map_err(|e| {
        warn!(file = %name, error = %e, "Failed to read upload body");
        error_response(StatusCode::BAD_REQUEST, format!("Failed to read upload: {e}"))
    })?;

    let file = session
        .upload(bytes.to_vec(), name, size_bytes)
        .await
        .map_err(api_error)?;
    let selected = session.is_selected(&file.name);

    Ok((StatusCode::CREATED, Json(FileDto::from_file(&file, selected))))
}

async fn delete_file_handler(
    State(state): State<SharedApiState>,
    Path((id, name)): Path<(String, String)>,
) -> Result<Json<RemovedResponse>, ApiError> {
    let session = state.session(&id).await?;
    let mut session = session.lock().await;
    session.remove_file(&name).map_err(api_error)?;
    Ok(Json(RemovedResponse { removed: 1 }))
}

async fn clear_files_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
) -> Result<Json<RemovedResponse>, ApiError> {
    let session = state.session(&id).await?;
    let mut session = session.lock().await;
    let removed = session.clear_files().map_err(api_error)?;
    Ok(Json(RemovedResponse { removed }))
}

async fn get_selection_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
) -> Result<Json<SelectionBody>, ApiError> {
    let session = state.session(&id).await?;
    let session = session.lock().await;
    Ok(Json(SelectionBody {
        names: session.selection().names(),
    }))
}

async fn put_selection_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
    Json(payload): Json<SelectionBody>,
) -> Result<Json<SelectionBody>, ApiError> {
    let session = state.session(&id).await?;
    let mut session = session.lock().await;
    let selection = session.select(payload.names).map_err(api_error)?;
    Ok(Json(SelectionBody {
        names: selection.names(),
    }))
}

async fn chat_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let prompt = payload.message.trim();
    if prompt.is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "Message is empty"));
    }

    let session = state.session(&id).await?;
    let mut session = session.lock().await;
    info!(session = %id, "v1/chat request");

    let assistant = session.ask(prompt).await.map_err(api_error)?;
    let messages = session.messages();
    let user = messages
        .len()
        .checked_sub(2)
        .and_then(|i| messages.get(i))
        .ok_or_else(|| {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Conversation log out of sync")
        })?;

    Ok(Json(ChatResponse {
        user: user.into(),
        assistant: (&assistant).into(),
    }))
}

async fn list_messages_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
) -> Result<Json<MessageListResponse>, ApiError> {
    let session = state.session(&id).await?;
    let session = session.lock().await;
    Ok(Json(MessageListResponse {
        messages: session.messages().iter().map(MessageDto::from).collect(),
    }))
}

async fn clear_messages_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let session = state.session(&id).await?;
    session.lock().await.clear_history();
    Ok(StatusCode::NO_CONTENT)
}

async fn new_conversation_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let session = state.session(&id).await?;
    session.lock().await.new_conversation();
    Ok(StatusCode::NO_CONTENT)
}

async fn export_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let session = state.session(&id).await?;
    let transcript = session.lock().await.export();

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", transcript.filename),
            ),
        ],
        transcript.body,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use docchat_agent::Orchestrator;
    use docchat_core::error::ProviderError;
    use docchat_core::provider::{
        FileStore, GenerationRequest, GenerationResponse, GenerationService, RemoteHandle,
        UploadMetadata,
    };

    /// In-memory storage service for gateway tests.
    struct MockStore;

    #[async_trait::async_trait]
    impl FileStore for MockStore {
        fn name(&self) -> &str {
            "gateway_mock"
        }

        async fn upload(
            &self,
            _bytes: Vec<u8>,
            metadata: UploadMetadata,
        ) -> Result<RemoteHandle, ProviderError> {
            Ok(RemoteHandle {
                name: format!("files/{}", metadata.display_name),
                uri: format!("https://files.test/{}", metadata.display_name),
                mime_type: metadata.mime_type,
                expires_at: None,
            })
        }
    }

    /// Answers with the number of attached files.
    struct MockGenerator;

    #[async_trait::async_trait]
    impl GenerationService for MockGenerator {
        fn name(&self) -> &str {
            "gateway_mock"
        }

        async fn generate(
            &self,
            request: GenerationRequest,
        ) -> Result<GenerationResponse, ProviderError> {
            Ok(GenerationResponse {
                text: format!("Read {} file(s)", request.file_handles().count()),
                model: request.model,
                usage: None,
            })
        }
    }

    fn test_api_state() -> SharedApiState {
        let factory =
            SessionFactory::connected(Arc::new(MockStore), Orchestrator::new(Arc::new(MockGenerator)));
        Arc::new(ApiV1State::new(factory, 10))
    }

    async fn json_body<T: serde::de::DeserializeOwned>(response: Response) -> T {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    async fn create_session(state: &SharedApiState) -> String {
        let req = Request::builder()
            .method("POST")
            .uri("/sessions")
            .body(Body::empty())
            .unwrap();
        let response = v1_router(state.clone()).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        json_body::<CreateSessionResponse>(response).await.id
    }

    fn upload_request(id: &str, name: &str, content: &'static [u8]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(format!("/sessions/{id}/files?name={name}"))
            .header(header::CONTENT_LENGTH, content.len())
            .body(Body::from(content))
            .unwrap()
    }

    fn json_request(method: &str, uri: String, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn create_session_reports_connectivity_and_retention() {
        let state = test_api_state();
        let req = Request::builder()
            .method("POST")
            .uri("/sessions")
            .body(Body::empty())
            .unwrap();

        let response = v1_router(state.clone()).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let created: CreateSessionResponse = json_body(response).await;
        assert!(created.connectivity.connected);
        assert_eq!(created.retention_hours, 48);
        assert!(created.notice.contains("48 hours"));
        assert_eq!(state.session_count().await, 1);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let state = test_api_state();

        for uri in [
            "/sessions/not-a-uuid".to_string(),
            format!("/sessions/{}", SessionId::new()),
        ] {
            let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
            let response = v1_router(state.clone()).oneshot(req).await.unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }
    }

    #[tokio::test]
    async fn upload_then_list_files() {
        let state = test_api_state();
        let id = create_session(&state).await;

        let response = v1_router(state.clone())
            .oneshot(upload_request(&id, "report.pdf", b"%PDF-1.4"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let file: FileDto = json_body(response).await;
        assert_eq!(file.mime_type, "application/pdf");
        assert_eq!(file.size, "8.0B");
        assert_eq!(file.icon, "📄");

        let req = Request::builder()
            .uri(format!("/sessions/{id}/files"))
            .body(Body::empty())
            .unwrap();
        let response = v1_router(state.clone()).oneshot(req).await.unwrap();
        let list: FileListResponse = json_body(response).await;
        assert_eq!(list.files.len(), 1);
        assert_eq!(list.files[0].name, "report.pdf");
        assert!(!list.files[0].selected);
        assert_eq!(list.files[0].uploaded_time.len(), 8);
    }

    #[tokio::test]
    async fn duplicate_upload_conflicts() {
        let state = test_api_state();
        let id = create_session(&state).await;

        let first = v1_router(state.clone())
            .oneshot(upload_request(&id, "a.csv", b"x,y\n"))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);

        let second = v1_router(state.clone())
            .oneshot(upload_request(&id, "a.csv", b"x,y\n"))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
        let err: ErrorResponse = json_body(second).await;
        assert!(err.error.contains("a.csv"));
    }

    #[tokio::test]
    async fn oversized_upload_rejected_before_reading_body() {
        let state = test_api_state();
        let id = create_session(&state).await;

        let req = Request::builder()
            .method("POST")
            .uri(format!("/sessions/{id}/files?name=huge.pdf"))
            .header(header::CONTENT_LENGTH, 2u64 * 1024 * 1024 * 1024 + 1)
            .body(Body::empty())
            .unwrap();
        let response = v1_router(state.clone()).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn upload_without_length_is_rejected() {
        let state = test_api_state();
        let id = create_session(&state).await;

        let req = Request::builder()
            .method("POST")
            .uri(format!("/sessions/{id}/files?name=a.txt"))
            .body(Body::from("hello"))
            .unwrap();
        let response = v1_router(state.clone()).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::LENGTH_REQUIRED);
    }

    #[tokio::test]
    async fn chat_uses_selected_files() {
        let state = test_api_state();
        let id = create_session(&state).await;
        for name in ["a.pdf", "b.txt"] {
            v1_router(state.clone())
                .oneshot(upload_request(&id, name, b"data"))
                .await
                .unwrap();
        }

        let response = v1_router(state.clone())
            .oneshot(json_request(
                "PUT",
                format!("/sessions/{id}/selection"),
                serde_json::json!({ "names": ["b.txt", "missing.csv"] }),
            ))
            .await
            .unwrap();
        let selection: SelectionBody = json_body(response).await;
        assert_eq!(selection.names, vec!["b.txt"]);

        let response = v1_router(state.clone())
            .oneshot(json_request(
                "POST",
                format!("/sessions/{id}/chat"),
                serde_json::json!({ "message": "Summarize" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let chat: ChatResponse = json_body(response).await;
        assert_eq!(chat.user.role, "user");
        assert_eq!(chat.user.content, "Summarize");
        assert_eq!(chat.assistant.role, "assistant");
        assert_eq!(chat.assistant.content, "Read 1 file(s)");
        assert_eq!(chat.assistant.context_files, vec!["b.txt"]);

        let req = Request::builder()
            .uri(format!("/sessions/{id}"))
            .body(Body::empty())
            .unwrap();
        let status: SessionStatusResponse =
            json_body(v1_router(state.clone()).oneshot(req).await.unwrap()).await;
        assert_eq!(status.stats.files, 2);
        assert_eq!(status.stats.selected, 1);
        assert_eq!(status.stats.messages, 2);
    }

    #[tokio::test]
    async fn empty_chat_message_is_bad_request() {
        let state = test_api_state();
        let id = create_session(&state).await;

        let response = v1_router(state.clone())
            .oneshot(json_request(
                "POST",
                format!("/sessions/{id}/chat"),
                serde_json::json!({ "message": "   " }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_missing_file_is_not_found() {
        let state = test_api_state();
        let id = create_session(&state).await;

        let req = Request::builder()
            .method("DELETE")
            .uri(format!("/sessions/{id}/files/ghost.pdf"))
            .body(Body::empty())
            .unwrap();
        let response = v1_router(state.clone()).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn clear_files_reports_count() {
        let state = test_api_state();
        let id = create_session(&state).await;
        for name in ["a.pdf", "b.pdf"] {
            v1_router(state.clone())
                .oneshot(upload_request(&id, name, b"x"))
                .await
                .unwrap();
        }

        let req = Request::builder()
            .method("DELETE")
            .uri(format!("/sessions/{id}/files"))
            .body(Body::empty())
            .unwrap();
        let response = v1_router(state.clone()).oneshot(req).await.unwrap();
        let removed: RemovedResponse = json_body(response).await;
        assert_eq!(removed.removed, 2);
    }

    #[tokio::test]
    async fn export_is_a_text_attachment() {
        let state = test_api_state();
        let id = create_session(&state).await;
        v1_router(state.clone())
            .oneshot(json_request(
                "POST",
                format!("/sessions/{id}/chat"),
                serde_json::json!({ "message": "hi" }),
            ))
            .await
            .unwrap();

        let req = Request::builder()
            .uri(format!("/sessions/{id}/export"))
            .body(Body::empty())
            .unwrap();
        let response = v1_router(state.clone()).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let disposition = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.starts_with("attachment; filename=\"chat_history_"));
        assert!(disposition.ends_with(".txt\""));

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"USER: hi\nASSISTANT: Read 0 file(s)");
    }

    #[tokio::test]
    async fn clearing_history_empties_messages() {
        let state = test_api_state();
        let id = create_session(&state).await;
        v1_router(state.clone())
            .oneshot(json_request(
                "POST",
                format!("/sessions/{id}/chat"),
                serde_json::json!({ "message": "hi" }),
            ))
            .await
            .unwrap();

        for (method, uri) in [
            ("DELETE", format!("/sessions/{id}/messages")),
            ("POST", format!("/sessions/{id}/conversations")),
        ] {
            let req = Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap();
            let response = v1_router(state.clone()).oneshot(req).await.unwrap();
            assert_eq!(response.status(), StatusCode::NO_CONTENT);
        }

        let req = Request::builder()
            .uri(format!("/sessions/{id}/messages"))
            .body(Body::empty())
            .unwrap();
        let list: MessageListResponse =
            json_body(v1_router(state.clone()).oneshot(req).await.unwrap()).await;
        assert!(list.messages.is_empty());
    }

    #[tokio::test]
    async fn disconnected_session_is_unavailable() {
        let state = Arc::new(ApiV1State::new(
            SessionFactory::disconnected("Provider not configured: missing key"),
            10,
        ));
        let id = create_session(&state).await;

        let response = v1_router(state.clone())
            .oneshot(upload_request(&id, "a.pdf", b"x"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let req = Request::builder()
            .uri(format!("/sessions/{id}"))
            .body(Body::empty())
            .unwrap();
        let status: SessionStatusResponse =
            json_body(v1_router(state.clone()).oneshot(req).await.unwrap()).await;
        assert_eq!(
            status.connectivity,
            ConnectivityDto {
                connected: false,
                reason: Some("Provider not configured: missing key".into()),
            }
        );
    }

    #[test]
    fn errors_map_to_statuses() {
        let provider = || ProviderError::Network("reset".into());
        for (err, expected) in [
            (Error::Connection(provider()), StatusCode::SERVICE_UNAVAILABLE),
            (
                Error::Disconnected {
                    reason: "no key".into(),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                FileError::DuplicateName("a.csv".into()).into(),
                StatusCode::CONFLICT,
            ),
            (
                FileError::RemoteUpload {
                    name: "a.csv".into(),
                    source: provider(),
                }
                .into(),
                StatusCode::BAD_GATEWAY,
            ),
            (Error::Generation(provider()), StatusCode::BAD_GATEWAY),
            (
                FileError::NotFound("a.csv".into()).into(),
                StatusCode::NOT_FOUND,
            ),
        ] {
            let message = err.to_string();
            let (status, Json(body)) = api_error(err);
            assert_eq!(status, expected, "{message}");
            assert_eq!(body.error, message);
        }
    }

    #[tokio::test]
    async fn upload_names_are_registered_verbatim() {
        let factory =
            SessionFactory::connected(Arc::new(MockStore), Orchestrator::new(Arc::new(MockGenerator)));
        let state = Arc::new(ApiV1State::new(factory, 10));
        let id = create_session(&state).await;

        for name in ["a.csv", "%20a.csv"] {
            let response = v1_router(state.clone())
                .oneshot(upload_request(&id, name, b"x,y"))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CREATED, "{name}");
        }

        let response = v1_router(state.clone())
            .oneshot(upload_request(&id, "%20%20", b"x"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let Ok(session) = state.session(&id).await else {
            panic!("session {id} should exist");
        };
        let names: Vec<_> = session
            .lock()
            .await
            .files()
            .iter()
            .map(|f| f.name.clone())
            .collect();
        assert_eq!(names, vec!["a.csv", " a.csv"]);
    }

    #[tokio::test]
    async fn oldest_sessions_are_evicted() {
        let factory =
            SessionFactory::connected(Arc::new(MockStore), Orchestrator::new(Arc::new(MockGenerator)));
        let state = Arc::new(ApiV1State::new(factory, 2));

        let first = create_session(&state).await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        create_session(&state).await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        create_session(&state).await;

        assert_eq!(state.session_count().await, 2);
        let req = Request::builder()
            .uri(format!("/sessions/{first}"))
            .body(Body::empty())
            .unwrap();
        let response = v1_router(state.clone()).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
