//! Relay HTTP API
//!
//! Axum server exposing message-file uploads and the session control surface.
//! Runs alongside the Unix socket IPC server.
//!
//! Each endpoint has a thin axum handler that delegates to an inner function
//! returning `(StatusCode, json)`; the inner functions are tested directly.
//! Session operations go through the same router as IPC requests.
//!
//! Endpoints:
//! - GET    /health
//! - GET    /version
//! - PUT    /uploads/:name          store a message file
//! - GET    /uploads/:name          download it back
//! - POST   /sessions               start a session
//! - GET    /sessions/:id           masked session view
//! - GET    /sessions/:id/status    status, cursor and recent logs
//! - POST   /sessions/:id/pause|resume|stop
//! - GET    /admin/sessions         (x-admin-password)
//! - GET    /admin/statuses         (x-admin-password)
//! - DELETE /admin/sessions/:id     (x-admin-password)
//! - POST   /admin/password         (x-admin-password)

use std::sync::Arc;

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use relay_core::ipc::{ErrorKind, RelayRequest, RelayResponse};
use relay_core::uploads::{message_lines, sanitize_filename};
use relay_core::{AdminCredentials, AdminError, NewSession, RelayConfig};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::router;
use crate::subsystems::coordinator::SessionCoordinator;

pub const ADMIN_HEADER: &str = "x-admin-password";

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub coordinator: SessionCoordinator,
    pub admin: AdminCredentials,
    pub config: RelayConfig,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/uploads/:name", get(download_handler).put(upload_handler))
        .route("/sessions", post(create_handler))
        .route("/sessions/:id", get(view_handler))
        .route("/sessions/:id/status", get(status_handler))
        .route("/sessions/:id/pause", post(pause_handler))
        .route("/sessions/:id/resume", post(resume_handler))
        .route("/sessions/:id/stop", post(stop_handler))
        .route("/admin/sessions", get(admin_sessions_handler))
        .route("/admin/statuses", get(admin_statuses_handler))
        .route("/admin/sessions/:id", axum::routing::delete(admin_delete_handler))
        .route("/admin/password", post(admin_password_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: HttpState,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", state.config.http.host, state.config.http.port);
    let app = build_router(Arc::new(state));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Relay HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request / Response DTOs
// ============================================================================

/// Body of `POST /sessions`. Fields are optional so that missing ones are
/// reported as 400 with a message instead of a bare extractor rejection.
#[derive(Debug, Deserialize, Default)]
pub struct CreateSessionRequest {
    #[serde(alias = "credential")]
    pub token: Option<String>,
    #[serde(alias = "thread_id")]
    pub target: Option<String>,
    pub prefix: Option<String>,
    #[serde(alias = "interval")]
    pub interval_seconds: Option<f64>,
    #[serde(alias = "message_source")]
    pub message_file: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PasswordRequest {
    pub new_password: Option<String>,
}

/// Standard HTTP error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            status: "error".to_string(),
        }
    }

    fn body(msg: impl Into<String>) -> serde_json::Value {
        serde_json::to_value(Self::new(msg)).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy)]
pub enum SessionAction {
    Pause,
    Resume,
    Stop,
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

pub async fn health_inner(
    coordinator: &SessionCoordinator,
    socket_path: &str,
) -> (StatusCode, serde_json::Value) {
    match relay_core::db::health_check(coordinator.store().pool()).await {
        Ok(version) => (
            StatusCode::OK,
            serde_json::json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "sqlite": version,
                "sender": coordinator.sender_name(),
                "socket": socket_path,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({
                "status": "unhealthy",
                "error": e.to_string(),
            }),
        ),
    }
}

pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "relay/1",
    })
}

/// Store an uploaded message file under its sanitized name.
pub async fn upload_inner(
    coordinator: &SessionCoordinator,
    name: &str,
    body: &[u8],
) -> (StatusCode, serde_json::Value) {
    let Some(stored) = sanitize_filename(name) else {
        return (StatusCode::BAD_REQUEST, ErrorResponse::body("invalid file name"));
    };
    match coordinator.uploads().save(&stored, body).await {
        Ok(stored) => (
            StatusCode::OK,
            serde_json::json!({
                "file": stored,
                "lines": message_lines(body).len(),
            }),
        ),
        Err(e) => {
            tracing::error!(file = %stored, error = %e, "Upload failed");
            (StatusCode::INTERNAL_SERVER_ERROR, ErrorResponse::body(e.to_string()))
        }
    }
}

pub async fn download_inner(
    coordinator: &SessionCoordinator,
    name: &str,
) -> std::result::Result<(String, Vec<u8>), (StatusCode, serde_json::Value)> {
    let not_found = || (StatusCode::NOT_FOUND, ErrorResponse::body("file not found"));
    let stored = sanitize_filename(name).ok_or_else(not_found)?;
    if !coordinator.uploads().exists(&stored).await {
        return Err(not_found());
    }
    match coordinator.uploads().read(&stored).await {
        Ok(bytes) => Ok((stored, bytes)),
        Err(_) => Err(not_found()),
    }
}

pub async fn create_inner(
    coordinator: &SessionCoordinator,
    req: CreateSessionRequest,
) -> (StatusCode, serde_json::Value) {
    let token = match req.token {
        Some(t) if !t.trim().is_empty() => t,
        _ => return (StatusCode::BAD_REQUEST, ErrorResponse::body("token field is required")),
    };
    let target = match req.target {
        Some(t) if !t.trim().is_empty() => t,
        _ => return (StatusCode::BAD_REQUEST, ErrorResponse::body("target field is required")),
    };
    let Some(interval_seconds) = req.interval_seconds else {
        return (
            StatusCode::BAD_REQUEST,
            ErrorResponse::body("interval_seconds field is required"),
        );
    };

    let request = RelayRequest::Create {
        session: NewSession {
            credential: token,
            target,
            prefix: req.prefix,
            interval_seconds,
            message_source: req.message_file,
        },
    };
    into_http(router::handle_request(request, coordinator).await)
}

pub async fn session_inner(
    coordinator: &SessionCoordinator,
    id: Uuid,
    action: SessionAction,
) -> (StatusCode, serde_json::Value) {
    let request = match action {
        SessionAction::Pause => RelayRequest::Pause { id },
        SessionAction::Resume => RelayRequest::Resume { id },
        SessionAction::Stop => RelayRequest::Stop { id },
    };
    into_http(router::handle_request(request, coordinator).await)
}

/// Check the admin header. `Err` carries the response to send instead.
pub async fn authorize(
    admin: &AdminCredentials,
    headers: &HeaderMap,
) -> std::result::Result<(), (StatusCode, serde_json::Value)> {
    let supplied = headers
        .get(ADMIN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if supplied.is_empty() {
        return Err((StatusCode::FORBIDDEN, ErrorResponse::body("admin password required")));
    }
    match admin.verify(supplied).await {
        Ok(true) => Ok(()),
        Ok(false) => {
            tracing::warn!("Rejected admin request with wrong password");
            Err((StatusCode::FORBIDDEN, ErrorResponse::body("wrong admin password")))
        }
        Err(e) => {
            tracing::error!(error = %e, "Admin credential check failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, ErrorResponse::body(e.to_string())))
        }
    }
}

pub async fn change_password_inner(
    admin: &AdminCredentials,
    req: PasswordRequest,
) -> (StatusCode, serde_json::Value) {
    let new_password = req.new_password.unwrap_or_default();
    match admin.set_password(&new_password).await {
        Ok(()) => (StatusCode::OK, serde_json::json!({"ok": true, "msg": "Password changed"})),
        Err(AdminError::TooShort) => (
            StatusCode::BAD_REQUEST,
            ErrorResponse::body(AdminError::TooShort.to_string()),
        ),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorResponse::body(e.to_string())),
    }
}

// ============================================================================
// Axum handler wrappers (thin, delegate to inner functions)
// ============================================================================

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state.coordinator, &state.config.service.socket_path).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn upload_handler(
    State(state): State<Arc<HttpState>>,
    Path(name): Path<String>,
    body: Bytes,
) -> impl IntoResponse {
    let (status, body) = upload_inner(&state.coordinator, &name, &body).await;
    (status, Json(body))
}

pub async fn download_handler(
    State(state): State<Arc<HttpState>>,
    Path(name): Path<String>,
) -> Response {
    match download_inner(&state.coordinator, &name).await {
        Ok((stored, bytes)) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{stored}\""),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err((status, body)) => (status, Json(body)).into_response(),
    }
}

pub async fn create_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<CreateSessionRequest>,
) -> impl IntoResponse {
    let (status, body) = create_inner(&state.coordinator, req).await;
    (status, Json(body))
}

pub async fn view_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let response = router::handle_request(RelayRequest::View { id }, &state.coordinator).await;
    let (status, body) = into_http(response);
    (status, Json(body))
}

pub async fn status_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let response = router::handle_request(RelayRequest::Status { id }, &state.coordinator).await;
    let (status, body) = into_http(response);
    (status, Json(body))
}

pub async fn pause_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let (status, body) = session_inner(&state.coordinator, id, SessionAction::Pause).await;
    (status, Json(body))
}

pub async fn resume_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let (status, body) = session_inner(&state.coordinator, id, SessionAction::Resume).await;
    (status, Json(body))
}

pub async fn stop_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let (status, body) = session_inner(&state.coordinator, id, SessionAction::Stop).await;
    (status, Json(body))
}

pub async fn admin_sessions_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if let Err((status, body)) = authorize(&state.admin, &headers).await {
        return (status, Json(body));
    }
    let (status, body) = into_http(router::handle_request(RelayRequest::List, &state.coordinator).await);
    (status, Json(body))
}

pub async fn admin_statuses_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if let Err((status, body)) = authorize(&state.admin, &headers).await {
        return (status, Json(body));
    }
    let (status, body) =
        into_http(router::handle_request(RelayRequest::Statuses, &state.coordinator).await);
    (status, Json(body))
}

pub async fn admin_delete_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    if let Err((status, body)) = authorize(&state.admin, &headers).await {
        return (status, Json(body));
    }
    let (status, body) =
        into_http(router::handle_request(RelayRequest::Delete { id }, &state.coordinator).await);
    (status, Json(body))
}

pub async fn admin_password_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    Json(req): Json<PasswordRequest>,
) -> impl IntoResponse {
    if let Err((status, body)) = authorize(&state.admin, &headers).await {
        return (status, Json(body));
    }
    let (status, body) = change_password_inner(&state.admin, req).await;
    (status, Json(body))
}

// ============================================================================
// Helpers
// ============================================================================

/// Convert an IPC `RelayResponse` into an HTTP status and body.
pub fn into_http(response: RelayResponse) -> (StatusCode, serde_json::Value) {
    if response.is_ok() {
        return (
            StatusCode::OK,
            response.data.unwrap_or(serde_json::json!({})),
        );
    }
    let status = match response.kind {
        Some(ErrorKind::Invalid) => StatusCode::BAD_REQUEST,
        Some(ErrorKind::NotFound) => StatusCode::NOT_FOUND,
        Some(ErrorKind::Internal) | None => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let msg = response.error.unwrap_or_else(|| "unknown error".to_string());
    (status, ErrorResponse::body(msg))
}

// ============================================================================
// Unit Tests: call inner functions directly
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::config::DeliveryConfig;
    use relay_core::{SessionStore, SimulatedSender, UploadStore};

    async fn make_coordinator() -> (SessionCoordinator, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("relay.db").display());
        let pool = relay_core::db::create_pool(&relay_core::config::DatabaseConfig {
            url,
            max_connections: 4,
        })
        .await
        .unwrap();
        let uploads = UploadStore::new(dir.path().join("uploads"));
        uploads.ensure_dir().await.unwrap();
        let coordinator = SessionCoordinator::new(
            SessionStore::new(pool),
            uploads,
            Arc::new(SimulatedSender),
            &DeliveryConfig {
                poll_interval_ms: 20,
                ..DeliveryConfig::default()
            },
        );
        (coordinator, dir)
    }

    #[test]
    fn test_version_inner_pure() {
        let v = version_inner();
        assert!(v["version"].is_string());
        assert_eq!(v["protocol"], "relay/1");
    }

    #[test]
    fn test_into_http_maps_kinds() {
        let (status, body) = into_http(RelayResponse::ok(serde_json::json!({"count": 0})));
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 0);

        let (status, body) = into_http(RelayResponse::err_kind(ErrorKind::Invalid, "bad"));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad");
        assert_eq!(body["status"], "error");

        let (status, _) = into_http(RelayResponse::err_kind(ErrorKind::NotFound, "gone"));
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = into_http(RelayResponse::err("boom"));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_into_http_error_without_message() {
        let mut resp = RelayResponse::err_kind(ErrorKind::Invalid, "x");
        resp.error = None;
        let (_, body) = into_http(resp);
        assert_eq!(body["error"], "unknown error");
    }

    #[tokio::test]
    async fn test_health_inner_ok() {
        let (coordinator, _dir) = make_coordinator().await;
        let (status, body) = health_inner(&coordinator, "/tmp/relay.sock").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert!(body["sqlite"].is_string());
        assert_eq!(body["socket"], "/tmp/relay.sock");
    }

    #[tokio::test]
    async fn test_create_inner_requires_fields() {
        let (coordinator, _dir) = make_coordinator().await;

        let (status, body) = create_inner(&coordinator, CreateSessionRequest::default()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "token field is required");

        let req = CreateSessionRequest {
            token: Some("tok".to_string()),
            target: Some("  ".to_string()),
            ..Default::default()
        };
        let (status, body) = create_inner(&coordinator, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "target field is required");

        let req = CreateSessionRequest {
            token: Some("tok".to_string()),
            target: Some("1".to_string()),
            ..Default::default()
        };
        let (status, _) = create_inner(&coordinator, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_upload_then_create_with_file() {
        let (coordinator, _dir) = make_coordinator().await;

        let (status, body) = upload_inner(&coordinator, "my lines.txt", b"one\n\ntwo\n").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["file"], "my_lines.txt");
        assert_eq!(body["lines"], 2);

        let req = CreateSessionRequest {
            token: Some("EAAB1234567890".to_string()),
            target: Some("555".to_string()),
            prefix: None,
            interval_seconds: Some(60.0),
            message_file: Some("my lines.txt".to_string()),
        };
        let (status, body) = create_inner(&coordinator, req).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["message_file"], "my_lines.txt");
        assert_eq!(body["status"], "Active");

        coordinator.shutdown().await;
    }

    #[tokio::test]
    async fn test_upload_rejects_unusable_name() {
        let (coordinator, _dir) = make_coordinator().await;
        let (status, body) = upload_inner(&coordinator, "...", b"x").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn test_download_missing_file_is_404() {
        let (coordinator, _dir) = make_coordinator().await;
        let err = download_inner(&coordinator, "absent.txt").await.unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_session_inner_unknown_id_is_404() {
        let (coordinator, _dir) = make_coordinator().await;
        let (status, body) = session_inner(&coordinator, Uuid::new_v4(), SessionAction::Pause).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn test_authorize_checks_header() {
        let dir = tempfile::tempdir().unwrap();
        let admin = AdminCredentials::new(dir.path().join("admin.json"));
        admin.ensure("hunter22").await.unwrap();

        let mut headers = HeaderMap::new();
        let (status, _) = authorize(&admin, &headers).await.unwrap_err();
        assert_eq!(status, StatusCode::FORBIDDEN);

        headers.insert(ADMIN_HEADER, "wrong".parse().unwrap());
        let (status, _) = authorize(&admin, &headers).await.unwrap_err();
        assert_eq!(status, StatusCode::FORBIDDEN);

        headers.insert(ADMIN_HEADER, "hunter22".parse().unwrap());
        assert!(authorize(&admin, &headers).await.is_ok());
    }

    #[tokio::test]
    async fn test_change_password_inner_validates_length() {
        let dir = tempfile::tempdir().unwrap();
        let admin = AdminCredentials::new(dir.path().join("admin.json"));
        admin.ensure("hunter22").await.unwrap();

        let (status, body) = change_password_inner(
            &admin,
            PasswordRequest {
                new_password: Some("abc".to_string()),
            },
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "password must be at least 6 characters");

        let (status, _) = change_password_inner(
            &admin,
            PasswordRequest {
                new_password: Some("longer-secret".to_string()),
            },
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(admin.verify("longer-secret").await.unwrap());
    }
}
