use crate::subsystems::coordinator::SessionCoordinator;
use relay_core::ipc::{ErrorKind, RelayRequest, RelayResponse};
use relay_core::ControlError;
use serde::Serialize;

pub async fn handle_request(request: RelayRequest, coordinator: &SessionCoordinator) -> RelayResponse {
    match request {
        RelayRequest::Ping => RelayResponse::pong(),
        RelayRequest::Health => match relay_core::db::health_check(coordinator.store().pool()).await {
            Ok(version) => RelayResponse::ok(serde_json::json!({
                "sqlite": version,
                "sender": coordinator.sender_name(),
                "status": "healthy"
            })),
            Err(e) => RelayResponse::err(format!("DB Health Check failed: {}", e)),
        },
        RelayRequest::Create { session } => match coordinator.create(session).await {
            Ok(created) => respond(&created.view()),
            Err(e) => control_error(e),
        },
        RelayRequest::Pause { id } => acknowledge(coordinator.pause(id).await, "Paused"),
        RelayRequest::Resume { id } => acknowledge(coordinator.resume(id).await, "Resumed"),
        RelayRequest::Stop { id } => acknowledge(coordinator.stop(id).await, "Stopped"),
        RelayRequest::Delete { id } => acknowledge(coordinator.delete(id).await, "Deleted"),
        RelayRequest::View { id } => match coordinator.view(id).await {
            Ok(view) => respond(&view),
            Err(e) => control_error(e),
        },
        RelayRequest::Status { id } => match coordinator.status(id).await {
            Ok(report) => respond(&report),
            Err(e) => control_error(e),
        },
        RelayRequest::Statuses => match coordinator.statuses().await {
            Ok(statuses) => respond(&statuses),
            Err(e) => control_error(e),
        },
        RelayRequest::List => match coordinator.list().await {
            Ok(sessions) => respond(&serde_json::json!({
                "count": sessions.len(),
                "sessions": sessions
            })),
            Err(e) => control_error(e),
        },
    }
}

/// Map a control-surface error onto the response kind callers branch on.
pub fn control_error(e: ControlError) -> RelayResponse {
    let kind = match &e {
        ControlError::NotFound(_) => ErrorKind::NotFound,
        e if e.is_validation() => ErrorKind::Invalid,
        _ => {
            tracing::error!(error = %e, "Control action failed");
            ErrorKind::Internal
        }
    };
    RelayResponse::err_kind(kind, e.to_string())
}

fn acknowledge(result: Result<(), ControlError>, msg: &str) -> RelayResponse {
    match result {
        Ok(()) => RelayResponse::ok(serde_json::json!({ "ok": true, "msg": msg })),
        Err(e) => control_error(e),
    }
}

fn respond<T: Serialize>(value: &T) -> RelayResponse {
    match serde_json::to_value(value) {
        Ok(data) => RelayResponse::ok(data),
        Err(e) => RelayResponse::err(format!("Serialization error: {}", e)),
    }
}
