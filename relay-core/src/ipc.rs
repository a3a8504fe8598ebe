use serde::{Deserialize, Serialize};

use crate::models::NewSession;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RelayRequest {
    Ping,
    Health,
    Create {
        session: NewSession,
    },
    Pause {
        id: uuid::Uuid,
    },
    Resume {
        id: uuid::Uuid,
    },
    Stop {
        id: uuid::Uuid,
    },
    Delete {
        id: uuid::Uuid,
    },
    View {
        id: uuid::Uuid,
    },
    Status {
        id: uuid::Uuid,
    },
    Statuses,
    List,
}

/// Coarse failure class carried alongside an error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Invalid,
    NotFound,
    Internal,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RelayResponse {
    pub status: String,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    #[serde(default)]
    pub kind: Option<ErrorKind>,
    pub version: String,
}

impl RelayResponse {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            status: "ok".to_string(),
            data: Some(data),
            error: None,
            kind: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self::err_kind(ErrorKind::Internal, msg)
    }

    pub fn err_kind(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            data: None,
            error: Some(msg.into()),
            kind: Some(kind),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn pong() -> Self {
        Self::ok(serde_json::json!({"pong": true}))
    }

    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_is_tagged_by_action() {
        let id = uuid::Uuid::new_v4();
        let json = serde_json::to_value(RelayRequest::Pause { id }).unwrap();
        assert_eq!(json["action"], "pause");
        assert_eq!(json["id"], id.to_string());

        let parsed: RelayRequest = serde_json::from_value(serde_json::json!({"action": "statuses"})).unwrap();
        assert!(matches!(parsed, RelayRequest::Statuses));
    }

    #[test]
    fn test_error_response_carries_kind() {
        let resp = RelayResponse::err_kind(ErrorKind::NotFound, "missing");
        assert!(!resp.is_ok());
        assert_eq!(resp.kind, Some(ErrorKind::NotFound));
        assert_eq!(resp.error.as_deref(), Some("missing"));
        assert!(RelayResponse::pong().is_ok());
    }
}
