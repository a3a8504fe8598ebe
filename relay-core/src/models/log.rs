use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One line of a session's append-only log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct LogEntry {
    pub ts: DateTime<Utc>,
    pub message: String,
}

impl LogEntry {
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            ts: Utc::now(),
            message: message.into(),
        }
    }
}
