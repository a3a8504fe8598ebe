use thiserror::Error;
use uuid::Uuid;

use crate::models::SessionStatus;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Other error: {0}")]
    Other(String),
}

/// Errors reported to callers of the session control surface.
///
/// Validation failures never change stored state.
#[derive(Error, Debug)]
pub enum ControlError {
    #[error("session {0} not found")]
    NotFound(Uuid),

    #[error("only active sessions can be paused (session is {current})")]
    NotActive { current: SessionStatus },

    #[error("only paused sessions can be resumed (session is {current})")]
    NotPaused { current: SessionStatus },

    #[error("invalid interval: {0}")]
    InvalidInterval(f64),

    #[error("message file {0} does not exist")]
    MissingMessageFile(String),

    #[error(transparent)]
    Store(#[from] RelayError),
}

impl From<sqlx::Error> for ControlError {
    fn from(e: sqlx::Error) -> Self {
        ControlError::Store(RelayError::Database(e))
    }
}

impl ControlError {
    /// True for errors caused by the request rather than the server.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ControlError::NotActive { .. }
                | ControlError::NotPaused { .. }
                | ControlError::InvalidInterval(_)
                | ControlError::MissingMessageFile(_)
        )
    }
}
