use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use super::log::LogEntry;

/// Lifecycle flag of a session. The only state machine in the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionStatus {
    Active,
    Paused,
    Stopped,
}

impl SessionStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Paused => "Paused",
            Self::Stopped => "Stopped",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(Self::Active),
            "Paused" => Ok(Self::Paused),
            "Stopped" => Ok(Self::Stopped),
            other => Err(format!("unknown session status: {other}")),
        }
    }
}

/// One configured, trackable messaging run.
#[derive(Clone, PartialEq)]
pub struct Session {
    pub id: Uuid,
    /// Access token for the outbound endpoint. Never echoed back unmasked.
    pub credential: String,
    /// Remote thread / conversation id.
    pub target: String,
    pub prefix: Option<String>,
    pub interval_seconds: f64,
    /// Upload name whose non-blank lines form the message queue.
    pub message_source: Option<String>,
    /// Index of the next unsent line.
    pub cursor: u32,
    pub status: SessionStatus,
    /// Run id of the loop currently attached to this session.
    pub worker_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("credential", &mask_credential(&self.credential))
            .field("target", &self.target)
            .field("prefix", &self.prefix)
            .field("interval_seconds", &self.interval_seconds)
            .field("message_source", &self.message_source)
            .field("cursor", &self.cursor)
            .field("status", &self.status)
            .field("worker_id", &self.worker_id)
            .finish()
    }
}

impl Session {
    /// A fresh Active session with the cursor at the first line.
    pub fn new(new: NewSession) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            credential: new.credential,
            target: new.target,
            prefix: new.prefix.filter(|p| !p.is_empty()),
            interval_seconds: new.interval_seconds,
            message_source: new.message_source.filter(|m| !m.is_empty()),
            cursor: 0,
            status: SessionStatus::Active,
            worker_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The pause between messages, or `None` if the stored value is unusable.
    pub fn interval(&self) -> Option<Duration> {
        interval_duration(self.interval_seconds)
    }

    /// The text actually sent for a message line.
    pub fn compose(&self, line: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}{line}"),
            None => line.to_string(),
        }
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            id: self.id,
            token: mask_credential(&self.credential),
            target: self.target.clone(),
            prefix: self.prefix.clone(),
            interval_seconds: self.interval_seconds,
            message_file: self.message_source.clone(),
            cursor: self.cursor,
            status: self.status,
            task_id: self.worker_id,
            created_at: self.created_at,
        }
    }
}

/// Fields a caller supplies to start a session.
#[derive(Clone, Serialize, Deserialize)]
pub struct NewSession {
    #[serde(alias = "token")]
    pub credential: String,
    #[serde(alias = "thread_id")]
    pub target: String,
    #[serde(default)]
    pub prefix: Option<String>,
    pub interval_seconds: f64,
    #[serde(default, alias = "message_file")]
    pub message_source: Option<String>,
}

impl fmt::Debug for NewSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewSession")
            .field("credential", &mask_credential(&self.credential))
            .field("target", &self.target)
            .field("prefix", &self.prefix)
            .field("interval_seconds", &self.interval_seconds)
            .field("message_source", &self.message_source)
            .finish()
    }
}

/// Session as shown to users and admins: credential masked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionView {
    pub id: Uuid,
    pub token: String,
    pub target: String,
    pub prefix: Option<String>,
    pub interval_seconds: f64,
    pub message_file: Option<String>,
    pub cursor: u32,
    pub status: SessionStatus,
    pub task_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Read-only snapshot returned to polling clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    /// `Active`, `Paused`, `Stopped`, or `Unknown` for a missing session.
    pub status: String,
    pub task_id: Option<Uuid>,
    pub cursor: Option<u32>,
    pub logs: Vec<LogEntry>,
}

impl StatusReport {
    pub fn unknown() -> Self {
        Self {
            status: "Unknown".to_string(),
            task_id: None,
            cursor: None,
            logs: Vec::new(),
        }
    }
}

/// `secs` as a `Duration`, if it is finite, non-negative and representable.
pub fn interval_duration(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs).ok()
}

/// `abcd****wxyz` for tokens longer than eight characters, `****` otherwise.
pub fn mask_credential(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.is_empty() {
        return String::new();
    }
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}****{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NewSession {
        NewSession {
            credential: "EAAB1234567890xyz".to_string(),
            target: "t_100".to_string(),
            prefix: Some("[bot] ".to_string()),
            interval_seconds: 5.0,
            message_source: Some("lines.txt".to_string()),
        }
    }

    #[test]
    fn test_new_session_starts_active_at_zero() {
        let session = Session::new(sample());
        assert_eq!(session.status, SessionStatus::Active);
        assert_eq!(session.cursor, 0);
        assert!(session.worker_id.is_none());
    }

    #[test]
    fn test_empty_prefix_and_source_become_none() {
        let mut s = sample();
        s.prefix = Some(String::new());
        s.message_source = Some(String::new());
        let session = Session::new(s);
        assert!(session.prefix.is_none());
        assert!(session.message_source.is_none());
        assert_eq!(session.compose("hi"), "hi");
    }

    #[test]
    fn test_compose_prepends_prefix() {
        let session = Session::new(sample());
        assert_eq!(session.compose("hello"), "[bot] hello");
    }

    #[test]
    fn test_interval_duration_range() {
        assert_eq!(interval_duration(0.0), Some(Duration::ZERO));
        assert_eq!(interval_duration(2.5), Some(Duration::from_millis(2500)));
        for bad in [-1.0, f64::NAN, f64::INFINITY, 1e30] {
            assert_eq!(interval_duration(bad), None, "{bad} should be rejected");
        }
    }

    #[test]
    fn test_mask_credential() {
        assert_eq!(mask_credential("EAAB1234567890xyz"), "EAAB****0xyz");
        assert_eq!(mask_credential("short"), "****");
        assert_eq!(mask_credential("12345678"), "****");
        assert_eq!(mask_credential(""), "");
    }

    #[test]
    fn test_debug_never_prints_credential() {
        let session = Session::new(sample());
        let rendered = format!("{session:?}");
        assert!(!rendered.contains("EAAB1234567890xyz"));
        assert!(rendered.contains("EAAB****0xyz"));
    }

    #[test]
    fn test_status_parse_and_display() {
        for status in [SessionStatus::Active, SessionStatus::Paused, SessionStatus::Stopped] {
            assert_eq!(status.as_str().parse::<SessionStatus>().unwrap(), status);
        }
        assert!("Running".parse::<SessionStatus>().is_err());
        assert_eq!(serde_json::to_string(&SessionStatus::Paused).unwrap(), "\"Paused\"");
    }

    #[test]
    fn test_new_session_accepts_form_field_aliases() {
        let json = serde_json::json!({
            "token": "abc",
            "thread_id": "42",
            "interval_seconds": 2,
            "message_file": "m.txt"
        });
        let parsed: NewSession = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.credential, "abc");
        assert_eq!(parsed.target, "42");
        assert_eq!(parsed.message_source.as_deref(), Some("m.txt"));
        assert!(parsed.prefix.is_none());
    }
}
