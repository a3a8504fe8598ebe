//! The single-file `sessions.json` format.
//!
//! Older deployments kept every session in one JSON object keyed by session
//! id and rewrote the whole file on each change. This module reads and writes
//! that format so such a file can be imported into the database or produced
//! from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use uuid::Uuid;

use crate::error::RelayError;
use crate::models::{interval_duration, LogEntry, Session, SessionStatus};
use crate::store::SessionStore;

/// Interval assumed when a record carries none, or an unreadable one.
pub const DEFAULT_INTERVAL_SECONDS: f64 = 10.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyLog {
    /// Unix seconds.
    pub ts: f64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacySession {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default, rename = "threadId")]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub prefix: Option<String>,
    /// Form input, so either a number or a numeric string.
    #[serde(default)]
    pub interval: serde_json::Value,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub file_index: u32,
    #[serde(default)]
    pub logs: Vec<LegacyLog>,
    #[serde(default)]
    pub task_id: Option<String>,
}

impl LegacySession {
    pub fn interval_seconds(&self) -> f64 {
        let parsed = match &self.interval {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        parsed
            .filter(|v| interval_duration(*v).is_some())
            .unwrap_or(DEFAULT_INTERVAL_SECONDS)
    }

    /// Convert to a stored session. Running task ids are not carried over.
    pub fn into_session(self, key: &str) -> (Session, Vec<LogEntry>) {
        let id = Uuid::parse_str(key).unwrap_or_else(|_| {
            let fresh = Uuid::new_v4();
            tracing::warn!(legacy_id = %key, new_id = %fresh, "Legacy id is not a UUID, reassigning");
            fresh
        });
        let status = self
            .status
            .as_deref()
            .and_then(|s| s.parse::<SessionStatus>().ok())
            .unwrap_or(SessionStatus::Active);
        let interval_seconds = self.interval_seconds();

        let logs: Vec<LogEntry> = self
            .logs
            .into_iter()
            .map(|l| LogEntry {
                ts: from_unix_seconds(l.ts),
                message: l.message,
            })
            .collect();
        let created_at = logs.first().map(|l| l.ts).unwrap_or_else(Utc::now);
        let updated_at = logs.last().map(|l| l.ts).unwrap_or(created_at);

        let session = Session {
            id,
            credential: self.token.unwrap_or_default(),
            target: self.thread_id.unwrap_or_default(),
            prefix: self.prefix.filter(|p| !p.is_empty()),
            interval_seconds,
            message_source: self.file.filter(|f| !f.is_empty()),
            cursor: self.file_index,
            status,
            worker_id: None,
            created_at,
            updated_at,
        };
        (session, logs)
    }

    pub fn from_session(session: &Session, logs: &[LogEntry]) -> Self {
        Self {
            token: Some(session.credential.clone()),
            thread_id: Some(session.target.clone()),
            prefix: session.prefix.clone(),
            interval: serde_json::json!(session.interval_seconds),
            file: session.message_source.clone(),
            status: Some(session.status.as_str().to_string()),
            file_index: session.cursor,
            logs: logs
                .iter()
                .map(|l| LegacyLog {
                    ts: to_unix_seconds(l.ts),
                    message: l.message.clone(),
                })
                .collect(),
            task_id: session.worker_id.map(|w| w.to_string()),
        }
    }
}

fn from_unix_seconds(ts: f64) -> DateTime<Utc> {
    let micros = (ts * 1_000_000.0) as i64;
    DateTime::from_timestamp_micros(micros).unwrap_or_else(Utc::now)
}

fn to_unix_seconds(ts: DateTime<Utc>) -> f64 {
    ts.timestamp_micros() as f64 / 1_000_000.0
}

/// Read a sessions file. A missing or unparseable file yields an empty mapping.
pub async fn load_sessions_file(path: &Path) -> HashMap<String, LegacySession> {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "No sessions file");
            return HashMap::new();
        }
    };
    match serde_json::from_slice(&raw) {
        Ok(map) => map,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Sessions file unparseable, treating as empty");
            HashMap::new()
        }
    }
}

/// Overwrite the sessions file with `mapping`.
pub async fn save_sessions_file(
    path: &Path,
    mapping: &HashMap<String, LegacySession>,
) -> Result<(), RelayError> {
    // Sorted keys keep the output stable between runs
    let ordered: BTreeMap<&String, &LegacySession> = mapping.iter().collect();
    let body = serde_json::to_vec_pretty(&ordered)?;
    tokio::fs::write(path, body).await?;
    Ok(())
}

/// Import every record of a sessions file into `store`. Existing sessions
/// with the same id are overwritten, logs included. Returns the number imported.
pub async fn import_sessions_file(store: &SessionStore, path: &Path) -> Result<usize, RelayError> {
    let legacy = load_sessions_file(path).await;
    let mut mapping = store.try_load().await?;
    let mut imported_logs = Vec::with_capacity(legacy.len());

    for (key, record) in legacy {
        let (session, logs) = record.into_session(&key);
        imported_logs.push((session.id, logs));
        mapping.insert(session.id, session);
    }

    store.save(&mapping).await?;
    for (id, logs) in &imported_logs {
        store.replace_logs(*id, logs).await?;
    }

    tracing::info!(count = imported_logs.len(), path = %path.display(), "Imported legacy sessions");
    Ok(imported_logs.len())
}

/// Write every stored session, with its full log, to a sessions file.
pub async fn export_sessions_file(store: &SessionStore, path: &Path) -> Result<usize, RelayError> {
    let sessions = store.try_load().await?;
    let mut mapping = HashMap::with_capacity(sessions.len());
    for (id, session) in &sessions {
        let logs = store.logs(*id).await?;
        mapping.insert(id.to_string(), LegacySession::from_session(session, &logs));
    }
    save_sessions_file(path, &mapping).await?;
    Ok(mapping.len())
}
