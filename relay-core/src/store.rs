//! Durable session store backed by SQLite.
//!
//! Two access styles are offered. `load` / `save` treat the store as one
//! mapping of session id to record, read and rewritten as a whole. Every
//! other method touches a single session in one statement or transaction,
//! so the control surface and the delivery loops can write concurrently
//! without clobbering each other.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::RelayError;
use crate::models::{LogEntry, Session, SessionStatus};

/// Result of a compare-and-set on a session's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    /// The session exists but was not in one of the expected states.
    Rejected(SessionStatus),
    Missing,
}

/// Result of advancing a session's cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Advanced,
    /// Cursor moved or the session was stopped since it was read.
    Conflict,
    Missing,
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    credential: String,
    target: String,
    prefix: Option<String>,
    interval_seconds: f64,
    message_source: Option<String>,
    cursor: i64,
    status: String,
    worker_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for Session {
    type Error = RelayError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let id = parse_uuid(&row.id)?;
        let worker_id = row.worker_id.as_deref().map(parse_uuid).transpose()?;
        let status = row.status.parse::<SessionStatus>().map_err(RelayError::Other)?;
        let cursor = u32::try_from(row.cursor)
            .map_err(|_| RelayError::Other(format!("cursor out of range: {}", row.cursor)))?;

        Ok(Session {
            id,
            credential: row.credential,
            target: row.target,
            prefix: row.prefix,
            interval_seconds: row.interval_seconds,
            message_source: row.message_source,
            cursor,
            status,
            worker_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn parse_uuid(s: &str) -> Result<Uuid, RelayError> {
    Uuid::parse_str(s).map_err(|e| RelayError::Other(format!("invalid id {s}: {e}")))
}

const SELECT_SESSION: &str = "SELECT id, credential, target, prefix, interval_seconds, \
     message_source, cursor, status, worker_id, created_at, updated_at FROM sessions";

#[derive(Debug, Clone)]
pub struct SessionStore {
    pool: SqlitePool,
}

impl SessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ------------------------------------------------------------------
    // Whole-mapping access
    // ------------------------------------------------------------------

    /// Full mapping of every session. An unreadable store yields an empty
    /// mapping; the failure is only logged.
    pub async fn load(&self) -> HashMap<Uuid, Session> {
        match self.try_load().await {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!(error = %e, "Session store unreadable, treating as empty");
                HashMap::new()
            }
        }
    }

    pub async fn try_load(&self) -> Result<HashMap<Uuid, Session>, RelayError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .map(|s| (s.id, s))
            .collect())
    }

    /// Replace the store's sessions with `mapping`. Sessions absent from the
    /// mapping are removed together with their logs; logs of the others are kept.
    pub async fn save(&self, mapping: &HashMap<Uuid, Session>) -> Result<(), RelayError> {
        let mut tx = self.pool.begin().await?;

        let existing: Vec<(String,)> = sqlx::query_as("SELECT id FROM sessions")
            .fetch_all(&mut *tx)
            .await?;
        for (id,) in existing {
            let keep = Uuid::parse_str(&id)
                .map(|uuid| mapping.contains_key(&uuid))
                .unwrap_or(false);
            if !keep {
                sqlx::query("DELETE FROM sessions WHERE id = ?")
                    .bind(&id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        for session in mapping.values() {
            sqlx::query(
                r#"
                INSERT INTO sessions (id, credential, target, prefix, interval_seconds,
                    message_source, cursor, status, worker_id, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    credential = excluded.credential,
                    target = excluded.target,
                    prefix = excluded.prefix,
                    interval_seconds = excluded.interval_seconds,
                    message_source = excluded.message_source,
                    cursor = excluded.cursor,
                    status = excluded.status,
                    worker_id = excluded.worker_id,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(session.id.to_string())
            .bind(&session.credential)
            .bind(&session.target)
            .bind(&session.prefix)
            .bind(session.interval_seconds)
            .bind(&session.message_source)
            .bind(i64::from(session.cursor))
            .bind(session.status.as_str())
            .bind(session.worker_id.map(|w| w.to_string()))
            .bind(session.created_at)
            .bind(session.updated_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Single-session access
    // ------------------------------------------------------------------

    pub async fn insert(&self, session: &Session) -> Result<(), RelayError> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, credential, target, prefix, interval_seconds,
                message_source, cursor, status, worker_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(session.id.to_string())
        .bind(&session.credential)
        .bind(&session.target)
        .bind(&session.prefix)
        .bind(session.interval_seconds)
        .bind(&session.message_source)
        .bind(i64::from(session.cursor))
        .bind(session.status.as_str())
        .bind(session.worker_id.map(|w| w.to_string()))
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Session>, RelayError> {
        let row: Option<SessionRow> = sqlx::query_as(&format!("{SELECT_SESSION} WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Session::try_from).transpose()
    }

    pub async fn list(&self) -> Result<Vec<Session>, RelayError> {
        let rows: Vec<SessionRow> =
            sqlx::query_as(&format!("{SELECT_SESSION} ORDER BY created_at"))
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(Session::try_from).collect()
    }

    pub async fn with_status(&self, status: SessionStatus) -> Result<Vec<Session>, RelayError> {
        let rows: Vec<SessionRow> =
            sqlx::query_as(&format!("{SELECT_SESSION} WHERE status = ? ORDER BY created_at"))
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(Session::try_from).collect()
    }

    /// Every session's status, keyed by id.
    pub async fn statuses(&self) -> Result<HashMap<Uuid, SessionStatus>, RelayError> {
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT id, status FROM sessions")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|(id, status)| -> Result<(Uuid, SessionStatus), RelayError> {
                let status = status.parse::<SessionStatus>().map_err(RelayError::Other)?;
                Ok((parse_uuid(&id)?, status))
            })
            .collect()
    }

    /// Delete the session and its logs. Returns whether it existed.
    pub async fn remove(&self, id: Uuid) -> Result<bool, RelayError> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Move to `to` only if the current status is one of `from`.
    pub async fn transition(
        &self,
        id: Uuid,
        from: &[SessionStatus],
        to: SessionStatus,
    ) -> Result<Transition, RelayError> {
        let placeholders = vec!["?"; from.len()].join(", ");
        let sql = format!(
            "UPDATE sessions SET status = ?, updated_at = ? WHERE id = ? AND status IN ({placeholders})"
        );
        let mut query = sqlx::query(&sql)
            .bind(to.as_str())
            .bind(Utc::now())
            .bind(id.to_string());
        for status in from {
            query = query.bind(status.as_str());
        }

        if query.execute(&self.pool).await?.rows_affected() > 0 {
            return Ok(Transition::Applied);
        }

        Ok(match self.get(id).await? {
            Some(current) => Transition::Rejected(current.status),
            None => Transition::Missing,
        })
    }

    /// Set Stopped and detach any worker. Valid from every state.
    /// Returns false if the session does not exist.
    pub async fn mark_stopped(&self, id: Uuid) -> Result<bool, RelayError> {
        let result = sqlx::query(
            "UPDATE sessions SET status = 'Stopped', worker_id = NULL, updated_at = ? WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Append `message` and force Stopped in one transaction.
    pub async fn stop_with_log(&self, id: Uuid, message: &str) -> Result<bool, RelayError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE sessions SET status = 'Stopped', worker_id = NULL, updated_at = ? WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        insert_log(&mut tx, id, &LogEntry::now(message)).await?;
        tx.commit().await?;
        Ok(true)
    }

    /// Increment the cursor from `expected` and record `message`, atomically.
    /// Refused once the session is Stopped or when another writer moved the cursor.
    pub async fn advance(
        &self,
        id: Uuid,
        expected: u32,
        message: &str,
    ) -> Result<Advance, RelayError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r#"
            UPDATE sessions SET cursor = cursor + 1, updated_at = ?
            WHERE id = ? AND cursor = ? AND status != 'Stopped'
            "#,
        )
        .bind(Utc::now())
        .bind(id.to_string())
        .bind(i64::from(expected))
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(match self.get(id).await? {
                Some(_) => Advance::Conflict,
                None => Advance::Missing,
            });
        }

        insert_log(&mut tx, id, &LogEntry::now(message)).await?;
        tx.commit().await?;
        Ok(Advance::Advanced)
    }

    /// Append a log line only while the session is Active.
    pub async fn append_log(&self, id: Uuid, message: &str) -> Result<bool, RelayError> {
        let entry = LogEntry::now(message);
        let result = sqlx::query(
            r#"
            INSERT INTO session_logs (session_id, ts, message)
            SELECT id, ?, ? FROM sessions WHERE id = ? AND status = 'Active'
            "#,
        )
        .bind(entry.ts)
        .bind(&entry.message)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Replace the session's whole log with `entries`, whatever its status.
    pub async fn replace_logs(&self, id: Uuid, entries: &[LogEntry]) -> Result<(), RelayError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM session_logs WHERE session_id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        for entry in entries {
            insert_log(&mut tx, id, entry).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn attach_worker(&self, id: Uuid, run_id: Uuid) -> Result<bool, RelayError> {
        let result = sqlx::query("UPDATE sessions SET worker_id = ?, updated_at = ? WHERE id = ?")
            .bind(run_id.to_string())
            .bind(Utc::now())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Detach `run_id`; a different attached run is left alone.
    pub async fn clear_worker(&self, id: Uuid, run_id: Uuid) -> Result<bool, RelayError> {
        let result = sqlx::query(
            "UPDATE sessions SET worker_id = NULL, updated_at = ? WHERE id = ? AND worker_id = ?",
        )
        .bind(Utc::now())
        .bind(id.to_string())
        .bind(run_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Forget every persisted worker id. Used at startup, when no loop can be running.
    pub async fn reset_workers(&self) -> Result<u64, RelayError> {
        let result = sqlx::query("UPDATE sessions SET worker_id = NULL WHERE worker_id IS NOT NULL")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// The `limit` most recent log entries, oldest first.
    pub async fn recent_logs(&self, id: Uuid, limit: u32) -> Result<Vec<LogEntry>, RelayError> {
        let mut rows: Vec<LogEntry> = sqlx::query_as(
            "SELECT ts, message FROM session_logs WHERE session_id = ? ORDER BY id DESC LIMIT ?",
        )
        .bind(id.to_string())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.reverse();
        Ok(rows)
    }

    pub async fn logs(&self, id: Uuid) -> Result<Vec<LogEntry>, RelayError> {
        let rows: Vec<LogEntry> =
            sqlx::query_as("SELECT ts, message FROM session_logs WHERE session_id = ? ORDER BY id")
                .bind(id.to_string())
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }

    pub async fn log_count(&self, id: Uuid) -> Result<i64, RelayError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM session_logs WHERE session_id = ?")
            .bind(id.to_string())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }
}

async fn insert_log(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    id: Uuid,
    entry: &LogEntry,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO session_logs (session_id, ts, message) VALUES (?, ?, ?)")
        .bind(id.to_string())
        .bind(entry.ts)
        .bind(&entry.message)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::models::NewSession;

    async fn make_store() -> (SessionStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("store.db").display());
        let pool = crate::db::create_pool(&DatabaseConfig {
            url,
            max_connections: 4,
        })
        .await
        .unwrap();
        (SessionStore::new(pool), dir)
    }

    fn new_session() -> Session {
        Session::new(NewSession {
            credential: "token-abcdefgh".to_string(),
            target: "thread-1".to_string(),
            prefix: Some("> ".to_string()),
            interval_seconds: 1.0,
            message_source: Some("lines.txt".to_string()),
        })
    }

    #[tokio::test]
    async fn test_insert_and_get_roundtrip() {
        let (store, _dir) = make_store().await;
        let session = new_session();
        store.insert(&session).await.unwrap();

        let loaded = store.get(session.id).await.unwrap().expect("session stored");
        assert_eq!(loaded.id, session.id);
        assert_eq!(loaded.credential, "token-abcdefgh");
        assert_eq!(loaded.prefix.as_deref(), Some("> "));
        assert_eq!(loaded.status, SessionStatus::Active);
        assert_eq!(loaded.cursor, 0);
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let (store, _dir) = make_store().await;
        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_transition_is_compare_and_set() {
        let (store, _dir) = make_store().await;
        let session = new_session();
        store.insert(&session).await.unwrap();

        let applied = store
            .transition(session.id, &[SessionStatus::Active], SessionStatus::Paused)
            .await
            .unwrap();
        assert_eq!(applied, Transition::Applied);

        // Second pause sees Paused, not Active
        let rejected = store
            .transition(session.id, &[SessionStatus::Active], SessionStatus::Paused)
            .await
            .unwrap();
        assert_eq!(rejected, Transition::Rejected(SessionStatus::Paused));

        let missing = store
            .transition(Uuid::new_v4(), &[SessionStatus::Active], SessionStatus::Paused)
            .await
            .unwrap();
        assert_eq!(missing, Transition::Missing);
    }

    #[tokio::test]
    async fn test_advance_requires_expected_cursor() {
        let (store, _dir) = make_store().await;
        let session = new_session();
        store.insert(&session).await.unwrap();

        assert_eq!(store.advance(session.id, 0, "> one").await.unwrap(), Advance::Advanced);
        // Stale cursor
        assert_eq!(store.advance(session.id, 0, "> dup").await.unwrap(), Advance::Conflict);
        assert_eq!(store.advance(session.id, 1, "> two").await.unwrap(), Advance::Advanced);

        let loaded = store.get(session.id).await.unwrap().unwrap();
        assert_eq!(loaded.cursor, 2);
        let logs = store.logs(session.id).await.unwrap();
        let messages: Vec<&str> = logs.iter().map(|l| l.message.as_str()).collect();
        assert_eq!(messages, vec!["> one", "> two"]);
    }

    #[tokio::test]
    async fn test_stopped_session_rejects_loop_writes() {
        let (store, _dir) = make_store().await;
        let session = new_session();
        store.insert(&session).await.unwrap();
        assert!(store.mark_stopped(session.id).await.unwrap());

        assert_eq!(store.advance(session.id, 0, "late").await.unwrap(), Advance::Conflict);
        assert!(!store.append_log(session.id, "late heartbeat").await.unwrap());
        assert_eq!(store.log_count(session.id).await.unwrap(), 0);
        assert_eq!(store.get(session.id).await.unwrap().unwrap().cursor, 0);
    }

    #[tokio::test]
    async fn test_paused_session_rejects_heartbeat() {
        let (store, _dir) = make_store().await;
        let session = new_session();
        store.insert(&session).await.unwrap();
        store
            .transition(session.id, &[SessionStatus::Active], SessionStatus::Paused)
            .await
            .unwrap();

        assert!(!store.append_log(session.id, "> heartbeat").await.unwrap());
        assert_eq!(store.log_count(session.id).await.unwrap(), 0);

        store
            .transition(session.id, &[SessionStatus::Paused], SessionStatus::Active)
            .await
            .unwrap();
        assert!(store.append_log(session.id, "> heartbeat").await.unwrap());
    }

    #[tokio::test]
    async fn test_replace_logs_discards_previous_entries() {
        let (store, _dir) = make_store().await;
        let session = new_session();
        store.insert(&session).await.unwrap();
        store.append_log(session.id, "live").await.unwrap();
        assert!(store.mark_stopped(session.id).await.unwrap());

        let entries = vec![LogEntry::now("old 1"), LogEntry::now("old 2")];
        store.replace_logs(session.id, &entries).await.unwrap();
        store.replace_logs(session.id, &entries).await.unwrap();

        let logs = store.logs(session.id).await.unwrap();
        let messages: Vec<&str> = logs.iter().map(|l| l.message.as_str()).collect();
        assert_eq!(messages, vec!["old 1", "old 2"]);
    }

    #[tokio::test]
    async fn test_advance_on_deleted_session_reports_missing() {
        let (store, _dir) = make_store().await;
        let session = new_session();
        store.insert(&session).await.unwrap();
        assert!(store.remove(session.id).await.unwrap());

        assert_eq!(store.advance(session.id, 0, "x").await.unwrap(), Advance::Missing);
        assert!(!store.append_log(session.id, "x").await.unwrap());
        assert!(!store.remove(session.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_stop_with_log_records_reason() {
        let (store, _dir) = make_store().await;
        let mut session = new_session();
        session.worker_id = Some(Uuid::new_v4());
        store.insert(&session).await.unwrap();

        assert!(store.stop_with_log(session.id, "[ERROR] boom").await.unwrap());
        let loaded = store.get(session.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, SessionStatus::Stopped);
        assert!(loaded.worker_id.is_none());
        assert_eq!(store.logs(session.id).await.unwrap()[0].message, "[ERROR] boom");
    }

    #[tokio::test]
    async fn test_clear_worker_only_matches_own_run() {
        let (store, _dir) = make_store().await;
        let session = new_session();
        store.insert(&session).await.unwrap();
        let current = Uuid::new_v4();
        store.attach_worker(session.id, current).await.unwrap();

        assert!(!store.clear_worker(session.id, Uuid::new_v4()).await.unwrap());
        assert_eq!(store.get(session.id).await.unwrap().unwrap().worker_id, Some(current));
        assert!(store.clear_worker(session.id, current).await.unwrap());
        assert!(store.get(session.id).await.unwrap().unwrap().worker_id.is_none());
    }

    #[tokio::test]
    async fn test_recent_logs_capped_oldest_first() {
        let (store, _dir) = make_store().await;
        let session = new_session();
        store.insert(&session).await.unwrap();
        for i in 0..10 {
            store.append_log(session.id, &format!("line {i}")).await.unwrap();
        }

        let recent = store.recent_logs(session.id, 3).await.unwrap();
        let messages: Vec<&str> = recent.iter().map(|l| l.message.as_str()).collect();
        assert_eq!(messages, vec!["line 7", "line 8", "line 9"]);
        assert_eq!(store.log_count(session.id).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_remove_cascades_logs() {
        let (store, _dir) = make_store().await;
        let session = new_session();
        store.insert(&session).await.unwrap();
        store.append_log(session.id, "hello").await.unwrap();

        store.remove(session.id).await.unwrap();
        assert_eq!(store.log_count(session.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_save_replaces_mapping() {
        let (store, _dir) = make_store().await;
        let keep = new_session();
        let drop = new_session();
        store.insert(&keep).await.unwrap();
        store.insert(&drop).await.unwrap();
        store.append_log(keep.id, "kept log").await.unwrap();

        let mut mapping = store.load().await;
        assert_eq!(mapping.len(), 2);
        mapping.remove(&drop.id);
        if let Some(s) = mapping.get_mut(&keep.id) {
            s.status = SessionStatus::Paused;
            s.cursor = 3;
        }
        let added = new_session();
        mapping.insert(added.id, added.clone());

        store.save(&mapping).await.unwrap();

        let reloaded = store.load().await;
        assert_eq!(reloaded.len(), 2);
        assert!(!reloaded.contains_key(&drop.id));
        assert!(reloaded.contains_key(&added.id));
        let kept = &reloaded[&keep.id];
        assert_eq!(kept.status, SessionStatus::Paused);
        assert_eq!(kept.cursor, 3);
        assert_eq!(store.log_count(keep.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_load_swallows_store_errors() {
        let (store, _dir) = make_store().await;
        store.pool().close().await;
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_statuses_and_reset_workers() {
        let (store, _dir) = make_store().await;
        let a = new_session();
        let mut b = new_session();
        b.status = SessionStatus::Paused;
        b.worker_id = Some(Uuid::new_v4());
        store.insert(&a).await.unwrap();
        store.insert(&b).await.unwrap();

        let statuses = store.statuses().await.unwrap();
        assert_eq!(statuses[&a.id], SessionStatus::Active);
        assert_eq!(statuses[&b.id], SessionStatus::Paused);

        assert_eq!(store.reset_workers().await.unwrap(), 1);
        assert_eq!(store.with_status(SessionStatus::Paused).await.unwrap().len(), 1);
    }
}
