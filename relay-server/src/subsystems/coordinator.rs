//! Session control surface and loop registry.
//!
//! The coordinator owns one `tokio` task per running delivery loop. Every
//! state change goes through the store's compare-and-set operations, so a
//! control action racing a loop (or another control action) never loses an
//! update.

use anyhow::Result;
use relay_core::config::DeliveryConfig;
use relay_core::models::interval_duration;
use relay_core::store::Transition;
use relay_core::uploads::sanitize_filename;
use relay_core::{
    ControlError, MessageSender, NewSession, Session, SessionStatus, SessionStore, SessionView,
    StatusReport, UploadStore,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::worker::{run_delivery_loop, LoopContext, LoopExit};

/// How long delete and shutdown wait for a cancelled loop before aborting it.
const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

struct Worker {
    run_id: Uuid,
    cancel: CancellationToken,
    handle: JoinHandle<Result<LoopExit>>,
}

type Registry = Arc<Mutex<HashMap<Uuid, Worker>>>;

#[derive(Clone)]
pub struct SessionCoordinator {
    ctx: LoopContext,
    workers: Registry,
    log_display_cap: u32,
}

impl SessionCoordinator {
    pub fn new(
        store: SessionStore,
        uploads: UploadStore,
        sender: Arc<dyn MessageSender>,
        config: &DeliveryConfig,
    ) -> Self {
        Self {
            ctx: LoopContext {
                store,
                uploads,
                sender,
                poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            },
            workers: Arc::new(Mutex::new(HashMap::new())),
            log_display_cap: config.log_display_cap,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.ctx.store
    }

    pub fn uploads(&self) -> &UploadStore {
        &self.ctx.uploads
    }

    pub fn sender_name(&self) -> &str {
        self.ctx.sender.name()
    }

    /// Validate, persist as Active with cursor 0, and start its loop.
    pub async fn create(&self, new: NewSession) -> Result<Session, ControlError> {
        if interval_duration(new.interval_seconds).is_none() {
            return Err(ControlError::InvalidInterval(new.interval_seconds));
        }

        let mut new = new;
        if let Some(name) = new.message_source.take().filter(|n| !n.is_empty()) {
            let stored = sanitize_filename(&name)
                .ok_or_else(|| ControlError::MissingMessageFile(name.clone()))?;
            if !self.ctx.uploads.exists(&stored).await {
                return Err(ControlError::MissingMessageFile(stored));
            }
            new.message_source = Some(stored);
        }

        let session = Session::new(new);
        self.ctx.store.insert(&session).await?;
        tracing::info!(
            session_id = %session.id,
            thread = %session.target,
            interval = session.interval_seconds,
            "Session created"
        );

        self.spawn_worker(session.id).await?;
        Ok(self.ctx.store.get(session.id).await?.unwrap_or(session))
    }

    pub async fn pause(&self, id: Uuid) -> Result<(), ControlError> {
        match self
            .ctx
            .store
            .transition(id, &[SessionStatus::Active], SessionStatus::Paused)
            .await?
        {
            Transition::Applied => {
                tracing::info!(session_id = %id, "Session paused");
                Ok(())
            }
            Transition::Rejected(current) => Err(ControlError::NotActive { current }),
            Transition::Missing => Err(ControlError::NotFound(id)),
        }
    }

    /// Paused to Active. Starts a loop only when none is attached, e.g.
    /// after a restart.
    pub async fn resume(&self, id: Uuid) -> Result<(), ControlError> {
        match self
            .ctx
            .store
            .transition(id, &[SessionStatus::Paused], SessionStatus::Active)
            .await?
        {
            Transition::Applied => {
                self.spawn_worker(id).await?;
                tracing::info!(session_id = %id, "Session resumed");
                Ok(())
            }
            Transition::Rejected(current) => Err(ControlError::NotPaused { current }),
            Transition::Missing => Err(ControlError::NotFound(id)),
        }
    }

    /// Any state to Stopped. Stopping a stopped session is a no-op.
    pub async fn stop(&self, id: Uuid) -> Result<(), ControlError> {
        if !self.ctx.store.mark_stopped(id).await? {
            return Err(ControlError::NotFound(id));
        }
        if let Some(worker) = self.workers.lock().await.remove(&id) {
            worker.cancel.cancel();
        }
        tracing::info!(session_id = %id, "Session stopped");
        Ok(())
    }

    /// Cancel and await the session's loop, then remove the session and
    /// its logs.
    pub async fn delete(&self, id: Uuid) -> Result<(), ControlError> {
        let worker = self.workers.lock().await.remove(&id);
        if let Some(worker) = worker {
            join_worker(id, worker).await;
        }

        if !self.ctx.store.remove(id).await? {
            return Err(ControlError::NotFound(id));
        }
        tracing::info!(session_id = %id, "Session deleted");
        Ok(())
    }

    /// Unknown ids report `Unknown` with no logs.
    pub async fn status(&self, id: Uuid) -> Result<StatusReport, ControlError> {
        let Some(session) = self.ctx.store.get(id).await? else {
            return Ok(StatusReport::unknown());
        };
        let logs = self.ctx.store.recent_logs(id, self.log_display_cap).await?;
        Ok(StatusReport {
            status: session.status.to_string(),
            task_id: session.worker_id,
            cursor: Some(session.cursor),
            logs,
        })
    }

    pub async fn statuses(&self) -> Result<HashMap<Uuid, SessionStatus>, ControlError> {
        Ok(self.ctx.store.statuses().await?)
    }

    pub async fn view(&self, id: Uuid) -> Result<SessionView, ControlError> {
        self.ctx
            .store
            .get(id)
            .await?
            .map(|s| s.view())
            .ok_or(ControlError::NotFound(id))
    }

    pub async fn list(&self) -> Result<Vec<SessionView>, ControlError> {
        Ok(self
            .ctx
            .store
            .list()
            .await?
            .iter()
            .map(Session::view)
            .collect())
    }

    /// Restart loops for Active sessions after a process restart. Worker
    /// ids persisted by the previous process are stale and get cleared.
    pub async fn recover(&self) -> Result<usize, ControlError> {
        let stale = self.ctx.store.reset_workers().await?;
        let active = self.ctx.store.with_status(SessionStatus::Active).await?;
        for session in &active {
            self.spawn_worker(session.id).await?;
        }
        tracing::info!(stale, resumed = active.len(), "Recovered sessions");
        Ok(active.len())
    }

    /// Cancel every loop and wait for them to finish.
    pub async fn shutdown(&self) {
        let drained: Vec<(Uuid, Worker)> = self.workers.lock().await.drain().collect();
        tracing::info!(count = drained.len(), "Stopping delivery loops");
        for (_, worker) in &drained {
            worker.cancel.cancel();
        }
        for (id, worker) in drained {
            join_worker(id, worker).await;
        }
    }

    /// True while a loop for `id` is registered and still running.
    pub async fn is_running(&self, id: Uuid) -> bool {
        self.workers
            .lock()
            .await
            .get(&id)
            .is_some_and(|w| !w.handle.is_finished())
    }

    /// Start a loop for `id` unless one is already running. Returns the new
    /// run id, or None when a loop was already attached.
    async fn spawn_worker(&self, id: Uuid) -> Result<Option<Uuid>, ControlError> {
        let mut workers = self.workers.lock().await;
        if workers.get(&id).is_some_and(|w| !w.handle.is_finished()) {
            return Ok(None);
        }

        let run_id = Uuid::new_v4();
        if !self.ctx.store.attach_worker(id, run_id).await? {
            return Err(ControlError::NotFound(id));
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(supervise(
            self.ctx.clone(),
            self.workers.clone(),
            id,
            run_id,
            cancel.clone(),
        ));
        workers.insert(
            id,
            Worker {
                run_id,
                cancel,
                handle,
            },
        );
        tracing::debug!(session_id = %id, run_id = %run_id, "Delivery loop spawned");
        Ok(Some(run_id))
    }
}

/// Run one loop to completion and record how it ended.
async fn supervise(
    ctx: LoopContext,
    workers: Registry,
    id: Uuid,
    run_id: Uuid,
    cancel: CancellationToken,
) -> Result<LoopExit> {
    let result = run_delivery_loop(&ctx, id, run_id, cancel).await;

    match &result {
        Ok(exit) => {
            tracing::info!(session_id = %id, run_id = %run_id, reason = exit.as_str(), "Delivery loop exited");
        }
        Err(e) => {
            tracing::error!(session_id = %id, run_id = %run_id, error = %e, "Delivery loop failed");
            if let Err(store_err) = ctx.store.stop_with_log(id, &format!("[EXCEPTION] {e}")).await {
                tracing::error!(session_id = %id, error = %store_err, "Failed to record loop failure");
            }
        }
    }

    let mut workers = workers.lock().await;
    if workers.get(&id).is_some_and(|w| w.run_id == run_id) {
        workers.remove(&id);
    }

    result
}

async fn join_worker(id: Uuid, worker: Worker) {
    worker.cancel.cancel();
    let mut handle = worker.handle;
    match tokio::time::timeout(JOIN_TIMEOUT, &mut handle).await {
        Ok(Ok(Ok(exit))) => {
            tracing::debug!(session_id = %id, reason = exit.as_str(), "Loop joined");
        }
        Ok(Ok(Err(e))) => tracing::warn!(session_id = %id, error = %e, "Loop ended with error"),
        Ok(Err(e)) => tracing::warn!(session_id = %id, error = %e, "Loop task panicked"),
        Err(_) => {
            tracing::warn!(session_id = %id, "Loop did not stop in time, aborting");
            handle.abort();
        }
    }
}
