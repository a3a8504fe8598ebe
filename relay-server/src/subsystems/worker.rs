//! Per-session delivery loop
//!
//! One loop runs for each Active session. Every iteration re-reads the
//! session from the store, so pause and stop issued by the control surface
//! are observed at the next poll tick:
//! - Active: send `prefix + line[cursor]`, log it, advance the cursor, then
//!   sleep the session interval in poll-tick steps, re-checking status
//!   after each step.
//! - Paused: idle for one poll tick.
//! - Stopped, deleted, exhausted or missing file: exit.
//!
//! Every suspension point also watches the loop's `CancellationToken`.
//! Sessions without a message file only record a heartbeat each interval,
//! and never more than once per poll tick.

use anyhow::Result;
use relay_core::delivery::{MessageSender, OutboundMessage, SendOutcome};
use relay_core::store::Advance;
use relay_core::{Session, SessionStatus, SessionStore, UploadStore};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Everything a loop needs; cheap to clone into each task.
#[derive(Clone)]
pub struct LoopContext {
    pub store: SessionStore,
    pub uploads: UploadStore,
    pub sender: Arc<dyn MessageSender>,
    pub poll_interval: Duration,
}

/// Why a loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    SessionDeleted,
    StoppedByUser,
    CompletedFile,
    FileMissing,
    Cancelled,
}

impl LoopExit {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SessionDeleted => "session_deleted",
            Self::StoppedByUser => "stopped_by_user",
            Self::CompletedFile => "completed_file",
            Self::FileMissing => "file_missing",
            Self::Cancelled => "cancelled",
        }
    }
}

enum Wake {
    Elapsed,
    Paused,
    Exit(LoopExit),
}

/// Drive `session_id` until it reaches a terminal state.
///
/// Errors (transport failures, store failures) are returned as-is; the
/// caller records them against the session and stops it.
pub async fn run_delivery_loop(
    ctx: &LoopContext,
    session_id: Uuid,
    run_id: Uuid,
    cancel: CancellationToken,
) -> Result<LoopExit> {
    tracing::info!(session_id = %session_id, run_id = %run_id, "Delivery loop started");

    loop {
        if cancel.is_cancelled() {
            return Ok(LoopExit::Cancelled);
        }

        let Some(session) = ctx.store.get(session_id).await? else {
            return Ok(LoopExit::SessionDeleted);
        };

        match session.status {
            SessionStatus::Stopped => {
                ctx.store.clear_worker(session_id, run_id).await?;
                return Ok(LoopExit::StoppedByUser);
            }
            SessionStatus::Paused => {
                if !idle(ctx.poll_interval, &cancel).await {
                    return Ok(LoopExit::Cancelled);
                }
                continue;
            }
            SessionStatus::Active => {}
        }

        let progressed = match &session.message_source {
            Some(name) => match deliver_next(ctx, &session, name).await? {
                Step::Sent => true,
                Step::Retry => false,
                Step::Exit(exit) => return Ok(exit),
            },
            None => ctx
                .store
                .append_log(session_id, &session.compose("heartbeat"))
                .await?,
        };

        if !progressed {
            // Raced with a control action; re-read before doing anything else.
            continue;
        }

        match sleep_interval(ctx, &session, run_id, &cancel).await? {
            Wake::Elapsed | Wake::Paused => continue,
            Wake::Exit(exit) => return Ok(exit),
        }
    }
}

enum Step {
    Sent,
    Retry,
    Exit(LoopExit),
}

async fn deliver_next(ctx: &LoopContext, session: &Session, name: &str) -> Result<Step> {
    let lines = match ctx.uploads.read_lines(name).await {
        Ok(lines) => lines,
        Err(e) => {
            tracing::warn!(session_id = %session.id, file = %name, error = %e, "Message file unreadable");
            ctx.store
                .stop_with_log(session.id, &format!("[ERROR] file {name} missing"))
                .await?;
            return Ok(Step::Exit(LoopExit::FileMissing));
        }
    };

    let cursor = session.cursor as usize;
    let Some(line) = lines.get(cursor) else {
        ctx.store.mark_stopped(session.id).await?;
        tracing::info!(session_id = %session.id, sent = lines.len(), "Message file exhausted");
        return Ok(Step::Exit(LoopExit::CompletedFile));
    };

    let body = session.compose(line);
    let outcome = ctx
        .sender
        .send(OutboundMessage {
            credential: &session.credential,
            target: &session.target,
            body: &body,
        })
        .await?;

    let entry = match outcome {
        SendOutcome::Delivered { .. } => body,
        SendOutcome::Rejected { code, .. } => format!("[FAILED {code}] {body}"),
    };

    Ok(match ctx.store.advance(session.id, session.cursor, &entry).await? {
        Advance::Advanced => Step::Sent,
        Advance::Conflict => Step::Retry,
        Advance::Missing => Step::Exit(LoopExit::SessionDeleted),
    })
}

/// Sleep the session interval in poll-tick steps, re-reading status after each.
async fn sleep_interval(
    ctx: &LoopContext,
    session: &Session,
    run_id: Uuid,
    cancel: &CancellationToken,
) -> Result<Wake> {
    // Out-of-range intervals never shorten the wait
    let mut remaining = session.interval().unwrap_or(Duration::MAX);
    if session.message_source.is_none() {
        remaining = remaining.max(ctx.poll_interval);
    }

    while !remaining.is_zero() {
        let step = remaining.min(ctx.poll_interval);
        if !idle(step, cancel).await {
            return Ok(Wake::Exit(LoopExit::Cancelled));
        }
        remaining = remaining.saturating_sub(step);

        let Some(current) = ctx.store.get(session.id).await? else {
            return Ok(Wake::Exit(LoopExit::SessionDeleted));
        };
        match current.status {
            SessionStatus::Active => {}
            SessionStatus::Paused => return Ok(Wake::Paused),
            SessionStatus::Stopped => {
                ctx.store.clear_worker(session.id, run_id).await?;
                return Ok(Wake::Exit(LoopExit::StoppedByUser));
            }
        }
    }

    Ok(Wake::Elapsed)
}

/// Sleep for `period`; false if cancelled first.
async fn idle(period: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(period) => true,
    }
}
