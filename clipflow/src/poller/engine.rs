//! The polling loop.

use super::backoff::BackoffConfig;
use super::shape::{self, ResultLocation};
use super::task::RemoteTask;
use crate::core::{Artifact, TaskStatus};
use crate::errors::{TaskError, TransportError};
use crate::providers::HttpTransport;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Counters from one `await_completion` run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollStats {
    /// Status queries issued.
    pub polls: u32,
    /// Waits applied between polls, in order.
    pub waits: Vec<Duration>,
}

enum PollOutcome {
    Done(Artifact),
    Failed(TaskError),
    Waiting(TaskStatus),
    Transient(TransportError),
}

/// Drives remote tasks to a terminal state.
#[derive(Clone)]
pub struct TaskPoller {
    transport: Arc<dyn HttpTransport>,
    backoff: BackoffConfig,
}

impl std::fmt::Debug for TaskPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskPoller")
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl TaskPoller {
    /// Creates a poller.
    #[must_use]
    pub fn new(transport: Arc<dyn HttpTransport>, backoff: BackoffConfig) -> Self {
        Self { transport, backoff }
    }

    /// Returns the backoff configuration.
    #[must_use]
    pub fn backoff(&self) -> BackoffConfig {
        self.backoff
    }

    /// Polls `task` until it succeeds, fails, or `max_wait` elapses.
    pub async fn await_completion(
        &self,
        task: &RemoteTask,
        max_wait: Duration,
    ) -> Result<Artifact, TaskError> {
        self.await_with_stats(task, max_wait).await.0
    }

    /// Like [`await_completion`](Self::await_completion), also returning
    /// poll counters.
    ///
    /// Transient failures (connection errors, unexpected status codes,
    /// follow-up fetch errors) are logged and retried at the current
    /// interval. Every non-terminal status grows the interval.
    ///
    /// `max_wait` bounds the whole call, including a status query or result
    /// fetch that is still in flight when the budget runs out.
    pub async fn await_with_stats(
        &self,
        task: &RemoteTask,
        max_wait: Duration,
    ) -> (Result<Artifact, TaskError>, PollStats) {
        let started = Instant::now();
        let mut schedule = self.backoff.schedule();
        let mut stats = PollStats::default();

        loop {
            let elapsed = started.elapsed();
            if elapsed >= max_wait {
                return (Err(timed_out(task, max_wait, &stats)), stats);
            }

            stats.polls += 1;
            let wait = schedule.current();
            let outcome = match tokio::time::timeout(max_wait - elapsed, self.poll_once(task)).await {
                Ok(outcome) => outcome,
                Err(_) => return (Err(timed_out(task, max_wait, &stats)), stats),
            };
            match outcome {
                PollOutcome::Done(artifact) => {
                    info!(
                        task = %task.label,
                        task_id = %task.id,
                        polls = stats.polls,
                        "Remote task completed"
                    );
                    return (Ok(artifact), stats);
                }
                PollOutcome::Failed(err) => {
                    warn!(task = %task.label, task_id = %task.id, error = %err, "Remote task failed");
                    return (Err(err), stats);
                }
                PollOutcome::Waiting(status) => {
                    info!(
                        task = %task.label,
                        task_id = %task.id,
                        status = %status,
                        elapsed_s = started.elapsed().as_secs(),
                        interval_ms = wait.as_millis() as u64,
                        "Still processing, next check in {}s",
                        wait.as_secs()
                    );
                    schedule.advance();
                }
                PollOutcome::Transient(err) => {
                    warn!(
                        task = %task.label,
                        task_id = %task.id,
                        error = %err,
                        interval_ms = wait.as_millis() as u64,
                        "Status check failed, retrying"
                    );
                }
            }

            let remaining = max_wait.saturating_sub(started.elapsed());
            let wait = wait.min(remaining);
            stats.waits.push(wait);
            tokio::time::sleep(wait).await;
        }
    }

    async fn poll_once(&self, task: &RemoteTask) -> PollOutcome {
        let reply = match self.transport.get_json(&task.status_url, &task.credential).await {
            Ok(reply) => reply,
            Err(err) => return PollOutcome::Transient(err),
        };

        if !reply.is_success() {
            if reply.status == 400 && task.dialect.tolerates_in_progress_rejection() {
                if shape::is_in_progress_rejection(&reply.body) {
                    return PollOutcome::Waiting(TaskStatus::Running);
                }
                return PollOutcome::Failed(TaskError::failed(
                    &task.id,
                    format!("status query rejected: HTTP 400: {}", reply.body_excerpt()),
                ));
            }
            return PollOutcome::Transient(TransportError::status(
                &task.status_url,
                reply.status,
                reply.body_excerpt(),
            ));
        }

        let status = shape::extract_status(&reply.body).map_or(TaskStatus::Unknown, TaskStatus::normalize);
        debug!(task_id = %task.id, status = %status, "Polled remote task");

        match status {
            TaskStatus::Succeeded => self.resolve_result(task, &reply.body).await,
            TaskStatus::Failed => {
                PollOutcome::Failed(TaskError::failed(&task.id, shape::failure_reason(&reply.body)))
            }
            other => PollOutcome::Waiting(other),
        }
    }

    async fn resolve_result(&self, task: &RemoteTask, body: &serde_json::Value) -> PollOutcome {
        let shapes = task.dialect.result_shapes();
        let location = match shape::decode_result(body, shapes) {
            Ok(location) => location,
            Err(err) => return PollOutcome::Failed(err.into()),
        };

        match location {
            ResultLocation::Inline(url) => PollOutcome::Done(Artifact::new(&task.id, url)),
            ResultLocation::FollowUp(result_url) => {
                let reply = match self.transport.get_json(&result_url, &task.credential).await {
                    Ok(reply) => reply,
                    Err(err) => return PollOutcome::Transient(err),
                };
                let reply = match reply.error_for_status(&result_url) {
                    Ok(reply) => reply,
                    Err(err) => return PollOutcome::Transient(err),
                };
                match shape::decode_inline(&reply.body, shapes) {
                    Ok(url) => PollOutcome::Done(Artifact::new(&task.id, url)),
                    Err(err) => PollOutcome::Failed(err.into()),
                }
            }
        }
    }
}

fn timed_out(task: &RemoteTask, max_wait: Duration, stats: &PollStats) -> TaskError {
    warn!(
        task = %task.label,
        task_id = %task.id,
        polls = stats.polls,
        "Timed out waiting for remote task after {}s",
        max_wait.as_secs()
    );
    TaskError::Timeout {
        task_id: task.id.clone(),
        waited: max_wait,
    }
}
