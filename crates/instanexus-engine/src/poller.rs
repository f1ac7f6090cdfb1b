//! Bounded polling of a remote task until it reaches a terminal state.
//!
//! Every attempt is one status request. A transport failure consumes an
//! attempt but is not a task failure. Waits happen only between attempts, so
//! `max_attempts` requests span `(max_attempts - 1) * interval`.

use std::sync::Arc;
use std::time::Duration;

use instanexus_contracts::tasks::{GenerationTask, TaskKind, TaskStatus};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::TaskError;
use crate::remote::TaskApi;

pub const POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const MAX_POLL_ATTEMPTS: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Upper bound on the time one poll sequence spends waiting.
    pub fn ceiling(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(POLL_INTERVAL, MAX_POLL_ATTEMPTS)
    }
}

/// A task that reached `completed` with a result URL.
#[derive(Debug, Clone)]
pub struct CompletedTask {
    pub task: GenerationTask,
    pub result_url: String,
    pub attempts: u32,
}

#[derive(Clone)]
pub struct TaskPoller {
    api: Arc<dyn TaskApi>,
    policy: PollPolicy,
}

impl TaskPoller {
    pub fn new(api: Arc<dyn TaskApi>, policy: PollPolicy) -> Self {
        Self { api, policy }
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    pub async fn poll_until_terminal(
        &self,
        task_id: &str,
        kind: TaskKind,
    ) -> Result<CompletedTask, TaskError> {
        self.poll_until_terminal_with_cancel(task_id, kind, &CancellationToken::new())
            .await
    }

    /// Like [`poll_until_terminal`](Self::poll_until_terminal), but stops with
    /// [`TaskError::Cancelled`] once `cancel` fires.
    pub async fn poll_until_terminal_with_cancel(
        &self,
        task_id: &str,
        kind: TaskKind,
        cancel: &CancellationToken,
    ) -> Result<CompletedTask, TaskError> {
        let mut task = GenerationTask::submitted(task_id, kind);
        let max_attempts = self.policy.max_attempts;

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                return Err(TaskError::Cancelled {
                    task_id: task_id.to_string(),
                });
            }
            debug!(task_id, kind = kind.as_str(), attempt, max_attempts, "polling task");

            match self.api.status(task_id).await {
                Err(err) => {
                    warn!(task_id, attempt, error = %err, "task status request failed");
                }
                Ok(envelope) => {
                    task.apply(&envelope.data);
                    match task.status {
                        TaskStatus::Completed => {
                            let Some(url) = envelope
                                .data
                                .output
                                .as_ref()
                                .and_then(|output| output.image_url())
                            else {
                                return Err(TaskError::MissingResultUrl {
                                    task_id: task_id.to_string(),
                                });
                            };
                            info!(task_id, kind = kind.as_str(), attempt, "task completed");
                            return Ok(CompletedTask {
                                result_url: url.to_string(),
                                task,
                                attempts: attempt,
                            });
                        }
                        TaskStatus::Failed => {
                            let message = task
                                .error
                                .clone()
                                .unwrap_or_else(|| "Unknown error".to_string());
                            return Err(TaskError::RemoteFailure {
                                task_id: task_id.to_string(),
                                message,
                            });
                        }
                        TaskStatus::Unknown => {
                            warn!(task_id, status = %envelope.data.status, "unknown task status");
                        }
                        status => {
                            info!(
                                task_id,
                                status = status.as_str(),
                                progress = task.progress,
                                "task still running"
                            );
                        }
                    }
                }
            }

            if attempt < max_attempts {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        return Err(TaskError::Cancelled {
                            task_id: task_id.to_string(),
                        });
                    }
                    _ = tokio::time::sleep(self.policy.interval) => {}
                }
            }
        }

        warn!(task_id, attempts = max_attempts, "task polling timed out");
        Err(TaskError::TimedOut {
            task_id: task_id.to_string(),
            attempts: max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use instanexus_contracts::tasks::TaskKind;
    use tokio::time::Instant;
    use tokio_util::sync::CancellationToken;

    use super::{PollPolicy, TaskPoller};
    use crate::error::{ApiError, TaskError};
    use crate::testing::{completed, failed, processing, status_with, ScriptedTaskApi};

    fn poller(api: &Arc<ScriptedTaskApi>) -> TaskPoller {
        TaskPoller::new(api.clone(), PollPolicy::default())
    }

    #[tokio::test(start_paused = true)]
    async fn completes_on_the_last_allowed_attempt() {
        let api = Arc::new(ScriptedTaskApi::new());
        for _ in 0..29 {
            api.push_status("t-1", Ok(processing(10)));
        }
        api.push_status("t-1", Ok(completed("https://cdn.example/final.png", &[])));

        let done = poller(&api)
            .poll_until_terminal("t-1", TaskKind::Imagine)
            .await
            .expect("task should complete on attempt 30");
        assert_eq!(done.result_url, "https://cdn.example/final.png");
        assert_eq!(done.attempts, 30);
        assert_eq!(done.task.progress, 100);
        assert_eq!(api.status_calls("t-1"), 30);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_after_exactly_thirty_spaced_polls() {
        let api = Arc::new(ScriptedTaskApi::new());
        let started = Instant::now();

        let err = poller(&api)
            .poll_until_terminal("t-2", TaskKind::Imagine)
            .await
            .err();
        assert!(matches!(
            err,
            Some(TaskError::TimedOut { ref task_id, attempts: 30 }) if task_id == "t-2"
        ));

        let times = api.status_times("t-2");
        assert_eq!(times.len(), 30);
        for pair in times.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::from_secs(10));
        }
        assert_eq!(times[0] - started, Duration::ZERO);
        assert_eq!(started.elapsed(), Duration::from_secs(290));
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failures_consume_attempts_without_failing() {
        let api = Arc::new(ScriptedTaskApi::new());
        api.push_status(
            "t-3",
            Err(ApiError::Status {
                status: 502,
                body: "bad gateway".to_string(),
            }),
        );
        api.push_status("t-3", Ok(status_with("staged")));
        api.push_status("t-3", Ok(status_with("queued-for-gpu")));
        api.push_status("t-3", Ok(completed("https://cdn.example/x.png", &[])));

        let done = poller(&api)
            .poll_until_terminal("t-3", TaskKind::Upscale)
            .await
            .expect("transient errors should not fail the task");
        assert_eq!(done.attempts, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failures_still_count_toward_the_ceiling() {
        let api = Arc::new(ScriptedTaskApi::new());
        for _ in 0..3 {
            api.push_status(
                "t-4",
                Err(ApiError::Decode("truncated body".to_string())),
            );
        }
        let poller = TaskPoller::new(api.clone(), PollPolicy::new(Duration::from_secs(1), 3));

        let err = poller
            .poll_until_terminal("t-4", TaskKind::Imagine)
            .await
            .err();
        assert!(matches!(err, Some(TaskError::TimedOut { attempts: 3, .. })));
        assert_eq!(api.status_calls("t-4"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_status_carries_remote_message_or_placeholder() {
        let api = Arc::new(ScriptedTaskApi::new());
        api.push_status("t-5", Ok(failed(Some("prompt rejected"))));
        api.push_status("t-6", Ok(failed(None)));

        let err = poller(&api)
            .poll_until_terminal("t-5", TaskKind::Imagine)
            .await
            .err();
        assert!(matches!(
            err,
            Some(TaskError::RemoteFailure { ref message, .. }) if message == "prompt rejected"
        ));

        let err = poller(&api)
            .poll_until_terminal("t-6", TaskKind::Imagine)
            .await
            .err();
        assert!(matches!(
            err,
            Some(TaskError::RemoteFailure { ref message, .. }) if message == "Unknown error"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn completed_without_url_is_a_failure() {
        let api = Arc::new(ScriptedTaskApi::new());
        api.push_status("t-7", Ok(completed("", &["upscale1"])));

        let err = poller(&api)
            .poll_until_terminal("t-7", TaskKind::Imagine)
            .await
            .err();
        assert!(matches!(err, Some(TaskError::MissingResultUrl { .. })));
        assert_eq!(api.status_calls("t-7"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_between_attempts() {
        let api = Arc::new(ScriptedTaskApi::new());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(25)).await;
            trigger.cancel();
        });

        let err = poller(&api)
            .poll_until_terminal_with_cancel("t-8", TaskKind::Imagine, &cancel)
            .await
            .err();
        assert!(matches!(err, Some(TaskError::Cancelled { .. })));
        assert_eq!(api.status_calls("t-8"), 3);
    }

    #[test]
    fn default_policy_ceiling_is_five_minutes() {
        assert_eq!(PollPolicy::default().ceiling(), Duration::from_secs(300));
    }
}
