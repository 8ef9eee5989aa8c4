//! Poll loop: wait for a job to reach a terminal state

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::AudialClient;
use crate::config::PollConfig;
use crate::error::{Error, Result};
use crate::retry::with_retry_cancellable;
use crate::types::{Event, ExecutionRecord, JobId, JobState};

impl AudialClient {
    /// Poll until the job completes, fails, times out or is cancelled
    ///
    /// `initial` is the last known record; when it is already terminal no
    /// request is made. Cancellation and the deadline are observed between
    /// requests, never in the middle of one.
    pub(crate) async fn poll_until_terminal(
        &self,
        job_id: &JobId,
        initial: ExecutionRecord,
        api_key: &str,
        max_wait: Duration,
        token: &CancellationToken,
    ) -> Result<ExecutionRecord> {
        let polling = &self.config.polling;
        let started = Instant::now();
        let deadline = started + max_wait;
        let mut interval = polling.initial_interval;
        let mut record = initial;
        let mut polls = 0u32;

        loop {
            match record.state {
                JobState::Completed => {
                    tracing::debug!(job_id = %job_id, polls, "job completed");
                    return Ok(record);
                }
                JobState::Failed => {
                    let reason = record.failure_reason();
                    tracing::warn!(
                        job_id = %job_id,
                        reason = reason.as_deref().unwrap_or("none reported"),
                        "job failed remotely"
                    );
                    return Err(Error::JobFailed {
                        job_id: job_id.clone(),
                        reason,
                    });
                }
                JobState::Submitted | JobState::Running => {}
            }

            let now = Instant::now();
            if token.is_cancelled() {
                return Err(cancelled(job_id));
            }
            if now >= deadline {
                return Err(timed_out(job_id, now - started));
            }

            let sleep_for = interval.min(deadline - now);
            tokio::select! {
                _ = token.cancelled() => return Err(cancelled(job_id)),
                _ = tokio::time::sleep(sleep_for) => {}
            }

            let previous = record.state;
            record = self
                .poll_once(job_id, api_key, token, started, deadline)
                .await?;
            polls += 1;

            if record.state != previous {
                tracing::debug!(job_id = %job_id, from = ?previous, to = ?record.state, "job state changed");
                self.emit(Event::StatusChanged {
                    job_id: job_id.clone(),
                    state: record.state,
                });
            }
            interval = next_interval(interval, polling);
        }
    }

    /// One status request wrapped in bounded transport retries
    ///
    /// Every attempt, retries included, first checks the token and the deadline.
    pub(crate) async fn poll_once(
        &self,
        job_id: &JobId,
        api_key: &str,
        token: &CancellationToken,
        started: Instant,
        deadline: Instant,
    ) -> Result<ExecutionRecord> {
        let attempts = AtomicU32::new(0);

        let result = with_retry_cancellable(&self.config.retry, token, || {
            let attempts = &attempts;
            async move {
                if token.is_cancelled() {
                    return Err(cancelled(job_id));
                }
                let now = Instant::now();
                if now >= deadline {
                    return Err(timed_out(job_id, now - started));
                }
                attempts.fetch_add(1, Ordering::Relaxed);
                self.transport
                    .poll_status(job_id, api_key)
                    .await
                    .map_err(Error::from)
            }
        })
        .await;

        result.map_err(|e| match e {
            Error::Transport(source) => Error::PollFailed {
                job_id: job_id.clone(),
                attempts: attempts.load(Ordering::Relaxed),
                source,
            },
            other => other,
        })
    }
}

/// Next poll interval: grow by the multiplier, never past the cap
fn next_interval(current: Duration, polling: &PollConfig) -> Duration {
    Duration::try_from_secs_f64(current.as_secs_f64() * polling.backoff_multiplier)
        .unwrap_or(polling.max_interval)
        .min(polling.max_interval)
}

fn cancelled(job_id: &JobId) -> Error {
    Error::Cancelled {
        job_id: Some(job_id.clone()),
    }
}

fn timed_out(job_id: &JobId, waited: Duration) -> Error {
    Error::Timeout {
        job_id: job_id.clone(),
        waited,
    }
}
