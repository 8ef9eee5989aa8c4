//! Batch coordinator: bounded-concurrency job runs with ordered outcomes

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use super::AudialClient;
use crate::error::Error;
use crate::request::JobRequest;
use crate::types::JobOutcome;

impl AudialClient {
    /// Run many jobs with at most `max_concurrent` in flight
    ///
    /// `None` uses `batch.max_concurrent_jobs`; `Some(0)` is treated as 1.
    /// Outcome `i` always belongs to request `i`, and one job's failure never
    /// affects another. Dropping the returned future cancels the batch.
    pub async fn process_batch(
        &self,
        requests: Vec<JobRequest>,
        max_concurrent: Option<usize>,
    ) -> Vec<JobOutcome> {
        let token = self.cancel_token.child_token();
        let guard = token.clone().drop_guard();
        let outcomes = self
            .process_batch_cancellable(requests, max_concurrent, token)
            .await;
        guard.disarm();
        outcomes
    }

    /// Like [`process_batch`](Self::process_batch), stopping when `token` is cancelled
    ///
    /// Jobs still waiting for a slot when `token` is cancelled finish with
    /// [`Error::Cancelled`] without contacting the service.
    pub async fn process_batch_cancellable(
        &self,
        requests: Vec<JobRequest>,
        max_concurrent: Option<usize>,
        token: CancellationToken,
    ) -> Vec<JobOutcome> {
        let limit = max_concurrent
            .unwrap_or(self.config.batch.max_concurrent_jobs)
            .max(1);
        let semaphore = Arc::new(Semaphore::new(limit));
        tracing::info!(jobs = requests.len(), limit, "starting batch");

        let tasks: Vec<_> = requests
            .into_iter()
            .enumerate()
            .map(|(index, request)| {
                let file = request.file.clone();
                let operation = request.operation();
                let client = self.clone();
                let semaphore = semaphore.clone();
                let job_token = token.child_token();

                let handle = tokio::spawn(async move {
                    // Hold the permit for the whole pipeline
                    let _permit = tokio::select! {
                        biased;
                        _ = job_token.cancelled() => None,
                        permit = semaphore.acquire_owned() => Some(
                            permit.map_err(|e| Error::Other(format!("batch semaphore closed: {e}")))?,
                        ),
                    };
                    client.run_cancellable(request, &job_token).await
                });
                (index, file, operation, handle)
            })
            .collect();

        let outcomes = join_all(tasks.into_iter().map(
            |(index, file, operation, handle)| async move {
                let result = match handle.await {
                    Ok(result) => result,
                    Err(e) => {
                        tracing::error!(index, file = %file.display(), error = %e, "batch job task failed");
                        Err(Error::Other(format!("job task failed: {e}")))
                    }
                };
                JobOutcome {
                    index,
                    file,
                    operation,
                    result,
                }
            },
        ))
        .await;

        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        tracing::info!(jobs = outcomes.len(), failed, "batch finished");
        outcomes
    }
}
