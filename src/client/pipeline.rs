//! Single-job pipeline: submit, poll, fetch, materialize

use std::path::Path;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::AudialClient;
use crate::error::{Error, Result};
use crate::request::JobRequest;
use crate::types::{Event, JobId, Operation, ResultBundle};

impl AudialClient {
    /// Run one job to completion
    ///
    /// Returns the result bundle once every artifact was attempted. Artifact
    /// failures do not fail the job; check [`ResultBundle::partial_error`].
    ///
    /// # Errors
    ///
    /// - [`Error::Auth`] when no credential is available or the service rejects it
    /// - [`Error::Validation`] for a missing input file or invalid options
    /// - [`Error::JobFailed`] when the service reports a failure
    /// - [`Error::Timeout`] / [`Error::Cancelled`] when the job did not finish in time
    /// - [`Error::PollFailed`] when status requests kept failing
    pub async fn run(&self, request: JobRequest) -> Result<ResultBundle> {
        let token = self.cancel_token.child_token();
        self.run_cancellable(request, &token).await
    }

    /// Run one job, stopping early when `token` is cancelled
    ///
    /// [`cancel_all`](Self::cancel_all) only reaches this job if `token`
    /// descends from [`cancellation_token`](Self::cancellation_token).
    pub async fn run_cancellable(
        &self,
        request: JobRequest,
        token: &CancellationToken,
    ) -> Result<ResultBundle> {
        let mut submitted = None;
        let result = self.execute(&request, token, &mut submitted).await;
        self.report(Some(&request.file), submitted.as_ref(), &result);
        result
    }

    /// Download the results of an already completed job again
    ///
    /// Existing files in the result directory are overwritten. A job that is
    /// still running is polled until it finishes; `api_key` overrides the
    /// configured credential.
    pub async fn fetch_results(
        &self,
        job_id: &JobId,
        operation: Operation,
        api_key: Option<&str>,
    ) -> Result<ResultBundle> {
        let token = self.cancel_token.child_token();
        let result = self.refetch(job_id, operation, api_key, &token).await;
        self.report(None, Some(job_id), &result);
        result
    }

    async fn execute(
        &self,
        request: &JobRequest,
        token: &CancellationToken,
        submitted: &mut Option<JobId>,
    ) -> Result<ResultBundle> {
        if token.is_cancelled() {
            return Err(Error::Cancelled { job_id: None });
        }
        let api_key = self.resolve_api_key(request)?;
        let (job_id, initial) = self.submit_job(request, &api_key).await?;
        *submitted = Some(job_id.clone());

        let max_wait = request.max_wait.unwrap_or(self.config.polling.max_wait);
        let record = self
            .poll_until_terminal(&job_id, initial, &api_key, max_wait, token)
            .await?;

        self.collect_results(
            &job_id,
            request.operation(),
            record,
            request.results_root.as_deref(),
            &api_key,
            token,
        )
        .await
    }

    async fn refetch(
        &self,
        job_id: &JobId,
        operation: Operation,
        api_key: Option<&str>,
        token: &CancellationToken,
    ) -> Result<ResultBundle> {
        let api_key = self.resolve_key(api_key)?;
        let max_wait = self.config.polling.max_wait;
        let started = Instant::now();

        let current = self
            .poll_once(job_id, &api_key, token, started, started + max_wait)
            .await?;
        let record = self
            .poll_until_terminal(job_id, current, &api_key, max_wait, token)
            .await?;

        self.collect_results(job_id, operation, record, None, &api_key, token)
            .await
    }

    /// Log and broadcast how a job ended
    fn report(&self, file: Option<&Path>, job_id: Option<&JobId>, result: &Result<ResultBundle>) {
        match result {
            Ok(bundle) => {
                tracing::info!(
                    job_id = %bundle.job_id,
                    operation = %bundle.operation,
                    folder = %bundle.folder.display(),
                    files = bundle.files.len(),
                    failed = bundle.failed.len(),
                    "job finished"
                );
                self.emit(Event::Completed {
                    job_id: bundle.job_id.clone(),
                    folder: bundle.folder.clone(),
                    files: bundle.files.len(),
                    failed: bundle.failed.len(),
                });
            }
            Err(e) => {
                let job_id = job_id.or(e.job_id());
                tracing::error!(
                    job_id = job_id.map(JobId::as_str).unwrap_or("-"),
                    file = %file.map(|f| f.display().to_string()).unwrap_or_default(),
                    code = e.error_code(),
                    error = %e,
                    "job did not produce results"
                );
                self.emit(Event::Failed {
                    job_id: job_id.cloned(),
                    file: file.map(Path::to_path_buf),
                    code: e.error_code().to_string(),
                    error: e.to_string(),
                });
            }
        }
    }
}
