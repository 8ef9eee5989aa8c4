//! Job submission

use super::AudialClient;
use crate::error::{Error, Result, TransportError};
use crate::request::JobRequest;
use crate::types::{Event, ExecutionRecord, JobId};
use crate::utils::result_dir_name;

impl AudialClient {
    /// Validate a request and create the remote job
    ///
    /// Issues exactly one submit call; a failed submission is never retried
    /// because the service may have created the job anyway.
    pub(crate) async fn submit_job(
        &self,
        request: &JobRequest,
        api_key: &str,
    ) -> Result<(JobId, ExecutionRecord)> {
        request.validate().await?;

        let operation = request.operation();
        tracing::debug!(
            file = %request.file.display(),
            operation = %operation,
            "submitting job"
        );

        let (job_id, record) = self.transport.submit(request, api_key).await.map_err(|e| {
            tracing::warn!(
                file = %request.file.display(),
                operation = %operation,
                error = %e,
                "job submission failed"
            );
            Error::from(e)
        })?;

        if result_dir_name(&job_id, operation).is_none() {
            return Err(Error::Transport(TransportError::MalformedResponse(format!(
                "service returned an unusable job id '{job_id}'"
            ))));
        }

        tracing::info!(
            job_id = %job_id,
            operation = %operation,
            file = %request.file.display(),
            state = ?record.state,
            "job submitted"
        );
        self.emit(Event::Submitted {
            job_id: job_id.clone(),
            operation,
            file: request.file.clone(),
        });

        Ok((job_id, record))
    }
}
