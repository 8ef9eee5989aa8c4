//! Service transport abstraction
//!
//! The job pipeline talks to the processing service only through the
//! [`Transport`] trait. [`HttpTransport`] is the production implementation;
//! tests substitute scripted in-memory transports.

mod http;

pub use http::HttpTransport;

use async_trait::async_trait;
use tokio::io::AsyncWrite;

use crate::error::TransportError;
use crate::request::JobRequest;
use crate::types::{ArtifactManifest, ExecutionRecord, JobId};

/// Byte sink an artifact download streams into
pub type DownloadSink<'a> = dyn AsyncWrite + Send + Unpin + 'a;

/// Remote processing service
///
/// Every call receives the credential resolved for the job it belongs to. A
/// call either returns a usable value or a [`TransportError`]; retry policy
/// and error classification are left to the caller.
///
/// # Examples
///
/// ```no_run
/// use audial::config::ApiConfig;
/// use audial::transport::{HttpTransport, Transport};
/// use audial::types::JobId;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = HttpTransport::new(&ApiConfig::default())?;
/// let record = transport.poll_status(&JobId::new("65f0c1"), "my-key").await?;
/// println!("state: {:?}", record.state);
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Create a job for the request's file and options
    ///
    /// Returns the service-assigned identifier and the initial execution record.
    async fn submit(
        &self,
        request: &JobRequest,
        api_key: &str,
    ) -> Result<(JobId, ExecutionRecord), TransportError>;

    /// Fetch the current execution record of a job
    async fn poll_status(
        &self,
        job_id: &JobId,
        api_key: &str,
    ) -> Result<ExecutionRecord, TransportError>;

    /// List the downloadable artifacts of a completed job
    async fn list_artifacts(
        &self,
        job_id: &JobId,
        api_key: &str,
    ) -> Result<ArtifactManifest, TransportError>;

    /// Stream one artifact into `sink`, returning the number of bytes written
    ///
    /// `location` is either an absolute URL or a path relative to the API base.
    async fn download(
        &self,
        location: &str,
        api_key: &str,
        sink: &mut DownloadSink<'_>,
    ) -> Result<u64, TransportError>;
}
