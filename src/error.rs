//! Error types for audial
//!
//! Every caller-facing failure is a distinct variant so calling code can branch on
//! authentication vs. remote-processing vs. local-I/O failures:
//! - [`Error`] - the crate-wide error returned by every pipeline stage
//! - [`TransportError`] - failures reported by a [`Transport`](crate::transport::Transport)
//!   implementation before they are classified by the pipeline

use crate::types::JobId;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for audial operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for audial
#[derive(Debug, Error)]
pub enum Error {
    /// Missing, blank, or rejected API credential. Never retried.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Malformed job request, caught before any network call
    #[error("invalid job request: {message}")]
    Validation {
        /// Human-readable description of the problem
        message: String,
        /// The request field that failed validation (e.g., "stems")
        field: Option<String>,
    },

    /// Transport failure outside the poll loop (submission, listing)
    #[error("transport error: {0}")]
    Transport(TransportError),

    /// Status polling kept failing after all transport retries were spent
    #[error("polling job {job_id} failed after {attempts} attempts: {source}")]
    PollFailed {
        /// The job being polled
        job_id: JobId,
        /// Number of poll attempts made for the final status request
        attempts: u32,
        /// The last transport error
        #[source]
        source: TransportError,
    },

    /// The service reported the job as failed
    #[error("job {job_id} failed: {}", reason.as_deref().unwrap_or("no reason reported"))]
    JobFailed {
        /// The failed job
        job_id: JobId,
        /// Server-reported failure reason, if any
        reason: Option<String>,
    },

    /// The job did not reach a terminal state before the deadline
    #[error("timed out after {waited:?} waiting for job {job_id}")]
    Timeout {
        /// The job that was still running
        job_id: JobId,
        /// How long the poll loop waited
        waited: Duration,
    },

    /// The job was cancelled before it finished
    #[error("job {} cancelled", job_id.as_ref().map(JobId::as_str).unwrap_or("(not submitted)"))]
    Cancelled {
        /// The cancelled job (None when cancelled before submission)
        job_id: Option<JobId>,
    },

    /// Some artifacts could not be downloaded
    ///
    /// Surfaced next to a valid [`ResultBundle`](crate::types::ResultBundle) via
    /// [`ResultBundle::partial_error`](crate::types::ResultBundle::partial_error).
    #[error("{} artifact(s) of job {job_id} failed to download", failed.len())]
    PartialArtifacts {
        /// The job whose artifacts were fetched
        job_id: JobId,
        /// (artifact name, reason) for every failed artifact
        failed: Vec<(String, String)>,
    },

    /// Another in-flight job already owns this result directory
    #[error("result directory {path} is in use by another job")]
    ResultDirInUse {
        /// The contested directory
        path: PathBuf,
    },

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "results_root")
        key: Option<String>,
    },

    /// Local I/O error (result directory, input file)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Errors reported by a transport implementation
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection, timeout, or protocol failure in the HTTP client
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The service rejected the credential (HTTP 401/403)
    #[error("unauthorized ({status}): {message}")]
    Unauthorized {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// Non-success HTTP status other than 401/403
    #[error("HTTP {status}: {message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// The response could not be understood
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// I/O failure while streaming a response
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<TransportError> for Error {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Unauthorized { status, message } => {
                Error::Auth(format!("credential rejected ({status}): {message}"))
            }
            other => Error::Transport(other),
        }
    }
}

impl Error {
    /// Shorthand for a validation error on a named field
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Auth(_) => "auth_error",
            Error::Validation { .. } => "validation_error",
            Error::Transport(e) => e.error_code(),
            Error::PollFailed { .. } => "poll_failed",
            Error::JobFailed { .. } => "job_failed",
            Error::Timeout { .. } => "timeout",
            Error::Cancelled { .. } => "cancelled",
            Error::PartialArtifacts { .. } => "partial_artifacts",
            Error::ResultDirInUse { .. } => "result_dir_in_use",
            Error::Config { .. } => "config_error",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::Other(_) => "internal_error",
        }
    }

    /// The job this error is attached to, when known
    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            Error::PollFailed { job_id, .. }
            | Error::JobFailed { job_id, .. }
            | Error::Timeout { job_id, .. }
            | Error::PartialArtifacts { job_id, .. } => Some(job_id),
            Error::Cancelled { job_id } => job_id.as_ref(),
            _ => None,
        }
    }
}

impl TransportError {
    /// Machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            TransportError::Network(_) => "network_error",
            TransportError::Unauthorized { .. } => "unauthorized",
            TransportError::Http { .. } => "http_error",
            TransportError::MalformedResponse(_) => "malformed_response",
            TransportError::Io(_) => "transport_io_error",
        }
    }
}
