//! # audial
//!
//! Async client library for a remote audio-processing service.
//!
//! Every job follows the same lifecycle: submit a local audio file with
//! operation options, poll until the service reports a terminal state,
//! download the produced artifacts into a per-job result directory, and hand
//! back a [`ResultBundle`]. Batches run many jobs with bounded concurrency and
//! return one outcome per request, in input order.
//!
//! ## Quick Start
//!
//! ```no_run
//! use audial::{AudialClient, Config, JobOptions, JobRequest, Operation};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads AUDIAL_API_KEY, AUDIAL_API_URL, AUDIAL_USER_ID, AUDIAL_RESULTS_FOLDER
//!     let client = AudialClient::new(Config::from_env())?;
//!
//!     // Subscribe to events
//!     let mut events = client.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let requests = JobRequest::for_files(
//!         ["one.wav", "two.wav", "three.wav"],
//!         JobOptions::defaults_for(Operation::StemSplit),
//!     );
//!     for outcome in client.process_batch(requests, Some(2)).await {
//!         match outcome.result {
//!             Ok(bundle) => println!("{} -> {}", outcome.file.display(), bundle.folder.display()),
//!             Err(e) => eprintln!("{} failed: {e}", outcome.file.display()),
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Job lifecycle client (decomposed into per-stage submodules)
pub mod client;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Job requests and operation options
pub mod request;
/// Retry logic with exponential backoff
pub mod retry;
/// Service transport abstraction
pub mod transport;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use client::AudialClient;
pub use config::Config;
pub use error::{Error, Result, TransportError};
pub use request::{
    AnalysisType, AnalyzeOptions, Component, Feature, GenerateMidiOptions, GenerateSamplesOptions,
    JobOptions, JobRequest, MasterOptions, SegmentOptions, Stem, StemSplitOptions,
};
pub use transport::{HttpTransport, Transport};
pub use types::{
    ArtifactManifest, ArtifactRef, Event, ExecutionRecord, JobId, JobOutcome, JobState, Operation,
    ResultBundle,
};
pub use tokio_util::sync::CancellationToken;

/// Cancel every in-flight job of `client` once the process is asked to stop
///
/// Waits for SIGINT or SIGTERM on Unix and for Ctrl+C elsewhere, then calls
/// [`AudialClient::cancel_all`]. Running jobs end with [`Error::Cancelled`] at
/// their next poll or download boundary.
///
/// # Example
///
/// ```no_run
/// use audial::{AudialClient, Config, cancel_on_shutdown_signal};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = AudialClient::new(Config::from_env())?;
///     tokio::spawn({
///         let client = client.clone();
///         async move { cancel_on_shutdown_signal(&client).await }
///     });
///
///     let bundle = client.analyze("song.wav").await?;
///     println!("bpm: {:?}", bundle.execution.bpm());
///     Ok(())
/// }
/// ```
pub async fn cancel_on_shutdown_signal(client: &AudialClient) {
    wait_for_signal().await;
    client.cancel_all();
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments (containers, tests)
    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM, cancelling jobs"),
                _ = sigint.recv() => tracing::info!("Received SIGINT, cancelling jobs"),
            }
        }
        (Ok(mut only), Err(e)) | (Err(e), Ok(mut only)) => {
            tracing::warn!(error = %e, "Could not register every signal handler");
            only.recv().await;
            tracing::info!("Received shutdown signal, cancelling jobs");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register signal handlers, using ctrl_c fallback");
            if tokio::signal::ctrl_c().await.is_err() {
                // Never cancel because signal handling is unavailable
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C, cancelling jobs"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}
