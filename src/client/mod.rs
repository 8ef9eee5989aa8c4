//! Job lifecycle client split into focused submodules.
//!
//! The `AudialClient` struct and its methods are organized by pipeline stage:
//! - [`submission`] - Request validation and job creation
//! - [`poll`] - Status polling with backoff, deadline and cancellation
//! - [`fetch`] - Sequential artifact downloads into the result directory
//! - [`materialize`] - Result directory claims and `results.json`
//! - [`pipeline`] - Single-job runs and re-fetching completed jobs
//! - [`batch`] - Bounded-concurrency batches with ordered outcomes
//! - [`operations`] - One convenience method per operation

mod batch;
mod fetch;
mod materialize;
mod operations;
mod pipeline;
mod poll;
mod submission;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::request::JobRequest;
use crate::transport::{HttpTransport, Transport};
use crate::types::Event;

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Client for the audio-processing service (cloneable - all fields are Arc-wrapped)
///
/// Every job runs the same pipeline: submit, poll until terminal, list and
/// download artifacts, write the result bundle. Jobs share nothing but the
/// configuration, the transport and the results root.
#[derive(Clone)]
pub struct AudialClient {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Service transport (trait object so tests can script the service)
    pub(crate) transport: Arc<dyn Transport>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Parent of every job and batch token
    pub(crate) cancel_token: CancellationToken,
    /// Directory new result directories are created under
    pub(crate) results_root: Arc<RwLock<PathBuf>>,
    /// Result directories owned by in-flight jobs
    pub(crate) active_dirs: Arc<Mutex<HashSet<PathBuf>>>,
}

impl AudialClient {
    /// Create a client that talks to the service over HTTP
    ///
    /// The configuration is validated first; no network call is made here.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::new(&config.api)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Create a client on top of a custom transport
    pub fn with_transport(config: Config, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;

        // Create broadcast channel with buffer size of 1000 events
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let results_root = Arc::new(RwLock::new(config.results_root.clone()));

        Ok(Self {
            config: Arc::new(config),
            transport,
            event_tx,
            cancel_token: CancellationToken::new(),
            results_root,
            active_dirs: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    /// Subscribe to lifecycle events
    ///
    /// Each subscriber receives every event sent after it subscribed. A slow
    /// subscriber misses events (`RecvError::Lagged`) rather than slowing jobs down.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// The configuration this client was built with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Cancel every in-flight job and batch
    ///
    /// Jobs stop at their next poll or download boundary and finish with
    /// [`Error::Cancelled`]. The client stays cancelled: jobs started
    /// afterwards fail immediately.
    pub fn cancel_all(&self) {
        tracing::info!("cancelling all jobs");
        self.cancel_token.cancel();
    }

    /// Token that [`cancel_all`](Self::cancel_all) cancels
    ///
    /// Use [`CancellationToken::child_token`] to build per-job tokens for
    /// [`run_cancellable`](Self::run_cancellable).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Change the directory result directories are created under
    ///
    /// Jobs that already created their result directory keep it.
    pub fn set_results_root(&self, root: impl Into<PathBuf>) {
        let root = root.into();
        tracing::debug!(root = %root.display(), "results root changed");
        *self
            .results_root
            .write()
            .unwrap_or_else(PoisonError::into_inner) = root;
    }

    /// Current results root
    pub fn results_root(&self) -> PathBuf {
        self.results_root
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Send an event; having no subscribers is not an error
    pub(crate) fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Credential for a job: the request override, else the configured key
    pub(crate) fn resolve_api_key(&self, request: &JobRequest) -> Result<String> {
        self.resolve_key(request.api_key.as_deref())
    }

    pub(crate) fn resolve_key(&self, override_key: Option<&str>) -> Result<String> {
        let key = override_key
            .filter(|k| !k.trim().is_empty())
            .or(self.config.api.api_key.as_deref())
            .map(str::trim)
            .unwrap_or_default();
        if key.is_empty() {
            return Err(Error::Auth(format!(
                "no API key: set {} or pass a key with the request",
                crate::config::ENV_API_KEY
            )));
        }
        Ok(key.to_string())
    }
}

impl std::fmt::Debug for AudialClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudialClient")
            .field("base_url", &self.config.api.base_url)
            .field("results_root", &self.results_root())
            .field("cancelled", &self.cancel_token.is_cancelled())
            .finish_non_exhaustive()
    }
}
