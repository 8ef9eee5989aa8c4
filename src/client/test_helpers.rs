//! Shared test helpers: a scripted in-memory service and client builders.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::client::AudialClient;
use crate::config::{Config, RetryConfig};
use crate::error::TransportError;
use crate::request::JobRequest;
use crate::transport::{DownloadSink, Transport};
use crate::types::{ArtifactManifest, ArtifactRef, ExecutionRecord, JobId};

/// Transport failure a script can ask for
#[derive(Clone, Copy, Debug)]
pub(crate) enum Fail {
    Http(u16),
    Unauthorized,
    Malformed,
    Reset,
}

impl Fail {
    fn to_error(self) -> TransportError {
        match self {
            Fail::Http(status) => TransportError::Http {
                status,
                message: format!("scripted {status}"),
            },
            Fail::Unauthorized => TransportError::Unauthorized {
                status: 401,
                message: "invalid api key".into(),
            },
            Fail::Malformed => TransportError::MalformedResponse("scripted garbage".into()),
            Fail::Reset => TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            )),
        }
    }
}

/// What one status request returns
#[derive(Clone, Debug)]
pub(crate) enum Step {
    State(&'static str),
    Completed,
    Failed(&'static str),
    Error(Fail),
}

/// Body served for one artifact location
#[derive(Clone, Debug)]
pub(crate) enum Body {
    Bytes(Vec<u8>),
    Error(Fail),
    /// Writes some bytes, then the connection drops
    Truncated(Vec<u8>),
}

/// Scripted behavior of one job, keyed by the input file name
#[derive(Clone, Debug)]
pub(crate) struct JobScript {
    pub(crate) job_id: String,
    pub(crate) submit_error: Option<Fail>,
    pub(crate) submit_panics: bool,
    pub(crate) initial_state: &'static str,
    /// Consumed in order; the last step repeats
    pub(crate) polls: Vec<Step>,
    pub(crate) list_errors: Vec<Fail>,
    pub(crate) artifacts: Vec<(ArtifactRef, Body)>,
}

impl JobScript {
    /// Job that completes on the first poll with no artifacts
    pub(crate) fn new(job_id: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            submit_error: None,
            submit_panics: false,
            initial_state: "queued",
            polls: vec![Step::Completed],
            list_errors: Vec::new(),
            artifacts: Vec::new(),
        }
    }

    pub(crate) fn polls(mut self, polls: Vec<Step>) -> Self {
        self.polls = polls;
        self
    }

    pub(crate) fn initial_state(mut self, state: &'static str) -> Self {
        self.initial_state = state;
        self
    }

    pub(crate) fn submit_error(mut self, fail: Fail) -> Self {
        self.submit_error = Some(fail);
        self
    }

    pub(crate) fn submit_panics(mut self) -> Self {
        self.submit_panics = true;
        self
    }

    pub(crate) fn list_errors(mut self, errors: Vec<Fail>) -> Self {
        self.list_errors = errors;
        self
    }

    /// Add an artifact served at `/files/{job_id}/{name}`
    pub(crate) fn artifact(mut self, name: &str, body: Body) -> Self {
        let url = format!("/files/{}/{}", self.job_id, name);
        self.artifacts.push((ArtifactRef::new(name, url), body));
        self
    }

    /// Add an artifact with an explicit reference
    pub(crate) fn artifact_ref(mut self, artifact: ArtifactRef, body: Body) -> Self {
        self.artifacts.push((artifact, body));
        self
    }
}

/// A recorded transport call
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Call {
    Submit { file: String, api_key: String },
    Poll { job_id: String, api_key: String },
    List { job_id: String },
    Download { location: String, api_key: String },
}

#[derive(Default)]
struct JobRun {
    polls: VecDeque<Step>,
    list_errors: VecDeque<Fail>,
}

/// In-memory service driven by [`JobScript`]s
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    scripts: HashMap<String, JobScript>,
    runs: Mutex<HashMap<String, JobRun>>,
    calls: Mutex<Vec<Call>>,
    latency: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    cancel_on_download: Mutex<Option<(String, CancellationToken)>>,
}

impl ScriptedTransport {
    pub(crate) fn new<S: Into<String>>(scripts: impl IntoIterator<Item = (S, JobScript)>) -> Self {
        Self {
            scripts: scripts
                .into_iter()
                .map(|(file, script)| (file.into(), script))
                .collect(),
            ..Default::default()
        }
    }

    /// Every call sleeps this long while counted as in flight
    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Cancel `token` while `location` is being downloaded
    pub(crate) fn cancel_during_download(&self, location: &str, token: CancellationToken) {
        *self.cancel_on_download.lock().unwrap() = Some((location.to_string(), token));
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn poll_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Poll { .. }))
            .count()
    }

    pub(crate) fn submit_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Submit { .. }))
            .count()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    async fn simulate_latency(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn script_for_job(&self, job_id: &JobId) -> Option<&JobScript> {
        self.scripts.values().find(|s| s.job_id == job_id.as_str())
    }

    fn body_for(&self, location: &str) -> Option<Body> {
        self.scripts
            .values()
            .flat_map(|s| s.artifacts.iter())
            .find(|(artifact, _)| artifact.url == location)
            .map(|(_, body)| body.clone())
    }
}

fn record_for(job_id: &str, state: &str) -> ExecutionRecord {
    serde_json::from_value(json!({
        "exeId": job_id,
        "state": state,
        "createdAt": "2026-03-01T12:00:00Z",
    }))
    .unwrap()
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn submit(
        &self,
        request: &JobRequest,
        api_key: &str,
    ) -> Result<(JobId, ExecutionRecord), TransportError> {
        let file = request
            .file
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        self.record(Call::Submit {
            file: file.clone(),
            api_key: api_key.to_string(),
        });
        self.simulate_latency().await;

        let script = self
            .scripts
            .get(&file)
            .unwrap_or_else(|| panic!("no script for {file}"));
        if script.submit_panics {
            panic!("scripted panic for {file}");
        }
        if let Some(fail) = script.submit_error {
            return Err(fail.to_error());
        }

        self.runs.lock().unwrap().insert(
            script.job_id.clone(),
            JobRun {
                polls: script.polls.iter().cloned().collect(),
                list_errors: script.list_errors.iter().copied().collect(),
            },
        );
        Ok((
            JobId::new(&script.job_id),
            record_for(&script.job_id, script.initial_state),
        ))
    }

    async fn poll_status(
        &self,
        job_id: &JobId,
        api_key: &str,
    ) -> Result<ExecutionRecord, TransportError> {
        self.record(Call::Poll {
            job_id: job_id.to_string(),
            api_key: api_key.to_string(),
        });
        self.simulate_latency().await;

        let step = {
            let mut runs = self.runs.lock().unwrap();
            let run = runs.entry(job_id.to_string()).or_insert_with(|| JobRun {
                polls: self
                    .script_for_job(job_id)
                    .map(|s| s.polls.iter().cloned().collect())
                    .unwrap_or_default(),
                list_errors: VecDeque::new(),
            });
            if run.polls.len() > 1 {
                run.polls.pop_front()
            } else {
                run.polls.front().cloned()
            }
        };

        match step.unwrap_or(Step::Completed) {
            Step::State(state) => Ok(record_for(job_id.as_str(), state)),
            Step::Completed => {
                let mut record = record_for(job_id.as_str(), "completed");
                record.fields.insert("original".into(), json!({"bpm": 128, "key": "Amin"}));
                Ok(record)
            }
            Step::Failed(reason) => {
                let mut record = record_for(job_id.as_str(), "failed");
                record.fields.insert("error".into(), json!(reason));
                Ok(record)
            }
            Step::Error(fail) => Err(fail.to_error()),
        }
    }

    async fn list_artifacts(
        &self,
        job_id: &JobId,
        _api_key: &str,
    ) -> Result<ArtifactManifest, TransportError> {
        self.record(Call::List {
            job_id: job_id.to_string(),
        });
        self.simulate_latency().await;

        let scripted_error = self
            .runs
            .lock()
            .unwrap()
            .get_mut(job_id.as_str())
            .and_then(|run| run.list_errors.pop_front());
        if let Some(fail) = scripted_error {
            return Err(fail.to_error());
        }

        let artifacts = self
            .script_for_job(job_id)
            .map(|s| s.artifacts.iter().map(|(a, _)| a.clone()).collect())
            .unwrap_or_default();
        Ok(ArtifactManifest::new(artifacts))
    }

    async fn download(
        &self,
        location: &str,
        api_key: &str,
        sink: &mut DownloadSink<'_>,
    ) -> Result<u64, TransportError> {
        self.record(Call::Download {
            location: location.to_string(),
            api_key: api_key.to_string(),
        });
        self.simulate_latency().await;

        if let Some((trigger, token)) = self.cancel_on_download.lock().unwrap().as_ref()
            && trigger == location
        {
            token.cancel();
        }

        match self.body_for(location) {
            Some(Body::Bytes(bytes)) => {
                // Two chunks, like a streamed response
                let (head, tail) = bytes.split_at(bytes.len() / 2);
                sink.write_all(head).await?;
                sink.write_all(tail).await?;
                Ok(bytes.len() as u64)
            }
            Some(Body::Truncated(bytes)) => {
                sink.write_all(&bytes).await?;
                Err(TransportError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed mid-body",
                )))
            }
            Some(Body::Error(fail)) => Err(fail.to_error()),
            None => Err(TransportError::Http {
                status: 404,
                message: format!("no artifact at {location}"),
            }),
        }
    }
}

/// Config with a test key, fast deterministic retries and `root` as results root
pub(crate) fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.api.api_key = Some("test-key".to_string());
    config.results_root = root.to_path_buf();
    config.retry = RetryConfig {
        max_attempts: 3,
        initial_delay: Duration::from_millis(500),
        max_delay: Duration::from_secs(4),
        backoff_multiplier: 2.0,
        jitter: false,
    };
    config
}

/// Client over `transport` with results under a fresh temp dir.
/// Returns the client and the tempdir (which must be kept alive).
pub(crate) fn create_test_client(transport: Arc<ScriptedTransport>) -> (AudialClient, TempDir) {
    create_test_client_with(transport, |_| {})
}

/// Like [`create_test_client`], with a hook to adjust the config
pub(crate) fn create_test_client_with(
    transport: Arc<ScriptedTransport>,
    adjust: impl FnOnce(&mut Config),
) -> (AudialClient, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&temp_dir.path().join("results"));
    adjust(&mut config);
    let client = AudialClient::with_transport(config, transport).unwrap();
    (client, temp_dir)
}

/// Write a small fake audio file into `dir`
pub(crate) fn audio_file(dir: &TempDir, name: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, b"RIFF....WAVEfmt fake audio").unwrap();
    path
}

/// Every non-directory entry under `dir`, relative names only
pub(crate) fn list_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(dir)
                .unwrap()
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    names.sort();
    names
}

