//! Shared helpers for the HTTP integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use audial::config::{ApiConfig, PollConfig, RetryConfig};
use audial::{Config, Event};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::sync::broadcast;
use wiremock::MockServer;

/// API key every test client is configured with
pub const TEST_KEY: &str = "integration-key";

/// Config pointing at `server`'s `/v1/` with results under `root`
///
/// Polling and retries are shortened to milliseconds so the tests run in real time.
pub fn server_config(server: &MockServer, root: &Path) -> Config {
    Config {
        api: ApiConfig {
            base_url: format!("{}/v1", server.uri()),
            api_key: Some(TEST_KEY.to_string()),
            user_id: Some("user-7".to_string()),
            request_timeout: Duration::from_secs(5),
            download_timeout: Duration::from_secs(5),
        },
        results_root: root.to_path_buf(),
        polling: PollConfig {
            initial_interval: Duration::from_millis(20),
            max_interval: Duration::from_millis(50),
            backoff_multiplier: 1.5,
            max_wait: Duration::from_secs(10),
        },
        retry: RetryConfig {
            max_attempts: 2,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(40),
            backoff_multiplier: 2.0,
            jitter: false,
        },
        ..Default::default()
    }
}

/// Write a small fake audio file into `dir`
pub fn audio_file(dir: &TempDir, name: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, b"RIFF....WAVEfmt integration audio").unwrap();
    path
}

/// Execution record body as the service reports it
pub fn execution(job_id: &str, state: &str) -> Value {
    json!({
        "exeId": job_id,
        "state": state,
        "createdAt": "2026-01-05T10:00:00Z",
    })
}

/// Every file under `dir`, relative and sorted
pub fn list_files(dir: &Path) -> Vec<String> {
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

/// Whether any download temp file survived under `dir`
pub fn has_partial_files(dir: &Path) -> bool {
    walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .any(|e| e.file_name().to_string_lossy().ends_with(".part"))
}

/// Drain every event currently buffered for `rx`
pub fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
