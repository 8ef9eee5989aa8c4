//! Core types for audial

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Service-assigned job identifier (`exeId` on the wire)
///
/// The sole key for every status, listing and download call of a job.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Create a new JobId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of processing requested from the service
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Split a track into stems
    StemSplit,
    /// Detect tempo, key and other metadata
    Analyze,
    /// Segment a track into sections and extract features
    Segment,
    /// Master a track, optionally against a reference
    Master,
    /// Generate a sample pack
    GenerateSamples,
    /// Generate MIDI
    GenerateMidi,
}

impl Operation {
    /// All operations in declaration order
    pub const ALL: [Operation; 6] = [
        Operation::StemSplit,
        Operation::Analyze,
        Operation::Segment,
        Operation::Master,
        Operation::GenerateSamples,
        Operation::GenerateMidi,
    ];

    /// Wire and directory name of the operation
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::StemSplit => "stem_split",
            Operation::Analyze => "analyze",
            Operation::Segment => "segment",
            Operation::Master => "master",
            Operation::GenerateSamples => "generate_samples",
            Operation::GenerateMidi => "generate_midi",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remote job state
///
/// `Completed` and `Failed` are terminal. Unknown wire values deserialize as
/// `Running` so a new intermediate state never ends the poll loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Accepted but not started
    #[default]
    Submitted,
    /// Being processed
    Running,
    /// Finished successfully; artifacts are available
    Completed,
    /// Finished with an error
    Failed,
}

impl<'de> Deserialize<'de> for JobState {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(JobState::from_wire(&raw))
    }
}

impl JobState {
    /// Map a service state string, case-insensitively
    pub fn from_wire(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "submitted" | "created" | "queued" | "pending" => JobState::Submitted,
            "completed" | "complete" | "succeeded" => JobState::Completed,
            "failed" | "error" => JobState::Failed,
            _ => JobState::Running,
        }
    }

    /// Whether no further transition can occur
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// Server-reported snapshot of a job
///
/// Known fields are typed; everything else the service reports (tempo, key,
/// segment data, ...) is kept verbatim in `fields`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Job identifier
    #[serde(rename = "exeId", alias = "id", alias = "exe_id", default)]
    pub job_id: JobId,

    /// Current state
    #[serde(default)]
    pub state: JobState,

    /// Creation time reported by the service
    #[serde(
        rename = "createdAt",
        alias = "created_at",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,

    /// Last update time reported by the service
    #[serde(
        rename = "updatedAt",
        alias = "updated_at",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,

    /// Every other reported field
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl ExecutionRecord {
    /// Look up a field at the top level, falling back to the nested `original` object
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.fields
            .get(name)
            .filter(|v| !v.is_null())
            .or_else(|| {
                self.fields
                    .get("original")
                    .and_then(|o| o.get(name))
                    .filter(|v| !v.is_null())
            })
    }

    /// Detected tempo
    pub fn bpm(&self) -> Option<f64> {
        self.field("bpm").and_then(|v| match v {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }

    /// Detected musical key
    pub fn key(&self) -> Option<&str> {
        self.field("key").and_then(serde_json::Value::as_str)
    }

    /// Failure reason: `error`, else `message`, else `error.message`
    pub fn failure_reason(&self) -> Option<String> {
        let error = self.fields.get("error");
        if let Some(serde_json::Value::String(s)) = error
            && !s.is_empty()
        {
            return Some(s.clone());
        }
        if let Some(msg) = self.fields.get("message").and_then(|m| m.as_str())
            && !msg.is_empty()
        {
            return Some(msg.to_string());
        }
        error
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
            .map(str::to_string)
    }
}

/// One downloadable output of a completed job
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Remote name; becomes the local file name
    #[serde(default, alias = "filename")]
    pub name: String,
    /// Absolute URL or path relative to the API base
    #[serde(alias = "location")]
    pub url: String,
}

impl ArtifactRef {
    /// Create an artifact reference
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Ordered list of artifacts produced by a completed job
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    /// Artifacts in service order
    #[serde(default)]
    pub artifacts: Vec<ArtifactRef>,
}

impl ArtifactManifest {
    /// Create a manifest from artifact references
    pub fn new(artifacts: Vec<ArtifactRef>) -> Self {
        Self { artifacts }
    }

    /// Number of artifacts
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    /// Whether the job produced no artifacts
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

/// Caller-facing result of one job
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResultBundle {
    /// Job identifier
    pub job_id: JobId,
    /// Operation that produced this result
    pub operation: Operation,
    /// Last execution snapshot (terminal)
    pub execution: ExecutionRecord,
    /// Result directory
    pub folder: PathBuf,
    /// Artifact name -> local file
    pub files: BTreeMap<String, PathBuf>,
    /// Artifact name -> failure reason
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub failed: BTreeMap<String, String>,
}

impl ResultBundle {
    /// Whether every listed artifact was downloaded
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// [`Error::PartialArtifacts`] if some artifacts failed
    pub fn partial_error(&self) -> Option<Error> {
        if self.failed.is_empty() {
            return None;
        }
        Some(Error::PartialArtifacts {
            job_id: self.job_id.clone(),
            failed: self
                .failed
                .iter()
                .map(|(name, reason)| (name.clone(), reason.clone()))
                .collect(),
        })
    }

    /// The bundle if complete, otherwise [`Error::PartialArtifacts`]
    pub fn into_complete(self) -> Result<Self> {
        match self.partial_error() {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

/// Outcome of one job in a batch, at the same index as its request
#[derive(Debug)]
pub struct JobOutcome {
    /// Position of the request in the batch
    pub index: usize,
    /// Input file of the request
    pub file: PathBuf,
    /// Requested operation
    pub operation: Operation,
    /// The bundle, or why this job failed
    pub result: Result<ResultBundle>,
}

impl JobOutcome {
    /// Whether the job produced a bundle
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Event emitted during the job lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// The service accepted a job
    Submitted {
        /// Job ID
        job_id: JobId,
        /// Requested operation
        operation: Operation,
        /// Input file
        file: PathBuf,
    },

    /// A poll observed a new state
    StatusChanged {
        /// Job ID
        job_id: JobId,
        /// Newly observed state
        state: JobState,
    },

    /// An artifact landed in the result directory
    ArtifactDownloaded {
        /// Job ID
        job_id: JobId,
        /// Artifact name
        name: String,
        /// Final local path
        path: PathBuf,
        /// Bytes written
        bytes: u64,
    },

    /// An artifact could not be downloaded
    ArtifactFailed {
        /// Job ID
        job_id: JobId,
        /// Artifact name
        name: String,
        /// Failure reason
        error: String,
    },

    /// The job's result bundle is ready
    Completed {
        /// Job ID
        job_id: JobId,
        /// Result directory
        folder: PathBuf,
        /// Number of artifacts downloaded
        files: usize,
        /// Number of artifacts that failed
        failed: usize,
    },

    /// The job's pipeline ended with an error
    Failed {
        /// Job ID, if the job was submitted
        #[serde(skip_serializing_if = "Option::is_none")]
        job_id: Option<JobId>,
        /// Input file; absent when re-fetching an existing job
        #[serde(skip_serializing_if = "Option::is_none")]
        file: Option<PathBuf>,
        /// Machine-readable error code
        code: String,
        /// Error message
        error: String,
    },
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn job_state_accepts_service_aliases() {
        let cases = [
            ("submitted", JobState::Submitted),
            ("queued", JobState::Submitted),
            ("pending", JobState::Submitted),
            ("running", JobState::Running),
            ("processing", JobState::Running),
            ("completed", JobState::Completed),
            ("complete", JobState::Completed),
            ("failed", JobState::Failed),
            ("error", JobState::Failed),
            ("COMPLETED", JobState::Completed),
        ];
        for (wire, expected) in cases {
            let state: JobState = serde_json::from_value(json!(wire)).unwrap();
            assert_eq!(state, expected, "wire value {wire}");
        }
    }

    #[test]
    fn unknown_state_is_not_terminal() {
        let state: JobState = serde_json::from_value(json!("uploading")).unwrap();
        assert_eq!(state, JobState::Running);
        assert!(!state.is_terminal());
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
    }

    #[test]
    fn execution_record_keeps_unknown_fields() {
        let record: ExecutionRecord = serde_json::from_value(json!({
            "exeId": "abc123",
            "state": "completed",
            "createdAt": "2026-01-02T03:04:05Z",
            "stem": {"vocals": {"filename": "vocals.mp3"}},
            "original": {"bpm": 128, "key": "Amin"}
        }))
        .unwrap();

        assert_eq!(record.job_id, JobId::new("abc123"));
        assert_eq!(record.state, JobState::Completed);
        assert!(record.created_at.is_some());
        assert!(record.fields.contains_key("stem"));
        assert_eq!(record.bpm(), Some(128.0));
        assert_eq!(record.key(), Some("Amin"));
    }

    #[test]
    fn top_level_analysis_fields_win_over_original() {
        let record: ExecutionRecord = serde_json::from_value(json!({
            "exeId": "a",
            "state": "completed",
            "bpm": "140.5",
            "original": {"bpm": 120, "key": "C"}
        }))
        .unwrap();
        assert_eq!(record.bpm(), Some(140.5));
        assert_eq!(record.key(), Some("C"));
    }

    #[test]
    fn failure_reason_lookup_order() {
        let plain: ExecutionRecord =
            serde_json::from_value(json!({"exeId": "a", "state": "failed", "error": "bad audio"}))
                .unwrap();
        assert_eq!(plain.failure_reason().as_deref(), Some("bad audio"));

        let nested: ExecutionRecord = serde_json::from_value(
            json!({"exeId": "a", "state": "failed", "error": {"message": "GPU OOM"}}),
        )
        .unwrap();
        assert_eq!(nested.failure_reason().as_deref(), Some("GPU OOM"));

        let message: ExecutionRecord =
            serde_json::from_value(json!({"exeId": "a", "state": "failed", "message": "quota"}))
                .unwrap();
        assert_eq!(message.failure_reason().as_deref(), Some("quota"));

        let none: ExecutionRecord =
            serde_json::from_value(json!({"exeId": "a", "state": "failed"})).unwrap();
        assert_eq!(none.failure_reason(), None);
    }

    #[test]
    fn bundle_reports_partial_failures() {
        let mut bundle = ResultBundle {
            job_id: JobId::new("j1"),
            operation: Operation::StemSplit,
            execution: ExecutionRecord::default(),
            folder: PathBuf::from("/tmp/j1_stem_split"),
            files: BTreeMap::new(),
            failed: BTreeMap::new(),
        };
        assert!(bundle.is_complete());
        assert!(bundle.partial_error().is_none());

        bundle
            .failed
            .insert("drums.mp3".into(), "HTTP 404: gone".into());
        match bundle.partial_error() {
            Some(Error::PartialArtifacts { job_id, failed }) => {
                assert_eq!(job_id, JobId::new("j1"));
                assert_eq!(failed, vec![("drums.mp3".to_string(), "HTTP 404: gone".to_string())]);
            }
            other => panic!("expected PartialArtifacts, got {other:?}"),
        }
        assert!(bundle.into_complete().is_err());
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let event = Event::StatusChanged {
            job_id: JobId::new("x"),
            state: JobState::Running,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "status_changed");
        assert_eq!(value["state"], "running");
    }

    #[test]
    fn operation_names_are_stable() {
        let names: Vec<_> = Operation::ALL.iter().map(Operation::as_str).collect();
        assert_eq!(
            names,
            [
                "stem_split",
                "analyze",
                "segment",
                "master",
                "generate_samples",
                "generate_midi"
            ]
        );
        let op: Operation = serde_json::from_value(json!("generate_midi")).unwrap();
        assert_eq!(op, Operation::GenerateMidi);
    }
}
