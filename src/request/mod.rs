//! Job requests: input file, operation options and per-job overrides
//!
//! A [`JobRequest`] is built once and borrowed by every pipeline stage. It is
//! validated before any network call and rendered into the service's wire
//! payload by [`JobRequest::payload`].

mod options;

pub use options::{
    AnalysisType, AnalyzeOptions, Component, Feature, GenerateMidiOptions, GenerateSamplesOptions,
    MAX_BPM, MasterOptions, SegmentOptions, Stem, StemSplitOptions,
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::Operation;

/// Operation plus its options
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum JobOptions {
    /// Split into stems
    StemSplit(StemSplitOptions),
    /// Analyze tempo, key and metadata
    Analyze(AnalyzeOptions),
    /// Segment into sections
    Segment(SegmentOptions),
    /// Master the track
    Master(MasterOptions),
    /// Generate a sample pack
    GenerateSamples(GenerateSamplesOptions),
    /// Generate MIDI
    GenerateMidi(GenerateMidiOptions),
}

impl JobOptions {
    /// The operation these options belong to
    pub fn operation(&self) -> Operation {
        match self {
            JobOptions::StemSplit(_) => Operation::StemSplit,
            JobOptions::Analyze(_) => Operation::Analyze,
            JobOptions::Segment(_) => Operation::Segment,
            JobOptions::Master(_) => Operation::Master,
            JobOptions::GenerateSamples(_) => Operation::GenerateSamples,
            JobOptions::GenerateMidi(_) => Operation::GenerateMidi,
        }
    }

    /// Default options for an operation
    pub fn defaults_for(operation: Operation) -> Self {
        match operation {
            Operation::StemSplit => JobOptions::StemSplit(StemSplitOptions::default()),
            Operation::Analyze => JobOptions::Analyze(AnalyzeOptions::default()),
            Operation::Segment => JobOptions::Segment(SegmentOptions::default()),
            Operation::Master => JobOptions::Master(MasterOptions::default()),
            Operation::GenerateSamples => {
                JobOptions::GenerateSamples(GenerateSamplesOptions::default())
            }
            Operation::GenerateMidi => JobOptions::GenerateMidi(GenerateMidiOptions::default()),
        }
    }

    /// Check option values against what the service accepts
    pub fn validate(&self) -> Result<()> {
        match self {
            JobOptions::StemSplit(o) => {
                if o.stems.is_empty() {
                    return Err(Error::validation("stems", "at least one stem is required"));
                }
                reject_duplicates("stems", &o.stems)?;
                if let Some(bpm) = o.target_bpm {
                    check_bpm("target_bpm", bpm)?;
                }
                check_optional_text("target_key", o.target_key.as_deref())?;
                check_text("algorithm", &o.algorithm)
            }
            JobOptions::Analyze(_) => Ok(()),
            JobOptions::Segment(o) => {
                reject_duplicates("components", &o.components)?;
                reject_duplicates("features", &o.features)?;
                if !o.features.is_empty() && o.analysis_type != Some(AnalysisType::SelectFeatures)
                {
                    return Err(Error::validation(
                        "features",
                        "features can only be chosen with analysis_type 'select_features'",
                    ));
                }
                check_optional_text("genre", o.genre.as_deref())
            }
            JobOptions::Master(o) => match &o.reference_file {
                Some(reference) if !reference.is_file() => Err(Error::validation(
                    "reference_file",
                    format!("reference file {} does not exist", reference.display()),
                )),
                _ => Ok(()),
            },
            JobOptions::GenerateSamples(o) => {
                check_optional_text("job_type", o.job_type.as_deref())?;
                reject_duplicates("components", &o.components)?;
                check_optional_text("genre", o.genre.as_deref())
            }
            JobOptions::GenerateMidi(o) => match o.bpm {
                Some(bpm) => check_bpm("bpm", bpm),
                None => Ok(()),
            },
        }
    }
}

/// One unit of work: an input file and what to do with it
#[derive(Clone, Debug, PartialEq)]
pub struct JobRequest {
    /// Local input audio file
    pub file: PathBuf,
    /// Operation and options
    pub options: JobOptions,
    /// Credential override; the configured key is used when `None`
    pub api_key: Option<String>,
    /// Per-job maximum wait; `polling.max_wait` is used when `None`
    pub max_wait: Option<Duration>,
    /// Directory the result directory is created under; the client's
    /// results root is used when `None`
    pub results_root: Option<PathBuf>,
}

impl JobRequest {
    /// Create a request for one file
    pub fn new(file: impl Into<PathBuf>, options: JobOptions) -> Self {
        Self {
            file: file.into(),
            options,
            api_key: None,
            max_wait: None,
            results_root: None,
        }
    }

    /// Same options applied to many files, in input order
    pub fn for_files<I, P>(files: I, options: JobOptions) -> Vec<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        files
            .into_iter()
            .map(|file| JobRequest::new(file, options.clone()))
            .collect()
    }

    /// Use a different credential for this job
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Override the maximum wait for this job
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }

    /// Place this job's result directory under `root`
    pub fn with_results_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.results_root = Some(root.into());
        self
    }

    /// Requested operation
    pub fn operation(&self) -> Operation {
        self.options.operation()
    }

    /// Validate the input file and the options
    ///
    /// The file must exist, be a regular file and be readable.
    pub async fn validate(&self) -> Result<()> {
        check_input_file(&self.file).await?;
        self.options.validate()
    }

    /// Wire payload sent as the `payload` multipart field
    pub fn payload(&self, user_id: Option<&str>) -> Value {
        let mut payload = Map::new();
        match &self.options {
            JobOptions::StemSplit(o) => {
                let stems: Vec<_> = o.stems.iter().map(Stem::as_str).collect();
                payload.insert("stemsRequested".into(), json!(stems));
                if let Some(bpm) = o.target_bpm {
                    payload.insert("targetBPM".into(), json!(bpm));
                }
                if let Some(key) = &o.target_key {
                    payload.insert("targetKey".into(), json!(key.trim()));
                }
                payload.insert("modelName".into(), json!(o.algorithm));
            }
            JobOptions::Analyze(_) => {}
            JobOptions::Segment(o) => {
                insert_list(&mut payload, "components", &o.components, Component::as_str);
                if let Some(analysis_type) = o.analysis_type {
                    payload.insert("analysisType".into(), json!(analysis_type.as_str()));
                }
                insert_list(&mut payload, "features", &o.features, Feature::as_str);
                if let Some(genre) = &o.genre {
                    payload.insert("genre".into(), json!(genre.trim()));
                }
            }
            JobOptions::Master(o) => {
                if let Some(name) = o
                    .reference_file
                    .as_deref()
                    .and_then(Path::file_name)
                    .and_then(|n| n.to_str())
                {
                    payload.insert("reference".into(), json!(name));
                }
            }
            JobOptions::GenerateSamples(o) => {
                if let Some(job_type) = &o.job_type {
                    payload.insert("jobType".into(), json!(job_type.trim()));
                }
                insert_list(&mut payload, "components", &o.components, Component::as_str);
                if let Some(genre) = &o.genre {
                    payload.insert("genre".into(), json!(genre.trim()));
                }
            }
            JobOptions::GenerateMidi(o) => {
                if let Some(bpm) = o.bpm {
                    payload.insert("bpm".into(), json!(bpm));
                }
            }
        }
        if let Some(user_id) = user_id.filter(|u| !u.trim().is_empty()) {
            payload.insert("userId".into(), json!(user_id));
        }
        Value::Object(payload)
    }
}

async fn check_input_file(file: &Path) -> Result<()> {
    let metadata = tokio::fs::metadata(file).await.map_err(|e| {
        Error::validation(
            "file",
            format!("input file {} is not accessible: {e}", file.display()),
        )
    })?;
    if !metadata.is_file() {
        return Err(Error::validation(
            "file",
            format!("input {} is not a regular file", file.display()),
        ));
    }
    tokio::fs::File::open(file).await.map_err(|e| {
        Error::validation(
            "file",
            format!("input file {} cannot be opened: {e}", file.display()),
        )
    })?;
    Ok(())
}

fn check_bpm(field: &str, bpm: f64) -> Result<()> {
    if bpm.is_finite() && bpm > 0.0 && bpm <= MAX_BPM {
        Ok(())
    } else {
        Err(Error::validation(
            field,
            format!("{field} must be between 0 and {MAX_BPM}, got {bpm}"),
        ))
    }
}

fn check_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(field, format!("{field} must not be blank")));
    }
    Ok(())
}

fn check_optional_text(field: &str, value: Option<&str>) -> Result<()> {
    match value {
        Some(v) => check_text(field, v),
        None => Ok(()),
    }
}

fn reject_duplicates<T>(field: &str, values: &[T]) -> Result<()>
where
    T: std::hash::Hash + Eq + std::fmt::Display,
{
    let mut seen = HashSet::new();
    for value in values {
        if !seen.insert(value) {
            return Err(Error::validation(
                field,
                format!("'{value}' is listed more than once"),
            ));
        }
    }
    Ok(())
}

fn insert_list<T>(
    payload: &mut Map<String, Value>,
    key: &str,
    values: &[T],
    name: fn(&T) -> &'static str,
) {
    if !values.is_empty() {
        let names: Vec<_> = values.iter().map(name).collect();
        payload.insert(key.into(), json!(names));
    }
}
