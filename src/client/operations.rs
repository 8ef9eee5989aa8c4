//! One method per service operation

use std::path::PathBuf;

use super::AudialClient;
use crate::error::Result;
use crate::request::{
    AnalyzeOptions, GenerateMidiOptions, GenerateSamplesOptions, JobOptions, JobRequest,
    MasterOptions, SegmentOptions, StemSplitOptions,
};
use crate::types::ResultBundle;

impl AudialClient {
    /// Split a track into stems
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use audial::{AudialClient, Config, Stem, StemSplitOptions};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = AudialClient::new(Config::from_env())?;
    /// let bundle = client
    ///     .stem_split(
    ///         "song.wav",
    ///         StemSplitOptions::default().stems([Stem::Vocals, Stem::Drums]),
    ///     )
    ///     .await?;
    /// for (name, path) in &bundle.files {
    ///     println!("{name}: {}", path.display());
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn stem_split(
        &self,
        file: impl Into<PathBuf>,
        options: StemSplitOptions,
    ) -> Result<ResultBundle> {
        self.run(JobRequest::new(file, JobOptions::StemSplit(options)))
            .await
    }

    /// Detect tempo, key and other track metadata
    ///
    /// The detected values are in the bundle's execution record
    /// ([`ExecutionRecord::bpm`](crate::types::ExecutionRecord::bpm),
    /// [`ExecutionRecord::key`](crate::types::ExecutionRecord::key)).
    pub async fn analyze(&self, file: impl Into<PathBuf>) -> Result<ResultBundle> {
        self.run(JobRequest::new(
            file,
            JobOptions::Analyze(AnalyzeOptions::default()),
        ))
        .await
    }

    /// Segment a track into sections
    pub async fn segment(
        &self,
        file: impl Into<PathBuf>,
        options: SegmentOptions,
    ) -> Result<ResultBundle> {
        self.run(JobRequest::new(file, JobOptions::Segment(options)))
            .await
    }

    /// Master a track, optionally against a reference track
    pub async fn master(
        &self,
        file: impl Into<PathBuf>,
        options: MasterOptions,
    ) -> Result<ResultBundle> {
        self.run(JobRequest::new(file, JobOptions::Master(options)))
            .await
    }

    /// Generate a sample pack from a track
    pub async fn generate_samples(
        &self,
        file: impl Into<PathBuf>,
        options: GenerateSamplesOptions,
    ) -> Result<ResultBundle> {
        self.run(JobRequest::new(file, JobOptions::GenerateSamples(options)))
            .await
    }

    /// Generate MIDI from a track
    pub async fn generate_midi(
        &self,
        file: impl Into<PathBuf>,
        options: GenerateMidiOptions,
    ) -> Result<ResultBundle> {
        self.run(JobRequest::new(file, JobOptions::GenerateMidi(options)))
            .await
    }
}
