//! Artifact fetcher: download every listed artifact into the result directory

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use super::AudialClient;
use crate::error::Result;
use crate::types::{ArtifactManifest, ArtifactRef, Event, JobId};
use crate::utils::{RESULTS_FILE, file_name_from_url, is_plain_file_name, temp_file_name};

/// Reason recorded for artifacts skipped after cancellation
pub(crate) const CANCELLED_REASON: &str = "cancelled before download started";

/// What happened to each artifact of a manifest
#[derive(Debug, Default)]
pub(crate) struct FetchReport {
    /// Artifact name -> final local path
    pub(crate) files: BTreeMap<String, PathBuf>,
    /// Artifact name -> failure reason
    pub(crate) failed: BTreeMap<String, String>,
}

impl AudialClient {
    /// Download artifacts one after another
    ///
    /// A failing artifact is recorded and the next one continues. Once `token`
    /// is cancelled no new download starts.
    pub(crate) async fn fetch_artifacts(
        &self,
        job_id: &JobId,
        manifest: &ArtifactManifest,
        folder: &Path,
        api_key: &str,
        token: &CancellationToken,
    ) -> FetchReport {
        let mut report = FetchReport::default();
        let mut names = HashSet::new();

        for (index, artifact) in manifest.artifacts.iter().enumerate() {
            let name = artifact_name(artifact, index + 1);

            let outcome = if token.is_cancelled() {
                Err(CANCELLED_REASON.to_string())
            } else if !is_plain_file_name(&name) {
                Err(format!(
                    "invalid artifact name: must be a plain file name other than {RESULTS_FILE}"
                ))
            } else if !names.insert(name.clone()) {
                Err("duplicate artifact name in manifest".to_string())
            } else {
                self.download_artifact(artifact, &name, folder, api_key)
                    .await
                    .map_err(|e| e.to_string())
            };

            match outcome {
                Ok((path, bytes)) => {
                    tracing::debug!(job_id = %job_id, name = %name, bytes, "artifact downloaded");
                    self.emit(Event::ArtifactDownloaded {
                        job_id: job_id.clone(),
                        name: name.clone(),
                        path: path.clone(),
                        bytes,
                    });
                    report.files.insert(name, path);
                }
                Err(reason) => {
                    tracing::warn!(job_id = %job_id, name = %name, error = %reason, "artifact failed");
                    self.emit(Event::ArtifactFailed {
                        job_id: job_id.clone(),
                        name: name.clone(),
                        error: reason.clone(),
                    });
                    report.failed.insert(name, reason);
                }
            }
        }

        report
    }

    /// Stream one artifact into a hidden temp file, then rename it into place
    async fn download_artifact(
        &self,
        artifact: &ArtifactRef,
        name: &str,
        folder: &Path,
        api_key: &str,
    ) -> Result<(PathBuf, u64)> {
        let final_path = folder.join(name);
        let temp_path = folder.join(temp_file_name(name));

        let streamed = self.stream_to_file(&artifact.url, api_key, &temp_path).await;
        let finished: Result<u64> = match streamed {
            Ok(bytes) => tokio::fs::rename(&temp_path, &final_path)
                .await
                .map(|()| bytes)
                .map_err(Into::into),
            Err(e) => Err(e),
        };

        match finished {
            Ok(bytes) => Ok((final_path, bytes)),
            Err(e) => {
                // Best effort: the temp file may never have been created
                tokio::fs::remove_file(&temp_path).await.ok();
                Err(e)
            }
        }
    }

    async fn stream_to_file(&self, location: &str, api_key: &str, path: &Path) -> Result<u64> {
        let mut file = tokio::fs::File::create(path).await?;
        let bytes = self.transport.download(location, api_key, &mut file).await?;
        file.flush().await?;
        Ok(bytes)
    }
}

/// Local name of an artifact: its reported name, else the URL's last segment, else `artifact_{n}`
fn artifact_name(artifact: &ArtifactRef, position: usize) -> String {
    let name = artifact.name.trim();
    if !name.is_empty() {
        return name.to_string();
    }
    file_name_from_url(&artifact.url).unwrap_or_else(|| format!("artifact_{position}"))
}
