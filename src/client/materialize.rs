//! Result materializer: result directory ownership and the `results.json` bundle

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tokio_util::sync::CancellationToken;

use super::AudialClient;
use crate::error::{Error, Result, TransportError};
use crate::retry::with_retry_cancellable;
use crate::types::{ExecutionRecord, JobId, Operation, ResultBundle};
use crate::utils::{RESULTS_FILE, result_dir_name, temp_file_name};

/// Exclusive claim on a result directory, released on drop
#[derive(Debug)]
pub(crate) struct DirClaim {
    dirs: Arc<Mutex<HashSet<PathBuf>>>,
    path: PathBuf,
}

impl Drop for DirClaim {
    fn drop(&mut self) {
        self.dirs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.path);
    }
}

impl AudialClient {
    /// Result directory of a job under `root`, else the client's results root
    pub(crate) fn result_dir(
        &self,
        job_id: &JobId,
        operation: Operation,
        root: Option<&Path>,
    ) -> Result<PathBuf> {
        let name = result_dir_name(job_id, operation).ok_or_else(|| {
            Error::Transport(TransportError::MalformedResponse(format!(
                "job id '{job_id}' cannot name a result directory"
            )))
        })?;
        let root = match root {
            Some(root) => root.to_path_buf(),
            None => self.results_root(),
        };
        Ok(root.join(name))
    }

    /// Claim a result directory for one in-flight job
    pub(crate) fn claim_result_dir(&self, path: &Path) -> Result<DirClaim> {
        let mut dirs = self
            .active_dirs
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !dirs.insert(path.to_path_buf()) {
            return Err(Error::ResultDirInUse {
                path: path.to_path_buf(),
            });
        }
        Ok(DirClaim {
            dirs: self.active_dirs.clone(),
            path: path.to_path_buf(),
        })
    }

    /// List, download and bundle the results of a completed job
    ///
    /// The bundle is written to `results.json` and returned even when some
    /// artifacts failed; see [`ResultBundle::partial_error`].
    pub(crate) async fn collect_results(
        &self,
        job_id: &JobId,
        operation: Operation,
        execution: ExecutionRecord,
        root: Option<&Path>,
        api_key: &str,
        token: &CancellationToken,
    ) -> Result<ResultBundle> {
        let folder = self.result_dir(job_id, operation, root)?;
        let _claim = self.claim_result_dir(&folder)?;

        let manifest = with_retry_cancellable(&self.config.retry, token, || async move {
            if token.is_cancelled() {
                return Err(Error::Cancelled {
                    job_id: Some(job_id.clone()),
                });
            }
            self.transport
                .list_artifacts(job_id, api_key)
                .await
                .map_err(Error::from)
        })
        .await?;
        tracing::debug!(job_id = %job_id, artifacts = manifest.len(), "artifacts listed");

        tokio::fs::create_dir_all(&folder).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "failed to create result directory '{}': {}",
                    folder.display(),
                    e
                ),
            ))
        })?;

        let report = self
            .fetch_artifacts(job_id, &manifest, &folder, api_key, token)
            .await;

        let bundle = ResultBundle {
            job_id: job_id.clone(),
            operation,
            execution,
            folder,
            files: report.files,
            failed: report.failed,
        };
        write_bundle(&bundle).await?;

        Ok(bundle)
    }
}

/// Write `results.json` via temp file and rename
async fn write_bundle(bundle: &ResultBundle) -> Result<()> {
    let json = serde_json::to_vec_pretty(bundle)?;
    let final_path = bundle.folder.join(RESULTS_FILE);
    let temp_path = bundle.folder.join(temp_file_name(RESULTS_FILE));

    let written = match tokio::fs::write(&temp_path, json).await {
        Ok(()) => tokio::fs::rename(&temp_path, &final_path).await,
        Err(e) => Err(e),
    };
    if let Err(e) = written {
        tokio::fs::remove_file(&temp_path).await.ok();
        return Err(e.into());
    }
    Ok(())
}
