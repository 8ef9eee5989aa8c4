//! HTTP transport for the processing service

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, multipart};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use url::Url;

use super::{DownloadSink, Transport};
use crate::config::ApiConfig;
use crate::error::{Error, Result, TransportError};
use crate::request::{JobOptions, JobRequest, MasterOptions};
use crate::types::{ArtifactManifest, ArtifactRef, ExecutionRecord, JobId};

/// Longest error body kept in an error message
const MAX_ERROR_BODY: usize = 512;

/// Transport backed by the service's REST API
///
/// Endpoints, relative to the base URL:
/// - `POST executions` (multipart: `type`, `payload`, `file`, optional `reference`)
/// - `GET executions/{id}`
/// - `GET executions/{id}/artifacts`
///
/// Every API call carries `Authorization: Bearer {key}`. Artifact downloads
/// only carry it when the artifact is hosted on the API's own origin, so
/// pre-signed storage URLs never see the credential.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
    user_id: Option<String>,
    request_timeout: Duration,
    download_timeout: Duration,
}

impl HttpTransport {
    /// Create a transport from API settings
    pub fn new(api: &ApiConfig) -> Result<Self> {
        let base_url = parse_base_url(&api.base_url)?;
        let client = Client::builder()
            .user_agent(concat!("audial/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config {
                message: format!("failed to create HTTP client: {e}"),
                key: None,
            })?;

        Ok(Self {
            client,
            base_url,
            user_id: api.user_id.clone().filter(|u| !u.trim().is_empty()),
            request_timeout: api.request_timeout,
            download_timeout: api.download_timeout,
        })
    }

    /// Base URL every endpoint is resolved against (always ends with `/`)
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // parse_base_url rejects URLs that cannot carry a path
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn resolve(&self, location: &str) -> std::result::Result<Url, TransportError> {
        let location = location.trim();
        let url = match Url::parse(location) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => self
                .base_url
                .join(location.trim_start_matches('/'))
                .map_err(|e| {
                    TransportError::MalformedResponse(format!(
                        "invalid artifact location '{location}': {e}"
                    ))
                })?,
            Err(e) => {
                return Err(TransportError::MalformedResponse(format!(
                    "invalid artifact location '{location}': {e}"
                )));
            }
        };
        if !matches!(url.scheme(), "http" | "https") {
            return Err(TransportError::MalformedResponse(format!(
                "unsupported artifact location scheme '{}'",
                url.scheme()
            )));
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        api_key: &str,
    ) -> std::result::Result<T, TransportError> {
        debug!(url = %url, "GET");
        let response = self
            .client
            .get(url)
            .bearer_auth(api_key)
            .timeout(self.request_timeout)
            .send()
            .await?;
        read_json(check_status(response).await?).await
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn submit(
        &self,
        request: &JobRequest,
        api_key: &str,
    ) -> std::result::Result<(JobId, ExecutionRecord), TransportError> {
        let operation = request.operation();
        let mut form = multipart::Form::new()
            .text("type", operation.as_str())
            .text(
                "payload",
                request.payload(self.user_id.as_deref()).to_string(),
            )
            .part("file", file_part(&request.file).await?);
        if let JobOptions::Master(MasterOptions {
            reference_file: Some(reference),
        }) = &request.options
        {
            form = form.part("reference", file_part(reference).await?);
        }

        let url = self.endpoint(&["executions"]);
        debug!(url = %url, operation = %operation, file = %request.file.display(), "submitting job");
        let response = self
            .client
            .post(url)
            .bearer_auth(api_key)
            .timeout(self.request_timeout)
            .multipart(form)
            .send()
            .await?;

        let record: ExecutionRecord = read_json(check_status(response).await?).await?;
        if record.job_id.as_str().trim().is_empty() {
            return Err(TransportError::MalformedResponse(
                "submission response carries no exeId".to_string(),
            ));
        }
        Ok((record.job_id.clone(), record))
    }

    async fn poll_status(
        &self,
        job_id: &JobId,
        api_key: &str,
    ) -> std::result::Result<ExecutionRecord, TransportError> {
        let url = self.endpoint(&["executions", job_id.as_str()]);
        let mut record: ExecutionRecord = self.get_json(url, api_key).await?;
        if record.job_id.as_str().is_empty() {
            record.job_id = job_id.clone();
        }
        Ok(record)
    }

    async fn list_artifacts(
        &self,
        job_id: &JobId,
        api_key: &str,
    ) -> std::result::Result<ArtifactManifest, TransportError> {
        let url = self.endpoint(&["executions", job_id.as_str(), "artifacts"]);
        let body: ManifestBody = self.get_json(url, api_key).await?;
        Ok(match body {
            ManifestBody::Bare(artifacts) => ArtifactManifest::new(artifacts),
            ManifestBody::Wrapped(manifest) => manifest,
        })
    }

    async fn download(
        &self,
        location: &str,
        api_key: &str,
        sink: &mut DownloadSink<'_>,
    ) -> std::result::Result<u64, TransportError> {
        let url = self.resolve(location)?;
        let mut builder = self.client.get(url.clone()).timeout(self.download_timeout);
        if url.origin() == self.base_url.origin() {
            builder = builder.bearer_auth(api_key);
        }
        debug!(url = %url, "downloading artifact");

        let mut response = check_status(builder.send().await?).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            sink.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        sink.flush().await?;
        Ok(written)
    }
}

/// Artifact listing: `{"artifacts": [...]}` or a bare array
#[derive(Deserialize)]
#[serde(untagged)]
enum ManifestBody {
    Bare(Vec<ArtifactRef>),
    Wrapped(ArtifactManifest),
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let invalid = |reason: String| Error::Config {
        message: format!("invalid API base URL '{raw}': {reason}"),
        key: Some("api.base_url".to_string()),
    };
    let mut url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("expected an http(s) URL".to_string()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

async fn file_part(path: &Path) -> std::result::Result<multipart::Part, TransportError> {
    let bytes = tokio::fs::read(path).await?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("audio")
        .to_string();
    Ok(multipart::Part::bytes(bytes).file_name(name))
}

async fn check_status(response: Response) -> std::result::Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match body.trim() {
        "" => status.canonical_reason().unwrap_or("no response body").to_string(),
        text => text.chars().take(MAX_ERROR_BODY).collect(),
    };
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        Err(TransportError::Unauthorized {
            status: status.as_u16(),
            message,
        })
    } else {
        Err(TransportError::Http {
            status: status.as_u16(),
            message,
        })
    }
}

async fn read_json<T: DeserializeOwned>(
    response: Response,
) -> std::result::Result<T, TransportError> {
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| {
        let preview: String = String::from_utf8_lossy(&body).chars().take(120).collect();
        TransportError::MalformedResponse(format!("{e} (body: {preview})"))
    })
}
