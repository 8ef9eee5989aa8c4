//! Configuration types for audial

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Environment variable holding the API key
pub const ENV_API_KEY: &str = "AUDIAL_API_KEY";
/// Environment variable overriding the API base URL
pub const ENV_API_URL: &str = "AUDIAL_API_URL";
/// Environment variable holding the user id sent with job payloads
pub const ENV_USER_ID: &str = "AUDIAL_USER_ID";
/// Environment variable overriding the results root
pub const ENV_RESULTS_FOLDER: &str = "AUDIAL_RESULTS_FOLDER";

/// Service endpoint and credential settings
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API base URL (default: "https://api.audial.io/v1/")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Process-wide API key; a `JobRequest` may override it
    #[serde(default)]
    pub api_key: Option<String>,

    /// User id included in job payloads when set
    #[serde(default)]
    pub user_id: Option<String>,

    /// Timeout for submit/status/listing requests (default: 60 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Timeout for a single artifact download (default: 300 seconds)
    #[serde(default = "default_download_timeout", with = "duration_serde")]
    pub download_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            user_id: None,
            request_timeout: default_request_timeout(),
            download_timeout: default_download_timeout(),
        }
    }
}

/// Poll loop backoff and deadline
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PollConfig {
    /// Delay before the first status poll (default: 2000 ms)
    #[serde(default = "default_poll_initial", with = "duration_millis_serde")]
    pub initial_interval: Duration,

    /// Ceiling for the poll interval (default: 10000 ms)
    #[serde(default = "default_poll_max", with = "duration_millis_serde")]
    pub max_interval: Duration,

    /// Growth factor applied after each non-terminal poll (default: 1.5)
    #[serde(default = "default_poll_multiplier")]
    pub backoff_multiplier: f64,

    /// Maximum time to wait for a terminal state (default: 600 seconds)
    #[serde(default = "default_max_wait", with = "duration_serde")]
    pub max_wait: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_interval: default_poll_initial(),
            max_interval: default_poll_max(),
            backoff_multiplier: default_poll_multiplier(),
            max_wait: default_max_wait(),
        }
    }
}

/// Retry configuration for transport failures while polling
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 500 ms)
    #[serde(default = "default_initial_delay", with = "duration_millis_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 4000 ms)
    #[serde(default = "default_max_delay", with = "duration_millis_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Batch processing settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Jobs allowed in flight at once when a batch gives no limit (default: 3)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_jobs: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent(),
        }
    }
}

/// Main configuration for [`AudialClient`](crate::AudialClient)
///
/// Passed once at construction; nothing is read from process-wide state
/// afterwards. Every field has a default so a partial JSON/TOML document
/// deserializes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Endpoint and credential settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Directory under which every job's result directory is created
    /// (default: "./audial_results")
    #[serde(default = "default_results_root")]
    pub results_root: PathBuf,

    /// Poll loop backoff and deadline
    #[serde(default)]
    pub polling: PollConfig,

    /// Transport retries during polling
    #[serde(default)]
    pub retry: RetryConfig,

    /// Batch concurrency
    #[serde(default)]
    pub batch: BatchConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            results_root: default_results_root(),
            polling: PollConfig::default(),
            retry: RetryConfig::default(),
            batch: BatchConfig::default(),
        }
    }
}

impl Config {
    /// Defaults overridden by the `AUDIAL_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by values from `lookup`; blank values are ignored
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut config = Config::default();
        if let Some(key) = get(ENV_API_KEY) {
            config.api.api_key = Some(key);
        }
        if let Some(url) = get(ENV_API_URL) {
            config.api.base_url = url;
        }
        if let Some(user) = get(ENV_USER_ID) {
            config.api.user_id = Some(user);
        }
        if let Some(folder) = get(ENV_RESULTS_FOLDER) {
            config.results_root = PathBuf::from(folder);
        }
        config
    }

    /// Check settings that would otherwise fail deep inside a job
    pub fn validate(&self) -> Result<()> {
        let invalid = |key: &str, message: String| Error::Config {
            message,
            key: Some(key.to_string()),
        };

        url::Url::parse(&self.api.base_url).map_err(|e| {
            invalid(
                "api.base_url",
                format!("invalid base URL '{}': {}", self.api.base_url, e),
            )
        })?;

        if self.results_root.as_os_str().is_empty() {
            return Err(invalid("results_root", "results root is empty".into()));
        }
        if self.batch.max_concurrent_jobs == 0 {
            return Err(invalid(
                "batch.max_concurrent_jobs",
                "must allow at least one job".into(),
            ));
        }
        if self.polling.initial_interval.is_zero() {
            return Err(invalid(
                "polling.initial_interval",
                "poll interval must be positive".into(),
            ));
        }
        if self.polling.max_interval < self.polling.initial_interval {
            return Err(invalid(
                "polling.max_interval",
                format!(
                    "max interval {:?} is below initial interval {:?}",
                    self.polling.max_interval, self.polling.initial_interval
                ),
            ));
        }
        let multiplier = self.polling.backoff_multiplier;
        if !(multiplier.is_finite() && multiplier >= 1.0) {
            return Err(invalid(
                "polling.backoff_multiplier",
                format!("must be a finite number >= 1.0, got {multiplier}"),
            ));
        }
        if self.polling.max_wait.is_zero() {
            return Err(invalid("polling.max_wait", "max wait must be positive".into()));
        }
        let multiplier = self.retry.backoff_multiplier;
        if !(multiplier.is_finite() && multiplier >= 1.0) {
            return Err(invalid(
                "retry.backoff_multiplier",
                format!("must be a finite number >= 1.0, got {multiplier}"),
            ));
        }
        Ok(())
    }
}

fn default_base_url() -> String {
    "https://api.audial.io/v1/".to_string()
}

fn default_results_root() -> PathBuf {
    PathBuf::from("./audial_results")
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_download_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_poll_initial() -> Duration {
    Duration::from_secs(2)
}

fn default_poll_max() -> Duration {
    Duration::from_secs(10)
}

fn default_poll_multiplier() -> f64 {
    1.5
}

fn default_max_wait() -> Duration {
    Duration::from_secs(10 * 60)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(4)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_concurrent() -> usize {
    3
}

fn default_true() -> bool {
    true
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds)
mod duration_millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
