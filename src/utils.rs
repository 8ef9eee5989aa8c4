//! Utility functions for result paths and artifact file names

use rand::Rng;
use rand::distributions::Alphanumeric;
use std::path::{Component, Path};

use crate::types::{JobId, Operation};

/// Name of the bundle file written into every result directory
pub const RESULTS_FILE: &str = "results.json";

/// Replace every character outside `[A-Za-z0-9._-]` with `_`
///
/// # Examples
///
/// ```
/// use audial::utils::sanitize_component;
///
/// assert_eq!(sanitize_component("exe/42:a"), "exe_42_a");
/// assert_eq!(sanitize_component("abc-1.2_x"), "abc-1.2_x");
/// ```
pub fn sanitize_component(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Directory name for a job's results: `{sanitized id}_{operation}`
///
/// Returns `None` when the id sanitizes to something unusable (empty, `.` or `..`).
pub fn result_dir_name(job_id: &JobId, operation: Operation) -> Option<String> {
    let id = sanitize_component(job_id.as_str().trim());
    if id.is_empty() || id == "." || id == ".." {
        return None;
    }
    Some(format!("{}_{}", id, operation.as_str()))
}

/// Whether `name` is a single plain file name that may be written into a result directory
pub fn is_plain_file_name(name: &str) -> bool {
    if name.is_empty() || name == RESULTS_FILE || name.contains(['/', '\\', '\0']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Last non-empty path segment of an artifact URL
///
/// Works for absolute URLs and for paths relative to the API base. Query
/// strings and fragments are ignored.
pub fn file_name_from_url(location: &str) -> Option<String> {
    let path = match url::Url::parse(location) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => location
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };
    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .map(str::to_string)
}

/// Longest file name most filesystems accept, in bytes
const MAX_FILE_NAME: usize = 255;

/// Bytes `temp_file_name` adds around the embedded name
const TEMP_OVERHEAD: usize = ".".len() + ".".len() + TEMP_SUFFIX_LEN + ".part".len();

const TEMP_SUFFIX_LEN: usize = 8;

/// Hidden temp file name an artifact is streamed into before the final rename
///
/// The embedded name is shortened so the result never exceeds 255 bytes.
pub fn temp_file_name(name: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TEMP_SUFFIX_LEN)
        .map(char::from)
        .collect();
    let stem = truncate_bytes(name, MAX_FILE_NAME - TEMP_OVERHEAD);
    format!(".{stem}.{suffix}.part")
}

/// Longest prefix of `s` that fits in `max` bytes without splitting a character
fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
