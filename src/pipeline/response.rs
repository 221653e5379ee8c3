//! Response interpretation: document bytes + filename, or a failure message.
//!
//! The generation service is a FastAPI app. Errors come back as
//! `{"detail": "reason"}`, or for request-validation failures as
//! `{"detail": [{"msg": "...", ...}, ...]}`. Successful responses carry the
//! PDF body and, usually, a `Content-Disposition` header naming the file.
//! The service emits the unquoted form (`filename=cover_letter.pdf`), so
//! both quoted and unquoted values are accepted.

use crate::error::{SubmitError, GENERIC_FAILURE_MESSAGE};
use bytes::Bytes;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static QUOTED_FILENAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\bfilename\s*=\s*"([^"]*)""#).unwrap());

static BARE_FILENAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\bfilename\s*=\s*([^";\s]+)"#).unwrap());

/// Outcome of one submission attempt. Produced exactly once per attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionResult {
    Success { bytes: Bytes, suggested_name: String },
    Failure { message: String },
}

impl SubmissionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, SubmissionResult::Success { .. })
    }
}

/// A successfully generated document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedDocument {
    pub bytes: Bytes,
    pub suggested_name: String,
}

impl From<Result<GeneratedDocument, SubmitError>> for SubmissionResult {
    fn from(result: Result<GeneratedDocument, SubmitError>) -> Self {
        match result {
            Ok(doc) => SubmissionResult::Success {
                bytes: doc.bytes,
                suggested_name: doc.suggested_name,
            },
            Err(e) => SubmissionResult::Failure {
                message: e.user_message(),
            },
        }
    }
}

/// Recover a filename from a `Content-Disposition` header value.
///
/// Returns `None` when no usable name is present. Directory components are
/// stripped so a hostile header cannot point outside the download folder.
pub fn filename_from_disposition(header: &str) -> Option<String> {
    let raw = QUOTED_FILENAME
        .captures(header)
        .or_else(|| BARE_FILENAME.captures(header))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())?;

    let name = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name.to_string())
    }
}

/// Resolve the download filename, falling back to `default` when the header
/// is missing or unparsable.
pub fn resolve_filename(header: Option<&str>, default: &str) -> String {
    header
        .and_then(filename_from_disposition)
        .unwrap_or_else(|| default.to_string())
}

/// Extract a human-readable reason from a failure body, if there is one.
pub fn decode_error_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    let obj = value.as_object()?;

    match obj.get("detail") {
        Some(Value::String(s)) if !s.trim().is_empty() => return Some(s.clone()),
        Some(Value::Array(items)) => {
            let msgs: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            if !msgs.is_empty() {
                return Some(msgs.join("; "));
            }
        }
        _ => {}
    }

    obj.get("message")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

/// Build the error for a non-success response.
pub fn server_error(status: u16, body: &[u8]) -> SubmitError {
    let message = decode_error_message(body)
        .unwrap_or_else(|| format!("{} (HTTP {})", GENERIC_FAILURE_MESSAGE, status));
    SubmitError::Server { status, message }
}
