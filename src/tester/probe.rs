//! Probe results and response classification.
//!
//! A probe never returns `Err`: every transport or protocol problem becomes a
//! failed [`ProbeResult`] carrying a typed [`ProbeFailure`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum characters of a response body kept in failure details.
pub const BODY_PREVIEW_CHARS: usize = 200;

/// Why a probe failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProbeFailure {
    /// Connection refused or host unreachable.
    NotRunning,
    /// No response within the request timeout.
    Timeout,
    /// Any other transport error.
    Transport {
        /// Error text from the HTTP client.
        detail: String,
    },
    /// The server answered with a status other than 200.
    HttpStatus {
        /// HTTP status code.
        status_code: u16,
        /// Start of the response body.
        body: String,
    },
    /// The body could not be decoded as expected.
    BadPayload {
        /// What was wrong with the payload.
        detail: String,
    },
    /// The character list decoded but was empty.
    EmptyList,
    /// A 200 synthesis response that does not look like audio.
    NotAudio {
        /// Content type returned by the server.
        content_type: String,
        /// Body length in bytes.
        size: usize,
        /// Start of the body, lossily decoded.
        preview: String,
    },
    /// Writing the returned audio to disk failed.
    Io {
        /// I/O error text.
        detail: String,
    },
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotRunning => write!(f, "connection refused"),
            Self::Timeout => write!(f, "request timed out"),
            Self::Transport { detail } => write!(f, "transport error: {detail}"),
            Self::HttpStatus { status_code, body } if body.is_empty() => {
                write!(f, "HTTP {status_code}")
            }
            Self::HttpStatus { status_code, body } => write!(f, "HTTP {status_code}: {body}"),
            Self::BadPayload { detail } => write!(f, "malformed response: {detail}"),
            Self::EmptyList => write!(f, "character list is empty"),
            Self::NotAudio {
                content_type,
                size,
                preview,
            } => write!(
                f,
                "response is not audio (content-type: {content_type:?}, {size} bytes): {preview}"
            ),
            Self::Io { detail } => write!(f, "could not save audio: {detail}"),
        }
    }
}

/// Outcome of one probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub test_name: String,
    pub passed: bool,
    /// Human-readable summary of what happened.
    pub detail: String,
    /// Typed cause, present exactly when `passed` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<ProbeFailure>,
}

impl ProbeResult {
    /// A passing result.
    pub fn pass(test_name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            test_name: test_name.into(),
            passed: true,
            detail: detail.into(),
            failure: None,
        }
    }

    /// A failing result; the detail is the failure's display text.
    pub fn fail(test_name: impl Into<String>, failure: ProbeFailure) -> Self {
        Self {
            test_name: test_name.into(),
            passed: false,
            detail: failure.to_string(),
            failure: Some(failure),
        }
    }
}

impl fmt::Display for ProbeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.passed { "PASS" } else { "FAIL" };
        write!(f, "[{mark}] {}: {}", self.test_name, self.detail)
    }
}

/// Classifies a reqwest error into a [`ProbeFailure`].
pub(crate) fn classify_reqwest_error(err: &reqwest::Error) -> ProbeFailure {
    if err.is_timeout() {
        ProbeFailure::Timeout
    } else if err.is_connect() {
        ProbeFailure::NotRunning
    } else if err.is_decode() {
        ProbeFailure::BadPayload {
            detail: err.to_string(),
        }
    } else {
        ProbeFailure::Transport {
            detail: err.to_string(),
        }
    }
}

/// Decides whether a 200 synthesis response carries audio.
///
/// True when the content type mentions `audio` or the body is strictly
/// larger than `min_bytes`. A large JSON error body served with 200 passes
/// this check; the server contract gives nothing better to go on.
pub fn is_audio_response(content_type: &str, body_len: usize, min_bytes: usize) -> bool {
    content_type.contains("audio") || body_len > min_bytes
}

/// First [`BODY_PREVIEW_CHARS`] characters of `body`.
pub(crate) fn preview(body: &str) -> String {
    body.chars().take(BODY_PREVIEW_CHARS).collect()
}
