// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine-readable error codes surfaced by the session client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    Unauthorized,
    RenewalFailed,
    Network,
    Validation,
    Decode,
}

impl ErrorCode {
    /// HTTP status that best describes the failure, for callers that relay it.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::RenewalFailed => 401,
            Self::Network => 503,
            Self::Validation => 400,
            Self::Decode => 502,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::RenewalFailed => "RENEWAL_FAILED",
            Self::Network => "NETWORK",
            Self::Validation => "VALIDATION_FAILED",
            Self::Decode => "DECODE",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a failed renewal, shared verbatim with every queued waiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenewalError {
    /// HTTP status returned by the renewal endpoint, if it answered at all.
    pub status: Option<u16>,
    pub message: String,
    /// The renewing caller went away before an outcome was known.
    pub abandoned: bool,
}

impl RenewalError {
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self { status: Some(status), message: message.into(), abandoned: false }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self { status: None, message: message.into(), abandoned: false }
    }

    pub fn abandoned() -> Self {
        Self {
            status: None,
            message: "renewal abandoned before completion".to_owned(),
            abandoned: true,
        }
    }

    /// The session this renewal ran for was ended or replaced before it finished.
    pub fn superseded() -> Self {
        Self::rejected(401, "session changed during renewal")
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == Some(401)
    }
}

impl fmt::Display for RenewalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "renewal failed ({status}): {}", self.message),
            None => write!(f, "renewal failed: {}", self.message),
        }
    }
}

impl std::error::Error for RenewalError {}

/// Errors returned by the session client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The backend rejected the credential and renewal could not recover it.
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    /// The shared renewal failed; the session has ended.
    #[error(transparent)]
    RenewalFailed(#[from] RenewalError),

    /// Transport-level failure: connect, TLS, timeout, or body read.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The backend reported a failure unrelated to authorization.
    #[error("request failed ({status}): {message}")]
    Validation { status: u16, message: String },

    /// The response body did not match the expected shape.
    #[error("malformed response: {0}")]
    Decode(String),
}

impl ClientError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Unauthorized { .. } => ErrorCode::Unauthorized,
            Self::RenewalFailed(_) => ErrorCode::RenewalFailed,
            Self::Network(_) => ErrorCode::Network,
            Self::Validation { .. } => ErrorCode::Validation,
            Self::Decode(_) => ErrorCode::Decode,
        }
    }

    /// True when the caller should treat the user as signed out.
    pub fn is_unauthorized(&self) -> bool {
        match self {
            Self::Unauthorized { .. } => true,
            Self::RenewalFailed(e) => e.is_unauthorized(),
            _ => false,
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
