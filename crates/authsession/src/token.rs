// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential expiry for display. Pure functions, no verification.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

/// Read the `exp` claim (epoch seconds) from a JWT-shaped token.
///
/// Returns `None` when the token has no payload segment, the payload is not
/// base64url JSON, or `exp` is missing.
pub fn expires_at(token: &str) -> Option<u64> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    let exp = &claims["exp"];
    exp.as_u64().or_else(|| exp.as_f64().filter(|v| *v >= 0.0).map(|v| v as u64))
}

/// Seconds left before expiry as of `now_secs`, saturating at zero.
pub fn seconds_remaining(token: &str, now_secs: u64) -> Option<u64> {
    expires_at(token).map(|exp| exp.saturating_sub(now_secs))
}

/// `"{m}m {ss}s"`, e.g. `"14m 05s"`.
pub fn format_remaining(secs: u64) -> String {
    format!("{}m {:02}s", secs / 60, secs % 60)
}

/// Human-readable time left on `token`, or `None` if it carries no expiry.
pub fn describe_expiry(token: &str) -> Option<String> {
    seconds_remaining(token, epoch_secs()).map(format_remaining)
}

fn epoch_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
