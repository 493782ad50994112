// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON shapes exchanged with the auth backend.

use serde::{Deserialize, Serialize};

use crate::session::Identity;

/// Success envelope: `{"success": true, "data": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub success: bool,
    pub data: T,
}

/// Message-only body used by register, logout, and error responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageBody {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenData {
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    pub access_token: String,
    pub user: Identity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserData {
    pub user: Identity,
}

/// Consume a failed response and extract the backend's message, falling back
/// to the raw body and then to the status reason.
pub async fn error_message(resp: reqwest::Response) -> String {
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    match serde_json::from_str::<MessageBody>(&text) {
        Ok(body) if !body.message.is_empty() => body.message,
        _ if !text.trim().is_empty() => text,
        _ => status.canonical_reason().unwrap_or("request failed").to_owned(),
    }
}
