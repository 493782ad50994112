// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory session state: the access credential and the cached identity.
//!
//! Nothing here is persisted. The durable renewal credential lives in the
//! backend's HttpOnly cookie, held by the HTTP client's cookie jar.

pub mod renewal;

use std::fmt;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Short-lived bearer access token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// The authenticated principal as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
}

#[derive(Default)]
struct Inner {
    credential: Option<Credential>,
    identity: Option<Identity>,
}

/// Current credential and identity, readable from any task.
#[derive(Default)]
pub struct SessionState {
    inner: RwLock<Inner>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_credential(&self) -> Option<Credential> {
        self.inner.read().credential.clone()
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.inner.read().identity.clone()
    }

    pub fn set_credential(&self, credential: Credential) {
        self.inner.write().credential = Some(credential);
    }

    pub fn set_identity(&self, identity: Identity) {
        self.inner.write().identity = Some(identity);
    }

    /// Replace credential and identity in a single write.
    pub fn establish(&self, credential: Credential, identity: Identity) {
        let mut inner = self.inner.write();
        inner.credential = Some(credential);
        inner.identity = Some(identity);
    }

    /// Drop credential and identity. Safe to call when already empty.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.credential = None;
        inner.identity = None;
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.read().credential.is_some()
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    RenewalFailed,
    LoggedOut,
}

/// Session lifecycle notifications for the application boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A login or bootstrap produced a credential and identity.
    Authenticated { identity: Identity },
    /// The shared renewal minted a new credential.
    Renewed,
    /// The session is gone; the user should be sent to sign in again.
    Ended { reason: EndReason },
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
