// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Silent session restore at application start.
//!
//! Renews through the shared coordinator (using only the refresh cookie) and
//! then fetches the identity. Either both land in the session or the session
//! is cleared. A cancelled bootstrap discards whatever it had gathered, and a
//! bootstrap overtaken by a login or logout leaves that newer session alone.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::api::SessionClient;
use crate::error::ClientError;
use crate::session::{Identity, SessionEvent};

/// Result of a bootstrap attempt.
#[derive(Debug)]
pub enum BootstrapOutcome {
    /// A session was restored for this identity.
    Restored(Identity),
    /// No session could be restored; the session state is empty.
    Unauthenticated(ClientError),
    /// The owning context went away first; nothing was written.
    Cancelled,
    /// A login or logout happened while bootstrap ran; its result was dropped.
    Superseded,
    /// Bootstrap already ran for this client.
    AlreadyAttempted,
}

pub struct Bootstrapper {
    client: Arc<SessionClient>,
    attempted: AtomicBool,
}

impl Bootstrapper {
    pub fn new(client: Arc<SessionClient>) -> Self {
        Self { client, attempted: AtomicBool::new(false) }
    }

    /// Run [`Bootstrapper::run`] in the background.
    pub fn spawn(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<BootstrapOutcome> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.run(cancel).await })
    }

    /// Attempt the restore once. Later calls return `AlreadyAttempted`.
    pub async fn run(&self, cancel: CancellationToken) -> BootstrapOutcome {
        if self.attempted.swap(true, Ordering::SeqCst) {
            return BootstrapOutcome::AlreadyAttempted;
        }

        let coordinator = self.client.dispatcher().coordinator();
        let epoch = coordinator.epoch();
        let restored = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("bootstrap cancelled before completion");
                return BootstrapOutcome::Cancelled;
            }
            r = self.restore() => r,
        };
        if cancel.is_cancelled() {
            debug!("bootstrap cancelled, discarding result");
            return BootstrapOutcome::Cancelled;
        }

        match restored {
            Ok(identity) => {
                let stored =
                    coordinator.apply_if_current(epoch, |s| s.set_identity(identity.clone()));
                if !stored {
                    debug!("session changed during bootstrap, discarding restored identity");
                    return BootstrapOutcome::Superseded;
                }
                info!(user = %identity.email, "session restored");
                let _ = self
                    .client
                    .events()
                    .send(SessionEvent::Authenticated { identity: identity.clone() });
                BootstrapOutcome::Restored(identity)
            }
            Err(e) => {
                if !coordinator.apply_if_current(epoch, |s| s.clear()) {
                    debug!(err = %e, "session changed during bootstrap, leaving it alone");
                    return BootstrapOutcome::Superseded;
                }
                debug!(err = %e, "no session to restore");
                BootstrapOutcome::Unauthenticated(e)
            }
        }
    }

    async fn restore(&self) -> Result<Identity, ClientError> {
        self.client.dispatcher().ensure_fresh_credential().await?;
        self.client.fetch_identity().await
    }
}

#[cfg(test)]
#[path = "bootstrap_tests.rs"]
mod tests;
