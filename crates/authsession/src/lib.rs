// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authsession: session-aware client for a cookie-plus-bearer auth backend.
//!
//! Outbound calls carry a short-lived access credential. When it expires, the
//! first failing call renews it and every concurrent caller shares that one
//! renewal before retrying once.

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod session;
pub mod shell;
pub mod test_support;
pub mod token;
pub mod wire;

use std::sync::Arc;

use tokio::io::BufReader;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::SessionClient;
use crate::bootstrap::{BootstrapOutcome, Bootstrapper};
use crate::config::ClientConfig;
use crate::session::SessionEvent;

/// Run the interactive shell until EOF, `quit`, or Ctrl-C.
pub async fn run(config: ClientConfig) -> anyhow::Result<()> {
    let client = Arc::new(SessionClient::new(&config)?);
    let shutdown = CancellationToken::new();

    spawn_event_logger(client.subscribe(), shutdown.clone());

    let bootstrapper = Arc::new(Bootstrapper::new(Arc::clone(&client)));
    let bootstrap = bootstrapper.spawn(shutdown.child_token());

    info!(api = %config.base_url(), "authsession ready");
    let mut stdout = tokio::io::stdout();
    let stdin = BufReader::new(tokio::io::stdin());
    let result = tokio::select! {
        r = shell::run(&client, stdin, &mut stdout) => r,
        _ = tokio::signal::ctrl_c() => Ok(()),
    };

    shutdown.cancel();
    if let Ok(BootstrapOutcome::Restored(identity)) = bootstrap.await {
        info!(user = %identity.email, "exiting with restored session");
    }
    result
}

fn spawn_event_logger(mut rx: broadcast::Receiver<SessionEvent>, shutdown: CancellationToken) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Ok(SessionEvent::Ended { reason }) => {
                        warn!(?reason, "session ended, sign in again");
                    }
                    Ok(event) => info!(?event, "session event"),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(_) => break,
                },
                _ = shutdown.cancelled() => break,
            }
        }
    });
}
