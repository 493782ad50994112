// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use super::*;
use crate::session::Credential;
use crate::test_support::{mock_identity, MockBackend, GOOD_PASSWORD};

async fn bootstrapper() -> anyhow::Result<(MockBackend, Arc<SessionClient>, Arc<Bootstrapper>)> {
    let backend = MockBackend::spawn().await?;
    let client = Arc::new(backend.client()?);
    let boot = Arc::new(Bootstrapper::new(Arc::clone(&client)));
    Ok((backend, client, boot))
}

#[tokio::test]
async fn restores_credential_and_identity() -> anyhow::Result<()> {
    let (backend, client, boot) = bootstrapper().await?;
    let mut events = client.subscribe();

    let outcome = boot.run(CancellationToken::new()).await;
    assert!(matches!(outcome, BootstrapOutcome::Restored(ref id) if *id == mock_identity()));
    assert_eq!(client.session().current_credential(), Some(Credential::new("tok-1")));
    assert_eq!(client.session().current_identity(), Some(mock_identity()));
    assert_eq!(backend.refresh_calls(), 1);
    assert_eq!(backend.me_calls(), 1);

    assert_eq!(events.try_recv()?, SessionEvent::Renewed);
    assert_eq!(events.try_recv()?, SessionEvent::Authenticated { identity: mock_identity() });
    Ok(())
}

#[tokio::test]
async fn failed_identity_fetch_discards_credential() -> anyhow::Result<()> {
    let (backend, client, boot) = bootstrapper().await?;
    backend.set_me_status(500);

    let outcome = boot.run(CancellationToken::new()).await;
    assert!(matches!(outcome, BootstrapOutcome::Unauthenticated(ClientError::Validation { .. })));
    assert!(client.session().current_credential().is_none());
    assert!(client.session().current_identity().is_none());
    Ok(())
}

#[tokio::test]
async fn failed_renewal_leaves_session_empty() -> anyhow::Result<()> {
    let (backend, client, boot) = bootstrapper().await?;
    backend.set_refresh_status(401);

    let outcome = boot.run(CancellationToken::new()).await;
    match outcome {
        BootstrapOutcome::Unauthenticated(e) => assert!(e.is_unauthorized()),
        other => anyhow::bail!("unexpected outcome: {other:?}"),
    }
    assert!(!client.session().is_authenticated());
    assert_eq!(backend.me_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn cancellation_discards_result() -> anyhow::Result<()> {
    let (backend, client, boot) = bootstrapper().await?;
    backend.set_refresh_delay(Duration::from_millis(200));

    let cancel = CancellationToken::new();
    let handle = boot.spawn(cancel.clone());
    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();

    let outcome = handle.await?;
    assert!(matches!(outcome, BootstrapOutcome::Cancelled));
    assert!(client.session().current_credential().is_none());
    assert!(client.session().current_identity().is_none());
    assert!(!client.dispatcher().coordinator().is_in_flight());
    Ok(())
}

#[tokio::test]
async fn runs_at_most_once() -> anyhow::Result<()> {
    let (backend, _client, boot) = bootstrapper().await?;

    let first = boot.run(CancellationToken::new()).await;
    let second = boot.run(CancellationToken::new()).await;
    assert!(matches!(first, BootstrapOutcome::Restored(_)));
    assert!(matches!(second, BootstrapOutcome::AlreadyAttempted));
    assert_eq!(backend.refresh_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn requests_during_bootstrap_join_its_renewal() -> anyhow::Result<()> {
    let (backend, client, boot) = bootstrapper().await?;
    backend.set_refresh_delay(Duration::from_millis(50));

    let handle = boot.spawn(CancellationToken::new());
    while !client.dispatcher().coordinator().is_in_flight() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    let body = client.fetch_json(crate::dispatch::ApiRequest::get("/api/data")).await?;
    assert_eq!(body["success"], true);
    assert!(matches!(handle.await?, BootstrapOutcome::Restored(_)));
    assert_eq!(backend.refresh_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn cancellation_after_renewal_keeps_renewed_credential() -> anyhow::Result<()> {
    let (backend, client, boot) = bootstrapper().await?;
    backend.set_me_delay(Duration::from_millis(200));

    let cancel = CancellationToken::new();
    let handle = boot.spawn(cancel.clone());
    while backend.me_calls() == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    cancel.cancel();

    assert!(matches!(handle.await?, BootstrapOutcome::Cancelled));
    // The renewal belongs to the shared coordinator; only the identity is dropped.
    assert_eq!(client.session().current_credential(), Some(Credential::new("tok-1")));
    assert!(client.session().current_identity().is_none());
    Ok(())
}

#[tokio::test]
async fn login_during_failing_bootstrap_keeps_new_session() -> anyhow::Result<()> {
    let (backend, client, boot) = bootstrapper().await?;
    backend.set_refresh_status(401);
    backend.set_refresh_delay(Duration::from_millis(200));
    let mut events = client.subscribe();

    let handle = boot.spawn(CancellationToken::new());
    while !client.dispatcher().coordinator().is_in_flight() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    client.login("ada@example.com", GOOD_PASSWORD).await?;

    assert!(matches!(handle.await?, BootstrapOutcome::Superseded));
    assert_eq!(client.session().current_credential(), Some(Credential::new("tok-1")));
    assert_eq!(client.session().current_identity(), Some(mock_identity()));
    assert_eq!(events.try_recv()?, SessionEvent::Authenticated { identity: mock_identity() });
    assert!(events.try_recv().is_err());

    // Renewal stays open for the new session.
    backend.set_refresh_status(200);
    backend.set_refresh_delay(Duration::ZERO);
    backend.expire_tokens();
    let body = client.fetch_json(crate::dispatch::ApiRequest::get("/api/data")).await?;
    assert_eq!(body["success"], true);
    assert_eq!(backend.refresh_calls(), 2);
    Ok(())
}
