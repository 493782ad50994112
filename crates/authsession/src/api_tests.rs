// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use super::*;
use crate::test_support::{mock_identity, MockBackend, GOOD_PASSWORD, TAKEN_EMAIL};

#[tokio::test]
async fn login_establishes_session() -> anyhow::Result<()> {
    let backend = MockBackend::spawn().await?;
    let client = backend.client()?;
    let mut events = client.subscribe();

    let identity = client.login("ada@example.com", GOOD_PASSWORD).await?;
    assert_eq!(identity, mock_identity());
    assert_eq!(client.session().current_identity(), Some(mock_identity()));
    assert_eq!(client.session().current_credential(), Some(Credential::new("tok-1")));
    assert_eq!(events.try_recv()?, SessionEvent::Authenticated { identity: mock_identity() });
    Ok(())
}

#[tokio::test]
async fn bad_password_is_validation_failure_without_renewal() -> anyhow::Result<()> {
    let backend = MockBackend::spawn().await?;
    let client = backend.client()?;

    let err = client.login("ada@example.com", "wrong").await.err();
    match err {
        Some(ClientError::Validation { status, message }) => {
            assert_eq!(status, 401);
            assert_eq!(message, "Invalid email or password");
        }
        other => anyhow::bail!("unexpected result: {other:?}"),
    }
    assert_eq!(backend.refresh_calls(), 0);
    assert!(!client.session().is_authenticated());
    Ok(())
}

#[tokio::test]
async fn register_leaves_session_untouched() -> anyhow::Result<()> {
    let backend = MockBackend::spawn().await?;
    let client = backend.client()?;

    let message = client.register("Ada", "new@example.com", "pw").await?;
    assert_eq!(message, "User registered successfully");
    assert!(client.session().current_credential().is_none());
    assert!(client.session().current_identity().is_none());

    let err = client.register("Ada", TAKEN_EMAIL, "pw").await.err();
    assert!(matches!(err, Some(ClientError::Validation { status: 409, .. })));
    Ok(())
}

#[tokio::test]
async fn me_replaces_cached_identity() -> anyhow::Result<()> {
    let backend = MockBackend::spawn().await?;
    let client = backend.client()?;
    client.login("ada@example.com", GOOD_PASSWORD).await?;
    client.session().set_identity(Identity {
        id: "stale".to_owned(),
        name: "Old Name".to_owned(),
        email: "old@example.com".to_owned(),
        role: "guest".to_owned(),
    });

    let identity = client.me().await?;
    assert_eq!(identity, mock_identity());
    assert_eq!(client.session().current_identity(), Some(mock_identity()));
    Ok(())
}

#[tokio::test]
async fn refresh_uses_login_cookie() -> anyhow::Result<()> {
    let backend = MockBackend::spawn().await?;
    backend.require_refresh_cookie(true);
    let client = backend.client()?;
    client.login("ada@example.com", GOOD_PASSWORD).await?;

    let credential = client.refresh().await?;
    assert_eq!(credential, Credential::new("tok-2"));
    assert_eq!(client.session().current_credential(), Some(credential));
    Ok(())
}

#[tokio::test]
async fn refresh_without_cookie_fails() -> anyhow::Result<()> {
    let backend = MockBackend::spawn().await?;
    backend.require_refresh_cookie(true);
    let client = backend.client()?;

    let err = client.refresh().await.err();
    assert!(matches!(err, Some(ClientError::RenewalFailed(ref e)) if e.is_unauthorized()));
    Ok(())
}

#[tokio::test]
async fn logout_clears_session_even_when_backend_fails() -> anyhow::Result<()> {
    let backend = MockBackend::spawn().await?;
    backend.set_logout_status(500);
    let client = backend.client()?;
    client.login("ada@example.com", GOOD_PASSWORD).await?;
    let mut events = client.subscribe();

    let result = client.logout().await;
    assert!(matches!(result, Err(ClientError::Validation { status: 500, .. })));
    assert!(client.session().current_credential().is_none());
    assert!(client.session().current_identity().is_none());
    assert_eq!(events.try_recv()?, SessionEvent::Ended { reason: EndReason::LoggedOut });
    Ok(())
}

#[tokio::test]
async fn logout_twice_is_harmless() -> anyhow::Result<()> {
    let backend = MockBackend::spawn().await?;
    let client = backend.client()?;
    client.login("ada@example.com", GOOD_PASSWORD).await?;

    client.logout().await?;
    client.logout().await?;
    assert!(!client.session().is_authenticated());
    assert_eq!(backend.logout_calls(), 2);
    Ok(())
}

#[tokio::test]
async fn no_renewal_after_logout_until_next_login() -> anyhow::Result<()> {
    let backend = MockBackend::spawn().await?;
    let client = backend.client()?;
    client.login("ada@example.com", GOOD_PASSWORD).await?;
    client.logout().await?;

    let err = client.fetch_json(ApiRequest::get("/api/data")).await.err();
    assert!(err.as_ref().is_some_and(ClientError::is_unauthorized));
    assert_eq!(backend.refresh_calls(), 0);

    client.login("ada@example.com", GOOD_PASSWORD).await?;
    backend.expire_tokens();
    let body = client.fetch_json(ApiRequest::get("/api/data")).await?;
    assert_eq!(body["data"]["items"][0], 1);
    assert_eq!(backend.refresh_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn logout_during_renewal_keeps_session_closed() -> anyhow::Result<()> {
    let backend = MockBackend::spawn().await?;
    let client = Arc::new(backend.client()?);
    client.login("ada@example.com", GOOD_PASSWORD).await?;
    backend.expire_tokens();
    backend.set_refresh_delay(Duration::from_millis(200));

    let pending = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.fetch_json(ApiRequest::get("/api/data")).await }
    });
    while !client.dispatcher().coordinator().is_in_flight() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    let mut events = client.subscribe();
    client.logout().await?;
    let err = pending.await?.err();

    assert!(err.as_ref().is_some_and(ClientError::is_unauthorized));
    assert!(client.session().current_credential().is_none());
    assert!(client.session().current_identity().is_none());
    assert_eq!(events.try_recv()?, SessionEvent::Ended { reason: EndReason::LoggedOut });
    assert!(events.try_recv().is_err());

    let err = client.fetch_json(ApiRequest::get("/api/data")).await.err();
    assert!(matches!(err, Some(ClientError::RenewalFailed(_))));
    assert_eq!(backend.refresh_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn fetch_json_maps_statuses() -> anyhow::Result<()> {
    let backend = MockBackend::spawn().await?;
    let client = backend.client()?;
    client.login("ada@example.com", GOOD_PASSWORD).await?;

    let err = client.fetch_json(ApiRequest::get("/api/broken")).await.err();
    match err {
        Some(ClientError::Validation { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "Internal server error");
        }
        other => anyhow::bail!("unexpected result: {other:?}"),
    }

    backend.reject_data(true);
    let err = client.fetch_json(ApiRequest::get("/api/data")).await.err();
    assert!(matches!(err, Some(ClientError::Unauthorized { .. })));
    Ok(())
}
