// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed auth API and the composition root that wires session, coordinator,
//! and dispatcher together.

use std::sync::Arc;

use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::dispatch::{ApiRequest, Dispatcher};
use crate::error::ClientError;
use crate::session::renewal::RenewalCoordinator;
use crate::session::{Credential, EndReason, Identity, SessionEvent, SessionState};
use crate::wire::{error_message, Envelope, LoginData, MessageBody, UserData};

/// One authenticated session against the backend.
///
/// Owns the HTTP client (and its cookie jar holding the refresh cookie), the
/// in-memory session, and the renewal coordinator. Build one per application;
/// tests build a fresh one per case.
pub struct SessionClient {
    dispatcher: Arc<Dispatcher>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionClient {
    pub fn new(config: &ClientConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let _ = rustls::crypto::ring::default_provider().install_default();

        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.timeout())
            .build()?;

        let session = Arc::new(SessionState::new());
        let (events, _) = broadcast::channel(64);
        let coordinator = Arc::new(RenewalCoordinator::new(Arc::clone(&session), events.clone()));
        let dispatcher = Arc::new(Dispatcher::new(
            http,
            config.base_url(),
            config.endpoints(),
            session,
            coordinator,
        ));
        Ok(Self { dispatcher, events })
    }

    pub fn session(&self) -> &Arc<SessionState> {
        self.dispatcher.session()
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub(crate) fn events(&self) -> &broadcast::Sender<SessionEvent> {
        &self.events
    }

    /// Sign in and establish credential plus identity.
    ///
    /// Bad credentials come back as [`ClientError::Validation`] with the
    /// backend's message; they never trigger renewal.
    pub async fn login(&self, email: &str, password: &str) -> Result<Identity, ClientError> {
        let path = self.dispatcher.endpoints().login.as_str();
        let request = ApiRequest::post(path)
            .json(json!({ "email": email, "password": password }))
            .skip_renewal();

        let resp = self.dispatcher.send(request).await?;
        let data: LoginData = match read_data(resp).await {
            Err(ClientError::Unauthorized { message }) => {
                return Err(ClientError::Validation { status: 401, message });
            }
            other => other?,
        };

        self.dispatcher
            .coordinator()
            .begin_session(Credential::new(data.access_token), data.user.clone());
        info!(user = %data.user.email, "signed in");
        let _ = self.events.send(SessionEvent::Authenticated { identity: data.user.clone() });
        Ok(data.user)
    }

    /// Create an account. Does not sign in and never touches the session.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<String, ClientError> {
        let path = self.dispatcher.endpoints().register.as_str();
        let request = ApiRequest::post(path)
            .json(json!({ "name": name, "email": email, "password": password }))
            .skip_renewal();

        let resp = self.dispatcher.send(request).await?;
        let body: MessageBody = read_body(resp).await?;
        Ok(body.message)
    }

    /// Fetch the current identity and cache it in the session.
    pub async fn me(&self) -> Result<Identity, ClientError> {
        let identity = self.fetch_identity().await?;
        self.session().set_identity(identity.clone());
        Ok(identity)
    }

    /// Fetch the identity without caching it.
    pub(crate) async fn fetch_identity(&self) -> Result<Identity, ClientError> {
        let path = self.dispatcher.endpoints().me.as_str();
        let resp = self.dispatcher.send(ApiRequest::get(path)).await?;
        let data: UserData = read_data(resp).await?;
        Ok(data.user)
    }

    /// Force a renewal, joining one already in flight.
    pub async fn refresh(&self) -> Result<Credential, ClientError> {
        Ok(self.dispatcher.ensure_fresh_credential().await?)
    }

    /// Sign out. Local session state is cleared whatever the backend says,
    /// and a renewal still in flight can no longer write to it.
    ///
    /// An unauthorized answer means the server already considers the session
    /// gone and is not reported as an error.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let path = self.dispatcher.endpoints().logout.as_str();
        let outcome = match self.dispatcher.send(ApiRequest::post(path)).await {
            Ok(resp) => read_body::<MessageBody>(resp).await.map(|_| ()),
            Err(e) => Err(e),
        };

        let had_session = self.session().is_authenticated();
        self.dispatcher.coordinator().end_session();
        if had_session {
            info!("signed out");
            let _ = self.events.send(SessionEvent::Ended { reason: EndReason::LoggedOut });
        }

        match outcome {
            Err(e) if e.is_unauthorized() => Ok(()),
            Err(e) => {
                warn!(err = %e, "logout call failed, local session cleared anyway");
                Err(e)
            }
            Ok(()) => Ok(()),
        }
    }

    /// Send an arbitrary request and decode its JSON body.
    pub async fn fetch_json(&self, request: ApiRequest) -> Result<serde_json::Value, ClientError> {
        let resp = self.dispatcher.send(request).await?;
        read_body(resp).await
    }
}

/// Map a non-success status to the error taxonomy, passing success through.
async fn check(resp: Response) -> Result<Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = error_message(resp).await;
    if status == StatusCode::UNAUTHORIZED {
        Err(ClientError::Unauthorized { message })
    } else {
        Err(ClientError::Validation { status: status.as_u16(), message })
    }
}

async fn read_body<T: DeserializeOwned>(resp: Response) -> Result<T, ClientError> {
    let resp = check(resp).await?;
    resp.json().await.map_err(|e| ClientError::Decode(e.to_string()))
}

async fn read_data<T: DeserializeOwned>(resp: Response) -> Result<T, ClientError> {
    let body: Envelope<T> = read_body(resp).await?;
    Ok(body.data)
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;
