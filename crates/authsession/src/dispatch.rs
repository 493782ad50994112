// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authenticated request dispatch with one-shot retry after renewal.
//!
//! Every outbound call goes through [`Dispatcher::send`]. A 401 on a request
//! that has not been retried yet triggers the shared renewal and a single
//! resend with the new credential. Calls to the renewal endpoint are never
//! renewed, which keeps an expired refresh cookie from recursing.

use std::sync::Arc;

use reqwest::{Method, Response, StatusCode};
use tracing::debug;

use crate::config::Endpoints;
use crate::error::{ClientError, RenewalError};
use crate::session::renewal::RenewalCoordinator;
use crate::session::{Credential, SessionState};
use crate::wire::{error_message, AccessTokenData, Envelope};

/// An outbound API call, rebuilt on every attempt so it can be resent.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    body: Option<serde_json::Value>,
    renewable: bool,
    retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), body: None, renewable: true, retried: false }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Attach a JSON body.
    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Return a 401 to the caller instead of renewing. Used for login and
    /// register, where a 401 means bad input rather than an expired session.
    pub fn skip_renewal(mut self) -> Self {
        self.renewable = false;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_retried(&self) -> bool {
        self.retried
    }
}

/// Attaches the session credential to requests and recovers from expiry.
pub struct Dispatcher {
    http: reqwest::Client,
    base_url: String,
    endpoints: Endpoints,
    session: Arc<SessionState>,
    coordinator: Arc<RenewalCoordinator>,
}

impl Dispatcher {
    pub fn new(
        http: reqwest::Client,
        base_url: String,
        endpoints: Endpoints,
        session: Arc<SessionState>,
        coordinator: Arc<RenewalCoordinator>,
    ) -> Self {
        Self { http, base_url, endpoints, session, coordinator }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    pub fn coordinator(&self) -> &Arc<RenewalCoordinator> {
        &self.coordinator
    }

    /// Send `request`, renewing the credential and retrying once on 401.
    ///
    /// Non-401 responses are returned as-is, whatever their status. A 401
    /// from the retry, from the renewal endpoint, or from a request marked
    /// [`ApiRequest::skip_renewal`] is returned as a response too. Only
    /// transport failures and renewal failures surface as errors.
    pub async fn send(&self, mut request: ApiRequest) -> Result<Response, ClientError> {
        let renewal_call = self.endpoints.is_refresh(&request.path);
        let credential = if renewal_call { None } else { self.session.current_credential() };

        let resp = self.execute(&request, credential.as_ref()).await?;
        if resp.status() != StatusCode::UNAUTHORIZED || request.retried {
            return Ok(resp);
        }
        if renewal_call || !request.renewable {
            debug!(path = %request.path, "unauthorized, renewal not applicable");
            return Ok(resp);
        }

        request.retried = true;
        debug!(path = %request.path, "unauthorized, renewing credential");
        let fresh =
            self.coordinator.ensure_fresh_credential(credential.as_ref(), || self.renew()).await?;

        let resp = self.execute(&request, Some(&fresh)).await?;
        Ok(resp)
    }

    /// Renew the credential through the shared coordinator.
    ///
    /// Joins a renewal already in flight rather than starting a second one.
    pub async fn ensure_fresh_credential(&self) -> Result<Credential, RenewalError> {
        let current = self.session.current_credential();
        self.coordinator.ensure_fresh_credential(current.as_ref(), || self.renew()).await
    }

    /// One call to the renewal endpoint. Relies on the refresh cookie only.
    async fn renew(&self) -> Result<Credential, RenewalError> {
        let request = ApiRequest::post(self.endpoints.refresh.as_str());
        let resp = self
            .execute(&request, None)
            .await
            .map_err(|e| RenewalError::transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let message = error_message(resp).await;
            return Err(RenewalError::rejected(status.as_u16(), message));
        }

        let body: Envelope<AccessTokenData> = resp
            .json()
            .await
            .map_err(|e| RenewalError::transport(format!("invalid renewal response: {e}")))?;
        Ok(Credential::new(body.data.access_token))
    }

    async fn execute(
        &self,
        request: &ApiRequest,
        credential: Option<&Credential>,
    ) -> Result<Response, reqwest::Error> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self.http.request(request.method.clone(), url);
        if let Some(credential) = credential {
            builder = builder.bearer_auth(credential.as_str());
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }
        let resp = builder.send().await?;
        debug!(
            method = %request.method,
            path = %request.path,
            status = resp.status().as_u16(),
            retried = request.retried,
            "request completed"
        );
        Ok(resp)
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
