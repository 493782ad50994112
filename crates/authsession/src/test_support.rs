// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: an in-process mock of the auth backend.
//!
//! The mock mints sequential tokens (`tok-1`, `tok-2`, ...), accepts only the
//! most recent one, and counts every call so tests can assert how many
//! renewals actually reached the wire.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::api::SessionClient;
use crate::config::ClientConfig;
use crate::session::Identity;

/// Password the mock accepts for every account.
pub const GOOD_PASSWORD: &str = "correct-horse";
/// Email the mock reports as already registered.
pub const TAKEN_EMAIL: &str = "taken@example.com";
const REFRESH_COOKIE: &str = "refreshToken";

/// Knobs and counters shared with the mock's handlers.
pub struct MockState {
    valid_token: Mutex<Option<String>>,
    minted: AtomicU32,
    refresh_calls: AtomicU32,
    me_calls: AtomicU32,
    data_calls: AtomicU32,
    logout_calls: AtomicU32,
    refresh_status: AtomicU16,
    refresh_delay_ms: AtomicU64,
    me_status: AtomicU16,
    me_delay_ms: AtomicU64,
    data_delay_ms: AtomicU64,
    logout_status: AtomicU16,
    require_cookie: AtomicBool,
    reject_data: AtomicBool,
    refresh_auth_headers: Mutex<Vec<String>>,
    identity: Identity,
}

impl MockState {
    fn new() -> Self {
        Self {
            valid_token: Mutex::new(None),
            minted: AtomicU32::new(0),
            refresh_calls: AtomicU32::new(0),
            me_calls: AtomicU32::new(0),
            data_calls: AtomicU32::new(0),
            logout_calls: AtomicU32::new(0),
            refresh_status: AtomicU16::new(200),
            refresh_delay_ms: AtomicU64::new(0),
            me_status: AtomicU16::new(200),
            me_delay_ms: AtomicU64::new(0),
            data_delay_ms: AtomicU64::new(0),
            logout_status: AtomicU16::new(200),
            require_cookie: AtomicBool::new(false),
            reject_data: AtomicBool::new(false),
            refresh_auth_headers: Mutex::new(Vec::new()),
            identity: mock_identity(),
        }
    }

    fn mint(&self) -> String {
        let n = self.minted.fetch_add(1, Ordering::SeqCst) + 1;
        let token = format!("tok-{n}");
        *self.valid_token.lock() = Some(token.clone());
        token
    }

    fn accepts(&self, headers: &HeaderMap) -> bool {
        let presented = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        match (presented, self.valid_token.lock().as_deref()) {
            (Some(presented), Some(valid)) => presented == valid,
            _ => false,
        }
    }
}

/// The identity every successful login or `me` call returns.
pub fn mock_identity() -> Identity {
    Identity {
        id: "6650f1c2".to_owned(),
        name: "Ada Lovelace".to_owned(),
        email: "ada@example.com".to_owned(),
        role: "user".to_owned(),
    }
}

/// A running mock backend bound to a random loopback port.
pub struct MockBackend {
    pub addr: SocketAddr,
    state: Arc<MockState>,
    handle: JoinHandle<()>,
}

impl MockBackend {
    pub async fn spawn() -> anyhow::Result<Self> {
        let state = Arc::new(MockState::new());
        let router = Router::new()
            .route("/api/auth/login", post(login))
            .route("/api/auth/register", post(register))
            .route("/api/auth/refresh", post(refresh))
            .route("/api/auth/me", get(me))
            .route("/api/auth/logout", post(logout))
            .route("/api/data", get(data))
            .route("/api/broken", get(broken))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        Ok(Self { addr, state, handle })
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// A fresh client with its own session and cookie jar.
    pub fn client(&self) -> anyhow::Result<SessionClient> {
        SessionClient::new(&ClientConfig::for_url(self.url()))
    }

    /// Invalidate every issued access token without touching the refresh cookie.
    pub fn expire_tokens(&self) {
        *self.state.valid_token.lock() = None;
    }

    /// Mint a token out of band, as if another login happened elsewhere.
    pub fn mint_token(&self) -> String {
        self.state.mint()
    }

    pub fn set_refresh_status(&self, status: u16) {
        self.state.refresh_status.store(status, Ordering::SeqCst);
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        self.state.refresh_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_me_status(&self, status: u16) {
        self.state.me_status.store(status, Ordering::SeqCst);
    }

    pub fn set_me_delay(&self, delay: Duration) {
        self.state.me_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Delay `/api/data` before it checks the presented token.
    pub fn set_data_delay(&self, delay: Duration) {
        self.state.data_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_logout_status(&self, status: u16) {
        self.state.logout_status.store(status, Ordering::SeqCst);
    }

    /// Make refresh fail with 401 unless the login cookie is presented.
    pub fn require_refresh_cookie(&self, required: bool) {
        self.state.require_cookie.store(required, Ordering::SeqCst);
    }

    /// Make `/api/data` answer 401 no matter what credential is presented.
    pub fn reject_data(&self, reject: bool) {
        self.state.reject_data.store(reject, Ordering::SeqCst);
    }

    pub fn refresh_calls(&self) -> u32 {
        self.state.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn me_calls(&self) -> u32 {
        self.state.me_calls.load(Ordering::SeqCst)
    }

    pub fn data_calls(&self) -> u32 {
        self.state.data_calls.load(Ordering::SeqCst)
    }

    pub fn logout_calls(&self) -> u32 {
        self.state.logout_calls.load(Ordering::SeqCst)
    }

    /// Authorization headers seen on refresh calls (empty string when absent).
    pub fn refresh_auth_headers(&self) -> Vec<String> {
        self.state.refresh_auth_headers.lock().clone()
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

async fn pause(delay_ms: &AtomicU64) {
    let delay = delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
}

fn failure(code: u16, message: &str) -> Response {
    (status(code), Json(json!({ "success": false, "message": message }))).into_response()
}

async fn login(State(s): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    if body["password"] != GOOD_PASSWORD {
        return failure(401, "Invalid email or password");
    }
    let token = s.mint();
    let cookie = format!("{REFRESH_COOKIE}=rt-{token}; HttpOnly; SameSite=Strict; Path=/");
    let body = json!({
        "success": true,
        "data": { "accessToken": token, "user": s.identity },
    });
    (StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(body)).into_response()
}

async fn register(Json(body): Json<Value>) -> Response {
    if body["email"] == TAKEN_EMAIL {
        return failure(409, "Email already registered");
    }
    let body = json!({ "success": true, "message": "User registered successfully" });
    (StatusCode::CREATED, Json(body)).into_response()
}

async fn refresh(State(s): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    s.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    s.refresh_auth_headers.lock().push(auth);

    pause(&s.refresh_delay_ms).await;

    let code = s.refresh_status.load(Ordering::SeqCst);
    if code != 200 {
        return failure(code, "Refresh token expired");
    }
    if s.require_cookie.load(Ordering::SeqCst) {
        let has_cookie = headers
            .get(header::COOKIE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains(&format!("{REFRESH_COOKIE}=")));
        if !has_cookie {
            return failure(401, "No refresh token");
        }
    }

    let token = s.mint();
    Json(json!({ "success": true, "data": { "accessToken": token } })).into_response()
}

async fn me(State(s): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    s.me_calls.fetch_add(1, Ordering::SeqCst);
    pause(&s.me_delay_ms).await;
    let code = s.me_status.load(Ordering::SeqCst);
    if code != 200 {
        return failure(code, "Profile lookup failed");
    }
    if !s.accepts(&headers) {
        return failure(401, "Access token expired");
    }
    Json(json!({ "success": true, "data": { "user": s.identity } })).into_response()
}

async fn logout(State(s): State<Arc<MockState>>) -> Response {
    s.logout_calls.fetch_add(1, Ordering::SeqCst);
    *s.valid_token.lock() = None;
    let code = s.logout_status.load(Ordering::SeqCst);
    if code != 200 {
        return failure(code, "Logout failed");
    }
    Json(json!({ "success": true, "message": "Logged out" })).into_response()
}

async fn data(State(s): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    s.data_calls.fetch_add(1, Ordering::SeqCst);
    pause(&s.data_delay_ms).await;
    if s.reject_data.load(Ordering::SeqCst) || !s.accepts(&headers) {
        return failure(401, "Access token expired");
    }
    Json(json!({ "success": true, "data": { "items": [1, 2, 3] } })).into_response()
}

async fn broken() -> Response {
    failure(500, "Internal server error")
}
