// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use clap::Parser;

/// Configuration for the session client.
#[derive(Debug, Clone, Parser)]
#[command(name = "authsession", version, about = "Session-aware client for the auth backend.")]
pub struct ClientConfig {
    /// Backend base URL.
    #[arg(long, default_value = "http://localhost:5000", env = "AUTHSESSION_API_URL")]
    pub api_url: String,

    /// Path prefix shared by the auth endpoints.
    #[arg(long, default_value = "/api/auth", env = "AUTHSESSION_API_PREFIX")]
    pub api_prefix: String,

    /// Per-request timeout in milliseconds. Applies to renewal calls too.
    #[arg(long, default_value_t = 10_000, env = "AUTHSESSION_TIMEOUT_MS")]
    pub timeout_ms: u64,

    /// Log format (text or json).
    #[arg(long, env = "AUTHSESSION_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "AUTHSESSION_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl ClientConfig {
    /// Config pointing at `api_url` with every other field at its default.
    pub fn for_url(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_prefix: "/api/auth".to_owned(),
            timeout_ms: 10_000,
            log_format: "text".to_owned(),
            log_level: "info".to_owned(),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let url = self.api_url.trim();
        if url.is_empty() {
            anyhow::bail!("--api-url must not be empty");
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            anyhow::bail!("--api-url must start with http:// or https:// (got {url})");
        }
        if !self.api_prefix.starts_with('/') {
            anyhow::bail!("--api-prefix must start with '/' (got {})", self.api_prefix);
        }
        if self.timeout_ms == 0 {
            anyhow::bail!("--timeout-ms must be greater than zero");
        }
        match self.log_format.as_str() {
            "text" | "json" => {}
            other => anyhow::bail!("invalid log format: {other} (expected text or json)"),
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> String {
        self.api_url.trim().trim_end_matches('/').to_owned()
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints::with_prefix(&self.api_prefix)
    }
}

/// Paths of the backend's auth endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub login: String,
    pub register: String,
    pub refresh: String,
    pub me: String,
    pub logout: String,
}

impl Endpoints {
    pub fn with_prefix(prefix: &str) -> Self {
        let prefix = prefix.trim_end_matches('/');
        Self {
            login: format!("{prefix}/login"),
            register: format!("{prefix}/register"),
            refresh: format!("{prefix}/refresh"),
            me: format!("{prefix}/me"),
            logout: format!("{prefix}/logout"),
        }
    }

    /// Whether `path` addresses the renewal endpoint. Query strings are ignored.
    pub fn is_refresh(&self, path: &str) -> bool {
        let path = path.split_once('?').map_or(path, |(p, _)| p);
        path.trim_end_matches('/') == self.refresh
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::with_prefix("/api/auth")
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
