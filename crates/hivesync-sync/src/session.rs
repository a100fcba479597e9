// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of HiveSync.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Authenticated session against the BEEP API
//!
//! Credentials are read once per session. The bearer token obtained by the
//! first login is reused for every later call; the only time it is dropped
//! is a 401 answer while [`SessionOptions::reauth_on_rejection`] is set, which
//! triggers exactly one fresh login and one resend.

use crate::config::{DEFAULT_BEEP_BASE_URL, SyncConfig};
use crate::credentials::{CredentialStore, StoredCredentials};
use crate::device::Connectivity;
use crate::error::{Result, SyncError};
use crate::extract::find_string;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, Method};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Clone, PartialEq, Eq)]
pub struct CloudSessionConfig {
    pub email: String,
    pub password: String,
    pub device_key: String,
    pub base_url: String,
}

impl CloudSessionConfig {
    /// Accepts the stored fields only when email, password and device key
    /// are all present and non-empty
    pub fn from_stored(stored: StoredCredentials) -> Option<Self> {
        let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());

        Some(Self {
            email: non_empty(stored.beep_email)?,
            password: non_empty(stored.beep_password)?,
            device_key: non_empty(stored.beep_device_key)?,
            base_url: non_empty(stored.beep_base_url)
                .unwrap_or_else(|| DEFAULT_BEEP_BASE_URL.to_string()),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }
}

impl fmt::Debug for CloudSessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudSessionConfig")
            .field("email", &self.email)
            .field("password", &"***")
            .field("device_key", &self.device_key)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub reauth_on_rejection: bool,
    pub timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            reauth_on_rejection: true,
            timeout: Duration::from_secs(15),
        }
    }
}

impl From<&SyncConfig> for SessionOptions {
    fn from(config: &SyncConfig) -> Self {
        Self {
            reauth_on_rejection: config.reauth_on_rejection,
            timeout: config.timeouts.api(),
        }
    }
}

pub struct CloudSession {
    store: Arc<dyn CredentialStore>,
    transport: Arc<dyn HttpTransport>,
    connectivity: Arc<dyn Connectivity>,
    options: SessionOptions,
    config: Option<CloudSessionConfig>,
    load_attempted: bool,
    token: Option<String>,
}

impl fmt::Debug for CloudSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudSession")
            .field("options", &self.options)
            .field("config", &self.config)
            .field("load_attempted", &self.load_attempted)
            .field("logged_in", &self.token.is_some())
            .finish_non_exhaustive()
    }
}

impl CloudSession {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        transport: Arc<dyn HttpTransport>,
        connectivity: Arc<dyn Connectivity>,
        options: SessionOptions,
    ) -> Self {
        Self {
            store,
            transport,
            connectivity,
            options,
            config: None,
            load_attempted: false,
            token: None,
        }
    }

    /// Load credentials on first use. A failed load is final for this
    /// session; later calls only report the cached result.
    pub fn ensure_config_loaded(&mut self) -> bool {
        if self.load_attempted {
            return self.config.is_some();
        }
        self.load_attempted = true;

        match self.store.load() {
            Ok(stored) => match CloudSessionConfig::from_stored(stored) {
                Some(config) => {
                    info!("Loaded BEEP config, base URL {}", config.base_url);
                    self.config = Some(config);
                }
                None => warn!("BEEP config missing required keys"),
            },
            Err(e) => warn!("Failed to load BEEP config: {e}"),
        }
        self.config.is_some()
    }

    pub fn is_configured(&mut self) -> bool {
        self.ensure_config_loaded()
    }

    pub fn config(&self) -> Option<&CloudSessionConfig> {
        self.config.as_ref()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.connectivity.is_connected()
    }

    pub fn timeout(&self) -> Duration {
        self.options.timeout
    }

    /// Connectivity and configuration, checked in that order
    pub(crate) fn ready_config(&mut self) -> Result<CloudSessionConfig> {
        if !self.is_connected() {
            return Err(SyncError::ConnectivityUnavailable);
        }
        if !self.ensure_config_loaded() {
            return Err(SyncError::ConfigMissing("BEEP config missing".to_string()));
        }
        self.config
            .clone()
            .ok_or_else(|| SyncError::ConfigMissing("BEEP config missing".to_string()))
    }

    /// Log in and return a fresh token. Does not touch the cached one.
    pub async fn login(&mut self) -> Result<String> {
        let config = self.ready_config()?;

        let payload = json!({
            "email": config.email,
            "password": config.password,
        })
        .to_string();
        let request = HttpRequest::json(Method::Post, config.url("/api/login"), Some(payload))
            .timeout(self.options.timeout);

        let response = self.transport.send(request).await?;
        debug!("Login HTTP {}", response.status);
        if response.status != 200 && response.status != 201 {
            return Err(SyncError::AuthFailed(format!(
                "Login failed: {}",
                response.status
            )));
        }

        match find_string(&response.body, "api_token") {
            Some(token) if !token.is_empty() => Ok(token.to_string()),
            _ => Err(SyncError::AuthFailed(
                "Login response missing api_token".to_string(),
            )),
        }
    }

    /// Cached token, logging in first if there is none yet
    pub async fn ensure_logged_in(&mut self) -> Result<String> {
        if let Some(token) = &self.token {
            return Ok(token.clone());
        }
        let token = self.login().await?;
        info!("Login OK; token cached");
        self.token = Some(token.clone());
        Ok(token)
    }

    /// Forget the cached token so the next call logs in again
    pub fn invalidate_token(&mut self) {
        self.token = None;
    }

    /// Send `payload` to `path` (e.g. `/api/sensors`) with the bearer token.
    ///
    /// Returns the response whatever its status; callers decide what counts
    /// as success. Transport failures are not retried.
    pub async fn authenticated_request(
        &mut self,
        method: Method,
        path: &str,
        payload: Option<String>,
    ) -> Result<HttpResponse> {
        let config = self.ready_config()?;
        let url = config.url(path);
        let token = self.ensure_logged_in().await?;

        let response = self
            .send_with_token(method, &url, payload.clone(), &token)
            .await?;

        if response.status == 401 && self.options.reauth_on_rejection {
            warn!("Token rejected by {path}; logging in again");
            self.invalidate_token();
            let token = self.ensure_logged_in().await?;
            return self.send_with_token(method, &url, payload, &token).await;
        }

        Ok(response)
    }

    async fn send_with_token(
        &self,
        method: Method,
        url: &str,
        payload: Option<String>,
        token: &str,
    ) -> Result<HttpResponse> {
        let request = HttpRequest::json(method, url, payload)
            .bearer(token)
            .timeout(self.options.timeout);
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            debug!("{method} {url} -> {}: {}", response.status, response.body_preview());
        }
        Ok(response)
    }
}
