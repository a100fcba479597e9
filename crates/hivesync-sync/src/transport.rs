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

//! HTTPS transport abstraction and the reqwest-backed implementation

use crate::error::{Result, SyncError};
use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use std::fmt;
use std::pin::Pin;
use std::time::Duration;
use tracing::debug;

pub const USER_AGENT: &str = "HiveSync-OTA";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout: Duration::from_secs(15),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// JSON request with the content headers the BEEP API expects
    pub fn json(method: Method, url: impl Into<String>, body: Option<String>) -> Self {
        let mut request = Self::new(method, url)
            .header("Accept", "application/json");
        if let Some(body) = body {
            request = request.header("Content-Type", "application/json");
            request.body = Some(body);
        }
        request
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn bearer(self, token: &str) -> Self {
        self.header("Authorization", format!("Bearer {token}"))
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Case-insensitive header lookup
    pub fn header_value(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// First 200 characters of the body, for log lines
    pub fn body_preview(&self) -> &str {
        preview(&self.body)
    }
}

pub(crate) fn preview(body: &str) -> &str {
    match body.char_indices().nth(200) {
        Some((idx, _)) => body.get(..idx).unwrap_or(body),
        None => body,
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

/// Response whose body is consumed chunk by chunk
pub struct StreamingResponse {
    pub status: u16,
    /// Declared `Content-Length`, if the server sent one
    pub content_length: Option<u64>,
    pub body: ByteStream,
}

impl fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a request and buffer the whole response body
    ///
    /// Any HTTP status is a successful send; only failures to get a response
    /// at all are errors.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;

    /// Send a request and hand back the body as a stream of chunks
    ///
    /// `request.timeout` only bounds the wait for the response head. Reading
    /// the body is unbounded here; callers time each chunk themselves.
    async fn open_stream(&self, request: HttpRequest) -> Result<StreamingResponse>;
}

/// What the per-request timeout covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimeoutScope {
    /// Connect, send and read the whole body
    WholeRequest,
    /// Connect, send and receive the status line and headers
    ResponseHead,
}

/// Transport over `reqwest` with rustls
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SyncError::Transport(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    fn builder(&self, request: HttpRequest) -> reqwest::RequestBuilder {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
        };

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        builder
    }

    async fn dispatch(&self, request: HttpRequest, scope: TimeoutScope) -> Result<reqwest::Response> {
        debug!("{} {}", request.method, request.url);
        let timeout = request.timeout;
        let builder = self.builder(request);

        let sent = match scope {
            TimeoutScope::WholeRequest => builder.timeout(timeout).send().await,
            TimeoutScope::ResponseHead => tokio::time::timeout(timeout, builder.send())
                .await
                .map_err(|_| SyncError::Transport(format!("No response within {timeout:?}")))?,
        };
        let response = sent.map_err(|e| SyncError::Transport(format!("Request failed: {e}")))?;
        debug!("HTTP {}", response.status().as_u16());
        Ok(response)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = self.dispatch(request, TimeoutScope::WholeRequest).await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| SyncError::Transport(format!("Failed to read response: {e}")))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    async fn open_stream(&self, request: HttpRequest) -> Result<StreamingResponse> {
        let response = self.dispatch(request, TimeoutScope::ResponseHead).await?;
        let status = response.status().as_u16();
        let content_length = response.content_length();
        let body = response.bytes_stream().map(|chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|e| SyncError::Transport(format!("Failed to read body: {e}")))
        });

        Ok(StreamingResponse {
            status,
            content_length,
            body: Box::pin(body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_request_headers() {
        let request = HttpRequest::json(Method::Post, "https://x/api", Some("{}".to_string()))
            .bearer("tok");
        assert_eq!(request.header_value("content-type"), Some("application/json"));
        assert_eq!(request.header_value("Accept"), Some("application/json"));
        assert_eq!(request.header_value("authorization"), Some("Bearer tok"));
        assert_eq!(request.body.as_deref(), Some("{}"));
    }

    #[test]
    fn test_json_request_without_body_has_no_content_type() {
        let request = HttpRequest::json(Method::Get, "https://x/api", None);
        assert!(request.header_value("Content-Type").is_none());
        assert!(request.body.is_none());
    }

    #[test]
    fn test_response_success_range() {
        assert!(HttpResponse::new(200, "").is_success());
        assert!(HttpResponse::new(204, "").is_success());
        assert!(!HttpResponse::new(199, "").is_success());
        assert!(!HttpResponse::new(301, "").is_success());
        assert!(!HttpResponse::new(401, "").is_success());
    }

    #[test]
    fn test_body_preview_truncates() {
        let response = HttpResponse::new(500, "é".repeat(300));
        assert_eq!(response.body_preview().chars().count(), 200);
        assert_eq!(HttpResponse::new(500, "short").body_preview(), "short");
    }

    #[test]
    fn test_method_display() {
        assert_eq!(Method::Patch.to_string(), "PATCH");
    }
}
