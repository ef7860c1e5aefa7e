//! Outbound HTTP as a capability: every network call in the pipeline goes
//! through a [`Fetcher`], so tests can swap the transport for canned responses.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Desktop Chrome user agent sent with listing page requests
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Headers that make a listing request look like a normal browser visit.
/// The listing site rejects requests without them.
pub fn browser_headers() -> Vec<(String, String)> {
    [
        ("User-Agent", BROWSER_USER_AGENT),
        ("Accept-Language", "en-US,en;q=0.9"),
        (
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
        ("Referer", "https://www.google.com/"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("unexpected status {status}")]
    Status { status: u16 },
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn post(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            body: Some(body.into()),
            ..Self::get(url)
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn error_for_status(self) -> Result<Self, FetchError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(FetchError::Status {
                status: self.status,
            })
        }
    }
}

/// Performs one HTTP exchange. Implementations never retry.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse, FetchError>;
}

/// [`Fetcher`] backed by a shared reqwest client
pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse, FetchError> {
        debug!("{:?} {}", request.method, request.url);

        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        builder = builder.timeout(request.timeout);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        debug!("{} -> {} ({} bytes)", request.url, status, body.len());
        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browser_headers_impersonate_a_browser() {
        let headers = browser_headers();
        let get = |name: &str| {
            headers
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        };
        assert!(get("User-Agent").unwrap().starts_with("Mozilla/5.0"));
        assert_eq!(get("Accept-Language").unwrap(), "en-US,en;q=0.9");
        assert!(get("Accept").unwrap().contains("text/html"));
        assert_eq!(get("Referer").unwrap(), "https://www.google.com/");
    }

    #[test]
    fn non_success_status_becomes_error() {
        let err = HttpResponse {
            status: 500,
            body: String::new(),
        }
        .error_for_status()
        .unwrap_err();
        assert_eq!(err.to_string(), "unexpected status 500");

        let ok = HttpResponse {
            status: 204,
            body: String::new(),
        };
        assert!(ok.error_for_status().is_ok());
    }

    #[test]
    fn request_builder_collects_parts() {
        let request = HttpRequest::get("https://example.org/search")
            .query("q", "1 Main St")
            .query("limit", "1")
            .header("User-Agent", "test")
            .timeout(Duration::from_secs(3));
        assert_eq!(request.method, Method::Get);
        assert_eq!(request.query_value("q"), Some("1 Main St"));
        assert_eq!(request.query_value("missing"), None);
        assert_eq!(request.timeout, Duration::from_secs(3));

        let post = HttpRequest::post("https://example.org/api", "[out:json];");
        assert_eq!(post.method, Method::Post);
        assert_eq!(post.body.as_deref(), Some("[out:json];"));
    }
}
