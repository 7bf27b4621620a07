//! Outbound HTTP to the WordPress REST API.
//!
//! [`Transport`] is the single capability the aggregator needs: GET an
//! absolute URL and hand back the body, or fail. [`HttpTransport`] is the
//! reqwest-backed implementation used in production.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};

use crate::config::Config;
use crate::error::{ProxyError, Result};

pub const DEFAULT_USER_AGENT: &str = "WordPress Search Proxy/1.0";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const MAX_REDIRECTS: usize = 10;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetches `url` and returns the raw body.
    ///
    /// Connection errors and timeouts map to [`ProxyError::UpstreamTransport`],
    /// responses with a status >= 400 to [`ProxyError::UpstreamHttp`].
    async fn get(&self, url: &str) -> Result<String>;
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<String> {
        log::debug!("upstream GET {url}");
        let res = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ProxyError::UpstreamTransport(e.to_string()))?;

        let status = res.status();
        if status.as_u16() >= 400 {
            log::warn!("upstream {url} answered {status}");
            return Err(ProxyError::UpstreamHttp(status.as_u16()));
        }

        res.text()
            .await
            .map_err(|e| ProxyError::UpstreamTransport(e.to_string()))
    }
}

/// Build the shared client: JSON headers, fixed User-Agent, per-call timeout,
/// redirects followed. Certificates are verified unless `insecure_tls` is set.
pub fn build_client(config: &Config) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    if config.insecure_tls {
        log::warn!("TLS certificate verification is disabled for upstream requests");
    }

    reqwest::Client::builder()
        .default_headers(headers)
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.timeout_seconds))
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .danger_accept_invalid_certs(config.insecure_tls)
        .build()
        .map_err(|e| ProxyError::Config(format!("failed to build HTTP client: {e}")))
}
