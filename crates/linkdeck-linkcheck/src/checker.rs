//! Link reachability checker
//!
//! Two modes:
//!
//! - [`CheckMode::Direct`]: probe the URL from this process and scrape
//!   metadata from HTML responses
//! - [`CheckMode::Relay`]: ask a link-check relay to probe on our behalf;
//!   only reachability, status and final URL come back, and the favicon is
//!   looked up by hostname through a public favicon service

use std::time::{Duration, Instant};

use async_trait::async_trait;
use linkdeck_core::{LinkProbe, ProbeReport};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::DEFAULT_TIMEOUT_MS;
use crate::error::{LinkCheckError, ProbeError};
use crate::meta::PageMeta;
use crate::normalize::normalize_url;
use crate::probe::probe;
use crate::relay::RelayResponse;

/// Public favicon lookup used in relay mode
const FAVICON_SERVICE: &str = "https://www.google.com/s2/favicons";

/// Where probes are executed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CheckMode {
    /// Probe directly from this process
    #[default]
    Direct,
    /// Delegate to a relay exposing `GET /api/linkcheck`
    Relay { base_url: String },
}

/// Checker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckerConfig {
    pub mode: CheckMode,
    /// Default per-check timeout
    pub timeout_ms: u64,
    pub user_agent: String,
    /// Upper bound on HTML bytes read for metadata
    pub max_body_bytes: usize,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            mode: CheckMode::Direct,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            user_agent: format!("linkdeck-linkcheck/{}", env!("CARGO_PKG_VERSION")),
            max_body_bytes: 512 * 1024,
        }
    }
}

impl CheckerConfig {
    /// Probe through a relay at `base_url`
    pub fn with_relay(mut self, base_url: impl Into<String>) -> Self {
        self.mode = CheckMode::Relay {
            base_url: base_url.into(),
        };
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }
}

/// Per-call options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckOptions {
    pub timeout: Duration,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

impl CheckOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

/// Result of a reachability check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkCheckResult {
    pub reachable: bool,
    pub normalized_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

/// Probes candidate URLs
#[derive(Debug, Clone)]
pub struct LinkReachabilityChecker {
    http: Client,
    config: CheckerConfig,
}

impl LinkReachabilityChecker {
    pub fn new(config: CheckerConfig) -> Result<Self, LinkCheckError> {
        if let CheckMode::Relay { base_url } = &config.mode {
            Url::parse(base_url)
                .map_err(|e| LinkCheckError::InvalidRelay(format!("{base_url}: {e}")))?;
        }
        let http = Client::builder().user_agent(config.user_agent.clone()).build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// Options carrying this checker's configured timeout
    pub fn default_options(&self) -> CheckOptions {
        CheckOptions::with_timeout(Duration::from_millis(self.config.timeout_ms))
    }

    /// Normalize and probe `url`
    ///
    /// Never fails: on timeout `error` is `"timeout"`, any other failure is
    /// reported as its message.
    pub async fn check(&self, url: &str, options: CheckOptions) -> LinkCheckResult {
        let started = Instant::now();
        let normalized_url = normalize_url(url);

        let attempt = tokio::time::timeout(options.timeout, self.run(&normalized_url)).await;
        let mut result = match attempt {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => failure(&normalized_url, e),
            Err(_) => failure(&normalized_url, ProbeError::Timeout),
        };
        result.elapsed_ms = started.elapsed().as_millis() as u64;

        info!(
            url = %result.normalized_url,
            reachable = result.reachable,
            status = ?result.status,
            error = ?result.error,
            elapsed_ms = result.elapsed_ms,
            "Link check finished"
        );
        result
    }

    async fn run(&self, normalized_url: &str) -> Result<LinkCheckResult, ProbeError> {
        match &self.config.mode {
            CheckMode::Direct => self.check_direct(normalized_url).await,
            CheckMode::Relay { base_url } => self.check_via_relay(base_url, normalized_url).await,
        }
    }

    async fn check_direct(&self, normalized_url: &str) -> Result<LinkCheckResult, ProbeError> {
        let outcome = probe(&self.http, normalized_url, Some(self.config.max_body_bytes)).await?;

        let meta = match (&outcome.body, Url::parse(&outcome.final_url)) {
            (Some(body), Ok(base)) if outcome.is_html => PageMeta::extract(body, &base),
            _ => PageMeta::default(),
        };

        Ok(LinkCheckResult {
            reachable: outcome.reachable,
            normalized_url: normalized_url.to_string(),
            final_url: Some(outcome.final_url),
            status: Some(outcome.status),
            title: meta.title,
            description: meta.description,
            favicon: meta.favicon,
            error: None,
            elapsed_ms: 0,
        })
    }

    async fn check_via_relay(
        &self,
        base_url: &str,
        normalized_url: &str,
    ) -> Result<LinkCheckResult, ProbeError> {
        let endpoint = format!("{}/api/linkcheck", base_url.trim_end_matches('/'));
        debug!(%endpoint, url = normalized_url, "Checking link through relay");

        let relay: RelayResponse = self
            .http
            .get(&endpoint)
            .query(&[("url", normalized_url)])
            .send()
            .await?
            .json()
            .await?;

        let host_source = relay.final_url.as_deref().unwrap_or(normalized_url);
        let favicon = Url::parse(host_source)
            .ok()
            .filter(|_| relay.reachable)
            .and_then(|u| u.host_str().map(str::to_string))
            .map(|host| format!("{FAVICON_SERVICE}?domain={host}&sz=64"));

        Ok(LinkCheckResult {
            reachable: relay.reachable,
            normalized_url: normalized_url.to_string(),
            final_url: relay.final_url,
            status: relay.status,
            favicon,
            error: relay.error,
            ..Default::default()
        })
    }
}

fn failure(normalized_url: &str, error: ProbeError) -> LinkCheckResult {
    LinkCheckResult {
        reachable: false,
        normalized_url: normalized_url.to_string(),
        error: Some(error.to_string()),
        ..Default::default()
    }
}

#[async_trait]
impl LinkProbe for LinkReachabilityChecker {
    async fn probe(&self, url: &str) -> ProbeReport {
        let result = self.check(url, self.default_options()).await;
        ProbeReport {
            reachable: result.reachable,
            normalized_url: result.normalized_url,
            title: result.title,
            favicon: result.favicon,
            error: result.error,
        }
    }
}
