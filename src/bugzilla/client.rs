//! HTTP access to a Bugzilla instance.
//!
//! [`BugSource`] is the seam between the pipeline and the network: the fetch
//! queue only ever asks for a JSON document at a locator. [`BugzillaClient`]
//! answers over HTTP; tests plug in an in-memory source instead.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::types::BugId;
use crate::error::FetchError;

/// REST root of the Mozilla Bugzilla instance.
pub const DEFAULT_BASE_URL: &str = "https://bugzilla.mozilla.org/rest";

/// Default User-Agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = "bugforge/0.1";

/// Anything that can resolve a resource locator to a JSON document.
#[async_trait]
pub trait BugSource: Send + Sync {
    /// Fetch and decode the JSON body at `url`.
    ///
    /// Errors are transport-level (or "body is not JSON"); shape checks are
    /// left to the caller.
    async fn fetch_json(&self, url: &str) -> Result<serde_json::Value, FetchError>;
}

/// Builds per-bug resource locators under a REST root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BugzillaEndpoints {
    base_url: String,
}

impl Default for BugzillaEndpoints {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl BugzillaEndpoints {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `<base>/bug/<id>`
    pub fn meta_url(&self, bug_id: BugId) -> String {
        format!("{}/bug/{}", self.base_url, bug_id)
    }

    /// `<base>/bug/<id>/comment`
    pub fn comments_url(&self, bug_id: BugId) -> String {
        format!("{}/bug/{}/comment", self.base_url, bug_id)
    }
}

/// Configuration for [`BugzillaClient`].
#[derive(Debug, Clone)]
pub struct BugzillaClientConfig {
    pub user_agent: String,
    /// Per-request timeout. `None` waits as long as the server takes.
    pub request_timeout: Option<Duration>,
    /// Optional API key, sent as `X-BUGZILLA-API-KEY`.
    pub api_key: Option<String>,
}

impl Default for BugzillaClientConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout: None,
            api_key: None,
        }
    }
}

/// [`BugSource`] backed by a real Bugzilla REST endpoint.
pub struct BugzillaClient {
    http_client: Client,
    api_key: Option<String>,
}

impl BugzillaClient {
    /// Create a client with the given settings.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Client` if the TLS backend cannot be initialized.
    pub fn new(config: BugzillaClientConfig) -> Result<Self, FetchError> {
        let mut builder = Client::builder().user_agent(config.user_agent);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            http_client,
            api_key: config.api_key,
        })
    }
}

#[async_trait]
impl BugSource for BugzillaClient {
    async fn fetch_json(&self, url: &str) -> Result<serde_json::Value, FetchError> {
        let mut request = self
            .http_client
            .get(url)
            .header("Accept", "application/json");

        if let Some(ref key) = self.api_key {
            request = request.header("X-BUGZILLA-API-KEY", key);
        }

        let response = request.send().await.map_err(|e| FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| FetchError::parse(url, e))
    }
}
