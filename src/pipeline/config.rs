//! Pipeline configuration.
//!
//! Two layers:
//! - [`PipelineConfig`]: where to fetch from and how hard to hit it, from
//!   environment variables with CLI overrides on top.
//! - [`QuerySet`]: a YAML file naming the search queries to harvest, the
//!   label each one contributes and where its lines go.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bugzilla::{BugzillaClientConfig, BugzillaEndpoints, DEFAULT_BASE_URL, DEFAULT_USER_AGENT};
use crate::error::ConfigError;
use crate::scheduler::{FetchQueueConfig, DEFAULT_CONCURRENCY};

/// Default dataset file for query sets that do not name one.
pub const DEFAULT_OUTPUT_FILE: &str = "output.ds";

/// Configuration for a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// REST root of the Bugzilla instance.
    pub base_url: String,
    /// Maximum number of fetches in flight.
    pub concurrency: usize,
    /// User-Agent header for every request.
    pub user_agent: String,
    /// Per-request timeout; `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
    /// Optional Bugzilla API key.
    pub api_key: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout: None,
            api_key: None,
        }
    }
}

impl PipelineConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `BUGFORGE_BASE_URL`: REST root (default: https://bugzilla.mozilla.org/rest)
    /// - `BUGFORGE_CONCURRENCY`: Fetches in flight (default: 5)
    /// - `BUGFORGE_USER_AGENT`: User-Agent header (default: bugforge/0.1)
    /// - `BUGFORGE_REQUEST_TIMEOUT_SECS`: Per-request timeout (default: none)
    /// - `BUGZILLA_API_KEY`: API key sent with every request (default: none)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable has an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`PipelineConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(val) = lookup("BUGFORGE_BASE_URL") {
            config.base_url = val;
        }

        if let Some(val) = lookup("BUGFORGE_CONCURRENCY") {
            config.concurrency = parse_env_value(&val, "BUGFORGE_CONCURRENCY")?;
        }

        if let Some(val) = lookup("BUGFORGE_USER_AGENT") {
            config.user_agent = val;
        }

        if let Some(val) = lookup("BUGFORGE_REQUEST_TIMEOUT_SECS") {
            let secs: u64 = parse_env_value(&val, "BUGFORGE_REQUEST_TIMEOUT_SECS")?;
            config.request_timeout = Some(Duration::from_secs(secs));
        }

        if let Some(val) = lookup("BUGZILLA_API_KEY") {
            if !val.is_empty() {
                config.api_key = Some(val);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::ValidationFailed(
                "concurrency must be greater than 0".to_string(),
            ));
        }

        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::ValidationFailed(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }

        if let Some(timeout) = self.request_timeout {
            if timeout.is_zero() {
                return Err(ConfigError::ValidationFailed(
                    "request_timeout must be greater than 0".to_string(),
                ));
            }
        }

        Ok(())
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn endpoints(&self) -> BugzillaEndpoints {
        BugzillaEndpoints::new(&self.base_url)
    }

    pub fn client_config(&self) -> BugzillaClientConfig {
        BugzillaClientConfig {
            user_agent: self.user_agent.clone(),
            request_timeout: self.request_timeout,
            api_key: self.api_key.clone(),
        }
    }

    pub fn queue_config(&self) -> FetchQueueConfig {
        FetchQueueConfig::new(self.concurrency)
    }
}

/// A named search query and the label its bugs receive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    pub name: String,
    pub label: i32,
    /// Full search URL, e.g. `https://bugzilla.mozilla.org/rest/bug?...`.
    pub query: String,
    /// Overrides the set's output file for this query.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
}

/// An ordered list of queries harvested one after another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySet {
    #[serde(default = "default_output")]
    pub output: PathBuf,
    pub queries: Vec<QuerySpec>,
}

fn default_output() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_FILE)
}

impl QuerySet {
    /// A set holding a single query.
    pub fn single(label: i32, query: impl Into<String>, output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            queries: vec![QuerySpec {
                name: "query".to_string(),
                label,
                query: query.into(),
                output: None,
            }],
        }
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let set: QuerySet = serde_yaml::from_str(content)?;
        set.validate()?;
        Ok(set)
    }

    /// Load and validate a query set file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queries.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "query set contains no queries".to_string(),
            ));
        }

        for spec in &self.queries {
            if spec.name.trim().is_empty() {
                return Err(ConfigError::ValidationFailed(
                    "query name cannot be empty".to_string(),
                ));
            }
            if spec.query.trim().is_empty() {
                return Err(ConfigError::ValidationFailed(format!(
                    "query '{}' has an empty URL",
                    spec.name
                )));
            }
        }

        Ok(())
    }

    /// Dataset file that `spec`'s lines are appended to.
    pub fn output_for<'a>(&'a self, spec: &'a QuerySpec) -> &'a Path {
        spec.output.as_deref().unwrap_or(&self.output)
    }
}

/// Parse an environment variable value.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.base_url, "https://bugzilla.mozilla.org/rest");
        assert_eq!(config.concurrency, 5);
        assert!(config.request_timeout.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_lookup() {
        let config = PipelineConfig::from_lookup(lookup_from(&[
            ("BUGFORGE_BASE_URL", "https://bugzilla.example.org/rest/"),
            ("BUGFORGE_CONCURRENCY", "8"),
            ("BUGFORGE_REQUEST_TIMEOUT_SECS", "30"),
            ("BUGZILLA_API_KEY", "secret"),
        ]))
        .expect("valid config");

        assert_eq!(config.concurrency, 8);
        assert_eq!(config.request_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(
            config.endpoints().base_url(),
            "https://bugzilla.example.org/rest"
        );
        assert_eq!(config.queue_config().concurrency, 8);
    }

    #[test]
    fn test_config_rejects_bad_values() {
        let err = PipelineConfig::from_lookup(lookup_from(&[("BUGFORGE_CONCURRENCY", "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains("BUGFORGE_CONCURRENCY"));

        let err = PipelineConfig::from_lookup(lookup_from(&[("BUGFORGE_CONCURRENCY", "0")]))
            .unwrap_err();
        assert!(err.to_string().contains("concurrency"));

        let err = PipelineConfig::new()
            .with_base_url("ftp://bugs")
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("base_url"));

        let err = PipelineConfig::new()
            .with_request_timeout(Duration::ZERO)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("request_timeout"));
    }

    #[test]
    fn test_query_set_from_yaml() {
        let yaml = r#"
output: data/output.ds
queries:
  - name: fx35
    label: 1
    query: "https://bugzilla.mozilla.org/rest/bug?f1=cf_tracking_firefox35&o1=equals&v1=%2B"
  - name: nontracked
    label: 0
    query: "https://bugzilla.mozilla.org/rest/bug?f1=cf_tracking_firefox35&o1=notequals"
    output: data/negatives.ds
"#;
        let set = QuerySet::from_yaml_str(yaml).expect("valid query set");
        assert_eq!(set.queries.len(), 2);
        assert_eq!(set.queries[0].name, "fx35");
        assert_eq!(set.queries[0].label, 1);
        assert_eq!(set.output_for(&set.queries[0]), Path::new("data/output.ds"));
        assert_eq!(
            set.output_for(&set.queries[1]),
            Path::new("data/negatives.ds")
        );
    }

    #[test]
    fn test_query_set_defaults_and_validation() {
        let set = QuerySet::from_yaml_str("queries:\n  - {name: a, label: 0, query: 'http://x'}\n")
            .expect("valid");
        assert_eq!(set.output, PathBuf::from(DEFAULT_OUTPUT_FILE));

        assert!(QuerySet::from_yaml_str("queries: []\n").is_err());
        assert!(QuerySet::from_yaml_str("queries:\n  - {name: a, label: 0, query: ''}\n").is_err());
        assert!(QuerySet::from_yaml_str("queries:\n  - {name: a, query: 'http://x'}\n").is_err());
    }

    #[test]
    fn test_single_query_set() {
        let set = QuerySet::single(1, "http://x/rest/bug?id=1", "out.ds");
        assert!(set.validate().is_ok());
        assert_eq!(set.output_for(&set.queries[0]), Path::new("out.ds"));
    }
}
