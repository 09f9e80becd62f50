//! Error types for bugforge operations.
//!
//! Defines error types for each major subsystem:
//! - Fetching resources from the bug tracker
//! - Appending to and reading back dataset files
//! - Loading configuration and query sets
//! - Driving a pipeline run

use thiserror::Error;

/// Errors that can occur while fetching or decoding a bug tracker resource.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request never produced a response (DNS, connect, TLS, reset...).
    #[error("HTTP request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// The server answered with a non-success status.
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    /// The body was not valid JSON or did not have the expected shape.
    #[error("Failed to parse {resource}: {message}")]
    Parse { resource: String, message: String },

    /// A fixture or in-memory source has nothing registered for this locator.
    #[error("No resource registered for {0}")]
    NotFound(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

impl FetchError {
    /// Whether this failure happened before a usable body was received.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            FetchError::Transport { .. }
                | FetchError::Status { .. }
                | FetchError::NotFound(_)
                | FetchError::Client(_)
        )
    }

    pub(crate) fn parse(resource: impl Into<String>, message: impl ToString) -> Self {
        FetchError::Parse {
            resource: resource.into(),
            message: message.to_string(),
        }
    }
}

/// Errors that can occur while writing or reading dataset files.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Malformed dataset line {line}: {reason}")]
    MalformedLine { line: usize, reason: String },

    #[error("Dataset file not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors that abort a whole pipeline run.
///
/// Individual fetch jobs never surface here; they are dropped and counted.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Search query failed: {0}")]
    Search(#[source] FetchError),

    #[error("Fetch queue closed before all jobs were enqueued")]
    QueueClosed,

    #[error("Pipeline task failed: {0}")]
    Join(String),

    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),
}
