//! Error types for fetching, enhancing and caching schemas

use thiserror::Error;

/// Result type for enhancer operations
pub type Result<T> = std::result::Result<T, EnhancerError>;

/// Top-level error for one refresh pipeline
#[derive(Error, Debug)]
pub enum EnhancerError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Malformed schema: {0}")]
    MalformedSchema(#[from] MalformedSchemaError),

    #[error("Cache IO error on {artifact}: {source}")]
    CacheIo {
        artifact: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),

    #[error("Setting not configured: {key}")]
    MissingSetting { key: String },

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),
}

/// Failure retrieving or dereferencing a remote schema document
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Invalid schema URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Timed out fetching {url}")]
    Timeout { url: String },

    #[error("Unexpected status {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Failed to parse schema from {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Reference nesting too deep at {reference}")]
    RefDepthExceeded { reference: String },

    #[error("External reference does not resolve: {reference}")]
    UnresolvedExternalRef { reference: String },
}

/// The dereferenced tree does not follow the expected convention
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedSchemaError {
    #[error("Missing schema node at {path}")]
    MissingNode { path: String },

    #[error("anyOf entry {index} is not a $ref")]
    NotAReference { index: usize },

    #[error("Unresolved reference: {reference}")]
    UnresolvedRef { reference: String },

    #[error("Definition {definition} has allOf but no member declares properties")]
    NoPropertiesMember { definition: String },

    #[error("Definition {definition} requires {field} but does not declare it")]
    MissingRequiredProperty { definition: String, field: String },

    #[error("Expected {expected} at {path}")]
    UnexpectedShape { path: String, expected: String },
}

impl MalformedSchemaError {
    pub(crate) fn missing(path: impl Into<String>) -> Self {
        Self::MissingNode { path: path.into() }
    }
}
