//! Error types for remodel
//!
//! Only fatal conditions live here. Per-declaration problems such as a
//! blocked rename are reported as [`crate::diagnostics::Diagnostic`]s.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Remodel errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("Ingestion error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Code parse error: {0}")]
    CodeParse(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Rule '{rule}' failed on {unit}: {message}")]
    Rule {
        rule: String,
        unit: String,
        message: String,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_norway::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

/// Errors raised while turning configuration documents into a registry.
///
/// All of these abort the run before any program unit is rewritten.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    #[error("malformed configuration in {source_name}: {message}")]
    Malformed {
        source_name: String,
        message: String,
    },

    #[error("component '{name}' defined twice ({first} and {second})")]
    NameCollision {
        name: String,
        first: String,
        second: String,
    },

    #[error("handler override for namespace '{namespace}' installed after handler resolution began")]
    OverrideOrdering { namespace: String },

    #[error("configuration parser failed: {0}")]
    Parser(String),
}
