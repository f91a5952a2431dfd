use thiserror::Error;

/// Errors produced by templates, models, parsers, and chains.
///
/// Every stage surfaces its own variant unchanged; chains never wrap or
/// recover from a stage failure.
#[derive(Error, Debug)]
pub enum ChainError {
    /// A template placeholder had no value at render time.
    #[error("missing value for placeholder '{0}'")]
    MissingPlaceholder(String),

    /// A template pattern could not be parsed.
    #[error("invalid template {template:?}: {reason}")]
    InvalidTemplate { template: String, reason: String },

    /// The remote model call failed (transport, auth, quota, status code).
    #[error("model invocation failed: {0}")]
    Invocation(#[from] InvocationError),

    /// The model response did not carry the expected content.
    #[error("malformed model response: {0}")]
    MalformedResponse(String),

    /// A stage received a value shape it cannot consume.
    #[error("stage '{stage}' expected {expected} input, got {found}")]
    InvalidInput {
        stage: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A user-supplied stage (e.g. a [`Lambda`](crate::stage::Lambda)) failed.
    #[error("Stage '{stage}' failed: {message}")]
    StageFailed { stage: String, message: String },

    /// Invalid configuration detected at build or invoke time.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A YAML template document could not be parsed.
    #[cfg(feature = "yaml")]
    #[error("YAML parsing failed: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Failures at the model I/O boundary.
#[derive(Error, Debug)]
pub enum InvocationError {
    /// Low-level HTTP transport failure (connection refused, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Provider returned a non-success status code.
    #[error("HTTP {status}: {body}")]
    Http {
        /// HTTP status code (e.g. 401, 429, 500).
        status: u16,
        /// Response body text.
        body: String,
    },

    /// Any other provider-side failure.
    #[error("{0}")]
    Provider(String),
}

impl From<reqwest::Error> for ChainError {
    fn from(err: reqwest::Error) -> Self {
        ChainError::Invocation(InvocationError::Transport(err))
    }
}

pub type Result<T> = std::result::Result<T, ChainError>;
