//! Error types for the REST authentication provider

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RestAuthError {
    /// One or more required configuration keys are absent.
    #[error("REST auth enabled but missing required config values: {}", .0.join(", "))]
    MissingConfig(Vec<String>),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The identity service could not be reached or answered with a fault.
    #[error("Identity service unavailable: {0}")]
    ServiceUnavailable(String),

    /// A host account operation failed.
    #[error("Host error: {0}")]
    Host(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, RestAuthError>;
