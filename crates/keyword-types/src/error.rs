//! Configuration error type.

use thiserror::Error;

/// Errors raised while loading or validating settings.
///
/// Always fatal: the pipeline refuses to start on a `ConfigError`.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config sources could not be read or deserialized
    #[error("Failed to load configuration: {0}")]
    Load(String),

    /// A value is present but out of range
    #[error("Invalid configuration for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    /// A required value is absent
    #[error("Missing configuration value: {0}")]
    Missing(&'static str),
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
