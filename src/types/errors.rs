//! Error types.

use std::sync::Arc;

use thiserror::Error;

/// Default result type of the crate.
pub type SuspenseResult<T> = Result<T, SuspenseError>;

/// Errors raised by the crate itself.
#[derive(Error, Debug)]
pub enum SuspenseError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No tokio runtime available to drive resolvers")]
    NoRuntime,
}

impl SuspenseError {
    /// Creates a configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }
}

/// Why waiting for a resolved value failed.
#[derive(Error, Debug)]
pub enum ResolveError<E> {
    /// The resolver failed; the error is cached for the key.
    #[error("Resolver failed: {0}")]
    Rejected(Arc<E>),

    /// The computation ended without a result.
    #[error("Resolver was abandoned before settling")]
    Abandoned,
}

impl<E> ResolveError<E> {
    /// Returns the resolver error, if the resolver failed.
    pub fn rejection(&self) -> Option<&Arc<E>> {
        match self {
            ResolveError::Rejected(error) => Some(error),
            ResolveError::Abandoned => None,
        }
    }
}

impl<E> Clone for ResolveError<E> {
    fn clone(&self) -> Self {
        match self {
            ResolveError::Rejected(error) => ResolveError::Rejected(Arc::clone(error)),
            ResolveError::Abandoned => ResolveError::Abandoned,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            SuspenseError::config("bad lifespan").to_string(),
            "Configuration error: bad lifespan"
        );
        assert_eq!(
            SuspenseError::NoRuntime.to_string(),
            "No tokio runtime available to drive resolvers"
        );
    }

    #[test]
    fn test_resolve_error_display() {
        let rejected: ResolveError<String> = ResolveError::Rejected(Arc::new("not found".into()));
        assert_eq!(rejected.to_string(), "Resolver failed: not found");
        assert_eq!(rejected.rejection().map(|e| e.as_str()), Some("not found"));

        let abandoned: ResolveError<String> = ResolveError::Abandoned;
        assert!(abandoned.rejection().is_none());
    }
}
