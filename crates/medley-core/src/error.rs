//! Error types for Medley Core

use thiserror::Error;

/// Result type alias for facade operations
pub type Result<T> = std::result::Result<T, Error>;

/// Facade error types
///
/// Setup-time misuse (bad arguments, bad registration) is returned
/// synchronously. Playback-time failures are never returned from facade
/// entry points; they travel through the `error` event channel instead,
/// since the caller cannot synchronously recover from a backend or
/// network condition.
#[derive(Error, Debug)]
pub enum Error {
    // Resolver/registry utility errors
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("renderer registration failed: {0}")]
    Registration(String),

    // Selection errors
    #[error("No renderer found")]
    NoRendererFound,

    // Playback-time errors (event channel only)
    #[error("renderer runtime failure: {0}")]
    BackendRuntime(String),

    #[error("renderer `{renderer}` did not become ready within {timeout_ms} ms")]
    BackendInitTimeout { renderer: String, timeout_ms: u64 },

    // Configuration errors
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // Internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns true if this error is recoverable (a fallback source or
    /// a different renderer may still succeed)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::BackendRuntime(_) | Error::BackendInitTimeout { .. }
        )
    }

    /// Returns the error code for telemetry
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::InvalidArgument(_) => "INVALID_ARGUMENT",
            Error::Registration(_) => "REGISTRATION",
            Error::NoRendererFound => "NO_RENDERER_FOUND",
            Error::BackendRuntime(_) => "BACKEND_RUNTIME",
            Error::BackendInitTimeout { .. } => "BACKEND_INIT_TIMEOUT",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Internal(_) => "INTERNAL",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            Error::InvalidArgument("x".into()).error_code(),
            "INVALID_ARGUMENT"
        );
        assert_eq!(Error::NoRendererFound.error_code(), "NO_RENDERER_FOUND");
        assert_eq!(
            Error::BackendInitTimeout {
                renderer: "native".into(),
                timeout_ms: 10_000
            }
            .error_code(),
            "BACKEND_INIT_TIMEOUT"
        );
    }

    #[test]
    fn test_recoverable() {
        assert!(Error::BackendRuntime("decode failed".into()).is_recoverable());
        assert!(!Error::Registration("missing name".into()).is_recoverable());
    }

    #[test]
    fn test_no_renderer_message() {
        // The message is part of the error-event contract.
        assert_eq!(Error::NoRendererFound.to_string(), "No renderer found");
    }
}
