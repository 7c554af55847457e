//! Error types for the avatar session controller

/// Result type alias using the session controller Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in session controller operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Backend credential fetch failed (unreachable or non-success status)
    #[error("Credential unavailable: {0}")]
    CredentialUnavailable(String),

    /// Peer connection could not be built or negotiated
    #[error("Transport negotiation failed: {0}")]
    TransportNegotiationFailed(String),

    /// Transport operation error on an established session
    #[error("Transport error: {0}")]
    TransportError(String),

    /// A speech or probe request finished with a cancellation
    #[error("Synthesis canceled: {0}")]
    SynthesisCanceled(String),

    /// Dialogue backend request failed
    #[error("Dialogue request failed: {0}")]
    DialogueFailed(String),

    /// Media frame error (bad dimensions, buffer mismatch)
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::CredentialUnavailable(_)
                | Error::TransportNegotiationFailed(_)
                | Error::TransportError(_)
                | Error::DialogueFailed(_)
                | Error::IoError(_)
        )
    }

    /// Check if this error is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::InvalidConfig(_))
    }

    /// Check if this error is a transport-related error
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Error::TransportNegotiationFailed(_) | Error::TransportError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidConfig("test".to_string());
        assert_eq!(err.to_string(), "Invalid configuration: test");
    }

    #[test]
    fn test_error_is_retryable() {
        assert!(Error::CredentialUnavailable("test".to_string()).is_retryable());
        assert!(Error::TransportNegotiationFailed("test".to_string()).is_retryable());
        assert!(!Error::InvalidConfig("test".to_string()).is_retryable());
        assert!(!Error::SynthesisCanceled("test".to_string()).is_retryable());
    }

    #[test]
    fn test_error_is_config_error() {
        assert!(Error::InvalidConfig("test".to_string()).is_config_error());
        assert!(!Error::CredentialUnavailable("test".to_string()).is_config_error());
    }

    #[test]
    fn test_error_is_transport_error() {
        assert!(Error::TransportNegotiationFailed("test".to_string()).is_transport_error());
        assert!(Error::TransportError("test".to_string()).is_transport_error());
        assert!(!Error::DialogueFailed("test".to_string()).is_transport_error());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::IoError(_)));
    }
}
