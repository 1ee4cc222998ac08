//! Error taxonomy for a generation attempt.

/// Coarse classification the front-end uses to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    AuthRequired,
    SessionExpired,
    GeolocationUnavailable,
    GeolocationDenied,
    PlaceContext,
    EmptyResponse,
    MissingImageData,
    Transport,
}

/// Errors that abort a generation attempt. Nothing here is retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StudioError {
    /// The user must fix the input.
    #[error("{0}")]
    Validation(String),

    /// No usable API key.
    #[error("An API key must be activated first. Select a key and try again.")]
    AuthRequired,

    /// The key was rejected mid-call.
    #[error("Your session has expired. Please select the key again and retry.")]
    SessionExpired,

    #[error("Location is not available on this system.")]
    GeolocationUnavailable,

    #[error("Could not access your location: {0}")]
    GeolocationDenied(String),

    /// Maps-grounded lookup failed; carries the underlying message.
    #[error("Could not load location context: {message}")]
    PlaceContext { message: String },

    #[error("No response was received from the model.")]
    EmptyResponse,

    #[error("The response does not contain valid image data.")]
    MissingImageData,

    #[error("{0}")]
    Transport(String),
}

impl StudioError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::AuthRequired => ErrorKind::AuthRequired,
            Self::SessionExpired => ErrorKind::SessionExpired,
            Self::GeolocationUnavailable => ErrorKind::GeolocationUnavailable,
            Self::GeolocationDenied(_) => ErrorKind::GeolocationDenied,
            Self::PlaceContext { .. } => ErrorKind::PlaceContext,
            Self::EmptyResponse => ErrorKind::EmptyResponse,
            Self::MissingImageData => ErrorKind::MissingImageData,
            Self::Transport(_) => ErrorKind::Transport,
        }
    }

    /// True when the credential gate should ask for a key again.
    pub fn is_auth(&self) -> bool {
        matches!(self.kind(), ErrorKind::AuthRequired | ErrorKind::SessionExpired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_classification() {
        assert!(StudioError::AuthRequired.is_auth());
        assert!(StudioError::SessionExpired.is_auth());
        assert!(!StudioError::GeolocationDenied("nope".into()).is_auth());
        assert!(!StudioError::Transport("API key".into()).is_auth());
    }

    #[test]
    fn test_place_context_keeps_original_message() {
        let err = StudioError::PlaceContext {
            message: "503 Service Unavailable".into(),
        };
        assert_eq!(err.kind(), ErrorKind::PlaceContext);
        assert_eq!(
            err.to_string(),
            "Could not load location context: 503 Service Unavailable"
        );
    }

    #[test]
    fn test_transport_shows_message_verbatim() {
        let err = StudioError::Transport("quota exceeded".into());
        assert_eq!(err.to_string(), "quota exceeded");
    }
}
