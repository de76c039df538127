use crate::microphone::MicrophoneError;

/// Failures of the voice session lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Microphone permission denied: {0}")]
    PermissionDenied(String),
    #[error("No microphone available: {0}")]
    DeviceUnavailable(String),
    #[error("Failed to start session: {0}")]
    SessionStartFailed(String),
    #[error("Transport error: {0}")]
    TransportError(String),
}

impl From<MicrophoneError> for SessionError {
    fn from(e: MicrophoneError) -> Self {
        match e {
            MicrophoneError::PermissionDenied(msg) => SessionError::PermissionDenied(msg),
            MicrophoneError::DeviceUnavailable(msg) => SessionError::DeviceUnavailable(msg),
        }
    }
}
