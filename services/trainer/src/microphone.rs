use callflow_core::microphone::{MicrophoneError, MicrophoneGate, MicrophoneGrant, MicrophoneInput};
use convai_realtime_utils::capture::{CaptureError, MicrophoneCapture};

/// Grants the local input device through cpal.
///
/// Each grant owns a live capture stream; dropping the grant closes it.
pub struct CpalMicrophone {
    device_name: Option<String>,
    sample_rate: u32,
    capacity: usize,
}

impl CpalMicrophone {
    pub fn new(device_name: Option<String>, sample_rate: u32, capacity: usize) -> Self {
        Self {
            device_name,
            sample_rate,
            capacity,
        }
    }
}

impl MicrophoneGate for CpalMicrophone {
    fn acquire(&mut self) -> Result<MicrophoneGrant, MicrophoneError> {
        let (capture, audio_rx) =
            MicrophoneCapture::open(self.device_name.as_deref(), self.sample_rate, self.capacity)
                .map_err(map_capture_error)?;
        tracing::info!("microphone granted: {}", capture.device_name());
        Ok(MicrophoneGrant::new(MicrophoneInput::new(audio_rx), capture))
    }
}

fn map_capture_error(e: CaptureError) -> MicrophoneError {
    match e {
        CaptureError::PermissionDenied(message) => MicrophoneError::PermissionDenied(message),
        CaptureError::Unavailable(message) => MicrophoneError::DeviceUnavailable(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callflow_core::SessionError;

    #[test]
    fn test_capture_errors_keep_their_kind() {
        let denied = map_capture_error(CaptureError::PermissionDenied("blocked by OS".into()));
        assert_eq!(
            SessionError::from(denied),
            SessionError::PermissionDenied("blocked by OS".into())
        );

        let missing = map_capture_error(CaptureError::Unavailable("no input device".into()));
        assert!(matches!(
            SessionError::from(missing),
            SessionError::DeviceUnavailable(_)
        ));
    }
}
