use std::any::Any;
use tokio::sync::mpsc;

#[cfg(test)]
use mockall::automock;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MicrophoneError {
    #[error("{0}")]
    PermissionDenied(String),
    #[error("{0}")]
    DeviceUnavailable(String),
}

/// Mono PCM16 audio captured from the microphone, handed to the agent runtime.
#[derive(Debug, Default)]
pub struct MicrophoneInput {
    audio: Option<mpsc::Receiver<Vec<i16>>>,
}

impl MicrophoneInput {
    pub fn new(audio: mpsc::Receiver<Vec<i16>>) -> Self {
        Self { audio: Some(audio) }
    }

    /// Input that never yields audio.
    pub fn silent() -> Self {
        Self { audio: None }
    }

    pub fn into_receiver(self) -> Option<mpsc::Receiver<Vec<i16>>> {
        self.audio
    }
}

/// Exclusive access to the audio input device for the lifetime of one session.
///
/// Dropping the grant releases the device.
pub struct MicrophoneGrant {
    input: Option<MicrophoneInput>,
    _device: Option<Box<dyn Any + Send>>,
}

impl MicrophoneGrant {
    pub fn new(input: MicrophoneInput, device: impl Any + Send) -> Self {
        Self {
            input: Some(input),
            _device: Some(Box::new(device)),
        }
    }

    /// A grant that holds no device, for runtimes that capture audio themselves.
    pub fn detached(input: MicrophoneInput) -> Self {
        Self {
            input: Some(input),
            _device: None,
        }
    }

    /// Takes the captured audio; later calls yield a silent input.
    pub fn take_input(&mut self) -> MicrophoneInput {
        self.input.take().unwrap_or_default()
    }
}

impl std::fmt::Debug for MicrophoneGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MicrophoneGrant")
            .field("input", &self.input)
            .field("holds_device", &self._device.is_some())
            .finish()
    }
}

#[cfg_attr(test, automock)]
pub trait MicrophoneGate: Send {
    /// Acquires the input device, failing when access is denied or no device exists.
    fn acquire(&mut self) -> Result<MicrophoneGrant, MicrophoneError>;
}
