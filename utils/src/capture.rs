use crate::audio::{self, ChunkedResampler, RESAMPLER_CHUNK_SIZE};
use crate::device::{self, DeviceError};
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::StreamConfig;
use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;
use tokio::sync::mpsc::error::TrySendError;

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("access to the audio device was denied: {0}")]
    PermissionDenied(String),
    #[error("audio device unavailable: {0}")]
    Unavailable(String),
}

impl From<DeviceError> for CaptureError {
    fn from(e: DeviceError) -> Self {
        CaptureError::Unavailable(e.to_string())
    }
}

// Backends only report permission problems as free-form text.
pub(crate) fn looks_like_permission_error(description: &str) -> bool {
    let description = description.to_lowercase();
    ["permission", "denied", "not authorized", "unauthorized", "not permitted"]
        .iter()
        .any(|needle| description.contains(needle))
}

fn classify_backend(description: String) -> CaptureError {
    if looks_like_permission_error(&description) {
        CaptureError::PermissionDenied(description)
    } else {
        CaptureError::Unavailable(description)
    }
}

impl From<cpal::BuildStreamError> for CaptureError {
    fn from(e: cpal::BuildStreamError) -> Self {
        match e {
            cpal::BuildStreamError::BackendSpecific { err } => classify_backend(err.description),
            other => CaptureError::Unavailable(other.to_string()),
        }
    }
}

impl From<cpal::PlayStreamError> for CaptureError {
    fn from(e: cpal::PlayStreamError) -> Self {
        match e {
            cpal::PlayStreamError::BackendSpecific { err } => classify_backend(err.description),
            other => CaptureError::Unavailable(other.to_string()),
        }
    }
}

impl From<cpal::DefaultStreamConfigError> for CaptureError {
    fn from(e: cpal::DefaultStreamConfigError) -> Self {
        match e {
            cpal::DefaultStreamConfigError::BackendSpecific { err } => {
                classify_backend(err.description)
            }
            other => CaptureError::Unavailable(other.to_string()),
        }
    }
}

/// Exclusive handle on a live microphone stream.
///
/// The stream lives on its own thread because `cpal::Stream` is not `Send` on
/// every platform. Dropping the handle stops capture and releases the device.
pub struct MicrophoneCapture {
    device_name: String,
    stop_tx: Option<std_mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl MicrophoneCapture {
    /// Opens the device and starts forwarding mono PCM16 chunks at `target_rate`.
    pub fn open(
        device_name: Option<&str>,
        target_rate: u32,
        capacity: usize,
    ) -> Result<(Self, tokio::sync::mpsc::Receiver<Vec<i16>>), CaptureError> {
        let device_name = device_name.map(str::to_string);
        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<String, CaptureError>>();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
        let (audio_tx, audio_rx) = tokio::sync::mpsc::channel(capacity);

        let thread = std::thread::Builder::new()
            .name("microphone-capture".to_string())
            .spawn(move || match build_input_stream(device_name.as_deref(), target_rate, audio_tx) {
                Ok((stream, name)) => {
                    let _ = ready_tx.send(Ok(name));
                    // Returns once the handle is dropped.
                    let _ = stop_rx.recv();
                    drop(stream);
                    tracing::debug!("microphone stream released");
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|e| CaptureError::Unavailable(format!("failed to spawn capture thread: {}", e)))?;

        match ready_rx.recv() {
            Ok(Ok(name)) => {
                tracing::info!("microphone open: device={:?}", name);
                Ok((
                    Self {
                        device_name: name,
                        stop_tx: Some(stop_tx),
                        thread: Some(thread),
                    },
                    audio_rx,
                ))
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => Err(CaptureError::Unavailable(
                "capture thread exited before opening the device".to_string(),
            )),
        }
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

impl Drop for MicrophoneCapture {
    fn drop(&mut self) {
        self.stop_tx.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("microphone capture thread panicked");
            }
        }
    }
}

fn build_input_stream(
    device_name: Option<&str>,
    target_rate: u32,
    audio_tx: tokio::sync::mpsc::Sender<Vec<i16>>,
) -> Result<(cpal::Stream, String), CaptureError> {
    let input = device::get_or_default_input(device_name)?;
    let name = input.name().unwrap_or_else(|_| "<unnamed>".to_string());

    let default_config = input.default_input_config()?;
    let config = StreamConfig {
        channels: default_config.channels(),
        sample_rate: default_config.sample_rate(),
        buffer_size: cpal::BufferSize::Default,
    };
    tracing::debug!("input: device={:?}, config={:?}", name, config);

    let channels = config.channels as usize;
    let mut resampler =
        ChunkedResampler::new(config.sample_rate.0, target_rate, RESAMPLER_CHUNK_SIZE)
            .map_err(|e| CaptureError::Unavailable(e.to_string()))?;

    let input_data_fn = move |data: &[f32], _: &cpal::InputCallbackInfo| {
        let mono = audio::mix_to_mono(data, channels);
        let resampled = resampler.push(&mono);
        if resampled.is_empty() {
            return;
        }
        match audio_tx.try_send(audio::convert_f32_to_i16(&resampled)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => tracing::warn!("microphone buffer full, dropping audio"),
            Err(TrySendError::Closed(_)) => {}
        }
    };
    let stream = input.build_input_stream(
        &config,
        input_data_fn,
        move |err| tracing::error!("an error occurred on input stream: {}", err),
        None,
    )?;
    stream.play()?;
    Ok((stream, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_errors_are_recognised_from_backend_text() {
        assert!(looks_like_permission_error("Permission denied (os error 13)"));
        assert!(looks_like_permission_error("Microphone access not authorized"));
        assert!(!looks_like_permission_error("device is busy"));
    }

    #[test]
    fn test_backend_errors_are_classified() {
        let denied = cpal::BuildStreamError::BackendSpecific {
            err: cpal::BackendSpecificError {
                description: "Operation not permitted".to_string(),
            },
        };
        assert!(matches!(CaptureError::from(denied), CaptureError::PermissionDenied(_)));
        assert!(matches!(
            CaptureError::from(cpal::BuildStreamError::DeviceNotAvailable),
            CaptureError::Unavailable(_)
        ));
    }
}
