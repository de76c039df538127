use crate::audio::Base64EncodedAudioBytes;

/// `user_audio_chunk` message
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct UserAudioChunkEvent {
    user_audio_chunk: Base64EncodedAudioBytes,
}

impl UserAudioChunkEvent {
    pub fn new(audio: Base64EncodedAudioBytes) -> Self {
        Self {
            user_audio_chunk: audio,
        }
    }

    pub fn audio(&self) -> &Base64EncodedAudioBytes {
        &self.user_audio_chunk
    }
}

/// `pong` event, answering a server `ping`
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PongEvent {
    event_id: u64,
}

impl PongEvent {
    pub fn new(event_id: u64) -> Self {
        Self { event_id }
    }

    pub fn event_id(&self) -> u64 {
        self.event_id
    }
}
