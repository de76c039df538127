/// Audio data encoded as base64
pub type Base64EncodedAudioBytes = String;

/// Sample rate the agent listens and speaks at unless the session metadata says otherwise.
pub const DEFAULT_PCM16_SAMPLE_RATE: u32 = 16000;

/// Audio formats announced in `conversation_initiation_metadata`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AudioFormat {
    #[serde(rename = "pcm_8000")]
    Pcm8000,
    #[serde(rename = "pcm_16000")]
    Pcm16000,
    #[serde(rename = "pcm_22050")]
    Pcm22050,
    #[serde(rename = "pcm_24000")]
    Pcm24000,
    #[serde(rename = "pcm_44100")]
    Pcm44100,
    #[serde(other)]
    Unsupported,
}

impl AudioFormat {
    /// Sample rate of a raw PCM16 format, `None` for anything we can't play or produce.
    pub fn sample_rate(&self) -> Option<u32> {
        match self {
            AudioFormat::Pcm8000 => Some(8000),
            AudioFormat::Pcm16000 => Some(16000),
            AudioFormat::Pcm22050 => Some(22050),
            AudioFormat::Pcm24000 => Some(24000),
            AudioFormat::Pcm44100 => Some(44100),
            AudioFormat::Unsupported => None,
        }
    }
}
