use crate::audio::{AudioFormat, Base64EncodedAudioBytes};

fn default_format() -> AudioFormat {
    AudioFormat::Pcm16000
}

/// `conversation_initiation_metadata` event
///
/// The first event on every conversation; the agent has accepted the session
/// once this arrives.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ConversationInitiationMetadataEvent {
    conversation_initiation_metadata_event: ConversationInitiationMetadata,
}

impl ConversationInitiationMetadataEvent {
    pub fn new(conversation_id: &str) -> Self {
        Self {
            conversation_initiation_metadata_event: ConversationInitiationMetadata {
                conversation_id: conversation_id.to_string(),
                agent_output_audio_format: default_format(),
                user_input_audio_format: default_format(),
            },
        }
    }

    pub fn metadata(&self) -> &ConversationInitiationMetadata {
        &self.conversation_initiation_metadata_event
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ConversationInitiationMetadata {
    conversation_id: String,
    #[serde(default = "default_format")]
    agent_output_audio_format: AudioFormat,
    #[serde(default = "default_format")]
    user_input_audio_format: AudioFormat,
}

impl ConversationInitiationMetadata {
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn agent_output_audio_format(&self) -> AudioFormat {
        self.agent_output_audio_format
    }

    pub fn user_input_audio_format(&self) -> AudioFormat {
        self.user_input_audio_format
    }
}

/// `user_transcript` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct UserTranscriptEvent {
    user_transcription_event: UserTranscription,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct UserTranscription {
    user_transcript: String,
}

impl UserTranscriptEvent {
    pub fn new(transcript: &str) -> Self {
        Self {
            user_transcription_event: UserTranscription {
                user_transcript: transcript.to_string(),
            },
        }
    }

    pub fn transcript(&self) -> &str {
        &self.user_transcription_event.user_transcript
    }
}

/// `agent_response` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AgentResponseEvent {
    agent_response_event: AgentResponse,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct AgentResponse {
    agent_response: String,
}

impl AgentResponseEvent {
    pub fn new(response: &str) -> Self {
        Self {
            agent_response_event: AgentResponse {
                agent_response: response.to_string(),
            },
        }
    }

    pub fn response(&self) -> &str {
        &self.agent_response_event.agent_response
    }
}

/// `agent_response_correction` event, sent when the agent was interrupted mid-sentence
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AgentResponseCorrectionEvent {
    agent_response_correction_event: AgentResponseCorrection,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct AgentResponseCorrection {
    original_agent_response: String,
    corrected_agent_response: String,
}

impl AgentResponseCorrectionEvent {
    pub fn original(&self) -> &str {
        &self.agent_response_correction_event.original_agent_response
    }

    pub fn corrected(&self) -> &str {
        &self.agent_response_correction_event.corrected_agent_response
    }
}

/// `internal_tentative_agent_response` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TentativeAgentResponseEvent {
    tentative_agent_response_internal_event: TentativeAgentResponse,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct TentativeAgentResponse {
    tentative_agent_response: String,
}

impl TentativeAgentResponseEvent {
    pub fn response(&self) -> &str {
        &self
            .tentative_agent_response_internal_event
            .tentative_agent_response
    }
}

/// `audio` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AudioEvent {
    audio_event: AudioChunk,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct AudioChunk {
    audio_base_64: Base64EncodedAudioBytes,
    #[serde(default)]
    event_id: Option<u64>,
}

impl AudioEvent {
    pub fn new(audio: Base64EncodedAudioBytes) -> Self {
        Self {
            audio_event: AudioChunk {
                audio_base_64: audio,
                event_id: None,
            },
        }
    }

    pub fn audio(&self) -> &Base64EncodedAudioBytes {
        &self.audio_event.audio_base_64
    }

    pub fn event_id(&self) -> Option<u64> {
        self.audio_event.event_id
    }
}

/// `interruption` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct InterruptionEvent {
    #[serde(default)]
    interruption_event: Option<Interruption>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Interruption {
    #[serde(default)]
    event_id: Option<u64>,
}

impl InterruptionEvent {
    pub fn event_id(&self) -> Option<u64> {
        self.interruption_event.as_ref().and_then(|i| i.event_id)
    }
}

/// `ping` event; must be answered with a `pong` carrying the same id
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PingEvent {
    ping_event: Ping,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Ping {
    event_id: u64,
    #[serde(default)]
    ping_ms: Option<u64>,
}

impl PingEvent {
    pub fn new(event_id: u64) -> Self {
        Self {
            ping_event: Ping {
                event_id,
                ping_ms: None,
            },
        }
    }

    pub fn event_id(&self) -> u64 {
        self.ping_event.event_id
    }

    /// Delay the server asks us to wait before answering.
    pub fn ping_ms(&self) -> Option<u64> {
        self.ping_event.ping_ms
    }
}

/// `vad_score` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct VadScoreEvent {
    vad_score_event: VadScore,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct VadScore {
    vad_score: f32,
}

impl VadScoreEvent {
    pub fn score(&self) -> f32 {
        self.vad_score_event.vad_score
    }
}

/// `client_tool_call` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ClientToolCallEvent {
    client_tool_call: ClientToolCall,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct ClientToolCall {
    tool_name: String,
    tool_call_id: String,
    #[serde(default)]
    parameters: serde_json::Value,
}

impl ClientToolCallEvent {
    pub fn tool_name(&self) -> &str {
        &self.client_tool_call.tool_name
    }

    pub fn tool_call_id(&self) -> &str {
        &self.client_tool_call.tool_call_id
    }

    pub fn parameters(&self) -> &serde_json::Value {
        &self.client_tool_call.parameters
    }
}
