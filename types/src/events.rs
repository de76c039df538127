pub mod client;
pub mod server;

use client::*;
use server::*;

/// Everything the client may send over the conversation socket.
///
/// Audio chunks travel as a bare `{"user_audio_chunk": ...}` object while every
/// other message carries a `type` tag, hence the untagged outer layer.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum ClientEvent {
    UserAudioChunk(UserAudioChunkEvent),
    Typed(TypedClientEvent),
}

impl ClientEvent {
    pub fn user_audio_chunk(audio: crate::audio::Base64EncodedAudioBytes) -> Self {
        ClientEvent::UserAudioChunk(UserAudioChunkEvent::new(audio))
    }

    pub fn pong(event_id: u64) -> Self {
        ClientEvent::Typed(TypedClientEvent::Pong(PongEvent::new(event_id)))
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum TypedClientEvent {
    #[serde(rename = "pong")]
    Pong(PongEvent),
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Emitted locally when the socket closes; never sent by the agent.
    #[serde(rename = "close")]
    Close {
        reason: Option<String>,
    },
    /// Emitted locally when reading from the socket fails; a `close` follows.
    #[serde(rename = "transport_error")]
    TransportError {
        message: String,
    },
    #[serde(rename = "conversation_initiation_metadata")]
    ConversationInitiationMetadata(ConversationInitiationMetadataEvent),
    #[serde(rename = "user_transcript")]
    UserTranscript(UserTranscriptEvent),
    #[serde(rename = "agent_response")]
    AgentResponse(AgentResponseEvent),
    #[serde(rename = "agent_response_correction")]
    AgentResponseCorrection(AgentResponseCorrectionEvent),
    #[serde(rename = "internal_tentative_agent_response")]
    TentativeAgentResponse(TentativeAgentResponseEvent),
    #[serde(rename = "audio")]
    Audio(AudioEvent),
    #[serde(rename = "interruption")]
    Interruption(InterruptionEvent),
    #[serde(rename = "ping")]
    Ping(PingEvent),
    #[serde(rename = "vad_score")]
    VadScore(VadScoreEvent),
    #[serde(rename = "client_tool_call")]
    ClientToolCall(ClientToolCallEvent),
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_chunk_is_sent_without_a_type_tag() {
        let json = serde_json::to_value(ClientEvent::user_audio_chunk("AAAA".to_string())).unwrap();
        assert_eq!(json, serde_json::json!({ "user_audio_chunk": "AAAA" }));
    }

    #[test]
    fn test_pong_echoes_the_ping_event_id() {
        let json = serde_json::to_value(ClientEvent::pong(7)).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "pong", "event_id": 7 }));
    }

    #[test]
    fn test_initiation_metadata_carries_the_conversation_id() {
        let text = r#"{
            "type": "conversation_initiation_metadata",
            "conversation_initiation_metadata_event": {
                "conversation_id": "abc123",
                "agent_output_audio_format": "pcm_16000",
                "user_input_audio_format": "pcm_16000"
            }
        }"#;
        match serde_json::from_str::<ServerEvent>(text).unwrap() {
            ServerEvent::ConversationInitiationMetadata(event) => {
                let metadata = event.metadata();
                assert_eq!(metadata.conversation_id(), "abc123");
                assert_eq!(metadata.user_input_audio_format().sample_rate(), Some(16000));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_event_types_are_tolerated() {
        let event: ServerEvent =
            serde_json::from_str(r#"{"type":"mcp_tool_call","whatever":1}"#).unwrap();
        assert!(matches!(event, ServerEvent::Unknown));
    }
}
