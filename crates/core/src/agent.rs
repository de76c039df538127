use crate::error::SessionError;
use crate::microphone::MicrophoneInput;
use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSource {
    User,
    Agent,
}

/// One conversational turn, captured for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationMessage {
    pub source: MessageSource,
    pub text: String,
}

impl ConversationMessage {
    pub fn user(text: &str) -> Self {
        Self {
            source: MessageSource::User,
            text: text.to_string(),
        }
    }

    pub fn agent(text: &str) -> Self {
        Self {
            source: MessageSource::Agent,
            text: text.to_string(),
        }
    }
}

/// Lifecycle events delivered by the voice runtime, in order, for the current session.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    Connect,
    Disconnect { reason: Option<String> },
    Message(ConversationMessage),
    Error(String),
    ModeChange { speaking: bool },
}

/// A remote real-time voice agent.
///
/// Implementations push [`AgentEvent`]s to whoever drives the
/// [`SessionController`](crate::session::SessionController); the terminal
/// event of every opened session is `Disconnect`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait VoiceAgent: Send {
    /// Opens a session and resolves with its id once the agent has acknowledged it.
    async fn start_session(
        &mut self,
        agent_id: &str,
        microphone: MicrophoneInput,
    ) -> Result<String, SessionError>;

    /// Asks the agent to end the session; resolves once the close is acknowledged.
    async fn end_session(&mut self) -> Result<(), SessionError>;
}
