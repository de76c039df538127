use crate::agent::{AgentEvent, ConversationMessage, VoiceAgent};
use crate::error::SessionError;
use crate::microphone::{MicrophoneGate, MicrophoneGrant};
use crate::notification::{Notification, Notifier};
use std::fmt;
use std::time::Duration;
use tokio::sync::watch;

pub const DEFAULT_START_TIMEOUT: Duration = Duration::from_secs(15);

/// Connection phase of the voice session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Idle,
    Connecting,
    Connected,
    Disconnecting,
    Disconnected,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Connecting => "connecting",
            SessionStatus::Connected => "connected",
            SessionStatus::Disconnecting => "disconnecting",
            SessionStatus::Disconnected => "disconnected",
        };
        f.write_str(s)
    }
}

/// What the UI renders: published after every change.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub session_id: Option<String>,
    pub is_agent_speaking: bool,
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub agent_id: String,
    pub start_timeout: Duration,
}

impl ControllerConfig {
    pub fn new(agent_id: &str) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            start_timeout: DEFAULT_START_TIMEOUT,
        }
    }

    pub fn with_start_timeout(mut self, start_timeout: Duration) -> Self {
        self.start_timeout = start_timeout;
        self
    }
}

type ConversationEndHandler = Box<dyn FnMut(&str) + Send>;

/// Owns the lifecycle of the single voice session.
///
/// The session id is written by the start path and handed to the
/// conversation-end handler by the disconnect path only, exactly once per
/// session that obtained an id. Events are fed in through
/// [`handle_event`](Self::handle_event) by whoever owns the agent's event
/// stream.
pub struct SessionController<A, M, N> {
    agent: A,
    microphone: M,
    notifier: N,
    config: ControllerConfig,
    status: SessionStatus,
    session_id: Option<String>,
    handoff_pending: bool,
    is_agent_speaking: bool,
    grant: Option<MicrophoneGrant>,
    transcript: Vec<ConversationMessage>,
    on_conversation_end: Option<ConversationEndHandler>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl<A, M, N> SessionController<A, M, N>
where
    A: VoiceAgent,
    M: MicrophoneGate,
    N: Notifier,
{
    pub fn new(agent: A, microphone: M, notifier: N, config: ControllerConfig) -> Self {
        let (snapshot_tx, _) = watch::channel(SessionSnapshot::default());
        Self {
            agent,
            microphone,
            notifier,
            config,
            status: SessionStatus::Idle,
            session_id: None,
            handoff_pending: false,
            is_agent_speaking: false,
            grant: None,
            transcript: Vec::new(),
            on_conversation_end: None,
            snapshot_tx,
        }
    }

    /// Registers the receiver of the finished session's id.
    pub fn on_conversation_end(mut self, handler: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_conversation_end = Some(Box::new(handler));
        self
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn is_agent_speaking(&self) -> bool {
        self.is_agent_speaking
    }

    pub fn transcript(&self) -> &[ConversationMessage] {
        &self.transcript
    }

    pub fn can_start(&self) -> bool {
        self.status != SessionStatus::Connected
    }

    pub fn can_stop(&self) -> bool {
        self.status == SessionStatus::Connected
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            session_id: self.session_id.clone(),
            is_agent_speaking: self.is_agent_speaking,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.snapshot());
    }

    fn set_status(&mut self, status: SessionStatus) {
        if self.status != status {
            tracing::debug!("session status: {} -> {}", self.status, status);
            self.status = status;
        }
        self.publish();
    }

    /// Acquires the microphone and opens a session with the configured agent.
    ///
    /// Failures are reported through the notifier and leave the status as it
    /// was before the call; the error is also returned to the caller.
    pub async fn start_session(&mut self) -> Result<(), SessionError> {
        match self.status {
            SessionStatus::Idle | SessionStatus::Disconnected => {}
            status => {
                tracing::debug!("start ignored while {}", status);
                return Ok(());
            }
        }

        let previous = self.status;
        match self.open_session().await {
            Ok(id) => {
                tracing::info!("session started: id={}", id);
                self.session_id = Some(id);
                self.handoff_pending = true;
                self.on_connect();
                Ok(())
            }
            Err(e) => {
                self.grant = None;
                self.set_status(previous);
                tracing::error!("failed to start session: {}", e);
                self.notifier
                    .notify(Notification::destructive("Failed to start conversation", e.to_string()));
                Err(e)
            }
        }
    }

    async fn open_session(&mut self) -> Result<String, SessionError> {
        self.session_id = None;
        self.transcript.clear();
        self.set_status(SessionStatus::Connecting);

        let mut grant = self.microphone.acquire()?;
        let input = grant.take_input();
        self.grant = Some(grant);

        let timeout = self.config.start_timeout;
        let started = tokio::time::timeout(
            timeout,
            self.agent.start_session(&self.config.agent_id, input),
        )
        .await;
        match started {
            Ok(Ok(id)) if id.is_empty() => Err(SessionError::SessionStartFailed(
                "agent returned an empty session id".to_string(),
            )),
            Ok(result) => result,
            Err(_) => {
                if let Err(e) = self.agent.end_session().await {
                    tracing::debug!("abandoning half-open session failed: {}", e);
                }
                Err(SessionError::SessionStartFailed(format!(
                    "agent did not acknowledge the session within {:?}",
                    timeout
                )))
            }
        }
    }

    /// Asks the agent to end the open session. A no-op unless connected.
    ///
    /// The terminal transition happens when the agent's disconnect event is
    /// handled, which is also where the session id is handed off.
    pub async fn stop_session(&mut self) -> Result<(), SessionError> {
        if self.status != SessionStatus::Connected {
            tracing::debug!("stop ignored while {}", self.status);
            return Ok(());
        }

        self.set_status(SessionStatus::Disconnecting);
        if let Err(e) = self.agent.end_session().await {
            tracing::error!("failed to end session: {}", e);
            self.set_status(SessionStatus::Connected);
            self.notifier
                .notify(Notification::destructive("Error", e.to_string()));
            return Err(e);
        }
        Ok(())
    }

    pub fn handle_event(&mut self, event: AgentEvent) {
        match event {
            AgentEvent::Connect => self.on_connect(),
            AgentEvent::Disconnect { reason } => self.on_disconnect(reason),
            AgentEvent::Message(message) => self.on_message(message),
            AgentEvent::Error(error) => self.on_error(&error),
            AgentEvent::ModeChange { speaking } => self.on_mode_change(speaking),
        }
    }

    fn on_connect(&mut self) {
        match self.status {
            SessionStatus::Connecting => {
                self.set_status(SessionStatus::Connected);
                tracing::info!("Connected to AI Agent");
                self.notifier.notify(Notification::info(
                    "Connected to AI Agent",
                    Some("You can now start speaking".to_string()),
                ));
            }
            // The start path already handled the acknowledgement.
            SessionStatus::Connected => {}
            status => tracing::debug!("ignoring connect while {}", status),
        }
    }

    fn on_disconnect(&mut self, reason: Option<String>) {
        if matches!(self.status, SessionStatus::Idle | SessionStatus::Disconnected) {
            tracing::debug!("ignoring disconnect while {}", self.status);
            return;
        }
        tracing::info!(
            "Disconnected from AI Agent: id={:?}, reason={:?}",
            self.session_id,
            reason
        );

        if std::mem::take(&mut self.handoff_pending) {
            if let (Some(id), Some(handler)) =
                (self.session_id.as_deref(), self.on_conversation_end.as_mut())
            {
                handler(id);
            }
        }

        self.notifier.notify(Notification::info(
            "Disconnected from AI Agent",
            self.session_id
                .as_ref()
                .map(|id| format!("Conversation ID: {}", id)),
        ));

        self.grant = None;
        self.is_agent_speaking = false;
        self.set_status(SessionStatus::Disconnected);
    }

    fn on_message(&mut self, message: ConversationMessage) {
        tracing::debug!("Message: {:?}", message);
        if matches!(
            self.status,
            SessionStatus::Connected | SessionStatus::Disconnecting
        ) {
            self.transcript.push(message);
        }
    }

    fn on_error(&mut self, error: &str) {
        tracing::error!("agent error while {}: {}", self.status, error);
        self.notifier.notify(Notification::destructive(
            "Error",
            SessionError::TransportError(error.to_string()).to_string(),
        ));
    }

    fn on_mode_change(&mut self, speaking: bool) {
        if self.status != SessionStatus::Connected {
            return;
        }
        if self.is_agent_speaking != speaking {
            self.is_agent_speaking = speaking;
            self.publish();
        }
    }
}
