use anyhow::Result;
use async_trait::async_trait;
use callflow_core::agent::{AgentEvent, ConversationMessage, VoiceAgent};
use callflow_core::error::SessionError;
use callflow_core::microphone::MicrophoneInput;
use convai_realtime::types::audio::DEFAULT_PCM16_SAMPLE_RATE;
use convai_realtime::types::ServerEvent;
use convai_realtime::ServerRx;
use convai_realtime_utils::audio;
use convai_realtime_utils::playback::{AudioPlayback, PlaybackEvent};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, Mutex};

#[cfg(test)]
use mockall::automock;

/// The parts of a connected `convai_realtime::Client` the adapter drives.
/// A trait so the client can be mocked in tests.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConversationClient: Send + Sync {
    fn conversation_id(&self) -> Option<String>;
    fn agent_output_rate(&self) -> u32;
    fn server_events(&mut self) -> Result<ServerRx>;
    async fn send_user_audio(&self, audio: String) -> Result<()>;
    async fn close(&mut self) -> Result<()>;
}

#[async_trait]
impl ConversationClient for convai_realtime::Client {
    fn conversation_id(&self) -> Option<String> {
        convai_realtime::Client::conversation_id(self).map(str::to_string)
    }

    fn agent_output_rate(&self) -> u32 {
        self.metadata()
            .and_then(|m| m.agent_output_audio_format().sample_rate())
            .unwrap_or(DEFAULT_PCM16_SAMPLE_RATE)
    }

    fn server_events(&mut self) -> Result<ServerRx> {
        convai_realtime::Client::server_events(self)
    }

    async fn send_user_audio(&self, audio: String) -> Result<()> {
        convai_realtime::Client::send_user_audio(self, audio).await
    }

    async fn close(&mut self) -> Result<()> {
        convai_realtime::Client::close(self).await
    }
}

/// Opens one conversation per call.
#[async_trait]
pub trait Connector: Send + Sync {
    type Client: ConversationClient + 'static;

    async fn connect(&self, agent_id: &str) -> Result<Self::Client>;
}

pub struct ConvaiConnector {
    base_url: Option<String>,
    api_key: Option<String>,
    capacity: usize,
}

impl ConvaiConnector {
    pub fn new(base_url: Option<String>, api_key: Option<String>) -> Self {
        Self {
            base_url,
            api_key,
            capacity: 1024,
        }
    }
}

#[async_trait]
impl Connector for ConvaiConnector {
    type Client = convai_realtime::Client;

    async fn connect(&self, agent_id: &str) -> Result<Self::Client> {
        let mut builder = convai_realtime::Config::builder(agent_id);
        if let Some(base_url) = &self.base_url {
            builder = builder.with_base_url(base_url);
        }
        builder = match &self.api_key {
            Some(api_key) => builder.with_api_key(api_key),
            None => builder.without_api_key(),
        };
        convai_realtime::connect_with_config(self.capacity, builder.build()).await
    }
}

struct ActiveSession<C> {
    client: Arc<Mutex<C>>,
    audio_task: Option<tokio::task::JoinHandle<()>>,
}

impl<C> Drop for ActiveSession<C> {
    fn drop(&mut self) {
        if let Some(task) = self.audio_task.take() {
            task.abort();
        }
    }
}

/// Implements [`VoiceAgent`] on top of the conversational voice socket.
///
/// Server events are translated into [`AgentEvent`]s on `events`, starting
/// with `Connect` and ending with `Disconnect`. Microphone chunks are
/// streamed to the agent and, when playback is enabled, agent audio is
/// played on the output device.
pub struct ConvaiAgent<K: Connector> {
    connector: K,
    events: mpsc::UnboundedSender<AgentEvent>,
    playback_device: Option<Option<String>>,
    session: Option<ActiveSession<K::Client>>,
}

impl<K: Connector> ConvaiAgent<K> {
    pub fn new(connector: K, events: mpsc::UnboundedSender<AgentEvent>) -> Self {
        Self {
            connector,
            events,
            playback_device: None,
            session: None,
        }
    }

    /// Plays agent audio on the named output device, or the default one.
    pub fn with_playback(mut self, device_name: Option<String>) -> Self {
        self.playback_device = Some(device_name);
        self
    }

    fn open_playback(&self, source_rate: u32) -> Option<(AudioPlayback, mpsc::UnboundedReceiver<PlaybackEvent>)> {
        let device_name = self.playback_device.as_ref()?;
        let (playback_tx, playback_rx) = mpsc::unbounded_channel();
        match AudioPlayback::open(device_name.as_deref(), source_rate, playback_tx) {
            Ok(playback) => Some((playback, playback_rx)),
            Err(e) => {
                tracing::warn!("agent audio will not be played: {}", e);
                None
            }
        }
    }

    fn attach(&mut self, mut client: K::Client, microphone: MicrophoneInput) -> Result<String, SessionError> {
        let conversation_id = client
            .conversation_id()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                SessionError::SessionStartFailed("agent did not assign a conversation id".to_string())
            })?;
        let server_rx = client
            .server_events()
            .map_err(|e| SessionError::TransportError(format!("{:#}", e)))?;

        let (playback, playback_rx) = if self.playback_device.is_some() {
            self.open_playback(client.agent_output_rate()).unzip()
        } else {
            (None, None)
        };

        let forwarder = Forwarder {
            events: self.events.clone(),
            playback,
            speaking: false,
        };
        forwarder.emit(AgentEvent::Connect);
        tokio::spawn(forward_events(server_rx, forwarder, playback_rx));

        let client = Arc::new(Mutex::new(client));
        let audio_task = microphone
            .into_receiver()
            .map(|audio_rx| tokio::spawn(pump_microphone(audio_rx, client.clone())));

        self.session = Some(ActiveSession { client, audio_task });
        Ok(conversation_id)
    }
}

#[async_trait]
impl<K: Connector> VoiceAgent for ConvaiAgent<K> {
    async fn start_session(
        &mut self,
        agent_id: &str,
        microphone: MicrophoneInput,
    ) -> Result<String, SessionError> {
        self.session = None;
        tracing::info!("calling agent {}", agent_id);
        let client = self
            .connector
            .connect(agent_id)
            .await
            .map_err(|e| SessionError::SessionStartFailed(format!("{:#}", e)))?;
        self.attach(client, microphone)
    }

    async fn end_session(&mut self) -> Result<(), SessionError> {
        let client = match &self.session {
            Some(session) => session.client.clone(),
            None => {
                tracing::debug!("no open conversation to end");
                return Ok(());
            }
        };
        client
            .lock()
            .await
            .close()
            .await
            .map_err(|e| SessionError::TransportError(format!("{:#}", e)))?;
        self.session = None;
        Ok(())
    }
}

struct Forwarder {
    events: mpsc::UnboundedSender<AgentEvent>,
    playback: Option<AudioPlayback>,
    speaking: bool,
}

impl Forwarder {
    fn emit(&self, event: AgentEvent) {
        if let Err(e) = self.events.send(event) {
            tracing::debug!("agent event dropped, controller is gone: {:?}", e.0);
        }
    }

    fn set_speaking(&mut self, speaking: bool) {
        if self.speaking != speaking {
            self.speaking = speaking;
            self.emit(AgentEvent::ModeChange { speaking });
        }
    }

    /// Returns `false` once the conversation is over.
    fn handle(&mut self, event: ServerEvent) -> bool {
        match event {
            ServerEvent::UserTranscript(data) => {
                let transcript = data.transcript().trim();
                tracing::info!("User said: {:?}", transcript);
                self.set_speaking(false);
                if !transcript.is_empty() {
                    self.emit(AgentEvent::Message(ConversationMessage::user(transcript)));
                }
            }
            ServerEvent::AgentResponse(data) => {
                tracing::info!("Agent said: {:?}", data.response());
                self.emit(AgentEvent::Message(ConversationMessage::agent(data.response())));
            }
            ServerEvent::AgentResponseCorrection(data) => {
                tracing::debug!(
                    "agent response truncated from {:?} to {:?}",
                    data.original(),
                    data.corrected()
                );
            }
            ServerEvent::Audio(data) => {
                if let Some(playback) = self.playback.as_mut() {
                    playback.enqueue(data.audio());
                }
                self.set_speaking(true);
            }
            ServerEvent::Interruption(data) => {
                tracing::debug!("agent interrupted: event_id={:?}", data.event_id());
                if let Some(playback) = self.playback.as_mut() {
                    playback.interrupt();
                }
                self.set_speaking(false);
            }
            ServerEvent::ClientToolCall(data) => {
                tracing::warn!(
                    "agent requested unsupported tool {:?} (call {}, parameters {})",
                    data.tool_name(),
                    data.tool_call_id(),
                    data.parameters()
                );
            }
            ServerEvent::TransportError { message } => {
                self.emit(AgentEvent::Error(message));
            }
            ServerEvent::Close { reason } => {
                tracing::info!("conversation closed: {:?}", reason);
                self.emit(AgentEvent::Disconnect { reason });
                return false;
            }
            ServerEvent::VadScore(data) => {
                tracing::trace!("vad score {:.2}", data.score());
            }
            ServerEvent::ConversationInitiationMetadata(_)
            | ServerEvent::TentativeAgentResponse(_)
            | ServerEvent::Ping(_)
            | ServerEvent::Unknown => {}
        }
        true
    }
}

async fn next_playback_event(
    playback_rx: &mut Option<mpsc::UnboundedReceiver<PlaybackEvent>>,
) -> Option<PlaybackEvent> {
    match playback_rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn forward_events(
    mut server_rx: ServerRx,
    mut forwarder: Forwarder,
    mut playback_rx: Option<mpsc::UnboundedReceiver<PlaybackEvent>>,
) {
    loop {
        tokio::select! {
            received = server_rx.recv() => match received {
                Ok(event) => {
                    if !forwarder.handle(event) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("agent events lagging, skipped {}", skipped);
                }
                Err(RecvError::Closed) => {
                    forwarder.emit(AgentEvent::Disconnect {
                        reason: Some("connection dropped".to_string()),
                    });
                    break;
                }
            },
            Some(PlaybackEvent::Drained) = next_playback_event(&mut playback_rx) => {
                forwarder.set_speaking(false);
            }
        }
    }
}

async fn pump_microphone<C: ConversationClient>(
    mut audio_rx: mpsc::Receiver<Vec<i16>>,
    client: Arc<Mutex<C>>,
) {
    while let Some(chunk) = audio_rx.recv().await {
        if chunk.is_empty() {
            continue;
        }
        let encoded = audio::encode_i16(&chunk);
        if let Err(e) = client.lock().await.send_user_audio(encoded).await {
            tracing::debug!("microphone forwarding stopped: {:#}", e);
            break;
        }
    }
}
