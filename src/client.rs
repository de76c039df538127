use crate::types;
use crate::types::events::server::ConversationInitiationMetadata;
use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

mod config;
mod consts;
mod utils;

pub use config::{Config, ConfigBuilder};

type ClientTx = tokio::sync::mpsc::Sender<Outbound>;
type ServerTx = tokio::sync::broadcast::Sender<types::ServerEvent>;
pub type ServerRx = tokio::sync::broadcast::Receiver<types::ServerEvent>;

/// What the send loop writes to the socket.
enum Outbound {
    Event(types::ClientEvent),
    Close,
}

struct Connection {
    send_handle: tokio::task::JoinHandle<()>,
    recv_handle: tokio::task::JoinHandle<()>,
}

// One conversation with the agent. A new `Client` is connected per conversation.
pub struct Client {
    capacity: usize,
    config: Config,
    c_tx: Option<ClientTx>,
    s_tx: Option<ServerTx>,
    // Subscribed before the receive loop starts so nothing sent right after
    // the metadata is lost.
    first_rx: Option<ServerRx>,
    metadata: Option<ConversationInitiationMetadata>,
    connection: Option<Connection>,
}

impl Client {
    fn new(capacity: usize, config: Config) -> Self {
        Self {
            capacity,
            config,
            c_tx: None,
            s_tx: None,
            first_rx: None,
            metadata: None,
            connection: None,
        }
    }

    async fn connect(&mut self) -> Result<()> {
        if self.c_tx.is_some() {
            return Err(anyhow::anyhow!("already connected"));
        }

        let request = utils::build_request(&self.config)?;
        let (ws_stream, _) = tokio_tungstenite::connect_async(request)
            .await
            .context("failed to open conversation socket")?;

        let (mut write, mut read) = ws_stream.split();

        // The agent accepts the conversation by sending its metadata first.
        let metadata = loop {
            let message = read
                .next()
                .await
                .ok_or_else(|| anyhow::anyhow!("connection closed before the conversation started"))?
                .context("failed to read conversation metadata")?;
            match message {
                Message::Text(text) => match serde_json::from_str::<types::ServerEvent>(&text) {
                    Ok(types::ServerEvent::ConversationInitiationMetadata(event)) => {
                        break event.metadata().clone();
                    }
                    Ok(other) => {
                        tracing::debug!("ignoring event before conversation start: {:?}", other);
                    }
                    Err(e) => {
                        tracing::warn!("failed to deserialize event: {}, text=> {:?}", e, text);
                    }
                },
                Message::Close(reason) => {
                    return Err(anyhow::anyhow!(
                        "agent refused the conversation: {:?}",
                        reason
                    ));
                }
                _ => {}
            }
        };
        tracing::info!(
            "conversation started: id={}, input={:?}, output={:?}",
            metadata.conversation_id(),
            metadata.user_input_audio_format(),
            metadata.agent_output_audio_format()
        );

        let (c_tx, mut c_rx) = tokio::sync::mpsc::channel::<Outbound>(self.capacity);
        let (s_tx, first_rx) = tokio::sync::broadcast::channel(self.capacity);

        self.c_tx = Some(c_tx.clone());
        self.s_tx = Some(s_tx.clone());
        self.first_rx = Some(first_rx);
        self.metadata = Some(metadata);

        let send_handle = tokio::spawn(async move {
            while let Some(outbound) = c_rx.recv().await {
                match outbound {
                    Outbound::Event(event) => match serde_json::to_string(&event) {
                        Ok(text) => {
                            if let Err(e) = write.send(Message::Text(text)).await {
                                tracing::error!("failed to send message: {}", e);
                            }
                        }
                        Err(e) => {
                            tracing::error!("failed to serialize event: {}", e);
                        }
                    },
                    Outbound::Close => {
                        if let Err(e) = write.send(Message::Close(None)).await {
                            tracing::error!("failed to send close frame: {}", e);
                        }
                        break;
                    }
                }
            }
        });

        let pong_tx = c_tx;
        let recv_handle = tokio::spawn(async move {
            let mut close_reason = None;
            while let Some(message) = read.next().await {
                let message = match message {
                    Err(e) => {
                        tracing::error!("failed to read message: {}", e);
                        let _ = s_tx.send(types::ServerEvent::TransportError {
                            message: e.to_string(),
                        });
                        close_reason = Some(e.to_string());
                        break;
                    }
                    Ok(message) => message,
                };
                match message {
                    Message::Text(text) => match serde_json::from_str::<types::ServerEvent>(&text) {
                        Ok(event) => {
                            if let types::ServerEvent::Ping(ping) = &event {
                                answer_ping(&pong_tx, ping.event_id(), ping.ping_ms());
                                continue;
                            }
                            if let Err(e) = s_tx.send(event) {
                                tracing::debug!("no subscriber for event: {}", e);
                            }
                        }
                        Err(e) => {
                            tracing::error!("failed to deserialize event: {}, text=> {:?}", e, text);
                        }
                    },
                    Message::Binary(bin) => {
                        tracing::warn!("unexpected binary message: {} bytes", bin.len());
                    }
                    Message::Close(frame) => {
                        tracing::info!("connection closed: {:?}", frame);
                        close_reason = frame
                            .map(|f| f.reason.to_string())
                            .filter(|reason| !reason.is_empty());
                        break;
                    }
                    _ => {}
                }
            }
            let _ = s_tx.send(types::ServerEvent::Close {
                reason: close_reason,
            });
        });

        self.connection = Some(Connection {
            send_handle,
            recv_handle,
        });
        Ok(())
    }

    /// The id the agent assigned to this conversation.
    pub fn conversation_id(&self) -> Option<&str> {
        self.metadata.as_ref().map(|m| m.conversation_id())
    }

    pub fn metadata(&self) -> Option<&ConversationInitiationMetadata> {
        self.metadata.as_ref()
    }

    pub fn server_events(&mut self) -> Result<ServerRx> {
        if let Some(rx) = self.first_rx.take() {
            return Ok(rx);
        }
        match self.s_tx {
            Some(ref tx) => Ok(tx.subscribe()),
            None => Err(anyhow::anyhow!("not connected yet")),
        }
    }

    async fn send_outbound(&self, outbound: Outbound) -> Result<()> {
        match self.c_tx {
            Some(ref tx) => {
                tx.send(outbound)
                    .await
                    .map_err(|_| anyhow::anyhow!("connection already closed"))?;
                Ok(())
            }
            None => Err(anyhow::anyhow!("not connected yet")),
        }
    }

    pub async fn send_user_audio(&self, audio: types::audio::Base64EncodedAudioBytes) -> Result<()> {
        self.send_outbound(Outbound::Event(types::ClientEvent::user_audio_chunk(audio)))
            .await
    }

    /// Asks the agent to end the conversation and waits for the closing handshake.
    ///
    /// Subscribers always observe a final `close` event, even when the agent
    /// never answers the close frame.
    pub async fn close(&mut self) -> Result<()> {
        self.send_outbound(Outbound::Close).await?;
        let Some(connection) = self.connection.take() else {
            return Ok(());
        };
        let mut recv_handle = connection.recv_handle;
        match tokio::time::timeout(consts::CLOSE_HANDSHAKE_TIMEOUT, &mut recv_handle).await {
            Ok(joined) => {
                joined.context("receive loop panicked")?;
            }
            Err(_) => {
                tracing::warn!("agent did not finish the closing handshake, dropping connection");
                recv_handle.abort();
                if let Some(ref s_tx) = self.s_tx {
                    let _ = s_tx.send(types::ServerEvent::Close {
                        reason: Some("close handshake timed out".to_string()),
                    });
                }
            }
        }
        connection.send_handle.abort();
        self.c_tx = None;
        Ok(())
    }
}

// The agent may ask for the pong to be delayed by `ping_ms`.
fn answer_ping(pong_tx: &ClientTx, event_id: u64, ping_ms: Option<u64>) {
    let pong = Outbound::Event(types::ClientEvent::pong(event_id));
    match ping_ms.filter(|ms| *ms > 0) {
        None => {
            if let Err(e) = pong_tx.try_send(pong) {
                tracing::warn!("failed to queue pong: {}", e);
            }
        }
        Some(ms) => {
            let pong_tx = pong_tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
                if pong_tx.send(pong).await.is_err() {
                    tracing::debug!("connection closed before delayed pong {}", event_id);
                }
            });
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.send_handle.abort();
            connection.recv_handle.abort();
        }
    }
}

pub async fn connect_with_config(capacity: usize, config: Config) -> Result<Client> {
    let mut client = Client::new(capacity, config);
    client.connect().await?;
    Ok(client)
}

pub async fn connect(agent_id: &str) -> Result<Client> {
    let config = Config::new(agent_id);
    connect_with_config(1024, config).await
}
