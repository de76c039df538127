//! Drives `Client` against a local socket standing in for the agent.

use convai_realtime::types::ServerEvent;
use convai_realtime::{connect_with_config, Config};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

fn local_config(addr: std::net::SocketAddr) -> Config {
    Config::builder("agent-1")
        .with_base_url(&format!("ws://{}", addr))
        .without_api_key()
        .build()
}

/// Accepts one conversation, pings the client, greets it once the pong
/// arrives and returns every client message until the socket closes.
async fn scripted_agent(listener: TcpListener) -> Vec<Value> {
    let (stream, _) = listener.accept().await.unwrap();
    let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

    let metadata = json!({
        "type": "conversation_initiation_metadata",
        "conversation_initiation_metadata_event": {
            "conversation_id": "conv_test",
            "agent_output_audio_format": "pcm_16000",
            "user_input_audio_format": "pcm_16000"
        }
    });
    ws.send(Message::Text(metadata.to_string())).await.unwrap();
    let ping = json!({ "type": "ping", "ping_event": { "event_id": 7 } });
    ws.send(Message::Text(ping.to_string())).await.unwrap();

    let mut received = Vec::new();
    while let Some(Ok(message)) = ws.next().await {
        if let Message::Text(text) = message {
            let value: Value = serde_json::from_str(&text).unwrap();
            if value["type"] == "pong" {
                let greeting = json!({
                    "type": "agent_response",
                    "agent_response_event": { "agent_response": "Hi, I need to book two cleanings." }
                });
                ws.send(Message::Text(greeting.to_string())).await.unwrap();
            }
            received.push(value);
        }
    }
    received
}

#[tokio::test]
async fn test_conversation_round_trip() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let agent = tokio::spawn(scripted_agent(listener));

    let mut client = connect_with_config(16, local_config(addr)).await.unwrap();
    assert_eq!(client.conversation_id(), Some("conv_test"));
    let mut events = client.server_events().unwrap();

    // The ping is answered internally and never reaches subscribers.
    let first = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .unwrap()
        .unwrap();
    match first {
        ServerEvent::AgentResponse(response) => {
            assert_eq!(response.response(), "Hi, I need to book two cleanings.")
        }
        other => panic!("unexpected event: {:?}", other),
    }

    client.send_user_audio("AAAA".to_string()).await.unwrap();
    client.close().await.unwrap();

    let last = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(last, ServerEvent::Close { .. }));

    let received = agent.await.unwrap();
    assert_eq!(
        received,
        vec![
            json!({ "type": "pong", "event_id": 7 }),
            json!({ "user_audio_chunk": "AAAA" }),
        ]
    );
}

#[tokio::test]
async fn test_conversation_refused_before_metadata() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let _ = ws.close(None).await;
    });

    let result = connect_with_config(16, local_config(addr)).await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_pong_waits_for_requested_delay() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let agent = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let metadata = json!({
            "type": "conversation_initiation_metadata",
            "conversation_initiation_metadata_event": {
                "conversation_id": "conv_delay",
                "agent_output_audio_format": "pcm_16000",
                "user_input_audio_format": "pcm_16000"
            }
        });
        ws.send(Message::Text(metadata.to_string())).await.unwrap();
        let ping = json!({ "type": "ping", "ping_event": { "event_id": 3, "ping_ms": 200 } });
        ws.send(Message::Text(ping.to_string())).await.unwrap();
        let sent_at = tokio::time::Instant::now();

        while let Some(Ok(message)) = ws.next().await {
            if let Message::Text(text) = message {
                let value: Value = serde_json::from_str(&text).unwrap();
                return (value, sent_at.elapsed());
            }
        }
        panic!("socket closed before the pong");
    });

    let _client = connect_with_config(16, local_config(addr)).await.unwrap();

    let (pong, elapsed) = tokio::time::timeout(Duration::from_secs(2), agent)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pong, json!({ "type": "pong", "event_id": 3 }));
    assert!(elapsed >= Duration::from_millis(200), "pong after {:?}", elapsed);
}
