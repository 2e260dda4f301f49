//! End-to-end tests over real WebSockets
//!
//! The client dials a `legends-mock` server bound to an ephemeral port on
//! localhost, so these run on the wall clock.

mod common;

use common::{Recorder, Seen};
use legends_client::{ClientBuilder, ConnectionState, InboundEvent, RealtimeClient};
use legends_core::{EventKind, CLOSE_GOING_AWAY, CLOSE_NORMAL};
use legends_mock::{MatchScript, MockMatchServer, MockServerHandle};
use serde_json::json;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

async fn start_server(script: MatchScript) -> MockServerHandle {
    MockMatchServer::builder()
        .bind(([127, 0, 0, 1], 0))
        .script(script)
        .build()
        .await
        .unwrap()
        .spawn()
}

fn client_for(server: &MockServerHandle, recorder: Recorder) -> RealtimeClient {
    ClientBuilder::new(server.match_url("m_net", "p_net"))
        .handler(recorder)
        .heartbeat_interval(None)
        .reconnect_delay(Duration::from_millis(50))
        .max_reconnect_delay(Duration::from_millis(200))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_receives_scripted_match() {
    let server = start_server(MatchScript::demo().scaled(0.01)).await;
    let (recorder, mut seen) = Recorder::new();
    let client = client_for(&server, recorder);

    client.connect();
    assert_eq!(seen.next().await, Seen::Open);

    let mut kinds = Vec::new();
    while kinds.len() < 6 {
        if let Seen::Event(event @ InboundEvent::Json(_)) = seen.next().await {
            let envelope = event.envelope().unwrap();
            assert_eq!(envelope.match_id, "m_net");
            kinds.push(envelope.known_kind().unwrap());
        }
    }

    assert_eq!(kinds.first(), Some(&EventKind::MatchStart));
    assert_eq!(kinds.last(), Some(&EventKind::TechnicalLoss));
    assert!(client.is_open());
    client.close();
}

#[tokio::test]
async fn test_sent_messages_reach_server() {
    let server = start_server(MatchScript::new()).await;
    let (recorder, mut seen) = Recorder::new();
    let client = client_for(&server, recorder);

    client.connect();
    assert_eq!(seen.next().await, Seen::Open);

    client
        .send_json(&json!({"type": "play_card", "cardId": "c_1"}))
        .unwrap();
    client.send("plain text");

    assert!(server.wait_for_received(2, WAIT).await);
    let received = server.received();
    assert_eq!(received[0].message_type(), Some("play_card"));
    assert_eq!(received[0].match_id, "m_net");
    assert_eq!(received[0].player_id, "p_net");
    assert_eq!(
        received[1].body,
        legends_mock::MessageBody::Text("plain text".into())
    );
}

#[tokio::test]
async fn test_heartbeat_reaches_server() {
    let server = start_server(MatchScript::new()).await;
    let (recorder, mut seen) = Recorder::new();
    let client = ClientBuilder::new(server.match_url("m_net", "p_net"))
        .handler(recorder)
        .heartbeat_interval(Some(Duration::from_millis(50)))
        .build()
        .unwrap();

    client.connect();
    assert_eq!(seen.next().await, Seen::Open);

    assert!(server.wait_for_received(2, WAIT).await);
    assert!(server
        .received()
        .iter()
        .all(|message| message.message_type() == Some("ping")));
}

#[tokio::test]
async fn test_reconnects_after_server_disconnect() {
    let server = start_server(MatchScript::new()).await;
    let (recorder, mut seen) = Recorder::new();
    let client = client_for(&server, recorder);

    client.connect();
    assert_eq!(seen.next().await, Seen::Open);
    assert!(server.wait_for_connections(1, WAIT).await);

    server.disconnect_all();

    match seen.until(|s| matches!(s, Seen::Close(_))).await {
        Seen::Close(info) => {
            assert_eq!(info.code, CLOSE_GOING_AWAY);
            assert_eq!(info.reason, "server restart");
        }
        other => panic!("expected close, got {:?}", other),
    }

    seen.until(|s| *s == Seen::Open).await;
    assert!(server.wait_for_connections(2, WAIT).await);
    assert!(client.is_open());
}

#[tokio::test]
async fn test_close_completes_handshake() {
    let server = start_server(MatchScript::new()).await;
    let (recorder, mut seen) = Recorder::new();
    let client = client_for(&server, recorder);

    client.connect();
    assert_eq!(seen.next().await, Seen::Open);

    client.close();

    match seen.next().await {
        Seen::Close(info) => {
            assert_eq!(info.code, CLOSE_NORMAL);
            assert!(info.was_clean);
        }
        other => panic!("expected close, got {:?}", other),
    }

    let mut state = client.state_receiver();
    tokio::time::timeout(
        WAIT,
        state.wait_for(|s| *s == ConnectionState::ManuallyClosed),
    )
    .await
    .unwrap()
    .unwrap();

    // No reconnect follows a manual close
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(server.total_connections(), 1);
}

#[tokio::test]
async fn test_unreachable_server_keeps_retrying() {
    // Bind then drop, so the port is very likely closed
    let addr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let (recorder, mut seen) = Recorder::new();
    let client = ClientBuilder::new(format!("ws://{}/ws/match/m_1", addr))
        .handler(recorder)
        .heartbeat_interval(None)
        .reconnect_delay(Duration::from_millis(20))
        .build()
        .unwrap();

    client.connect();

    assert_eq!(seen.next().await, Seen::Error("websocket".into()));
    assert!(matches!(seen.next().await, Seen::Close(info) if info.code == 1006));

    let mut state = client.state_receiver();
    tokio::time::timeout(
        WAIT,
        state.wait_for(|s| matches!(s, ConnectionState::ReconnectScheduled { attempt, .. } if *attempt >= 2)),
    )
    .await
    .unwrap()
    .unwrap();

    client.close();
}
