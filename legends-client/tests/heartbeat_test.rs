//! Heartbeat integration tests

mod common;

use common::{next_peer, MockConnector, Recorder, Seen};
use legends_client::{ClientBuilder, Frame};
use std::time::Duration;

const URL: &str = "ws://mock.test/ws/match/m_demo_1";

fn ping() -> Frame {
    Frame::Text(r#"{"type":"ping"}"#.into())
}

fn builder() -> ClientBuilder {
    ClientBuilder::new(URL).heartbeat_interval(Some(Duration::from_millis(1000)))
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_every_interval_while_open() {
    let (connector, mut peers) = MockConnector::accepting();
    let (recorder, mut seen) = Recorder::new();
    let client = builder().connector(connector).handler(recorder).build().unwrap();

    client.connect();
    assert_eq!(seen.next().await, Seen::Open);
    let peer = next_peer(&mut peers).await;

    tokio::time::sleep(Duration::from_millis(3500)).await;

    assert_eq!(peer.sent(), vec![ping(), ping(), ping()]);
    let times = peer.sent_times();
    assert_eq!(times[1] - times[0], Duration::from_millis(1000));
    assert_eq!(times[2] - times[1], Duration::from_millis(1000));
}

#[tokio::test(start_paused = true)]
async fn test_no_heartbeat_when_disabled() {
    let (connector, mut peers) = MockConnector::accepting();
    let (recorder, mut seen) = Recorder::new();
    let client = ClientBuilder::new(URL)
        .heartbeat_interval(None)
        .connector(connector)
        .handler(recorder)
        .build()
        .unwrap();

    client.connect();
    assert_eq!(seen.next().await, Seen::Open);
    let peer = next_peer(&mut peers).await;

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(peer.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_string_heartbeat_sent_verbatim() {
    let (connector, mut peers) = MockConnector::accepting();
    let (recorder, mut seen) = Recorder::new();
    let client = builder()
        .heartbeat_payload("ping")
        .connector(connector)
        .handler(recorder)
        .build()
        .unwrap();

    client.connect();
    assert_eq!(seen.next().await, Seen::Open);
    let peer = next_peer(&mut peers).await;

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(peer.sent(), vec![Frame::Text("ping".into())]);
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_stops_when_connection_closes() {
    let (connector, mut peers) = MockConnector::accepting();
    let (recorder, mut seen) = Recorder::new();
    let client = builder()
        .auto_reconnect(false)
        .connector(connector)
        .handler(recorder)
        .build()
        .unwrap();

    client.connect();
    assert_eq!(seen.next().await, Seen::Open);
    let peer = next_peer(&mut peers).await;

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(peer.sent().len(), 1);

    peer.close(1000, "");
    assert!(matches!(seen.next().await, Seen::Close(_)));

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(peer.sent().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_failure_keeps_timer_running() {
    let (connector, mut peers) = MockConnector::accepting();
    let (recorder, mut seen) = Recorder::new();
    let client = builder().connector(connector).handler(recorder).build().unwrap();

    client.connect();
    assert_eq!(seen.next().await, Seen::Open);
    let peer = next_peer(&mut peers).await;
    peer.fail_sends(true);

    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(
        seen.drain(),
        vec![Seen::Error("websocket".into()), Seen::Error("websocket".into())]
    );
    assert!(client.is_open());

    // Once sends succeed again the next tick goes out
    peer.fail_sends(false);
    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(peer.sent(), vec![ping()]);
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_restarts_on_new_connection() {
    let (connector, mut peers) = MockConnector::accepting();
    let (recorder, mut seen) = Recorder::new();
    let client = builder()
        .reconnect_delay(Duration::from_millis(250))
        .connector(connector)
        .handler(recorder)
        .build()
        .unwrap();

    client.connect();
    assert_eq!(seen.next().await, Seen::Open);
    let first = next_peer(&mut peers).await;

    tokio::time::sleep(Duration::from_millis(1500)).await;
    first.fail("reset");
    seen.until(|s| *s == Seen::Open).await;
    let second = next_peer(&mut peers).await;
    let opened_at = tokio::time::Instant::now();

    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(first.sent().len(), 1);
    assert_eq!(second.sent().len(), 2);
    assert_eq!(second.sent_times()[0] - opened_at, Duration::from_millis(1000));
}
