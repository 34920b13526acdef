//! ---
//! radar_section: "04-ingest-runtime"
//! radar_subsection: "integration-tests"
//! radar_type: "source"
//! radar_scope: "code"
//! radar_description: "End-to-end receiver behaviour over loopback UDP."
//! radar_version: "v0.0.0-prealpha"
//! radar_owner: "tbd"
//! ---
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use radar_ingest::{MessageHandler, ReceiverState, UdpIngest};
use radar_metrics::prometheus::Registry;
use radar_metrics::IngestMetrics;
use radar_msg::{MessageKind, ParsedMessage};
use serde_json::json;
use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout, Instant};

type Seen = Arc<Mutex<Vec<ParsedMessage>>>;

fn recorder() -> (Seen, Arc<dyn MessageHandler>) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let handler: Arc<dyn MessageHandler> = Arc::new(move |message: ParsedMessage| {
        sink.lock().unwrap().push(message);
    });
    (seen, handler)
}

fn any_local() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

fn track(id: u64) -> serde_json::Value {
    json!({
        "ts": "2024-05-01T12:00:00Z",
        "id": id,
        "range_m": 1500.0 + id as f64,
        "az_deg": -20.0,
        "el_deg": 4.0,
        "vr_mps": 12.0,
        "snr_db": 25.0
    })
}

fn health() -> serde_json::Value {
    json!({
        "ts": "2024-05-01T12:00:00Z",
        "radar_mode": "OPERATIONAL",
        "temperature_c": 45.0,
        "supply_v": 12.2,
        "cpu_load_pct": 30.0
    })
}

async fn wait_for<F: Fn() -> bool>(condition: F) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        sleep(Duration::from_millis(10)).await;
    }
}

async fn send_json(client: &UdpSocket, target: SocketAddr, value: &serde_json::Value) {
    let bytes = serde_json::to_vec(value).unwrap();
    client.send_to(&bytes, target).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn tracks_and_health_reach_handler_once_each() {
    let registry = Registry::new();
    let metrics = IngestMetrics::register(&registry).unwrap();
    let (seen, handler) = recorder();
    let ingest = UdpIngest::bind(any_local(), handler, metrics.clone())
        .await
        .unwrap()
        .spawn();
    let target = ingest.local_addr();
    let client = UdpSocket::bind(any_local()).await.unwrap();

    const TRACKS: u64 = 20;
    const HEALTH: u64 = 5;
    for id in 0..TRACKS {
        send_json(&client, target, &track(id)).await;
    }
    for _ in 0..HEALTH {
        send_json(&client, target, &health()).await;
    }

    wait_for(|| seen.lock().unwrap().len() as u64 == TRACKS + HEALTH).await;

    let seen = seen.lock().unwrap();
    let tracks = seen.iter().filter(|m| m.kind() == MessageKind::Track).count() as u64;
    let reports = seen.iter().filter(|m| m.kind() == MessageKind::Health).count() as u64;
    assert_eq!(tracks, TRACKS);
    assert_eq!(reports, HEALTH);

    let counts = metrics.snapshot();
    assert_eq!(counts.received, TRACKS + HEALTH);
    assert_eq!(counts.failed(), 0);
    drop(seen);
    ingest.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn malformed_datagram_is_counted_and_skipped() {
    let registry = Registry::new();
    let metrics = IngestMetrics::register(&registry).unwrap();
    let (seen, handler) = recorder();
    let ingest = UdpIngest::bind(any_local(), handler, metrics.clone())
        .await
        .unwrap()
        .spawn();
    let target = ingest.local_addr();
    let client = UdpSocket::bind(any_local()).await.unwrap();

    client
        .send_to(br#"{"ts": "2024-05-01T12:00:00Z", "id": 3, "range"#, target)
        .await
        .unwrap();
    wait_for(|| metrics.failed() == 1).await;

    let counts = metrics.snapshot();
    assert_eq!(counts.received, 1);
    assert_eq!(counts.malformed, 1);
    assert!(seen.lock().unwrap().is_empty());

    // The loop keeps serving after a bad datagram.
    send_json(&client, target, &track(9)).await;
    wait_for(|| seen.lock().unwrap().len() == 1).await;
    assert_eq!(metrics.snapshot().received, 2);
    assert!(ingest.is_listening());
    ingest.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn invalid_frame_is_rejected_whole() {
    let registry = Registry::new();
    let metrics = IngestMetrics::register(&registry).unwrap();
    let (seen, handler) = recorder();
    let ingest = UdpIngest::bind(any_local(), handler, metrics.clone())
        .await
        .unwrap()
        .spawn();
    let target = ingest.local_addr();
    let client = UdpSocket::bind(any_local()).await.unwrap();

    let mut bad = track(2);
    bad["az_deg"] = json!(181);
    send_json(&client, target, &json!({ "tracks": [track(1), bad] })).await;
    send_json(&client, target, &json!({ "tracks": [track(3), track(4)] })).await;

    wait_for(|| metrics.snapshot().invalid == 1 && seen.lock().unwrap().len() == 1).await;
    let seen = seen.lock().unwrap();
    match &seen[0] {
        ParsedMessage::Frame(frame) => {
            let ids: Vec<u64> = frame.tracks().iter().map(|t| t.id()).collect();
            assert_eq!(ids, vec![3, 4]);
        }
        other => panic!("expected frame, got {other:?}"),
    }
    drop(seen);
    ingest.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn panicking_handler_only_loses_its_datagram() {
    let registry = Registry::new();
    let metrics = IngestMetrics::register(&registry).unwrap();
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let handler: Arc<dyn MessageHandler> = Arc::new(move |message: ParsedMessage| {
        if let ParsedMessage::Track(track) = &message {
            if track.id() == 13 {
                panic!("handler rejects track 13");
            }
        }
        sink.lock().unwrap().push(message);
    });
    let ingest = UdpIngest::bind(any_local(), handler, metrics.clone())
        .await
        .unwrap()
        .spawn();
    let target = ingest.local_addr();
    let client = UdpSocket::bind(any_local()).await.unwrap();

    send_json(&client, target, &track(13)).await;
    wait_for(|| metrics.snapshot().received == 1).await;
    send_json(&client, target, &track(14)).await;
    wait_for(|| seen.lock().unwrap().len() == 1).await;

    assert!(ingest.is_listening());
    assert_eq!(metrics.failed(), 0);
    ingest.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_releases_socket_promptly() {
    let registry = Registry::new();
    let metrics = IngestMetrics::register(&registry).unwrap();
    let (_, handler) = recorder();
    let ingest = UdpIngest::bind(any_local(), handler.clone(), metrics.clone())
        .await
        .unwrap()
        .spawn();
    let addr = ingest.local_addr();
    assert_eq!(ingest.state(), ReceiverState::Listening);

    timeout(Duration::from_secs(1), ingest.shutdown())
        .await
        .expect("shutdown should not block on recv")
        .unwrap();

    // The port is free again once the loop has returned.
    let rebound = UdpIngest::bind(addr, handler, metrics).await;
    assert!(rebound.is_ok());
}
