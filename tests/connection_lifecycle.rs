//! Connection lifecycle against a local WebSocket server

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc::UnboundedReceiver;

use station_link::{
    BackoffPolicy, ConnectionConfig, ConnectionEvent, ConnectionState, EndpointId, Error,
    EndpointDescriptor, EventHub, EventKind, JsonRpcSubscription, ManagerConfig, ManagerStats,
    Payload, StationManager, TaggedEvent,
};

use common::{
    assert_no_events, init_tracing, next_event, refused_port, wait_for, MockStation,
    StalledStation,
};

const SUBSCRIPTION_WIRE: &str = r#"{"<":"","cmd":"rpc","jsonrpc":"2.0","method":"NotificationSubscription","params":{"type":{"UnOkAlarm":true}},"id":1,">":""}"#;

fn fast_config() -> ConnectionConfig {
    ConnectionConfig::default()
        .connect_timeout(Duration::from_secs(2))
        .backoff(BackoffPolicy::Fixed(Duration::from_millis(50)))
        .close_timeout(Duration::from_millis(200))
}

fn manager_with(config: ConnectionConfig) -> (StationManager, UnboundedReceiver<TaggedEvent>) {
    let (hub, rx) = EventHub::channel();
    let manager = StationManager::with_config(ManagerConfig::default().connection(config), hub);
    (manager, rx)
}

#[tokio::test]
async fn test_handshake_precedes_other_frames() {
    init_tracing();
    let mut station = MockStation::start().await;
    let (manager, mut rx) = manager_with(fast_config());
    let id = EndpointId::from("A");

    manager.reconcile(&[station.descriptor("A")]).await;
    wait_for(&mut rx, "A", EventKind::Connected).await;
    assert_eq!(manager.get_state(&id).await, Some(ConnectionState::Open));

    manager.send(&id, json!({"cmd": "ping"})).await.unwrap();
    manager.send(&id, "plain").await.unwrap();

    let first = station.recv().await;
    assert_eq!(first.text, SUBSCRIPTION_WIRE);
    let second = station.recv().await;
    assert_eq!(serde_json::from_str::<Value>(&second.text).unwrap(), json!({"cmd": "ping"}));
    assert_eq!(station.recv().await.text, "plain");

    // Exactly one handshake per open
    station.assert_silent(Duration::from_millis(100)).await;

    manager.close_all().await;
}

#[tokio::test]
async fn test_inbound_frames_in_order() {
    let mut station = MockStation::start().await;
    let (manager, mut rx) = manager_with(fast_config());

    manager.reconcile(&[station.descriptor("A")]).await;
    wait_for(&mut rx, "A", EventKind::Connected).await;
    station.recv().await;

    station.push(r#"{"alarm":{"level":2}}"#);
    station.push("not json");

    let first = next_event(&mut rx).await;
    assert_eq!(
        first.event,
        ConnectionEvent::Message(Payload::Json(json!({"alarm": {"level": 2}})))
    );
    let second = next_event(&mut rx).await;
    assert_eq!(
        second.event,
        ConnectionEvent::Message(Payload::Text("not json".into()))
    );
    assert_eq!(second.endpoint.as_str(), "A");

    let health = manager.health(&EndpointId::from("A")).await.unwrap();
    assert_eq!(health.frames_received, 2);

    manager.close_all().await;
}

#[tokio::test]
async fn test_reconnects_and_resubscribes_after_server_close() {
    let mut station = MockStation::start().await;
    let (manager, mut rx) = manager_with(fast_config());
    let id = EndpointId::from("A");

    manager.reconcile(&[station.descriptor("A")]).await;
    wait_for(&mut rx, "A", EventKind::Connected).await;
    assert_eq!(station.recv().await.conn, 0);

    station.drop_latest();

    let event = next_event(&mut rx).await;
    assert_eq!(event.event.kind(), EventKind::Disconnected);

    wait_for(&mut rx, "A", EventKind::Connected).await;
    let again = station.recv().await;
    assert_eq!(again.conn, 1);
    assert_eq!(again.text, SUBSCRIPTION_WIRE);

    let health = manager.health(&id).await.unwrap();
    assert_eq!(health.reconnect_count, 0);
    assert!(health.is_healthy());
    assert_eq!(station.accepted(), 2);

    manager.close_all().await;
}

#[tokio::test]
async fn test_manual_resubscribe() {
    let mut station = MockStation::start().await;
    let (manager, mut rx) = manager_with(fast_config());
    let id = EndpointId::from("A");

    manager.reconcile(&[station.descriptor("A")]).await;
    wait_for(&mut rx, "A", EventKind::Connected).await;
    station.recv().await;

    manager.resubscribe(&id).await.unwrap();
    let resent = station.recv().await;
    assert_eq!(resent.text, SUBSCRIPTION_WIRE);

    assert_eq!(manager.resubscribe_all().await, 1);
    station.recv().await;

    // Same socket throughout
    assert_eq!(station.accepted(), 1);

    manager.close_all().await;
}

#[tokio::test]
async fn test_retry_cap_then_manual_reconnect() {
    let config = fast_config().max_attempts(2);
    let (manager, mut rx) = manager_with(config);
    let id = EndpointId::from("A");

    manager
        .reconcile(&[EndpointDescriptor::new("A", "127.0.0.1", refused_port())])
        .await;

    // Three failed attempts: two retries armed, then give up
    let mut kinds = Vec::new();
    loop {
        let event = next_event(&mut rx).await;
        let kind = event.event.kind();
        kinds.push(kind);
        if let ConnectionEvent::ReconnectFailed { attempts } = event.event {
            assert_eq!(attempts, 3);
            break;
        }
    }
    assert_eq!(
        kinds,
        vec![
            EventKind::Error,
            EventKind::Disconnected,
            EventKind::Error,
            EventKind::Disconnected,
            EventKind::Error,
            EventKind::Disconnected,
            EventKind::ReconnectFailed,
        ]
    );

    // No automatic attempts once exhausted
    assert_no_events(&mut rx, Duration::from_millis(300)).await;
    let health = manager.health(&id).await.unwrap();
    assert_eq!(health.state, ConnectionState::Reconnecting);
    assert!(matches!(
        manager.stats().await,
        ManagerStats { exhausted: 1, .. }
    ));

    assert!(manager.reconnect(&id).await.unwrap());
    let event = next_event(&mut rx).await;
    assert!(matches!(event.event, ConnectionEvent::Error(Error::ConnectFailed { .. })));

    manager.close_all().await;
}

#[tokio::test]
async fn test_send_when_not_open_writes_nothing() {
    let mut station = MockStation::start().await;
    let (manager, mut rx) = manager_with(fast_config());
    let id = EndpointId::from("A");

    manager.reconcile(&[station.descriptor("A")]).await;
    wait_for(&mut rx, "A", EventKind::Connected).await;
    station.recv().await;

    manager.close_connection(&id).await.unwrap();
    let err = manager.send(&id, "late").await.unwrap_err();
    assert!(matches!(err, Error::Registry(_)));

    let b = EndpointId::from("B");
    manager
        .reconcile(&[EndpointDescriptor::new("B", "127.0.0.1", refused_port())])
        .await;
    assert_eq!(
        manager.send(&b, "early").await.unwrap_err(),
        Error::NotConnected(b.clone())
    );

    station.assert_silent(Duration::from_millis(100)).await;
    manager.close_all().await;
}

#[tokio::test]
async fn test_close_during_backoff_is_final() {
    let config = fast_config().backoff(BackoffPolicy::Fixed(Duration::from_secs(30)));
    let (manager, mut rx) = manager_with(config);
    let id = EndpointId::from("A");

    manager
        .reconcile(&[EndpointDescriptor::new("A", "127.0.0.1", refused_port())])
        .await;
    wait_for(&mut rx, "A", EventKind::Disconnected).await;

    // The timer is armed right after the Disconnected event
    let armed = tokio::time::timeout(common::TIMEOUT, async {
        loop {
            let health = manager.health(&id).await.unwrap();
            if health.next_retry_in.is_some() {
                return health.next_retry_in;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(armed, Some(Duration::from_secs(30)));

    manager.close_connection(&id).await.unwrap();
    wait_for(&mut rx, "A", EventKind::Closed).await;
    assert_no_events(&mut rx, Duration::from_millis(200)).await;
}

#[tokio::test]
async fn test_probe_sends_handshake() {
    let mut station = MockStation::start().await;

    let report = station_link::probe(
        &station.descriptor("A"),
        &JsonRpcSubscription::default(),
        Duration::from_secs(2),
    )
    .await;

    assert!(report.success(), "{report}");
    let frame = station.recv().await;
    assert_eq!(frame.text, SUBSCRIPTION_WIRE);
}

/// Queue enough data that writes to a station that never reads stall
async fn fill_socket(manager: &StationManager, id: &EndpointId) {
    let frame = "x".repeat(1 << 20);
    for _ in 0..64 {
        manager.send(id, frame.clone()).await.unwrap();
    }
    // Let the driver block on the write
    tokio::time::sleep(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn test_close_abandons_stalled_write() {
    let station = StalledStation::start().await;
    let config = fast_config().write_timeout(Duration::from_secs(60));
    let (manager, mut rx) = manager_with(config);
    let id = EndpointId::from("A");

    manager.reconcile(&[station.descriptor("A")]).await;
    wait_for(&mut rx, "A", EventKind::Connected).await;
    fill_socket(&manager, &id).await;
    assert_eq!(manager.get_state(&id).await, Some(ConnectionState::Open));

    let closed = tokio::time::timeout(Duration::from_secs(2), manager.close_connection(&id)).await;
    assert!(matches!(closed, Ok(Ok(()))), "close blocked on a stalled write");

    wait_for(&mut rx, "A", EventKind::Closed).await;
    assert!(!manager.has_connection(&id).await);
}

#[tokio::test]
async fn test_stalled_write_times_out_and_reconnects() {
    let station = StalledStation::start().await;
    let config = fast_config().write_timeout(Duration::from_secs(1));
    let (manager, mut rx) = manager_with(config);
    let id = EndpointId::from("A");

    manager.reconcile(&[station.descriptor("A")]).await;
    wait_for(&mut rx, "A", EventKind::Connected).await;
    fill_socket(&manager, &id).await;

    let event = wait_for(&mut rx, "A", EventKind::Error).await;
    match event.event {
        ConnectionEvent::Error(Error::Transport { reason, .. }) => {
            assert!(reason.contains("timed out"), "{reason}");
        }
        other => panic!("unexpected event: {other:?}"),
    }
    wait_for(&mut rx, "A", EventKind::Disconnected).await;
    wait_for(&mut rx, "A", EventKind::Connected).await;

    manager.close_all().await;
}

#[tokio::test]
async fn test_other_ids_stay_responsive_during_removal() {
    let stalled = StalledStation::start().await;
    let mut station = MockStation::start().await;
    let config = fast_config().write_timeout(Duration::from_secs(60));
    let (manager, mut rx) = manager_with(config);
    let manager = Arc::new(manager);
    let a = EndpointId::from("A");
    let b = EndpointId::from("B");

    manager
        .reconcile(&[stalled.descriptor("A"), station.descriptor("B")])
        .await;
    let mut connected = Vec::new();
    while connected.len() < 2 {
        let event = next_event(&mut rx).await;
        if event.event.kind() == EventKind::Connected {
            connected.push(event.endpoint);
        }
    }
    assert_eq!(station.recv().await.text, SUBSCRIPTION_WIRE);
    fill_socket(&manager, &a).await;

    let removal = {
        let manager = Arc::clone(&manager);
        let a = a.clone();
        tokio::spawn(async move { manager.close_connection(&a).await })
    };

    let prompt = Duration::from_millis(500);
    let state = tokio::time::timeout(prompt, manager.get_state(&b)).await.unwrap();
    assert_eq!(state, Some(ConnectionState::Open));
    let sent = tokio::time::timeout(prompt, manager.send(&b, "during removal"))
        .await
        .unwrap();
    assert!(sent.is_ok());
    assert_eq!(station.recv().await.text, "during removal");

    let removed = tokio::time::timeout(Duration::from_secs(2), removal)
        .await
        .unwrap()
        .unwrap();
    assert!(removed.is_ok());
    assert_eq!(manager.connection_count().await, 1);

    manager.close_all().await;
}
