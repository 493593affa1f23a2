//! Channel adapter lifecycle against the mock transport, in virtual time.

use std::sync::Arc;
use std::time::Duration;

use platter_protocol::mock::{MockTransport, OpenBehavior};
use platter_protocol::{Channel, ChannelConfig, ChannelEvent, ProtocolError};
use platter_types::{ActuatorId, Direction, InboundEvent, MotorCommand, OutboundEvent};
use tokio::sync::mpsc;

async fn next(events: &mut mpsc::Receiver<ChannelEvent>) -> ChannelEvent {
    tokio::time::timeout(Duration::from_secs(120), events.recv())
        .await
        .expect("timed out waiting for channel event")
        .expect("channel event stream ended")
}

fn motor(id: u8, speed: u8) -> OutboundEvent {
    OutboundEvent::MotorControl(MotorCommand {
        motor_id: ActuatorId::new(id).unwrap(),
        speed,
        direction: Direction::Forward,
        brake: 0,
    })
}

#[tokio::test(start_paused = true)]
async fn open_deliver_and_reconnect_after_loss() {
    let (transport, mut servers) = MockTransport::new();
    let (_handle, mut events) = Channel::connect(Arc::new(transport), ChannelConfig::default());

    let server = servers.recv().await.unwrap();
    assert_eq!(next(&mut events).await, ChannelEvent::Open);

    server
        .send(&InboundEvent::QueueUpdate { queue_length: 2 })
        .await;
    assert_eq!(
        next(&mut events).await,
        ChannelEvent::Message(InboundEvent::QueueUpdate { queue_length: 2 })
    );

    drop(server);
    assert_eq!(next(&mut events).await, ChannelEvent::Close);
    assert_eq!(next(&mut events).await, ChannelEvent::Reconnecting(1));
    assert_eq!(next(&mut events).await, ChannelEvent::Reconnected);
    assert_eq!(next(&mut events).await, ChannelEvent::Open);
    assert!(servers.recv().await.is_some());
}

#[tokio::test(start_paused = true)]
async fn publishes_are_ordered_and_dropped_when_closed() {
    let (transport, mut servers) = MockTransport::new();
    transport.script([OpenBehavior::Refuse("refused".to_string())]);
    let (handle, mut events) = Channel::connect(Arc::new(transport), ChannelConfig::default());

    assert!(matches!(next(&mut events).await, ChannelEvent::Error(_)));
    assert!(!handle.is_open());
    assert!(matches!(
        handle.publish(&motor(1, 10)),
        Err(ProtocolError::NotConnected)
    ));

    assert_eq!(next(&mut events).await, ChannelEvent::Reconnecting(1));
    assert_eq!(next(&mut events).await, ChannelEvent::Reconnected);
    assert_eq!(next(&mut events).await, ChannelEvent::Open);
    assert!(handle.is_open());

    handle.publish(&motor(1, 10)).unwrap();
    handle.publish(&motor(2, 20)).unwrap();
    handle.publish(&OutboundEvent::StopAll {}).unwrap();

    let mut server = servers.recv().await.unwrap();
    assert_eq!(server.recv().await, Some(motor(1, 10)));
    assert_eq!(server.recv().await, Some(motor(2, 20)));
    assert_eq!(server.recv().await, Some(OutboundEvent::StopAll {}));
}

#[tokio::test(start_paused = true)]
async fn undecodable_frames_are_skipped() {
    let (transport, mut servers) = MockTransport::new();
    let (_handle, mut events) = Channel::connect(Arc::new(transport), ChannelConfig::default());
    let server = servers.recv().await.unwrap();
    assert_eq!(next(&mut events).await, ChannelEvent::Open);

    server.send_raw("{{{").await;
    server.send_raw(r#"{"event":"reboot","data":{}}"#).await;
    server.send(&InboundEvent::AllStopped {}).await;

    assert_eq!(
        next(&mut events).await,
        ChannelEvent::Message(InboundEvent::AllStopped {})
    );
}

#[tokio::test(start_paused = true)]
async fn missing_transport_is_terminal() {
    let (transport, _servers) = MockTransport::new();
    transport.never_ready();
    let probe = transport.clone();
    let (handle, mut events) = Channel::connect(Arc::new(transport), ChannelConfig::default());

    assert_eq!(next(&mut events).await, ChannelEvent::Unavailable);
    assert!(events.recv().await.is_none());
    assert_eq!(probe.readiness_checks(), 51);
    assert_eq!(probe.opens(), 0);
    assert!(matches!(
        handle.publish(&OutboundEvent::StopAll {}),
        Err(ProtocolError::NotConnected)
    ));
}

#[tokio::test(start_paused = true)]
async fn late_transport_connects_after_polling() {
    let (transport, mut servers) = MockTransport::new();
    transport.not_ready_for(5);
    let probe = transport.clone();
    let (_handle, mut events) = Channel::connect(Arc::new(transport), ChannelConfig::default());

    assert_eq!(next(&mut events).await, ChannelEvent::Open);
    assert_eq!(probe.readiness_checks(), 6);
    assert!(servers.recv().await.is_some());
}

#[tokio::test(start_paused = true)]
async fn watchdog_reports_and_retries_once() {
    let (transport, mut servers) = MockTransport::new();
    transport.script([OpenBehavior::Hang]);
    let config = ChannelConfig {
        attempt_timeout: Duration::from_secs(30),
        reconnection_delay: Duration::from_secs(5),
        ..ChannelConfig::default()
    };
    let (_handle, mut events) = Channel::connect(Arc::new(transport), config);

    let started = tokio::time::Instant::now();
    assert_eq!(next(&mut events).await, ChannelEvent::ConnectionFailed);
    assert!(started.elapsed() >= Duration::from_secs(10));
    assert!(started.elapsed() < Duration::from_secs(11));

    assert!(matches!(next(&mut events).await, ChannelEvent::Error(_)));
    assert_eq!(next(&mut events).await, ChannelEvent::Reconnecting(1));
    // The pending watchdog kick cuts the backoff short.
    assert_eq!(next(&mut events).await, ChannelEvent::Reconnected);
    assert!(started.elapsed() >= Duration::from_secs(30));
    assert!(started.elapsed() < Duration::from_secs(31));
    assert_eq!(next(&mut events).await, ChannelEvent::Open);
    assert!(servers.recv().await.is_some());
}

#[tokio::test(start_paused = true)]
async fn exhausted_budget_gets_exactly_one_watchdog_attempt() {
    let (transport, _servers) = MockTransport::new();
    transport.script((0..10).map(|_| OpenBehavior::Refuse("refused".to_string())));
    let probe = transport.clone();
    let config = ChannelConfig {
        reconnection_attempts: 2,
        reconnection_delay: Duration::from_millis(100),
        ..ChannelConfig::default()
    };
    let (_handle, mut events) = Channel::connect(Arc::new(transport), config);

    assert!(matches!(next(&mut events).await, ChannelEvent::Error(_)));
    assert_eq!(next(&mut events).await, ChannelEvent::Reconnecting(1));
    assert!(matches!(next(&mut events).await, ChannelEvent::Error(_)));
    assert_eq!(next(&mut events).await, ChannelEvent::Reconnecting(2));
    assert!(matches!(next(&mut events).await, ChannelEvent::Error(_)));
    assert_eq!(probe.opens(), 3);

    assert_eq!(next(&mut events).await, ChannelEvent::ConnectionFailed);
    assert!(matches!(next(&mut events).await, ChannelEvent::Error(_)));
    assert_eq!(probe.opens(), 4);

    let quiet = tokio::time::timeout(Duration::from_secs(600), events.recv()).await;
    assert!(quiet.is_err(), "no further attempts after the watchdog retry");
    assert_eq!(probe.opens(), 4);
}

#[tokio::test(start_paused = true)]
async fn close_ends_the_event_stream() {
    let (transport, mut servers) = MockTransport::new();
    let (handle, mut events) = Channel::connect(Arc::new(transport), ChannelConfig::default());
    let _server = servers.recv().await.unwrap();
    assert_eq!(next(&mut events).await, ChannelEvent::Open);

    handle.close();
    assert!(events.recv().await.is_none());
    assert!(!handle.is_open());
}
