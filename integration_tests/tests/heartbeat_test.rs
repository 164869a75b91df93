use std::{sync::Arc, time::Duration};

use assertables::{assert_ge, assert_le, assert_lt};
use integration_tests::prelude::*;
use integration_tests::utils::TEST_CHANNEL;
use serial_test::serial;
use wustsat_common::{constants::object_ids::HEARTBEAT_PRODUCER_TIME, nmt::NmtCommandSpecifier};
use wustsat_node::object_dict::Value;

fn setup_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const HEARTBEAT_ID: CanId = CanId::Std(0x714);

#[tokio::test]
#[serial]
async fn test_heartbeat_rate_and_payload() {
    setup_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = EdsBuilder::new()
        .heartbeat(Some("1000"), None)
        .write(dir.path(), "node.eds");

    let bus = SimBus::new();
    let mut rx = bus.new_receiver();
    let node = SimulatedNode::new(node_config(20, path), bus.new_transport(), Arc::new(NoHook));
    node.start().await.unwrap();

    let frames = collect_frames(&mut rx, HEARTBEAT_ID, Duration::from_secs(3)).await;
    node.stop().await;

    assert_ge!(frames.len(), 2);
    assert_le!(frames.len(), 4);
    for frame in &frames {
        assert_eq!(&[0x05u8], frame.data());
    }
}

#[tokio::test]
#[serial]
async fn test_heartbeat_follows_nmt_state() {
    setup_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = EdsBuilder::new()
        .heartbeat(None, Some("100"))
        .write(dir.path(), "node.eds");

    let bus = SimBus::new();
    let mut rx = bus.new_receiver();
    let node = SimulatedNode::new(node_config(20, path), bus.new_transport(), Arc::new(NoHook));
    node.start().await.unwrap();
    assert_eq!(100, node.heartbeat_interval_ms());

    send_nmt(&bus, NmtCommandSpecifier::Stop, 20);
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(NmtState::Stopped, node.nmt_state());
    rx.flush();
    let frames = collect_frames(&mut rx, HEARTBEAT_ID, Duration::from_millis(350)).await;
    assert!(!frames.is_empty());
    assert!(frames.iter().all(|f| f.data() == [0x04u8]));

    // Broadcast start
    send_nmt(&bus, NmtCommandSpecifier::Start, 0);
    tokio::time::sleep(Duration::from_millis(150)).await;
    rx.flush();
    let frames = collect_frames(&mut rx, HEARTBEAT_ID, Duration::from_millis(350)).await;
    assert!(!frames.is_empty());
    assert!(frames.iter().all(|f| f.data() == [0x05u8]));

    // A command for another node is ignored
    send_nmt(&bus, NmtCommandSpecifier::EnterPreOp, 21);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(NmtState::Operational, node.nmt_state());

    node.stop().await;
}

#[tokio::test]
async fn test_interval_default_fallback() {
    setup_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = EdsBuilder::new()
        .heartbeat(Some("1000"), None)
        .write(dir.path(), "node.eds");

    let bus = SimBus::new();
    let node = SimulatedNode::new(node_config(20, path), bus.new_transport(), Arc::new(NoHook));
    node.start().await.unwrap();
    assert_eq!(1000, node.heartbeat_interval_ms());

    // The default was applied to the entry, so peers read it back
    let od = node.object_dictionary().unwrap();
    assert_eq!(
        Some(Value::U16(1000)),
        od.get(HEARTBEAT_PRODUCER_TIME).unwrap().value()
    );
    let mut client = SdoTestClient::new(&bus, 20);
    assert_eq!(Ok(vec![0xE8, 0x03]), client.upload(0x1017, 0).await);

    node.stop().await;
    assert_eq!(0, node.heartbeat_interval_ms());
}

#[tokio::test]
async fn test_no_default_disables_heartbeat() {
    setup_logging();
    let dir = tempfile::tempdir().unwrap();
    for (name, builder) in [
        ("no_default.eds", EdsBuilder::new().heartbeat(None, None)),
        ("bad_default.eds", EdsBuilder::new().heartbeat(Some("often"), None)),
        ("no_object.eds", EdsBuilder::new()),
    ] {
        let path = builder.write(dir.path(), name);
        let bus = SimBus::new();
        let mut rx = bus.new_receiver();
        let node =
            SimulatedNode::new(node_config(20, path), bus.new_transport(), Arc::new(NoHook));
        node.start().await.unwrap();
        assert_eq!(0, node.heartbeat_interval_ms(), "{name}");

        let frames = collect_frames(&mut rx, HEARTBEAT_ID, Duration::from_millis(300)).await;
        assert!(frames.is_empty(), "{name}");
        node.stop().await;
    }
}

#[tokio::test]
#[serial]
async fn test_send_errors_do_not_stop_heartbeat() {
    setup_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = EdsBuilder::new()
        .heartbeat(None, Some("50"))
        .write(dir.path(), "node.eds");

    let bus = SimBus::new();
    let mut rx = bus.new_receiver();
    let transport = bus.new_transport();
    let node = SimulatedNode::new(node_config(20, path), transport.clone(), Arc::new(NoHook));
    node.start().await.unwrap();

    transport.set_fail_send(true);
    tokio::time::sleep(Duration::from_millis(100)).await;
    rx.flush();
    let frames = collect_frames(&mut rx, HEARTBEAT_ID, Duration::from_millis(200)).await;
    assert!(frames.is_empty());

    transport.set_fail_send(false);
    let frames = collect_frames(&mut rx, HEARTBEAT_ID, Duration::from_millis(200)).await;
    assert!(!frames.is_empty());

    node.stop().await;
}

#[tokio::test]
#[serial]
async fn test_heartbeat_waits_while_disconnected() {
    setup_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = EdsBuilder::new()
        .heartbeat(None, Some("100"))
        .write(dir.path(), "node.eds");

    let bus = SimBus::new();
    let mut rx = bus.new_receiver();
    let transport = bus.new_transport();
    let node = SimulatedNode::new(node_config(20, path), transport.clone(), Arc::new(NoHook));
    node.start().await.unwrap();

    transport.disconnect().unwrap();
    rx.flush();
    let frames = collect_frames(&mut rx, HEARTBEAT_ID, Duration::from_millis(400)).await;
    assert!(frames.is_empty());
    assert_eq!(Lifecycle::Operational, node.lifecycle());

    transport.connect(TEST_CHANNEL).unwrap();
    let frames = collect_frames(&mut rx, HEARTBEAT_ID, Duration::from_millis(400)).await;
    assert_ge!(frames.len(), 2);
    assert!(frames.iter().all(|f| f.data() == [0x05u8]));

    node.stop().await;
}

#[tokio::test]
async fn test_long_interval_stops_promptly() {
    setup_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = EdsBuilder::new()
        .heartbeat(None, Some("60000"))
        .write(dir.path(), "node.eds");

    let bus = SimBus::new();
    let node = SimulatedNode::new(node_config(20, path), bus.new_transport(), Arc::new(NoHook));
    node.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let t0 = tokio::time::Instant::now();
    node.stop().await;
    assert_lt!(t0.elapsed(), Duration::from_millis(500));
}
