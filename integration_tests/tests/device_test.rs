use std::{path::PathBuf, sync::Arc, time::Duration};

use integration_tests::prelude::*;
use integration_tests::utils::TEST_CHANNEL;
use serial_test::serial;
use wustsat_common::CanMessage;
use wustsat_dbc::{heartbeat, modules::module_by_name, CanDatabase};
use wustsat_node::{
    devices::{LoraControlListener, ObcStatusPublisher, LORA_PROFILE, OBC_PROFILE},
    object_dict::Value,
};

fn setup_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn shipped_eds_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../eds")
}

#[tokio::test]
async fn test_lora_observes_bus_writes() {
    setup_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = EdsBuilder::new()
        .device_register("rw", "0")
        .write(dir.path(), "lora.eds");

    let bus = SimBus::new();
    let listener = Arc::new(LoraControlListener::new());
    let node = SimulatedNode::new(node_config(20, path), bus.new_transport(), listener.clone());
    node.start().await.unwrap();
    assert_eq!(Some(Value::U8(0)), listener.control_value());
    assert_eq!(0, listener.write_count());

    let mut client = SdoTestClient::new(&bus, 20);
    client.download(0x2000, 0, &[5]).await.unwrap();
    assert_eq!(Some(Value::U8(5)), listener.control_value());
    assert_eq!(1, listener.write_count());

    client.download(0x2000, 0, &[9]).await.unwrap();
    assert_eq!(Some(Value::U8(9)), listener.control_value());
    assert_eq!(2, listener.write_count());
    assert_eq!(Ok(vec![9]), client.upload(0x2000, 0).await);

    // A rejected write does not reach the observer
    assert_eq!(
        Err(AbortCode::DataTypeMismatchLengthHigh as u32),
        client.download(0x2000, 0, &[1, 2]).await
    );
    assert_eq!(2, listener.write_count());

    node.stop().await;
}

#[tokio::test]
async fn test_lora_without_register_still_runs() {
    setup_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = EdsBuilder::new()
        .heartbeat(None, Some("100"))
        .write(dir.path(), "lora.eds");

    let bus = SimBus::new();
    let listener = Arc::new(LoraControlListener::new());
    let node = SimulatedNode::new(node_config(20, path), bus.new_transport(), listener.clone());
    node.start().await.unwrap();
    assert_eq!(Lifecycle::Operational, node.lifecycle());
    assert_eq!(None, listener.control_value());

    let mut client = SdoTestClient::new(&bus, 20);
    assert_eq!(
        Err(AbortCode::NoSuchObject as u32),
        client.download(0x2000, 0, &[1]).await
    );
    assert_eq!(0, listener.write_count());

    node.stop().await;
}

#[tokio::test]
async fn test_obc_publishes_status() {
    setup_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = EdsBuilder::new()
        .device_register("ro", "0")
        .write(dir.path(), "obc.eds");

    let bus = SimBus::new();
    let publisher = Arc::new(ObcStatusPublisher::default());
    let node = SimulatedNode::new(node_config(29, path), bus.new_transport(), publisher.clone());
    node.start().await.unwrap();

    let mut client = SdoTestClient::new(&bus, 29);
    assert_eq!(Ok(vec![1]), client.upload(0x2000, 0).await);

    publisher.set_status(3);
    assert_eq!(3, publisher.status());
    assert_eq!(Ok(vec![3]), client.upload(0x2000, 0).await);

    // Peers cannot write the status register
    assert_eq!(
        Err(AbortCode::ReadOnly as u32),
        client.download(0x2000, 0, &[7]).await
    );
    assert_eq!(Ok(vec![3]), client.upload(0x2000, 0).await);

    node.stop().await;

    publisher.set_status(4);
    assert_eq!(3, publisher.status());
}

#[tokio::test]
async fn test_obc_status_before_start_is_ignored() {
    setup_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = EdsBuilder::new()
        .device_register("ro", "0")
        .write(dir.path(), "obc.eds");

    let bus = SimBus::new();
    let publisher = Arc::new(ObcStatusPublisher::new(2));
    publisher.set_status(5);
    assert_eq!(2, publisher.status());

    let node = SimulatedNode::new(node_config(29, path), bus.new_transport(), publisher.clone());
    node.start().await.unwrap();
    let mut client = SdoTestClient::new(&bus, 29);
    assert_eq!(Ok(vec![2]), client.upload(0x2000, 0).await);
    node.stop().await;
}

#[tokio::test]
#[serial]
async fn test_shipped_device_files() {
    setup_logging();
    let bus = SimBus::new();
    let mut rx = bus.new_receiver();

    let lora_config = LORA_PROFILE.node_config(shipped_eds_dir(), TEST_CHANNEL).unwrap();
    let obc_config = OBC_PROFILE.node_config(shipped_eds_dir(), TEST_CHANNEL).unwrap();
    assert_eq!(20, lora_config.node_id.raw());
    assert_eq!(29, obc_config.node_id.raw());

    let lora = SimulatedNode::new(
        lora_config,
        bus.new_transport(),
        Arc::new(LoraControlListener::new()),
    );
    let obc = SimulatedNode::new(
        obc_config,
        bus.new_transport(),
        Arc::new(ObcStatusPublisher::default()),
    );
    lora.start().await.unwrap();
    obc.start().await.unwrap();
    assert_eq!(1000, lora.heartbeat_interval_ms());
    assert_eq!(1000, obc.heartbeat_interval_ms());

    let frames = collect_frames(&mut rx, CanId::Std(0x71D), Duration::from_millis(200)).await;
    assert_eq!(1, frames.len());
    assert_eq!(&[0x05u8], frames[0].data());

    let mut client = SdoTestClient::new(&bus, 29);
    assert_eq!(Ok(vec![0xCD, 0xAB, 0, 0]), client.upload(0x1018, 1).await);
    assert_eq!(Ok(vec![0x1D, 0x06, 0, 0]), client.upload(0x1200, 1).await);
    assert_eq!(Ok(vec![1]), client.upload(0x2000, 0).await);
    assert_eq!(
        Err(AbortCode::NoSuchSubIndex as u32),
        client.upload(0x1018, 9).await
    );

    let mut client = SdoTestClient::new(&bus, 20);
    assert_eq!(Ok(vec![0x94, 0x05, 0, 0]), client.upload(0x1200, 2).await);
    client.download(0x2000, 0, &[1]).await.unwrap();

    lora.stop().await;
    obc.stop().await;
}

#[tokio::test]
async fn test_database_heartbeat_on_bus() {
    setup_logging();
    let db = CanDatabase::create(false).unwrap();
    let obc = module_by_name("OBC").unwrap();
    let message = db
        .message_by_name(&heartbeat::message_name(obc))
        .unwrap()
        .clone();

    let bus = SimBus::new();
    let mut rx = bus.new_receiver();
    let payload = heartbeat::encode_payload(Some(1_700_000_000));
    bus.new_sender()
        .send(CanMessage::new(CanId::Extended(message.frame_id), &payload));

    let msg = rx.try_recv().unwrap();
    let CanId::Extended(frame_id) = msg.id() else {
        panic!("Expected an extended frame, got {:?}", msg.id());
    };
    let data = heartbeat::decode_payload(&db, frame_id, msg.data()).unwrap();
    assert_eq!(1_700_000_000, data.unix_timestamp);
}
