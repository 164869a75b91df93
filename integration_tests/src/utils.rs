#![allow(dead_code)]
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use tokio::time::{timeout, Instant};
use wustsat_common::{
    messages::NmtCommand,
    nmt::NmtCommandSpecifier,
    sdo::{SdoRequest, SdoResponse},
    CanId, CanMessage, NodeId,
};
use wustsat_node::NodeConfig;

use crate::sim_bus::{SimBus, SimBusReceiver, SimBusSender};

pub const TEST_CHANNEL: &str = "sim0";

/// Builds EDS files for test nodes
pub struct EdsBuilder {
    sections: Vec<String>,
}

impl Default for EdsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EdsBuilder {
    pub fn new() -> Self {
        Self {
            sections: vec!["[FileInfo]\nFileName=test.eds\nDescription=Test node\n".to_string()],
        }
    }

    /// Add a heartbeat producer time object with an optional default and value
    pub fn heartbeat(mut self, default: Option<&str>, value: Option<&str>) -> Self {
        let mut section = "[1017]\nParameterName=Producer heartbeat time\nObjectType=0x7\n\
                           DataType=0x0006\nAccessType=rw\n"
            .to_string();
        if let Some(default) = default {
            section.push_str(&format!("DefaultValue={default}\n"));
        }
        if let Some(value) = value {
            section.push_str(&format!("ParameterValue={value}\n"));
        }
        self.sections.push(section);
        self
    }

    /// Add the UNSIGNED8 device register at 0x2000
    pub fn device_register(mut self, access: &str, default: &str) -> Self {
        self.sections.push(format!(
            "[2000]\nParameterName=Device register\nObjectType=0x7\nDataType=0x0005\n\
             AccessType={access}\nDefaultValue={default}\n"
        ));
        self
    }

    pub fn build(&self) -> String {
        self.sections.join("\n")
    }

    /// Write the EDS to `dir/name`
    pub fn write(&self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, self.build()).unwrap();
        path
    }
}

pub fn node_config(node_id: u8, od_path: impl Into<PathBuf>) -> NodeConfig {
    NodeConfig {
        node_id: NodeId::new(node_id).unwrap(),
        od_path: od_path.into(),
        channel: TEST_CHANNEL.to_string(),
    }
}

/// Collect frames with `id` seen by `rx` during `window`
pub async fn collect_frames(
    rx: &mut SimBusReceiver,
    id: CanId,
    window: Duration,
) -> Vec<CanMessage> {
    let deadline = Instant::now() + window;
    let mut frames = Vec::new();
    while let Ok(Some(msg)) = tokio::time::timeout_at(deadline, rx.recv()).await {
        if msg.id() == id {
            frames.push(msg);
        }
    }
    frames
}

/// An expedited SDO client talking to one node over a [`SimBus`]
pub struct SdoTestClient {
    node_id: NodeId,
    sender: SimBusSender,
    receiver: SimBusReceiver,
}

impl SdoTestClient {
    pub fn new(bus: &SimBus, node_id: u8) -> Self {
        Self {
            node_id: NodeId::new(node_id).unwrap(),
            sender: bus.new_sender(),
            receiver: bus.new_receiver(),
        }
    }

    async fn request(&mut self, req: SdoRequest) -> SdoResponse {
        self.receiver.flush();
        self.sender
            .send(CanMessage::new(self.node_id.sdo_rx_cob_id(), &req.to_bytes()));
        let resp_id = self.node_id.sdo_tx_cob_id();
        let msg = timeout(Duration::from_secs(1), async {
            loop {
                match self.receiver.recv().await {
                    Some(msg) if msg.id() == resp_id => return msg,
                    Some(_) => continue,
                    None => panic!("Bus closed"),
                }
            }
        })
        .await
        .expect("Timeout waiting for SDO response");
        SdoResponse::try_from(msg.data()).expect("Malformed SDO response")
    }

    /// Write up to 4 bytes, returning the raw abort code on failure
    pub async fn download(&mut self, index: u16, sub: u8, data: &[u8]) -> Result<(), u32> {
        match self
            .request(SdoRequest::expedited_download(index, sub, data))
            .await
        {
            SdoResponse::ConfirmDownload { .. } => Ok(()),
            SdoResponse::Abort { abort_code, .. } => Err(abort_code),
            other => panic!("Unexpected response {other:?}"),
        }
    }

    /// Read up to 4 bytes, returning the raw abort code on failure
    pub async fn upload(&mut self, index: u16, sub: u8) -> Result<Vec<u8>, u32> {
        match self.request(SdoRequest::initiate_upload(index, sub)).await {
            SdoResponse::Abort { abort_code, .. } => Err(abort_code),
            resp => Ok(resp.upload_data().expect("Expected upload data").to_vec()),
        }
    }
}

/// Send an NMT command onto the bus
pub fn send_nmt(bus: &SimBus, cs: NmtCommandSpecifier, node: u8) {
    bus.new_sender().send(NmtCommand { cs, node }.into());
}
