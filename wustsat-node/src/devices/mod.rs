//! Device behaviors for the simulated satellite modules
//!
//! Each device is a [`PostStartHook`](crate::PostStartHook) which wires the device register
//! (0x2000) of a freshly started node, plus a [`DeviceProfile`] describing where the device sits
//! on the bus.

use std::path::Path;

use wustsat_common::{constants::NODE_ID_BASE, node_id::InvalidNodeIdError, NodeId};

use crate::runtime::NodeConfig;

mod lora;
mod obc;

pub use lora::LoraControlListener;
pub use obc::ObcStatusPublisher;

/// Static description of a simulated device
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceProfile {
    /// Name used on the command line
    pub name: &'static str,
    /// The module's hardware ID
    pub hardware_id: u8,
    /// File name of the device's EDS, relative to the EDS directory
    pub eds_file: &'static str,
}

impl DeviceProfile {
    /// The device's CANopen node ID
    pub fn node_id(&self) -> Result<NodeId, InvalidNodeIdError> {
        NodeId::from_hardware_id(NODE_ID_BASE, self.hardware_id)
    }

    /// Build the node configuration for this device
    pub fn node_config(
        &self,
        od_dir: impl AsRef<Path>,
        channel: impl Into<String>,
    ) -> Result<NodeConfig, InvalidNodeIdError> {
        Ok(NodeConfig {
            node_id: self.node_id()?,
            od_path: od_dir.as_ref().join(self.eds_file),
            channel: channel.into(),
        })
    }
}

/// The LoRa communication module
pub const LORA_PROFILE: DeviceProfile = DeviceProfile {
    name: "lora",
    hardware_id: 4,
    eds_file: "lora.eds",
};

/// The on-board computer
pub const OBC_PROFILE: DeviceProfile = DeviceProfile {
    name: "obc",
    hardware_id: 13,
    eds_file: "obc.eds",
};
