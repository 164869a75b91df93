//! Types for representing node IDs
//!

use crate::{
    constants::cob_ids,
    messages::{CanId, Heartbeat},
};

/// The node ID of a CANopen node. It must be between 1 and 127.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u8);

impl NodeId {
    /// Try to create a new NodeId
    ///
    /// It will fail if value is invalid (i.e. <1 or >127)
    pub const fn new(value: u8) -> Result<Self, InvalidNodeIdError> {
        if value > 0 && value < 128 {
            Ok(NodeId(value))
        } else {
            Err(InvalidNodeIdError(value as u16))
        }
    }

    /// Derive a node ID from a module's hardware ID
    ///
    /// Modules on the platform bus use `base + hardware_id` as their node ID.
    pub const fn from_hardware_id(base: u8, hardware_id: u8) -> Result<Self, InvalidNodeIdError> {
        let sum = base as u16 + hardware_id as u16;
        if sum > 0 && sum < 128 {
            Ok(NodeId(sum as u8))
        } else {
            Err(InvalidNodeIdError(sum))
        }
    }

    /// Get the raw node ID as a u8
    pub fn raw(&self) -> u8 {
        self.0
    }

    /// The COB ID this node sends its heartbeat on
    pub fn heartbeat_cob_id(&self) -> CanId {
        Heartbeat::cob_id(self.0)
    }

    /// The COB ID this node receives SDO requests on
    pub fn sdo_rx_cob_id(&self) -> CanId {
        CanId::Std(cob_ids::SDO_RX_BASE + self.0 as u16)
    }

    /// The COB ID this node sends SDO responses on
    pub fn sdo_tx_cob_id(&self) -> CanId {
        CanId::Std(cob_ids::SDO_TX_BASE + self.0 as u16)
    }
}

impl core::fmt::Display for NodeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<NodeId> for u8 {
    fn from(value: NodeId) -> Self {
        value.raw()
    }
}

impl TryFrom<u8> for NodeId {
    type Error = InvalidNodeIdError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        NodeId::new(value)
    }
}

/// Error for converting a number to a NodeId
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidNodeIdError(pub u16);

impl core::fmt::Display for InvalidNodeIdError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Invalid node ID {} (must be 1-127)", self.0)
    }
}
impl std::error::Error for InvalidNodeIdError {}
