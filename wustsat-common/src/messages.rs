//! CAN identifiers, frames, and the CANopen messages built on them

use crate::{
    constants::cob_ids,
    nmt::{NmtCommandSpecifier, NmtState},
};

/// Maximum value of an 11-bit standard identifier
pub const MAX_STD_ID: u16 = 0x7FF;
/// Maximum value of a 29-bit extended identifier
pub const MAX_EXTENDED_ID: u32 = 0x1FFF_FFFF;

/// The ID on which NMT commands are broadcast
pub const NMT_CMD_ID: CanId = CanId::Std(cob_ids::NMT_COMMAND);

/// A CAN frame identifier
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CanId {
    /// An 11-bit standard identifier
    Std(u16),
    /// A 29-bit extended identifier
    Extended(u32),
}

impl CanId {
    /// Create a standard ID
    pub const fn std(id: u16) -> Self {
        Self::Std(id)
    }

    /// Create an extended ID
    pub const fn extended(id: u32) -> Self {
        Self::Extended(id)
    }

    /// Get the raw numeric identifier
    pub fn raw(&self) -> u32 {
        match self {
            CanId::Std(id) => *id as u32,
            CanId::Extended(id) => *id,
        }
    }

    /// True if this is a 29-bit identifier
    pub fn is_extended(&self) -> bool {
        matches!(self, CanId::Extended(_))
    }
}

impl core::fmt::Display for CanId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            CanId::Std(id) => write!(f, "0x{id:03X}"),
            CanId::Extended(id) => write!(f, "0x{id:08X}x"),
        }
    }
}

/// A classic CAN frame with up to 8 data bytes
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CanMessage {
    id: CanId,
    rtr: bool,
    dlc: u8,
    data: [u8; 8],
}

impl CanMessage {
    /// Create a data frame
    ///
    /// Data beyond 8 bytes is truncated.
    pub fn new(id: CanId, data: &[u8]) -> Self {
        let dlc = data.len().min(8);
        let mut buf = [0u8; 8];
        buf[..dlc].copy_from_slice(&data[..dlc]);
        Self {
            id,
            rtr: false,
            dlc: dlc as u8,
            data: buf,
        }
    }

    /// Create a remote transmission request frame
    pub fn new_rtr(id: CanId) -> Self {
        Self {
            id,
            rtr: true,
            dlc: 0,
            data: [0; 8],
        }
    }

    /// The frame identifier
    pub fn id(&self) -> CanId {
        self.id
    }

    /// The payload bytes
    pub fn data(&self) -> &[u8] {
        &self.data[..self.dlc as usize]
    }

    /// True for remote frames
    pub fn is_rtr(&self) -> bool {
        self.rtr
    }
}

/// A heartbeat message, announcing a node's NMT state
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Heartbeat {
    /// The ID of the node sending the heartbeat
    pub node: u8,
    /// The NMT state being announced
    pub state: NmtState,
}

impl Heartbeat {
    /// The COB ID a node sends its heartbeat on
    pub fn cob_id(node: u8) -> CanId {
        CanId::Std(cob_ids::HEARTBEAT_BASE + node as u16)
    }
}

impl From<Heartbeat> for CanMessage {
    fn from(value: Heartbeat) -> Self {
        CanMessage::new(Heartbeat::cob_id(value.node), &[value.state.heartbeat_byte()])
    }
}

/// An NMT command addressed to one node, or to all nodes when `node` is 0
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct NmtCommand {
    /// The requested transition
    pub cs: NmtCommandSpecifier,
    /// The target node, or 0 for broadcast
    pub node: u8,
}

impl NmtCommand {
    /// True if this command applies to the node with ID `node_id`
    pub fn targets(&self, node_id: u8) -> bool {
        self.node == 0 || self.node == node_id
    }
}

impl From<NmtCommand> for CanMessage {
    fn from(value: NmtCommand) -> Self {
        CanMessage::new(NMT_CMD_ID, &[value.cs as u8, value.node])
    }
}

impl TryFrom<CanMessage> for NmtCommand {
    type Error = ();

    fn try_from(msg: CanMessage) -> Result<Self, Self::Error> {
        if msg.id() != NMT_CMD_ID || msg.data().len() != 2 {
            return Err(());
        }
        let cs = NmtCommandSpecifier::try_from(msg.data()[0]).map_err(|_| ())?;
        Ok(NmtCommand {
            cs,
            node: msg.data()[1],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heartbeat_frame() {
        let msg: CanMessage = Heartbeat {
            node: 20,
            state: NmtState::Operational,
        }
        .into();
        assert_eq!(CanId::Std(0x714), msg.id());
        assert_eq!(&[0x05], msg.data());
    }

    #[test]
    fn test_nmt_command_parse() {
        let msg = CanMessage::new(NMT_CMD_ID, &[0x02, 29]);
        let cmd = NmtCommand::try_from(msg).unwrap();
        assert_eq!(NmtCommandSpecifier::Stop, cmd.cs);
        assert!(cmd.targets(29));
        assert!(!cmd.targets(20));

        let broadcast = NmtCommand::try_from(CanMessage::new(NMT_CMD_ID, &[0x01, 0])).unwrap();
        assert!(broadcast.targets(20));

        assert!(NmtCommand::try_from(CanMessage::new(NMT_CMD_ID, &[0x01])).is_err());
        assert!(NmtCommand::try_from(CanMessage::new(CanId::Std(0x601), &[0x01, 0])).is_err());
    }

    #[test]
    fn test_long_data_truncated() {
        let msg = CanMessage::new(CanId::extended(0xFFF1), &[0; 12]);
        assert_eq!(8, msg.data().len());
        assert!(msg.id().is_extended());
    }
}
