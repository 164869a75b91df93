//! Message types carried in the frame ID

/// Message types, with the value they occupy in the frame ID
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Module status report
    Status = 0x00,
    /// Periodic liveness message
    Heartbeat = 0xFF,
}

impl MessageType {
    /// The frame ID field value
    pub fn value(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for MessageType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(MessageType::Status),
            0xFF => Ok(MessageType::Heartbeat),
            _ => Err(value),
        }
    }
}
