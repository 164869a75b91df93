//! Definitions for the NMT protocol

/// Possible NMT states for a simulated node
///
/// The discriminant of each state is the byte announced for it in the heartbeat.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum NmtState {
    /// The node object exists but has not been started
    #[default]
    Initialising = 0x00,
    /// The node has no bus connection
    Disconnected = 0x01,
    /// The node is opening its bus connection
    Connecting = 0x02,
    /// Node has been stopped
    Stopped = 0x04,
    /// Normal operational state
    Operational = 0x05,
    /// Node is awaiting command to enter operation
    PreOperational = 0x7F,
    /// The node is shutting down
    Resetting = 0x80,
    /// Communication parameters are being reset
    ResetCommunication = 0x81,
    /// The whole node is being reset
    ResetNode = 0x82,
}

impl NmtState {
    /// The byte carried by a heartbeat frame for this state
    pub fn heartbeat_byte(self) -> u8 {
        self as u8
    }
}

impl core::fmt::Display for NmtState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            NmtState::Initialising => write!(f, "INITIALISING"),
            NmtState::Disconnected => write!(f, "DISCONNECTED"),
            NmtState::Connecting => write!(f, "CONNECTING"),
            NmtState::Stopped => write!(f, "STOPPED"),
            NmtState::Operational => write!(f, "OPERATIONAL"),
            NmtState::PreOperational => write!(f, "PRE-OPERATIONAL"),
            NmtState::Resetting => write!(f, "RESETTING"),
            NmtState::ResetCommunication => write!(f, "RESET COMMUNICATION"),
            NmtState::ResetNode => write!(f, "RESET NODE"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// An error for [`NmtState::try_from()`]
pub struct InvalidNmtStateError(pub u8);

impl TryFrom<u8> for NmtState {
    type Error = InvalidNmtStateError;

    /// Attempt to convert a heartbeat byte to an NmtState enum
    ///
    /// Fails with InvalidNmtStateError if value is not a valid state
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use NmtState::*;
        [
            Initialising,
            Disconnected,
            Connecting,
            Stopped,
            Operational,
            PreOperational,
            Resetting,
            ResetCommunication,
            ResetNode,
        ]
        .into_iter()
        .find(|state| *state as u8 == value)
        .ok_or(InvalidNmtStateError(value))
    }
}

/// The command specifiers carried in the first byte of an NMT command
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum NmtCommandSpecifier {
    /// Enter operational
    Start = 0x01,
    /// Enter stopped
    Stop = 0x02,
    /// Enter pre-operational
    EnterPreOp = 0x80,
    /// Reset the application
    ResetApp = 0x81,
    /// Reset communications
    ResetComm = 0x82,
}

impl TryFrom<u8> for NmtCommandSpecifier {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use NmtCommandSpecifier::*;
        match value {
            0x01 => Ok(Start),
            0x02 => Ok(Stop),
            0x80 => Ok(EnterPreOp),
            0x81 => Ok(ResetApp),
            0x82 => Ok(ResetComm),
            _ => Err(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heartbeat_byte_table() {
        assert_eq!(0x7F, NmtState::PreOperational.heartbeat_byte());
        assert_eq!(0x05, NmtState::Operational.heartbeat_byte());
        assert_eq!(0x04, NmtState::Stopped.heartbeat_byte());
        assert_eq!(0x80, NmtState::Resetting.heartbeat_byte());
        assert_eq!(0x81, NmtState::ResetCommunication.heartbeat_byte());
        assert_eq!(0x82, NmtState::ResetNode.heartbeat_byte());
        assert_eq!(0x01, NmtState::Disconnected.heartbeat_byte());
        assert_eq!(0x02, NmtState::Connecting.heartbeat_byte());
        assert_eq!(0x00, NmtState::Initialising.heartbeat_byte());
    }

    #[test]
    fn test_unknown_state_rejected() {
        assert_eq!(Err(InvalidNmtStateError(0x03)), NmtState::try_from(0x03));
        assert_eq!(Err(InvalidNmtStateError(0xFF)), NmtState::try_from(0xFF));
        assert_eq!(Ok(NmtState::Operational), NmtState::try_from(0x05));
    }
}
