//! Constants defining standard object indices and bus conventions
//!
//!

/// Object indices for objects used by the simulated nodes
pub mod object_ids {
    /// The heartbeat producer time object index
    ///
    /// Holds the heartbeat interval in milliseconds. A value of 0 disables the heartbeat.
    pub const HEARTBEAT_PRODUCER_TIME: u16 = 0x1017;
    /// The identity object index
    pub const IDENTITY: u16 = 0x1018;
    /// The device specific control / status register
    ///
    /// Its meaning depends on the device: the LoRa module treats it as a control register written
    /// by peers, the OBC publishes its status through it.
    pub const DEVICE_REGISTER: u16 = 0x2000;
}

/// Function code bases which are combined with a node ID to form a COB ID
pub mod cob_ids {
    /// NMT commands are broadcast on this ID
    pub const NMT_COMMAND: u16 = 0x000;
    /// SDO server responses are sent on `SDO_TX_BASE + node_id`
    pub const SDO_TX_BASE: u16 = 0x580;
    /// SDO client requests are received on `SDO_RX_BASE + node_id`
    pub const SDO_RX_BASE: u16 = 0x600;
    /// Heartbeats are sent on `HEARTBEAT_BASE + node_id`
    pub const HEARTBEAT_BASE: u16 = 0x700;
}

/// Offset added to a module's hardware ID to get its CANopen node ID
pub const NODE_ID_BASE: u8 = 16;
