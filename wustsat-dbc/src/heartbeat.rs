//! The heartbeat message, sent by every module to all others
//!
//! The payload is a 4 byte little endian Unix timestamp in seconds.

use chrono::Utc;
use snafu::OptionExt;

use crate::{
    database::CanDatabase,
    error::{DecodeError, FrameIdError, MissingSignalSnafu},
    frame_id::BROADCAST_ID,
    message::{MessageDef, SignalValues},
    message_types::MessageType,
    modules::Module,
    signal::Signal,
};

/// Name of the timestamp signal
pub const TIMESTAMP_SIGNAL: &str = "unix_timestamp";
/// Payload length
pub const PAYLOAD_LENGTH: u8 = 4;

/// Decoded heartbeat contents
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeartbeatData {
    /// Seconds since the Unix epoch
    pub unix_timestamp: u32,
}

/// Name of the heartbeat message sent by `module`
pub fn message_name(module: &Module) -> String {
    format!("{}_Heartbeat", module.name)
}

/// Build the heartbeat message definition for a module
pub fn create_message(module: &Module) -> Result<MessageDef, FrameIdError> {
    let frame_id = module.message_id(BROADCAST_ID, MessageType::Heartbeat)?;
    let timestamp = Signal::new(TIMESTAMP_SIGNAL, 0, 32)
        .with_unit("s")
        .with_comment("Unix timestamp in seconds");
    Ok(MessageDef {
        frame_id,
        name: message_name(module),
        length: PAYLOAD_LENGTH,
        senders: vec![module.name.to_string()],
        comment: Some(format!("Heartbeat from {}", module.description)),
        signals: vec![timestamp],
        is_extended_frame: true,
    })
}

fn now() -> u32 {
    u32::try_from(Utc::now().timestamp()).unwrap_or(u32::MAX)
}

/// Signal values for a heartbeat, using the current time if `timestamp` is None
pub fn encode_data(timestamp: Option<u32>) -> SignalValues {
    let timestamp = timestamp.unwrap_or_else(now);
    SignalValues::from([(TIMESTAMP_SIGNAL.to_string(), timestamp as i64)])
}

/// Encode a heartbeat payload, using the current time if `timestamp` is None
pub fn encode_payload(timestamp: Option<u32>) -> [u8; 4] {
    timestamp.unwrap_or_else(now).to_le_bytes()
}

/// Decode a heartbeat payload received with `frame_id`
///
/// Fails with [`DecodeError::MissingSignal`] if `frame_id` belongs to a message which is not a
/// heartbeat.
pub fn decode_payload(
    db: &CanDatabase,
    frame_id: u32,
    data: &[u8],
) -> Result<HeartbeatData, DecodeError> {
    let values = db.decode_message(frame_id, data)?;
    let value = *values.get(TIMESTAMP_SIGNAL).context(MissingSignalSnafu {
        frame_id,
        signal: TIMESTAMP_SIGNAL,
    })?;
    let unix_timestamp =
        u32::try_from(value).map_err(|_| DecodeError::InvalidSignalValue {
            frame_id,
            signal: TIMESTAMP_SIGNAL,
            value,
        })?;
    Ok(HeartbeatData { unix_timestamp })
}
