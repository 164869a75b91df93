//! Packing of inter-module frame IDs
//!
//! Frames between modules use a 29-bit extended ID laid out as:
//!
//! | Bits  | Field            |
//! |-------|------------------|
//! | 0-3   | source module    |
//! | 4-7   | destination      |
//! | 8-15  | message type     |
//! | 16-28 | reserved, zero   |

use crate::error::FrameIdError;

/// Largest module ID, for source and destination
pub const MAX_MODULE_ID: i64 = 0xF;
/// Largest message type value
pub const MAX_MESSAGE_TYPE: i64 = 0xFF;
/// The destination used for messages addressed to all modules
pub const BROADCAST_ID: u8 = 15;

fn check(field: &'static str, value: i64, max: i64) -> Result<u32, FrameIdError> {
    if (0..=max).contains(&value) {
        Ok(value as u32)
    } else {
        Err(FrameIdError::OutOfRange { field, value, max })
    }
}

/// Compute the frame ID for a message from `source` to `destination`
///
/// Inputs are signed so that negative values are reported rather than wrapped.
pub fn compute_frame_id(
    source: i64,
    destination: i64,
    message_type: i64,
) -> Result<u32, FrameIdError> {
    let source = check("source ID", source, MAX_MODULE_ID)?;
    let destination = check("destination ID", destination, MAX_MODULE_ID)?;
    let message_type = check("message type", message_type, MAX_MESSAGE_TYPE)?;
    Ok(source | (destination << 4) | (message_type << 8))
}

/// The fields of a packed frame ID
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameIdFields {
    /// Source module ID
    pub source: u8,
    /// Destination module ID
    pub destination: u8,
    /// Message type value
    pub message_type: u8,
}

impl FrameIdFields {
    /// Split a frame ID into its fields. Reserved bits are ignored.
    pub fn unpack(frame_id: u32) -> Self {
        Self {
            source: (frame_id & 0xF) as u8,
            destination: ((frame_id >> 4) & 0xF) as u8,
            message_type: ((frame_id >> 8) & 0xFF) as u8,
        }
    }

    /// Pack the fields into a frame ID
    pub fn pack(&self) -> u32 {
        (self.source as u32 & 0xF)
            | ((self.destination as u32 & 0xF) << 4)
            | ((self.message_type as u32) << 8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packing() {
        assert_eq!(Ok(0xFFF1), compute_frame_id(1, 15, 0xFF));
        assert_eq!(Ok(0x0006), compute_frame_id(6, 0, 0));
    }

    #[test]
    fn test_unpack_recovers_fields() {
        for source in 0..=15 {
            for destination in [0, 7, 15] {
                for message_type in [0, 1, 0x80, 0xFF] {
                    let id = compute_frame_id(source, destination, message_type).unwrap();
                    let fields = FrameIdFields::unpack(id);
                    assert_eq!(source, fields.source as i64);
                    assert_eq!(destination, fields.destination as i64);
                    assert_eq!(message_type, fields.message_type as i64);
                    assert_eq!(id, fields.pack());
                }
            }
        }
    }

    #[test]
    fn test_out_of_range() {
        assert_eq!(
            Err(FrameIdError::OutOfRange {
                field: "source ID",
                value: 16,
                max: 15
            }),
            compute_frame_id(16, 0, 0)
        );
        assert_eq!(
            Err(FrameIdError::OutOfRange {
                field: "destination ID",
                value: -1,
                max: 15
            }),
            compute_frame_id(0, -1, 0)
        );
        assert_eq!(
            Err(FrameIdError::OutOfRange {
                field: "message type",
                value: 256,
                max: 255
            }),
            compute_frame_id(0, 0, 256)
        );
    }
}
