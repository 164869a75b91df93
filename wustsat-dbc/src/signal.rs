//! Signal layouts within a message payload
//!
//! Bit positions follow the DBC convention. For little endian (Intel) signals `start` is the
//! position of the least significant bit, counting from bit 0 of byte 0 upwards. For big endian
//! (Motorola) signals `start` is the position of the most significant bit, and the signal continues
//! towards bit 0 of the same byte before moving to bit 7 of the next byte.

use crate::error::EncodeError;

/// Longest supported signal, in bits
pub const MAX_SIGNAL_LENGTH: u16 = 64;

/// Bit order of a signal
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ByteOrder {
    /// Intel
    LittleEndian,
    /// Motorola
    BigEndian,
}

/// A value within a message payload
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signal {
    /// Signal name
    pub name: String,
    /// Start bit, see module docs
    pub start: u16,
    /// Length in bits, 1-64
    pub length: u16,
    /// Bit order
    pub byte_order: ByteOrder,
    /// True for two's complement signals
    pub is_signed: bool,
    /// Physical unit
    pub unit: Option<String>,
    /// Description
    pub comment: Option<String>,
}

impl Signal {
    /// Create an unsigned little endian signal
    pub fn new(name: impl Into<String>, start: u16, length: u16) -> Self {
        Self {
            name: name.into(),
            start,
            length,
            byte_order: ByteOrder::LittleEndian,
            is_signed: false,
            unit: None,
            comment: None,
        }
    }

    /// Set the bit order
    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    /// Mark the signal as signed
    pub fn signed(mut self) -> Self {
        self.is_signed = true;
        self
    }

    /// Set the unit
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Set the comment
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// True if the length is within 1-64 bits
    ///
    /// A signal with an invalid length encodes nothing and decodes as 0.
    pub fn has_valid_length(&self) -> bool {
        (1..=MAX_SIGNAL_LENGTH).contains(&self.length)
    }

    /// Number of bits actually used, 0 for an invalid length
    fn bits(&self) -> u32 {
        if self.has_valid_length() {
            self.length as u32
        } else {
            0
        }
    }

    /// Smallest encodable value
    pub fn minimum(&self) -> i64 {
        match self.bits() {
            0 => 0,
            bits if self.is_signed => (-(1i128 << (bits - 1))) as i64,
            _ => 0,
        }
    }

    /// Largest encodable value
    pub fn maximum(&self) -> i64 {
        let max = match self.bits() {
            0 => 0,
            bits if self.is_signed => (1i128 << (bits - 1)) - 1,
            bits => (1i128 << bits) - 1,
        };
        max.min(i64::MAX as i128) as i64
    }

    /// Payload bit positions of the signal, from least to most significant
    fn bit_positions(&self) -> Vec<usize> {
        let length = self.bits() as usize;
        match self.byte_order {
            ByteOrder::LittleEndian => (0..length).map(|i| self.start as usize + i).collect(),
            ByteOrder::BigEndian => {
                let mut positions = Vec::with_capacity(length);
                let mut pos = self.start as usize;
                for _ in 0..length {
                    positions.push(pos);
                    pos = if pos % 8 == 0 { pos + 15 } else { pos - 1 };
                }
                positions.reverse();
                positions
            }
        }
    }

    /// Number of payload bytes needed to hold the signal
    pub fn bytes_spanned(&self) -> usize {
        self.bit_positions()
            .iter()
            .max()
            .map(|pos| pos / 8 + 1)
            .unwrap_or(0)
    }

    /// Write `value` into `data`
    pub fn encode(&self, value: i64, data: &mut [u8]) -> Result<(), EncodeError> {
        if !self.has_valid_length() {
            return Err(EncodeError::InvalidLength {
                signal: self.name.clone(),
                length: self.length,
            });
        }
        let (min, max) = (self.minimum(), self.maximum());
        if value < min || value > max {
            return Err(EncodeError::SignalOutOfRange {
                signal: self.name.clone(),
                value,
                min,
                max,
            });
        }
        let raw = value as u64;
        for (i, pos) in self.bit_positions().into_iter().enumerate() {
            let mask = 1u8 << (pos % 8);
            if let Some(byte) = data.get_mut(pos / 8) {
                if (raw >> i) & 1 == 1 {
                    *byte |= mask;
                } else {
                    *byte &= !mask;
                }
            }
        }
        Ok(())
    }

    /// Read the signal from `data`
    ///
    /// Bits beyond the end of `data` read as zero.
    pub fn decode(&self, data: &[u8]) -> i64 {
        let mut raw = 0u64;
        for (i, pos) in self.bit_positions().into_iter().enumerate() {
            let bit = data.get(pos / 8).map(|b| (b >> (pos % 8)) & 1).unwrap_or(0);
            raw |= (bit as u64) << i;
        }
        let bits = self.bits();
        if self.is_signed && bits > 0 && bits < 64 && raw & (1 << (bits - 1)) != 0 {
            raw |= u64::MAX << bits;
        }
        raw as i64
    }

    /// The `SG_` line for this signal in a DBC file
    pub fn to_dbc_line(&self) -> String {
        let order = match self.byte_order {
            ByteOrder::LittleEndian => 1,
            ByteOrder::BigEndian => 0,
        };
        let sign = if self.is_signed { '-' } else { '+' };
        format!(
            " SG_ {} : {}|{}@{}{} (1,0) [{}|{}] \"{}\" Vector__XXX",
            self.name,
            self.start,
            self.length,
            order,
            sign,
            self.minimum(),
            self.maximum(),
            self.unit.as_deref().unwrap_or(""),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_little_endian() {
        let sig = Signal::new("ts", 0, 32);
        let mut data = [0u8; 4];
        sig.encode(1_700_000_000, &mut data).unwrap();
        assert_eq!(1_700_000_000u32.to_le_bytes(), data);
        assert_eq!(1_700_000_000, sig.decode(&data));
    }

    #[test]
    fn test_big_endian() {
        // 16 bit Motorola signal with MSB at bit 7 of byte 0
        let sig = Signal::new("speed", 7, 16).with_byte_order(ByteOrder::BigEndian);
        let mut data = [0u8; 2];
        sig.encode(0x1234, &mut data).unwrap();
        assert_eq!([0x12, 0x34], data);
        assert_eq!(0x1234, sig.decode(&data));
        assert_eq!(2, sig.bytes_spanned());
    }

    #[test]
    fn test_unaligned_signed() {
        let sig = Signal::new("temp", 4, 8).signed();
        let mut data = [0xFFu8; 2];
        sig.encode(-2, &mut data).unwrap();
        assert_eq!([0xEF, 0xFF], data);
        assert_eq!(-2, sig.decode(&data));
        assert_eq!((-128, 127), (sig.minimum(), sig.maximum()));
    }

    #[test]
    fn test_range_checked() {
        let sig = Signal::new("flag", 0, 1);
        let mut data = [0u8; 1];
        assert!(matches!(
            sig.encode(2, &mut data),
            Err(EncodeError::SignalOutOfRange { max: 1, .. })
        ));
        assert!(sig.encode(-1, &mut data).is_err());
    }

    #[test]
    fn test_invalid_length() {
        let mut data = [0u8; 8];
        for length in [0, 65, 200] {
            let sig = Signal::new("bad", 0, length).signed();
            assert!(!sig.has_valid_length());
            assert_eq!((0, 0), (sig.minimum(), sig.maximum()));
            assert_eq!(0, sig.bytes_spanned());
            assert_eq!(
                Err(EncodeError::InvalidLength {
                    signal: "bad".into(),
                    length
                }),
                sig.encode(0, &mut data)
            );
            assert_eq!(0, sig.decode(&[0xFF; 8]));
        }

        let full = Signal::new("wide", 0, 64).signed();
        assert!(full.has_valid_length());
        full.encode(i64::MIN, &mut data).unwrap();
        assert_eq!(i64::MIN, full.decode(&data));
        assert_eq!(i64::MAX, Signal::new("wide", 0, 64).maximum());
    }

    #[test]
    fn test_dbc_line() {
        let sig = Signal::new("unix_timestamp", 0, 32).with_unit("s");
        assert_eq!(
            " SG_ unix_timestamp : 0|32@1+ (1,0) [0|4294967295] \"s\" Vector__XXX",
            sig.to_dbc_line()
        );
    }
}
