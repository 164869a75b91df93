use std::collections::BTreeMap;

use crate::{
    error::{DecodeError, EncodeError},
    signal::Signal,
};

/// Signal values by signal name
pub type SignalValues = BTreeMap<String, i64>;

/// Bit set on the numeric ID of extended frames in DBC files
pub const DBC_EXTENDED_FLAG: u32 = 0x8000_0000;

/// A message definition
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageDef {
    /// The frame ID, without any extended flag
    pub frame_id: u32,
    /// Message name
    pub name: String,
    /// Payload length in bytes
    pub length: u8,
    /// Names of the modules which send the message
    pub senders: Vec<String>,
    /// Description
    pub comment: Option<String>,
    /// Signals carried in the payload
    pub signals: Vec<Signal>,
    /// True if the message uses a 29-bit ID
    pub is_extended_frame: bool,
}

impl MessageDef {
    /// Look up a signal by name
    pub fn signal(&self, name: &str) -> Option<&Signal> {
        self.signals.iter().find(|s| s.name == name)
    }

    /// The numeric ID as written in a DBC file
    pub fn dbc_id(&self) -> u32 {
        if self.is_extended_frame {
            self.frame_id | DBC_EXTENDED_FLAG
        } else {
            self.frame_id
        }
    }

    /// Encode signal values into a payload
    ///
    /// Every signal of the message needs a value. Values for unknown signals are ignored.
    pub fn encode(&self, values: &SignalValues) -> Result<Vec<u8>, EncodeError> {
        let mut data = vec![0u8; self.length as usize];
        for signal in &self.signals {
            let value = values
                .get(&signal.name)
                .ok_or_else(|| EncodeError::MissingSignal {
                    message: self.name.clone(),
                    signal: signal.name.clone(),
                })?;
            signal.encode(*value, &mut data)?;
        }
        Ok(data)
    }

    /// Decode a payload into signal values
    pub fn decode(&self, data: &[u8]) -> Result<SignalValues, DecodeError> {
        if data.len() != self.length as usize {
            return Err(DecodeError::LengthMismatch {
                frame_id: self.frame_id,
                expected: self.length as usize,
                actual: data.len(),
            });
        }
        Ok(self
            .signals
            .iter()
            .map(|s| (s.name.clone(), s.decode(data)))
            .collect())
    }
}
