//! Error types for the database crate

use std::path::PathBuf;

use snafu::Snafu;

/// A frame ID field outside its allowed range
#[derive(Clone, Debug, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum FrameIdError {
    /// The named field is negative or larger than `max`
    #[snafu(display("{field} {value} out of range (0-{max})"))]
    OutOfRange {
        /// The field name
        field: &'static str,
        /// The rejected value
        value: i64,
        /// The largest allowed value
        max: i64,
    },
}

/// Error encoding signal values into a payload
#[derive(Clone, Debug, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum EncodeError {
    /// No message with the name exists in the database
    #[snafu(display("Message '{name}' not found in database"))]
    UnknownMessage {
        /// The requested name
        name: String,
    },
    /// A signal of the message was given no value
    #[snafu(display("Message '{message}' is missing a value for signal '{signal}'"))]
    #[snafu(context(name(EncodeMissingSignalSnafu)))]
    MissingSignal {
        /// The message name
        message: String,
        /// The signal name
        signal: String,
    },
    /// A value does not fit its signal
    #[snafu(display("Value {value} for signal '{signal}' is out of range ({min}..={max})"))]
    SignalOutOfRange {
        /// The signal name
        signal: String,
        /// The rejected value
        value: i64,
        /// Smallest encodable value
        min: i64,
        /// Largest encodable value
        max: i64,
    },
    /// A signal is defined with a length outside 1-64 bits
    #[snafu(display("Signal '{signal}' has invalid length {length} (1-64)"))]
    InvalidLength {
        /// The signal name
        signal: String,
        /// The defined length in bits
        length: u16,
    },
}

/// Error decoding a received payload
#[derive(Clone, Debug, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DecodeError {
    /// No message with the frame ID exists in the database
    #[snafu(display("Frame ID 0x{frame_id:X} not found in database"))]
    UnknownFrame {
        /// The received frame ID
        frame_id: u32,
    },
    /// The payload length does not match the message definition
    #[snafu(display("Frame ID 0x{frame_id:X}: expected {expected} bytes, got {actual}"))]
    LengthMismatch {
        /// The received frame ID
        frame_id: u32,
        /// The defined message length
        expected: usize,
        /// The received payload length
        actual: usize,
    },
    /// The message has no signal with the expected name
    #[snafu(display("Frame ID 0x{frame_id:X} has no signal '{signal}'"))]
    MissingSignal {
        /// The received frame ID
        frame_id: u32,
        /// The expected signal name
        signal: &'static str,
    },
    /// A decoded value does not fit the expected type
    #[snafu(display("Frame ID 0x{frame_id:X}: value {value} of signal '{signal}' is invalid"))]
    InvalidSignalValue {
        /// The received frame ID
        frame_id: u32,
        /// The signal name
        signal: &'static str,
        /// The decoded value
        value: i64,
    },
}

/// Error saving a database
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DatabaseError {
    /// The output file could not be written
    #[snafu(display("Failed to write {}: {source}", path.display()))]
    Write {
        /// The output path
        path: PathBuf,
        /// The I/O error
        source: std::io::Error,
    },
}
