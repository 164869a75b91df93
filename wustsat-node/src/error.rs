//! Error types for the node crate

use std::path::PathBuf;

use snafu::Snafu;
use wustsat_common::{NodeId, TransportError};

use crate::object_dict::DataType;

/// Error returned by [`SimulatedNode::start`](crate::SimulatedNode::start)
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum NodeError {
    /// The object dictionary definition file does not exist
    #[snafu(display("Object dictionary file not found: {}", path.display()))]
    ConfigNotFound {
        /// The configured definition path
        path: PathBuf,
    },
    /// The object dictionary definition file could not be loaded
    #[snafu(display("Failed to load object dictionary: {source}"))]
    DictionaryLoad {
        /// The load error
        source: EdsError,
    },
    /// The bus transport could not be opened
    #[snafu(display("Transport error: {source}"))]
    Transport {
        /// The transport error
        source: TransportError,
    },
    /// `start` was called on a running node
    #[snafu(display("Node {node_id} is already started"))]
    AlreadyStarted {
        /// The node's ID
        node_id: NodeId,
    },
}

/// Error accessing the object dictionary
#[derive(Clone, Debug, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum OdError {
    /// No entry exists at the requested index / sub index
    #[snafu(display("Object 0x{index:04X}sub{sub} not found in object dictionary"))]
    KeyMissing {
        /// Object index
        index: u16,
        /// Object sub index
        sub: u8,
    },
    /// The entry cannot be written from the bus
    #[snafu(display("Object 0x{index:04X}sub{sub} is not writable"))]
    NotWritable {
        /// Object index
        index: u16,
        /// Object sub index
        sub: u8,
    },
    /// An integer does not fit the entry's data type
    #[snafu(display("Value {value} is out of range for object 0x{index:04X}sub{sub} ({data_type:?})"))]
    ValueOutOfRange {
        /// Object index
        index: u16,
        /// Object sub index
        sub: u8,
        /// The rejected value
        value: i64,
        /// The entry's data type
        data_type: DataType,
    },
    /// A value of the wrong type was assigned
    #[snafu(display("Object 0x{index:04X}sub{sub} holds {expected:?}, got {actual:?}"))]
    TypeMismatch {
        /// Object index
        index: u16,
        /// Object sub index
        sub: u8,
        /// The entry's data type
        expected: DataType,
        /// The type of the rejected value
        actual: DataType,
    },
}

/// Error loading an EDS / DCF file
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum EdsError {
    /// The file could not be read
    #[snafu(display("Failed to read {}: {source}", path.display()))]
    Read {
        /// The file path
        path: PathBuf,
        /// The I/O error
        source: std::io::Error,
    },
    /// The file is not valid INI
    #[snafu(display("Failed to parse EDS: {message}"))]
    Parse {
        /// Parser message
        message: String,
    },
    /// A required key is absent
    #[snafu(display("Section [{section}]: missing {key}"))]
    MissingKey {
        /// The object section
        section: String,
        /// The missing key
        key: &'static str,
    },
    /// A numeric field did not parse
    #[snafu(display("Section [{section}]: invalid value '{value}' for {key}"))]
    InvalidNumber {
        /// The object section
        section: String,
        /// The key holding the value
        key: &'static str,
        /// The raw value
        value: String,
    },
    /// The object uses a data type which is not supported
    #[snafu(display("Section [{section}]: unsupported data type 0x{code:04X}"))]
    UnsupportedDataType {
        /// The object section
        section: String,
        /// The EDS data type code
        code: i64,
    },
}
