//! Common traits

use core::future::Future;

use snafu::Snafu;

use crate::messages::CanMessage;

/// Error returned by a [`CanTransport`]
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum TransportError {
    /// The transport has no open connection
    #[snafu(display("Transport is not connected"))]
    NotConnected,
    /// The bus on the other side of the transport went away
    #[snafu(display("Transport channel closed"))]
    Closed,
    /// The underlying device failed
    #[snafu(display("I/O error on channel {channel}: {source}"))]
    Io {
        /// The channel being accessed
        channel: String,
        /// The underlying error
        source: std::io::Error,
    },
    /// A frame could not be converted to or from the device representation
    #[snafu(display("Invalid frame: {message}"))]
    InvalidFrame {
        /// Description of the problem
        message: String,
    },
}

/// A connection to a CAN bus, shared between a node's control loop and its background tasks
///
/// All methods take `&self` so that one transport can be held in an `Arc` by the heartbeat producer
/// and the receiver at the same time. A single `send` is atomic from the caller's perspective.
pub trait CanTransport: Send + Sync + 'static {
    /// Open the connection on the named channel, e.g. "vcan0"
    fn connect(&self, channel: &str) -> Result<(), TransportError>;

    /// Close the connection
    ///
    /// Disconnecting a transport which is not connected succeeds.
    fn disconnect(&self) -> Result<(), TransportError>;

    /// True while a connection is open
    fn is_connected(&self) -> bool;

    /// Send a message to the bus
    fn send(&self, msg: CanMessage) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Wait for the next message from the bus
    fn recv(&self) -> impl Future<Output = Result<CanMessage, TransportError>> + Send;
}
