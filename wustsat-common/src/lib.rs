//! Common functionality shared among the wustsat crates.
//!
//! This holds the bus level vocabulary: CAN identifiers and frames, NMT states and the heartbeat
//! byte table, node IDs, expedited SDO messages, and the [`CanTransport`] trait through which a
//! simulated node reaches the bus.
#![warn(missing_docs, missing_copy_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod atomic_cell;
pub use atomic_cell::AtomicCell;
pub mod constants;
pub mod messages;
pub mod nmt;
pub mod node_id;
pub mod sdo;
pub mod traits;

#[cfg(all(feature = "socketcan", target_os = "linux"))]
mod socketcan;

#[cfg(all(feature = "socketcan", target_os = "linux"))]
#[cfg_attr(docsrs, doc(cfg(feature = "socketcan")))]
pub use socketcan::SocketCanTransport;

pub use messages::{CanId, CanMessage};
pub use node_id::NodeId;
pub use traits::{CanTransport, TransportError};
