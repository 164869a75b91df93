//! Simulated CANopen nodes for the WUST-Sat platform bus
//!
//! Wustsat-node runs stand-ins for the satellite's modules on a CAN bus, so that ground tooling and
//! other modules can be exercised without flight hardware. Each simulated node:
//!
//! * Loads its *object dictionary* from a CANopen EDS file each time it starts.
//! * Announces its *NMT* state in a periodic heartbeat, at the interval configured in object
//!   0x1017.
//! * Reacts to NMT commands, and serves expedited *SDO* reads and writes of its dictionary.
//! * Runs device specific behavior, such as watching a control register or publishing a status.
//!
//! # Getting Started
//!
//! ## Device Configuration
//!
//! A node is configured with a [`NodeConfig`]: its node ID, the path to its EDS file, and the
//! transport channel to join. For the modules which ship with the simulator, a
//! [`DeviceProfile`](devices::DeviceProfile) builds the config:
//!
//! ```ignore
//! let config = devices::OBC_PROFILE.node_config("eds", "vcan0")?;
//! ```
//!
//! ## Running a node
//!
//! A [`SimulatedNode`] is created with a transport and a [`PostStartHook`] for the device behavior.
//!
//! ```ignore
//! let obc = Arc::new(ObcStatusPublisher::default());
//! let node = SimulatedNode::new(config, Arc::new(SocketCanTransport::new()), obc.clone());
//! node.start().await?;
//! obc.set_status(2);
//! node.run().await;
//! ```
//!
//! `run` returns when the process is interrupted or another task calls [`SimulatedNode::stop`]. It
//! always stops the node before returning. `stop` may be called again afterwards; it does nothing
//! on a node which is not running.
#![warn(missing_docs, missing_debug_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod devices;
mod eds;
mod error;
mod heartbeat;
pub mod object_dict;
mod receiver;
mod runtime;

pub use eds::parse_eds;
pub use error::{EdsError, NodeError, OdError};
pub use heartbeat::read_heartbeat_interval;
pub use object_dict::{ObjectDictionary, ObjectEntry};
pub use runtime::{Lifecycle, NoHook, NodeConfig, NodeContext, PostStartHook, SimulatedNode};

// Re-export types used in API
pub use wustsat_common as common;

#[cfg(all(feature = "socketcan", target_os = "linux"))]
#[cfg_attr(docsrs, doc(cfg(feature = "socketcan")))]
pub use wustsat_common::SocketCanTransport;
