pub mod sim_bus;
pub mod utils;

pub mod prelude {
    pub use super::sim_bus::{SimBus, SimBusReceiver, SimBusSender, SimBusTransport};
    pub use super::utils::{collect_frames, node_config, send_nmt, EdsBuilder, SdoTestClient};
    pub use wustsat_common::{nmt::NmtState, sdo::AbortCode, CanId, CanTransport, NodeId};
    pub use wustsat_node::{Lifecycle, NoHook, NodeError, SimulatedNode};
}
