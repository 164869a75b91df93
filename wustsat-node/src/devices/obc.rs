use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{error, info, warn};
use wustsat_common::{constants::object_ids::DEVICE_REGISTER, AtomicCell, NodeId};

use crate::{
    object_dict::ObjectDictionary,
    runtime::{NodeContext, PostStartHook},
};

/// Status reported by a healthy OBC
pub const STATUS_OK: u8 = 1;

#[derive(Debug)]
struct Attached {
    node_id: NodeId,
    od: Arc<ObjectDictionary>,
}

/// The OBC's status register publisher
///
/// The status is written to the status register when the node starts, so that peers can read it
/// over SDO. [`ObcStatusPublisher::set_status`] updates it while the node runs.
#[derive(Debug)]
pub struct ObcStatusPublisher {
    status: AtomicCell<u8>,
    attached: Mutex<Option<Attached>>,
}

impl Default for ObcStatusPublisher {
    fn default() -> Self {
        Self::new(STATUS_OK)
    }
}

impl ObcStatusPublisher {
    /// Create a publisher with an initial status
    pub fn new(status: u8) -> Self {
        Self {
            status: AtomicCell::new(status),
            attached: Mutex::new(None),
        }
    }

    fn attached(&self) -> MutexGuard<'_, Option<Attached>> {
        self.attached.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The current internal status
    pub fn status(&self) -> u8 {
        self.status.load()
    }

    /// Update the status, and publish it in the status register
    ///
    /// Has no effect, other than a warning, while the node is not started.
    pub fn set_status(&self, status: u8) {
        let attached = self.attached();
        let Some(Attached { node_id, od }) = attached.as_ref() else {
            warn!("OBC node not started, status {status} not set");
            return;
        };
        self.status.store(status);
        publish(*node_id, od, status);
    }
}

fn publish(node_id: NodeId, od: &ObjectDictionary, status: u8) {
    let result = od
        .get(DEVICE_REGISTER)
        .and_then(|entry| entry.set_integer(status as i64));
    match result {
        Ok(()) => info!("Node ID {node_id}: status register set to {status}"),
        Err(e) => error!("Node ID {node_id}: unable to publish status: {e}"),
    }
}

impl PostStartHook for ObcStatusPublisher {
    fn post_start(&self, ctx: &NodeContext<'_>) {
        let node_id = ctx.node_id();
        let od = ctx.object_dictionary().clone();
        publish(node_id, &od, self.status());
        *self.attached() = Some(Attached { node_id, od });
    }

    fn on_stop(&self) {
        self.attached().take();
    }
}
