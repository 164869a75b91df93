//! Heartbeat production
//!
//! The heartbeat interval comes from the producer heartbeat time object (0x1017). While the node is
//! running, a background task announces the node's current NMT state on `0x700 + node_id` once per
//! interval, starting immediately.

use std::{sync::Arc, time::Duration};

use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;
use wustsat_common::{
    constants::object_ids::HEARTBEAT_PRODUCER_TIME, messages::Heartbeat, nmt::NmtState,
    AtomicCell, CanMessage, CanTransport, NodeId,
};

use crate::object_dict::{parse_integer, ObjectDictionary};

/// Read the effective heartbeat interval in milliseconds
///
/// When the entry has no value, its declared default is applied to it first. A missing entry, a
/// missing default, or a default which is not an integer all yield 0, which disables the heartbeat.
pub fn read_heartbeat_interval(od: &ObjectDictionary, node_id: NodeId) -> u32 {
    let entry = match od.get(HEARTBEAT_PRODUCER_TIME) {
        Ok(entry) => entry,
        Err(e) => {
            warn!("Node ID {node_id}: {e}, heartbeat disabled");
            return 0;
        }
    };

    let interval = match entry.value() {
        Some(value) => value.as_integer().unwrap_or(0),
        None => {
            let interval = entry.default_value().and_then(parse_integer).unwrap_or(0);
            debug!("Node ID {node_id}: heartbeat time unset, applying default {interval}");
            if let Err(e) = entry.set_integer(interval) {
                warn!("Node ID {node_id}: could not apply heartbeat default: {e}");
            }
            interval
        }
    };
    u32::try_from(interval).unwrap_or(0)
}

/// Send heartbeats until `token` is cancelled
///
/// Send failures and a disconnected transport are logged and the interval is waited out before the
/// next attempt; neither ends the task.
pub(crate) async fn produce_heartbeats<T: CanTransport>(
    node_id: NodeId,
    interval: Duration,
    nmt_state: Arc<AtomicCell<NmtState>>,
    transport: Arc<T>,
    token: CancellationToken,
) {
    info!(
        "Node ID {node_id}: heartbeat producer started ({} ms)",
        interval.as_millis()
    );
    loop {
        if transport.is_connected() {
            let state = nmt_state.load();
            let msg: CanMessage = Heartbeat {
                node: node_id.raw(),
                state,
            }
            .into();
            match transport.send(msg).await {
                Ok(()) => debug!("Node ID {node_id}: heartbeat sent, state {state}"),
                Err(e) => warn!("Node ID {node_id}: error sending heartbeat: {e}"),
            }
        } else {
            warn!("Node ID {node_id}: transport not connected, heartbeat skipped");
        }

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(interval) => (),
        }
    }
    debug!("Node ID {node_id}: heartbeat producer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_dict::{DataType, ObjectEntry, Value};

    fn node() -> NodeId {
        NodeId::new(20).unwrap()
    }

    fn od_with(entry: ObjectEntry) -> ObjectDictionary {
        let mut od = ObjectDictionary::new();
        od.insert(entry);
        od
    }

    fn heartbeat_entry() -> ObjectEntry {
        ObjectEntry::new(HEARTBEAT_PRODUCER_TIME, 0, "Producer heartbeat time", DataType::Unsigned16)
    }

    #[test]
    fn test_stored_value_wins() {
        let od = od_with(heartbeat_entry().with_default("1000").with_value(Value::U16(250)));
        assert_eq!(250, read_heartbeat_interval(&od, node()));
    }

    #[test]
    fn test_default_applied_to_entry() {
        let od = od_with(heartbeat_entry().with_default("0x3E8"));
        assert_eq!(1000, read_heartbeat_interval(&od, node()));
        assert_eq!(
            Some(Value::U16(1000)),
            od.get(HEARTBEAT_PRODUCER_TIME).unwrap().value()
        );
    }

    #[test]
    fn test_fallbacks_to_zero() {
        let od = od_with(heartbeat_entry());
        assert_eq!(0, read_heartbeat_interval(&od, node()));

        let od = od_with(heartbeat_entry().with_default("fast"));
        assert_eq!(0, read_heartbeat_interval(&od, node()));

        assert_eq!(0, read_heartbeat_interval(&ObjectDictionary::new(), node()));
    }

    #[test]
    fn test_out_of_range_default() {
        // Does not fit UNSIGNED16, so the entry keeps no value, but the interval is still read
        let od = od_with(heartbeat_entry().with_default("70000"));
        assert_eq!(70000, read_heartbeat_interval(&od, node()));
        assert_eq!(None, od.get(HEARTBEAT_PRODUCER_TIME).unwrap().value());
    }
}
