use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{error, info};
use wustsat_common::constants::object_ids::DEVICE_REGISTER;

use crate::{
    object_dict::Value,
    runtime::{NodeContext, PostStartHook},
};

#[derive(Debug, Default)]
struct ControlState {
    value: Option<Value>,
    writes: usize,
}

/// The LoRa module's control register listener
///
/// On start, the current value of the control register is recorded, and an observer is attached
/// so that every write from the bus updates the recorded value.
#[derive(Clone, Debug, Default)]
pub struct LoraControlListener {
    state: Arc<Mutex<ControlState>>,
}

fn lock(state: &Mutex<ControlState>) -> MutexGuard<'_, ControlState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl LoraControlListener {
    /// Create a listener with no recorded value
    pub fn new() -> Self {
        Self::default()
    }

    /// The last known value of the control register
    pub fn control_value(&self) -> Option<Value> {
        lock(&self.state).value.clone()
    }

    /// Number of bus writes observed since creation
    pub fn write_count(&self) -> usize {
        lock(&self.state).writes
    }
}

impl PostStartHook for LoraControlListener {
    fn post_start(&self, ctx: &NodeContext<'_>) {
        let node_id = ctx.node_id();
        let entry = match ctx.object_dictionary().get(DEVICE_REGISTER) {
            Ok(entry) => entry,
            Err(e) => {
                error!("Node ID {node_id}: {e}, control register will not be monitored");
                return;
            }
        };

        let initial = entry.value().or_else(|| {
            entry
                .default_value()
                .and_then(|text| Value::parse(entry.data_type(), text))
        });
        lock(&self.state).value = initial.clone();

        let state = self.state.clone();
        let result = entry.add_observer(move |write| {
            let old = write
                .old
                .map(Value::to_string)
                .unwrap_or_else(|| "unset".into());
            info!(
                "Node ID {node_id}: control register 0x{:04X} written: {old} -> {}",
                write.index, write.new
            );
            let mut state = lock(&state);
            state.value = Some(write.new.clone());
            state.writes += 1;
        });

        match result {
            Ok(()) => info!(
                "Node ID {node_id}: monitoring control register, current value {}",
                initial.map(|v| v.to_string()).unwrap_or_else(|| "unset".into())
            ),
            Err(e) => error!("Node ID {node_id}: unable to monitor control register: {e}"),
        }
    }
}
