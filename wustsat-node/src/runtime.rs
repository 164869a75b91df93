//! The simulated node runtime
//!
//! A [`SimulatedNode`] owns one device's lifecycle on the bus:
//!
//! ```text
//! Uninitialized -> Connecting -> PreOperational -> Operational -> Stopping -> Disconnected
//! ```
//!
//! [`SimulatedNode::start`] loads the object dictionary, opens the transport, and spawns the
//! background tasks. [`SimulatedNode::run`] waits until the node is stopped or the process is
//! interrupted. [`SimulatedNode::stop`] tears everything down, and can be called any number of
//! times, from any task.
//!
//! Device specific behavior is injected with a [`PostStartHook`].

use std::{
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use log::{debug, error, info, warn};
use snafu::ResultExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use wustsat_common::{nmt::NmtState, AtomicCell, CanTransport, NodeId};

use crate::{
    error::{AlreadyStartedSnafu, ConfigNotFoundSnafu, DictionaryLoadSnafu, NodeError},
    heartbeat::{produce_heartbeats, read_heartbeat_interval},
    object_dict::ObjectDictionary,
    receiver::Receiver,
};

const STOP_TIMEOUT: Duration = Duration::from_secs(2);
const RUN_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Identity and configuration of a simulated node
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeConfig {
    /// The node's CANopen ID
    pub node_id: NodeId,
    /// Path to the node's EDS / DCF file
    pub od_path: PathBuf,
    /// The transport channel to connect on, e.g. "vcan0"
    pub channel: String,
}

/// What a [`PostStartHook`] can see of a freshly started node
#[derive(Debug)]
pub struct NodeContext<'a> {
    node_id: NodeId,
    od: &'a Arc<ObjectDictionary>,
}

impl<'a> NodeContext<'a> {
    /// Create a context for `node_id` with its dictionary
    pub fn new(node_id: NodeId, od: &'a Arc<ObjectDictionary>) -> Self {
        Self { node_id, od }
    }

    /// The node's ID
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// The object dictionary loaded for this run of the node
    pub fn object_dictionary(&self) -> &'a Arc<ObjectDictionary> {
        self.od
    }
}

/// Device specific setup, run by [`SimulatedNode::start`] once the node is operational
pub trait PostStartHook: Send + Sync {
    /// Called at the end of a successful start
    ///
    /// Failures in the hook are expected to be logged by it; they never abort the start.
    fn post_start(&self, ctx: &NodeContext<'_>);

    /// Called during stop, after the background tasks have ended
    fn on_stop(&self) {}
}

/// A hook for nodes with no device specific behavior
#[derive(Clone, Copy, Debug, Default)]
pub struct NoHook;

impl PostStartHook for NoHook {
    fn post_start(&self, _ctx: &NodeContext<'_>) {}
}

/// Lifecycle of a [`SimulatedNode`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Lifecycle {
    /// Not yet started
    #[default]
    Uninitialized,
    /// Opening the transport
    Connecting,
    /// Connected, not yet operational
    PreOperational,
    /// Running
    Operational,
    /// Tearing down
    Stopping,
    /// Stopped
    Disconnected,
}

struct Running {
    token: CancellationToken,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

/// A simulated CANopen node
pub struct SimulatedNode<T: CanTransport> {
    config: NodeConfig,
    transport: Arc<T>,
    hook: Arc<dyn PostStartHook>,
    nmt_state: Arc<AtomicCell<NmtState>>,
    lifecycle: AtomicCell<Lifecycle>,
    heartbeat_interval: AtomicCell<u32>,
    od: Mutex<Option<Arc<ObjectDictionary>>>,
    running: tokio::sync::Mutex<Option<Running>>,
}

impl<T: CanTransport> core::fmt::Debug for SimulatedNode<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SimulatedNode")
            .field("config", &self.config)
            .field("nmt_state", &self.nmt_state.load())
            .field("lifecycle", &self.lifecycle.load())
            .field("heartbeat_interval", &self.heartbeat_interval.load())
            .finish_non_exhaustive()
    }
}

impl<T: CanTransport> SimulatedNode<T> {
    /// Create a node which will run on `transport`
    pub fn new(config: NodeConfig, transport: Arc<T>, hook: Arc<dyn PostStartHook>) -> Self {
        Self {
            config,
            transport,
            hook,
            nmt_state: Arc::new(AtomicCell::new(NmtState::Initialising)),
            lifecycle: AtomicCell::new(Lifecycle::Uninitialized),
            heartbeat_interval: AtomicCell::new(0),
            od: Mutex::new(None),
            running: tokio::sync::Mutex::new(None),
        }
    }

    fn od_guard(&self) -> MutexGuard<'_, Option<Arc<ObjectDictionary>>> {
        self.od.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, lifecycle: Lifecycle, nmt: NmtState) {
        self.lifecycle.store(lifecycle);
        self.nmt_state.store(nmt);
    }

    /// The node's ID
    pub fn node_id(&self) -> NodeId {
        self.config.node_id
    }

    /// The node's configuration
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// The NMT state currently announced in heartbeats
    pub fn nmt_state(&self) -> NmtState {
        self.nmt_state.load()
    }

    /// The node's lifecycle state
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.load()
    }

    /// The effective heartbeat interval of the current run, 0 when disabled or stopped
    pub fn heartbeat_interval_ms(&self) -> u32 {
        self.heartbeat_interval.load()
    }

    /// The object dictionary of the current run
    pub fn object_dictionary(&self) -> Option<Arc<ObjectDictionary>> {
        self.od_guard().clone()
    }

    /// The transport the node runs on
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Bring the node onto the bus
    ///
    /// On success the node is operational, its heartbeat is running if the configured interval is
    /// non-zero, and the post start hook has been called. If the transport fails to connect, it is
    /// disconnected again before the error is returned.
    pub async fn start(&self) -> Result<(), NodeError> {
        let node_id = self.config.node_id;
        let mut running = self.running.lock().await;
        if running.is_some() {
            return AlreadyStartedSnafu { node_id }.fail();
        }

        info!(
            "Node ID {node_id}: starting on {} with {}",
            self.config.channel,
            self.config.od_path.display()
        );
        if !self.config.od_path.exists() {
            return ConfigNotFoundSnafu {
                path: self.config.od_path.clone(),
            }
            .fail();
        }
        let od = Arc::new(
            ObjectDictionary::load_eds(&self.config.od_path, node_id)
                .context(DictionaryLoadSnafu)?,
        );
        debug!("Node ID {node_id}: loaded {} objects", od.len());

        self.set_state(Lifecycle::Connecting, NmtState::Connecting);
        if let Err(source) = self.transport.connect(&self.config.channel) {
            if let Err(e) = self.transport.disconnect() {
                warn!("Node ID {node_id}: error disconnecting after failed connect: {e}");
            }
            self.set_state(Lifecycle::Disconnected, NmtState::Disconnected);
            return Err(NodeError::Transport { source });
        }
        self.set_state(Lifecycle::PreOperational, NmtState::PreOperational);
        self.set_state(Lifecycle::Operational, NmtState::Operational);
        info!("Node ID {node_id}: connected, {}", NmtState::Operational);

        let interval = read_heartbeat_interval(&od, node_id);
        self.heartbeat_interval.store(interval);
        *self.od_guard() = Some(od.clone());

        let token = CancellationToken::new();
        let mut tasks = Vec::new();
        if interval > 0 {
            tasks.push((
                "heartbeat",
                tokio::spawn(produce_heartbeats(
                    node_id,
                    Duration::from_millis(interval as u64),
                    self.nmt_state.clone(),
                    self.transport.clone(),
                    token.clone(),
                )),
            ));
        } else {
            info!("Node ID {node_id}: heartbeat disabled");
        }

        self.hook.post_start(&NodeContext { node_id, od: &od });

        // Bus writes are only served once the hook has wired up the dictionary
        let receiver = Receiver::new(
            node_id,
            od,
            self.nmt_state.clone(),
            self.transport.clone(),
        );
        tasks.push(("receiver", tokio::spawn(receiver.run(token.clone()))));

        *running = Some(Running { token, tasks });
        info!("Node ID {node_id}: started");
        Ok(())
    }

    /// Wait until the node is stopped or the process receives Ctrl+C, then stop it
    ///
    /// Returns immediately, logging an error, if the node was not started.
    pub async fn run(&self) {
        let node_id = self.config.node_id;
        let token = match self.running.lock().await.as_ref() {
            Some(running) => running.token.clone(),
            None => {
                error!("Node ID {node_id}: run called before start");
                return;
            }
        };

        info!("Node ID {node_id}: running");
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                result = tokio::signal::ctrl_c() => {
                    match result {
                        Ok(()) => info!("Node ID {node_id}: interrupted, shutting down"),
                        Err(e) => error!("Node ID {node_id}: unable to listen for interrupt: {e}"),
                    }
                    break;
                }
                _ = tokio::time::sleep(RUN_POLL_INTERVAL) => (),
            }
        }
        self.stop().await;
    }

    /// Take the node off the bus
    ///
    /// Idempotent, and never fails: every problem during teardown is logged and teardown continues.
    pub async fn stop(&self) {
        let node_id = self.config.node_id;
        let mut running = self.running.lock().await;
        let Some(Running { token, tasks }) = running.take() else {
            info!("Node ID {node_id}: not running, nothing to stop");
            if self.transport.is_connected() {
                if let Err(e) = self.transport.disconnect() {
                    warn!("Node ID {node_id}: error disconnecting: {e}");
                }
            }
            self.lifecycle.store(Lifecycle::Disconnected);
            return;
        };

        info!("Node ID {node_id}: stopping");
        self.lifecycle.store(Lifecycle::Stopping);
        token.cancel();
        // The tasks wind down concurrently, so one deadline bounds the whole shutdown
        let deadline = tokio::time::Instant::now() + STOP_TIMEOUT;
        for (name, mut handle) in tasks {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => debug!("Node ID {node_id}: {name} task ended"),
                Ok(Err(e)) => warn!("Node ID {node_id}: {name} task failed: {e}"),
                Err(_) => {
                    warn!(
                        "Node ID {node_id}: {name} task did not stop within {} s, aborting",
                        STOP_TIMEOUT.as_secs()
                    );
                    handle.abort();
                }
            }
        }

        self.nmt_state.store(NmtState::Resetting);
        self.hook.on_stop();
        self.heartbeat_interval.store(0);
        self.od_guard().take();

        if self.transport.is_connected() {
            if let Err(e) = self.transport.disconnect() {
                warn!("Node ID {node_id}: error disconnecting: {e}");
            }
        }
        self.lifecycle.store(Lifecycle::Disconnected);
        info!("Node ID {node_id}: stopped");
    }
}
