use std::{
    io,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use wustsat_common::{CanMessage, CanTransport, TransportError};

type Port = (usize, UnboundedSender<CanMessage>);

/// An in-memory CAN bus
///
/// Frames sent by a transport are delivered to every other connected transport, and to every
/// external receiver.
#[derive(Clone, Default)]
pub struct SimBus {
    ports: Arc<Mutex<Vec<Port>>>,
    // Channels for test listeners which are not nodes
    external_channels: Arc<Mutex<Vec<UnboundedSender<CanMessage>>>>,
    next_port: Arc<AtomicUsize>,
}

impl SimBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn deliver(&self, from: Option<usize>, msg: CanMessage) {
        for (port, tx) in self.ports.lock().unwrap().iter() {
            // Deliver to all transports, except for the sender
            if Some(*port) != from {
                tx.send(msg).ok();
            }
        }
        for ext in self.external_channels.lock().unwrap().iter() {
            // A dropped receiver just means nobody is listening anymore
            ext.send(msg).ok();
        }
    }

    /// Create a transport for a node on this bus
    pub fn new_transport(&self) -> Arc<SimBusTransport> {
        Arc::new(SimBusTransport {
            bus: self.clone(),
            port: self.next_port.fetch_add(1, Ordering::Relaxed),
            rx: Mutex::new(None),
            connected: AtomicBool::new(false),
            fail_connect: AtomicBool::new(false),
            fail_send: AtomicBool::new(false),
            stall_send: AtomicBool::new(false),
            connect_calls: AtomicUsize::new(0),
            disconnect_calls: AtomicUsize::new(0),
        })
    }

    /// Create a listener which sees all frames on the bus
    pub fn new_receiver(&self) -> SimBusReceiver {
        let (tx, rx) = unbounded_channel();
        self.external_channels.lock().unwrap().push(tx);
        SimBusReceiver { channel_rx: rx }
    }

    /// Create a sender which injects frames from outside any node
    pub fn new_sender(&self) -> SimBusSender {
        SimBusSender { bus: self.clone() }
    }

    /// Number of connected transports
    pub fn connected_ports(&self) -> usize {
        self.ports.lock().unwrap().len()
    }
}

type SharedReceiver = Arc<tokio::sync::Mutex<UnboundedReceiver<CanMessage>>>;

/// A [`CanTransport`] on a [`SimBus`], with failure injection
pub struct SimBusTransport {
    bus: SimBus,
    port: usize,
    rx: Mutex<Option<SharedReceiver>>,
    connected: AtomicBool,
    fail_connect: AtomicBool,
    fail_send: AtomicBool,
    stall_send: AtomicBool,
    connect_calls: AtomicUsize,
    disconnect_calls: AtomicUsize,
}

impl SimBusTransport {
    /// Make future connect calls fail
    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::Relaxed);
    }

    /// Make future send calls fail
    pub fn set_fail_send(&self, fail: bool) {
        self.fail_send.store(fail, Ordering::Relaxed);
    }

    /// Make future send calls never complete
    pub fn set_stall_send(&self, stall: bool) {
        self.stall_send.store(stall, Ordering::Relaxed);
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::Relaxed)
    }

    pub fn disconnect_calls(&self) -> usize {
        self.disconnect_calls.load(Ordering::Relaxed)
    }
}

impl CanTransport for SimBusTransport {
    fn connect(&self, channel: &str) -> Result<(), TransportError> {
        self.connect_calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_connect.load(Ordering::Relaxed) {
            return Err(TransportError::Io {
                channel: channel.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "no such device"),
            });
        }
        let (tx, rx) = unbounded_channel();
        let mut ports = self.bus.ports.lock().unwrap();
        ports.retain(|(port, _)| *port != self.port);
        ports.push((self.port, tx));
        *self.rx.lock().unwrap() = Some(Arc::new(tokio::sync::Mutex::new(rx)));
        self.connected.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn disconnect(&self) -> Result<(), TransportError> {
        self.disconnect_calls.fetch_add(1, Ordering::Relaxed);
        self.connected.store(false, Ordering::Relaxed);
        // Dropping the bus side sender wakes any pending recv
        self.bus
            .ports
            .lock()
            .unwrap()
            .retain(|(port, _)| *port != self.port);
        self.rx.lock().unwrap().take();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    async fn send(&self, msg: CanMessage) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        if self.stall_send.load(Ordering::Relaxed) {
            std::future::pending::<()>().await;
        }
        if self.fail_send.load(Ordering::Relaxed) {
            return Err(TransportError::Io {
                channel: "sim".to_string(),
                source: io::Error::new(io::ErrorKind::BrokenPipe, "injected send failure"),
            });
        }
        self.bus.deliver(Some(self.port), msg);
        Ok(())
    }

    async fn recv(&self) -> Result<CanMessage, TransportError> {
        let rx = self
            .rx
            .lock()
            .unwrap()
            .clone()
            .ok_or(TransportError::NotConnected)?;
        let mut rx = rx.lock().await;
        rx.recv().await.ok_or(TransportError::Closed)
    }
}

pub struct SimBusSender {
    bus: SimBus,
}

impl SimBusSender {
    pub fn send(&self, msg: CanMessage) {
        self.bus.deliver(None, msg);
    }
}

pub struct SimBusReceiver {
    channel_rx: UnboundedReceiver<CanMessage>,
}

impl SimBusReceiver {
    pub async fn recv(&mut self) -> Option<CanMessage> {
        self.channel_rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<CanMessage> {
        self.channel_rx.try_recv().ok()
    }

    pub fn flush(&mut self) {
        while self.channel_rx.try_recv().is_ok() {}
    }
}
