use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{
    messages::{CanId, CanMessage},
    traits::{CanTransport, InvalidFrameSnafu, IoSnafu, TransportError},
};
use log::warn;
use snafu::ResultExt;
use socketcan::{CanFrame, CanSocket, EmbeddedFrame, ExtendedId, Id, Socket, StandardId};
use tokio::io::{unix::AsyncFd, Interest};

fn socketcan_id_to_wustsat_id(id: Id) -> CanId {
    match id {
        Id::Standard(id) => CanId::std(id.as_raw()),
        Id::Extended(id) => CanId::extended(id.as_raw()),
    }
}

fn wustsat_id_to_socketcan_id(id: CanId) -> Option<Id> {
    match id {
        CanId::Extended(id) => ExtendedId::new(id).map(Id::from),
        CanId::Std(id) => StandardId::new(id).map(Id::from),
    }
}

fn wustsat_message_to_socket_frame(msg: CanMessage) -> Result<CanFrame, TransportError> {
    let frame = wustsat_id_to_socketcan_id(msg.id()).and_then(|id| {
        if msg.is_rtr() {
            CanFrame::new_remote(id, 0)
        } else {
            CanFrame::new(id, msg.data())
        }
    });
    frame.ok_or_else(|| {
        InvalidFrameSnafu {
            message: format!("cannot encode frame with id {}", msg.id()),
        }
        .build()
    })
}

/// An async socket around a socketcan CanSocket, so reads and writes can be awaited on tokio
#[derive(Debug)]
struct AsyncCanSocket(AsyncFd<CanSocket>);

impl AsyncCanSocket {
    fn open(ifname: &str) -> Result<Self, std::io::Error> {
        let socket = CanSocket::open(ifname)?;
        socket.set_nonblocking(true)?;
        Ok(Self(AsyncFd::new(socket)?))
    }

    async fn read_frame(&self) -> Result<CanFrame, std::io::Error> {
        self.0
            .async_io(Interest::READABLE, |inner| inner.read_frame())
            .await
    }

    async fn write_frame(&self, frame: &CanFrame) -> Result<(), std::io::Error> {
        self.0
            .async_io(Interest::WRITABLE, |inner| inner.write_frame(frame))
            .await
    }
}

/// A [`CanTransport`] on a Linux SocketCAN interface
///
/// The transport starts out disconnected. [`CanTransport::connect`] opens the named interface,
/// e.g. "vcan0" or "can0", and must be called from within a tokio runtime.
#[derive(Debug, Default)]
pub struct SocketCanTransport {
    socket: Mutex<Option<(String, Arc<AsyncCanSocket>)>>,
}

impl SocketCanTransport {
    /// Create a disconnected transport
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, Option<(String, Arc<AsyncCanSocket>)>> {
        self.socket.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current(&self) -> Result<(String, Arc<AsyncCanSocket>), TransportError> {
        self.guard().clone().ok_or(TransportError::NotConnected)
    }
}

impl CanTransport for SocketCanTransport {
    fn connect(&self, channel: &str) -> Result<(), TransportError> {
        let socket = AsyncCanSocket::open(channel).context(IoSnafu { channel })?;
        *self.guard() = Some((channel.to_string(), Arc::new(socket)));
        Ok(())
    }

    fn disconnect(&self) -> Result<(), TransportError> {
        // Dropping the last reference closes the socket
        self.guard().take();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.guard().is_some()
    }

    async fn send(&self, msg: CanMessage) -> Result<(), TransportError> {
        let (channel, socket) = self.current()?;
        let frame = wustsat_message_to_socket_frame(msg)?;
        socket.write_frame(&frame).await.context(IoSnafu { channel })
    }

    async fn recv(&self) -> Result<CanMessage, TransportError> {
        let (channel, socket) = self.current()?;
        loop {
            let frame = socket
                .read_frame()
                .await
                .context(IoSnafu { channel: &channel })?;
            let id = socketcan_id_to_wustsat_id(frame.id());
            match frame {
                CanFrame::Data(frame) => return Ok(CanMessage::new(id, frame.data())),
                CanFrame::Remote(_) => return Ok(CanMessage::new_rtr(id)),
                CanFrame::Error(_) => warn!("Error frame received on {channel}"),
            }
        }
    }
}
