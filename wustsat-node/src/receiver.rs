//! Handling of frames received by a running node
//!
//! The receiver reacts to NMT commands addressed to the node (or broadcast), and serves expedited
//! SDO transfers against the node's object dictionary. Writes made by SDO downloads go through
//! [`ObjectEntry::write_from_bus`], so they notify the entry's observers.

use std::{sync::Arc, time::Duration};

use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;
use wustsat_common::{
    messages::NmtCommand,
    nmt::{NmtCommandSpecifier, NmtState},
    sdo::{AbortCode, SdoRequest, SdoResponse},
    AtomicCell, CanMessage, CanTransport, NodeId, TransportError,
};

use crate::object_dict::{ObjectDictionary, ObjectEntry};

const RECV_RETRY_DELAY: Duration = Duration::from_millis(100);

pub(crate) struct Receiver<T: CanTransport> {
    node_id: NodeId,
    od: Arc<ObjectDictionary>,
    nmt_state: Arc<AtomicCell<NmtState>>,
    transport: Arc<T>,
}

impl<T: CanTransport> Receiver<T> {
    pub fn new(
        node_id: NodeId,
        od: Arc<ObjectDictionary>,
        nmt_state: Arc<AtomicCell<NmtState>>,
        transport: Arc<T>,
    ) -> Self {
        Self {
            node_id,
            od,
            nmt_state,
            transport,
        }
    }

    /// Receive and handle frames until `token` is cancelled
    pub async fn run(self, token: CancellationToken) {
        let node_id = self.node_id;
        loop {
            let result = tokio::select! {
                _ = token.cancelled() => break,
                result = self.transport.recv() => result,
            };
            match result {
                Ok(msg) => self.handle_message(msg).await,
                Err(e) => {
                    match e {
                        TransportError::NotConnected => debug!("Node ID {node_id}: {e}"),
                        _ => warn!("Node ID {node_id}: receive error: {e}"),
                    }
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = tokio::time::sleep(RECV_RETRY_DELAY) => (),
                    }
                }
            }
        }
        debug!("Node ID {node_id}: receiver stopped");
    }

    async fn handle_message(&self, msg: CanMessage) {
        if msg.is_rtr() {
            return;
        }
        if let Ok(cmd) = NmtCommand::try_from(msg) {
            if cmd.targets(self.node_id.raw()) {
                self.handle_nmt(cmd.cs);
            }
        } else if msg.id() == self.node_id.sdo_rx_cob_id() {
            if let Some(resp) = self.handle_sdo(msg.data()) {
                let reply = CanMessage::new(self.node_id.sdo_tx_cob_id(), &resp.to_bytes());
                if let Err(e) = self.transport.send(reply).await {
                    warn!("Node ID {}: error sending SDO response: {e}", self.node_id);
                }
            }
        }
    }

    fn handle_nmt(&self, cs: NmtCommandSpecifier) {
        let node_id = self.node_id;
        let next = match cs {
            NmtCommandSpecifier::Start => NmtState::Operational,
            NmtCommandSpecifier::Stop => NmtState::Stopped,
            NmtCommandSpecifier::EnterPreOp => NmtState::PreOperational,
            NmtCommandSpecifier::ResetApp => {
                self.nmt_state.store(NmtState::ResetNode);
                NmtState::PreOperational
            }
            NmtCommandSpecifier::ResetComm => {
                self.nmt_state.store(NmtState::ResetCommunication);
                NmtState::PreOperational
            }
        };
        let prev = self.nmt_state.swap(next);
        info!("Node ID {node_id}: NMT {cs:?}, {prev} -> {next}");
    }

    fn lookup(&self, index: u16, sub: u8) -> Result<&Arc<ObjectEntry>, AbortCode> {
        self.od.get_sub(index, sub).map_err(|_| {
            if self.od.contains_index(index) {
                AbortCode::NoSuchSubIndex
            } else {
                AbortCode::NoSuchObject
            }
        })
    }

    fn handle_sdo(&self, data: &[u8]) -> Option<SdoResponse> {
        let node_id = self.node_id;
        let req = match SdoRequest::try_from(data) {
            Ok(req) => req,
            Err(_) => {
                warn!("Node ID {node_id}: malformed SDO request {data:02X?}");
                return None;
            }
        };
        let (index, sub) = req.object();
        let result = match req {
            SdoRequest::InitiateDownload { s, .. } => self.download(&req, s),
            SdoRequest::InitiateUpload { .. } => self.upload(index, sub),
            SdoRequest::Abort { abort_code, .. } => {
                debug!("Node ID {node_id}: client aborted 0x{index:04X}sub{sub}: 0x{abort_code:08X}");
                return None;
            }
            SdoRequest::Unsupported { .. } => Err(AbortCode::InvalidCommandSpecifier),
        };
        Some(result.unwrap_or_else(|code| {
            debug!("Node ID {node_id}: SDO abort 0x{index:04X}sub{sub}: {code:?}");
            SdoResponse::abort(index, sub, code)
        }))
    }

    fn download(&self, req: &SdoRequest, size_indicated: bool) -> Result<SdoResponse, AbortCode> {
        let (index, sub) = req.object();
        // Segmented downloads are not served
        let data = req.expedited_data().ok_or(AbortCode::UnsupportedAccess)?;
        let entry = self.lookup(index, sub)?;
        let data = match entry.data_type().size() {
            Some(size) if !size_indicated && size <= data.len() => &data[..size],
            _ => data,
        };
        entry.write_from_bus(data)?;
        debug!(
            "Node ID {}: SDO write 0x{index:04X}sub{sub} <- {data:02X?}",
            self.node_id
        );
        Ok(SdoResponse::ConfirmDownload { index, sub })
    }

    fn upload(&self, index: u16, sub: u8) -> Result<SdoResponse, AbortCode> {
        let value = self.lookup(index, sub)?.read_for_bus()?;
        if value.is_empty() {
            // An expedited response cannot encode zero bytes
            return Err(AbortCode::NoData);
        }
        if value.len() > 4 {
            return Err(AbortCode::UnsupportedAccess);
        }
        Ok(SdoResponse::expedited_upload(index, sub, &value))
    }
}
