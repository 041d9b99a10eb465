use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::oneshot::{self, Receiver, Sender};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::error::{Error, Result};
use crate::frame::{CanOpenFrame, NmtState, SdoFrame, SdoPayload};
use crate::frame::{NmtCommand, NmtNodeControlAddress, NmtNodeControlFrame};
use crate::id::NodeId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct ObjectDictionaryAddress {
    node_id: NodeId,
    index: u16,
    sub_index: u8,
}

/// Response to an SDO request: the uploaded bytes, or the abort code.
type SdoResponse = std::result::Result<Vec<u8>, u32>;
type WaitingTable = Arc<Mutex<HashMap<ObjectDictionaryAddress, Sender<SdoResponse>>>>;

#[async_trait]
pub trait CanInterface {
    async fn send_frame(&self, frame: CanOpenFrame) -> Result<()>;
    async fn wait_for_frame(&self) -> Result<CanOpenFrame>;
}

/// Matches SDO responses to their requests. A background task owns the
/// receive side of the interface until the handler is dropped.
pub struct FrameHandler<I> {
    interface: Arc<I>,
    waiting_table: WaitingTable,
    receiver: JoinHandle<()>,
    sdo_timeout: Duration,
}

impl<I> FrameHandler<I>
where
    I: Send + Sync + CanInterface + 'static,
{
    pub const DEFAULT_SDO_TIMEOUT: Duration = Duration::from_millis(500);

    pub fn new(interface: I) -> Self {
        let interface = Arc::new(interface);
        let waiting_table = Arc::new(Mutex::new(HashMap::new()));

        let receiver = spawn_receiver(Arc::clone(&interface), Arc::clone(&waiting_table));

        Self {
            interface,
            waiting_table,
            receiver,
            sdo_timeout: Self::DEFAULT_SDO_TIMEOUT,
        }
    }

    pub fn set_sdo_timeout(&mut self, timeout: Duration) {
        self.sdo_timeout = timeout;
    }

    async fn add_waiting_item(&self, address: ObjectDictionaryAddress) -> Receiver<SdoResponse> {
        let (response_sender, response_receiver) = oneshot::channel();
        self.waiting_table
            .lock()
            .await
            .insert(address, response_sender);
        response_receiver
    }

    pub async fn nmt_node_control(
        &self,
        command: NmtCommand,
        address: NmtNodeControlAddress,
    ) -> Result<()> {
        let frame = NmtNodeControlFrame::new(command, address);
        self.interface.send_frame(frame.into()).await
    }

    pub async fn sdo_read(&self, node_id: NodeId, index: u16, sub_index: u8) -> Result<Vec<u8>> {
        self.sdo_transfer(SdoFrame::new_sdo_read_frame(node_id, index, sub_index))
            .await
    }

    pub async fn sdo_write(
        &self,
        node_id: NodeId,
        index: u16,
        sub_index: u8,
        data: Vec<u8>,
    ) -> Result<()> {
        let frame = SdoFrame::new_sdo_write_frame(node_id, index, sub_index, data)?;
        self.sdo_transfer(frame).await.map(|_| ())
    }

    async fn sdo_transfer(&self, request: SdoFrame) -> Result<Vec<u8>> {
        let address = ObjectDictionaryAddress {
            node_id: request.node_id,
            index: request.index,
            sub_index: request.sub_index,
        };
        let response = self.add_waiting_item(address).await;

        if let Err(err) = self.interface.send_frame(request.into()).await {
            self.waiting_table.lock().await.remove(&address);
            return Err(err);
        }

        match tokio::time::timeout(self.sdo_timeout, response).await {
            Ok(Ok(Ok(data))) => Ok(data),
            Ok(Ok(Err(abort_code))) => Err(Error::SdoAborted {
                index: address.index,
                sub_index: address.sub_index,
                abort_code,
            }),
            Ok(Err(_)) => Err(Error::InterfaceClosed),
            Err(_) => {
                self.waiting_table.lock().await.remove(&address);
                Err(Error::Timeout(self.sdo_timeout))
            }
        }
    }
}

impl<I> Drop for FrameHandler<I> {
    fn drop(&mut self) {
        self.receiver.abort();
    }
}

fn spawn_receiver<I: Send + Sync + CanInterface + 'static>(
    interface: Arc<I>,
    waiting_table: WaitingTable,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match interface.wait_for_frame().await {
                Ok(CanOpenFrame::SdoFrame(frame)) if frame.is_response() => {
                    let response = match frame.payload {
                        SdoPayload::UploadResponse { data } => Ok(data),
                        SdoPayload::DownloadResponse => Ok(Vec::new()),
                        SdoPayload::Abort { abort_code } => Err(abort_code),
                        _ => continue,
                    };
                    let address = ObjectDictionaryAddress {
                        node_id: frame.node_id,
                        index: frame.index,
                        sub_index: frame.sub_index,
                    };
                    match waiting_table.lock().await.remove(&address) {
                        // The requester may already have timed out.
                        Some(sender) => {
                            let _ = sender.send(response);
                        }
                        None => debug!(
                            node_id = %address.node_id,
                            "unsolicited SDO response for 0x{:04X}:{:02X}",
                            address.index,
                            address.sub_index
                        ),
                    }
                }
                Ok(CanOpenFrame::NmtNodeMonitoringFrame(frame)) => match frame.state {
                    NmtState::BootUp => info!(node_id = %frame.node_id, "node booted"),
                    state => trace!(node_id = %frame.node_id, ?state, "heartbeat"),
                },
                Ok(CanOpenFrame::EmergencyFrame(frame)) if frame.is_error_reset() => {
                    info!(node_id = %frame.node_id, "errors cleared")
                }
                Ok(CanOpenFrame::EmergencyFrame(frame)) => warn!(
                    node_id = %frame.node_id,
                    error_register = frame.error_register,
                    detail = ?frame.manufacturer_data,
                    "emergency 0x{:04X}",
                    frame.error_code
                ),
                Ok(frame) => trace!(?frame, "ignored frame"),
                Err(err @ (Error::Io { .. } | Error::InterfaceClosed)) => {
                    error!(%err, "CAN receive failed");
                    break;
                }
                Err(err) => trace!(%err, "undecodable frame"),
            }
        }
        // Dropping the senders wakes every pending request.
        waiting_table.lock().await.clear();
    })
}
