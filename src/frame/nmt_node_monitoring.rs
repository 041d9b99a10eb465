use crate::error::{Error, Result};
use crate::frame::{CanOpenFrame, ConvertibleFrame};
use crate::id::{CommunicationObject, NodeId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NmtState {
    BootUp = 0x00,
    Stopped = 0x04,
    Operational = 0x05,
    PreOperational = 0x7F,
}

impl NmtState {
    fn as_byte(&self) -> u8 {
        *self as u8
    }

    fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0x00 => Ok(Self::BootUp),
            0x04 => Ok(Self::Stopped),
            0x05 => Ok(Self::Operational),
            0x7F => Ok(Self::PreOperational),
            _ => Err(Error::InvalidNmtState(byte)),
        }
    }
}

/// Heartbeat or boot-up message of a node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NmtNodeMonitoringFrame {
    pub node_id: NodeId,
    pub state: NmtState,
}

impl NmtNodeMonitoringFrame {
    const FRAME_DATA_SIZE: usize = 1;

    pub fn new(node_id: NodeId, state: NmtState) -> Self {
        Self { node_id, state }
    }

    pub(crate) fn new_with_bytes(node_id: NodeId, bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::FRAME_DATA_SIZE {
            return Err(Error::InvalidDataLength {
                length: bytes.len(),
                data_type: "NmtNodeMonitoringFrame".to_owned(),
            });
        }
        // The toggle bit is only used by node guarding responses.
        Ok(Self::new(node_id, NmtState::from_byte(bytes[0] & 0x7F)?))
    }
}

impl From<NmtNodeMonitoringFrame> for CanOpenFrame {
    fn from(frame: NmtNodeMonitoringFrame) -> Self {
        CanOpenFrame::NmtNodeMonitoringFrame(frame)
    }
}

impl ConvertibleFrame for NmtNodeMonitoringFrame {
    fn communication_object(&self) -> CommunicationObject {
        CommunicationObject::NmtNodeMonitoring(self.node_id)
    }

    fn set_data<'a>(&self, buf: &'a mut [u8]) -> &'a [u8] {
        buf[0] = self.state.as_byte();
        &buf[..Self::FRAME_DATA_SIZE]
    }
}
