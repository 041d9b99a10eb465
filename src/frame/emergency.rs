use crate::error::{Error, Result};
use crate::frame::{CanOpenFrame, ConvertibleFrame};
use crate::id::{CommunicationObject, NodeId};

/// EMCY message. EPOS4 puts device-specific detail in the last five bytes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EmergencyFrame {
    pub node_id: NodeId,
    pub error_code: u16,
    pub error_register: u8,
    pub manufacturer_data: [u8; 5],
}

impl EmergencyFrame {
    const FRAME_DATA_SIZE: usize = 8;

    pub fn new(node_id: NodeId, error_code: u16, error_register: u8) -> Self {
        Self {
            node_id,
            error_code,
            error_register,
            manufacturer_data: [0; 5],
        }
    }

    /// Sent once all errors of the node have been cleared.
    pub fn is_error_reset(&self) -> bool {
        self.error_code == 0x0000
    }

    pub(crate) fn new_with_bytes(node_id: NodeId, bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::FRAME_DATA_SIZE {
            return Err(Error::InvalidDataLength {
                length: bytes.len(),
                data_type: "EmergencyFrame".to_owned(),
            });
        }
        let mut manufacturer_data = [0; 5];
        manufacturer_data.copy_from_slice(&bytes[3..]);
        Ok(Self {
            node_id,
            error_code: u16::from_le_bytes([bytes[0], bytes[1]]),
            error_register: bytes[2],
            manufacturer_data,
        })
    }
}

impl From<EmergencyFrame> for CanOpenFrame {
    fn from(frame: EmergencyFrame) -> Self {
        CanOpenFrame::EmergencyFrame(frame)
    }
}

impl ConvertibleFrame for EmergencyFrame {
    fn communication_object(&self) -> CommunicationObject {
        CommunicationObject::Emergency(self.node_id)
    }

    fn set_data<'a>(&self, buf: &'a mut [u8]) -> &'a [u8] {
        buf[0..2].copy_from_slice(&self.error_code.to_le_bytes());
        buf[2] = self.error_register;
        buf[3..Self::FRAME_DATA_SIZE].copy_from_slice(&self.manufacturer_data);
        &buf[..Self::FRAME_DATA_SIZE]
    }
}
