use crate::id::CommunicationObject;

mod emergency;
pub use emergency::EmergencyFrame;

mod nmt_node_control;
pub use nmt_node_control::{NmtCommand, NmtNodeControlAddress, NmtNodeControlFrame};

mod nmt_node_monitoring;
pub use nmt_node_monitoring::{NmtNodeMonitoringFrame, NmtState};

pub(crate) mod sdo;
pub use sdo::{SdoFrame, SdoPayload};

pub(crate) trait ConvertibleFrame {
    fn communication_object(&self) -> CommunicationObject;
    /// Writes the frame payload into `buf` and returns the used part of it.
    fn set_data<'a>(&self, buf: &'a mut [u8]) -> &'a [u8];
}

#[derive(Debug, PartialEq)]
pub enum CanOpenFrame {
    NmtNodeControlFrame(NmtNodeControlFrame),
    NmtNodeMonitoringFrame(NmtNodeMonitoringFrame),
    EmergencyFrame(EmergencyFrame),
    SdoFrame(SdoFrame),
}

impl CanOpenFrame {
    pub fn communication_object(&self) -> CommunicationObject {
        match self {
            Self::NmtNodeControlFrame(frame) => frame.communication_object(),
            Self::NmtNodeMonitoringFrame(frame) => frame.communication_object(),
            Self::EmergencyFrame(frame) => frame.communication_object(),
            Self::SdoFrame(frame) => frame.communication_object(),
        }
    }
}
