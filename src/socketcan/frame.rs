use libc::CAN_MAX_DLEN;
use socketcan::EmbeddedFrame;

use crate::error::{Error, Result};
use crate::frame::sdo::Direction;
use crate::frame::{
    CanOpenFrame, ConvertibleFrame, EmergencyFrame, NmtNodeControlFrame, NmtNodeMonitoringFrame,
    SdoFrame,
};
use crate::id::CommunicationObject;

fn to_socketcan_frame<T: ConvertibleFrame>(frame: &T) -> socketcan::CanFrame {
    let mut buf = [0u8; CAN_MAX_DLEN];
    let data = frame.set_data(&mut buf);
    socketcan::CanFrame::new(frame.communication_object(), data)
        .expect("Should have failed only when the data length exceeded `CAN_MAX_DLEN`")
}

impl From<CanOpenFrame> for socketcan::CanFrame {
    fn from(frame: CanOpenFrame) -> Self {
        match frame {
            CanOpenFrame::NmtNodeControlFrame(frame) => to_socketcan_frame(&frame),
            CanOpenFrame::NmtNodeMonitoringFrame(frame) => to_socketcan_frame(&frame),
            CanOpenFrame::EmergencyFrame(frame) => to_socketcan_frame(&frame),
            CanOpenFrame::SdoFrame(frame) => to_socketcan_frame(&frame),
        }
    }
}

impl TryFrom<socketcan::CanFrame> for CanOpenFrame {
    type Error = Error;
    fn try_from(frame: socketcan::CanFrame) -> Result<Self> {
        match frame {
            socketcan::CanFrame::Data(frame) => {
                let cob: CommunicationObject = frame.id().try_into()?;
                match cob {
                    CommunicationObject::NmtNodeControl => {
                        Ok(NmtNodeControlFrame::new_with_bytes(frame.data())?.into())
                    }
                    CommunicationObject::Emergency(node_id) => {
                        Ok(EmergencyFrame::new_with_bytes(node_id, frame.data())?.into())
                    }
                    CommunicationObject::TxSdo(node_id) => {
                        Ok(SdoFrame::new_with_bytes(Direction::Tx, node_id, frame.data())?.into())
                    }
                    CommunicationObject::RxSdo(node_id) => {
                        Ok(SdoFrame::new_with_bytes(Direction::Rx, node_id, frame.data())?.into())
                    }
                    CommunicationObject::NmtNodeMonitoring(node_id) => {
                        Ok(NmtNodeMonitoringFrame::new_with_bytes(node_id, frame.data())?.into())
                    }
                    _ => Err(Error::NotImplemented),
                }
            }
            socketcan::CanFrame::Remote(_) => Err(Error::NotImplemented),
            socketcan::CanFrame::Error(_) => Err(Error::NotImplemented),
        }
    }
}
