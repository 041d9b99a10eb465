use crate::error::{Error, Result};
use crate::frame::{CanOpenFrame, ConvertibleFrame};
use crate::id::{CommunicationObject, NodeId};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NmtCommand {
    Operational = 0x01,
    Stopped = 0x02,
    PreOperational = 0x80,
    ResetNode = 0x81,
    ResetCommunication = 0x82,
}

impl NmtCommand {
    fn as_byte(&self) -> u8 {
        *self as u8
    }

    fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0x01 => Ok(Self::Operational),
            0x02 => Ok(Self::Stopped),
            0x80 => Ok(Self::PreOperational),
            0x81 => Ok(Self::ResetNode),
            0x82 => Ok(Self::ResetCommunication),
            _ => Err(Error::InvalidNmtCommand(byte)),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum NmtNodeControlAddress {
    AllNodes,
    Node(NodeId),
}

impl NmtNodeControlAddress {
    fn as_byte(&self) -> u8 {
        match self {
            Self::AllNodes => 0x00,
            Self::Node(node_id) => node_id.as_raw(),
        }
    }

    fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0x00 => Ok(Self::AllNodes),
            _ => Ok(Self::Node(byte.try_into()?)),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct NmtNodeControlFrame {
    pub command: NmtCommand,
    pub address: NmtNodeControlAddress,
}

impl NmtNodeControlFrame {
    const FRAME_DATA_SIZE: usize = 2;

    pub fn new(command: NmtCommand, address: NmtNodeControlAddress) -> Self {
        Self { command, address }
    }

    pub(crate) fn new_with_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::FRAME_DATA_SIZE {
            return Err(Error::InvalidDataLength {
                length: bytes.len(),
                data_type: "NmtNodeControlFrame".to_owned(),
            });
        }
        Ok(Self::new(
            NmtCommand::from_byte(bytes[0])?,
            NmtNodeControlAddress::from_byte(bytes[1])?,
        ))
    }
}

impl From<NmtNodeControlFrame> for CanOpenFrame {
    fn from(frame: NmtNodeControlFrame) -> Self {
        CanOpenFrame::NmtNodeControlFrame(frame)
    }
}

impl ConvertibleFrame for NmtNodeControlFrame {
    fn communication_object(&self) -> CommunicationObject {
        CommunicationObject::NmtNodeControl
    }

    fn set_data<'a>(&self, buf: &'a mut [u8]) -> &'a [u8] {
        buf[0] = self.command.as_byte();
        buf[1] = self.address.as_byte();
        &buf[..Self::FRAME_DATA_SIZE]
    }
}
