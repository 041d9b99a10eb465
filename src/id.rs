use std::fmt;

use serde::Deserialize;

use crate::error::{Error, Result};

/// CANopen node ID. Only the 7-bit range is valid on the bus.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "u8")]
pub struct NodeId(u8);

impl NodeId {
    pub fn new(raw_id: u8) -> Result<Self> {
        match raw_id & 0x80 {
            0 => Ok(Self(raw_id)),
            _ => Err(Error::InvalidNodeId(raw_id)),
        }
    }

    pub fn as_raw(&self) -> u8 {
        self.0
    }
}

/// The lowest ID a device can be given.
impl Default for NodeId {
    fn default() -> Self {
        Self(1)
    }
}

impl TryFrom<u8> for NodeId {
    type Error = Error;
    fn try_from(raw_id: u8) -> std::result::Result<Self, Self::Error> {
        NodeId::new(raw_id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum CommunicationObject {
    NmtNodeControl,
    Sync,
    Emergency(NodeId),
    /// Transmit PDO 1..=4 of a node.
    TxPdo(u8, NodeId),
    /// Receive PDO 1..=4 of a node.
    RxPdo(u8, NodeId),
    TxSdo(NodeId),
    RxSdo(NodeId),
    NmtNodeMonitoring(NodeId),
}

impl CommunicationObject {
    const FUNCTION_CODE_MASK: u16 = 0x0780;
    const NODE_ID_MASK: u16 = 0x007F;

    pub(crate) fn new(cob_id: u16) -> Result<Self> {
        if cob_id & !0x07FF != 0 {
            return Err(Error::InvalidCobId(cob_id));
        }
        let node_id = NodeId((cob_id & Self::NODE_ID_MASK) as u8);
        match (cob_id & Self::FUNCTION_CODE_MASK, node_id.as_raw()) {
            (0x000, 0) => Ok(Self::NmtNodeControl),
            (0x080, 0) => Ok(Self::Sync),
            (0x080, _) => Ok(Self::Emergency(node_id)),
            (0x180, _) => Ok(Self::TxPdo(1, node_id)),
            (0x200, _) => Ok(Self::RxPdo(1, node_id)),
            (0x280, _) => Ok(Self::TxPdo(2, node_id)),
            (0x300, _) => Ok(Self::RxPdo(2, node_id)),
            (0x380, _) => Ok(Self::TxPdo(3, node_id)),
            (0x400, _) => Ok(Self::RxPdo(3, node_id)),
            (0x480, _) => Ok(Self::TxPdo(4, node_id)),
            (0x500, _) => Ok(Self::RxPdo(4, node_id)),
            (0x580, _) => Ok(Self::TxSdo(node_id)),
            (0x600, _) => Ok(Self::RxSdo(node_id)),
            (0x700, _) => Ok(Self::NmtNodeMonitoring(node_id)),
            _ => Err(Error::InvalidCobId(cob_id)),
        }
    }

    pub(crate) fn as_cob_id(&self) -> u16 {
        let (function_code, node_id) = match self {
            Self::NmtNodeControl => (0x000, 0),
            Self::Sync => (0x080, 0),
            Self::Emergency(node_id) => (0x080, node_id.as_raw()),
            Self::TxPdo(n, node_id) => (0x100 + 0x100 * *n as u16 - 0x080, node_id.as_raw()),
            Self::RxPdo(n, node_id) => (0x100 + 0x100 * *n as u16, node_id.as_raw()),
            Self::TxSdo(node_id) => (0x580, node_id.as_raw()),
            Self::RxSdo(node_id) => (0x600, node_id.as_raw()),
            Self::NmtNodeMonitoring(node_id) => (0x700, node_id.as_raw()),
        };
        function_code + node_id as u16
    }
}
