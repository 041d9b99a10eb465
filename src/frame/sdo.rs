use crate::error::{Error, Result};
use crate::frame::{CanOpenFrame, ConvertibleFrame};
use crate::id::{CommunicationObject, NodeId};

/// SDO direction seen from the server: `Tx` frames are server responses,
/// `Rx` frames are client requests.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) enum Direction {
    Tx,
    Rx,
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum ClientCommandSpecifier {
    DownloadSegmentRequest = 0,
    InitiateDownloadRequest = 1,
    InitiateUploadRequest = 2,
    UploadSegmentRequest = 3,
    AbortTransfer = 4,
    BlockUpload = 5,
    BlockDownload = 6,
}

impl ClientCommandSpecifier {
    fn from_num(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::DownloadSegmentRequest),
            1 => Ok(Self::InitiateDownloadRequest),
            2 => Ok(Self::InitiateUploadRequest),
            3 => Ok(Self::UploadSegmentRequest),
            4 => Ok(Self::AbortTransfer),
            5 => Ok(Self::BlockUpload),
            6 => Ok(Self::BlockDownload),
            _ => Err(Error::InvalidCommandSpecifier(value)),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum ServerCommandSpecifier {
    UploadSegmentResponse = 0,
    DownloadSegmentResponse = 1,
    InitiateUploadResponse = 2,
    InitiateDownloadResponse = 3,
    AbortTransfer = 4,
    BlockDownload = 5,
    BlockUpload = 6,
}

impl ServerCommandSpecifier {
    fn from_num(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::UploadSegmentResponse),
            1 => Ok(Self::DownloadSegmentResponse),
            2 => Ok(Self::InitiateUploadResponse),
            3 => Ok(Self::InitiateDownloadResponse),
            4 => Ok(Self::AbortTransfer),
            5 => Ok(Self::BlockDownload),
            6 => Ok(Self::BlockUpload),
            _ => Err(Error::InvalidCommandSpecifier(value)),
        }
    }
}

const EXPEDITED: u8 = 0b0010;
const SIZE_INDICATED: u8 = 0b0001;
const MAX_EXPEDITED_SIZE: usize = 4;

fn expedited_flags(size: usize) -> u8 {
    (((MAX_EXPEDITED_SIZE - size) as u8) << 2) | EXPEDITED | SIZE_INDICATED
}

fn expedited_data(bytes: &[u8]) -> Result<Vec<u8>> {
    if bytes[0] & EXPEDITED == 0 {
        // Segmented transfers are not supported.
        return Err(Error::NotImplemented);
    }
    let size = match bytes[0] & SIZE_INDICATED {
        0 => MAX_EXPEDITED_SIZE,
        _ => MAX_EXPEDITED_SIZE - ((bytes[0] >> 2) & 0b11) as usize,
    };
    Ok(bytes[4..4 + size].to_vec())
}

/// Content of an expedited SDO transfer frame.
#[derive(Clone, Debug, PartialEq)]
pub enum SdoPayload {
    DownloadRequest { data: Vec<u8> },
    DownloadResponse,
    UploadRequest,
    UploadResponse { data: Vec<u8> },
    Abort { abort_code: u32 },
}

#[derive(Clone, Debug, PartialEq)]
pub struct SdoFrame {
    pub(crate) direction: Direction,
    pub node_id: NodeId,
    pub index: u16,
    pub sub_index: u8,
    pub payload: SdoPayload,
}

impl SdoFrame {
    const FRAME_DATA_SIZE: usize = 8;

    pub fn new_sdo_read_frame(node_id: NodeId, index: u16, sub_index: u8) -> Self {
        Self {
            direction: Direction::Rx,
            node_id,
            index,
            sub_index,
            payload: SdoPayload::UploadRequest,
        }
    }

    pub fn new_sdo_write_frame(
        node_id: NodeId,
        index: u16,
        sub_index: u8,
        data: Vec<u8>,
    ) -> Result<Self> {
        if data.is_empty() || data.len() > MAX_EXPEDITED_SIZE {
            return Err(Error::InvalidDataLength {
                length: data.len(),
                data_type: "expedited SDO download".to_owned(),
            });
        }
        Ok(Self {
            direction: Direction::Rx,
            node_id,
            index,
            sub_index,
            payload: SdoPayload::DownloadRequest { data },
        })
    }

    pub fn new_upload_response(
        node_id: NodeId,
        index: u16,
        sub_index: u8,
        data: Vec<u8>,
    ) -> Result<Self> {
        if data.is_empty() || data.len() > MAX_EXPEDITED_SIZE {
            return Err(Error::InvalidDataLength {
                length: data.len(),
                data_type: "expedited SDO upload".to_owned(),
            });
        }
        Ok(Self {
            direction: Direction::Tx,
            node_id,
            index,
            sub_index,
            payload: SdoPayload::UploadResponse { data },
        })
    }

    pub fn new_download_response(node_id: NodeId, index: u16, sub_index: u8) -> Self {
        Self {
            direction: Direction::Tx,
            node_id,
            index,
            sub_index,
            payload: SdoPayload::DownloadResponse,
        }
    }

    /// Abort sent by the server in reply to a request.
    pub fn new_abort_response(node_id: NodeId, index: u16, sub_index: u8, abort_code: u32) -> Self {
        Self {
            direction: Direction::Tx,
            node_id,
            index,
            sub_index,
            payload: SdoPayload::Abort { abort_code },
        }
    }

    pub fn is_response(&self) -> bool {
        self.direction == Direction::Tx
    }

    pub(crate) fn new_with_bytes(
        direction: Direction,
        node_id: NodeId,
        bytes: &[u8],
    ) -> Result<Self> {
        if bytes.len() != Self::FRAME_DATA_SIZE {
            return Err(Error::InvalidDataLength {
                length: bytes.len(),
                data_type: "SdoFrame".to_owned(),
            });
        }
        // cf. https://en.wikipedia.org/wiki/CANopen#Service_Data_Object_(SDO)_protocol
        let specifier = bytes[0] >> 5;
        let payload = match direction {
            Direction::Rx => match ClientCommandSpecifier::from_num(specifier)? {
                ClientCommandSpecifier::InitiateDownloadRequest => SdoPayload::DownloadRequest {
                    data: expedited_data(bytes)?,
                },
                ClientCommandSpecifier::InitiateUploadRequest => SdoPayload::UploadRequest,
                ClientCommandSpecifier::AbortTransfer => SdoPayload::Abort {
                    abort_code: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
                },
                _ => return Err(Error::NotImplemented),
            },
            Direction::Tx => match ServerCommandSpecifier::from_num(specifier)? {
                ServerCommandSpecifier::InitiateDownloadResponse => SdoPayload::DownloadResponse,
                ServerCommandSpecifier::InitiateUploadResponse => SdoPayload::UploadResponse {
                    data: expedited_data(bytes)?,
                },
                ServerCommandSpecifier::AbortTransfer => SdoPayload::Abort {
                    abort_code: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
                },
                _ => return Err(Error::NotImplemented),
            },
        };
        Ok(Self {
            direction,
            node_id,
            index: u16::from_le_bytes([bytes[1], bytes[2]]),
            sub_index: bytes[3],
            payload,
        })
    }
}

impl From<SdoFrame> for CanOpenFrame {
    fn from(frame: SdoFrame) -> Self {
        CanOpenFrame::SdoFrame(frame)
    }
}

impl ConvertibleFrame for SdoFrame {
    fn communication_object(&self) -> CommunicationObject {
        match self.direction {
            Direction::Tx => CommunicationObject::TxSdo(self.node_id),
            Direction::Rx => CommunicationObject::RxSdo(self.node_id),
        }
    }

    fn set_data<'a>(&self, buf: &'a mut [u8]) -> &'a [u8] {
        let buf = &mut buf[..Self::FRAME_DATA_SIZE];
        buf.fill(0x00);
        buf[1..3].copy_from_slice(&self.index.to_le_bytes());
        buf[3] = self.sub_index;
        match &self.payload {
            SdoPayload::DownloadRequest { data } => {
                buf[0] = ((ClientCommandSpecifier::InitiateDownloadRequest as u8) << 5)
                    | expedited_flags(data.len());
                buf[4..4 + data.len()].copy_from_slice(data);
            }
            SdoPayload::DownloadResponse => {
                buf[0] = (ServerCommandSpecifier::InitiateDownloadResponse as u8) << 5;
            }
            SdoPayload::UploadRequest => {
                buf[0] = (ClientCommandSpecifier::InitiateUploadRequest as u8) << 5;
            }
            SdoPayload::UploadResponse { data } => {
                buf[0] = ((ServerCommandSpecifier::InitiateUploadResponse as u8) << 5)
                    | expedited_flags(data.len());
                buf[4..4 + data.len()].copy_from_slice(data);
            }
            SdoPayload::Abort { abort_code } => {
                buf[0] = (ClientCommandSpecifier::AbortTransfer as u8) << 5;
                buf[4..8].copy_from_slice(&abort_code.to_le_bytes());
            }
        }
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(raw: u8) -> NodeId {
        raw.try_into().unwrap()
    }

    #[test]
    fn test_client_command_specifier_from_num() {
        assert_eq!(
            ClientCommandSpecifier::from_num(1),
            Ok(ClientCommandSpecifier::InitiateDownloadRequest)
        );
        assert_eq!(
            ClientCommandSpecifier::from_num(4),
            Ok(ClientCommandSpecifier::AbortTransfer)
        );
        assert_eq!(
            ClientCommandSpecifier::from_num(7),
            Err(Error::InvalidCommandSpecifier(7))
        );
    }

    #[test]
    fn test_set_data() {
        let mut buf = [0u8; 8];

        // Product code
        let data = SdoFrame::new_sdo_read_frame(node(1), 0x1018, 2).set_data(&mut buf);
        assert_eq!(data, &[0x40, 0x18, 0x10, 0x02, 0x00, 0x00, 0x00, 0x00]);

        // Modes of operation: profile velocity
        let data = SdoFrame::new_sdo_write_frame(node(1), 0x6060, 0, vec![0x03])
            .unwrap()
            .set_data(&mut buf);
        assert_eq!(data, &[0x2F, 0x60, 0x60, 0x00, 0x03, 0x00, 0x00, 0x00]);

        // Controlword
        let data = SdoFrame::new_sdo_write_frame(node(2), 0x6040, 0, vec![0x0F, 0x00])
            .unwrap()
            .set_data(&mut buf);
        assert_eq!(data, &[0x2B, 0x40, 0x60, 0x00, 0x0F, 0x00, 0x00, 0x00]);

        // Target velocity
        let data = SdoFrame::new_sdo_write_frame(node(3), 0x60FF, 0, vec![0xE8, 0x03, 0x00, 0x00])
            .unwrap()
            .set_data(&mut buf);
        assert_eq!(data, &[0x23, 0xFF, 0x60, 0x00, 0xE8, 0x03, 0x00, 0x00]);

        let data = SdoFrame::new_download_response(node(3), 0x60FF, 0).set_data(&mut buf);
        assert_eq!(data, &[0x60, 0xFF, 0x60, 0x00, 0x00, 0x00, 0x00, 0x00]);

        // Device type
        let data = SdoFrame::new_upload_response(node(4), 0x1000, 0, vec![0x92, 0x01, 0x02, 0x00])
            .unwrap()
            .set_data(&mut buf);
        assert_eq!(data, &[0x43, 0x00, 0x10, 0x00, 0x92, 0x01, 0x02, 0x00]);

        let data = SdoFrame::new_abort_response(node(5), 0x1000, 0, 0x0601_0002).set_data(&mut buf);
        assert_eq!(data, &[0x80, 0x00, 0x10, 0x00, 0x02, 0x00, 0x01, 0x06]);
    }

    #[test]
    fn test_write_frame_data_length() {
        assert!(SdoFrame::new_sdo_write_frame(node(1), 0x6040, 0, vec![]).is_err());
        assert_eq!(
            SdoFrame::new_sdo_write_frame(node(1), 0x6040, 0, vec![0; 5]),
            Err(Error::InvalidDataLength {
                length: 5,
                data_type: "expedited SDO download".to_owned()
            })
        );
    }

    #[test]
    fn test_new_with_bytes() {
        assert_eq!(
            SdoFrame::new_with_bytes(
                Direction::Tx,
                node(1),
                &[0x4B, 0x41, 0x60, 0x00, 0x40, 0x02, 0x00, 0x00]
            ),
            Ok(SdoFrame {
                direction: Direction::Tx,
                node_id: node(1),
                index: 0x6041,
                sub_index: 0,
                payload: SdoPayload::UploadResponse {
                    data: vec![0x40, 0x02]
                },
            })
        );
        assert_eq!(
            SdoFrame::new_with_bytes(
                Direction::Tx,
                node(1),
                &[0x60, 0x60, 0x60, 0x00, 0x00, 0x00, 0x00, 0x00]
            ),
            Ok(SdoFrame::new_download_response(node(1), 0x6060, 0))
        );
        assert_eq!(
            SdoFrame::new_with_bytes(
                Direction::Tx,
                node(7),
                &[0x80, 0x02, 0x30, 0x03, 0x00, 0x00, 0x02, 0x06]
            ),
            Ok(SdoFrame::new_abort_response(node(7), 0x3002, 3, 0x0602_0000))
        );
        assert_eq!(
            SdoFrame::new_with_bytes(
                Direction::Rx,
                node(2),
                &[0x2F, 0x60, 0x60, 0x00, 0x03, 0x00, 0x00, 0x00]
            ),
            Ok(SdoFrame::new_sdo_write_frame(node(2), 0x6060, 0, vec![0x03]).unwrap())
        );
        // Expedited without size indication carries four bytes.
        assert_eq!(
            SdoFrame::new_with_bytes(
                Direction::Tx,
                node(1),
                &[0x42, 0x62, 0x60, 0x00, 0x01, 0x02, 0x03, 0x04]
            )
            .map(|frame| frame.payload),
            Ok(SdoPayload::UploadResponse {
                data: vec![0x01, 0x02, 0x03, 0x04]
            })
        );
    }

    #[test]
    fn test_new_with_bytes_unsupported() {
        // Segmented upload response
        assert_eq!(
            SdoFrame::new_with_bytes(
                Direction::Tx,
                node(1),
                &[0x41, 0x08, 0x10, 0x00, 0x10, 0x00, 0x00, 0x00]
            ),
            Err(Error::NotImplemented)
        );
        assert_eq!(
            SdoFrame::new_with_bytes(
                Direction::Tx,
                node(1),
                &[0xE0, 0x00, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00]
            ),
            Err(Error::InvalidCommandSpecifier(7))
        );
        assert!(SdoFrame::new_with_bytes(Direction::Tx, node(1), &[0x60, 0x00]).is_err());
    }

    #[test]
    fn test_communication_object() {
        assert_eq!(
            SdoFrame::new_sdo_read_frame(node(10), 0x1000, 0).communication_object(),
            CommunicationObject::RxSdo(node(10))
        );
        assert_eq!(
            SdoFrame::new_download_response(node(10), 0x1000, 0).communication_object(),
            CommunicationObject::TxSdo(node(10))
        );
    }
}
