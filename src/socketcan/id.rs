use crate::error::{Error, Result};
use crate::id::CommunicationObject;

impl From<CommunicationObject> for socketcan::Id {
    fn from(cob: CommunicationObject) -> Self {
        socketcan::Id::Standard(socketcan::StandardId::new(cob.as_cob_id()).expect(
            "COB-IDs are built from a function code and a 7-bit node ID, so they always fit in 11 bits",
        ))
    }
}

impl TryFrom<socketcan::Id> for CommunicationObject {
    type Error = Error;
    fn try_from(id: socketcan::Id) -> Result<Self> {
        match id {
            socketcan::Id::Standard(id) => CommunicationObject::new(id.as_raw()),
            socketcan::Id::Extended(_id) => Err(Error::ExtendedIdNotSupported),
        }
    }
}
