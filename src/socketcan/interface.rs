use async_trait::async_trait;
use socketcan::tokio::CanSocket;

use crate::error::Result;
use crate::frame::CanOpenFrame;
use crate::CanInterface;

pub struct SocketCanInterface(CanSocket);

impl SocketCanInterface {
    pub fn open(interface_name: &str) -> Result<Self> {
        Ok(Self(CanSocket::open(interface_name)?))
    }
}

#[async_trait]
impl CanInterface for SocketCanInterface {
    async fn send_frame(&self, frame: CanOpenFrame) -> Result<()> {
        Ok(self.0.write_frame(frame.into()).await?)
    }

    async fn wait_for_frame(&self) -> Result<CanOpenFrame> {
        self.0.read_frame().await?.try_into()
    }
}
