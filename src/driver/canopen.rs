use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::error_info;
use super::{ChannelAddress, DeviceChannel, DeviceDriver, DriverInfo, DriverResult, ProtocolSettings};
use crate::error::{DriverError, Error};
use crate::frame::{NmtCommand, NmtNodeControlAddress};
use crate::id::NodeId;
use crate::{CanInterface, FrameHandler, SocketCanInterface};

impl From<Error> for DriverError {
    fn from(err: Error) -> Self {
        let code = match err {
            Error::SdoAborted { abort_code, .. } => abort_code,
            Error::Timeout(_) => error_info::TIMEOUT,
            Error::InterfaceClosed => error_info::CHANNEL_CLOSED,
            Error::Io { .. } => error_info::COMMUNICATION_ERROR,
            Error::InvalidDataLength { .. } => error_info::BAD_PARAMETER,
            _ => error_info::INTERNAL_ERROR,
        };
        DriverError::new(code)
    }
}

/// Talks CANopen to an EPOS4 over a SocketCAN network interface.
#[derive(Clone, Copy, Debug, Default)]
pub struct CanOpenDriver;

impl CanOpenDriver {
    pub const DEVICE_NAME: &'static str = "EPOS4";
    pub const PROTOCOL_NAME: &'static str = "CANopen";
    pub const INTERFACE_NAME: &'static str = "SocketCAN";

    pub fn new() -> Self {
        Self
    }

    fn check_address(address: &ChannelAddress) -> DriverResult<()> {
        let checks = [
            (&address.device_name, Self::DEVICE_NAME, error_info::BAD_DEVICE_NAME),
            (&address.protocol_name, Self::PROTOCOL_NAME, error_info::BAD_PROTOCOL_NAME),
            (&address.interface_name, Self::INTERFACE_NAME, error_info::BAD_INTERFACE_NAME),
        ];
        for (given, expected, code) in checks {
            if !given.eq_ignore_ascii_case(expected) {
                return Err(DriverError::new(code));
            }
        }
        if address.port_name.is_empty() {
            return Err(DriverError::new(error_info::BAD_PORT_NAME));
        }
        Ok(())
    }
}

#[async_trait]
impl DeviceDriver for CanOpenDriver {
    type Channel = CanOpenChannel<SocketCanInterface>;

    async fn open_channel(&self, address: &ChannelAddress) -> DriverResult<Self::Channel> {
        Self::check_address(address)?;
        let interface = SocketCanInterface::open(&address.port_name).map_err(|err| {
            warn!(port = %address.port_name, %err, "failed to open CAN interface");
            DriverError::new(error_info::BAD_PORT_NAME)
        })?;
        info!(port = %address.port_name, "CAN interface opened");
        Ok(CanOpenChannel::new(interface))
    }

    fn driver_info(&self) -> DriverResult<DriverInfo> {
        Ok(DriverInfo {
            library_name: env!("CARGO_PKG_NAME").to_owned(),
            library_version: env!("CARGO_PKG_VERSION").to_owned(),
        })
    }
}

pub struct CanOpenChannel<I> {
    handler: FrameHandler<I>,
    settings: ProtocolSettings,
}

impl<I> CanOpenChannel<I>
where
    I: Send + Sync + CanInterface + 'static,
{
    /// Must be called within a tokio runtime.
    pub fn new(interface: I) -> Self {
        let settings = ProtocolSettings::default();
        let mut handler = FrameHandler::new(interface);
        handler.set_sdo_timeout(settings.timeout());
        Self { handler, settings }
    }
}

#[async_trait]
impl<I> DeviceChannel for CanOpenChannel<I>
where
    I: Send + Sync + CanInterface + 'static,
{
    async fn close(self) -> DriverResult<()> {
        debug!("closing CAN channel");
        drop(self.handler);
        Ok(())
    }

    async fn protocol_settings(&mut self) -> DriverResult<ProtocolSettings> {
        Ok(self.settings)
    }

    async fn set_protocol_settings(&mut self, settings: ProtocolSettings) -> DriverResult<()> {
        if !settings.has_supported_baud_rate() || settings.timeout_ms == 0 {
            return Err(DriverError::new(error_info::BAD_PARAMETER));
        }
        // The bit rate itself belongs to the network interface configuration.
        if settings.baud_rate != self.settings.baud_rate {
            debug!(
                baud_rate = settings.baud_rate,
                "bit rate must match the SocketCAN interface setting"
            );
        }
        self.handler.set_sdo_timeout(settings.timeout());
        self.settings = settings;
        Ok(())
    }

    async fn send_nmt(&mut self, node_id: NodeId, command: NmtCommand) -> DriverResult<()> {
        Ok(self
            .handler
            .nmt_node_control(command, NmtNodeControlAddress::Node(node_id))
            .await?)
    }

    async fn read_object(
        &mut self,
        node_id: NodeId,
        index: u16,
        sub_index: u8,
        len: usize,
    ) -> DriverResult<Vec<u8>> {
        let mut data = self.handler.sdo_read(node_id, index, sub_index).await?;
        data.truncate(len);
        Ok(data)
    }

    async fn write_object(
        &mut self,
        node_id: NodeId,
        index: u16,
        sub_index: u8,
        data: &[u8],
    ) -> DriverResult<()> {
        Ok(self
            .handler
            .sdo_write(node_id, index, sub_index, data.to_vec())
            .await?)
    }
}
