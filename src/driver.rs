//! The device driver capability the bring-up sequencer is written against.
//!
//! A [`DeviceDriver`] opens [`DeviceChannel`]s; a channel exposes raw
//! object-dictionary access and NMT, plus typed EPOS4 operations whose default
//! implementations are plain object-dictionary writes. A vendor library can
//! sit behind these traits just as well as the bundled [`CanOpenDriver`].

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DriverError;
use crate::frame::NmtCommand;
use crate::id::NodeId;

mod canopen;
pub use canopen::{CanOpenChannel, CanOpenDriver};

pub mod error_info;

#[cfg(test)]
pub(crate) mod fake;

pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// EPOS4 object-dictionary entries as `(index, sub-index)`.
pub mod od {
    pub const CONTROLWORD: (u16, u8) = (0x6040, 0x00);
    pub const STATUSWORD: (u16, u8) = (0x6041, 0x00);
    pub const MODES_OF_OPERATION: (u16, u8) = (0x6060, 0x00);
    pub const POSITION_DEMAND_VALUE: (u16, u8) = (0x6062, 0x00);
    pub const MAX_MOTOR_SPEED: (u16, u8) = (0x6080, 0x00);
    pub const PROFILE_ACCELERATION: (u16, u8) = (0x6083, 0x00);
    pub const PROFILE_DECELERATION: (u16, u8) = (0x6084, 0x00);
    pub const TARGET_VELOCITY: (u16, u8) = (0x60FF, 0x00);
    pub const MOTOR_TYPE: (u16, u8) = (0x6402, 0x00);
    pub const NOMINAL_CURRENT: (u16, u8) = (0x3001, 0x01);
    pub const OUTPUT_CURRENT_LIMIT: (u16, u8) = (0x3001, 0x02);
    pub const NUMBER_OF_POLE_PAIRS: (u16, u8) = (0x3001, 0x03);
    pub const THERMAL_TIME_CONSTANT_WINDING: (u16, u8) = (0x3001, 0x04);
    pub const MAX_GEAR_INPUT_SPEED: (u16, u8) = (0x3003, 0x03);
}

/// Controlword commands of the CiA 402 device state machine.
pub mod controlword {
    pub const SHUTDOWN: u16 = 0x0006;
    pub const ENABLE_OPERATION: u16 = 0x000F;
}

/// Names identifying the channel to open, as in `VCS_OpenDevice`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChannelAddress {
    pub device_name: String,
    pub protocol_name: String,
    pub interface_name: String,
    pub port_name: String,
}

impl Default for ChannelAddress {
    fn default() -> Self {
        Self {
            device_name: CanOpenDriver::DEVICE_NAME.to_owned(),
            protocol_name: CanOpenDriver::PROTOCOL_NAME.to_owned(),
            interface_name: CanOpenDriver::INTERFACE_NAME.to_owned(),
            port_name: "can0".to_owned(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DriverInfo {
    pub library_name: String,
    pub library_version: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProtocolSettings {
    pub baud_rate: u32,
    pub timeout_ms: u32,
}

impl ProtocolSettings {
    pub const SUPPORTED_BAUD_RATES: [u32; 7] =
        [1_000_000, 800_000, 500_000, 250_000, 125_000, 50_000, 20_000];

    pub fn has_supported_baud_rate(&self) -> bool {
        Self::SUPPORTED_BAUD_RATES.contains(&self.baud_rate)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms as u64)
    }
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        Self {
            baud_rate: 1_000_000,
            timeout_ms: 500,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotorType {
    /// Brushed DC motor.
    Dc,
    /// Sinusoidally commutated brushless motor.
    SinusCommutatedEc,
    /// Block (trapezoidally) commutated brushless motor.
    BlockCommutatedEc,
}

impl MotorType {
    pub fn as_raw(&self) -> u16 {
        match self {
            Self::Dc => 1,
            Self::SinusCommutatedEc => 10,
            Self::BlockCommutatedEc => 11,
        }
    }

    pub fn is_electronically_commutated(&self) -> bool {
        matches!(self, Self::SinusCommutatedEc | Self::BlockCommutatedEc)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DcMotorParameters {
    pub nominal_current_ma: u32,
    pub output_current_limit_ma: u32,
    /// Thermal time constant of the winding in units of 0.1 s.
    pub thermal_time_constant_ds: u16,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatingMode {
    ProfilePosition,
    ProfileVelocity,
}

impl OperatingMode {
    pub fn as_raw(&self) -> i8 {
        match self {
            Self::ProfilePosition => 1,
            Self::ProfileVelocity => 3,
        }
    }
}

/// Acceleration and deceleration limits in rpm/s.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VelocityProfile {
    pub acceleration: u32,
    pub deceleration: u32,
}

#[async_trait]
pub trait DeviceDriver: Send + Sync {
    type Channel: DeviceChannel;

    async fn open_channel(&self, address: &ChannelAddress) -> DriverResult<Self::Channel>;

    fn driver_info(&self) -> DriverResult<DriverInfo>;

    /// Human-readable text for an error code, if the driver knows it.
    fn error_info(&self, code: u32) -> Option<String> {
        error_info::describe(code).map(str::to_owned)
    }
}

#[async_trait]
pub trait DeviceChannel: Send {
    async fn close(self) -> DriverResult<()>;

    async fn protocol_settings(&mut self) -> DriverResult<ProtocolSettings>;

    async fn set_protocol_settings(&mut self, settings: ProtocolSettings) -> DriverResult<()>;

    async fn send_nmt(&mut self, node_id: NodeId, command: NmtCommand) -> DriverResult<()>;

    /// Reads at most `len` bytes of an object.
    async fn read_object(
        &mut self,
        node_id: NodeId,
        index: u16,
        sub_index: u8,
        len: usize,
    ) -> DriverResult<Vec<u8>>;

    async fn write_object(
        &mut self,
        node_id: NodeId,
        index: u16,
        sub_index: u8,
        data: &[u8],
    ) -> DriverResult<()>;

    async fn set_motor_type(&mut self, node_id: NodeId, motor_type: MotorType) -> DriverResult<()> {
        let (index, sub_index) = od::MOTOR_TYPE;
        self.write_object(node_id, index, sub_index, &motor_type.as_raw().to_le_bytes())
            .await
    }

    async fn set_dc_motor_parameters(
        &mut self,
        node_id: NodeId,
        parameters: DcMotorParameters,
    ) -> DriverResult<()> {
        let (index, sub_index) = od::NOMINAL_CURRENT;
        self.write_object(
            node_id,
            index,
            sub_index,
            &parameters.nominal_current_ma.to_le_bytes(),
        )
        .await?;
        let (index, sub_index) = od::OUTPUT_CURRENT_LIMIT;
        self.write_object(
            node_id,
            index,
            sub_index,
            &parameters.output_current_limit_ma.to_le_bytes(),
        )
        .await?;
        let (index, sub_index) = od::THERMAL_TIME_CONSTANT_WINDING;
        self.write_object(
            node_id,
            index,
            sub_index,
            &parameters.thermal_time_constant_ds.to_le_bytes(),
        )
        .await
    }

    async fn set_pole_pairs(&mut self, node_id: NodeId, pole_pairs: u8) -> DriverResult<()> {
        let (index, sub_index) = od::NUMBER_OF_POLE_PAIRS;
        self.write_object(node_id, index, sub_index, &[pole_pairs])
            .await
    }

    /// Selects the mode of operation and enables the power stage.
    async fn activate_mode(&mut self, node_id: NodeId, mode: OperatingMode) -> DriverResult<()> {
        let (index, sub_index) = od::MODES_OF_OPERATION;
        self.write_object(node_id, index, sub_index, &mode.as_raw().to_le_bytes())
            .await?;
        let (index, sub_index) = od::CONTROLWORD;
        self.write_object(
            node_id,
            index,
            sub_index,
            &controlword::SHUTDOWN.to_le_bytes(),
        )
        .await?;
        self.write_object(
            node_id,
            index,
            sub_index,
            &controlword::ENABLE_OPERATION.to_le_bytes(),
        )
        .await
    }

    async fn set_velocity_profile(
        &mut self,
        node_id: NodeId,
        profile: VelocityProfile,
    ) -> DriverResult<()> {
        let (index, sub_index) = od::PROFILE_ACCELERATION;
        self.write_object(node_id, index, sub_index, &profile.acceleration.to_le_bytes())
            .await?;
        let (index, sub_index) = od::PROFILE_DECELERATION;
        self.write_object(node_id, index, sub_index, &profile.deceleration.to_le_bytes())
            .await
    }

    async fn move_with_velocity(&mut self, node_id: NodeId, velocity: i32) -> DriverResult<()> {
        let (index, sub_index) = od::TARGET_VELOCITY;
        self.write_object(node_id, index, sub_index, &velocity.to_le_bytes())
            .await?;
        let (index, sub_index) = od::CONTROLWORD;
        self.write_object(
            node_id,
            index,
            sub_index,
            &controlword::ENABLE_OPERATION.to_le_bytes(),
        )
        .await
    }
}
