//! The EPOS4 bring-up sequence.
//!
//! A [`Sequencer`] owns the driver; [`Sequencer::open_channel`] hands out a
//! [`Device`] session that must be consumed by [`Device::close`]. Every step
//! awaits the previous one and the first failure ends the sequence.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::driver::{
    error_info, od, ChannelAddress, DcMotorParameters, DeviceChannel, DeviceDriver, DriverInfo,
    DriverResult, MotorType, OperatingMode, ProtocolSettings, VelocityProfile,
};
use crate::error::{BringUpError, DriverError, MotorParameter, Operation};
use crate::frame::NmtCommand;
use crate::id::NodeId;

/// Everything written by [`Device::configure_motor`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MotorParameters {
    pub motor_type: MotorType,
    pub nominal_current_ma: u32,
    pub output_current_limit_ma: u32,
    /// Winding thermal time constant in units of 0.1 s.
    pub thermal_time_constant_ds: u16,
    /// Only written for electronically commutated motors.
    pub pole_pairs: u8,
    pub max_motor_speed_rpm: u32,
    pub max_gear_input_speed_rpm: u32,
}

impl MotorParameters {
    pub fn dc_motor_parameters(&self) -> DcMotorParameters {
        DcMotorParameters {
            nominal_current_ma: self.nominal_current_ma,
            output_current_limit_ma: self.output_current_limit_ma,
            thermal_time_constant_ds: self.thermal_time_constant_ds,
        }
    }
}

impl Default for MotorParameters {
    fn default() -> Self {
        Self {
            motor_type: MotorType::SinusCommutatedEc,
            nominal_current_ma: 1_000,
            output_current_limit_ma: 2_000,
            thermal_time_constant_ds: 400,
            pole_pairs: 8,
            max_motor_speed_rpm: 10_000,
            max_gear_input_speed_rpm: 10_000,
        }
    }
}

/// How long to keep polling a node after an NMT reset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReadinessPolicy {
    pub poll_interval_ms: u64,
    pub max_attempts: u32,
    pub timeout_ms: u64,
}

impl ReadinessPolicy {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            max_attempts: 50,
            timeout_ms: 5_000,
        }
    }
}

fn describe<D: DeviceDriver>(driver: &D, mut err: DriverError) -> DriverError {
    if err.description.is_none() {
        err.description = driver.error_info(err.code);
    }
    err
}

pub struct Sequencer<D> {
    driver: D,
}

impl<D: DeviceDriver> Sequencer<D> {
    pub fn new(driver: D) -> Self {
        Self { driver }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_info(&self) -> Result<DriverInfo, BringUpError> {
        let info = self
            .driver
            .driver_info()
            .map_err(|err| BringUpError::Driver {
                operation: Operation::GetDriverInfo,
                source: describe(&self.driver, err),
            })?;
        info!(
            library = %info.library_name,
            version = %info.library_version,
            "driver information"
        );
        Ok(info)
    }

    pub async fn open_channel(
        &self,
        address: &ChannelAddress,
    ) -> Result<Device<'_, D>, BringUpError> {
        info!(
            device = %address.device_name,
            protocol = %address.protocol_name,
            interface = %address.interface_name,
            port = %address.port_name,
            "opening device"
        );
        let channel = self
            .driver
            .open_channel(address)
            .await
            .map_err(|err| BringUpError::Driver {
                operation: Operation::OpenDevice,
                source: describe(&self.driver, err),
            })?;
        Ok(Device {
            driver: &self.driver,
            channel,
        })
    }

    /// Runs the whole bring-up sequence. The device is closed on every path.
    pub async fn run(&self, config: &Config) -> Result<(), BringUpError> {
        self.driver_info()?;
        let mut device = self.open_channel(&config.device).await?;
        let result = device.bring_up(config).await;
        device.finish(result).await?;
        info!("bring-up complete");
        Ok(())
    }

    /// Dumps driver information and the current protocol settings.
    pub async fn inspect(&self, config: &Config) -> Result<ProtocolSettings, BringUpError> {
        self.driver_info()?;
        let mut device = self.open_channel(&config.device).await?;
        let result = device.protocol_settings().await;
        device.finish(result).await
    }

    /// Reads one object of the configured node.
    pub async fn query(
        &self,
        config: &Config,
        index: u16,
        sub_index: u8,
        width: usize,
    ) -> Result<Vec<u8>, BringUpError> {
        let mut device = self.open_channel(&config.device).await?;
        let result = device
            .query_object(config.node_id, index, sub_index, width)
            .await;
        device.finish(result).await
    }
}

/// An open channel to the device.
pub struct Device<'d, D: DeviceDriver> {
    driver: &'d D,
    channel: D::Channel,
}

impl<'d, D: DeviceDriver> Device<'d, D> {
    fn driver_error(&self, operation: Operation, err: DriverError) -> BringUpError {
        BringUpError::Driver {
            operation,
            source: describe(self.driver, err),
        }
    }

    pub async fn protocol_settings(&mut self) -> Result<ProtocolSettings, BringUpError> {
        let settings = self
            .channel
            .protocol_settings()
            .await
            .map_err(|err| self.driver_error(Operation::GetProtocolSettings, err))?;
        info!(
            baud_rate = settings.baud_rate,
            timeout_ms = settings.timeout_ms,
            "protocol settings"
        );
        Ok(settings)
    }

    pub async fn apply_protocol_settings(
        &mut self,
        settings: ProtocolSettings,
    ) -> Result<(), BringUpError> {
        self.channel
            .set_protocol_settings(settings)
            .await
            .map_err(|err| self.driver_error(Operation::SetProtocolSettings, err))?;
        info!(
            baud_rate = settings.baud_rate,
            timeout_ms = settings.timeout_ms,
            "protocol settings applied"
        );
        Ok(())
    }

    /// Sends NMT reset node. The node is unavailable until it has rebooted;
    /// see [`Device::wait_until_ready`].
    pub async fn reset_node(&mut self, node_id: NodeId) -> Result<(), BringUpError> {
        self.channel
            .send_nmt(node_id, NmtCommand::ResetNode)
            .await
            .map_err(|err| self.driver_error(Operation::ResetNode, err))?;
        info!(%node_id, "node reset requested");
        Ok(())
    }

    /// Polls the statusword until the node answers.
    pub async fn wait_until_ready(
        &mut self,
        node_id: NodeId,
        policy: &ReadinessPolicy,
    ) -> Result<(), BringUpError> {
        let driver = self.driver;
        let channel = &mut self.channel;
        let (index, sub_index) = od::STATUSWORD;
        let poll = async {
            let mut last = None;
            for attempt in 1..=policy.max_attempts {
                match channel.read_object(node_id, index, sub_index, 2).await {
                    Ok(statusword) => {
                        debug!(%node_id, attempt, ?statusword, "statusword read");
                        return Ok(());
                    }
                    Err(err) => {
                        debug!(%node_id, attempt, %err, "node not ready");
                        last = Some(err);
                    }
                }
                if attempt < policy.max_attempts {
                    tokio::time::sleep(policy.poll_interval()).await;
                }
            }
            Err(BringUpError::NotReady {
                node_id,
                attempts: policy.max_attempts,
                last: last.map(|err| describe(driver, err)),
            })
        };
        match tokio::time::timeout(policy.timeout(), poll).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(BringUpError::ReadinessTimeout {
                    node_id,
                    timeout: policy.timeout(),
                })
            }
        }
        info!(%node_id, "node ready");
        Ok(())
    }

    /// Writes the motor parameters in a fixed order, stopping at the first
    /// rejected write. Fields already written stay on the device.
    pub async fn configure_motor(
        &mut self,
        node_id: NodeId,
        parameters: &MotorParameters,
    ) -> Result<(), BringUpError> {
        let mut last_applied = None;

        let result = self
            .channel
            .set_motor_type(node_id, parameters.motor_type)
            .await;
        self.applied(MotorParameter::MotorType, result, &mut last_applied)?;

        let result = self
            .channel
            .set_dc_motor_parameters(node_id, parameters.dc_motor_parameters())
            .await;
        self.applied(MotorParameter::DcMotorParameters, result, &mut last_applied)?;

        if parameters.motor_type.is_electronically_commutated() {
            let result = self
                .channel
                .set_pole_pairs(node_id, parameters.pole_pairs)
                .await;
            self.applied(MotorParameter::PolePairs, result, &mut last_applied)?;
        }

        let (index, sub_index) = od::MAX_MOTOR_SPEED;
        let result = self
            .channel
            .write_object(
                node_id,
                index,
                sub_index,
                &parameters.max_motor_speed_rpm.to_le_bytes(),
            )
            .await;
        self.applied(MotorParameter::MaxMotorSpeed, result, &mut last_applied)?;

        let (index, sub_index) = od::MAX_GEAR_INPUT_SPEED;
        let result = self
            .channel
            .write_object(
                node_id,
                index,
                sub_index,
                &parameters.max_gear_input_speed_rpm.to_le_bytes(),
            )
            .await;
        self.applied(MotorParameter::MaxGearInputSpeed, result, &mut last_applied)?;

        info!(%node_id, motor_type = ?parameters.motor_type, "motor configured");
        Ok(())
    }

    fn applied(
        &self,
        parameter: MotorParameter,
        result: DriverResult<()>,
        last_applied: &mut Option<MotorParameter>,
    ) -> Result<(), BringUpError> {
        match result {
            Ok(()) => {
                debug!(%parameter, "written");
                *last_applied = Some(parameter);
                Ok(())
            }
            Err(err) => Err(BringUpError::PartialConfiguration {
                failed: parameter,
                last_applied: *last_applied,
                source: describe(self.driver, err),
            }),
        }
    }

    /// Selects the operating mode, sets the profile and commands the velocity.
    pub async fn activate_motion(
        &mut self,
        node_id: NodeId,
        mode: OperatingMode,
        profile: VelocityProfile,
        target_velocity: i32,
    ) -> Result<(), BringUpError> {
        self.channel
            .activate_mode(node_id, mode)
            .await
            .map_err(|err| self.driver_error(Operation::ActivateMode, err))?;
        debug!(%node_id, ?mode, "operating mode active");
        self.channel
            .set_velocity_profile(node_id, profile)
            .await
            .map_err(|err| self.driver_error(Operation::SetVelocityProfile, err))?;
        debug!(
            %node_id,
            acceleration = profile.acceleration,
            deceleration = profile.deceleration,
            "velocity profile set"
        );
        self.channel
            .move_with_velocity(node_id, target_velocity)
            .await
            .map_err(|err| self.driver_error(Operation::MoveWithVelocity, err))?;
        info!(%node_id, target_velocity, "moving");
        Ok(())
    }

    /// Reads exactly `width` bytes of an object.
    pub async fn query_object(
        &mut self,
        node_id: NodeId,
        index: u16,
        sub_index: u8,
        width: usize,
    ) -> Result<Vec<u8>, BringUpError> {
        let data = self
            .channel
            .read_object(node_id, index, sub_index, width)
            .await
            .map_err(|err| self.driver_error(Operation::QueryObject, err))?;
        if data.len() < width {
            return Err(self.driver_error(
                Operation::QueryObject,
                DriverError::new(error_info::LENGTH_MISMATCH),
            ));
        }
        debug!(%node_id, "0x{:04X}:{:02X} = {:02X?}", index, sub_index, data);
        Ok(data)
    }

    pub async fn close(self) -> Result<(), BringUpError> {
        let driver = self.driver;
        self.channel
            .close()
            .await
            .map_err(|err| BringUpError::Driver {
                operation: Operation::CloseDevice,
                source: describe(driver, err),
            })?;
        info!("device closed");
        Ok(())
    }

    /// Closes the device after a step. The step's error takes precedence.
    async fn finish<T>(self, result: Result<T, BringUpError>) -> Result<T, BringUpError> {
        let closed = self.close().await;
        match (result, closed) {
            (Ok(value), closed) => closed.map(|()| value),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(close_err)) => {
                warn!(%close_err, "failed to close device after error");
                Err(err)
            }
        }
    }

    async fn bring_up(&mut self, config: &Config) -> Result<(), BringUpError> {
        let node_id = config.node_id;
        self.protocol_settings().await?;
        self.apply_protocol_settings(config.protocol).await?;
        self.reset_node(node_id).await?;
        self.wait_until_ready(node_id, &config.readiness).await?;
        if config.motor.configure {
            self.configure_motor(node_id, &config.motor.parameters)
                .await?;
        } else {
            info!("motor configuration skipped");
        }
        self.activate_motion(
            node_id,
            config.motion.mode,
            config.motion.profile(),
            config.motion.target_velocity,
        )
        .await?;

        let (index, sub_index) = od::POSITION_DEMAND_VALUE;
        match self.query_object(node_id, index, sub_index, 4).await {
            Ok(data) => {
                let mut raw = [0u8; 4];
                raw.copy_from_slice(&data[..4]);
                info!(
                    %node_id,
                    position_demand = i32::from_le_bytes(raw),
                    "position demand value"
                );
            }
            Err(err) => warn!(%node_id, %err, "could not read position demand value"),
        }
        Ok(())
    }
}
