//! A scripted in-memory driver for exercising the sequencer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::error_info;
use super::{
    od, ChannelAddress, DcMotorParameters, DeviceChannel, DeviceDriver, DriverInfo, DriverResult,
    MotorType, OperatingMode, ProtocolSettings, VelocityProfile,
};
use crate::error::DriverError;
use crate::frame::NmtCommand;
use crate::id::NodeId;

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Call {
    GetProtocolSettings,
    SetProtocolSettings(ProtocolSettings),
    SendNmt(NodeId, NmtCommand),
    ReadObject { index: u16, sub_index: u8 },
    WriteObject { index: u16, sub_index: u8, data: Vec<u8> },
    SetMotorType(MotorType),
    SetDcMotorParameters(DcMotorParameters),
    SetPolePairs(u8),
    ActivateMode(OperatingMode),
    SetVelocityProfile(VelocityProfile),
    MoveWithVelocity(i32),
    Close,
}

#[derive(Debug, Default)]
pub(crate) struct FakeState {
    pub calls: Vec<Call>,
    /// Fails the Nth (1-based) channel call with the given code.
    pub fail_on: Option<(usize, u32)>,
    /// Number of calls rejected after a reset before the node answers again.
    pub busy_after_reset: u32,
    pub busy_remaining: u32,
    pub close_error: Option<u32>,
    pub settings: ProtocolSettings,
    pub objects: HashMap<(u16, u8), Vec<u8>>,
}

impl FakeState {
    fn record(&mut self, call: Call) -> DriverResult<()> {
        let is_reset = matches!(call, Call::SendNmt(_, NmtCommand::ResetNode));
        self.calls.push(call);
        let count = self.calls.len();
        if let Some((n, code)) = self.fail_on {
            if n == count {
                return Err(DriverError::new(code));
            }
        }
        if is_reset {
            self.busy_remaining = self.busy_after_reset;
        } else if self.busy_remaining > 0 {
            self.busy_remaining -= 1;
            return Err(DriverError::new(error_info::DEVICE_STATE));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct FakeDriver {
    pub open_error: Option<u32>,
    pub state: Arc<Mutex<FakeState>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        let driver = Self::default();
        driver
            .state
            .lock()
            .unwrap()
            .objects
            .insert(od::STATUSWORD, vec![0x40, 0x02]);
        driver
    }

    pub fn failing_open(code: u32) -> Self {
        Self {
            open_error: Some(code),
            ..Self::new()
        }
    }

    pub fn fail_on(self, n: usize, code: u32) -> Self {
        self.state.lock().unwrap().fail_on = Some((n, code));
        self
    }

    pub fn busy_after_reset(self, calls: u32) -> Self {
        self.state.lock().unwrap().busy_after_reset = calls;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }
}

#[async_trait]
impl DeviceDriver for FakeDriver {
    type Channel = FakeChannel;

    async fn open_channel(&self, _address: &ChannelAddress) -> DriverResult<FakeChannel> {
        match self.open_error {
            Some(code) => Err(DriverError::new(code)),
            None => Ok(FakeChannel {
                state: Arc::clone(&self.state),
            }),
        }
    }

    fn driver_info(&self) -> DriverResult<DriverInfo> {
        Ok(DriverInfo {
            library_name: "fake".to_owned(),
            library_version: "0.0.0".to_owned(),
        })
    }
}

pub(crate) struct FakeChannel {
    state: Arc<Mutex<FakeState>>,
}

impl FakeChannel {
    fn record(&self, call: Call) -> DriverResult<()> {
        self.state.lock().unwrap().record(call)
    }
}

#[async_trait]
impl DeviceChannel for FakeChannel {
    async fn close(self) -> DriverResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Close);
        match state.close_error {
            Some(code) => Err(DriverError::new(code)),
            None => Ok(()),
        }
    }

    async fn protocol_settings(&mut self) -> DriverResult<ProtocolSettings> {
        self.record(Call::GetProtocolSettings)?;
        Ok(self.state.lock().unwrap().settings)
    }

    async fn set_protocol_settings(&mut self, settings: ProtocolSettings) -> DriverResult<()> {
        self.record(Call::SetProtocolSettings(settings))?;
        if !settings.has_supported_baud_rate() {
            return Err(DriverError::new(error_info::BAD_PARAMETER));
        }
        self.state.lock().unwrap().settings = settings;
        Ok(())
    }

    async fn send_nmt(&mut self, node_id: NodeId, command: NmtCommand) -> DriverResult<()> {
        self.record(Call::SendNmt(node_id, command))
    }

    async fn read_object(
        &mut self,
        _node_id: NodeId,
        index: u16,
        sub_index: u8,
        len: usize,
    ) -> DriverResult<Vec<u8>> {
        self.record(Call::ReadObject { index, sub_index })?;
        match self.state.lock().unwrap().objects.get(&(index, sub_index)) {
            Some(data) => Ok(data.iter().copied().take(len).collect()),
            None => Err(DriverError::new(error_info::OBJECT_DOES_NOT_EXIST)),
        }
    }

    async fn write_object(
        &mut self,
        _node_id: NodeId,
        index: u16,
        sub_index: u8,
        data: &[u8],
    ) -> DriverResult<()> {
        self.record(Call::WriteObject {
            index,
            sub_index,
            data: data.to_vec(),
        })?;
        self.state
            .lock()
            .unwrap()
            .objects
            .insert((index, sub_index), data.to_vec());
        Ok(())
    }

    async fn set_motor_type(&mut self, _node_id: NodeId, motor_type: MotorType) -> DriverResult<()> {
        self.record(Call::SetMotorType(motor_type))
    }

    async fn set_dc_motor_parameters(
        &mut self,
        _node_id: NodeId,
        parameters: DcMotorParameters,
    ) -> DriverResult<()> {
        self.record(Call::SetDcMotorParameters(parameters))
    }

    async fn set_pole_pairs(&mut self, _node_id: NodeId, pole_pairs: u8) -> DriverResult<()> {
        self.record(Call::SetPolePairs(pole_pairs))
    }

    async fn activate_mode(&mut self, _node_id: NodeId, mode: OperatingMode) -> DriverResult<()> {
        self.record(Call::ActivateMode(mode))
    }

    async fn set_velocity_profile(
        &mut self,
        _node_id: NodeId,
        profile: VelocityProfile,
    ) -> DriverResult<()> {
        self.record(Call::SetVelocityProfile(profile))
    }

    async fn move_with_velocity(&mut self, _node_id: NodeId, velocity: i32) -> DriverResult<()> {
        self.record(Call::MoveWithVelocity(velocity))
    }
}
