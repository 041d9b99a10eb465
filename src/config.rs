//! Runtime configuration, read from an optional TOML file.
//!
//! Every section falls back to the values the tool has always used, so an
//! empty file (or none at all) describes an EPOS4 at node 1 on `can0`.
//!
//! ```toml
//! node_id = 1
//!
//! [device]
//! port_name = "can0"
//!
//! [protocol]
//! baud_rate = 1000000
//! timeout_ms = 500
//!
//! [motor]
//! configure = true
//! parameters = { motor_type = "sinus_commutated_ec", nominal_current_ma = 1000, output_current_limit_ma = 2000, thermal_time_constant_ds = 400, pole_pairs = 8, max_motor_speed_rpm = 10000, max_gear_input_speed_rpm = 10000 }
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::driver::{ChannelAddress, OperatingMode, ProtocolSettings, VelocityProfile};
use crate::id::NodeId;
use crate::sequencer::{MotorParameters, ReadinessPolicy};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MotorConfig {
    /// Skip when the parameters are already stored on the device.
    pub configure: bool,
    pub parameters: MotorParameters,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MotionConfig {
    pub mode: OperatingMode,
    pub acceleration: u32,
    pub deceleration: u32,
    pub target_velocity: i32,
}

impl MotionConfig {
    pub fn profile(&self) -> VelocityProfile {
        VelocityProfile {
            acceleration: self.acceleration,
            deceleration: self.deceleration,
        }
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            mode: OperatingMode::ProfileVelocity,
            acceleration: 1_000,
            deceleration: 1_000,
            target_velocity: 500,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelayConfig {
    pub address: String,
    pub backlog: u32,
    pub buffer_size: usize,
}

impl RelayConfig {
    pub fn socket_address(&self) -> Result<SocketAddr, ConfigError> {
        self.address
            .parse()
            .map_err(|err| invalid("relay.address", format!("{:?}: {}", self.address, err)))
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:12345".to_owned(),
            backlog: 1,
            buffer_size: 1024,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub node_id: NodeId,
    pub device: ChannelAddress,
    pub protocol: ProtocolSettings,
    pub readiness: ReadinessPolicy,
    pub motor: MotorConfig,
    pub motion: MotionConfig,
    pub relay: RelayConfig,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        let config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let node_id = self.node_id.as_raw();
        if !(1..=127).contains(&node_id) {
            return Err(invalid("node_id", format!("{} is outside 1..=127", node_id)));
        }
        if self.device.port_name.is_empty() {
            return Err(invalid("device.port_name", "must not be empty"));
        }
        if !self.protocol.has_supported_baud_rate() {
            return Err(invalid(
                "protocol.baud_rate",
                format!(
                    "{} is not one of {:?}",
                    self.protocol.baud_rate,
                    ProtocolSettings::SUPPORTED_BAUD_RATES
                ),
            ));
        }
        if self.protocol.timeout_ms == 0 {
            return Err(invalid("protocol.timeout_ms", "must be positive"));
        }
        if self.readiness.max_attempts == 0 {
            return Err(invalid("readiness.max_attempts", "must be positive"));
        }
        if self.readiness.poll_interval_ms == 0 {
            return Err(invalid("readiness.poll_interval_ms", "must be positive"));
        }
        if self.readiness.timeout_ms == 0 {
            return Err(invalid("readiness.timeout_ms", "must be positive"));
        }
        if self.motion.mode != OperatingMode::ProfileVelocity {
            return Err(invalid(
                "motion.mode",
                "velocity commands require profile_velocity",
            ));
        }
        let motor = &self.motor.parameters;
        if self.motor.configure
            && motor.motor_type.is_electronically_commutated()
            && motor.pole_pairs == 0
        {
            return Err(invalid(
                "motor.parameters.pole_pairs",
                "must be positive for EC motors",
            ));
        }
        if self.relay.backlog == 0 {
            return Err(invalid("relay.backlog", "must be positive"));
        }
        if self.relay.buffer_size == 0 {
            return Err(invalid("relay.buffer_size", "must be positive"));
        }
        self.relay.socket_address()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::driver::MotorType;

    fn write_config(text: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.node_id.as_raw(), 1);
        assert_eq!(config.device.device_name, "EPOS4");
        assert_eq!(config.device.protocol_name, "CANopen");
        assert_eq!(config.device.interface_name, "SocketCAN");
        assert_eq!(config.device.port_name, "can0");
        assert_eq!(config.protocol.baud_rate, 1_000_000);
        assert_eq!(config.protocol.timeout_ms, 500);
        assert_eq!(config.relay.address, "0.0.0.0:12345");
        assert_eq!(config.relay.buffer_size, 1024);
        assert!(!config.motor.configure);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load() {
        let file = write_config(
            r#"
            node_id = 3

            [device]
            port_name = "vcan0"

            [protocol]
            baud_rate = 500000

            [motor]
            configure = true

            [motor.parameters]
            motor_type = "dc"
            pole_pairs = 0

            [relay]
            address = "127.0.0.1:4000"
            "#,
        );
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.node_id.as_raw(), 3);
        assert_eq!(config.device.port_name, "vcan0");
        assert_eq!(config.device.device_name, "EPOS4");
        assert_eq!(config.protocol.baud_rate, 500_000);
        assert_eq!(config.protocol.timeout_ms, 500);
        assert_eq!(config.motor.parameters.motor_type, MotorType::Dc);
        assert_eq!(config.motor.parameters.nominal_current_ma, 1_000);
        assert_eq!(
            config.relay.socket_address().unwrap(),
            "127.0.0.1:4000".parse().unwrap()
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_errors() {
        let result = Config::load("/nonexistent/epos-bringup.toml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));

        let file = write_config("node_id = \"one\"");
        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));

        let file = write_config("[device]\nbaud_rate = 500000");
        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));

        let file = write_config("node_id = 200");
        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_validate() {
        let cases: Vec<(&str, Box<dyn Fn(&mut Config)>)> = vec![
            ("node_id", Box::new(|c: &mut Config| c.node_id = NodeId::new(0).unwrap())),
            ("protocol.baud_rate", Box::new(|c: &mut Config| c.protocol.baud_rate = 9600)),
            ("protocol.timeout_ms", Box::new(|c: &mut Config| c.protocol.timeout_ms = 0)),
            (
                "readiness.max_attempts",
                Box::new(|c: &mut Config| c.readiness.max_attempts = 0),
            ),
            (
                "motion.mode",
                Box::new(|c: &mut Config| c.motion.mode = OperatingMode::ProfilePosition),
            ),
            (
                "motor.parameters.pole_pairs",
                Box::new(|c: &mut Config| {
                    c.motor.configure = true;
                    c.motor.parameters.pole_pairs = 0;
                }),
            ),
            ("relay.backlog", Box::new(|c: &mut Config| c.relay.backlog = 0)),
            ("relay.address", Box::new(|c: &mut Config| c.relay.address = "nowhere".to_owned())),
        ];
        for (expected, modify) in cases {
            let mut config = Config::default();
            modify(&mut config);
            match config.validate() {
                Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, expected),
                other => panic!("{}: unexpected result {:?}", expected, other),
            }
        }
    }
}
