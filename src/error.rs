use std::fmt;
use std::time::Duration;

use crate::id::NodeId;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Invalid Node ID ({})", .0)]
    InvalidNodeId(u8),
    #[error("Invalid COB ID ({:03X})", .0)]
    InvalidCobId(u16),
    #[error("Invalid NMT Command (0x{:02X})", .0)]
    InvalidNmtCommand(u8),
    #[error("Invalid NMT State (0x{:02X})", .0)]
    InvalidNmtState(u8),
    #[error("Invalid SDO Command Specifier ({})", .0)]
    InvalidCommandSpecifier(u8),
    #[error("Invalid data length ({} bytes for {})", .length, .data_type)]
    InvalidDataLength { length: usize, data_type: String },
    #[error("Extended CAN identifiers are not supported")]
    ExtendedIdNotSupported,
    #[error("Not implemented")]
    NotImplemented,
    #[error("SDO transfer of 0x{:04X}:{:02X} aborted (0x{:08X})", .index, .sub_index, .abort_code)]
    SdoAborted {
        index: u16,
        sub_index: u8,
        abort_code: u32,
    },
    #[error("No response within {:?}", .0)]
    Timeout(Duration),
    #[error("CAN interface closed")]
    InterfaceClosed,
    #[error("I/O error ({:?}): {}", .kind, .message)]
    Io {
        kind: std::io::ErrorKind,
        message: String,
    },
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by a driver call: a vendor-defined numeric code plus its
/// description when the driver can resolve one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverError {
    pub code: u32,
    pub description: Option<String>,
}

impl DriverError {
    pub fn new(code: u32) -> Self {
        Self {
            code,
            description: None,
        }
    }

    pub fn with_description(code: u32, description: impl Into<String>) -> Self {
        Self {
            code,
            description: Some(description.into()),
        }
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.code)?;
        if let Some(description) = &self.description {
            write!(f, " ({})", description)?;
        }
        Ok(())
    }
}

impl std::error::Error for DriverError {}

/// The driver call a [`BringUpError::Driver`] failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    GetDriverInfo,
    OpenDevice,
    CloseDevice,
    GetProtocolSettings,
    SetProtocolSettings,
    ResetNode,
    ActivateMode,
    SetVelocityProfile,
    MoveWithVelocity,
    QueryObject,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::GetDriverInfo => "get driver information",
            Self::OpenDevice => "open device",
            Self::CloseDevice => "close device",
            Self::GetProtocolSettings => "get protocol settings",
            Self::SetProtocolSettings => "set protocol settings",
            Self::ResetNode => "reset node",
            Self::ActivateMode => "activate operating mode",
            Self::SetVelocityProfile => "set velocity profile",
            Self::MoveWithVelocity => "move with velocity",
            Self::QueryObject => "query object",
        };
        f.write_str(text)
    }
}

/// One field of the motor configuration step, in the order it is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorParameter {
    MotorType,
    DcMotorParameters,
    PolePairs,
    MaxMotorSpeed,
    MaxGearInputSpeed,
}

impl fmt::Display for MotorParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::MotorType => "motor type",
            Self::DcMotorParameters => "DC motor parameters",
            Self::PolePairs => "pole pair count",
            Self::MaxMotorSpeed => "max motor speed",
            Self::MaxGearInputSpeed => "max gear input speed",
        };
        f.write_str(text)
    }
}

fn applied(last_applied: &Option<MotorParameter>) -> String {
    match last_applied {
        Some(parameter) => format!("last applied: {}", parameter),
        None => "nothing applied".to_owned(),
    }
}

fn last_error(last: &Option<DriverError>) -> String {
    match last {
        Some(err) => format!("last error: {}", err),
        None => "no response".to_owned(),
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BringUpError {
    #[error("failed to {operation}: {source}")]
    Driver {
        operation: Operation,
        source: DriverError,
    },
    #[error("failed to write {failed} ({}): {source}", applied(.last_applied))]
    PartialConfiguration {
        failed: MotorParameter,
        last_applied: Option<MotorParameter>,
        source: DriverError,
    },
    #[error("node {node_id} not ready after {attempts} attempts ({})", last_error(.last))]
    NotReady {
        node_id: NodeId,
        attempts: u32,
        last: Option<DriverError>,
    },
    #[error("node {node_id} not ready within {timeout:?}")]
    ReadinessTimeout { node_id: NodeId, timeout: Duration },
}

impl BringUpError {
    /// The driver error behind this failure, if there is one.
    pub fn driver_error(&self) -> Option<&DriverError> {
        match self {
            Self::Driver { source, .. } | Self::PartialConfiguration { source, .. } => {
                Some(source)
            }
            Self::NotReady { last, .. } => last.as_ref(),
            Self::ReadinessTimeout { .. } => None,
        }
    }
}
