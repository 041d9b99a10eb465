//! Bring-up of a maxon EPOS4 over CANopen, and a TCP relay that logs the raw
//! bytes its clients send.

mod error;
pub use error::{BringUpError, DriverError, Error, MotorParameter, Operation, Result};

pub mod frame;
pub mod id;

mod frame_handler;
pub use frame_handler::{CanInterface, FrameHandler};

mod socketcan;
pub use self::socketcan::SocketCanInterface;

pub mod config;
pub mod driver;
pub mod relay;
pub mod sequencer;

pub use config::{Config, ConfigError};
pub use relay::{RelayError, RelayServer};
pub use sequencer::{Device, Sequencer};
