//! Error codes reported through [`DriverError`](crate::DriverError) and their
//! descriptions.
//!
//! Codes in the `0x1000_xxxx` range come from the driver itself; everything
//! else is a CiA 301 SDO abort code forwarded from the device.

pub const INTERNAL_ERROR: u32 = 0x1000_0001;
pub const BAD_DEVICE_NAME: u32 = 0x1000_0005;
pub const BAD_PROTOCOL_NAME: u32 = 0x1000_0006;
pub const BAD_INTERFACE_NAME: u32 = 0x1000_0007;
pub const BAD_PORT_NAME: u32 = 0x1000_0008;
pub const COMMUNICATION_ERROR: u32 = 0x1000_000A;
pub const TIMEOUT: u32 = 0x1000_000B;
pub const BAD_PARAMETER: u32 = 0x1000_000C;
pub const CHANNEL_CLOSED: u32 = 0x1000_000F;

pub const TOGGLE_BIT_NOT_ALTERNATED: u32 = 0x0503_0000;
pub const SDO_PROTOCOL_TIMED_OUT: u32 = 0x0504_0000;
pub const INVALID_COMMAND_SPECIFIER: u32 = 0x0504_0001;
pub const UNSUPPORTED_ACCESS: u32 = 0x0601_0000;
pub const WRITE_ONLY_OBJECT: u32 = 0x0601_0001;
pub const READ_ONLY_OBJECT: u32 = 0x0601_0002;
pub const OBJECT_DOES_NOT_EXIST: u32 = 0x0602_0000;
pub const GENERAL_INCOMPATIBILITY: u32 = 0x0604_0043;
pub const LENGTH_MISMATCH: u32 = 0x0607_0010;
pub const SUB_INDEX_DOES_NOT_EXIST: u32 = 0x0609_0011;
pub const VALUE_RANGE_EXCEEDED: u32 = 0x0609_0030;
pub const VALUE_TOO_HIGH: u32 = 0x0609_0031;
pub const VALUE_TOO_LOW: u32 = 0x0609_0032;
pub const GENERAL_ERROR: u32 = 0x0800_0000;
pub const CANNOT_TRANSFER_DATA: u32 = 0x0800_0020;
pub const DEVICE_STATE: u32 = 0x0800_0022;

pub fn describe(code: u32) -> Option<&'static str> {
    let description = match code {
        INTERNAL_ERROR => "Internal driver error",
        BAD_DEVICE_NAME => "Bad device name",
        BAD_PROTOCOL_NAME => "Bad protocol stack name",
        BAD_INTERFACE_NAME => "Bad interface name",
        BAD_PORT_NAME => "Bad port name",
        COMMUNICATION_ERROR => "Communication error on the bus interface",
        TIMEOUT => "Timeout waiting for the device",
        BAD_PARAMETER => "Bad parameter",
        CHANNEL_CLOSED => "Channel is closed",
        TOGGLE_BIT_NOT_ALTERNATED => "Toggle bit not alternated",
        SDO_PROTOCOL_TIMED_OUT => "SDO protocol timed out",
        INVALID_COMMAND_SPECIFIER => "Client/server command specifier not valid or unknown",
        UNSUPPORTED_ACCESS => "Unsupported access to an object",
        WRITE_ONLY_OBJECT => "Attempt to read a write only object",
        READ_ONLY_OBJECT => "Attempt to write a read only object",
        OBJECT_DOES_NOT_EXIST => "Object does not exist in the object dictionary",
        GENERAL_INCOMPATIBILITY => "General internal incompatibility in the device",
        LENGTH_MISMATCH => "Data type does not match, length of service parameter does not match",
        SUB_INDEX_DOES_NOT_EXIST => "Sub-index does not exist",
        VALUE_RANGE_EXCEEDED => "Value range of parameter exceeded",
        VALUE_TOO_HIGH => "Value of parameter written too high",
        VALUE_TOO_LOW => "Value of parameter written too low",
        GENERAL_ERROR => "General error",
        CANNOT_TRANSFER_DATA => "Data cannot be transferred or stored to the application",
        DEVICE_STATE => {
            "Data cannot be transferred or stored to the application because of the present device state"
        }
        _ => return None,
    };
    Some(description)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_known_codes() {
        assert_eq!(describe(BAD_PORT_NAME), Some("Bad port name"));
        assert_eq!(
            describe(0x0602_0000),
            Some("Object does not exist in the object dictionary")
        );
        assert!(describe(DEVICE_STATE).unwrap().contains("present device state"));
    }

    #[test]
    fn test_describe_unknown_code() {
        assert_eq!(describe(0), None);
        assert_eq!(describe(0xDEAD_BEEF), None);
    }
}
