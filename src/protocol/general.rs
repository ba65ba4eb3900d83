//! General layer: device identity, firmware version, stimulation status,
//! reset.
//!
//! All general requests carry an empty payload; the information lives in the
//! acknowledgements decoded here.

use super::{check_len, string_field, ResultAndError};
use crate::error::{ProtocolError, Result};

/// Overall stimulation state reported by GetStimStatus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StimStatus {
    NoLevel,
    LowLevel,
    MidLevelInitialized,
    MidLevelRunning,
}

impl StimStatus {
    pub fn from_u8(value: u8) -> Result<Self> {
        Ok(match value {
            0 => Self::NoLevel,
            1 => Self::LowLevel,
            2 => Self::MidLevelInitialized,
            3 => Self::MidLevelRunning,
            other => {
                return Err(ProtocolError::invalid_field(
                    "StimStatusAck",
                    "stim_status",
                    u32::from(other),
                ))
            }
        })
    }
}

/// GetDeviceId acknowledgement: result plus a 10-character serial string.
#[derive(Debug, Clone)]
pub struct DeviceIdAck {
    pub result: ResultAndError,
    pub device_id: String,
}

impl DeviceIdAck {
    pub(crate) fn decode(data: &[u8]) -> Result<Self> {
        check_len(data, 11, "DeviceIdAck")?;
        Ok(Self {
            result: ResultAndError::from_u8(data[0])?,
            device_id: string_field(&data[1..11]),
        })
    }
}

/// GetStimStatus acknowledgement.
#[derive(Debug, Clone)]
pub struct StimStatusAck {
    pub result: ResultAndError,
    pub stim_status: StimStatus,
    pub high_voltage_on: bool,
}

impl StimStatusAck {
    pub(crate) fn decode(data: &[u8]) -> Result<Self> {
        check_len(data, 3, "StimStatusAck")?;
        Ok(Self {
            result: ResultAndError::from_u8(data[0])?,
            stim_status: StimStatus::from_u8(data[1])?,
            // The device reports 6 for an enabled high-voltage supply.
            high_voltage_on: data[2] == 6,
        })
    }
}

/// GetExtendedVersion acknowledgement: firmware and protocol versions plus
/// the firmware build hash.
#[derive(Debug, Clone)]
pub struct ExtendedVersionAck {
    pub result: ResultAndError,
    /// Firmware version, `major.minor.revision`.
    pub firmware_version: String,
    /// Protocol version implemented by the firmware, `major.minor.revision`.
    pub science_mode_version: String,
    pub firmware_hash: u32,
    pub firmware_hash_type: u8,
    pub firmware_hash_valid: bool,
}

impl ExtendedVersionAck {
    pub(crate) fn decode(data: &[u8]) -> Result<Self> {
        check_len(data, 13, "ExtendedVersionAck")?;
        Ok(Self {
            result: ResultAndError::from_u8(data[0])?,
            firmware_version: format!("{}.{}.{}", data[1], data[2], data[3]),
            science_mode_version: format!("{}.{}.{}", data[4], data[5], data[6]),
            firmware_hash: u32::from_le_bytes([data[7], data[8], data[9], data[10]]),
            firmware_hash_type: data[11],
            firmware_hash_valid: data[12] == 1,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
