//! Packet types and decode/encode dispatch.
//!
//! - [`Request`] — packets the host sends to the device
//! - [`Ack`] — packets the device sends back (solicited acknowledgements,
//!   error reports, and unsolicited pushes)
//!
//! The wire identifies a packet by its command number plus, for multiplexed
//! commands, a kind byte embedded in the payload. Both dispatches are closed
//! `match`es here and in the per-layer modules, so an unhandled command is an
//! explicit decode error rather than a silent runtime gap. The dyscom Get
//! acknowledgement is the reference for the embedded-kind pattern: its
//! decode reads the kind byte first, then hands the payload to the matching
//! variant parser (see [`dyscom::DyscomGetAck`]).

pub mod dyscom;
pub mod general;
pub mod low_level;
pub mod mid_level;

use crate::commands::*;
use crate::error::{ProtocolError, Result};

// ---------------------------------------------------------------------------
// Shared value types
// ---------------------------------------------------------------------------

/// Device result code carried in the first payload byte of most
/// acknowledgements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ResultAndError {
    NoError,
    TransferError,
    ParameterError,
    NotInitialized,
    ElectrodeError,
    PulseTimeoutError,
    PulseLowCurrentError,
}

impl ResultAndError {
    pub fn from_u8(value: u8) -> Result<Self> {
        Ok(match value {
            0 => Self::NoError,
            1 => Self::TransferError,
            2 => Self::ParameterError,
            7 => Self::NotInitialized,
            10 => Self::ElectrodeError,
            16 => Self::PulseTimeoutError,
            28 => Self::PulseLowCurrentError,
            other => {
                return Err(ProtocolError::invalid_field(
                    "ResultAndError",
                    "code",
                    u32::from(other),
                ))
            }
        })
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Self::NoError => 0,
            Self::TransferError => 1,
            Self::ParameterError => 2,
            Self::NotInitialized => 7,
            Self::ElectrodeError => 10,
            Self::PulseTimeoutError => 16,
            Self::PulseLowCurrentError => 28,
        }
    }

    pub fn is_error(self) -> bool {
        self != Self::NoError
    }
}

/// Ensure `data` holds at least `need` bytes for `packet`.
pub(crate) fn check_len(data: &[u8], need: usize, packet: &'static str) -> Result<()> {
    if data.len() < need {
        Err(ProtocolError::payload_too_short(packet, need, data.len()).with_raw(data))
    } else {
        Ok(())
    }
}

/// Decode a NUL-padded ASCII field.
pub(crate) fn string_field(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).into_owned()
}

/// Encode a string into a fixed-width NUL-padded field.
pub(crate) fn fixed_string(value: &str, width: usize) -> Vec<u8> {
    let mut out = vec![0u8; width];
    let bytes = value.as_bytes();
    out[..bytes.len()].copy_from_slice(bytes);
    out
}

// ---------------------------------------------------------------------------
// Request — packets the host sends
// ---------------------------------------------------------------------------

/// A packet the host sends to the device.
#[derive(Debug, Clone)]
pub enum Request {
    // -- General --
    GetDeviceId,
    Reset,
    GetStimStatus,
    GetExtendedVersion,

    // -- Low level --
    LowLevelInit(low_level::LowLevelInit),
    LowLevelChannelConfig(low_level::LowLevelChannelConfig),
    LowLevelStop,

    // -- Mid level --
    MidLevelInit(mid_level::MidLevelInit),
    MidLevelUpdate(mid_level::MidLevelUpdate),
    MidLevelStop,
    MidLevelGetCurrentData,

    // -- Dyscom --
    DyscomInit(dyscom::DyscomInitParams),
    DyscomStart,
    DyscomStop,
    DyscomGet(dyscom::DyscomGetKind),
    DyscomPowerModule(dyscom::DyscomPowerModule),
    DyscomSys(dyscom::DyscomSys),
    DyscomSendFileAck { block_number: u32 },
}

impl Request {
    /// The wire command number.
    pub fn command(&self) -> u16 {
        match self {
            Request::GetDeviceId => GET_DEVICE_ID,
            Request::Reset => RESET,
            Request::GetStimStatus => GET_STIM_STATUS,
            Request::GetExtendedVersion => GET_EXTENDED_VERSION,
            Request::LowLevelInit(_) => LOW_LEVEL_INIT,
            Request::LowLevelChannelConfig(_) => LOW_LEVEL_CHANNEL_CONFIG,
            Request::LowLevelStop => LOW_LEVEL_STOP,
            Request::MidLevelInit(_) => MID_LEVEL_INIT,
            Request::MidLevelUpdate(_) => MID_LEVEL_UPDATE,
            Request::MidLevelStop => MID_LEVEL_STOP,
            Request::MidLevelGetCurrentData => MID_LEVEL_GET_CURRENT_DATA,
            Request::DyscomInit(_) => DL_INIT,
            Request::DyscomStart => DL_START,
            Request::DyscomStop => DL_STOP,
            Request::DyscomGet(_) => DL_GET,
            Request::DyscomPowerModule(_) => DL_POWER_MODULE,
            Request::DyscomSys(_) => DL_SYS,
            Request::DyscomSendFileAck { .. } => DL_SEND_FILE_ACK,
        }
    }

    /// Serialize the payload. Fails on out-of-domain parameters
    /// (point counts, currents, durations) before anything hits the wire.
    pub fn payload(&self) -> Result<Vec<u8>> {
        Ok(match self {
            Request::GetDeviceId
            | Request::Reset
            | Request::GetStimStatus
            | Request::GetExtendedVersion
            | Request::LowLevelStop
            | Request::MidLevelStop
            | Request::DyscomStart
            | Request::DyscomStop => Vec::new(),
            Request::LowLevelInit(p) => p.encode(),
            Request::LowLevelChannelConfig(p) => p.encode()?,
            Request::MidLevelInit(p) => p.encode(),
            Request::MidLevelUpdate(p) => p.encode()?,
            Request::MidLevelGetCurrentData => mid_level::encode_get_current_data(),
            Request::DyscomInit(p) => p.encode()?,
            Request::DyscomGet(kind) => vec![kind.as_u8()],
            Request::DyscomPowerModule(p) => p.encode(),
            Request::DyscomSys(p) => p.encode()?,
            Request::DyscomSendFileAck { block_number } => block_number.to_be_bytes().to_vec(),
        })
    }
}

// ---------------------------------------------------------------------------
// Ack — packets the device sends
// ---------------------------------------------------------------------------

/// A packet the device sends to the host.
///
/// Covers solicited acknowledgements, the two device-initiated error
/// reports, and unsolicited push packets (live data, file blocks,
/// measurement meta info).
#[derive(Debug, Clone)]
pub enum Ack {
    // -- General --
    GetDeviceIdAck(general::DeviceIdAck),
    ResetAck(ResultAndError),
    GetStimStatusAck(general::StimStatusAck),
    GetExtendedVersionAck(general::ExtendedVersionAck),
    GeneralError(ResultAndError),
    UnknownCommand(ResultAndError),

    // -- Low level --
    LowLevelInitAck(ResultAndError),
    LowLevelChannelConfigAck(low_level::ChannelConfigAck),
    LowLevelStopAck(ResultAndError),

    // -- Mid level --
    MidLevelInitAck(ResultAndError),
    MidLevelUpdateAck(ResultAndError),
    MidLevelStopAck(ResultAndError),
    MidLevelGetCurrentDataAck(mid_level::CurrentDataAck),

    // -- Dyscom --
    DyscomInitAck(dyscom::DyscomInitAck),
    DyscomStartAck(ResultAndError),
    DyscomStopAck(ResultAndError),
    DyscomGetAck(dyscom::DyscomGetAck),
    DyscomPowerModuleAck(dyscom::DyscomPowerModuleAck),
    DyscomSysAck(dyscom::DyscomSysAck),

    // -- Device pushes --
    DyscomLiveData(dyscom::LiveData),
    DyscomFileBlock(dyscom::FileBlock),
    DyscomMeasurementMetaInfo(dyscom::MeasurementMetaInfo),
}

impl Ack {
    /// Decode a received payload into a typed `Ack`.
    ///
    /// Unknown commands are a hard error: the registry cannot synthesize a
    /// packet for data it cannot classify.
    pub fn decode(command: u16, payload: &[u8]) -> Result<Self> {
        let p = payload;
        Ok(match command {
            GET_DEVICE_ID_ACK => Ack::GetDeviceIdAck(general::DeviceIdAck::decode(p)?),
            RESET_ACK => Ack::ResetAck(result_byte(p, "ResetAck")?),
            GET_STIM_STATUS_ACK => Ack::GetStimStatusAck(general::StimStatusAck::decode(p)?),
            GET_EXTENDED_VERSION_ACK => {
                Ack::GetExtendedVersionAck(general::ExtendedVersionAck::decode(p)?)
            }
            GENERAL_ERROR => Ack::GeneralError(result_byte(p, "GeneralError")?),
            UNKNOWN_COMMAND => Ack::UnknownCommand(result_byte(p, "UnknownCommand")?),

            LOW_LEVEL_INIT_ACK => Ack::LowLevelInitAck(result_byte(p, "LowLevelInitAck")?),
            LOW_LEVEL_CHANNEL_CONFIG_ACK => {
                Ack::LowLevelChannelConfigAck(low_level::ChannelConfigAck::decode(p)?)
            }
            LOW_LEVEL_STOP_ACK => Ack::LowLevelStopAck(result_byte(p, "LowLevelStopAck")?),

            MID_LEVEL_INIT_ACK => Ack::MidLevelInitAck(result_byte(p, "MidLevelInitAck")?),
            MID_LEVEL_UPDATE_ACK => Ack::MidLevelUpdateAck(result_byte(p, "MidLevelUpdateAck")?),
            MID_LEVEL_STOP_ACK => Ack::MidLevelStopAck(result_byte(p, "MidLevelStopAck")?),
            MID_LEVEL_GET_CURRENT_DATA_ACK => {
                Ack::MidLevelGetCurrentDataAck(mid_level::CurrentDataAck::decode(p)?)
            }

            DL_INIT_ACK => Ack::DyscomInitAck(dyscom::DyscomInitAck::decode(p)?),
            DL_START_ACK => Ack::DyscomStartAck(result_byte(p, "DyscomStartAck")?),
            DL_STOP_ACK => Ack::DyscomStopAck(result_byte(p, "DyscomStopAck")?),
            DL_GET_ACK => Ack::DyscomGetAck(dyscom::DyscomGetAck::decode(p)?),
            DL_POWER_MODULE_ACK => {
                Ack::DyscomPowerModuleAck(dyscom::DyscomPowerModuleAck::decode(p)?)
            }
            DL_SYS_ACK => Ack::DyscomSysAck(dyscom::DyscomSysAck::decode(p)?),

            DL_SEND_LIVE_DATA => Ack::DyscomLiveData(dyscom::LiveData::decode(p)?),
            DL_SEND_FILE => Ack::DyscomFileBlock(dyscom::FileBlock::decode(p)?),
            DL_SEND_MMI => {
                Ack::DyscomMeasurementMetaInfo(dyscom::MeasurementMetaInfo::decode(p)?)
            }

            other => return Err(ProtocolError::UnknownCommand { command: other }),
        })
    }

    /// The device result code, for acks that carry one.
    pub fn result(&self) -> Option<ResultAndError> {
        match self {
            Ack::ResetAck(r)
            | Ack::GeneralError(r)
            | Ack::UnknownCommand(r)
            | Ack::LowLevelInitAck(r)
            | Ack::LowLevelStopAck(r)
            | Ack::MidLevelInitAck(r)
            | Ack::MidLevelUpdateAck(r)
            | Ack::MidLevelStopAck(r)
            | Ack::DyscomStartAck(r)
            | Ack::DyscomStopAck(r) => Some(*r),
            Ack::GetDeviceIdAck(a) => Some(a.result),
            Ack::MidLevelGetCurrentDataAck(a) => Some(a.result),
            Ack::DyscomInitAck(a) => Some(a.result),
            Ack::DyscomGetAck(a) => Some(a.result()),
            Ack::DyscomPowerModuleAck(a) => Some(a.result),
            Ack::DyscomSysAck(a) => Some(a.result),
            _ => None,
        }
    }
}

/// Decode a single-result-byte acknowledgement payload.
fn result_byte(data: &[u8], packet: &'static str) -> Result<ResultAndError> {
    check_len(data, 1, packet)?;
    ResultAndError::from_u8(data[0])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_requests_have_empty_payloads() {
        for req in [
            Request::GetDeviceId,
            Request::Reset,
            Request::GetStimStatus,
            Request::GetExtendedVersion,
            Request::LowLevelStop,
            Request::MidLevelStop,
            Request::DyscomStart,
            Request::DyscomStop,
        ] {
            assert!(req.payload().unwrap().is_empty(), "{req:?}");
        }
    }

    #[test]
    fn ack_command_is_request_plus_one() {
        assert_eq!(crate::commands::ack_of(Request::GetDeviceId.command()), 53);
        assert_eq!(crate::commands::ack_of(Request::DyscomStart.command()), 103);
    }

    #[test]
    fn decode_unknown_command_is_hard_error() {
        assert!(matches!(
            Ack::decode(999, &[0x00]),
            Err(ProtocolError::UnknownCommand { command: 999 })
        ));
    }

    #[test]
    fn decode_result_only_acks() {
        let ack = Ack::decode(crate::commands::RESET_ACK, &[0x00]).unwrap();
        assert!(matches!(ack, Ack::ResetAck(ResultAndError::NoError)));

        let ack = Ack::decode(crate::commands::GENERAL_ERROR, &[0x02]).unwrap();
        assert!(matches!(ack, Ack::GeneralError(ResultAndError::ParameterError)));
        assert_eq!(ack.result(), Some(ResultAndError::ParameterError));
    }

    #[test]
    fn result_code_round_trip() {
        for code in [0u8, 1, 2, 7, 10, 16, 28] {
            assert_eq!(ResultAndError::from_u8(code).unwrap().as_u8(), code);
        }
        assert!(ResultAndError::from_u8(99).is_err());
    }

    #[test]
    fn string_field_stops_at_nul() {
        assert_eq!(string_field(b"P24\0\0\0"), "P24");
        assert_eq!(string_field(b"P24"), "P24");
        assert_eq!(fixed_string("ab", 4), vec![b'a', b'b', 0, 0]);
    }
}
