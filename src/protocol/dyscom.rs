//! Dyscom layer: biosignal measurement (EMG, bipolar signals) and file
//! retrieval.
//!
//! The Get command is multiplexed: a kind byte in the request selects the
//! query, and the matching acknowledgement repeats that kind byte right
//! after the result code. [`DyscomGetAck::decode`] dispatches on it.
//!
//! Live data, file blocks and measurement meta info arrive as unsolicited
//! pushes while a measurement or transfer runs.

use super::{check_len, fixed_string, string_field, ResultAndError};
use crate::bits::ByteBuilder;
use crate::error::{ProtocolError, Result};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Query selector for the multiplexed Get command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DyscomGetKind {
    Battery,
    FileSystemStatus,
    ListOfMeasurementMetaInfo,
    OperationMode,
    FileByName,
    DeviceId,
    FirmwareVersion,
    FileInfo,
}

impl DyscomGetKind {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Battery => 0,
            Self::FileSystemStatus => 1,
            Self::ListOfMeasurementMetaInfo => 2,
            Self::OperationMode => 3,
            Self::FileByName => 4,
            Self::DeviceId => 5,
            Self::FirmwareVersion => 6,
            Self::FileInfo => 7,
        }
    }

    pub fn from_u8(value: u8) -> Result<Self> {
        Ok(match value {
            0 => Self::Battery,
            1 => Self::FileSystemStatus,
            2 => Self::ListOfMeasurementMetaInfo,
            3 => Self::OperationMode,
            4 => Self::FileByName,
            5 => Self::DeviceId,
            6 => Self::FirmwareVersion,
            7 => Self::FileInfo,
            other => {
                return Err(ProtocolError::UnknownKind { command: crate::commands::DL_GET_ACK, kind: other })
            }
        })
    }
}

/// Device activity reported by the operation-mode query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OperationMode {
    Undefined,
    Idle,
    LiveMeasuringPre,
    LiveMeasuring,
    RecordPre,
    Record,
    DataTransferPre,
    DataTransfer,
}

impl OperationMode {
    pub fn from_u8(value: u8) -> Result<Self> {
        Ok(match value {
            0 => Self::Undefined,
            1 => Self::Idle,
            2 => Self::LiveMeasuringPre,
            3 => Self::LiveMeasuring,
            4 => Self::RecordPre,
            5 => Self::Record,
            6 => Self::DataTransferPre,
            7 => Self::DataTransfer,
            other => {
                return Err(ProtocolError::invalid_field(
                    "OperationModeAck",
                    "operation_mode",
                    u32::from(other),
                ))
            }
        })
    }

    /// Whether a measurement or recording is running or starting.
    pub fn is_measuring(self) -> bool {
        matches!(
            self,
            Self::LiveMeasuringPre | Self::LiveMeasuring | Self::RecordPre | Self::Record
        )
    }
}

/// Hardware module addressed by the PowerModule command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PowerModuleType {
    Undefined,
    Bluetooth,
    MemoryCard,
    Measurement,
    Research,
}

impl PowerModuleType {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Undefined => 0,
            Self::Bluetooth => 1,
            Self::MemoryCard => 2,
            Self::Measurement => 3,
            Self::Research => 4,
        }
    }

    pub fn from_u8(value: u8) -> Result<Self> {
        Ok(match value {
            0 => Self::Undefined,
            1 => Self::Bluetooth,
            2 => Self::MemoryCard,
            3 => Self::Measurement,
            4 => Self::Research,
            other => {
                return Err(ProtocolError::invalid_field(
                    "PowerModuleAck",
                    "module",
                    u32::from(other),
                ))
            }
        })
    }
}

/// Power switch state for a hardware module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PowerState {
    SwitchOff,
    SwitchOn,
}

impl PowerState {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::SwitchOff => 0,
            Self::SwitchOn => 1,
        }
    }

    pub fn from_u8(value: u8) -> Result<Self> {
        Ok(match value {
            0 => Self::SwitchOff,
            1 => Self::SwitchOn,
            other => {
                return Err(ProtocolError::invalid_field(
                    "PowerModuleAck",
                    "power",
                    u32::from(other),
                ))
            }
        })
    }
}

/// Maintenance operation selector for the Sys command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SysType {
    Undefined,
    DeleteFile,
    DeviceSleep,
    DeviceStorage,
}

impl SysType {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Undefined => 0,
            Self::DeleteFile => 1,
            Self::DeviceSleep => 2,
            Self::DeviceStorage => 3,
        }
    }

    pub fn from_u8(value: u8) -> Result<Self> {
        Ok(match value {
            0 => Self::Undefined,
            1 => Self::DeleteFile,
            2 => Self::DeviceSleep,
            3 => Self::DeviceStorage,
            other => {
                return Err(ProtocolError::invalid_field("SysAck", "sys_type", u32::from(other)))
            }
        })
    }
}

/// Outcome of a Sys operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SysState {
    Undefined,
    Successful,
}

impl SysState {
    pub fn from_u8(value: u8) -> Result<Self> {
        Ok(match value {
            0 => Self::Undefined,
            1 => Self::Successful,
            other => {
                return Err(ProtocolError::invalid_field("SysAck", "state", u32::from(other)))
            }
        })
    }
}

/// Transfer mode reported by the file-by-name query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FileByNameMode {
    Undefined,
    MultiBlock,
    SingleBlock,
}

impl FileByNameMode {
    pub fn from_u8(value: u8) -> Result<Self> {
        Ok(match value {
            0 => Self::Undefined,
            1 => Self::MultiBlock,
            2 => Self::SingleBlock,
            other => {
                return Err(ProtocolError::invalid_field(
                    "FileByNameAck",
                    "mode",
                    u32::from(other),
                ))
            }
        })
    }
}

/// Signal source carried on one measurement channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SignalType {
    #[default]
    Unused,
    Unknown,
    Bipolar,
    Emg1,
    OpVoltage,
    TestSignal,
    Ground,
    Temperature,
    InternalSc,
    Emg2,
    Time,
    Pushbutton,
    Breathing,
}

impl SignalType {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Unused => 0,
            Self::Unknown => 1,
            Self::Bipolar => 2,
            Self::Emg1 => 3,
            Self::OpVoltage => 4,
            Self::TestSignal => 5,
            Self::Ground => 6,
            Self::Temperature => 7,
            Self::InternalSc => 8,
            Self::Emg2 => 9,
            Self::Time => 10,
            Self::Pushbutton => 11,
            Self::Breathing => 12,
        }
    }

    pub fn from_u8(value: u8) -> Result<Self> {
        Ok(match value {
            0 => Self::Unused,
            1 => Self::Unknown,
            2 => Self::Bipolar,
            3 => Self::Emg1,
            4 => Self::OpVoltage,
            5 => Self::TestSignal,
            6 => Self::Ground,
            7 => Self::Temperature,
            8 => Self::InternalSc,
            9 => Self::Emg2,
            10 => Self::Time,
            11 => Self::Pushbutton,
            12 => Self::Breathing,
            other => {
                return Err(ProtocolError::invalid_field(
                    "SignalType",
                    "signal_type",
                    u32::from(other),
                ))
            }
        })
    }
}

/// Analog front-end filter selection at init.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FilterType {
    /// 4k sample rate, unfiltered.
    #[default]
    FilterOff,
    /// 1k sample rate.
    PredefinedFilter1,
    /// 4k sample rate.
    PredefinedFilter2,
    /// 1k sample rate.
    PredefinedFilter3,
}

impl FilterType {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::FilterOff => 0,
            Self::PredefinedFilter1 => 1,
            Self::PredefinedFilter2 => 2,
            Self::PredefinedFilter3 => 3,
        }
    }
}

/// Output sample frequency granted by the device at init.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FrequencyOut {
    Unused,
    SamplesPerSecond32k,
    SamplesPerSecond16k,
    SamplesPerSecond8k,
    SamplesPerSecond4k,
    SamplesPerSecond2k,
    SamplesPerSecond1k,
    SamplesPerSecond500,
    SamplesPerSecond250,
}

impl FrequencyOut {
    pub fn from_u8(value: u8) -> Result<Self> {
        Ok(match value {
            0 => Self::Unused,
            1 => Self::SamplesPerSecond32k,
            2 => Self::SamplesPerSecond16k,
            3 => Self::SamplesPerSecond8k,
            4 => Self::SamplesPerSecond4k,
            5 => Self::SamplesPerSecond2k,
            6 => Self::SamplesPerSecond1k,
            7 => Self::SamplesPerSecond500,
            8 => Self::SamplesPerSecond250,
            other => {
                return Err(ProtocolError::invalid_field(
                    "DyscomInitAck",
                    "frequency_out",
                    u32::from(other),
                ))
            }
        })
    }
}

/// Measurement init outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InitState {
    Unused,
    Success,
    ErrorStorageInit,
    ErrorStorageWrite,
    ErrorStorageFull,
    Unused2,
    ErrorAds129xRegister,
}

impl InitState {
    pub fn from_u8(value: u8) -> Result<Self> {
        Ok(match value {
            0 => Self::Unused,
            1 => Self::Success,
            2 => Self::ErrorStorageInit,
            3 => Self::ErrorStorageWrite,
            4 => Self::ErrorStorageFull,
            5 => Self::Unused2,
            6 => Self::ErrorAds129xRegister,
            other => {
                return Err(ProtocolError::invalid_field(
                    "DyscomInitAck",
                    "init_state",
                    u32::from(other),
                ))
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Bit-flag sets
// ---------------------------------------------------------------------------

/// Measurement init flag bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InitFlags(pub u8);

impl InitFlags {
    pub const LIVE_DATA_MODE: u8 = 1 << 0;
    pub const SD_STORAGE_MODE: u8 = 1 << 1;
    pub const TIMED_START: u8 = 1 << 2;
    pub const SET_SYSTEM_TIME: u8 = 1 << 3;
    pub const MUTE: u8 = 1 << 4;

    pub fn contains(self, flag: u8) -> bool {
        self.0 & flag != 0
    }
}

/// Battery energy state bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EnergyState(pub u8);

impl EnergyState {
    pub const CABLE_CONNECTED: u8 = 1 << 1;
    pub const DEVICE_IS_LOADING: u8 = 1 << 2;

    pub fn contains(self, flag: u8) -> bool {
        self.0 & flag != 0
    }
}

/// Electrode adhesion status bits attached to a live-data sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ElectrodeStatus(pub u8);

impl ElectrodeStatus {
    pub const POSITIVE_ADHESIVE: u8 = 1 << 1;
    pub const NEGATIVE_ADHESIVE: u8 = 1 << 2;

    pub fn contains(self, flag: u8) -> bool {
        self.0 & flag != 0
    }

    /// Any adhesion problem on this sample.
    pub fn any(self) -> bool {
        self.0 != 0
    }
}

// ---------------------------------------------------------------------------
// ADS129x register map and device timestamps
// ---------------------------------------------------------------------------

/// Width of the ADS129x register block on the wire.
pub const REGISTER_MAP_LEN: usize = 26;

/// Raw register block of the ADS129x analog front end.
///
/// The named accessors cover the registers the device actually honors;
/// everything else rides along untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ads129xRegisterMap(pub [u8; REGISTER_MAP_LEN]);

impl Default for Ads129xRegisterMap {
    fn default() -> Self {
        let mut map = [0u8; REGISTER_MAP_LEN];
        // High resolution mode, 4 ksps
        map[1] = 0x83;
        // Internal reference buffer, 4.0 V reference, RLD routed and
        // internally generated
        map[3] = 0xFC;
        map[13] = 0x02;
        map[14] = 0x02;
        // Respiration modulation/demodulation on, phase 67.5, internal signal
        map[22] = 0xEA;
        Self(map)
    }
}

impl Ads129xRegisterMap {
    pub fn config_register_1(&self) -> u8 {
        self.0[1]
    }

    pub fn config_register_2(&self) -> u8 {
        self.0[2]
    }

    pub fn config_register_3(&self) -> u8 {
        self.0[3]
    }

    pub fn respiration_control_register(&self) -> u8 {
        self.0[22]
    }

    fn decode(data: &[u8]) -> Self {
        let mut map = [0u8; REGISTER_MAP_LEN];
        map.copy_from_slice(&data[..REGISTER_MAP_LEN]);
        Self(map)
    }
}

/// Calendar timestamp in the device's 11-byte wire layout.
///
/// `weekday` follows the wire convention, 0 = Sunday through 6 = Saturday;
/// `day_of_year` is zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceTimestamp {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub weekday: u8,
    pub day_of_year: u16,
    pub daylight_saving: bool,
}

/// Width of a timestamp on the wire.
pub const TIMESTAMP_LEN: usize = 11;

impl DeviceTimestamp {
    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut bb = ByteBuilder::new();
        bb.append_byte(self.hour);
        bb.append_byte(u8::from(self.daylight_saving));
        bb.append_byte(self.day);
        bb.append_byte(self.minute);
        bb.append_byte(self.month);
        bb.append_byte(self.second);
        bb.append_byte(self.weekday);
        bb.append_value(u64::from(self.day_of_year), 2, true);
        bb.append_value(u64::from(self.year.saturating_sub(1900)), 2, true);
        bb.to_bytes()
    }

    pub(crate) fn decode(data: &[u8]) -> Result<Self> {
        check_len(data, TIMESTAMP_LEN, "DeviceTimestamp")?;
        Ok(Self {
            hour: data[0],
            daylight_saving: data[1] != 0,
            day: data[2],
            minute: data[3],
            month: data[4],
            second: data[5],
            weekday: data[6],
            day_of_year: u16::from_be_bytes([data[7], data[8]]),
            year: u16::from_be_bytes([data[9], data[10]]) + 1900,
        })
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Width of the init parameter block on the wire.
pub(crate) const INIT_PARAMS_LEN: usize = 361;

/// Measurement configuration for DyscomInit.
#[derive(Debug, Clone, Default)]
pub struct DyscomInitParams {
    pub registers: Ads129xRegisterMap,
    pub start_time: DeviceTimestamp,
    pub system_time: DeviceTimestamp,
    pub proband_name: String,
    pub investigator_name: String,
    pub proband_number: String,
    pub duration_s: u32,
    /// Up to 8 channel signal assignments; missing entries are unused.
    pub signal_types: Vec<SignalType>,
    pub sync_signal: bool,
    pub filter: FilterType,
    pub flags: InitFlags,
}

impl DyscomInitParams {
    pub(crate) fn encode(&self) -> Result<Vec<u8>> {
        if self.proband_name.len() > 128 {
            return Err(ProtocolError::InvalidParameter {
                packet: "DyscomInit",
                reason: format!("proband name longer than 128 bytes ({})", self.proband_name.len()),
            });
        }
        if self.investigator_name.len() > 128 {
            return Err(ProtocolError::InvalidParameter {
                packet: "DyscomInit",
                reason: format!(
                    "investigator name longer than 128 bytes ({})",
                    self.investigator_name.len()
                ),
            });
        }
        if self.proband_number.len() > 36 {
            return Err(ProtocolError::InvalidParameter {
                packet: "DyscomInit",
                reason: format!(
                    "proband number longer than 36 bytes ({})",
                    self.proband_number.len()
                ),
            });
        }
        if self.signal_types.len() > 8 {
            return Err(ProtocolError::InvalidParameter {
                packet: "DyscomInit",
                reason: format!("{} signal types, at most 8 allowed", self.signal_types.len()),
            });
        }

        let mut bb = ByteBuilder::new();
        bb.append_bytes(&self.registers.0);
        bb.append_bytes(&self.start_time.encode());
        bb.append_bytes(&self.system_time.encode());
        bb.append_bytes(&fixed_string(&self.proband_name, 129));
        bb.append_bytes(&fixed_string(&self.investigator_name, 129));
        bb.append_bytes(&fixed_string(&self.proband_number, 37));
        bb.append_value(self.signal_types.len() as u64, 2, true);
        bb.append_value(u64::from(self.duration_s), 4, true);
        for i in 0..8 {
            bb.append_byte(self.signal_types.get(i).copied().unwrap_or_default().as_u8());
        }
        bb.append_byte(0);
        bb.append_byte(u8::from(self.sync_signal));
        bb.append_byte(self.filter.as_u8());
        bb.append_byte(self.flags.0);
        Ok(bb.to_bytes())
    }

    pub(crate) fn decode(data: &[u8]) -> Result<Self> {
        check_len(data, INIT_PARAMS_LEN, "DyscomInitParams")?;
        let signal_count = usize::from(u16::from_be_bytes([data[343], data[344]]));
        let mut signal_types = Vec::new();
        for i in 0..signal_count.min(8) {
            signal_types.push(SignalType::from_u8(data[349 + i])?);
        }
        Ok(Self {
            registers: Ads129xRegisterMap::decode(&data[0..26]),
            start_time: DeviceTimestamp::decode(&data[26..37])?,
            system_time: DeviceTimestamp::decode(&data[37..48])?,
            proband_name: string_field(&data[48..177]),
            investigator_name: string_field(&data[177..306]),
            proband_number: string_field(&data[306..343]),
            duration_s: u32::from_be_bytes([data[345], data[346], data[347], data[348]]),
            signal_types,
            sync_signal: data[358] != 0,
            filter: match data[359] {
                0 => FilterType::FilterOff,
                1 => FilterType::PredefinedFilter1,
                2 => FilterType::PredefinedFilter2,
                3 => FilterType::PredefinedFilter3,
                other => {
                    return Err(ProtocolError::invalid_field(
                        "DyscomInitParams",
                        "filter",
                        u32::from(other),
                    ))
                }
            },
            flags: InitFlags(data[360]),
        })
    }
}

/// PowerModule request: switch one hardware module on or off.
#[derive(Debug, Clone, Copy)]
pub struct DyscomPowerModule {
    pub module: PowerModuleType,
    pub power: PowerState,
}

impl DyscomPowerModule {
    pub(crate) fn encode(&self) -> Vec<u8> {
        vec![self.module.as_u8(), self.power.as_u8()]
    }
}

/// Sys request: file deletion and power maintenance operations.
#[derive(Debug, Clone)]
pub struct DyscomSys {
    pub sys_type: SysType,
    pub filename: String,
}

impl DyscomSys {
    pub(crate) fn encode(&self) -> Result<Vec<u8>> {
        if self.filename.len() > 128 {
            return Err(ProtocolError::InvalidParameter {
                packet: "DyscomSys",
                reason: format!("filename longer than 128 bytes ({})", self.filename.len()),
            });
        }
        let mut out = fixed_string(&self.filename, 128);
        out.push(self.sys_type.as_u8());
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Acknowledgements
// ---------------------------------------------------------------------------

/// DyscomInit acknowledgement.
#[derive(Debug, Clone)]
pub struct DyscomInitAck {
    pub result: ResultAndError,
    pub registers: Ads129xRegisterMap,
    /// File id assigned to the measurement on the device's storage.
    pub measurement_file_id: String,
    pub init_state: InitState,
    pub frequency_out: FrequencyOut,
}

impl DyscomInitAck {
    pub(crate) fn decode(data: &[u8]) -> Result<Self> {
        check_len(data, 89, "DyscomInitAck")?;
        Ok(Self {
            result: ResultAndError::from_u8(data[0])?,
            registers: Ads129xRegisterMap::decode(&data[1..27]),
            measurement_file_id: string_field(&data[27..87]),
            init_state: InitState::from_u8(data[87])?,
            frequency_out: FrequencyOut::from_u8(data[88])?,
        })
    }
}

/// PowerModule acknowledgement.
#[derive(Debug, Clone, Copy)]
pub struct DyscomPowerModuleAck {
    pub result: ResultAndError,
    pub module: PowerModuleType,
    pub power: PowerState,
}

impl DyscomPowerModuleAck {
    pub(crate) fn decode(data: &[u8]) -> Result<Self> {
        check_len(data, 3, "PowerModuleAck")?;
        Ok(Self {
            result: ResultAndError::from_u8(data[0])?,
            module: PowerModuleType::from_u8(data[1])?,
            power: PowerState::from_u8(data[2])?,
        })
    }
}

/// Sys acknowledgement.
#[derive(Debug, Clone)]
pub struct DyscomSysAck {
    pub result: ResultAndError,
    pub sys_type: SysType,
    pub state: SysState,
    pub filename: String,
}

impl DyscomSysAck {
    pub(crate) fn decode(data: &[u8]) -> Result<Self> {
        check_len(data, 131, "SysAck")?;
        Ok(Self {
            result: ResultAndError::from_u8(data[0])?,
            sys_type: SysType::from_u8(data[1])?,
            state: SysState::from_u8(data[2])?,
            filename: string_field(&data[3..131]),
        })
    }
}

/// Get acknowledgement: result, echoed kind byte, then a kind-specific body.
#[derive(Debug, Clone)]
pub enum DyscomGetAck {
    Battery {
        result: ResultAndError,
        energy_state: EnergyState,
        percentage: u8,
        /// Degrees Celsius.
        temperature: i8,
        /// Milliampere.
        current: i32,
        /// Millivolt.
        voltage: u32,
    },
    FileSystemStatus {
        result: ResultAndError,
        ready: bool,
        used_size: u64,
        free_size: u64,
    },
    ListOfMeasurementMetaInfo {
        result: ResultAndError,
        number_of_measurements: u16,
    },
    OperationMode {
        result: ResultAndError,
        operation_mode: OperationMode,
    },
    FileByName {
        result: ResultAndError,
        filename: String,
        block_offset: u32,
        filesize: u64,
        number_of_blocks: u32,
        mode: FileByNameMode,
    },
    DeviceId {
        result: ResultAndError,
        device_id: String,
    },
    FirmwareVersion {
        result: ResultAndError,
        firmware_version: String,
    },
    FileInfo {
        result: ResultAndError,
        filename: String,
        filesize: u32,
        checksum: u16,
    },
}

impl DyscomGetAck {
    pub(crate) fn decode(data: &[u8]) -> Result<Self> {
        check_len(data, 2, "DyscomGetAck")?;
        let result = ResultAndError::from_u8(data[0])?;
        let kind = DyscomGetKind::from_u8(data[1])?;
        Ok(match kind {
            DyscomGetKind::Battery => {
                check_len(data, 13, "BatteryAck")?;
                Self::Battery {
                    result,
                    energy_state: EnergyState(data[2]),
                    percentage: data[3],
                    temperature: data[4] as i8,
                    current: i32::from_le_bytes([data[5], data[6], data[7], data[8]]),
                    voltage: u32::from_le_bytes([data[9], data[10], data[11], data[12]]),
                }
            }
            DyscomGetKind::FileSystemStatus => {
                check_len(data, 19, "FileSystemStatusAck")?;
                let mut used = [0u8; 8];
                used.copy_from_slice(&data[3..11]);
                let mut free = [0u8; 8];
                free.copy_from_slice(&data[11..19]);
                Self::FileSystemStatus {
                    result,
                    ready: data[2] != 0,
                    used_size: u64::from_le_bytes(used),
                    free_size: u64::from_le_bytes(free),
                }
            }
            DyscomGetKind::ListOfMeasurementMetaInfo => {
                check_len(data, 4, "ListOfMeasurementMetaInfoAck")?;
                Self::ListOfMeasurementMetaInfo {
                    result,
                    number_of_measurements: u16::from_be_bytes([data[2], data[3]]),
                }
            }
            DyscomGetKind::OperationMode => {
                check_len(data, 3, "OperationModeAck")?;
                Self::OperationMode { result, operation_mode: OperationMode::from_u8(data[2])? }
            }
            DyscomGetKind::FileByName => {
                check_len(data, 147, "FileByNameAck")?;
                let mut filesize = [0u8; 8];
                filesize.copy_from_slice(&data[134..142]);
                Self::FileByName {
                    result,
                    filename: string_field(&data[2..130]),
                    block_offset: u32::from_le_bytes([data[130], data[131], data[132], data[133]]),
                    filesize: u64::from_le_bytes(filesize),
                    number_of_blocks: u32::from_le_bytes([
                        data[142], data[143], data[144], data[145],
                    ]),
                    mode: FileByNameMode::from_u8(data[146])?,
                }
            }
            DyscomGetKind::DeviceId => {
                check_len(data, 130, "DeviceIdAck")?;
                Self::DeviceId { result, device_id: string_field(&data[2..130]) }
            }
            DyscomGetKind::FirmwareVersion => {
                check_len(data, 130, "FirmwareVersionAck")?;
                Self::FirmwareVersion { result, firmware_version: string_field(&data[2..130]) }
            }
            DyscomGetKind::FileInfo => {
                check_len(data, 136, "FileInfoAck")?;
                Self::FileInfo {
                    result,
                    filename: string_field(&data[2..130]),
                    filesize: u32::from_le_bytes([data[130], data[131], data[132], data[133]]),
                    checksum: u16::from_le_bytes([data[134], data[135]]),
                }
            }
        })
    }

    /// The kind this acknowledgement answers.
    pub fn kind(&self) -> DyscomGetKind {
        match self {
            Self::Battery { .. } => DyscomGetKind::Battery,
            Self::FileSystemStatus { .. } => DyscomGetKind::FileSystemStatus,
            Self::ListOfMeasurementMetaInfo { .. } => DyscomGetKind::ListOfMeasurementMetaInfo,
            Self::OperationMode { .. } => DyscomGetKind::OperationMode,
            Self::FileByName { .. } => DyscomGetKind::FileByName,
            Self::DeviceId { .. } => DyscomGetKind::DeviceId,
            Self::FirmwareVersion { .. } => DyscomGetKind::FirmwareVersion,
            Self::FileInfo { .. } => DyscomGetKind::FileInfo,
        }
    }

    pub fn result(&self) -> ResultAndError {
        match self {
            Self::Battery { result, .. }
            | Self::FileSystemStatus { result, .. }
            | Self::ListOfMeasurementMetaInfo { result, .. }
            | Self::OperationMode { result, .. }
            | Self::FileByName { result, .. }
            | Self::DeviceId { result, .. }
            | Self::FirmwareVersion { result, .. }
            | Self::FileInfo { result, .. } => *result,
        }
    }
}

// ---------------------------------------------------------------------------
// Pushes
// ---------------------------------------------------------------------------

/// One channel sample inside a live-data push.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ElectrodeSample {
    pub value: f32,
    pub signal_type: SignalType,
    pub status: ElectrodeStatus,
}

/// Unsolicited live-data push during a running measurement.
#[derive(Debug, Clone)]
pub struct LiveData {
    /// Microseconds since measurement start.
    pub time_offset: u32,
    pub samples: Vec<ElectrodeSample>,
}

impl LiveData {
    pub(crate) fn decode(data: &[u8]) -> Result<Self> {
        check_len(data, 5, "LiveData")?;
        let channels = usize::from(data[0]);
        check_len(data, 5 + channels * 6, "LiveData")?;
        let time_offset = u32::from_be_bytes([data[1], data[2], data[3], data[4]]);
        let mut samples = Vec::with_capacity(channels);
        for i in 0..channels {
            let at = 5 + i * 6;
            samples.push(ElectrodeSample {
                value: f32::from_be_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]),
                signal_type: SignalType::from_u8(data[at + 4])?,
                status: ElectrodeStatus(data[at + 5]),
            });
        }
        Ok(Self { time_offset, samples })
    }

    /// Whether any sample reports an electrode problem.
    pub fn status_error(&self) -> bool {
        self.samples.iter().any(|s| s.status.any())
    }
}

/// Unsolicited file-block push during a file transfer.
///
/// Each block is confirmed back with [`super::Request::DyscomSendFileAck`].
#[derive(Debug, Clone)]
pub struct FileBlock {
    pub block_number: u32,
    pub data: Vec<u8>,
}

impl FileBlock {
    pub(crate) fn decode(data: &[u8]) -> Result<Self> {
        check_len(data, 6, "FileBlock")?;
        let block_number = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
        let block_size = usize::from(u16::from_be_bytes([data[4], data[5]]));
        check_len(data, 6 + block_size, "FileBlock")?;
        Ok(Self { block_number, data: data[6..6 + block_size].to_vec() })
    }
}

/// Unsolicited measurement-meta-info push.
#[derive(Debug, Clone)]
pub struct MeasurementMetaInfo {
    pub init_params: DyscomInitParams,
    pub file_name: String,
    pub file_size: u64,
    pub file_number: u16,
    pub proband_name: String,
    pub start_time: DeviceTimestamp,
    pub duration_s: u32,
}

impl MeasurementMetaInfo {
    pub(crate) fn decode(data: &[u8]) -> Result<Self> {
        check_len(data, 483, "MeasurementMetaInfo")?;
        let mut file_size = [0u8; 8];
        file_size.copy_from_slice(&data[421..429]);
        Ok(Self {
            init_params: DyscomInitParams::decode(&data[0..INIT_PARAMS_LEN])?,
            file_name: string_field(&data[361..421]),
            file_size: u64::from_be_bytes(file_size),
            file_number: u16::from_be_bytes([data[429], data[430]]),
            proband_name: string_field(&data[431..468]),
            start_time: DeviceTimestamp::decode(&data[468..479])?,
            duration_s: u32::from_be_bytes([data[479], data[480], data[481], data[482]]),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_round_trip() {
        let ts = DeviceTimestamp {
            year: 2024,
            month: 7,
            day: 15,
            hour: 13,
            minute: 42,
            second: 7,
            weekday: 1,
            day_of_year: 196,
            daylight_saving: true,
        };
        let bytes = ts.encode();
        assert_eq!(bytes.len(), TIMESTAMP_LEN);
        assert_eq!(bytes[0], 13);
        // year - 1900, big endian
        assert_eq!(&bytes[9..11], &[0x00, 0x7C]);
        assert_eq!(DeviceTimestamp::decode(&bytes).unwrap(), ts);
    }

    #[test]
    fn init_params_encode_length_and_tail() {
        let params = DyscomInitParams {
            proband_name: "proband".into(),
            investigator_name: "inv".into(),
            duration_s: 90,
            signal_types: vec![SignalType::Bipolar, SignalType::Emg1],
            sync_signal: true,
            filter: FilterType::PredefinedFilter1,
            flags: InitFlags(InitFlags::LIVE_DATA_MODE | InitFlags::SD_STORAGE_MODE),
            ..Default::default()
        };
        let data = params.encode().unwrap();
        assert_eq!(data.len(), INIT_PARAMS_LEN);
        // signal type count, big endian
        assert_eq!(&data[343..345], &[0, 2]);
        // duration seconds, big endian
        assert_eq!(&data[345..349], &[0, 0, 0, 90]);
        assert_eq!(data[349], 2);
        assert_eq!(data[350], 3);
        assert_eq!(data[351], 0);
        assert_eq!(data[358], 1);
        assert_eq!(data[359], 1);
        assert_eq!(data[360], 0b11);
    }

    #[test]
    fn init_params_round_trip() {
        let params = DyscomInitParams {
            proband_name: "p1".into(),
            investigator_name: "dr".into(),
            proband_number: "42".into(),
            duration_s: 600,
            signal_types: vec![SignalType::Emg1],
            ..Default::default()
        };
        let decoded = DyscomInitParams::decode(&params.encode().unwrap()).unwrap();
        assert_eq!(decoded.proband_name, "p1");
        assert_eq!(decoded.proband_number, "42");
        assert_eq!(decoded.duration_s, 600);
        assert_eq!(decoded.signal_types, vec![SignalType::Emg1]);
        assert_eq!(decoded.registers, Ads129xRegisterMap::default());
    }

    #[test]
    fn init_params_rejects_long_names() {
        let params = DyscomInitParams { proband_name: "x".repeat(129), ..Default::default() };
        assert!(params.encode().is_err());
        let params = DyscomInitParams { proband_number: "x".repeat(37), ..Default::default() };
        assert!(params.encode().is_err());
    }

    #[test]
    fn get_ack_battery() {
        let mut data = vec![0x00, 0x00];
        data.push(EnergyState::CABLE_CONNECTED);
        data.push(85);
        data.push((-3i8) as u8);
        data.extend_from_slice(&(-120i32).to_le_bytes());
        data.extend_from_slice(&4100u32.to_le_bytes());
        let ack = DyscomGetAck::decode(&data).unwrap();
        assert_eq!(ack.kind(), DyscomGetKind::Battery);
        match ack {
            DyscomGetAck::Battery { energy_state, percentage, temperature, current, voltage, .. } => {
                assert!(energy_state.contains(EnergyState::CABLE_CONNECTED));
                assert_eq!(percentage, 85);
                assert_eq!(temperature, -3);
                assert_eq!(current, -120);
                assert_eq!(voltage, 4100);
            }
            other => panic!("wrong variant {other:?}"),
        }
    }

    #[test]
    fn get_ack_operation_mode() {
        let ack = DyscomGetAck::decode(&[0x00, 0x03, 0x05]).unwrap();
        match ack {
            DyscomGetAck::OperationMode { operation_mode, .. } => {
                assert_eq!(operation_mode, OperationMode::Record);
                assert!(operation_mode.is_measuring());
            }
            other => panic!("wrong variant {other:?}"),
        }
    }

    #[test]
    fn get_ack_file_system_status() {
        let mut data = vec![0x00, 0x01, 0x01];
        data.extend_from_slice(&1_000_000u64.to_le_bytes());
        data.extend_from_slice(&9_000_000u64.to_le_bytes());
        match DyscomGetAck::decode(&data).unwrap() {
            DyscomGetAck::FileSystemStatus { ready, used_size, free_size, .. } => {
                assert!(ready);
                assert_eq!(used_size, 1_000_000);
                assert_eq!(free_size, 9_000_000);
            }
            other => panic!("wrong variant {other:?}"),
        }
    }

    #[test]
    fn get_ack_unknown_kind() {
        assert!(matches!(
            DyscomGetAck::decode(&[0x00, 0x09]),
            Err(ProtocolError::UnknownKind { kind: 9, .. })
        ));
    }

    #[test]
    fn get_ack_file_info() {
        let mut data = vec![0x00, 0x07];
        data.extend_from_slice(&fixed_string("rec_0007.bin", 128));
        data.extend_from_slice(&123456u32.to_le_bytes());
        data.extend_from_slice(&0xBEEFu16.to_le_bytes());
        match DyscomGetAck::decode(&data).unwrap() {
            DyscomGetAck::FileInfo { filename, filesize, checksum, .. } => {
                assert_eq!(filename, "rec_0007.bin");
                assert_eq!(filesize, 123456);
                assert_eq!(checksum, 0xBEEF);
            }
            other => panic!("wrong variant {other:?}"),
        }
    }

    #[test]
    fn live_data_two_channels() {
        let mut data = vec![2];
        data.extend_from_slice(&1000u32.to_be_bytes());
        data.extend_from_slice(&1.5f32.to_be_bytes());
        data.push(SignalType::Bipolar.as_u8());
        data.push(0);
        data.extend_from_slice(&(-0.25f32).to_be_bytes());
        data.push(SignalType::Emg1.as_u8());
        data.push(ElectrodeStatus::POSITIVE_ADHESIVE);
        let live = LiveData::decode(&data).unwrap();
        assert_eq!(live.time_offset, 1000);
        assert_eq!(live.samples.len(), 2);
        assert_eq!(live.samples[0].value, 1.5);
        assert_eq!(live.samples[1].signal_type, SignalType::Emg1);
        assert!(live.status_error());
    }

    #[test]
    fn live_data_truncated_samples() {
        let mut data = vec![3];
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(&[0; 6]);
        assert!(LiveData::decode(&data).is_err());
    }

    #[test]
    fn file_block_respects_declared_size() {
        let mut data = vec![];
        data.extend_from_slice(&7u32.to_be_bytes());
        data.extend_from_slice(&4u16.to_be_bytes());
        data.extend_from_slice(&[0xAA, 0xBB, 0xCC, 0xDD, 0xEE]);
        let block = FileBlock::decode(&data).unwrap();
        assert_eq!(block.block_number, 7);
        // trailing byte past the declared size is ignored
        assert_eq!(block.data, vec![0xAA, 0xBB, 0xCC, 0xDD]);
    }

    #[test]
    fn sys_request_layout() {
        let sys = DyscomSys { sys_type: SysType::DeleteFile, filename: "old.bin".into() };
        let data = sys.encode().unwrap();
        assert_eq!(data.len(), 129);
        assert_eq!(&data[..7], b"old.bin");
        assert_eq!(data[128], 1);
    }

    #[test]
    fn init_ack_decode() {
        let mut data = vec![0x00];
        data.extend_from_slice(&Ads129xRegisterMap::default().0);
        data.extend_from_slice(&fixed_string("meas_001", 60));
        data.push(1);
        data.push(4);
        let ack = DyscomInitAck::decode(&data).unwrap();
        assert_eq!(ack.measurement_file_id, "meas_001");
        assert_eq!(ack.init_state, InitState::Success);
        assert_eq!(ack.frequency_out, FrequencyOut::SamplesPerSecond4k);
    }

    #[test]
    fn measurement_meta_info_decode() {
        let params = DyscomInitParams {
            proband_name: "p".into(),
            signal_types: vec![SignalType::Bipolar],
            ..Default::default()
        };
        let mut data = params.encode().unwrap();
        data.extend_from_slice(&fixed_string("rec_0001.bin", 60));
        data.extend_from_slice(&2048u64.to_be_bytes());
        data.extend_from_slice(&1u16.to_be_bytes());
        data.extend_from_slice(&fixed_string("p", 37));
        data.extend_from_slice(&DeviceTimestamp::default().encode());
        data.extend_from_slice(&300u32.to_be_bytes());
        let mmi = MeasurementMetaInfo::decode(&data).unwrap();
        assert_eq!(mmi.file_name, "rec_0001.bin");
        assert_eq!(mmi.file_size, 2048);
        assert_eq!(mmi.file_number, 1);
        assert_eq!(mmi.duration_s, 300);
        assert_eq!(mmi.init_params.proband_name, "p");
    }
}
