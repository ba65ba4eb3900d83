//! Command numbers for every protocol layer.
//!
//! By protocol convention an acknowledgement command is its request command
//! plus one. The exceptions are the two device-initiated error commands
//! ([`GENERAL_ERROR`], [`UNKNOWN_COMMAND`]) and the unsolicited push
//! commands the device streams without a paired request.

// Low level (commands 0..)
pub const LOW_LEVEL_INIT: u16 = 0;
pub const LOW_LEVEL_INIT_ACK: u16 = 1;
pub const LOW_LEVEL_CHANNEL_CONFIG: u16 = 2;
pub const LOW_LEVEL_CHANNEL_CONFIG_ACK: u16 = 3;
pub const LOW_LEVEL_STOP: u16 = 4;
pub const LOW_LEVEL_STOP_ACK: u16 = 5;

// Mid level (commands 30..)
pub const MID_LEVEL_INIT: u16 = 30;
pub const MID_LEVEL_INIT_ACK: u16 = 31;
pub const MID_LEVEL_UPDATE: u16 = 32;
pub const MID_LEVEL_UPDATE_ACK: u16 = 33;
pub const MID_LEVEL_STOP: u16 = 34;
pub const MID_LEVEL_STOP_ACK: u16 = 35;
pub const MID_LEVEL_GET_CURRENT_DATA: u16 = 36;
pub const MID_LEVEL_GET_CURRENT_DATA_ACK: u16 = 37;

// General (commands 52..)
pub const GET_DEVICE_ID: u16 = 52;
pub const GET_DEVICE_ID_ACK: u16 = 53;
pub const RESET: u16 = 58;
pub const RESET_ACK: u16 = 59;
pub const GET_STIM_STATUS: u16 = 62;
pub const GET_STIM_STATUS_ACK: u16 = 63;
/// Device-initiated error report; short-circuits any pending wait.
pub const GENERAL_ERROR: u16 = 66;
/// Device did not recognize the last command; short-circuits any pending wait.
pub const UNKNOWN_COMMAND: u16 = 67;
pub const GET_EXTENDED_VERSION: u16 = 68;
pub const GET_EXTENDED_VERSION_ACK: u16 = 69;

// Dyscom / biosignal acquisition (commands 100..)
pub const DL_INIT: u16 = 100;
pub const DL_INIT_ACK: u16 = 101;
pub const DL_START: u16 = 102;
pub const DL_START_ACK: u16 = 103;
pub const DL_STOP: u16 = 104;
pub const DL_STOP_ACK: u16 = 105;
pub const DL_GET: u16 = 106;
pub const DL_GET_ACK: u16 = 107;
pub const DL_POWER_MODULE: u16 = 108;
pub const DL_POWER_MODULE_ACK: u16 = 109;
/// Unsolicited live-data sample push during a measurement.
pub const DL_SEND_LIVE_DATA: u16 = 110;
/// Unsolicited file-block push during a file transfer.
pub const DL_SEND_FILE: u16 = 111;
/// Unsolicited measurement-meta-info push.
pub const DL_SEND_MMI: u16 = 112;
pub const DL_SYS: u16 = 113;
pub const DL_SYS_ACK: u16 = 114;
/// Host-side confirmation of a received file block.
pub const DL_SEND_FILE_ACK: u16 = 115;

/// The acknowledgement command paired with a request command.
pub fn ack_of(command: u16) -> u16 {
    command + 1
}

/// Whether a command is a device-originated push with no paired request.
///
/// Push commands are exempt from open-acknowledge bookkeeping.
pub fn is_push(command: u16) -> bool {
    matches!(command, DL_SEND_LIVE_DATA | DL_SEND_FILE | DL_SEND_MMI)
}
