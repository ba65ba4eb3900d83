use thiserror::Error;

/// Errors arising from wire framing, packet decoding, and payload validation.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("frame too short ({len} bytes, minimum 12)")]
    FrameTooShort { len: usize },

    #[error("missing start marker (expected 0xF0, got 0x{got:02X})")]
    MissingStart { got: u8 },

    #[error("missing stop marker (expected 0x0F)")]
    MissingStop,

    #[error("truncated escape sequence at offset {offset}")]
    TruncatedEscape { offset: usize },

    #[error("unknown command {command}")]
    UnknownCommand { command: u16 },

    #[error("unknown kind {kind} for command {command}")]
    UnknownKind { command: u16, kind: u8 },

    #[error("payload too short for {packet}: need {need} bytes, got {got}{}", format_raw_suffix(raw))]
    PayloadTooShort {
        packet: &'static str,
        need: usize,
        got: usize,
        /// Raw unstuffed payload bytes for debug context.
        raw: Vec<u8>,
    },

    #[error("invalid {field} value {value} in {packet}")]
    InvalidField {
        packet: &'static str,
        field: &'static str,
        value: u32,
    },

    #[error("{packet}: {reason}")]
    InvalidParameter {
        packet: &'static str,
        reason: String,
    },
}

impl ProtocolError {
    /// Create a `PayloadTooShort` error (raw bytes filled in later via `with_raw`).
    pub(crate) fn payload_too_short(packet: &'static str, need: usize, got: usize) -> Self {
        Self::PayloadTooShort { packet, need, got, raw: Vec::new() }
    }

    pub(crate) fn invalid_field(packet: &'static str, field: &'static str, value: u32) -> Self {
        Self::InvalidField { packet, field, value }
    }

    /// Attach raw payload bytes to decode-phase errors for diagnostics.
    pub fn with_raw(self, payload: &[u8]) -> Self {
        match self {
            Self::PayloadTooShort { packet, need, got, .. } => {
                Self::PayloadTooShort { packet, need, got, raw: payload.to_vec() }
            }
            other => other,
        }
    }
}

/// Format raw bytes as a suffix like " | 9E 00 03 ..." (empty if no bytes).
fn format_raw_suffix(raw: &[u8]) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let limit = 16;
    let hex: String = raw.iter().take(limit).map(|b| format!("{b:02X}")).collect();
    let ellipsis = if raw.len() > limit { "..." } else { "" };
    format!(" | {hex}{ellipsis}")
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
