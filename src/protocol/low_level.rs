//! Low level layer: direct per-pulse stimulation control.
//!
//! The host composes every pulse itself as a sequence of
//! [`ChannelPoint`]s and sends one [`LowLevelChannelConfig`] per pulse.
//! The device acknowledges each config and, when a measurement mode is
//! active, returns a block of sampled feedback values.

use super::{check_len, ResultAndError};
use crate::bits::ByteBuilder;
use crate::error::{ProtocolError, Result};

/// Stimulation channel within a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Channel {
    Red,
    Blue,
    Black,
    White,
}

impl Channel {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Red => 0,
            Self::Blue => 1,
            Self::Black => 2,
            Self::White => 3,
        }
    }
}

/// Physical device connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Connector {
    Yellow,
    Green,
}

impl Connector {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Yellow => 0,
            Self::Green => 1,
        }
    }
}

/// Feedback measurement mode selected at low-level init.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LowLevelMode {
    #[default]
    NoMeasurement,
    StimCurrent,
    StimVoltage,
    HighVoltageSource,
}

impl LowLevelMode {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::NoMeasurement => 0,
            Self::StimCurrent => 1,
            Self::StimVoltage => 2,
            Self::HighVoltageSource => 3,
        }
    }

    pub fn from_u8(value: u8) -> Result<Self> {
        Ok(match value {
            0 => Self::NoMeasurement,
            1 => Self::StimCurrent,
            2 => Self::StimVoltage,
            3 => Self::HighVoltageSource,
            other => {
                return Err(ProtocolError::invalid_field(
                    "ChannelConfigAck",
                    "mode",
                    u32::from(other),
                ))
            }
        })
    }
}

/// High-voltage supply selection at low-level init.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HighVoltageSource {
    #[default]
    Standard,
    Off,
}

impl HighVoltageSource {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Standard => 0,
            Self::Off => 1,
        }
    }
}

/// One segment of a stimulation pulse: a current held for a duration.
///
/// Current is in milliampere, -150..=150; duration in microseconds,
/// 0..=4095. A typical biphasic pulse is three points: positive phase,
/// pause, negative phase.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChannelPoint {
    pub current_ma: f32,
    pub duration_us: u16,
}

impl ChannelPoint {
    pub fn new(current_ma: f32, duration_us: u16) -> Self {
        Self { current_ma, duration_us }
    }

    pub(crate) fn encode(&self) -> Result<[u8; 4]> {
        if !(-150.0..=150.0).contains(&self.current_ma) {
            return Err(ProtocolError::InvalidParameter {
                packet: "ChannelPoint",
                reason: format!("current {} mA outside -150..=150", self.current_ma),
            });
        }
        if self.duration_us > 4095 {
            return Err(ProtocolError::InvalidParameter {
                packet: "ChannelPoint",
                reason: format!("duration {} us outside 0..=4095", self.duration_us),
            });
        }
        // Current in 0.5 mA steps, offset so the field is unsigned.
        let current = (2.0 * self.current_ma + 300.0).round() as u32;
        let mut bb = ByteBuilder::new();
        bb.set_bits(0, 0, 10);
        bb.set_bits(current, 10, 10);
        bb.set_bits(u32::from(self.duration_us), 20, 12);
        bb.swap_range(0, 4);
        let bytes = bb.to_bytes();
        Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

/// LowLevelInit request parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct LowLevelInit {
    pub high_voltage_source: HighVoltageSource,
    pub mode: LowLevelMode,
}

impl LowLevelInit {
    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut bb = ByteBuilder::new();
        bb.set_bits(0, 0, 1);
        bb.set_bits(u32::from(self.high_voltage_source.as_u8()), 1, 3);
        bb.set_bits(u32::from(self.mode.as_u8()), 4, 3);
        bb.set_bits(0, 7, 1);
        bb.to_bytes()
    }
}

/// LowLevelChannelConfig request: one pulse on one channel.
#[derive(Debug, Clone)]
pub struct LowLevelChannelConfig {
    pub channel: Channel,
    pub connector: Connector,
    /// When false the device validates the pulse without stimulating.
    pub execute_stimulation: bool,
    pub points: Vec<ChannelPoint>,
}

impl LowLevelChannelConfig {
    pub(crate) fn encode(&self) -> Result<Vec<u8>> {
        if self.points.is_empty() || self.points.len() > 16 {
            return Err(ProtocolError::InvalidParameter {
                packet: "LowLevelChannelConfig",
                reason: format!("{} points, expected 1..=16", self.points.len()),
            });
        }
        let mut bb = ByteBuilder::new();
        bb.set_bits(self.points.len() as u32 - 1, 0, 4);
        bb.set_bits(u32::from(self.connector.as_u8()), 4, 1);
        bb.set_bits(u32::from(self.channel.as_u8()), 5, 2);
        bb.set_bits(u32::from(self.execute_stimulation), 7, 1);
        for point in &self.points {
            bb.append_bytes(&point.encode()?);
        }
        Ok(bb.to_bytes())
    }
}

/// LowLevelChannelConfig acknowledgement.
///
/// `measurement` is populated only when the init mode requested feedback
/// sampling.
#[derive(Debug, Clone)]
pub struct ChannelConfigAck {
    pub result: ResultAndError,
    pub channel: u8,
    pub connector: u8,
    pub mode: LowLevelMode,
    pub measurement: Option<Measurement>,
}

/// Sampled feedback block attached to a channel-config acknowledgement.
#[derive(Debug, Clone)]
pub struct Measurement {
    pub sampling_time_us: u16,
    pub samples: Vec<u16>,
}

/// Number of feedback samples in a measurement block.
const MEASUREMENT_SAMPLES: usize = 128;

impl ChannelConfigAck {
    pub(crate) fn decode(data: &[u8]) -> Result<Self> {
        check_len(data, 3, "ChannelConfigAck")?;
        let mut bb = ByteBuilder::new();
        bb.append_bytes(data);
        let result = ResultAndError::from_u8(data[0])?;
        let channel = bb.get_bits(8, 4) as u8;
        let connector = bb.get_bits(12, 4) as u8;
        let mode = LowLevelMode::from_u8(data[2])?;
        let measurement = if mode != LowLevelMode::NoMeasurement {
            check_len(data, 4 + MEASUREMENT_SAMPLES * 2, "ChannelConfigAck")?;
            let sampling_time_us = bb.get_bits(16, 16) as u16;
            let samples = (0..MEASUREMENT_SAMPLES)
                .map(|i| bb.get_bits(32 + i * 16, 16) as u16)
                .collect();
            Some(Measurement { sampling_time_us, samples })
        } else {
            None
        };
        Ok(Self { result, channel, connector, mode, measurement })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
