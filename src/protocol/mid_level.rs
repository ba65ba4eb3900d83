//! Mid level layer: device-timed repeating stimulation.
//!
//! The host describes up to 8 channels once via [`MidLevelUpdate`] and the
//! device repeats each channel's pulse at its configured period until the
//! next update or stop. GetCurrentData polls stimulation state and
//! per-channel errors and doubles as the keep-alive the device expects
//! during mid-level operation.

use super::{check_len, ResultAndError};
use crate::bits::ByteBuilder;
use crate::error::{ProtocolError, Result};
use crate::protocol::low_level::ChannelPoint;

/// Number of mid-level stimulation channels.
pub const CHANNEL_COUNT: usize = 8;

const MAX_PERIOD_MS: u32 = 32767 * 4;

/// MidLevelInit request parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct MidLevelInit {
    /// Stop the whole stimulation when any channel reports an error.
    pub stop_on_all_errors: bool,
}

impl MidLevelInit {
    pub(crate) fn encode(&self) -> Vec<u8> {
        vec![u8::from(self.stop_on_all_errors)]
    }
}

/// Repeating pulse configuration for one mid-level channel.
#[derive(Debug, Clone)]
pub struct ChannelConfiguration {
    /// Ramp-up in pulse counts, 0..=15.
    pub ramp: u8,
    /// Pulse repetition period in milliseconds, 0..=131068.
    pub period_ms: u32,
    pub points: Vec<ChannelPoint>,
}

impl ChannelConfiguration {
    pub(crate) fn encode(&self) -> Result<Vec<u8>> {
        if self.points.is_empty() || self.points.len() > 16 {
            return Err(ProtocolError::InvalidParameter {
                packet: "ChannelConfiguration",
                reason: format!("{} points, expected 1..=16", self.points.len()),
            });
        }
        if self.ramp > 15 {
            return Err(ProtocolError::InvalidParameter {
                packet: "ChannelConfiguration",
                reason: format!("ramp {} outside 0..=15", self.ramp),
            });
        }
        if self.period_ms > MAX_PERIOD_MS {
            return Err(ProtocolError::InvalidParameter {
                packet: "ChannelConfiguration",
                reason: format!("period {} ms outside 0..={MAX_PERIOD_MS}", self.period_ms),
            });
        }
        // Long periods switch the field to quarter resolution via the
        // factor bit.
        let factor: u32 = if self.period_ms <= 32767 { 2 } else { 4 };
        let mut bb = ByteBuilder::new();
        bb.set_bits(u32::from(self.ramp), 0, 4);
        bb.set_bits(self.points.len() as u32 - 1, 4, 4);
        bb.set_bits(u32::from(factor == 4), 8, 1);
        bb.set_bits(self.period_ms.wrapping_mul(factor) & 0x7FFF, 9, 15);
        bb.swap_range(1, 2);
        for point in &self.points {
            bb.append_bytes(&point.encode()?);
        }
        Ok(bb.to_bytes())
    }
}

/// MidLevelUpdate request: activity flags plus configuration for every
/// active channel. `None` leaves a channel inactive.
#[derive(Debug, Clone, Default)]
pub struct MidLevelUpdate {
    pub channels: [Option<ChannelConfiguration>; CHANNEL_COUNT],
}

impl MidLevelUpdate {
    /// Configure a single channel, leaving the rest inactive.
    pub fn single(index: usize, config: ChannelConfiguration) -> Self {
        let mut update = Self::default();
        update.channels[index] = Some(config);
        update
    }

    pub(crate) fn encode(&self) -> Result<Vec<u8>> {
        let mut bb = ByteBuilder::new();
        for (i, channel) in self.channels.iter().enumerate() {
            bb.set_bits(u32::from(channel.is_some()), i, 1);
        }
        for channel in self.channels.iter().flatten() {
            bb.append_bytes(&channel.encode()?);
        }
        Ok(bb.to_bytes())
    }
}

/// Request payload for GetCurrentData. The selection byte 4 asks for
/// errors from all channels.
pub(crate) fn encode_get_current_data() -> Vec<u8> {
    vec![4]
}

/// GetCurrentData acknowledgement.
#[derive(Debug, Clone)]
pub struct CurrentDataAck {
    pub result: ResultAndError,
    pub data_selection: u8,
    pub stimulation_active: [bool; CHANNEL_COUNT],
    pub channel_errors: [ResultAndError; CHANNEL_COUNT],
}

impl CurrentDataAck {
    pub(crate) fn decode(data: &[u8]) -> Result<Self> {
        check_len(data, 7, "CurrentDataAck")?;
        let result = ResultAndError::from_u8(data[0])?;
        let data_selection = data[1];
        let mut stimulation_active = [false; CHANNEL_COUNT];
        for (i, active) in stimulation_active.iter_mut().enumerate() {
            *active = (data[2] >> i) & 1 == 1;
        }
        let mut bb = ByteBuilder::new();
        bb.append_bytes(&data[3..7]);
        let mut channel_errors = [ResultAndError::NoError; CHANNEL_COUNT];
        for (i, error) in channel_errors.iter_mut().enumerate() {
            *error = match bb.get_bits(i * 4, 4) {
                0 => ResultAndError::NoError,
                1 => ResultAndError::ElectrodeError,
                2 => ResultAndError::PulseTimeoutError,
                3 => ResultAndError::PulseLowCurrentError,
                other => {
                    return Err(ProtocolError::invalid_field(
                        "CurrentDataAck",
                        "channel_error",
                        other,
                    ))
                }
            };
        }
        Ok(Self { result, data_selection, stimulation_active, channel_errors })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn points(n: usize) -> Vec<ChannelPoint> {
        vec![ChannelPoint::new(10.0, 100); n]
    }

    #[test]
    fn init_payload() {
        assert_eq!(MidLevelInit { stop_on_all_errors: true }.encode(), vec![1]);
        assert_eq!(MidLevelInit::default().encode(), vec![0]);
    }

    #[test]
    fn channel_configuration_short_period() {
        let config = ChannelConfiguration { ramp: 5, period_ms: 100, points: points(2) };
        let data = config.encode().unwrap();
        assert_eq!(data.len(), 3 + 2 * 4);
        // ramp in low nibble, count-1 in high nibble
        assert_eq!(data[0], 0x15);

        let mut bb = ByteBuilder::new();
        bb.append_bytes(&data[..3]);
        bb.swap_range(1, 2);
        assert_eq!(bb.get_bits(8, 1), 0);
        assert_eq!(bb.get_bits(9, 15), 200);
    }

    #[test]
    fn channel_configuration_long_period_sets_factor_bit() {
        let config = ChannelConfiguration { ramp: 0, period_ms: 40000, points: points(1) };
        let data = config.encode().unwrap();
        let mut bb = ByteBuilder::new();
        bb.append_bytes(&data[..3]);
        bb.swap_range(1, 2);
        assert_eq!(bb.get_bits(8, 1), 1);
        assert_eq!(bb.get_bits(9, 15), (40000 * 4) & 0x7FFF);
    }

    #[test]
    fn channel_configuration_limits() {
        let bad = ChannelConfiguration { ramp: 16, period_ms: 0, points: points(1) };
        assert!(bad.encode().is_err());
        let bad = ChannelConfiguration { ramp: 0, period_ms: MAX_PERIOD_MS + 1, points: points(1) };
        assert!(bad.encode().is_err());
        let bad = ChannelConfiguration { ramp: 0, period_ms: 0, points: points(0) };
        assert!(bad.encode().is_err());
    }

    #[test]
    fn update_flags_and_blobs() {
        let config = ChannelConfiguration { ramp: 0, period_ms: 50, points: points(1) };
        let mut update = MidLevelUpdate::single(1, config.clone());
        update.channels[4] = Some(config);
        let data = update.encode().unwrap();
        assert_eq!(data[0], 0b0001_0010);
        // flag byte + two channel blobs
        assert_eq!(data.len(), 1 + 2 * (3 + 4));
    }

    #[test]
    fn empty_update_is_one_zero_byte() {
        assert_eq!(MidLevelUpdate::default().encode().unwrap(), vec![0]);
    }

    #[test]
    fn current_data_ack() {
        // channels 0 and 2 active; channel 1 electrode error, channel 7
        // pulse timeout
        let nibbles: u32 = (1 << 4) | (2 << 28);
        let data = [
            0x00,
            0x04,
            0b0000_0101,
            nibbles as u8,
            (nibbles >> 8) as u8,
            (nibbles >> 16) as u8,
            (nibbles >> 24) as u8,
        ];
        let ack = CurrentDataAck::decode(&data).unwrap();
        assert_eq!(ack.data_selection, 4);
        assert!(ack.stimulation_active[0] && ack.stimulation_active[2]);
        assert!(!ack.stimulation_active[1]);
        assert_eq!(ack.channel_errors[1], ResultAndError::ElectrodeError);
        assert_eq!(ack.channel_errors[7], ResultAndError::PulseTimeoutError);
        assert_eq!(ack.channel_errors[0], ResultAndError::NoError);
    }

    #[test]
    fn current_data_ack_rejects_unknown_error_code() {
        assert!(CurrentDataAck::decode(&[0, 4, 0, 0x0F, 0, 0, 0]).is_err());
    }
}
