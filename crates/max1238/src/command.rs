//! Config byte construction.
//!
//! A config byte selects what the *next* read converts. It does not persist
//! past that read.
//!
//! Layout (MSB first):
//!   [7]     REG      0 = config byte
//!   [6:5]   SCAN     scan mode
//!   [4:1]   CS       channel select (0–11)
//!   [0]     SGL/DIF  1 = single-ended, 0 = differential

use serde::Deserialize;

use crate::error::RangeError;
use crate::setup::REG_SETUP;

/// Highest channel index on the MAX1238.
pub const MAX_CHANNEL: u8 = 11;

/// Number of analog inputs.
pub const CHANNEL_COUNT: usize = MAX_CHANNEL as usize + 1;

const SCAN_SHIFT: u8 = 5;
const SCAN_MASK: u8 = 0b11;
const CS_SHIFT: u8 = 1;
const CS_MASK: u8 = 0b1111;

/// SCAN[1:0].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Convert AIN0 up to and including CS.
    FromBankZero,
    /// Convert CS eight times.
    RepeatSelected,
    /// Convert AIN6 up to and including CS.
    FromBankSix,
    /// Convert CS only.
    SelectedOnly,
}

impl ScanMode {
    pub const fn bits(self) -> u8 {
        match self {
            Self::FromBankZero => 0b00,
            Self::RepeatSelected => 0b01,
            Self::FromBankSix => 0b10,
            Self::SelectedOnly => 0b11,
        }
    }

    pub const fn from_bits(bits: u8) -> Self {
        match bits & SCAN_MASK {
            0b00 => Self::FromBankZero,
            0b01 => Self::RepeatSelected,
            0b10 => Self::FromBankSix,
            _ => Self::SelectedOnly,
        }
    }
}

/// SGL/DIF. Differential pairing is handled entirely by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    #[default]
    SingleEnded,
    Differential,
}

impl InputMode {
    pub const fn bit(self) -> u8 {
        match self {
            Self::SingleEnded => 1,
            Self::Differential => 0,
        }
    }
}

/// Validate a channel index coming from an untyped source.
pub fn check_channel(channel: i64) -> Result<u8, RangeError> {
    match u8::try_from(channel) {
        Ok(ch) if ch <= MAX_CHANNEL => Ok(ch),
        _ => Err(RangeError::Channel(channel)),
    }
}

/// Build the config byte for the next conversion.
pub fn encode_config(scan: ScanMode, channel: u8, mode: InputMode) -> Result<u8, RangeError> {
    if channel > MAX_CHANNEL {
        return Err(RangeError::Channel(channel.into()));
    }

    Ok((scan.bits() << SCAN_SHIFT) | (channel << CS_SHIFT) | mode.bit())
}

/// A config byte taken apart again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigCommand {
    pub scan: ScanMode,
    pub channel: u8,
    pub mode: InputMode,
}

/// Parse a config byte. Returns `None` for setup bytes and for channel
/// selects the MAX1238 does not have.
pub fn decode_config(byte: u8) -> Option<ConfigCommand> {
    if byte & REG_SETUP != 0 {
        return None;
    }

    let channel = (byte >> CS_SHIFT) & CS_MASK;
    if channel > MAX_CHANNEL {
        return None;
    }

    let mode = if byte & 1 == 1 {
        InputMode::SingleEnded
    } else {
        InputMode::Differential
    };

    Some(ConfigCommand {
        scan: ScanMode::from_bits(byte >> SCAN_SHIFT),
        channel,
        mode,
    })
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convert_channel_zero_single_ended() {
        // REG=0, SCAN=11, CS=0000, SGL/DIF=1
        let cfg = encode_config(ScanMode::SelectedOnly, 0, InputMode::SingleEnded).unwrap();
        assert_eq!(cfg, 0x61, "config: {cfg:#04x}");
    }

    #[test]
    fn scan_bank_six_up_to_nine() {
        let cfg = encode_config(ScanMode::FromBankSix, 9, InputMode::SingleEnded).unwrap();
        assert_eq!(cfg, 0b0_10_1001_1);
    }

    #[test]
    fn differential_clears_low_bit() {
        let cfg = encode_config(ScanMode::FromBankZero, 11, InputMode::Differential).unwrap();
        assert_eq!(cfg, 0b0_00_1011_0);
    }

    #[test]
    fn config_marker_never_set() {
        for ch in 0..=MAX_CHANNEL {
            for scan in [
                ScanMode::FromBankZero,
                ScanMode::RepeatSelected,
                ScanMode::FromBankSix,
                ScanMode::SelectedOnly,
            ] {
                let cfg = encode_config(scan, ch, InputMode::SingleEnded).unwrap();
                assert_eq!(cfg & 0x80, 0, "{scan:?} ch={ch}");
            }
        }
    }

    #[test]
    fn channel_twelve_rejected() {
        assert_eq!(
            encode_config(ScanMode::SelectedOnly, 12, InputMode::SingleEnded),
            Err(RangeError::Channel(12))
        );
    }

    #[test]
    fn check_channel_bounds() {
        assert_eq!(check_channel(0), Ok(0));
        assert_eq!(check_channel(11), Ok(11));
        assert_eq!(check_channel(12), Err(RangeError::Channel(12)));
        assert_eq!(check_channel(-1), Err(RangeError::Channel(-1)));
        assert_eq!(check_channel(300), Err(RangeError::Channel(300)));
    }

    #[test]
    fn decode_reverses_encode() {
        let cfg = encode_config(ScanMode::FromBankSix, 10, InputMode::Differential).unwrap();
        assert_eq!(
            decode_config(cfg),
            Some(ConfigCommand {
                scan: ScanMode::FromBankSix,
                channel: 10,
                mode: InputMode::Differential,
            })
        );
    }

    #[test]
    fn decode_rejects_setup_byte() {
        assert_eq!(decode_config(0xD2), None);
    }

    #[test]
    fn decode_rejects_missing_channels() {
        // CS=1100 (channel 12) does not exist on this part.
        assert_eq!(decode_config(0b0_11_1100_1), None);
    }
}
