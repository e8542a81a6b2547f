//! Mapping requested channels onto the device's scan banks.
//!
//! The MAX1238 can only start a scan at AIN0 or AIN6. A request that starts
//! anywhere else is widened down to the nearest bank origin; the extra
//! leading samples are dropped again when decoding.

use crate::command::{encode_config, InputMode, ScanMode, MAX_CHANNEL};
use crate::error::RangeError;

/// First channel of the upper scan bank.
pub const BANK_SIX: u8 = 6;

/// Bytes the device returns per conversion result.
pub const BYTES_PER_WORD: usize = 2;

/// What a single transaction asks the device to convert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanPlan {
    pub scan_mode: ScanMode,
    /// Channel of the first result word.
    pub base_channel: u8,
    /// Channel written to CS; conversion stops here.
    pub end_channel: u8,
    /// Result words the device will return.
    pub word_count: usize,
}

impl ScanPlan {
    /// Immediate conversion of one channel.
    pub fn single(channel: u8) -> Result<Self, RangeError> {
        if channel > MAX_CHANNEL {
            return Err(RangeError::Channel(channel.into()));
        }

        Ok(Self {
            scan_mode: ScanMode::SelectedOnly,
            base_channel: channel,
            end_channel: channel,
            word_count: 1,
        })
    }

    /// Bank scan covering `start..=end`.
    pub fn range(start: u8, end: u8) -> Result<Self, RangeError> {
        if start > MAX_CHANNEL {
            return Err(RangeError::Channel(start.into()));
        }
        if end > MAX_CHANNEL {
            return Err(RangeError::Channel(end.into()));
        }
        if start > end {
            return Err(RangeError::Span {
                start: start.into(),
                end: end.into(),
            });
        }

        let (scan_mode, base_channel) = if start < BANK_SIX {
            (ScanMode::FromBankZero, 0)
        } else {
            (ScanMode::FromBankSix, BANK_SIX)
        };

        Ok(Self {
            scan_mode,
            base_channel,
            end_channel: end,
            word_count: usize::from(end - base_channel) + 1,
        })
    }

    /// Total bytes to read back for this plan.
    pub fn read_len(&self) -> usize {
        self.word_count * BYTES_PER_WORD
    }

    /// Leading words to drop so the result starts at `start`, provided
    /// `count` channels from `start` all fall inside this scan.
    pub fn skip_for(&self, start: u8, count: usize) -> Result<usize, RangeError> {
        let uncovered = RangeError::Uncovered {
            start,
            count,
            base: self.base_channel,
            end: self.end_channel,
        };

        if start < self.base_channel {
            return Err(uncovered);
        }
        let skip = usize::from(start - self.base_channel);
        if count == 0 || skip + count > self.word_count {
            return Err(uncovered);
        }
        Ok(skip)
    }

    /// Config byte that starts this plan on the device.
    pub fn config_byte(&self, mode: InputMode) -> Result<u8, RangeError> {
        encode_config(self.scan_mode, self.end_channel, mode)
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
