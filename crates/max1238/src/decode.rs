//! Turning the device's byte stream back into 12-bit samples.
//!
//! Each result is two bytes, MSB first:
//!   byte 0: [1 1 1 1 D11 D10 D9 D8]  (upper nibble is padding)
//!   byte 1: [D7 .. D0]

use crate::error::{DecodeError, ProtocolError};
use crate::plan::{ScanPlan, BYTES_PER_WORD};

/// Largest value a 12-bit conversion can produce.
pub const SAMPLE_MAX: u16 = 0x0FFF;

const PADDING: u8 = 0xF0;

/// Recover one sample from a byte pair.
pub fn decode_sample(hi: u8, lo: u8) -> u16 {
    (u16::from(hi & 0x0F) << 8) | u16::from(lo)
}

/// Byte pair as the device would send it, padding nibble included.
/// Bits above the 12-bit range are dropped.
pub fn encode_sample(value: u16) -> [u8; 2] {
    let [hi, lo] = (value & SAMPLE_MAX).to_be_bytes();
    [PADDING | hi, lo]
}

/// Decode `raw` according to `plan`, then keep the `count` samples starting
/// at `start`.
///
/// Leading samples the bank scan forced below `start` are discarded. A
/// request the plan does not fully cover is rejected rather than relabelled.
pub fn decode(
    raw: &[u8],
    plan: &ScanPlan,
    start: u8,
    count: usize,
) -> Result<Vec<u16>, DecodeError> {
    let skip = plan.skip_for(start, count)?;

    let expected = plan.read_len();
    if raw.len() != expected {
        return Err(ProtocolError {
            expected,
            actual: raw.len(),
        }
        .into());
    }

    Ok(raw
        .chunks_exact(BYTES_PER_WORD)
        .map(|pair| decode_sample(pair[0], pair[1]))
        .skip(skip)
        .take(count)
        .collect())
}

// ── Tests ───────────────────────────────────────────────────────────────────
