//! Driver error types.
//!
//! Three kinds are kept apart so a caller can tell "try again later" from
//! "stop and fail safe":
//!
//! - [`RangeError`]: the request itself is invalid; nothing touched the bus.
//! - [`Error::Bus`]: the bus faulted on every attempt the retry policy allowed.
//! - [`ProtocolError`]: the device answered with the wrong number of bytes.

use embedded_hal::i2c::ErrorKind;

/// Local input validation failure. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    #[error("channel {0} out of range (0–11)")]
    Channel(i64),

    #[error("invalid channel range {start}..={end}")]
    Span { start: i64, end: i64 },

    #[error("invalid count {count} starting at channel {start} (at most {max})")]
    Count { start: u8, count: usize, max: usize },

    #[error("address 0x{0:02x} is not a 7-bit I2C address")]
    Address(u16),

    #[error("write byte {0} out of range (0..255)")]
    Byte(i64),

    #[error("read length must be >= 0, got {0}")]
    ReadLength(i64),

    #[error("scan {base}..={end} does not cover {count} channel(s) from {start}")]
    Uncovered {
        start: u8,
        count: usize,
        base: u8,
        end: u8,
    },
}

/// The device returned a byte stream that does not fit the scan plan.
///
/// Indicates wiring or device malfunction, so it is surfaced immediately.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected {expected} byte(s) from the device, got {actual}")]
pub struct ProtocolError {
    pub expected: usize,
    pub actual: usize,
}

/// Why a response could not be turned into samples.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The requested channels are not all in the scan.
    #[error(transparent)]
    Range(#[from] RangeError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Any failure of a driver operation. `E` is the bus implementation's error.
#[derive(Debug, thiserror::Error)]
pub enum Error<E: core::fmt::Debug> {
    #[error(transparent)]
    Range(#[from] RangeError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("bus fault after {attempts} attempt(s): {kind}")]
    Bus {
        attempts: u32,
        kind: ErrorKind,
        fault: E,
    },
}

impl<E: core::fmt::Debug> From<DecodeError> for Error<E> {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::Range(e) => Error::Range(e),
            DecodeError::Protocol(e) => Error::Protocol(e),
        }
    }
}

impl<E: core::fmt::Debug> Error<E> {
    /// Only bus faults are transient; the other kinds repeat on every retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Bus { .. })
    }
}
