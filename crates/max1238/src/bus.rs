//! The only place the driver touches the bus.
//!
//! A config write and the read that follows it must go out as one combined
//! I2C message (repeated START, no STOP in between). The device starts
//! converting when it is addressed for the read; anything interleaved would
//! return data for the wrong channel. [`Transaction`] therefore carries both
//! halves and [`execute`] issues them through a single `write_read` call.

use std::{thread, time::Duration};

use embedded_hal::i2c::{Error as _, I2c};
use tracing::{debug, error, warn};

use crate::error::{Error, RangeError};

/// Factory address of the MAX1238.
pub const DEFAULT_ADDRESS: u8 = 0x35;

// ── Address ─────────────────────────────────────────────────────────────────

/// A 7-bit I2C address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Address(u8);

impl Address {
    pub const DEFAULT: Address = Address(DEFAULT_ADDRESS);

    pub fn new(addr: u16) -> Result<Self, RangeError> {
        match u8::try_from(addr) {
            Ok(a) if a <= 0x7F => Ok(Self(a)),
            _ => Err(RangeError::Address(addr)),
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for Address {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ── Retry policy ────────────────────────────────────────────────────────────

/// How often, and how far apart, a faulted transaction is repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    /// Pause between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            delay: Duration::from_millis(2),
        }
    }
}

// ── Transaction ─────────────────────────────────────────────────────────────

/// One bus operation: an optional write, then an optional read, without
/// releasing the bus in between.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Transaction {
    write: Vec<u8>,
    read_len: usize,
}

impl Transaction {
    pub fn write(bytes: &[u8]) -> Self {
        Self {
            write: bytes.to_vec(),
            read_len: 0,
        }
    }

    pub fn read(len: usize) -> Self {
        Self {
            write: Vec::new(),
            read_len: len,
        }
    }

    pub fn write_read(bytes: &[u8], len: usize) -> Self {
        Self {
            write: bytes.to_vec(),
            read_len: len,
        }
    }

    /// Build a transaction from untyped values, rejecting anything that does
    /// not fit on the wire.
    pub fn from_values(write: &[i64], read_len: i64) -> Result<Self, RangeError> {
        let bytes = write
            .iter()
            .map(|&b| u8::try_from(b).map_err(|_| RangeError::Byte(b)))
            .collect::<Result<Vec<u8>, _>>()?;
        let read_len = usize::try_from(read_len).map_err(|_| RangeError::ReadLength(read_len))?;
        Ok(Self {
            write: bytes,
            read_len,
        })
    }

    pub fn write_bytes(&self) -> &[u8] {
        &self.write
    }

    pub fn read_len(&self) -> usize {
        self.read_len
    }

    /// Nothing to send and nothing to receive.
    pub fn is_empty(&self) -> bool {
        self.write.is_empty() && self.read_len == 0
    }
}

// ── Execution ───────────────────────────────────────────────────────────────

/// Run `tx` against the device at `address`, repeating the whole cycle on a
/// bus fault as `retry` allows.
///
/// Returns exactly `tx.read_len()` bytes. An empty transaction returns an
/// empty vector without touching the bus.
pub fn execute<I2C: I2c>(
    i2c: &mut I2C,
    address: Address,
    tx: &Transaction,
    retry: RetryPolicy,
) -> Result<Vec<u8>, Error<I2C::Error>> {
    if tx.is_empty() {
        return Ok(Vec::new());
    }

    let addr = address.get();
    let mut buf = vec![0u8; tx.read_len];
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        let result = if tx.read_len == 0 {
            i2c.write(addr, &tx.write)
        } else if tx.write.is_empty() {
            i2c.read(addr, &mut buf)
        } else {
            i2c.write_read(addr, &tx.write, &mut buf)
        };

        match result {
            Ok(()) => {
                debug!(
                    addr = format_args!("0x{addr:02x}"),
                    write = ?tx.write,
                    read_len = tx.read_len,
                    attempt,
                    "i2c transfer"
                );
                return Ok(buf);
            }
            Err(fault) => {
                let kind = fault.kind();
                if attempt > retry.max_retries {
                    error!(
                        addr = format_args!("0x{addr:02x}"),
                        attempts = attempt,
                        "i2c transfer failed: {kind}"
                    );
                    return Err(Error::Bus {
                        attempts: attempt,
                        kind,
                        fault,
                    });
                }
                warn!(
                    addr = format_args!("0x{addr:02x}"),
                    attempt,
                    delay_ms = retry.delay.as_millis() as u64,
                    "i2c transfer failed: {kind}, retrying"
                );
                thread::sleep(retry.delay);
            }
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
