//! Caller-facing MAX1238 driver.
//!
//! Every read follows the same path: plan the scan, encode the config byte,
//! run one write+read transaction, decode. The driver holds no lock; share
//! it between threads behind a mutex.

use std::collections::BTreeMap;

use embedded_hal::i2c::I2c;
use tracing::{debug, info};

use crate::bus::{execute, Address, RetryPolicy, Transaction};
use crate::command::{InputMode, CHANNEL_COUNT, MAX_CHANNEL};
use crate::decode::decode;
use crate::error::{Error, ProtocolError, RangeError};
use crate::plan::ScanPlan;
use crate::setup::Setup;

// ── Requests and results ────────────────────────────────────────────────────

/// Which channels one read covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channels {
    Single(u8),
    /// Inclusive range; the result is keyed by channel.
    Range { start: u8, end: u8 },
    /// `count` channels from `start`; the result is an ordered block.
    Multiple { start: u8, count: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRequest {
    pub channels: Channels,
    pub mode: InputMode,
}

impl ReadRequest {
    pub fn single(channel: u8, mode: InputMode) -> Self {
        Self {
            channels: Channels::Single(channel),
            mode,
        }
    }

    pub fn range(start: u8, end: u8, mode: InputMode) -> Self {
        Self {
            channels: Channels::Range { start, end },
            mode,
        }
    }

    pub fn multiple(start: u8, count: usize, mode: InputMode) -> Self {
        Self {
            channels: Channels::Multiple { start, count },
            mode,
        }
    }

    /// Check the request without touching the bus.
    pub fn validate(&self) -> Result<(), RangeError> {
        match self.channels {
            Channels::Single(ch) => ScanPlan::single(ch).map(drop),
            Channels::Range { start, end } => ScanPlan::range(start, end).map(drop),
            Channels::Multiple { start, count } => multiple_end(start, count).map(drop),
        }
    }
}

/// Result shape follows the request shape. Every variant knows which
/// channels its values came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelReading {
    Single { channel: u8, value: u16 },
    /// Consecutive channels from `start`.
    Block { start: u8, values: Vec<u16> },
    Map(BTreeMap<u8, u16>),
}

impl ChannelReading {
    /// `(channel, value)` pairs in ascending channel order.
    pub fn samples(&self) -> Vec<(u8, u16)> {
        match self {
            Self::Single { channel, value } => vec![(*channel, *value)],
            Self::Block { start, values } => (*start..).zip(values.iter().copied()).collect(),
            Self::Map(map) => map.iter().map(|(&ch, &v)| (ch, v)).collect(),
        }
    }
}

/// Last channel of a `count`-channel block starting at `start`.
fn multiple_end(start: u8, count: usize) -> Result<u8, RangeError> {
    if start > MAX_CHANNEL {
        return Err(RangeError::Channel(start.into()));
    }
    let max = CHANNEL_COUNT - usize::from(start);
    if count == 0 || count > max {
        return Err(RangeError::Count { start, count, max });
    }
    // count <= 12 here, so the cast is lossless
    Ok(start + (count - 1) as u8)
}

// ── Driver ──────────────────────────────────────────────────────────────────

/// MAX1238 on an `embedded-hal` I2C bus.
pub struct Max1238<I2C> {
    i2c: I2C,
    address: Address,
    retry: RetryPolicy,
    last_setup: Option<Setup>,
}

impl<I2C: I2c> Max1238<I2C> {
    /// Driver at the factory address (0x35).
    pub fn new(i2c: I2C) -> Self {
        Self::with_address(i2c, Address::DEFAULT)
    }

    pub fn with_address(i2c: I2C, address: Address) -> Self {
        Self {
            i2c,
            address,
            retry: RetryPolicy::default(),
            last_setup: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Setup last written by this driver instance, if any.
    pub fn last_setup(&self) -> Option<Setup> {
        self.last_setup
    }

    /// Give the bus back.
    pub fn release(self) -> I2C {
        self.i2c
    }

    /// Write the setup byte. The device keeps it until the next setup write
    /// or a power cycle.
    pub fn setup(&mut self, setup: Setup) -> Result<(), Error<I2C::Error>> {
        let byte = setup.encode();
        self.run(&Transaction::write(&[byte]))?;
        self.last_setup = Some(setup);

        info!(
            addr = format_args!("0x{:02x}", self.address.get()),
            byte = format_args!("0x{byte:02x}"),
            ?setup,
            "max1238 setup written"
        );
        Ok(())
    }

    /// Convert one channel.
    pub fn read_single(&mut self, channel: u8, mode: InputMode) -> Result<u16, Error<I2C::Error>> {
        let plan = ScanPlan::single(channel)?;
        let words = self.scan(&plan, mode, channel, 1)?;
        words.first().copied().ok_or_else(|| {
            ProtocolError {
                expected: plan.read_len(),
                actual: 0,
            }
            .into()
        })
    }

    /// Convert `start..=end`, keyed by channel.
    pub fn read_range(
        &mut self,
        start: u8,
        end: u8,
        mode: InputMode,
    ) -> Result<BTreeMap<u8, u16>, Error<I2C::Error>> {
        let plan = ScanPlan::range(start, end)?;
        let count = usize::from(end - start) + 1;
        let words = self.scan(&plan, mode, start, count)?;
        Ok((start..=end).zip(words).collect())
    }

    /// Convert `count` consecutive channels from `start`, in channel order.
    pub fn read_multiple(
        &mut self,
        start: u8,
        count: usize,
        mode: InputMode,
    ) -> Result<Vec<u16>, Error<I2C::Error>> {
        let end = multiple_end(start, count)?;
        let plan = ScanPlan::range(start, end)?;
        self.scan(&plan, mode, start, count)
    }

    /// Run any request shape.
    pub fn read(&mut self, request: &ReadRequest) -> Result<ChannelReading, Error<I2C::Error>> {
        let mode = request.mode;
        Ok(match request.channels {
            Channels::Single(channel) => ChannelReading::Single {
                channel,
                value: self.read_single(channel, mode)?,
            },
            Channels::Range { start, end } => {
                ChannelReading::Map(self.read_range(start, end, mode)?)
            }
            Channels::Multiple { start, count } => {
                ChannelReading::Block {
                    start,
                    values: self.read_multiple(start, count, mode)?,
                }
            }
        })
    }

    fn scan(
        &mut self,
        plan: &ScanPlan,
        mode: InputMode,
        start: u8,
        count: usize,
    ) -> Result<Vec<u16>, Error<I2C::Error>> {
        plan.skip_for(start, count)?;
        let config = plan.config_byte(mode)?;
        let raw = self.run(&Transaction::write_read(&[config], plan.read_len()))?;
        let words = decode(&raw, plan, start, count)?;

        debug!(
            config = format_args!("0x{config:02x}"),
            base = plan.base_channel,
            end = plan.end_channel,
            start,
            ?words,
            "max1238 scan"
        );
        Ok(words)
    }

    fn run(&mut self, tx: &Transaction) -> Result<Vec<u8>, Error<I2C::Error>> {
        execute(&mut self.i2c, self.address, tx, self.retry)
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
