//! Blocking driver for the Maxim MAX1238, a 12-bit, 12-channel ADC on I2C,
//! built on the `embedded-hal` 1.0 I2C trait.
//!
//! ```ignore
//! use max1238::{InputMode, Max1238, Setup};
//!
//! let mut adc = Max1238::new(i2c);
//! adc.setup(Setup::default())?;
//! let hot = adc.read_single(0, InputMode::SingleEnded)?;
//! let bank_b = adc.read_range(6, 9, InputMode::SingleEnded)?;
//! ```

#![forbid(unsafe_code)]

pub mod bus;
pub mod command;
pub mod decode;
pub mod driver;
pub mod error;
pub mod plan;
pub mod setup;

#[cfg(test)]
mod mock;

pub use bus::{Address, RetryPolicy, Transaction, DEFAULT_ADDRESS};
pub use command::{
    check_channel, decode_config, encode_config, ConfigCommand, InputMode, ScanMode,
    CHANNEL_COUNT, MAX_CHANNEL,
};
pub use decode::{decode_sample, encode_sample, SAMPLE_MAX};
pub use driver::{ChannelReading, Channels, Max1238, ReadRequest};
pub use error::{DecodeError, Error, ProtocolError, RangeError};
pub use plan::ScanPlan;
pub use setup::{encode_setup, ClockSource, Polarity, ReferenceVoltage, ResetMode, Setup};
