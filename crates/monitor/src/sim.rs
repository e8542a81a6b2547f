//! Simulated MAX1238 on an in-memory I2C bus for local development.
//!
//! Behaves like the real part at the byte level:
//! - setup bytes (REG=1) are latched and kept
//! - config bytes (REG=0) select the scan for the next read
//! - reads return 12-bit words with the upper nibble of each MSB padded to 1s
//! - a read longer than the scan result repeats the result
//! - any other address is NACKed
//!
//! Each channel drifts as a mean-reverting random walk around its own
//! centre, so consecutive readings are coherent and channels are
//! distinguishable.

use embedded_hal::i2c::{
    self, ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation, SevenBitAddress,
};
use max1238::{
    decode_config, encode_sample, ConfigCommand, InputMode, ScanMode, CHANNEL_COUNT, SAMPLE_MAX,
};

/// Channel `n` idles around `CENTRE_BASE + n * CENTRE_STEP`.
const CENTRE_BASE: f64 = 256.0;
const CENTRE_STEP: f64 = 320.0;

/// How far a channel may wander from its centre.
const MAX_EXCURSION: f64 = 100.0;

const WALK_SIGMA: f64 = 6.0;
const NOISE_SIGMA: f64 = 3.0;
const MEAN_REVERSION: f64 = 0.05;

/// Words produced by a repeat-selected scan.
const REPEAT_COUNT: usize = 8;

/// Power-up config: convert AIN0 only.
const POWER_UP_CONFIG: ConfigCommand = ConfigCommand {
    scan: ScanMode::SelectedOnly,
    channel: 0,
    mode: InputMode::SingleEnded,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimError(ErrorKind);

impl i2c::Error for SimError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

impl std::fmt::Display for SimError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "simulated i2c fault: {}", self.0)
    }
}

impl std::error::Error for SimError {}

/// Approximate a sample from N(0,1) using the Irwin-Hall method:
/// sum of 12 uniform [0,1) values minus 6.
fn approx_std_normal(rng: &mut fastrand::Rng) -> f64 {
    (0..12).map(|_| rng.f64()).sum::<f64>() - 6.0
}

pub struct SimBus {
    address: u8,
    setup: Option<u8>,
    config: ConfigCommand,
    /// Current offset of each channel from its centre.
    drift: [f64; CHANNEL_COUNT],
    /// Probability that any transaction is NACKed.
    fault_rate: f32,
    rng: fastrand::Rng,
}

impl SimBus {
    pub fn new(address: u8) -> Self {
        Self::with_rng(address, fastrand::Rng::new())
    }

    /// Reproducible noise, for tests.
    pub fn with_seed(address: u8, seed: u64) -> Self {
        Self::with_rng(address, fastrand::Rng::with_seed(seed))
    }

    fn with_rng(address: u8, rng: fastrand::Rng) -> Self {
        Self {
            address,
            setup: None,
            config: POWER_UP_CONFIG,
            drift: [0.0; CHANNEL_COUNT],
            fault_rate: 0.0,
            rng,
        }
    }

    /// NACK a fraction of transactions to exercise the retry path.
    pub fn with_fault_rate(mut self, rate: f32) -> Self {
        self.fault_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Last setup byte received.
    pub fn setup_byte(&self) -> Option<u8> {
        self.setup
    }

    pub fn centre(channel: u8) -> f64 {
        CENTRE_BASE + f64::from(channel) * CENTRE_STEP
    }

    fn command(&mut self, byte: u8) {
        if byte & 0x80 != 0 {
            self.setup = Some(byte);
        } else if let Some(cfg) = decode_config(byte) {
            self.config = cfg;
        }
        // CS values 12..15 address nothing on this part and are ignored.
    }

    /// Channels converted by the current config, in output order.
    fn scan_channels(&self) -> Vec<u8> {
        let cs = self.config.channel;
        match self.config.scan {
            ScanMode::FromBankZero => (0..=cs).collect(),
            ScanMode::FromBankSix if cs >= 6 => (6..=cs).collect(),
            ScanMode::FromBankSix | ScanMode::SelectedOnly => vec![cs],
            ScanMode::RepeatSelected => vec![cs; REPEAT_COUNT],
        }
    }

    fn convert(&mut self, channel: u8) -> u16 {
        let idx = usize::from(channel);

        let pull = -MEAN_REVERSION * self.drift[idx];
        let walk = WALK_SIGMA * approx_std_normal(&mut self.rng);
        self.drift[idx] = (self.drift[idx] + pull + walk).clamp(-MAX_EXCURSION, MAX_EXCURSION);

        let noise = NOISE_SIGMA * approx_std_normal(&mut self.rng);
        let value = Self::centre(channel) + self.drift[idx] + noise;
        value.round().clamp(0.0, f64::from(SAMPLE_MAX)) as u16
    }

    fn fill(&mut self, buf: &mut [u8]) {
        let bytes: Vec<u8> = self
            .scan_channels()
            .into_iter()
            .flat_map(|ch| encode_sample(self.convert(ch)))
            .collect();

        for (dst, src) in buf.iter_mut().zip(bytes.iter().cycle()) {
            *dst = *src;
        }
    }
}

impl ErrorType for SimBus {
    type Error = SimError;
}

impl I2c<SevenBitAddress> for SimBus {
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if address != self.address {
            return Err(SimError(ErrorKind::NoAcknowledge(
                NoAcknowledgeSource::Address,
            )));
        }
        if self.fault_rate > 0.0 && self.rng.f32() < self.fault_rate {
            return Err(SimError(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data)));
        }

        for op in operations {
            match op {
                Operation::Write(bytes) => {
                    for &b in bytes.iter() {
                        self.command(b);
                    }
                }
                Operation::Read(buf) => self.fill(buf),
            }
        }
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================
