//! TOML config file loading and validation for the bus, device setup and
//! the channels sampled each sweep.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use max1238::{check_channel, Address, InputMode, RangeError, ReadRequest, RetryPolicy, Setup};
use serde::Deserialize;

use crate::sampler::{Job, RunSettings};

// ---------------------------------------------------------------------------
// Config file structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bus: BusSection,
    #[serde(default)]
    pub setup: Setup,
    #[serde(default)]
    pub sampling: SamplingSection,
    #[serde(default)]
    pub reads: Vec<ReadEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BusSection {
    /// Linux I2C bus number (`/dev/i2c-N`).
    pub number: u8,
    pub address: u16,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    /// Upper bound on one whole sample, retries included.
    pub deadline_ms: u64,
}

impl Default for BusSection {
    fn default() -> Self {
        Self {
            number: 1,
            address: max1238::DEFAULT_ADDRESS.into(),
            max_retries: 1,
            retry_delay_ms: 2,
            deadline_ms: 250,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SamplingSection {
    pub every_ms: u64,
    /// Failed sweeps in a row before the monitor gives up.
    pub max_consecutive_failures: u32,
}

impl Default for SamplingSection {
    fn default() -> Self {
        Self {
            every_ms: 500,
            max_consecutive_failures: 5,
        }
    }
}

/// One read per sweep. The shape is picked by which fields are present:
/// `channel`, `start` + `end`, or `start` + `count`.
#[derive(Debug, Default, Deserialize)]
pub struct ReadEntry {
    pub name: String,
    pub channel: Option<i64>,
    pub start: Option<i64>,
    pub end: Option<i64>,
    pub count: Option<i64>,
    #[serde(default)]
    pub mode: InputMode,
}

impl BusSection {
    pub fn address(&self) -> Result<Address, RangeError> {
        Address::new(self.address)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

impl ReadEntry {
    /// Turn the entry into a driver request, checking every channel bound.
    pub fn request(&self) -> Result<ReadRequest, String> {
        let ch = |v: i64| check_channel(v).map_err(|e| e.to_string());

        let request = match (self.channel, self.start, self.end, self.count) {
            (Some(c), None, None, None) => ReadRequest::single(ch(c)?, self.mode),
            (None, Some(s), Some(e), None) => ReadRequest::range(ch(s)?, ch(e)?, self.mode),
            (None, Some(s), None, Some(n)) => {
                let count = usize::try_from(n).map_err(|_| format!("count must be positive, got {n}"))?;
                ReadRequest::multiple(ch(s)?, count, self.mode)
            }
            _ => {
                return Err(
                    "expected exactly one of `channel`, `start` + `end`, or `start` + `count`"
                        .to_string(),
                )
            }
        };

        request.validate().map_err(|e| e.to_string())?;
        Ok(request)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl Config {
    /// Validate all config entries. Returns `Ok(())` or an error describing
    /// every violation found (not just the first one).
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        self.validate_bus(&mut errors);
        self.validate_sampling(&mut errors);
        self.validate_reads(&mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            bail!(
                "config validation failed ({} error{}):\n  - {}",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" },
                errors.join("\n  - ")
            );
        }
    }

    fn validate_bus(&self, errors: &mut Vec<String>) {
        let b = &self.bus;

        if let Err(e) = b.address() {
            errors.push(format!("bus: {e}"));
        }
        if b.deadline_ms == 0 {
            errors.push("bus: deadline_ms must be positive".to_string());
        }

        // A deadline shorter than the retry pauses alone can never be met.
        let retry_wait = u64::from(b.max_retries).saturating_mul(b.retry_delay_ms);
        if b.deadline_ms > 0 && retry_wait >= b.deadline_ms {
            errors.push(format!(
                "bus: deadline_ms ({}) must exceed max_retries × retry_delay_ms ({retry_wait})",
                b.deadline_ms
            ));
        }
    }

    fn validate_sampling(&self, errors: &mut Vec<String>) {
        if self.sampling.every_ms == 0 {
            errors.push("sampling: every_ms must be positive".to_string());
        }
        if self.sampling.max_consecutive_failures == 0 {
            errors.push("sampling: max_consecutive_failures must be positive".to_string());
        }
    }

    fn validate_reads(&self, errors: &mut Vec<String>) {
        if self.reads.is_empty() {
            errors.push("no reads configured".to_string());
        }

        let mut seen: HashSet<&str> = HashSet::new();

        for (i, r) in self.reads.iter().enumerate() {
            let ctx = || {
                if r.name.is_empty() {
                    format!("reads[{i}]")
                } else {
                    format!("read '{}'", r.name)
                }
            };

            if r.name.trim().is_empty() {
                errors.push(format!("{}: name is empty", ctx()));
            } else if !seen.insert(&r.name) {
                errors.push(format!("{}: duplicate name", ctx()));
            }

            if let Err(e) = r.request() {
                errors.push(format!("{}: {e}", ctx()));
            }
        }
    }

    /// Reads to run each sweep. Call after [`Config::validate`].
    pub fn jobs(&self) -> Result<Vec<Job>> {
        self.reads
            .iter()
            .map(|r| {
                let request = r
                    .request()
                    .map_err(anyhow::Error::msg)
                    .with_context(|| format!("read '{}'", r.name))?;
                Ok(Job {
                    name: r.name.clone(),
                    request,
                })
            })
            .collect()
    }

    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            every: Duration::from_millis(self.sampling.every_ms),
            deadline: Duration::from_millis(self.bus.deadline_ms),
            max_consecutive_failures: self.sampling.max_consecutive_failures,
        }
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Read, parse, and validate a TOML config file.
pub fn load(path: &str) -> Result<Config> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("failed to read config: {path}"))?;
    let config: Config =
        toml::from_str(&contents).with_context(|| format!("failed to parse config: {path}"))?;
    config
        .validate()
        .with_context(|| format!("invalid config: {path}"))?;
    Ok(config)
}

// ===========================================================================
// Tests
// ===========================================================================
