mod config;
mod sampler;
#[cfg(all(feature = "sim", not(feature = "rpi")))]
mod sim;

#[cfg(not(any(feature = "sim", feature = "rpi")))]
compile_error!("enable the `sim` or `rpi` feature to choose an I2C bus");

use anyhow::{Context, Result};
use max1238::Max1238;
use std::env;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::BusSection;

#[cfg(feature = "rpi")]
type Bus = rppal::i2c::I2c;

#[cfg(all(feature = "sim", not(feature = "rpi")))]
type Bus = sim::SimBus;

#[cfg(feature = "rpi")]
fn open_bus(section: &BusSection) -> Result<Bus> {
    rppal::i2c::I2c::with_bus(section.number)
        .with_context(|| format!("failed to open /dev/i2c-{}", section.number))
}

#[cfg(all(feature = "sim", not(feature = "rpi")))]
fn open_bus(section: &BusSection) -> Result<Bus> {
    let address = section.address()?.get();
    let fault_rate: f32 = env::var("SIM_FAULT_RATE")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.0);

    info!(
        addr = format_args!("0x{address:02x}"),
        fault_rate, "using simulated i2c bus"
    );
    Ok(sim::SimBus::new(address).with_fault_rate(fault_rate))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the readings.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // ── Config ──────────────────────────────────────────────────────
    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "monitor.toml".to_string());
    let cfg = config::load(&config_path)?;
    let jobs = cfg.jobs()?;

    info!(
        path = %config_path,
        bus = cfg.bus.number,
        reads = jobs.len(),
        "config loaded"
    );

    // ── ADC ─────────────────────────────────────────────────────────
    let bus = open_bus(&cfg.bus)?;
    let mut adc =
        Max1238::with_address(bus, cfg.bus.address()?).with_retry(cfg.bus.retry_policy());
    adc.setup(cfg.setup).context("failed to write max1238 setup")?;

    let retry = adc.retry_policy();
    info!(
        addr = format_args!("0x{:02x}", adc.address().get()),
        max_retries = retry.max_retries,
        retry_delay_ms = retry.delay.as_millis() as u64,
        "max1238 ready"
    );

    // ── Sampling ────────────────────────────────────────────────────
    sampler::run(
        sampler::shared(adc),
        jobs,
        cfg.run_settings(),
        std::io::stdout(),
    )
    .await
}
