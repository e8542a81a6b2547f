//! Periodic sampling of the configured reads.
//!
//! The driver blocks, so every read runs on tokio's blocking pool behind a
//! mutex that serialises all bus access. Each read gets an overall deadline;
//! the driver itself only bounds the pause between retries.

use std::fmt::Debug;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use embedded_hal::i2c::I2c;
use max1238::{ChannelReading, Max1238, ReadRequest};
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

pub type SharedAdc<I2C> = Arc<Mutex<Max1238<I2C>>>;

pub fn shared<I2C>(adc: Max1238<I2C>) -> SharedAdc<I2C> {
    Arc::new(Mutex::new(adc))
}

/// A named read, repeated every sweep.
#[derive(Debug, Clone)]
pub struct Job {
    pub name: String,
    pub request: ReadRequest,
}

#[derive(Debug, Clone, Copy)]
pub struct RunSettings {
    pub every: Duration,
    pub deadline: Duration,
    pub max_consecutive_failures: u32,
}

// ---------------------------------------------------------------------------
// Output messages
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct Reading {
    pub name: String,
    pub channel: u8,
    pub raw: u16,
}

#[derive(Debug, Serialize)]
pub struct ReadingMsg {
    pub ts: i64,
    pub readings: Vec<Reading>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SampleError<E: Debug> {
    #[error(transparent)]
    Adc(#[from] max1238::Error<E>),

    #[error("sample did not finish within {0:?}")]
    Deadline(Duration),

    #[error("sampler task failed: {0}")]
    Task(String),
}

impl<E: Debug> SampleError<E> {
    /// Range and protocol errors will not go away by asking again.
    pub fn should_stop(&self) -> bool {
        match self {
            Self::Adc(e) => !e.is_retryable(),
            Self::Deadline(_) => false,
            Self::Task(_) => true,
        }
    }
}

// ---------------------------------------------------------------------------
// Sampling
// ---------------------------------------------------------------------------

/// Run one read on the blocking pool, bounded by `deadline`.
///
/// A read that overruns is not cancelled; it finishes in the background
/// while holding the lock, so the next read waits for it.
pub async fn sample<I2C>(
    adc: &SharedAdc<I2C>,
    request: ReadRequest,
    deadline: Duration,
) -> Result<ChannelReading, SampleError<I2C::Error>>
where
    I2C: I2c + Send + 'static,
    I2C::Error: Send + 'static,
{
    let adc = Arc::clone(adc);
    let task = tokio::task::spawn_blocking(move || {
        let mut guard = adc
            .lock()
            .map_err(|_| SampleError::<I2C::Error>::Task("adc lock poisoned".to_string()))?;
        guard.read(&request).map_err(SampleError::from)
    });

    match tokio::time::timeout(deadline, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join)) => Err(SampleError::Task(join.to_string())),
        Err(_) => Err(SampleError::Deadline(deadline)),
    }
}

/// Run every job once. Any failure fails the whole sweep; partial sweeps are
/// never reported.
pub async fn sweep<I2C>(
    adc: &SharedAdc<I2C>,
    jobs: &[Job],
    deadline: Duration,
) -> Result<ReadingMsg, SampleError<I2C::Error>>
where
    I2C: I2c + Send + 'static,
    I2C::Error: Send + 'static,
{
    let mut readings = Vec::new();

    for job in jobs {
        let reading = sample(adc, job.request, deadline).await?;
        readings.extend(
            reading
                .samples()
                .into_iter()
                .map(|(channel, raw)| Reading {
                    name: job.name.clone(),
                    channel,
                    raw,
                }),
        );
    }

    Ok(ReadingMsg {
        ts: time::OffsetDateTime::now_utc().unix_timestamp(),
        readings,
    })
}

/// Sweep forever, writing one JSON line per successful sweep to `out`.
///
/// Returns an error on the first non-transient failure, or once
/// `max_consecutive_failures` sweeps in a row have failed.
pub async fn run<I2C, W>(
    adc: SharedAdc<I2C>,
    jobs: Vec<Job>,
    settings: RunSettings,
    mut out: W,
) -> Result<()>
where
    I2C: I2c + Send + 'static,
    I2C::Error: Send + 'static,
    W: Write,
{
    let mut ticker = tokio::time::interval(settings.every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        jobs = jobs.len(),
        every_ms = settings.every.as_millis() as u64,
        deadline_ms = settings.deadline.as_millis() as u64,
        "sampler started"
    );

    let mut consecutive_failures: u32 = 0;

    loop {
        ticker.tick().await;

        match sweep(&adc, &jobs, settings.deadline).await {
            Ok(msg) => {
                if consecutive_failures > 0 {
                    info!(after = consecutive_failures, "sampling recovered");
                }
                consecutive_failures = 0;

                let line = serde_json::to_string(&msg).context("failed to encode readings")?;
                writeln!(out, "{line}").context("failed to write readings")?;
            }
            Err(e) if e.should_stop() => {
                error!("sampling stopped: {e}");
                bail!("sampling stopped: {e}");
            }
            Err(e) => {
                consecutive_failures += 1;
                warn!(
                    consecutive_failures,
                    limit = settings.max_consecutive_failures,
                    "sweep failed: {e}"
                );
                if consecutive_failures >= settings.max_consecutive_failures {
                    bail!("{consecutive_failures} consecutive sweeps failed, last: {e}");
                }
            }
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::{ErrorKind, ErrorType, NoAcknowledgeSource, Operation};
    use max1238::{encode_sample, InputMode, ProtocolError, RangeError};

    // -- Test bus -------------------------------------------------------------

    #[derive(Debug, Clone, Copy)]
    struct TestError(ErrorKind);

    impl embedded_hal::i2c::Error for TestError {
        fn kind(&self) -> ErrorKind {
            self.0
        }
    }

    /// Answers every read with `value` in each word, or always NACKs, or
    /// stalls before answering.
    struct TestBus {
        value: u16,
        nack: bool,
        stall: Duration,
    }

    impl TestBus {
        fn answering(value: u16) -> Self {
            Self {
                value,
                nack: false,
                stall: Duration::ZERO,
            }
        }

        fn dead() -> Self {
            Self {
                value: 0,
                nack: true,
                stall: Duration::ZERO,
            }
        }
    }

    impl ErrorType for TestBus {
        type Error = TestError;
    }

    impl I2c for TestBus {
        fn transaction(
            &mut self,
            _address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            std::thread::sleep(self.stall);
            if self.nack {
                return Err(TestError(ErrorKind::NoAcknowledge(
                    NoAcknowledgeSource::Address,
                )));
            }
            for op in operations {
                if let Operation::Read(buf) = op {
                    for pair in buf.chunks_mut(2) {
                        pair.copy_from_slice(&encode_sample(self.value)[..pair.len()]);
                    }
                }
            }
            Ok(())
        }
    }

    fn adc(bus: TestBus) -> SharedAdc<TestBus> {
        shared(Max1238::new(bus).with_retry(max1238::RetryPolicy {
            max_retries: 1,
            delay: Duration::from_millis(1),
        }))
    }

    fn job(name: &str, request: ReadRequest) -> Job {
        Job {
            name: name.into(),
            request,
        }
    }

    fn settings(max_consecutive_failures: u32) -> RunSettings {
        RunSettings {
            every: Duration::from_millis(1),
            deadline: Duration::from_secs(1),
            max_consecutive_failures,
        }
    }

    // -- SampleError ----------------------------------------------------------

    #[test]
    fn only_hard_errors_stop_sampling() {
        let bus: SampleError<TestError> = SampleError::Adc(max1238::Error::Bus {
            attempts: 2,
            kind: ErrorKind::Bus,
            fault: TestError(ErrorKind::Bus),
        });
        let protocol: SampleError<TestError> = SampleError::Adc(
            ProtocolError {
                expected: 2,
                actual: 0,
            }
            .into(),
        );
        let range: SampleError<TestError> = SampleError::Adc(RangeError::Channel(12).into());

        assert!(!bus.should_stop());
        assert!(!SampleError::<TestError>::Deadline(Duration::from_millis(5)).should_stop());
        assert!(protocol.should_stop());
        assert!(range.should_stop());
        assert!(SampleError::<TestError>::Task("panic".into()).should_stop());
    }

    // -- sample / sweep -------------------------------------------------------

    #[tokio::test]
    async fn sample_returns_reading() {
        let adc = adc(TestBus::answering(0x123));
        let reading = sample(
            &adc,
            ReadRequest::single(2, InputMode::SingleEnded),
            Duration::from_secs(1),
        )
        .await
        .unwrap();
        assert_eq!(
            reading,
            ChannelReading::Single {
                channel: 2,
                value: 0x123
            }
        );
    }

    #[tokio::test]
    async fn slow_bus_hits_the_deadline() {
        let adc = adc(TestBus {
            stall: Duration::from_millis(200),
            ..TestBus::answering(1)
        });
        let err = sample(
            &adc,
            ReadRequest::single(0, InputMode::SingleEnded),
            Duration::from_millis(20),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SampleError::Deadline(_)), "got {err}");
    }

    #[tokio::test]
    async fn dead_bus_is_a_bus_fault() {
        let adc = adc(TestBus::dead());
        let err = sample(
            &adc,
            ReadRequest::single(0, InputMode::SingleEnded),
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            SampleError::Adc(max1238::Error::Bus { attempts: 2, .. })
        ));
    }

    #[tokio::test]
    async fn sweep_flattens_every_job() {
        let adc = adc(TestBus::answering(7));
        let jobs = vec![
            job("hot", ReadRequest::single(0, InputMode::SingleEnded)),
            job("bank_b", ReadRequest::range(6, 8, InputMode::SingleEnded)),
            job("pair", ReadRequest::multiple(2, 2, InputMode::SingleEnded)),
        ];

        let msg = sweep(&adc, &jobs, Duration::from_secs(1)).await.unwrap();
        let got: Vec<(&str, u8)> = msg
            .readings
            .iter()
            .map(|r| (r.name.as_str(), r.channel))
            .collect();
        assert_eq!(
            got,
            vec![
                ("hot", 0),
                ("bank_b", 6),
                ("bank_b", 7),
                ("bank_b", 8),
                ("pair", 2),
                ("pair", 3),
            ]
        );
        assert!(msg.readings.iter().all(|r| r.raw == 7));
        assert!(msg.ts > 1_704_067_200, "timestamp too old: {}", msg.ts);
    }

    #[test]
    fn reading_msg_serializes_to_valid_json() {
        let msg = ReadingMsg {
            ts: 1_700_000_000,
            readings: vec![Reading {
                name: "hot".into(),
                channel: 0,
                raw: 2048,
            }],
        };
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["ts"], 1_700_000_000);
        assert_eq!(json["readings"][0]["name"], "hot");
        assert_eq!(json["readings"][0]["channel"], 0);
        assert_eq!(json["readings"][0]["raw"], 2048);
        assert_eq!(json["readings"][0].as_object().unwrap().len(), 3);
    }

    // -- run ------------------------------------------------------------------

    #[tokio::test]
    async fn run_gives_up_after_consecutive_failures() {
        let adc = adc(TestBus::dead());
        let jobs = vec![job("hot", ReadRequest::single(0, InputMode::SingleEnded))];
        let mut out = Vec::new();

        let err = run(adc, jobs, settings(3), &mut out).await.unwrap_err();

        assert!(err.to_string().contains("3 consecutive sweeps failed"), "{err}");
        assert!(out.is_empty(), "no readings should be emitted");
    }

    #[tokio::test]
    async fn run_stops_immediately_on_invalid_request() {
        let adc = adc(TestBus::answering(1));
        let jobs = vec![job("bad", ReadRequest::single(12, InputMode::SingleEnded))];

        let err = run(adc, jobs, settings(100), Vec::new()).await.unwrap_err();
        assert!(err.to_string().contains("channel 12"), "{err}");
    }
}
