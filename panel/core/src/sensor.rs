//! Sensor Sampler
//!
//! Background task keeping [`SharedState::sensor`] current. The DHT11 is read
//! through the Linux IIO sysfs interface of the `dht11` kernel driver, which
//! reports milli-degrees and milli-percent:
//!
//! ```text
//! /sys/bus/iio/devices/iio:device0/in_temp_input               21000
//! /sys/bus/iio/devices/iio:device0/in_humidityrelative_input   45000
//! ```
//!
//! The DHT11 regularly fails single reads (checksum or timing errors surface
//! as `EIO`), so every sample is retried a few times before giving up. A
//! failed sample keeps the previous one.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;

use crate::error::PollError;
use crate::state::{SensorSample, SharedState};

/// Default IIO device directory
pub const DEFAULT_DEVICE_DIR: &str = "/sys/bus/iio/devices/iio:device0";

const TEMPERATURE_FILE: &str = "in_temp_input";
const HUMIDITY_FILE: &str = "in_humidityrelative_input";

/// A temperature/humidity sensor
#[async_trait]
pub trait Sensor: Send + Sync {
    /// Read `(humidity %, temperature °C)`
    async fn read(&self) -> Result<(f32, f32), PollError>;
}

/// DHT11 behind the IIO sysfs interface
#[derive(Clone, Debug)]
pub struct IioSensor {
    dir: PathBuf,
}

impl IioSensor {
    /// Sensor reading from the IIO device directory `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Device directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn read_milli(&self, file: &str) -> Result<f32, PollError> {
        let path = self.dir.join(file);
        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| PollError::Hardware(format!("{}: {e}", path.display())))?;
        let milli: i64 = raw
            .trim()
            .parse()
            .map_err(|_| PollError::Hardware(format!("{}: bad value {raw:?}", path.display())))?;
        Ok(milli as f32 / 1000.0)
    }
}

#[async_trait]
impl Sensor for IioSensor {
    async fn read(&self) -> Result<(f32, f32), PollError> {
        let humidity = self.read_milli(HUMIDITY_FILE).await?;
        let temperature = self.read_milli(TEMPERATURE_FILE).await?;
        Ok((humidity, temperature))
    }
}

/// Sampling cadence
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SamplerConfig {
    /// Time between samples
    pub interval: Duration,
    /// Extra attempts after a failed read
    pub retries: u32,
    /// Pause between attempts
    pub retry_delay: Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            retries: 15,
            retry_delay: Duration::from_secs(2),
        }
    }
}

/// Take one sample, retrying failed reads
///
/// Stores the sample and returns `true` on success. After the last failed
/// attempt the previous sample is kept and `false` is returned.
pub async fn sample_once(sensor: &dyn Sensor, state: &SharedState, config: &SamplerConfig) -> bool {
    let mut attempt = 0;
    loop {
        match sensor.read().await {
            Ok((humidity, temperature)) => {
                state.set_sensor(SensorSample {
                    humidity,
                    temperature,
                    sampled_at: Some(Local::now()),
                });
                tracing::trace!(humidity, temperature, "Sensor sampled");
                return true;
            }
            Err(e) if attempt < config.retries => {
                attempt += 1;
                tracing::trace!(attempt, error = %e, "Sensor read failed, retrying");
                tokio::time::sleep(config.retry_delay).await;
            }
            Err(e) => {
                tracing::warn!(attempts = attempt + 1, error = %e, "Sensor read failed, keeping previous sample");
                return false;
            }
        }
    }
}

/// Sample forever at `config.interval`
pub async fn run_sampler(sensor: Arc<dyn Sensor>, state: Arc<SharedState>, config: SamplerConfig) {
    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        sample_once(sensor.as_ref(), &state, &config).await;
    }
}
