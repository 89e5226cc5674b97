//! Shared Runtime State
//!
//! The state every task reads and the event consumer writes: the active
//! [`Mode`], the latest [`SensorSample`] and the last motion line. It is held
//! in an `Arc` and injected into each task.
//!
//! The mode lives in a `watch` channel so the render loop can wait on a mode
//! switch instead of polling for it. The sensor sample and motion line are
//! plain last-write-wins values behind `parking_lot` locks.

use chrono::{DateTime, Local};
use parking_lot::RwLock;
use tokio::sync::watch;

use crate::mode::{HardwareEvent, Mode};

/// Motion line shown before the first motion event
pub const NO_MOTION: &str = "N/A";

/// Latest temperature/humidity reading
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SensorSample {
    /// Relative humidity in percent
    pub humidity: f32,
    /// Temperature in degrees Celsius
    pub temperature: f32,
    /// When the sample was taken; `None` before the first successful read
    pub sampled_at: Option<DateTime<Local>>,
}

impl SensorSample {
    /// `21°C/45%`
    #[must_use]
    pub fn reading(&self) -> String {
        format!("{:.0}°C/{:.0}%", self.temperature, self.humidity)
    }

    /// `14.03 07:15 21°C/45%`
    #[must_use]
    pub fn status_line(&self, now: DateTime<Local>) -> String {
        format!("{} {}", now.format("%d.%m %H:%M"), self.reading())
    }
}

/// State shared between the event consumer, the sampler and the render loop
#[derive(Debug)]
pub struct SharedState {
    mode: watch::Sender<Mode>,
    sensor: RwLock<SensorSample>,
    last_motion: RwLock<String>,
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedState {
    /// Start in [`Mode::Clock`] with no sample and no motion
    #[must_use]
    pub fn new() -> Self {
        let (mode, _) = watch::channel(Mode::default());
        Self {
            mode,
            sensor: RwLock::new(SensorSample::default()),
            last_motion: RwLock::new(NO_MOTION.to_string()),
        }
    }

    /// Current mode
    #[must_use]
    pub fn mode(&self) -> Mode {
        *self.mode.borrow()
    }

    /// Switch mode; returns whether it changed
    ///
    /// Subscribers are only notified on an actual change.
    pub fn set_mode(&self, mode: Mode) -> bool {
        self.mode.send_if_modified(|current| {
            if *current == mode {
                false
            } else {
                *current = mode;
                true
            }
        })
    }

    /// Receiver notified on every mode change
    #[must_use]
    pub fn subscribe_mode(&self) -> watch::Receiver<Mode> {
        self.mode.subscribe()
    }

    /// Latest sensor sample
    #[must_use]
    pub fn sensor(&self) -> SensorSample {
        *self.sensor.read()
    }

    /// Replace the sensor sample
    pub fn set_sensor(&self, sample: SensorSample) {
        *self.sensor.write() = sample;
    }

    /// Last motion line, or [`NO_MOTION`]
    #[must_use]
    pub fn last_motion(&self) -> String {
        self.last_motion.read().clone()
    }

    /// Replace the last motion line
    pub fn set_last_motion(&self, line: impl Into<String>) {
        *self.last_motion.write() = line.into();
    }

    /// Apply a hardware event at the current local time
    pub fn apply(&self, event: HardwareEvent) {
        self.apply_at(event, Local::now());
    }

    /// Apply a hardware event observed at `now`
    pub fn apply_at(&self, event: HardwareEvent, now: DateTime<Local>) {
        match event {
            HardwareEvent::ButtonPressed(button) => {
                let mode = Mode::for_button(button);
                if self.set_mode(mode) {
                    tracing::info!(?button, ?mode, "Mode switched");
                }
            }
            HardwareEvent::MotionDetected { pin } => {
                let line = format!("{} GPIO{pin}", now.format("%d.%m %H:%M"));
                tracing::debug!(pin, "Motion detected");
                self.set_last_motion(line);
            }
        }
    }
}
