//! Mode Controller
//!
//! Three buttons select the top-level view; a PIR sensor reports motion.
//! Hardware callbacks only push [`HardwareEvent`]s into a channel, and
//! [`ModeController`] is the single consumer applying them to
//! [`SharedState`].
//!
//! # Transitions
//!
//! | Event                  | Effect                     |
//! |------------------------|----------------------------|
//! | `ButtonPressed(Sw0)`   | mode = `Clock`             |
//! | `ButtonPressed(Sw1)`   | mode = `NewsTicker`        |
//! | `ButtonPressed(Sw2)`   | mode = `StatsWeather`      |
//! | `MotionDetected{pin}`  | last motion = now + pin    |
//!
//! Transitions do not depend on the previous mode.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::state::SharedState;

/// Top-level view
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Big-digit clock
    #[default]
    Clock,
    /// One unseen feed item per pass
    NewsTicker,
    /// System statistics, thermostats and weather
    StatsWeather,
}

impl Mode {
    /// Mode selected by a button
    #[must_use]
    pub fn for_button(button: Button) -> Self {
        match button {
            Button::Sw0 => Self::Clock,
            Button::Sw1 => Self::NewsTicker,
            Button::Sw2 => Self::StatsWeather,
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Clock => write!(f, "clock"),
            Self::NewsTicker => write!(f, "news"),
            Self::StatsWeather => write!(f, "stats/weather"),
        }
    }
}

/// Mode selection button
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Button {
    /// Clock
    Sw0,
    /// News ticker
    Sw1,
    /// Statistics and weather
    Sw2,
}

/// Input from the hardware event source
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HardwareEvent {
    /// A mode button was pressed
    ButtonPressed(Button),
    /// The motion sensor on `pin` fired
    MotionDetected {
        /// GPIO pin number
        pin: u8,
    },
}

/// Sole consumer of the hardware event channel
pub struct ModeController {
    state: Arc<SharedState>,
}

impl ModeController {
    /// Create a controller writing to `state`
    pub fn new(state: Arc<SharedState>) -> Self {
        Self { state }
    }

    /// Apply events until every sender is dropped
    ///
    /// Returns the number of events applied.
    pub async fn run(self, mut events: mpsc::Receiver<HardwareEvent>) -> usize {
        let mut applied = 0;
        while let Some(event) = events.recv().await {
            self.state.apply(event);
            applied += 1;
        }
        tracing::info!(applied, "Hardware event channel closed");
        applied
    }
}
