//! Panel Core - Polling and Paging Engine for a Character-LCD Status Display
//!
//! This crate holds everything the `homepanel` daemon does apart from process
//! setup: polling failure-prone data sources, suppressing feed items that were
//! shown recently, cutting text into display pages, and switching views on
//! hardware events. It has no dependency on a particular LCD driver or GPIO
//! library; those plug in through [`Display`] and [`HardwareEvent`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   HardwareEvent    ┌────────────────┐
//! │ buttons, PIR │ ─────────────────► │ ModeController │
//! └──────────────┘      (mpsc)        └───────┬────────┘
//!                                             │ writes
//! ┌──────────────┐                    ┌───────▼────────┐
//! │ DHT11 (IIO)  │ ── run_sampler ──► │  SharedState   │  mode (watch),
//! └──────────────┘                    └───────┬────────┘  sensor, motion
//!                                             │ reads
//! ┌──────────────────────────────┐    ┌───────▼────────┐    ┌─────────┐
//! │ hub · feed · weather · stats │ ─► │    Renderer    │ ─► │ Display │
//! └──────────────┬───────────────┘    └────────────────┘    └─────────┘
//!                │ feed only              paginate()
//!         ┌──────▼─────┐
//!         │ DedupStore │  append-only fingerprint|millis log
//!         └────────────┘
//! ```
//!
//! # Module Overview
//!
//! - [`config`]: TOML/env/CLI configuration
//! - [`dedup`]: Seen-item store for the news feed
//! - [`display`]: Display trait, console and in-memory displays, glyph tables
//! - [`error`]: Poll error taxonomy
//! - [`mode`]: Modes, buttons, hardware events and the event consumer
//! - [`paginate`]: Lines to fixed-height pages
//! - [`render`]: The per-mode render loop
//! - [`sensor`]: Temperature/humidity sampling
//! - [`sources`]: Hub, feed, weather and statistics fetchers
//! - [`state`]: State shared between the tasks

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod dedup;
pub mod display;
pub mod error;
pub mod mode;
pub mod paginate;
pub mod render;
pub mod sensor;
pub mod sources;
pub mod state;

// Re-exports for convenience
pub use dedup::{fingerprint, DedupConfig, DedupStore, RefreshPolicy};
pub use display::{ConsoleDisplay, Display, MemoryDisplay};
pub use error::PollError;
pub use mode::{Button, HardwareEvent, Mode, ModeController};
pub use paginate::{fit_line, paginate, DisplayLine, Page};
pub use render::{PanelSources, RenderConfig, Renderer};
pub use sensor::{run_sampler, IioSensor, SamplerConfig, Sensor};
pub use state::{SensorSample, SharedState};

// Source exports
pub use sources::{
    lines_or_empty, poll_with_backoff, BackoffConfig, CommandRunner, FeedSource, HttpFetch,
    HubSource, LineSource, PollBackoff, ReqwestFetcher, StaticFetcher, StatsSource,
    TokioCommandRunner, WeatherQuery, WeatherSource,
};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigOverrides,
    ConfigSource, PanelConfig, PanelToml,
};
