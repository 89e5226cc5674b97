//! Daemon Wiring
//!
//! Builds the sources, display and shared state from a [`PanelConfig`] and
//! runs the tasks:
//!
//! ```text
//!   stdin ──► input::read_events ──► mpsc ──► ModeController ──┐
//!   IIO   ──► run_sampler ─────────────────────────────────────┤
//!                                                              ▼
//!                                                         SharedState
//!                                                              │
//!   hub · feed · weather · stats ──────────► Renderer ◄────────┘
//! ```
//!
//! A missing sensor or a closed stdin degrade the panel but do not stop it.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use panel_core::{
    run_sampler, ConsoleDisplay, DedupStore, FeedSource, HttpFetch, HubSource, IioSensor,
    ModeController, PanelConfig, PanelSources, Renderer, ReqwestFetcher, SharedState,
    StatsSource, TokioCommandRunner, WeatherSource,
};

use crate::input;

/// Capacity of the hardware event channel
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// The assembled panel daemon
pub struct PanelDaemon {
    config: PanelConfig,
    state: Arc<SharedState>,
}

impl PanelDaemon {
    /// Create a daemon for `config`
    pub fn new(config: PanelConfig) -> Self {
        Self {
            config,
            state: Arc::new(SharedState::new()),
        }
    }

    /// Build the data sources on top of `http`
    pub async fn sources(&self, http: Arc<dyn HttpFetch>) -> PanelSources {
        let config = &self.config;
        ensure_parent_dir(&config.feed_db).await;
        let store = DedupStore::open(config.feed_db.clone(), config.dedup.clone()).await;
        info!(
            path = %config.feed_db.display(),
            known = store.len(),
            "Opened feed dedup log"
        );

        PanelSources {
            feed: FeedSource::new(
                config.feed_url.clone(),
                config.render.width,
                Arc::clone(&http),
                store,
            ),
            hub: Box::new(HubSource::new(config.hub_url.clone(), Arc::clone(&http))),
            weather: Box::new(WeatherSource::new(
                config.weather.clone(),
                config.forecast_entries,
                http,
            )),
            stats: Box::new(StatsSource::new(
                Arc::clone(&self.state),
                config.interfaces.clone(),
                config.vcgencmd.clone(),
                Arc::new(TokioCommandRunner::default()),
            )),
        }
    }

    /// Run with hardware events from stdin until `shutdown` completes
    ///
    /// The stdin reader parks a blocking-pool thread; the runtime has to be
    /// shut down with a timeout afterwards.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be created.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        self.run_with_events(BufReader::new(tokio::io::stdin()), shutdown)
            .await
    }

    /// Run with hardware events read line by line from `events`
    ///
    /// Returns once `shutdown` completes, whether or not `events` is still
    /// open, after blanking the display.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be created.
    pub async fn run_with_events<R, F>(self, events: R, shutdown: F) -> Result<()>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        F: Future<Output = ()> + Send,
    {
        let http: Arc<dyn HttpFetch> = Arc::new(
            ReqwestFetcher::new(self.config.http_timeout).context("Failed to create HTTP client")?,
        );
        let sources = self.sources(http).await;

        self.spawn_sampler().await;

        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        tokio::spawn(ModeController::new(Arc::clone(&self.state)).run(events_rx));
        tokio::spawn(input::read_events(events, events_tx));

        let render = &self.config.render;
        let display = ConsoleDisplay::new(render.width, render.height);
        let mut renderer = Renderer::new(
            render.clone(),
            Box::new(display),
            Arc::clone(&self.state),
            sources,
            self.config.backoff.clone(),
        );

        info!(
            width = render.width,
            height = render.height,
            refresh_secs = render.refresh.as_secs(),
            "Panel running"
        );
        renderer.run_until(shutdown).await;
        Ok(())
    }

    async fn spawn_sampler(&self) {
        let dir = &self.config.sensor_dir;
        match tokio::fs::try_exists(dir).await {
            Ok(true) => {
                info!(dir = %dir.display(), "Sampling sensor");
                tokio::spawn(run_sampler(
                    Arc::new(IioSensor::new(dir.clone())),
                    Arc::clone(&self.state),
                    self.config.sampler,
                ));
            }
            Ok(false) => warn!(dir = %dir.display(), "Sensor not found, showing 0°C/0%"),
            Err(e) => warn!(dir = %dir.display(), error = %e, "Sensor not accessible, showing 0°C/0%"),
        }
    }
}

/// Create the directory holding `path`; failures surface later as a fail-open store
async fn ensure_parent_dir(path: &Path) {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            warn!(dir = %parent.display(), error = %e, "Failed to create data directory");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use panel_core::{LineSource, StaticFetcher};

    use super::*;

    #[tokio::test]
    async fn test_sources_create_feed_db_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PanelConfig::default();
        config.feed_db = dir.path().join("nested").join("feeds.db");
        config.feed_url = "http://feed.test/rss".to_string();

        let daemon = PanelDaemon::new(config);
        let sources = daemon.sources(Arc::new(StaticFetcher::new())).await;

        assert!(dir.path().join("nested").is_dir());
        assert_eq!(sources.hub.name(), "hub");
        assert_eq!(sources.weather.name(), "weather");
        assert!(sources.feed.fetch_blocks().await.is_err());
    }

    #[tokio::test]
    async fn test_shutdown_returns_while_event_source_stays_open() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PanelConfig::default();
        config.feed_db = dir.path().join("feeds.db");
        config.sensor_dir = dir.path().join("absent");

        // The writer half stays alive, so the event reader never sees EOF
        let (_writer, reader) = tokio::io::duplex(64);
        let shutdown = tokio::time::sleep(Duration::from_millis(50));

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            PanelDaemon::new(config).run_with_events(BufReader::new(reader), shutdown),
        )
        .await;

        assert!(matches!(result, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn test_missing_sensor_does_not_spawn_sampler() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PanelConfig::default();
        config.sensor_dir = dir.path().join("absent");

        let daemon = PanelDaemon::new(config);
        daemon.spawn_sampler().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(daemon.state.sensor().sampled_at.is_none());
    }
}
