//! Render Loop
//!
//! Drives the display according to the current [`Mode`]:
//!
//! ```text
//! startup ──► banner ──► loop ┬─ Clock        big-digit clock, redrawn every clock_refresh
//!                             ├─ NewsTicker   one unseen feed item per pass
//!                             └─ StatsWeather stats ─► thermostats ─► room ─► weather
//! ```
//!
//! Every text page is held for `refresh`. A hold ends early when the mode
//! changes, so a button press takes effect on the next page at the latest.
//! Source failures show up as missing pages, display failures are logged,
//! and neither stops the loop.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local, Timelike};
use tokio::sync::watch;

use crate::display::glyphs::{render_big_time, Glyph, BIG_DIGIT_SEGMENTS, UMLAUT_GLYPHS};
use crate::display::Display;
use crate::error::PollError;
use crate::mode::Mode;
use crate::paginate::{fit_line, paginate, DisplayLine};
use crate::sources::{lines_or_empty, poll_with_backoff, BackoffConfig, FeedSource, LineSource, PollBackoff};
use crate::state::{SensorSample, SharedState};

/// Display geometry and timing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderConfig {
    /// Columns per row
    pub width: usize,
    /// Number of rows
    pub height: usize,
    /// How long each text page is shown
    pub refresh: Duration,
    /// Clock redraw interval
    pub clock_refresh: Duration,
    /// Greeting lines shown above the status line at startup
    pub banner: Vec<String>,
    /// How long the greeting is shown
    pub banner_hold: Duration,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 20,
            height: 4,
            refresh: Duration::from_secs(4),
            clock_refresh: Duration::from_millis(100),
            banner: vec![
                "Guten Morgen!".to_string(),
                String::new(),
                "            äöüÄÖÜß°".to_string(),
            ],
            banner_hold: Duration::from_secs(2),
        }
    }
}

/// The data sources shown by the render loop
pub struct PanelSources {
    /// RSS items for the news ticker
    pub feed: FeedSource,
    /// Thermostat temperatures
    pub hub: Box<dyn LineSource>,
    /// Weather conditions and forecast
    pub weather: Box<dyn LineSource>,
    /// Host statistics
    pub stats: Box<dyn LineSource>,
}

/// Per-mode display driver
pub struct Renderer {
    config: RenderConfig,
    display: Box<dyn Display>,
    state: Arc<SharedState>,
    mode_rx: watch::Receiver<Mode>,
    sources: PanelSources,
    hub_backoff: PollBackoff,
    weather_backoff: PollBackoff,
    feed_backoff: PollBackoff,
    news: VecDeque<Vec<DisplayLine>>,
    display_failures: u64,
}

impl Renderer {
    /// Create a renderer; sources back off independently with `backoff`
    pub fn new(
        config: RenderConfig,
        display: Box<dyn Display>,
        state: Arc<SharedState>,
        sources: PanelSources,
        backoff: BackoffConfig,
    ) -> Self {
        let mode_rx = state.subscribe_mode();
        Self {
            config,
            display,
            state,
            mode_rx,
            sources,
            hub_backoff: PollBackoff::new(backoff.clone()),
            weather_backoff: PollBackoff::new(backoff.clone()),
            feed_backoff: PollBackoff::new(backoff),
            news: VecDeque::new(),
            display_failures: 0,
        }
    }

    /// Show the banner, then render until `shutdown` completes
    ///
    /// The display is blanked before returning.
    pub async fn run_until<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        tokio::select! {
            () = self.run() => {}
            () = shutdown => tracing::info!("Render loop stopping"),
        }
        self.clear().await;
    }

    /// Show the banner, then render forever
    pub async fn run(&mut self) {
        self.banner().await;
        loop {
            self.step().await;
        }
    }

    /// Blank the display
    pub async fn clear(&mut self) {
        let result = match self.display.clear().await {
            Ok(()) => self.display.flush().await,
            Err(e) => Err(e),
        };
        self.report(result);
    }

    /// One pass of the current mode
    ///
    /// Returns once the pass is complete or the mode has changed.
    pub async fn step(&mut self) {
        let mode = self.state.mode();
        tracing::debug!(%mode, "Render pass");
        match mode {
            Mode::Clock => self.clock().await,
            Mode::NewsTicker => self.news_pass().await,
            Mode::StatsWeather => self.stats_weather_pass().await,
        }
    }

    /// Greeting lines plus a status line on the last row
    pub async fn banner(&mut self) {
        self.load_glyphs(&UMLAUT_GLYPHS).await;
        let rows = self.display.height().saturating_sub(1);
        let mut page: Vec<DisplayLine> = self.config.banner.iter().take(rows).cloned().collect();
        page.resize(rows, String::new());
        page.push(self.state.sensor().status_line(Local::now()));

        self.show_page(&page).await;
        tokio::time::sleep(self.config.banner_hold).await;
    }

    async fn clock(&mut self) {
        self.load_glyphs(&BIG_DIGIT_SEGMENTS).await;
        let result = self.display.clear().await;
        self.report(result);
        loop {
            let result = self.draw_clock(Local::now()).await;
            self.report(result);
            if !self.hold(Mode::Clock, self.config.clock_refresh).await {
                break;
            }
        }
    }

    async fn draw_clock(&mut self, now: DateTime<Local>) -> Result<(), PollError> {
        let [upper, lower] = render_big_time(now.hour(), now.minute(), now.second());
        let date = format!("      {}", now.format("%a %d.%m.%Y"));
        let reading = self.state.sensor().reading();

        self.display.write_line(&date, 1).await?;
        self.display.write_raw(&upper, 2).await?;
        self.display.write_raw(&lower, 3).await?;
        self.display.write_line(&reading, 4).await?;
        self.display.flush().await
    }

    async fn news_pass(&mut self) {
        self.load_glyphs(&UMLAUT_GLYPHS).await;
        if self.news.is_empty() {
            self.refill_news().await;
        }
        let block = self
            .news
            .pop_front()
            .unwrap_or_else(|| no_news_page(&self.state.sensor(), Local::now()));
        self.show_lines(&block, Mode::NewsTicker).await;
    }

    async fn refill_news(&mut self) {
        let now = Instant::now();
        if !self.feed_backoff.should_poll(now) {
            tracing::debug!(
                failures = self.feed_backoff.consecutive_failures(),
                "Feed backing off, skipping poll"
            );
            return;
        }
        match self.sources.feed.fetch_blocks().await {
            Ok(blocks) => {
                self.feed_backoff.record_success();
                self.news.extend(blocks);
            }
            Err(e) => {
                let delay = self.feed_backoff.record_failure(now);
                tracing::warn!(
                    kind = e.kind(),
                    error = %e,
                    retry_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "Feed poll failed"
                );
            }
        }
    }

    async fn stats_weather_pass(&mut self) {
        let mode = Mode::StatsWeather;
        self.load_glyphs(&UMLAUT_GLYPHS).await;

        let stats = lines_or_empty(self.sources.stats.name(), self.sources.stats.fetch().await);
        if !self.show_lines(&stats, mode).await {
            return;
        }

        let hub = poll_with_backoff(self.sources.hub.as_ref(), &mut self.hub_backoff).await;
        if !self.show_lines(&hub, mode).await {
            return;
        }
        let room = room_summary(&self.state.sensor(), Local::now());
        if !self.show_lines(&room, mode).await {
            return;
        }

        let weather = poll_with_backoff(self.sources.weather.as_ref(), &mut self.weather_backoff).await;
        self.show_lines(&weather, mode).await;
    }

    /// Show `lines` page by page while `mode` stays active
    ///
    /// Returns `false` if the mode changed before all pages were shown.
    async fn show_lines(&mut self, lines: &[DisplayLine], mode: Mode) -> bool {
        for page in paginate(lines, self.display.height()) {
            if self.state.mode() != mode {
                return false;
            }
            self.show_page(&page).await;
            if !self.hold(mode, self.config.refresh).await {
                return false;
            }
        }
        true
    }

    async fn show_page(&mut self, page: &[DisplayLine]) {
        let result = self.write_page(page).await;
        self.report(result);
    }

    async fn write_page(&mut self, page: &[DisplayLine]) -> Result<(), PollError> {
        let width = self.display.width();
        self.display.clear().await?;
        for (i, line) in page.iter().enumerate() {
            self.display.write_line(&fit_line(line, width), i + 1).await?;
        }
        self.display.flush().await
    }

    async fn load_glyphs(&mut self, glyphs: &[Glyph]) {
        let mut result = Ok(());
        for (slot, glyph) in (0u8..).zip(glyphs) {
            result = self.display.define_glyph(slot, *glyph).await;
            if result.is_err() {
                break;
            }
        }
        self.report(result);
    }

    /// Wait `duration` unless the mode leaves `mode` first
    ///
    /// Returns whether `mode` is still active.
    async fn hold(&mut self, mode: Mode, duration: Duration) -> bool {
        tokio::select! {
            () = tokio::time::sleep(duration) => self.state.mode() == mode,
            () = wait_for_switch(&mut self.mode_rx, mode) => false,
        }
    }

    fn report(&mut self, result: Result<(), PollError>) {
        match result {
            Ok(()) => {
                if self.display_failures > 0 {
                    tracing::info!(failures = self.display_failures, "Display recovered");
                }
                self.display_failures = 0;
            }
            Err(e) => {
                self.display_failures += 1;
                if self.display_failures == 1 {
                    tracing::warn!(error = %e, "Display write failed");
                } else {
                    tracing::debug!(error = %e, failures = self.display_failures, "Display still failing");
                }
            }
        }
    }
}

async fn wait_for_switch(rx: &mut watch::Receiver<Mode>, mode: Mode) {
    loop {
        if *rx.borrow_and_update() != mode {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender gone: the mode can no longer change
            std::future::pending::<()>().await;
        }
    }
}

/// Indoor summary shown after the thermostats
#[must_use]
pub fn room_summary(sample: &SensorSample, now: DateTime<Local>) -> Vec<DisplayLine> {
    vec![
        sample.status_line(now),
        "Aktueller Raum".to_string(),
        format!("Temperatur:   {:.1}°C", sample.temperature),
        format!("Feuchtigkeit: {:.1}%", sample.humidity),
    ]
}

/// Page shown when the feed has nothing new
#[must_use]
pub fn no_news_page(sample: &SensorSample, now: DateTime<Local>) -> Vec<DisplayLine> {
    vec![
        sample.status_line(now),
        "Keine neuen".to_string(),
        "Nachrichten".to_string(),
    ]
}
