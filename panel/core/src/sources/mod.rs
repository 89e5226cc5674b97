//! Source Fetchers
//!
//! Each source turns one remote or local data source into an ordered list of
//! display lines. Sources report failures as [`PollError`]; the render loop
//! turns any failure into empty output via [`lines_or_empty`], so a single bad
//! poll never stops the display.
//!
//! # Available Sources
//!
//! - [`HubSource`]: thermostat temperatures from the home-automation hub
//! - [`FeedSource`]: unseen RSS items, one block of lines per item
//! - [`WeatherSource`]: current conditions and a short forecast
//! - [`StatsSource`]: uptime, memory, CPU, load and network counters

pub mod backoff;
mod feed;
pub mod http;
mod hub;
mod stats;
mod weather;

use std::time::Instant;

use async_trait::async_trait;

use crate::error::PollError;
use crate::paginate::DisplayLine;

pub use backoff::{BackoffConfig, PollBackoff};
pub use feed::{html_to_lines, strip_links, FeedSource};
pub use http::{HttpFetch, ReqwestFetcher, StaticFetcher};
pub use hub::{format_device_line, HubSource};
pub use stats::{CommandRunner, StatsSource, TokioCommandRunner};
pub use weather::{WeatherQuery, WeatherSource};

/// A source that produces display lines
#[async_trait]
pub trait LineSource: Send + Sync {
    /// Source name for logs (e.g. "hub", "weather")
    fn name(&self) -> &str;

    /// Poll the source once
    async fn fetch(&self) -> Result<Vec<DisplayLine>, PollError>;
}

/// Map a poll result to lines, logging and discarding any error
pub fn lines_or_empty(source: &str, result: Result<Vec<DisplayLine>, PollError>) -> Vec<DisplayLine> {
    match result {
        Ok(lines) => lines,
        Err(e) => {
            tracing::warn!(source, kind = e.kind(), error = %e, "Poll failed, showing nothing");
            Vec::new()
        }
    }
}

/// Poll `source` unless it is backing off after earlier failures
///
/// Failures and skipped polls both yield an empty list.
pub async fn poll_with_backoff(source: &dyn LineSource, backoff: &mut PollBackoff) -> Vec<DisplayLine> {
    let now = Instant::now();
    if !backoff.should_poll(now) {
        tracing::debug!(
            source = source.name(),
            failures = backoff.consecutive_failures(),
            "Source backing off, skipping poll"
        );
        return Vec::new();
    }

    let result = source.fetch().await;
    match &result {
        Ok(_) => backoff.record_success(),
        Err(_) => {
            let delay = backoff.record_failure(now);
            tracing::info!(
                source = source.name(),
                failures = backoff.consecutive_failures(),
                retry_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Source failed, backing off"
            );
        }
    }
    lines_or_empty(source.name(), result)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    struct Flaky {
        calls: AtomicU32,
    }

    #[async_trait]
    impl LineSource for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn fetch(&self) -> Result<Vec<DisplayLine>, PollError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(PollError::Network("down".into()))
        }
    }

    #[test]
    fn test_lines_or_empty_maps_every_error_kind() {
        let errors = vec![
            PollError::Network("n".into()),
            PollError::Parse("p".into()),
            PollError::Subprocess("s".into()),
            PollError::Storage(std::io::Error::new(std::io::ErrorKind::Other, "io")),
            PollError::Hardware("h".into()),
        ];
        for err in errors {
            assert!(lines_or_empty("test", Err(err)).is_empty());
        }

        let ok = lines_or_empty("test", Ok(vec!["a".to_string()]));
        assert_eq!(ok, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_source_is_skipped_while_backing_off() {
        let source = Flaky {
            calls: AtomicU32::new(0),
        };
        let mut backoff = PollBackoff::new(BackoffConfig {
            initial_backoff_ms: 60_000,
            use_jitter: false,
            ..BackoffConfig::default()
        });

        assert!(poll_with_backoff(&source, &mut backoff).await.is_empty());
        assert!(poll_with_backoff(&source, &mut backoff).await.is_empty());

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(backoff.consecutive_failures(), 1);
    }
}
