//! RSS Feed Source
//!
//! Fetches a syndication feed and turns every item that has not been shown
//! recently into a block of display lines:
//!
//! ```text
//! 14.03 07:15 [1]        <- fetch time and sequence number
//! Wrapped title lines
//! Wrapped body lines     <- links removed, HTML flattened, bullets dropped
//! ```
//!
//! Items whose fingerprint is still fresh in the [`DedupStore`] are skipped;
//! every displayed item is recorded. A failing dedup write is logged and does
//! not drop the item.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use chrono::{Local, Utc};
use html2text::render::text_renderer::TrivialDecorator;
use regex::Regex;
use tokio::sync::Mutex;

use super::http::HttpFetch;
use super::LineSource;
use crate::dedup::{fingerprint, DedupStore};
use crate::error::PollError;
use crate::paginate::DisplayLine;

/// Width handed to the HTML converter; wrapping happens afterwards
const HTML_RENDER_WIDTH: usize = 1000;

/// Unseen RSS items as blocks of display lines
pub struct FeedSource {
    url: String,
    width: usize,
    http: Arc<dyn HttpFetch>,
    store: Mutex<DedupStore>,
}

impl FeedSource {
    /// Create a feed source wrapping lines at `width` columns
    pub fn new(url: impl Into<String>, width: usize, http: Arc<dyn HttpFetch>, store: DedupStore) -> Self {
        Self {
            url: url.into(),
            width: width.max(1),
            http,
            store: Mutex::new(store),
        }
    }

    /// The dedup store consulted by this source
    pub fn store(&self) -> &Mutex<DedupStore> {
        &self.store
    }

    /// Fetch the feed and return one block per unseen item
    ///
    /// # Errors
    ///
    /// Returns [`PollError::Network`] if the feed cannot be fetched and
    /// [`PollError::Parse`] if it is not valid RSS.
    pub async fn fetch_blocks(&self) -> Result<Vec<Vec<DisplayLine>>, PollError> {
        let body = self.http.get(&self.url).await?;
        let channel = rss::Channel::read_from(&body[..])
            .map_err(|e| PollError::Parse(format!("rss: {e}")))?;

        let now = Utc::now();
        let stamp = Local::now().format("%d.%m %H:%M").to_string();
        let mut store = self.store.lock().await;
        let mut blocks = Vec::new();
        let mut skipped = 0usize;

        for item in channel.items() {
            let Some(title) = item.title() else {
                tracing::debug!("Feed item without title");
                continue;
            };
            let fp = fingerprint(title);
            if fp.is_empty() || store.is_fresh_at(&fp, now) {
                skipped += 1;
                continue;
            }

            let block = self.format_block(
                &stamp,
                blocks.len() + 1,
                title,
                item.description().unwrap_or_default(),
            );

            if let Err(e) = store.record(&fp, now).await {
                tracing::warn!(error = %e, title = %fp, "Failed to record feed item");
            }
            blocks.push(block);
        }

        tracing::info!(new = blocks.len(), skipped, "Fetched feed");
        Ok(blocks)
    }

    fn format_block(&self, stamp: &str, seq: usize, title: &str, description: &str) -> Vec<DisplayLine> {
        let mut block = vec![format!("{stamp} [{seq}]")];
        block.extend(html_to_lines(title, self.width));
        block.extend(html_to_lines(&strip_links(description), self.width));
        block
    }
}

#[async_trait]
impl LineSource for FeedSource {
    fn name(&self) -> &str {
        "feed"
    }

    async fn fetch(&self) -> Result<Vec<DisplayLine>, PollError> {
        Ok(self.fetch_blocks().await?.concat())
    }
}

fn link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?is)\[*<a\b[^>]*>.*?</a>\]*").expect("link pattern is valid")
    })
}

/// Images and list items, neither of which is shown on the display
fn dropped_markup_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?is)<img\b[^>]*>|<li\b[^>]*>.*?</li>").expect("markup pattern is valid")
    })
}

/// Remove `<a ...>...</a>` elements, including surrounding brackets
#[must_use]
pub fn strip_links(html: &str) -> String {
    link_pattern().replace_all(html, "").into_owned()
}

fn is_bullet(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed == "*" || trimmed.starts_with("* ")
}

/// Convert HTML to plain lines wrapped at `width`
///
/// Rendering is undecorated: emphasis, link targets and footnotes produce no
/// markers. Images, list items, blank lines and `*` bullet lines are dropped.
#[must_use]
pub fn html_to_lines(html: &str, width: usize) -> Vec<DisplayLine> {
    let html = dropped_markup_pattern().replace_all(html, "");
    let text = html2text::from_read_with_decorator(
        html.as_bytes(),
        HTML_RENDER_WIDTH,
        TrivialDecorator::new(),
    );
    let width = width.max(1);

    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !is_bullet(line))
        .flat_map(|line| {
            textwrap::wrap(line, width)
                .into_iter()
                .map(|cow| cow.into_owned())
                .collect::<Vec<_>>()
        })
        .collect()
}
