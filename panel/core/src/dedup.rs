//! Dedup Store
//!
//! Remembers which feed items have already been shown. Each item is keyed by a
//! fingerprint derived from its title and mapped to the time it was last seen.
//!
//! # Log Format
//!
//! The store is backed by an append-only, line-oriented log:
//!
//! ```text
//! <fingerprint>|<epoch-millis>
//! ```
//!
//! The same fingerprint may appear several times; the last occurrence wins.
//! The whole log is read once at open and all lookups are served from memory.
//! When duplicates pile up the log is compacted to one line per fingerprint.
//!
//! # Refresh Policy
//!
//! [`RefreshPolicy::WriteOnce`] keeps the first timestamp forever: once an item
//! is older than the staleness limit it stays stale and is eligible for display
//! on every later fetch. [`RefreshPolicy::RefreshOnSight`] appends a new
//! timestamp on every sighting, so a re-shown item is suppressed again for a
//! full staleness period.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;

use crate::error::PollError;

/// How `record` treats a fingerprint that is already known
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RefreshPolicy {
    /// Never touch an existing record
    #[default]
    WriteOnce,
    /// Append a fresh timestamp every time the item is recorded
    RefreshOnSight,
}

/// Dedup store configuration
#[derive(Clone, Debug)]
pub struct DedupConfig {
    /// How long a recorded item stays fresh
    pub staleness_limit: Duration,
    /// Behaviour for already-known fingerprints
    pub policy: RefreshPolicy,
    /// Minimum physical log length before compaction is considered
    pub compact_after_lines: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            staleness_limit: Duration::from_secs(12 * 3600),
            policy: RefreshPolicy::WriteOnce,
            compact_after_lines: 1000,
        }
    }
}

/// Derive the dedup fingerprint for a feed item title
///
/// Separator and line-break characters are replaced so the fingerprint always
/// fits on one log line.
#[must_use]
pub fn fingerprint(title: &str) -> String {
    title
        .replace(['|', '\r', '\n'], " ")
        .trim()
        .to_string()
}

/// Fingerprint → last-seen store backed by an append-only log
#[derive(Debug)]
pub struct DedupStore {
    path: PathBuf,
    config: DedupConfig,
    /// Fingerprint → last seen, epoch millis
    records: HashMap<String, i64>,
    /// Lines currently in the log file, duplicates included
    physical_lines: usize,
}

impl DedupStore {
    /// Open the store, failing open on any read error
    ///
    /// A missing log is the normal first-run case. Any other read failure is
    /// logged and the store starts empty, so new content is never hidden by a
    /// storage fault.
    pub async fn open(path: impl Into<PathBuf>, config: DedupConfig) -> Self {
        let path = path.into();
        match Self::try_open(path.clone(), config.clone()).await {
            Ok(store) => store,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Dedup log unreadable, starting with an empty store"
                );
                Self::empty(path, config)
            }
        }
    }

    /// Open the store, reporting read errors other than a missing file
    ///
    /// # Errors
    ///
    /// Returns [`PollError::Storage`] if the log exists but cannot be read.
    pub async fn try_open(path: impl Into<PathBuf>, config: DedupConfig) -> Result<Self, PollError> {
        let path = path.into();
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No dedup log yet");
                return Ok(Self::empty(path, config));
            }
            Err(e) => return Err(e.into()),
        };

        let (records, physical_lines) = parse_log(&content);
        tracing::debug!(
            path = %path.display(),
            unique = records.len(),
            lines = physical_lines,
            "Loaded dedup log"
        );

        Ok(Self {
            path,
            config,
            records,
            physical_lines,
        })
    }

    fn empty(path: PathBuf, config: DedupConfig) -> Self {
        Self {
            path,
            config,
            records: HashMap::new(),
            physical_lines: 0,
        }
    }

    /// True iff the fingerprint has a record younger than the staleness limit
    #[must_use]
    pub fn is_fresh(&self, fingerprint: &str) -> bool {
        self.is_fresh_at(fingerprint, Utc::now())
    }

    /// [`is_fresh`](Self::is_fresh) evaluated at an explicit instant
    #[must_use]
    pub fn is_fresh_at(&self, fingerprint: &str, now: DateTime<Utc>) -> bool {
        let limit_ms = i64::try_from(self.config.staleness_limit.as_millis()).unwrap_or(i64::MAX);
        self.records
            .get(fingerprint)
            .is_some_and(|&seen| now.timestamp_millis().saturating_sub(seen) <= limit_ms)
    }

    /// True iff any record exists for the fingerprint, regardless of age
    #[must_use]
    pub fn is_known(&self, fingerprint: &str) -> bool {
        self.records.contains_key(fingerprint)
    }

    /// Last-seen time of a fingerprint, if known
    #[must_use]
    pub fn last_seen(&self, fingerprint: &str) -> Option<DateTime<Utc>> {
        self.records
            .get(fingerprint)
            .and_then(|&ms| DateTime::from_timestamp_millis(ms))
    }

    /// Record a sighting of `fingerprint` at `now`
    ///
    /// Returns `Ok(true)` if a line was appended. Under
    /// [`RefreshPolicy::WriteOnce`] a known fingerprint is left untouched and
    /// `Ok(false)` is returned.
    ///
    /// The in-memory record is updated before the append, so a failed write
    /// still suppresses the item for the lifetime of the process.
    ///
    /// # Errors
    ///
    /// Returns [`PollError::Storage`] if the log cannot be appended to.
    pub async fn record(&mut self, fingerprint: &str, now: DateTime<Utc>) -> Result<bool, PollError> {
        if self.config.policy == RefreshPolicy::WriteOnce && self.is_known(fingerprint) {
            return Ok(false);
        }

        let millis = now.timestamp_millis();
        self.records.insert(fingerprint.to_string(), millis);

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(format!("{fingerprint}|{millis}\n").as_bytes())
            .await?;
        file.flush().await?;
        self.physical_lines += 1;

        if self.needs_compaction() {
            if let Err(e) = self.compact().await {
                tracing::warn!(path = %self.path.display(), error = %e, "Dedup log compaction failed");
            }
        }

        Ok(true)
    }

    fn needs_compaction(&self) -> bool {
        self.physical_lines > self.config.compact_after_lines
            && self.physical_lines > 2 * self.records.len()
    }

    /// Rewrite the log with one line per fingerprint
    ///
    /// # Errors
    ///
    /// Returns [`PollError::Storage`] if the temporary file cannot be written
    /// or moved into place. The original log is left intact and the temporary
    /// file is removed in that case.
    pub async fn compact(&mut self) -> Result<(), PollError> {
        let mut entries: Vec<(&String, &i64)> = self.records.iter().collect();
        entries.sort();

        let mut body = String::new();
        for (fp, millis) in entries {
            body.push_str(fp);
            body.push('|');
            body.push_str(&millis.to_string());
            body.push('\n');
        }

        let tmp = compaction_path(&self.path);
        let replaced = match tokio::fs::write(&tmp, body).await {
            Ok(()) => tokio::fs::rename(&tmp, &self.path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = replaced {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    tracing::debug!(path = %tmp.display(), error = %cleanup, "Failed to remove compaction file");
                }
            }
            return Err(e.into());
        }

        tracing::info!(
            path = %self.path.display(),
            before = self.physical_lines,
            after = self.records.len(),
            "Compacted dedup log"
        );
        self.physical_lines = self.records.len();
        Ok(())
    }

    /// Number of unique fingerprints
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no fingerprint has been recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of lines in the backing log, duplicates included
    #[must_use]
    pub fn physical_lines(&self) -> usize {
        self.physical_lines
    }

    /// Path of the backing log
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn compaction_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".compact");
    PathBuf::from(name)
}

/// Parse the log into a fingerprint map and a physical line count
fn parse_log(content: &str) -> (HashMap<String, i64>, usize) {
    let mut records = HashMap::new();
    let mut lines = 0;

    for line in content.lines().filter(|l| !l.trim().is_empty()) {
        lines += 1;
        let Some((fp, ts)) = line.rsplit_once('|') else {
            tracing::debug!(line, "Skipping dedup line without separator");
            continue;
        };
        match ts.trim().parse::<i64>() {
            Ok(millis) => {
                records.insert(fp.to_string(), millis);
            }
            Err(_) => tracing::debug!(line, "Skipping dedup line with bad timestamp"),
        }
    }

    (records, lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hours: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap() + chrono::Duration::hours(hours)
    }

    #[test]
    fn test_fingerprint_sanitizes_separators() {
        assert_eq!(fingerprint("  A | B\nC "), "A   B C");
        assert_eq!(fingerprint("Plain"), "Plain");
    }

    #[test]
    fn test_parse_log_last_occurrence_wins() {
        let (records, lines) = parse_log("a|1\nb|2\na|3\n\nbroken\nc|x\n");
        assert_eq!(lines, 5);
        assert_eq!(records.len(), 2);
        assert_eq!(records["a"], 3);
        assert_eq!(records["b"], 2);
    }

    #[test]
    fn test_parse_log_keeps_pipes_in_fingerprint() {
        let (records, _) = parse_log("a|b|42\n");
        assert_eq!(records["a|b"], 42);
    }

    #[tokio::test]
    async fn test_unknown_fingerprint_is_neither_known_nor_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let store = DedupStore::open(dir.path().join("feeds.db"), DedupConfig::default()).await;

        assert!(!store.is_known("never"));
        assert!(!store.is_fresh_at("never", at(0)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_record_then_known_and_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DedupStore::open(dir.path().join("feeds.db"), DedupConfig::default()).await;

        assert!(store.record("Headline", at(0)).await.unwrap());
        assert!(store.is_known("Headline"));
        assert!(store.is_fresh_at("Headline", at(1)));
        assert!(store.is_fresh_at("Headline", at(12)));
        assert!(!store.is_fresh_at("Headline", at(13)));
    }

    #[tokio::test]
    async fn test_write_once_never_refreshes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feeds.db");
        let mut store = DedupStore::open(&path, DedupConfig::default()).await;

        store.record("Headline", at(0)).await.unwrap();
        // Seen again after it went stale: the original timestamp is kept,
        // so the item stays stale and will be shown on every later fetch.
        assert!(!store.record("Headline", at(20)).await.unwrap());
        assert!(!store.is_fresh_at("Headline", at(20)));
        assert_eq!(store.last_seen("Headline"), Some(at(0)));
        assert_eq!(store.physical_lines(), 1);
    }

    #[tokio::test]
    async fn test_refresh_on_sight_extends_freshness() {
        let dir = tempfile::tempdir().unwrap();
        let config = DedupConfig {
            policy: RefreshPolicy::RefreshOnSight,
            ..DedupConfig::default()
        };
        let mut store = DedupStore::open(dir.path().join("feeds.db"), config).await;

        store.record("Headline", at(0)).await.unwrap();
        assert!(!store.is_fresh_at("Headline", at(20)));
        assert!(store.record("Headline", at(20)).await.unwrap());
        assert!(store.is_fresh_at("Headline", at(21)));
        assert_eq!(store.physical_lines(), 2);
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feeds.db");
        {
            let mut store = DedupStore::open(&path, DedupConfig::default()).await;
            store.record("One", at(0)).await.unwrap();
            store.record("Two", at(1)).await.unwrap();
        }

        let reopened = DedupStore::try_open(&path, DedupConfig::default()).await.unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.last_seen("Two"), Some(at(1)));
        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw.lines().count(), 2);
        assert!(raw.starts_with("One|"));
    }

    #[tokio::test]
    async fn test_unreadable_log_fails_open() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the log should be cannot be read as a file
        let path = dir.path().join("feeds.db");
        std::fs::create_dir(&path).unwrap();

        assert!(DedupStore::try_open(&path, DedupConfig::default()).await.is_err());

        let mut store = DedupStore::open(&path, DedupConfig::default()).await;
        assert!(!store.is_known("Anything"));

        // The append fails too, but the item is still suppressed in memory
        assert!(store.record("Anything", at(0)).await.is_err());
        assert!(store.is_fresh_at("Anything", at(1)));
    }

    #[tokio::test]
    async fn test_compaction_keeps_newest_record_per_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feeds.db");
        let config = DedupConfig {
            policy: RefreshPolicy::RefreshOnSight,
            compact_after_lines: 4,
            ..DedupConfig::default()
        };
        let mut store = DedupStore::open(&path, config.clone()).await;

        for hour in 0..5 {
            store.record("Same", at(hour)).await.unwrap();
        }

        // Fifth line crossed the threshold with only one unique fingerprint
        assert_eq!(store.physical_lines(), 1);
        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw, format!("Same|{}\n", at(4).timestamp_millis()));

        let reopened = DedupStore::try_open(&path, config).await.unwrap();
        assert_eq!(reopened.last_seen("Same"), Some(at(4)));
    }

    #[tokio::test]
    async fn test_failed_compaction_removes_temporary_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feeds.db");
        // A non-empty directory in place of the log makes the rename fail
        std::fs::create_dir_all(path.join("occupied")).unwrap();
        let mut store = DedupStore::open(&path, DedupConfig::default()).await;

        let err = store.compact().await.unwrap_err();

        assert!(matches!(err, PollError::Storage(_)));
        assert!(!dir.path().join("feeds.db.compact").exists());
        assert!(path.join("occupied").is_dir());
    }

    #[tokio::test]
    async fn test_store_grows_with_unique_items() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DedupStore::open(dir.path().join("feeds.db"), DedupConfig::default()).await;

        for i in 0..50 {
            store.record(&format!("Item {i}"), at(0)).await.unwrap();
        }

        // Unique fingerprints are never dropped, compaction only removes duplicates
        assert_eq!(store.len(), 50);
        assert_eq!(store.physical_lines(), 50);
    }
}
