//! In-memory display for tests

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::glyphs::Glyph;
use super::{Display, Grid};
use crate::error::PollError;

#[derive(Debug)]
struct Inner {
    grid: Grid,
    frames: Vec<Vec<String>>,
    clears: usize,
    failing: bool,
}

/// Records everything written to it
///
/// Clones share the same memory, so a test can keep a handle while the
/// render loop owns another.
#[derive(Clone, Debug)]
pub struct MemoryDisplay {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDisplay {
    /// Blank display of `width` x `height`
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                grid: Grid::new(width, height),
                frames: Vec::new(),
                clears: 0,
                failing: false,
            })),
        }
    }

    /// Current rows as text
    #[must_use]
    pub fn rows(&self) -> Vec<String> {
        self.inner.lock().grid.text_rows()
    }

    /// Current raw codes of a 1-based row
    #[must_use]
    pub fn raw_row(&self, row: usize) -> Option<Vec<u8>> {
        self.inner.lock().grid.raw_row(row).map(<[u8]>::to_vec)
    }

    /// Glyph loaded into `slot`
    #[must_use]
    pub fn glyph(&self, slot: u8) -> Option<Glyph> {
        self.inner.lock().grid.glyph(slot)
    }

    /// Every flushed frame, rows with trailing blanks trimmed
    #[must_use]
    pub fn frames(&self) -> Vec<Vec<String>> {
        self.inner.lock().frames.clone()
    }

    /// Number of `clear` calls
    #[must_use]
    pub fn clears(&self) -> usize {
        self.inner.lock().clears
    }

    /// Make every operation fail with a hardware error
    pub fn set_failing(&self, failing: bool) {
        self.inner.lock().failing = failing;
    }

    fn guard(inner: &Inner) -> Result<(), PollError> {
        if inner.failing {
            Err(PollError::Hardware("display unplugged".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Display for MemoryDisplay {
    fn width(&self) -> usize {
        self.inner.lock().grid.width()
    }

    fn height(&self) -> usize {
        self.inner.lock().grid.height()
    }

    async fn clear(&mut self) -> Result<(), PollError> {
        let mut inner = self.inner.lock();
        Self::guard(&inner)?;
        inner.grid.clear();
        inner.clears += 1;
        Ok(())
    }

    async fn define_glyph(&mut self, slot: u8, bitmap: Glyph) -> Result<(), PollError> {
        let mut inner = self.inner.lock();
        Self::guard(&inner)?;
        inner.grid.define(slot, bitmap)
    }

    async fn write_raw(&mut self, bytes: &[u8], row: usize) -> Result<(), PollError> {
        let mut inner = self.inner.lock();
        Self::guard(&inner)?;
        inner.grid.write(bytes, row)
    }

    async fn flush(&mut self) -> Result<(), PollError> {
        let mut inner = self.inner.lock();
        Self::guard(&inner)?;
        let frame = inner
            .grid
            .text_rows()
            .into_iter()
            .map(|row| row.trim_end().to_string())
            .collect();
        inner.frames.push(frame);
        Ok(())
    }
}
