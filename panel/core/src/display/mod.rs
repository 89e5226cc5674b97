//! Character Display
//!
//! The render loop talks to the LCD through the [`Display`] trait. Rows are
//! 1-based, as on the panel. Text goes through [`glyphs::encode_text`] so
//! umlauts land on their custom glyph slots.
//!
//! # Implementations
//!
//! - [`ConsoleDisplay`]: draws a framed grid on stdout
//! - [`MemoryDisplay`]: records rows, glyphs and flushed frames for tests

pub mod glyphs;

mod console;
mod memory;

use async_trait::async_trait;

use crate::error::PollError;
use glyphs::{decode_byte, encode_text, Glyph, GLYPH_SLOTS};

pub use console::ConsoleDisplay;
pub use memory::MemoryDisplay;

/// A fixed-size character display
#[async_trait]
pub trait Display: Send {
    /// Columns per row
    fn width(&self) -> usize;

    /// Number of rows
    fn height(&self) -> usize;

    /// Blank every row
    async fn clear(&mut self) -> Result<(), PollError>;

    /// Load a custom glyph into `slot` (`0..8`)
    async fn define_glyph(&mut self, slot: u8, bitmap: Glyph) -> Result<(), PollError>;

    /// Replace `row` with raw display codes, truncated to the width
    async fn write_raw(&mut self, bytes: &[u8], row: usize) -> Result<(), PollError>;

    /// Replace `row` with text
    async fn write_line(&mut self, text: &str, row: usize) -> Result<(), PollError> {
        let bytes = encode_text(text);
        self.write_raw(&bytes, row).await
    }

    /// Make pending writes visible
    async fn flush(&mut self) -> Result<(), PollError> {
        Ok(())
    }
}

/// Display memory shared by the implementations
#[derive(Clone, Debug)]
pub(crate) struct Grid {
    width: usize,
    rows: Vec<Vec<u8>>,
    cgram: [Glyph; GLYPH_SLOTS],
}

impl Grid {
    pub(crate) fn new(width: usize, height: usize) -> Self {
        let width = width.max(1);
        Self {
            width,
            rows: vec![vec![b' '; width]; height.max(1)],
            cgram: [[0; 8]; GLYPH_SLOTS],
        }
    }

    pub(crate) fn width(&self) -> usize {
        self.width
    }

    pub(crate) fn height(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn clear(&mut self) {
        for row in &mut self.rows {
            row.fill(b' ');
        }
    }

    pub(crate) fn define(&mut self, slot: u8, bitmap: Glyph) -> Result<(), PollError> {
        let cell = self
            .cgram
            .get_mut(usize::from(slot))
            .ok_or_else(|| PollError::Hardware(format!("glyph slot {slot} out of range")))?;
        *cell = bitmap;
        Ok(())
    }

    pub(crate) fn write(&mut self, bytes: &[u8], row: usize) -> Result<(), PollError> {
        let height = self.rows.len();
        let target = row
            .checked_sub(1)
            .and_then(|i| self.rows.get_mut(i))
            .ok_or_else(|| PollError::Hardware(format!("row {row} outside 1..={height}")))?;
        let len = bytes.len().min(target.len());
        target[..len].copy_from_slice(&bytes[..len]);
        target[len..].fill(b' ');
        Ok(())
    }

    pub(crate) fn raw_row(&self, row: usize) -> Option<&[u8]> {
        row.checked_sub(1).and_then(|i| self.rows.get(i)).map(Vec::as_slice)
    }

    pub(crate) fn glyph(&self, slot: u8) -> Option<Glyph> {
        self.cgram.get(usize::from(slot)).copied()
    }

    /// Rows as printable text, trailing blanks kept
    pub(crate) fn text_rows(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|row| row.iter().map(|&b| decode_byte(b, &self.cgram)).collect())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::glyphs::UMLAUT_GLYPHS;
    use super::*;

    #[test]
    fn test_grid_write_pads_and_truncates() {
        let mut grid = Grid::new(5, 2);
        grid.write(b"abcdefgh", 1).unwrap();
        grid.write(b"xy", 2).unwrap();
        assert_eq!(grid.text_rows(), vec!["abcde".to_string(), "xy   ".to_string()]);

        grid.write(b"z", 1).unwrap();
        assert_eq!(grid.raw_row(1), Some(&b"z    "[..]));
    }

    #[test]
    fn test_grid_rejects_bad_rows_and_slots() {
        let mut grid = Grid::new(20, 4);
        assert!(matches!(grid.write(b"x", 0), Err(PollError::Hardware(_))));
        assert!(matches!(grid.write(b"x", 5), Err(PollError::Hardware(_))));
        assert!(matches!(grid.define(8, [0; 8]), Err(PollError::Hardware(_))));
        assert!(grid.define(7, UMLAUT_GLYPHS[0]).is_ok());
        assert_eq!(grid.glyph(7), Some(UMLAUT_GLYPHS[0]));
    }

    #[test]
    fn test_grid_clear() {
        let mut grid = Grid::new(3, 1);
        grid.write(b"abc", 1).unwrap();
        grid.clear();
        assert_eq!(grid.text_rows(), vec!["   ".to_string()]);
    }
}
