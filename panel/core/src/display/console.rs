//! Console stand-in for the LCD

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::glyphs::Glyph;
use super::{Display, Grid};
use crate::error::PollError;

/// Draws the display as a framed grid on a writer (stdout by default)
///
/// A frame is only written on [`Display::flush`] and only if it differs from
/// the previous one.
pub struct ConsoleDisplay<W = tokio::io::Stdout> {
    grid: Grid,
    out: W,
    last_frame: Option<String>,
}

impl ConsoleDisplay {
    /// Console display of `width` x `height` on stdout
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self::with_writer(width, height, tokio::io::stdout())
    }
}

impl<W: AsyncWrite + Unpin + Send> ConsoleDisplay<W> {
    /// Console display drawing to `out`
    pub fn with_writer(width: usize, height: usize, out: W) -> Self {
        Self {
            grid: Grid::new(width, height),
            out,
            last_frame: None,
        }
    }

    /// The underlying writer
    pub fn writer(&self) -> &W {
        &self.out
    }

    fn frame(&self) -> String {
        let border = format!("+{}+\n", "-".repeat(self.grid.width()));
        let mut frame = border.clone();
        for row in self.grid.text_rows() {
            frame.push('|');
            frame.push_str(&row);
            frame.push_str("|\n");
        }
        frame.push_str(&border);
        frame
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> Display for ConsoleDisplay<W> {
    fn width(&self) -> usize {
        self.grid.width()
    }

    fn height(&self) -> usize {
        self.grid.height()
    }

    async fn clear(&mut self) -> Result<(), PollError> {
        self.grid.clear();
        Ok(())
    }

    async fn define_glyph(&mut self, slot: u8, bitmap: Glyph) -> Result<(), PollError> {
        self.grid.define(slot, bitmap)
    }

    async fn write_raw(&mut self, bytes: &[u8], row: usize) -> Result<(), PollError> {
        self.grid.write(bytes, row)
    }

    async fn flush(&mut self) -> Result<(), PollError> {
        let frame = self.frame();
        if self.last_frame.as_deref() == Some(frame.as_str()) {
            return Ok(());
        }
        self.out
            .write_all(frame.as_bytes())
            .await
            .map_err(|e| PollError::Hardware(format!("console: {e}")))?;
        self.out
            .flush()
            .await
            .map_err(|e| PollError::Hardware(format!("console: {e}")))?;
        self.last_frame = Some(frame);
        Ok(())
    }
}
