//! Text Paginator
//!
//! Splits an ordered list of display lines into pages that fit the character
//! grid. Pure functions only; the same input always yields the same pages.

/// A single, already formatted display line
pub type DisplayLine = String;

/// One screenful of lines, never longer than the display height
pub type Page = Vec<DisplayLine>;

/// Split `lines` into consecutive pages of `page_height` lines
///
/// The last page holds the remainder. No empty trailing page is produced when
/// the line count is an exact multiple, and an empty input yields no pages.
/// A height of zero is treated as one.
#[must_use]
pub fn paginate(lines: &[DisplayLine], page_height: usize) -> Vec<Page> {
    let height = page_height.max(1);
    lines.chunks(height).map(<[DisplayLine]>::to_vec).collect()
}

/// Truncate a line to at most `width` characters
#[must_use]
pub fn fit_line(line: &str, width: usize) -> String {
    line.chars().take(width).collect()
}
