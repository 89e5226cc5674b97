//! Character Tables
//!
//! HD44780-style controllers have eight user-definable 5x8 glyph slots
//! (CGRAM, codes `0x00..=0x07`) next to the fixed character ROM. Two glyph
//! sets are swapped in depending on the mode:
//!
//! - [`UMLAUT_GLYPHS`] for text screens, so German umlauts and `ß` can be shown
//! - [`BIG_DIGIT_SEGMENTS`] for the clock, from which [`BIG_DIGITS`] are built
//!   as 3x2 blocks
//!
//! ROM codes used directly: `0xFF` (full block), `0xFE` (blank), `0xA5`
//! (centered dot, the big-clock colon) and `0xDF` (degree sign).

/// One 5x8 glyph, top row first, low five bits used
pub type Glyph = [u8; 8];

/// Number of user-definable glyph slots
pub const GLYPH_SLOTS: usize = 8;

/// ROM full block
pub const FULL_BLOCK: u8 = 0xFF;
/// ROM blank
pub const BLANK: u8 = 0xFE;
/// ROM centered dot
pub const DOT: u8 = 0xA5;
/// ROM degree sign
pub const DEGREE: u8 = 0xDF;

/// Characters carried by [`UMLAUT_GLYPHS`], slot by slot
pub const UMLAUT_CHARS: [char; 7] = ['ä', 'ö', 'ü', 'Ä', 'Ö', 'Ü', 'ß'];

/// Glyphs for [`UMLAUT_CHARS`], loaded into slots `0..7`
pub const UMLAUT_GLYPHS: [Glyph; 7] = [
    [0b01010, 0b00000, 0b01110, 0b00001, 0b01111, 0b10001, 0b01111, 0b00000],
    [0b01010, 0b00000, 0b01110, 0b10001, 0b10001, 0b10001, 0b01110, 0b00000],
    [0b01010, 0b00000, 0b10001, 0b10001, 0b10001, 0b10011, 0b01101, 0b00000],
    [0b01010, 0b00000, 0b01110, 0b10001, 0b11111, 0b10001, 0b10001, 0b00000],
    [0b01010, 0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110, 0b00000],
    [0b01010, 0b00000, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110, 0b00000],
    [0b01100, 0b10010, 0b10010, 0b10110, 0b10001, 0b10001, 0b10110, 0b10000],
];

/// Segments the big digits are assembled from, loaded into slots `0..8`
pub const BIG_DIGIT_SEGMENTS: [Glyph; GLYPH_SLOTS] = [
    [0b11111, 0b11111, 0b11111, 0b00000, 0b00000, 0b00000, 0b00000, 0b00000],
    [0b11100, 0b11110, 0b11111, 0b11111, 0b11111, 0b11111, 0b11111, 0b11111],
    [0b11111, 0b11111, 0b11111, 0b11111, 0b11111, 0b11111, 0b01111, 0b00111],
    [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b11111, 0b11111, 0b11111],
    [0b11111, 0b11111, 0b11111, 0b11111, 0b11111, 0b11111, 0b11110, 0b11100],
    [0b11111, 0b11111, 0b11111, 0b00000, 0b00000, 0b00000, 0b11111, 0b11111],
    [0b11111, 0b00000, 0b00000, 0b00000, 0b00000, 0b11111, 0b11111, 0b11111],
    [0b00111, 0b01111, 0b11111, 0b11111, 0b11111, 0b11111, 0b11111, 0b11111],
];

/// Big digit: upper and lower row, three cells each
pub type BigGlyph = [[u8; 3]; 2];

/// Big digits `0..=9` over [`BIG_DIGIT_SEGMENTS`]
pub const BIG_DIGITS: [BigGlyph; 10] = [
    [[0x07, 0x00, 0x01], [0x02, 0x03, 0x04]],
    [[BLANK, 0x00, 0x01], [BLANK, BLANK, FULL_BLOCK]],
    [[0x05, 0x05, 0x01], [0x02, 0x06, 0x06]],
    [[0x05, 0x05, 0x01], [0x06, 0x06, 0x04]],
    [[0x02, 0x03, 0x01], [BLANK, BLANK, FULL_BLOCK]],
    [[FULL_BLOCK, 0x05, 0x05], [0x06, 0x06, 0x04]],
    [[0x07, 0x05, 0x05], [0x02, 0x06, 0x04]],
    [[0x00, 0x00, 0x01], [BLANK, 0x07, BLANK]],
    [[0x07, 0x05, 0x01], [0x02, 0x06, 0x04]],
    [[0x07, 0x05, 0x01], [BLANK, BLANK, FULL_BLOCK]],
];

/// Big colon, one cell wide
pub const BIG_COLON: [u8; 2] = [DOT, DOT];

/// Big space, one cell wide
pub const BIG_SPACE: [u8; 2] = [BLANK, BLANK];

fn push_digit(rows: &mut [Vec<u8>; 2], digit: u32) {
    let glyph = BIG_DIGITS[(digit % 10) as usize];
    rows[0].extend_from_slice(&glyph[0]);
    rows[1].extend_from_slice(&glyph[1]);
}

fn push_pair(rows: &mut [Vec<u8>; 2], value: u32) {
    push_digit(rows, value / 10);
    push_digit(rows, value % 10);
}

/// Render `HH:MM:SS` in big digits, 20 cells per row
#[must_use]
pub fn render_big_time(hours: u32, minutes: u32, seconds: u32) -> [Vec<u8>; 2] {
    let mut rows = [Vec::with_capacity(20), Vec::with_capacity(20)];
    push_pair(&mut rows, hours);
    for value in [minutes, seconds] {
        rows[0].push(BIG_COLON[0]);
        rows[1].push(BIG_COLON[1]);
        push_pair(&mut rows, value);
    }
    rows
}

/// Map text to display codes
///
/// Umlauts map to their [`UMLAUT_GLYPHS`] slot, `°` to the ROM degree sign
/// and printable ASCII to itself. Anything else becomes `?`.
#[must_use]
pub fn encode_text(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| {
            if let Some(slot) = UMLAUT_CHARS.iter().position(|&u| u == c) {
                slot as u8
            } else if c == '°' {
                DEGREE
            } else if c.is_ascii() && !c.is_ascii_control() {
                c as u8
            } else {
                b'?'
            }
        })
        .collect()
}

/// Approximate a custom glyph with a block character
fn shade(glyph: &Glyph) -> char {
    let lit = |rows: &[u8]| rows.iter().map(|r| (r & 0x1F).count_ones()).sum::<u32>();
    let top = lit(&glyph[..4]) >= 10;
    let bottom = lit(&glyph[4..]) >= 10;
    match (top, bottom) {
        (true, true) => '█',
        (true, false) => '▀',
        (false, true) => '▄',
        (false, false) => ' ',
    }
}

/// Map a display code back to a printable character
///
/// Custom slots are shown as the umlaut they hold, or as a block
/// approximation of the loaded glyph.
#[must_use]
pub fn decode_byte(byte: u8, cgram: &[Glyph; GLYPH_SLOTS]) -> char {
    match byte {
        0x00..=0x07 => {
            let glyph = &cgram[usize::from(byte)];
            UMLAUT_GLYPHS
                .iter()
                .position(|g| g == glyph)
                .map_or_else(|| shade(glyph), |i| UMLAUT_CHARS[i])
        }
        0x20..=0x7E => char::from(byte),
        DEGREE => '°',
        DOT => '·',
        FULL_BLOCK => '█',
        BLANK => ' ',
        _ => '?',
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn umlaut_cgram() -> [Glyph; GLYPH_SLOTS] {
        let mut cgram = [[0; 8]; GLYPH_SLOTS];
        cgram[..UMLAUT_GLYPHS.len()].copy_from_slice(&UMLAUT_GLYPHS);
        cgram
    }

    #[test]
    fn test_big_time_fills_twenty_cells() {
        let [upper, lower] = render_big_time(12, 34, 56);
        assert_eq!(upper.len(), 20);
        assert_eq!(lower.len(), 20);
        assert_eq!(&upper[..3], &BIG_DIGITS[1][0]);
        assert_eq!(&lower[3..6], &BIG_DIGITS[2][1]);
        assert_eq!(upper[6], DOT);
        assert_eq!(upper[13], DOT);
        assert_eq!(&lower[17..], &BIG_DIGITS[6][1]);
    }

    #[test]
    fn test_encode_text() {
        assert_eq!(encode_text("Grüße"), vec![b'G', b'r', 2, 6, b'e']);
        assert_eq!(encode_text("21°C"), vec![b'2', b'1', DEGREE, b'C']);
        assert_eq!(encode_text("€\t"), vec![b'?', b'?']);
    }

    #[test]
    fn test_decode_umlauts_with_umlaut_glyphs_loaded() {
        let cgram = umlaut_cgram();
        let text: String = encode_text("äöüÄÖÜß 20°C")
            .into_iter()
            .map(|b| decode_byte(b, &cgram))
            .collect();
        assert_eq!(text, "äöüÄÖÜß 20°C");
    }

    #[test]
    fn test_decode_segments_as_blocks() {
        let cgram = BIG_DIGIT_SEGMENTS;
        assert_eq!(decode_byte(0x00, &cgram), '▀');
        assert_eq!(decode_byte(0x03, &cgram), '▄');
        assert_eq!(decode_byte(0x02, &cgram), '█');
        assert_eq!(decode_byte(FULL_BLOCK, &cgram), '█');
        assert_eq!(decode_byte(BLANK, &cgram), ' ');
        assert_eq!(decode_byte(DOT, &cgram), '·');
    }
}
