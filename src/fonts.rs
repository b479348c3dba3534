//! Text measurement for the builtin Helvetica faces.
//!
//! The embedded renderer prints with the PDF standard fonts, so glyph
//! advances come from the Helvetica AFM widths (units per 1000 em) instead
//! of a parsed font file.

/// Advance widths of Helvetica for ASCII 32..=126.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
];

/// Width used for characters outside the table.
const FALLBACK_WIDTH: u16 = 556;

/// Helvetica-Bold is close to a uniform 5 % wider than the regular face.
const BOLD_FACTOR: f32 = 1.05;

fn glyph_width(c: char) -> u16 {
    let code = c as u32;
    if (32..=126).contains(&code) {
        HELVETICA_WIDTHS[(code - 32) as usize]
    } else if c == '\u{00A0}' {
        HELVETICA_WIDTHS[0]
    } else {
        FALLBACK_WIDTH
    }
}

/// Width of `text` at `font_size`, in the same unit as `font_size`.
pub fn measure_text_width(text: &str, font_size: f32, bold: bool) -> f32 {
    let units: u32 = text.chars().map(|c| glyph_width(c) as u32).sum();
    let width = units as f32 * font_size / 1000.0;
    if bold {
        width * BOLD_FACTOR
    } else {
        width
    }
}

/// Width of the widest whitespace-separated word.
pub fn longest_word_width(text: &str, font_size: f32, bold: bool) -> f32 {
    text.split_whitespace()
        .map(|w| measure_text_width(w, font_size, bold))
        .fold(0.0, f32::max)
}

/// Word-wrap text to `max_width`. Explicit `\n` always breaks; a word wider
/// than the line is split between characters.
pub fn wrap_text(text: &str, font_size: f32, bold: bool, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        let mut current_width = 0.0f32;
        let space = measure_text_width(" ", font_size, bold);

        for word in paragraph.split_whitespace() {
            let word_width = measure_text_width(word, font_size, bold);
            let needed = if current.is_empty() {
                word_width
            } else {
                current_width + space + word_width
            };
            if needed <= max_width || max_width <= 0.0 {
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(word);
                current_width = needed;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if word_width <= max_width {
                current.push_str(word);
                current_width = word_width;
            } else {
                let mut pieces = break_word(word, font_size, bold, max_width);
                let last = pieces.pop().unwrap_or_default();
                lines.extend(pieces);
                current_width = measure_text_width(&last, font_size, bold);
                current = last;
            }
        }
        lines.push(current);
    }
    lines
}

fn break_word(word: &str, font_size: f32, bold: bool, max_width: f32) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut piece = String::new();
    let mut width = 0.0f32;
    for c in word.chars() {
        let w = measure_text_width(c.encode_utf8(&mut [0u8; 4]), font_size, bold);
        if width + w > max_width && !piece.is_empty() {
            pieces.push(std::mem::take(&mut piece));
            width = 0.0;
        }
        piece.push(c);
        width += w;
    }
    pieces.push(piece);
    pieces
}
