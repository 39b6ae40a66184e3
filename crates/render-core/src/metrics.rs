//! Approximate metrics for the standard PDF fonts.
//!
//! Widths come from a handful of character classes rather than real AFM
//! tables. That is accurate enough for wrapping and alignment of form data.

use quire_types::FontStyle;

/// Distance from the top of a line box to the baseline, as a fraction of the font size.
pub const ASCENT: f32 = 0.8;

/// Default line height as a multiple of the font size.
pub const LINE_HEIGHT_FACTOR: f32 = 1.2;

pub fn line_height(font_size: f32) -> f32 {
    font_size * LINE_HEIGHT_FACTOR
}

fn is_monospace(font: &str) -> bool {
    font.to_ascii_lowercase().starts_with("courier")
}

/// Advance width of one character in em units.
pub fn char_width_em(c: char, font: &str, style: FontStyle) -> f32 {
    if is_monospace(font) {
        return 0.6;
    }
    let base = match c {
        ' ' => 0.278,
        'i' | 'j' | 'l' | '.' | ',' | ':' | ';' | '\'' | '!' | '|' => 0.24,
        'f' | 't' | 'r' | 'I' | '(' | ')' | '[' | ']' | '-' => 0.33,
        '0'..='9' => 0.556,
        'm' | 'w' => 0.833,
        'M' | 'W' => 0.9,
        'A'..='Z' => 0.667,
        'a'..='z' => 0.53,
        _ => 0.6,
    };
    if style.bold { base * 1.06 } else { base }
}

pub fn text_width(text: &str, font: &str, style: FontStyle, size: f32) -> f32 {
    text.chars().map(|c| char_width_em(c, font, style)).sum::<f32>() * size
}
