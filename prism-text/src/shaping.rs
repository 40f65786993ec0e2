//! Shaping engine interface and the shaped-glyph sequence it feeds.

use glam::Vec2;

use crate::glyph_cache::{FontId, GlyphHandle};

/// Direction handed to the shaping engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShapeDirection {
    Ltr,
    Rtl,
    /// Top to bottom.
    Ttb,
}

/// One positioned cluster returned by a [`ShapingEngine`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShapedCluster {
    /// Glyph to rasterize (a glyph index for real fonts).
    pub codepoint: u32,
    /// Byte offset of the cluster's first source character in the shaped text.
    pub cluster: usize,
    /// Pen advance in pixels, y pointing down.
    pub advance: Vec2,
    /// Placement offset in pixels, y pointing down.
    pub offset: Vec2,
}

/// External shaping engine (harfbuzz-style).
///
/// The font and size are a side channel: `set_font_size` is called before
/// every `shape` and stays in effect until the next call.
pub trait ShapingEngine {
    /// `pt_size` is 26.6 fixed point.
    fn set_font_size(&mut self, font: FontId, pt_size: u32);

    /// Shape one unidirectional span. Clusters come back in visual order.
    fn shape(&mut self, text: &str, direction: ShapeDirection) -> Vec<ShapedCluster>;
}

/// A glyph placed by shaping, holding one reference into the glyph cache.
///
/// Copying a `ShapedGlyph` does not add a reference; use
/// [`GlyphCache::add_ref`](crate::GlyphCache::add_ref) when sharing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShapedGlyph {
    pub glyph: GlyphHandle,
    pub advance: Vec2,
    pub offset: Vec2,
    pub is_rtl: bool,
    pub is_newline: bool,
    pub is_word_breaker: bool,
}

/// Mandatory line breaks.
pub fn is_newline(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\u{000B}' | '\u{000C}' | '\u{0085}' | '\u{2028}' | '\u{2029}'
    )
}

/// Characters that end a word for wrapping purposes.
///
/// Whitespace and punctuation only. Scripts written without spaces (Thai,
/// Chinese, Japanese) are not segmented.
pub fn is_word_breaker(c: char) -> bool {
    c.is_whitespace()
        || c.is_ascii_punctuation()
        || matches!(
            c,
            '\u{00A1}' | '\u{00BF}' | '\u{2010}'..='\u{2027}' | '\u{3001}' | '\u{3002}' | '\u{FF0C}'
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newline_classification() {
        assert!(is_newline('\n'));
        assert!(is_newline('\u{2029}'));
        assert!(!is_newline(' '));
        assert!(!is_newline('a'));
    }

    #[test]
    fn test_word_breakers() {
        for c in [' ', '\t', ',', '.', '!', '-', '\u{2014}', '\u{3002}'] {
            assert!(is_word_breaker(c), "{c:?} should break words");
        }
        for c in ['a', 'Z', '7', '\u{05D0}', '\u{0E01}', '\u{4E2D}'] {
            assert!(!is_word_breaker(c), "{c:?} should not break words");
        }
    }
}
