//! Line layout: word iteration, wrapping, alignment and quad emission.
//!
//! A single forward pass over a shaped glyph sequence:
//!
//! ```text
//! Start ──► find_next_word ──► wrap? ──no──► emit quads ──┐
//!               ▲                │                        │
//!               │               yes                       │
//!               │                ▼                        │
//!               └──── caret to line start, next line ◄────┘
//! ```
//!
//! Positions are worked out on two axes. The *inline* axis is the one
//! glyphs advance along (x for horizontal text, y for vertical text); the
//! *block* axis is the one lines (or columns) stack along.

use glam::Vec2;

use crate::glyph_cache::{CachedGlyph, GlyphCache};
use crate::shaping::ShapedGlyph;
use crate::vertex::{GlyphVertex, QuadSource, Rect, VERTICES_PER_GLYPH};

/// Leading applied on top of the tallest glyph's line height.
pub const LINE_SPACING: f32 = 1.20;

/// Horizontal alignment of each line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum TextHorizAlignment {
    /// Follows the text's direction. The layout engine treats it as `Left`;
    /// `TextBlock` resolves it before laying out.
    #[default]
    Natural,
    Left,
    Center,
    Right,
}

/// What happens to words that do not fit the line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum LinebreakMode {
    #[default]
    WordWrap,
    /// Never break; the clip distances hide the overflow.
    Clip,
}

/// Direction lines are laid out in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum TextFlow {
    #[default]
    Horizontal,
    /// Vertical text, columns progressing right to left.
    VerticalRtl,
    /// Vertical text, columns progressing left to right.
    VerticalLtr,
}

impl TextFlow {
    pub fn is_vertical(self) -> bool {
        !matches!(self, TextFlow::Horizontal)
    }
}

/// How glyph colours are derived from [`LayoutParams::color`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ColorMode {
    /// Every glyph gets the label colour.
    #[default]
    Uniform,
    /// LTR glyphs scale green and blue by 128 instead of 255. Kept for
    /// output compatibility with older renderers.
    LegacyDirectional,
}

/// Per-pass layout parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutParams {
    /// Area lines are laid out in.
    pub bounds: Rect,
    /// Clip rectangle written into each vertex's clip distances.
    pub clip: Rect,
    /// Multiplier applied to every metric (device pixel ratio).
    pub scale: f32,
    pub alignment: TextHorizAlignment,
    pub linebreak: LinebreakMode,
    pub flow: TextFlow,
    /// RGBA, each channel in [0.0, 1.0].
    pub color: [f32; 4],
    pub color_mode: ColorMode,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            bounds: Rect::from_size(Vec2::splat(f32::MAX)),
            clip: Rect::unbounded(),
            scale: 1.0,
            alignment: TextHorizAlignment::Natural,
            linebreak: LinebreakMode::WordWrap,
            flow: TextFlow::Horizontal,
            color: [1.0, 1.0, 1.0, 1.0],
            color_mode: ColorMode::Uniform,
        }
    }
}

/// Layout cursor over one word. Caret values are inline-axis positions.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Word {
    /// Index of the word's first glyph.
    pub offset: usize,
    pub length: usize,
    /// Caret after the word's last glyph.
    pub caret_pos: f32,
    /// Caret before the word's first glyph.
    pub old_caret_pos: f32,
    /// Advance of the word's last glyph.
    pub last_advance: f32,
    /// Ink extent of the last glyph measured from its pen position.
    pub last_char_width: f32,
}

impl Word {
    /// An empty word at glyph `offset` with the caret at `caret`.
    pub fn at(offset: usize, caret: f32) -> Self {
        Self {
            offset,
            caret_pos: caret,
            old_caret_pos: caret,
            ..Default::default()
        }
    }

    /// Rightmost inked position of the word (or its start when it has no ink).
    pub fn trailing_edge(&self) -> f32 {
        (self.caret_pos - self.last_advance + self.last_char_width).max(self.old_caret_pos)
    }
}

/// Summary of one [`TextLayout::fill_vertices`] pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LayoutOutput {
    pub vertex_count: usize,
    pub line_count: usize,
    pub placed_words: usize,
    /// The vertex buffer filled up before every glyph was emitted.
    pub truncated: bool,
}

/// Lays out one shaped sequence.
pub struct TextLayout<'a> {
    shapes: &'a [ShapedGlyph],
    cache: &'a GlyphCache,
    params: &'a LayoutParams,
}

impl<'a> TextLayout<'a> {
    pub fn new(shapes: &'a [ShapedGlyph], cache: &'a GlyphCache, params: &'a LayoutParams) -> Self {
        Self {
            shapes,
            cache,
            params,
        }
    }

    /// Advance `word` to the glyphs following it.
    ///
    /// A word is its first glyph plus every following glyph with the same
    /// direction up to (excluding) the next newline or word breaker.
    /// Returns `false` once the sequence is exhausted.
    pub fn find_next_word(&self, word: &mut Word) -> bool {
        let start = word.offset + word.length;
        let Some(first) = self.shapes.get(start) else {
            return false;
        };

        word.offset = start;
        word.length = 0;
        word.old_caret_pos = word.caret_pos;
        word.last_advance = 0.0;
        word.last_char_width = 0.0;

        for (i, glyph) in self.shapes[start..].iter().enumerate() {
            if i > 0 && (glyph.is_newline || glyph.is_word_breaker || glyph.is_rtl != first.is_rtl) {
                break;
            }
            let advance = self.inline_advance(glyph);
            word.last_advance = advance;
            word.last_char_width = self.ink_extent(glyph);
            word.caret_pos += advance;
            word.length += 1;
        }
        true
    }

    /// Inline position the line starting at glyph `line_start` begins at.
    ///
    /// Left alignment starts at the bounds. Otherwise words are measured
    /// ahead until a newline or until the next word would not fit, and the
    /// line is offset by the space left over.
    pub fn find_caret_start(&self, line_start: usize) -> f32 {
        let (start, end) = self.inline_bounds();
        if matches!(
            self.params.alignment,
            TextHorizAlignment::Natural | TextHorizAlignment::Left
        ) {
            return start;
        }

        let mut word = Word::at(line_start, start);
        let mut extent = start;
        let mut first = true;
        while self.find_next_word(&mut word) {
            if !first && self.shapes[word.offset].is_newline {
                break;
            }
            let edge = word.trailing_edge();
            if !first && self.params.linebreak == LinebreakMode::WordWrap && edge > end {
                break;
            }
            extent = extent.max(edge);
            first = false;
        }

        let slack = (end - extent).max(0.0);
        match self.params.alignment {
            TextHorizAlignment::Center => start + slack * 0.5,
            TextHorizAlignment::Right => start + slack,
            TextHorizAlignment::Natural | TextHorizAlignment::Left => start,
        }
    }

    /// Tallest line height from `line_start` through the next newline,
    /// with [`LINE_SPACING`] and the scale applied.
    pub fn find_line_max_height(&self, line_start: usize) -> f32 {
        let mut max_height: f32 = 0.0;
        for (i, glyph) in self.shapes.iter().enumerate().skip(line_start) {
            if let Some(cached) = self.cache.get(glyph.glyph) {
                max_height = max_height.max(cached.newline_size);
            }
            if glyph.is_newline && i > line_start {
                break;
            }
        }
        max_height * LINE_SPACING * self.params.scale
    }

    /// Write six vertices per visible glyph into `out`.
    ///
    /// Stops early (and reports `truncated`) if `out` is too small.
    pub fn fill_vertices(&self, out: &mut [GlyphVertex]) -> LayoutOutput {
        let mut output = LayoutOutput::default();
        if self.shapes.is_empty() {
            return output;
        }

        let (_, inline_end) = self.inline_bounds();
        let (block_start, block_sign) = self.block_origin();

        let mut line_height = self.find_line_max_height(0);
        let mut block = block_start + block_sign * self.first_line_offset(line_height);
        let mut word = Word::at(0, self.find_caret_start(0));
        let mut line_opener = usize::MAX;
        let mut words_on_line = 0;
        output.line_count = 1;

        while self.find_next_word(&mut word) {
            let forced = self.shapes[word.offset].is_newline && word.offset != line_opener;
            let wraps = self.params.linebreak == LinebreakMode::WordWrap
                && words_on_line > 0
                && !self.shapes[word.offset].is_newline
                && word.trailing_edge() > inline_end;

            if forced || wraps {
                let mut line_start = word.offset;
                let lead = &self.shapes[line_start];
                if wraps && lead.is_word_breaker && word.length > 1 {
                    // The breaker ends the line it follows; the new line
                    // starts flush with the word after it.
                    if !self.emit_glyph(lead, word.old_caret_pos, block, out, &mut output) {
                        return output;
                    }
                    line_start += 1;
                }
                line_height = self.find_line_max_height(line_start);
                block += block_sign * line_height;
                output.line_count += 1;
                words_on_line = 0;
                line_opener = line_start;
                // Re-measure the word from the new line's caret.
                word = Word::at(line_start, self.find_caret_start(line_start));
                continue;
            }

            let mut pen = word.old_caret_pos;
            for glyph in &self.shapes[word.offset..word.offset + word.length] {
                if !self.emit_glyph(glyph, pen, block, out, &mut output) {
                    return output;
                }
                pen += self.inline_advance(glyph);
            }

            output.placed_words += 1;
            words_on_line += 1;
        }

        log::debug!(
            "laid out {} glyphs into {} lines ({} vertices)",
            self.shapes.len(),
            output.line_count,
            output.vertex_count
        );
        output
    }

    // ---------------------------------------------------------------
    // Internal helpers
    // ---------------------------------------------------------------

    fn inline_bounds(&self) -> (f32, f32) {
        let bounds = &self.params.bounds;
        if self.params.flow.is_vertical() {
            (bounds.min.y, bounds.max.y)
        } else {
            (bounds.min.x, bounds.max.x)
        }
    }

    /// Where the first line sits on the block axis and which way lines go.
    fn block_origin(&self) -> (f32, f32) {
        let bounds = &self.params.bounds;
        match self.params.flow {
            TextFlow::Horizontal => (bounds.min.y, 1.0),
            TextFlow::VerticalRtl => (bounds.max.x, -1.0),
            TextFlow::VerticalLtr => (bounds.min.x, 1.0),
        }
    }

    /// Horizontal lines hang from the baseline; vertical columns are
    /// centred on the caret.
    fn first_line_offset(&self, line_height: f32) -> f32 {
        if self.params.flow.is_vertical() {
            line_height * 0.5
        } else {
            line_height
        }
    }

    fn point(&self, inline: f32, block: f32) -> Vec2 {
        if self.params.flow.is_vertical() {
            Vec2::new(block, inline)
        } else {
            Vec2::new(inline, block)
        }
    }

    fn inline_advance(&self, glyph: &ShapedGlyph) -> f32 {
        let advance = if self.params.flow.is_vertical() {
            glyph.advance.y
        } else {
            glyph.advance.x
        };
        advance * self.params.scale
    }

    fn ink_extent(&self, glyph: &ShapedGlyph) -> f32 {
        let Some(cached) = self.cache.get(glyph.glyph) else {
            return 0.0;
        };
        if glyph.is_newline || cached.size_bytes() == 0 {
            return 0.0;
        }
        let extent = if self.params.flow.is_vertical() {
            glyph.offset.y - cached.bearing_y as f32 + cached.height as f32
        } else {
            glyph.offset.x + cached.bearing_x as f32 + cached.width as f32
        };
        extent * self.params.scale
    }

    /// Append the quad for `glyph` if it has ink. Returns `false` (and
    /// marks the output truncated) when `out` is full.
    fn emit_glyph(
        &self,
        glyph: &ShapedGlyph,
        pen: f32,
        block: f32,
        out: &mut [GlyphVertex],
        output: &mut LayoutOutput,
    ) -> bool {
        if glyph.is_newline {
            return true;
        }
        let Some(cached) = self.cache.get(glyph.glyph) else {
            return true;
        };
        if cached.size_bytes() == 0 {
            return true;
        }
        let end = output.vertex_count + VERTICES_PER_GLYPH;
        let Some(slot) = out.get_mut(output.vertex_count..end) else {
            output.truncated = true;
            return false;
        };
        slot.copy_from_slice(&self.glyph_quad(glyph, cached, pen, block));
        output.vertex_count = end;
        true
    }

    fn glyph_quad(
        &self,
        glyph: &ShapedGlyph,
        cached: &CachedGlyph,
        pen: f32,
        block: f32,
    ) -> [GlyphVertex; 6] {
        let scale = self.params.scale;
        let bearing = Vec2::new(cached.bearing_x as f32, -(cached.bearing_y as f32));
        let top_left = self.point(pen, block) + (glyph.offset + bearing) * scale;
        let bottom_right =
            top_left + Vec2::new(cached.width as f32, cached.height as f32) * scale;

        GlyphVertex::quad(
            top_left,
            bottom_right,
            &self.params.clip,
            QuadSource {
                atlas_offset: cached.atlas_offset as u32,
                glyph_size: [cached.width, cached.height],
                color: glyph_color(&self.params.color, self.params.color_mode, glyph.is_rtl),
            },
        )
    }
}

/// Vertices needed to lay out `shapes` without truncation.
pub fn required_vertex_count(shapes: &[ShapedGlyph], cache: &GlyphCache) -> usize {
    shapes
        .iter()
        .filter(|glyph| !glyph.is_newline)
        .filter_map(|glyph| cache.get(glyph.glyph))
        .filter(|cached| cached.size_bytes() > 0)
        .count()
        * VERTICES_PER_GLYPH
}

/// 8-bit RGBA for one glyph.
pub fn glyph_color(color: &[f32; 4], mode: ColorMode, is_rtl: bool) -> [u8; 4] {
    let channel = |value: f32, range: f32| (value.clamp(0.0, 1.0) * range + 0.5) as u8;
    let [r, g, b, a] = *color;
    match mode {
        ColorMode::LegacyDirectional if !is_rtl => [
            channel(r, 255.0),
            channel(g, 128.0),
            channel(b, 128.0),
            channel(a, 255.0),
        ],
        _ => [
            channel(r, 255.0),
            channel(g, 255.0),
            channel(b, 255.0),
            channel(a, 255.0),
        ],
    }
}

// ===================================================================
// Tests
// ===================================================================
