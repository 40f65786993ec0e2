//! Shaping engine and rasterizer backed by `cosmic-text`.
//!
//! `FontSystem` does font discovery and shaping, `SwashCache` rasterizes.
//! Each `shape` call lays out the span in an unbounded `Buffer` (so
//! cosmic-text never wraps) and reports the glyphs in visual order.
//!
//! Glyph ids are only unique per font face, and cosmic-text may fall back
//! to another face for any glyph. The backend therefore hands out its own
//! ids: every `(face, glyph id)` pair seen while shaping is interned, and
//! the interned id is what the glyph cache keys on. Both tables are pruned
//! as the glyph cache deletes entries, so they track what is resident.

use std::collections::hash_map::Entry;

use cosmic_text::{
    fontdb, Attrs, Buffer, CacheKey, Family, FontSystem, LayoutGlyph, Metrics, Shaping, SwashCache,
    SwashContent,
};
use glam::Vec2;
use rustc_hash::FxHashMap;

use crate::error::BackendError;
use crate::glyph_cache::{FontId, GlyphKey, RasterizedGlyph, Rasterizer};
use crate::shaping::{is_newline, ShapeDirection, ShapedCluster, ShapingEngine};

/// Glyph id reported for line separators. Rasterizes to an empty glyph.
pub const NEWLINE_GLYPH: u32 = u32::MAX;

const LIBRARY: &str = "cosmic-text";

struct RecordedGlyph {
    cache_key: CacheKey,
    line_height: f32,
}

struct InternedGlyph {
    id: u32,
    /// Recorded keys using this id.
    uses: usize,
}

/// [`ShapingEngine`] + [`Rasterizer`] over system fonts.
pub struct CosmicBackend {
    font_system: FontSystem,
    swash_cache: SwashCache,
    /// CSS-like family per [`FontId`].
    families: Vec<String>,
    current: (FontId, u32),
    glyph_ids: FxHashMap<(fontdb::ID, u16), InternedGlyph>,
    next_glyph_id: u32,
    recorded: FxHashMap<GlyphKey, RecordedGlyph>,
}

impl CosmicBackend {
    /// Create a backend with system font discovery.
    ///
    /// `families[i]` is the family used for `FontId` `i`; an empty table
    /// maps every id to `sans-serif`.
    pub fn new(families: Vec<String>) -> Self {
        Self::with_font_system(FontSystem::new(), families)
    }

    pub fn with_font_system(font_system: FontSystem, families: Vec<String>) -> Self {
        Self {
            font_system,
            swash_cache: SwashCache::new(),
            families,
            current: (0, crate::rich_text::DEFAULT_PT_SIZE),
            glyph_ids: FxHashMap::default(),
            next_glyph_id: 0,
            recorded: FxHashMap::default(),
        }
    }

    pub fn font_system(&self) -> &FontSystem {
        &self.font_system
    }

    pub fn font_system_mut(&mut self) -> &mut FontSystem {
        &mut self.font_system
    }

    /// Register a family and return its id.
    pub fn add_family(&mut self, family: impl Into<String>) -> FontId {
        self.families.push(family.into());
        (self.families.len() - 1) as FontId
    }

    /// Glyphs the backend currently holds shaping data for.
    pub fn recorded_glyph_count(&self) -> usize {
        self.recorded.len()
    }

    fn family_name(&self, font: FontId) -> String {
        self.families
            .get(font as usize)
            .cloned()
            .unwrap_or_else(|| String::from("sans-serif"))
    }

    fn shape_segment(
        &mut self,
        segment: &str,
        base: usize,
        direction: ShapeDirection,
        family: &str,
        out: &mut Vec<ShapedCluster>,
    ) {
        if segment.is_empty() {
            return;
        }

        let (font, pt_size) = self.current;
        let metrics = pixel_metrics(pt_size);
        let attrs = Attrs::new().family(family_for(family));

        let mut buffer = Buffer::new(&mut self.font_system, metrics);
        buffer.set_size(&mut self.font_system, None, None);
        buffer.set_text(&mut self.font_system, segment, attrs, Shaping::Advanced);
        buffer.shape_until_scroll(&mut self.font_system, false);

        struct Placed {
            x: f32,
            start: usize,
            width: f32,
            offset: Vec2,
            ascent: f32,
            cache_key: CacheKey,
        }

        let mut placed = Vec::new();
        for run in buffer.layout_runs() {
            let ascent = run.line_y - run.line_top;
            for glyph in run.glyphs.iter() {
                placed.push(Placed {
                    x: glyph.x,
                    start: glyph.start,
                    width: glyph.w,
                    offset: Vec2::new(
                        glyph.x_offset * glyph.font_size,
                        -glyph.y_offset * glyph.font_size,
                    ),
                    ascent,
                    cache_key: origin_cache_key(glyph),
                });
            }
        }
        placed.sort_by(|a, b| a.x.total_cmp(&b.x));

        for glyph in placed {
            let codepoint = self.record(
                font,
                pt_size,
                RecordedGlyph {
                    cache_key: glyph.cache_key,
                    line_height: metrics.line_height,
                },
            );

            let (advance, offset) = match direction {
                ShapeDirection::Ttb => (
                    Vec2::new(0.0, metrics.line_height),
                    Vec2::new(-glyph.width * 0.5, glyph.ascent),
                ),
                ShapeDirection::Ltr | ShapeDirection::Rtl => {
                    (Vec2::new(glyph.width, 0.0), glyph.offset)
                }
            };
            out.push(ShapedCluster {
                codepoint,
                cluster: base + glyph.start,
                advance,
                offset,
            });
        }
    }

    /// Intern the glyph's face and id and remember how to rasterize it.
    /// Returns the interned id.
    fn record(&mut self, font: FontId, pt_size: u32, glyph: RecordedGlyph) -> u32 {
        let face_glyph = (glyph.cache_key.font_id, glyph.cache_key.glyph_id);
        let id = match self.glyph_ids.get(&face_glyph) {
            Some(interned) => interned.id,
            None => {
                let id = self.next_glyph_id;
                // Skip the newline id on wrap-around.
                self.next_glyph_id = self.next_glyph_id.wrapping_add(1) % NEWLINE_GLYPH;
                self.glyph_ids.insert(face_glyph, InternedGlyph { id, uses: 0 });
                id
            }
        };

        let key = GlyphKey {
            font,
            codepoint: id,
            pt_size,
        };
        if let Entry::Vacant(slot) = self.recorded.entry(key) {
            slot.insert(glyph);
            if let Some(interned) = self.glyph_ids.get_mut(&face_glyph) {
                interned.uses += 1;
            }
        }
        id
    }
}

impl Default for CosmicBackend {
    fn default() -> Self {
        Self::new(vec![String::from("sans-serif")])
    }
}

impl ShapingEngine for CosmicBackend {
    fn set_font_size(&mut self, font: FontId, pt_size: u32) {
        self.current = (font, pt_size);
    }

    /// cosmic-text runs its own bidi pass, so `Ltr` and `Rtl` spans are
    /// shaped the same way; the result is sorted into visual order.
    fn shape(&mut self, text: &str, direction: ShapeDirection) -> Vec<ShapedCluster> {
        let family = self.family_name(self.current.0);
        let mut clusters = Vec::new();

        let mut start = 0;
        for (index, c) in text.char_indices() {
            if is_newline(c) {
                self.shape_segment(&text[start..index], start, direction, &family, &mut clusters);
                clusters.push(ShapedCluster {
                    codepoint: NEWLINE_GLYPH,
                    cluster: index,
                    advance: Vec2::ZERO,
                    offset: Vec2::ZERO,
                });
                start = index + c.len_utf8();
            }
        }
        self.shape_segment(&text[start..], start, direction, &family, &mut clusters);
        clusters
    }
}

impl Rasterizer for CosmicBackend {
    fn rasterize(&mut self, key: GlyphKey) -> Result<RasterizedGlyph, BackendError> {
        if key.codepoint == NEWLINE_GLYPH {
            return Ok(RasterizedGlyph::empty(pixel_metrics(key.pt_size).line_height));
        }
        let Some(recorded) = self.recorded.get(&key) else {
            return Err(BackendError::new(
                LIBRARY,
                1,
                "glyph id was not produced by a shape call",
            ));
        };
        let line_height = recorded.line_height;

        let image = match self.swash_cache.get_image(&mut self.font_system, recorded.cache_key) {
            Some(image) => image,
            // Whitespace or a glyph without outlines.
            None => return Ok(RasterizedGlyph::empty(line_height)),
        };

        let too_large = || BackendError::new(LIBRARY, 2, "glyph bitmap exceeds 65535 pixels");
        let width = u16::try_from(image.placement.width).map_err(|_| too_large())?;
        let height = u16::try_from(image.placement.height).map_err(|_| too_large())?;

        let bitmap = match image.content {
            SwashContent::Color => image.data.chunks_exact(4).map(|px| px[3]).collect(),
            SwashContent::SubpixelMask => image
                .data
                .chunks_exact(4)
                .map(|px| px[0].max(px[1]).max(px[2]))
                .collect(),
            _ => image.data.clone(),
        };

        Ok(RasterizedGlyph {
            bitmap,
            width,
            height,
            bearing_x: image.placement.left,
            bearing_y: image.placement.top,
            newline_size: line_height,
        })
    }

    fn forget(&mut self, key: GlyphKey) {
        let Some(recorded) = self.recorded.remove(&key) else {
            return;
        };
        let face_glyph = (recorded.cache_key.font_id, recorded.cache_key.glyph_id);
        if let Some(interned) = self.glyph_ids.get_mut(&face_glyph) {
            interned.uses = interned.uses.saturating_sub(1);
            if interned.uses == 0 {
                self.glyph_ids.remove(&face_glyph);
            }
        }
    }
}

/// Cache key of `glyph` drawn at the origin.
///
/// One key serves every position of the glyph, so the sub-pixel bin is
/// pinned to zero instead of following wherever the glyph was first seen.
fn origin_cache_key(glyph: &LayoutGlyph) -> CacheKey {
    let mut origin = glyph.clone();
    origin.x = 0.0;
    origin.y = 0.0;
    origin.x_offset = 0.0;
    origin.y_offset = 0.0;
    origin.physical((0.0, 0.0), 1.0).cache_key
}

/// Point size (26.6) to pixel metrics, one point per pixel.
fn pixel_metrics(pt_size: u32) -> Metrics {
    let px = (pt_size as f32 / 64.0).max(1.0);
    Metrics::new(px, px)
}

/// Map a CSS-like family (or the first entry of a family chain) to a
/// cosmic-text family.
pub fn family_for(name: &str) -> Family<'_> {
    let first = name
        .split(',')
        .next()
        .unwrap_or(name)
        .trim()
        .trim_matches('"')
        .trim_matches('\'');
    match first {
        "sans-serif" => Family::SansSerif,
        "serif" => Family::Serif,
        "monospace" => Family::Monospace,
        "cursive" => Family::Cursive,
        "fantasy" => Family::Fantasy,
        concrete => Family::Name(concrete),
    }
}

// ===================================================================
// Tests
// ===================================================================
