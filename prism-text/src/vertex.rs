//! Glyph vertex format written by the layout engine.
//!
//! `GlyphVertex` derives `bytemuck::Pod` + `Zeroable` so the caller can
//! upload the filled buffer with `bytemuck::cast_slice`.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;

/// Vertices emitted per visible glyph (two triangles).
pub const VERTICES_PER_GLYPH: usize = 6;

/// Axis-aligned rectangle in pixels, y pointing down.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    pub fn from_size(size: Vec2) -> Self {
        Self::new(Vec2::ZERO, size)
    }

    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    /// A rectangle that clips nothing.
    pub fn unbounded() -> Self {
        Self::new(Vec2::splat(f32::MIN), Vec2::splat(f32::MAX))
    }
}

/// One vertex of a glyph quad.
///
/// 40 bytes, no padding.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GlyphVertex {
    /// Position in pixels.
    pub position: [f32; 2],
    /// Distance to the clip rect's top, left, right and bottom edges,
    /// normalised by the clip size. Negative means clipped.
    pub clip_distance: [f32; 4],
    /// Byte offset of the glyph bitmap in the atlas.
    pub atlas_offset: u32,
    /// Bitmap width and height in texels.
    pub glyph_size: [u16; 2],
    /// Texel coordinate of this corner inside the bitmap.
    pub glyph_uv: [u16; 2],
    /// RGBA.
    pub color: [u8; 4],
}

/// Per-glyph data shared by all six vertices of a quad.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuadSource {
    pub atlas_offset: u32,
    pub glyph_size: [u16; 2],
    pub color: [u8; 4],
}

impl GlyphVertex {
    /// Two triangles covering `top_left..bottom_right`:
    /// TL, BL, BR, BR, TR, TL.
    pub fn quad(top_left: Vec2, bottom_right: Vec2, clip: &Rect, source: QuadSource) -> [Self; 6] {
        let [w, h] = source.glyph_size;
        let corners = [
            (Vec2::new(top_left.x, top_left.y), [0, 0]),
            (Vec2::new(top_left.x, bottom_right.y), [0, h]),
            (Vec2::new(bottom_right.x, bottom_right.y), [w, h]),
            (Vec2::new(bottom_right.x, bottom_right.y), [w, h]),
            (Vec2::new(bottom_right.x, top_left.y), [w, 0]),
            (Vec2::new(top_left.x, top_left.y), [0, 0]),
        ];

        let inv = inverse_size(clip.size());
        corners.map(|(position, glyph_uv)| Self {
            position: position.to_array(),
            clip_distance: [
                (position.y - clip.min.y) * inv.y,
                (position.x - clip.min.x) * inv.x,
                (clip.max.x - position.x) * inv.x,
                (clip.max.y - position.y) * inv.y,
            ],
            atlas_offset: source.atlas_offset,
            glyph_size: source.glyph_size,
            glyph_uv,
            color: source.color,
        })
    }
}

fn inverse_size(size: Vec2) -> Vec2 {
    let inv = |v: f32| if v > 0.0 && v.is_finite() { 1.0 / v } else { 1.0 };
    Vec2::new(inv(size.x), inv(size.y))
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> QuadSource {
        QuadSource {
            atlas_offset: 128,
            glyph_size: [8, 10],
            color: [255, 255, 255, 255],
        }
    }

    #[test]
    fn test_glyph_vertex_is_40_bytes() {
        assert_eq!(std::mem::size_of::<GlyphVertex>(), 40);
        let vertex = GlyphVertex::default();
        assert_eq!(bytemuck::bytes_of(&vertex).len(), 40);
    }

    #[test]
    fn test_quad_corner_order() {
        let clip = Rect::from_size(Vec2::new(100.0, 100.0));
        let quad = GlyphVertex::quad(Vec2::new(10.0, 20.0), Vec2::new(18.0, 30.0), &clip, source());
        let positions: Vec<[f32; 2]> = quad.iter().map(|v| v.position).collect();
        assert_eq!(
            positions,
            vec![
                [10.0, 20.0],
                [10.0, 30.0],
                [18.0, 30.0],
                [18.0, 30.0],
                [18.0, 20.0],
                [10.0, 20.0],
            ]
        );
        assert_eq!(quad[0].glyph_uv, [0, 0]);
        assert_eq!(quad[2].glyph_uv, [8, 10]);
        assert_eq!(quad[4].glyph_uv, [8, 0]);
        assert!(quad.iter().all(|v| v.atlas_offset == 128));
    }

    #[test]
    fn test_clip_distances_are_normalised() {
        let clip = Rect::new(Vec2::new(0.0, 0.0), Vec2::new(200.0, 100.0));
        let quad = GlyphVertex::quad(Vec2::new(50.0, 25.0), Vec2::new(60.0, 35.0), &clip, source());
        let [top, left, right, bottom] = quad[0].clip_distance;
        assert_eq!(top, 0.25);
        assert_eq!(left, 0.25);
        assert_eq!(right, 0.75);
        assert_eq!(bottom, 0.75);
    }

    #[test]
    fn test_outside_clip_is_negative() {
        let clip = Rect::from_size(Vec2::new(100.0, 100.0));
        let quad = GlyphVertex::quad(Vec2::new(95.0, 0.0), Vec2::new(105.0, 10.0), &clip, source());
        // Bottom-right corner sits past the right edge.
        assert!(quad[2].clip_distance[2] < 0.0);
        assert!(quad[0].clip_distance[2] > 0.0);
    }
}
