use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use glam::Vec2;
use prism_text::{
    default_listener, AtlasAllocator, AtlasConfig, BackendError, CosmicBackend, FontId, GlyphVertex,
    GlyphKey, LayoutParams, RasterizedGlyph, Rasterizer, Rect, RichTextRun, ShapeDirection,
    ShapedCluster, ShapedGlyph, ShaperConfig, ShaperManager, ShapingEngine, TextLayout,
    VertReadingDir,
};

const PARAGRAPH: &str = "The quick brown fox jumps over the lazy dog. \
    Lorem ipsum dolor sit amet, consectetur adipiscing elit. \
    Sed do eiusmod tempor incididunt ut labore et dolore magna aliqua.";

/// Fixed-advance backend so the numbers measure this crate, not a font stack.
struct FixedBackend;

impl ShapingEngine for FixedBackend {
    fn set_font_size(&mut self, _font: FontId, _pt_size: u32) {}

    fn shape(&mut self, text: &str, _direction: ShapeDirection) -> Vec<ShapedCluster> {
        text.char_indices()
            .map(|(cluster, c)| ShapedCluster {
                codepoint: c as u32,
                cluster,
                advance: Vec2::new(9.0, 0.0),
                offset: Vec2::ZERO,
            })
            .collect()
    }
}

impl Rasterizer for FixedBackend {
    fn rasterize(&mut self, key: GlyphKey) -> Result<RasterizedGlyph, BackendError> {
        let size = 6 + (key.codepoint % 8) as u16;
        Ok(RasterizedGlyph {
            bitmap: vec![200; size as usize * size as usize],
            width: size,
            height: size,
            bearing_x: 0,
            bearing_y: size as i32,
            newline_size: 14.0,
        })
    }
}

fn fixed_manager() -> ShaperManager<FixedBackend> {
    ShaperManager::new(FixedBackend, ShaperConfig::default(), default_listener())
}

fn shape(manager: &mut ShaperManager<impl ShapingEngine + Rasterizer>, text: &str) -> Vec<ShapedGlyph> {
    let mut glyphs = Vec::new();
    let _ = manager.render_run(text, &RichTextRun::whole(text), VertReadingDir::Disabled, &mut glyphs);
    glyphs
}

fn bench_atlas_churn(c: &mut Criterion) {
    c.bench_function("atlas_allocate_free_churn", |b| {
        let mut atlas = AtlasAllocator::new(&AtlasConfig::default());
        let mut live: Vec<(usize, usize)> = Vec::with_capacity(64);
        let mut seed = 1u32;
        b.iter(|| {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            if live.len() < 64 && seed % 3 != 0 {
                let size = 16 + (seed >> 16) as usize % 240;
                if let Ok(offset) = atlas.allocate(black_box(size)) {
                    live.push((offset, size));
                }
            } else if !live.is_empty() {
                let (offset, size) = live.swap_remove((seed >> 8) as usize % live.len());
                atlas.free(offset, size);
            }
        });
    });
}

fn bench_cache_hit(c: &mut Criterion) {
    let mut manager = fixed_manager();
    let warm = shape(&mut manager, PARAGRAPH);

    c.bench_function("shape_paragraph_cached", |b| {
        b.iter(|| {
            let glyphs = shape(&mut manager, black_box(PARAGRAPH));
            manager.release_glyphs(&glyphs);
        });
    });

    manager.release_glyphs(&warm);
}

fn bench_layout_paragraph(c: &mut Criterion) {
    let mut manager = fixed_manager();
    let glyphs = shape(&mut manager, PARAGRAPH);
    let params = LayoutParams {
        bounds: Rect::from_size(Vec2::new(400.0, 400.0)),
        ..Default::default()
    };
    let mut out = vec![GlyphVertex::default(); prism_text::required_vertex_count(&glyphs, manager.cache())];

    c.bench_function("layout_paragraph_400px", |b| {
        b.iter(|| {
            TextLayout::new(black_box(&glyphs), manager.cache(), &params).fill_vertices(&mut out)
        });
    });
}

fn bench_cosmic_shape_short_text(c: &mut Criterion) {
    let mut manager = ShaperManager::new(
        CosmicBackend::default(),
        ShaperConfig::default(),
        default_listener(),
    );

    c.bench_function("cosmic_shape_short_text", |b| {
        b.iter(|| {
            let glyphs = shape(&mut manager, black_box("Hello, Prism!"));
            manager.release_glyphs(&glyphs);
        });
    });
}

criterion_group!(
    benches,
    bench_atlas_churn,
    bench_cache_hit,
    bench_layout_paragraph,
    bench_cosmic_shape_short_text,
);
criterion_main!(benches);
