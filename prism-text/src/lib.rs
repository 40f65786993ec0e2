//! # prism-text
//!
//! Text shaping and glyph caching core for a GPU-rendered UI. Turns a
//! UTF-8 string plus rich-text runs into positioned glyph quads, while
//! keeping every rasterized glyph in a single reference-counted atlas.
//!
//! ## Architecture
//!
//! ```text
//! text + RichTextRun[] ──► ShaperManager::render_run
//!                              │  bidi ─► shape ─► GlyphCache::acquire
//!                              ▼                         │
//!                        ShapedGlyph[]                   ▼
//!                              │                  AtlasAllocator
//!                              ▼                         │
//!                 TextLayout::fill_vertices       take_pending_upload
//!                              │                         │
//!                              ▼                         ▼
//!                     caller's GlyphVertex[]    dirty atlas ranges
//! ```
//!
//! - **`atlas`**: best-fit byte allocator over one growable buffer.
//! - **`glyph_cache`**: ref-counted rasterized glyphs, generational handles.
//! - **`bidi`** / **`shaping`**: external collaborator interfaces.
//! - **`shaper_manager`**: per-run bidi segmentation and shaping.
//! - **`layout`**: word wrap, alignment, quad emission.
//! - **`text_block`**: per-state strings sharing shaped sequences.
//! - **`cosmic`**: `cosmic-text` backed shaping engine and rasterizer.

pub mod atlas;
pub mod bidi;
pub mod cosmic;
pub mod diagnostics;
pub mod error;
pub mod glyph_cache;
pub mod layout;
pub mod rich_text;
pub mod shaper_manager;
pub mod shaping;
pub mod text_block;
pub mod vertex;

// Re-exports for ergonomic use.
pub use atlas::{AtlasAllocator, AtlasConfig, AtlasRange};
pub use bidi::{BidiAnalyzer, BidiDirection, ParagraphDirection, UnicodeBidiAnalyzer, VisualRun};
pub use cosmic::CosmicBackend;
pub use diagnostics::{default_listener, LogCrateListener, LogListener, LogSeverity, SharedLogListener};
pub use error::{AtlasError, BackendError};
pub use glyph_cache::{
    AtlasUpload, CachedGlyph, FontId, GlyphCache, GlyphHandle, GlyphKey, RasterizedGlyph, Rasterizer,
};
pub use layout::{
    required_vertex_count, ColorMode, LayoutOutput, LayoutParams, LinebreakMode, TextFlow,
    TextHorizAlignment, TextLayout, Word,
};
pub use rich_text::{validate_rich_text, HorizReadingDir, RichTextRun, DEFAULT_PT_SIZE};
pub use shaper_manager::{RunDirection, ShaperConfig, ShaperManager, VertReadingDir};
pub use shaping::{ShapeDirection, ShapedCluster, ShapedGlyph, ShapingEngine};
pub use text_block::{TextBlock, TextState};
pub use vertex::{GlyphVertex, Rect, VERTICES_PER_GLYPH};
