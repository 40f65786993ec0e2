//! Per-run shaping orchestration.
//!
//! ```text
//! text[run] ──► BidiAnalyzer ──► visual runs (LTR / RTL, visual order)
//!                                     │
//!                                     ▼  one direction each (TTB if forced)
//!                              ShapingEngine::shape
//!                                     │
//!                                     ▼  per cluster
//!                              GlyphCache::acquire ──► Vec<ShapedGlyph>
//! ```
//!
//! The manager owns the glyph cache so every shaped glyph it hands out is
//! backed by a counted cache reference. Callers give those references back
//! through [`ShaperManager::release_glyphs`].

use crate::atlas::AtlasConfig;
use crate::bidi::{BidiAnalyzer, BidiDirection, ParagraphDirection, UnicodeBidiAnalyzer};
use crate::diagnostics::{LogSeverity, SharedLogListener};
use crate::error::AtlasError;
use crate::glyph_cache::{AtlasUpload, GlyphCache, GlyphKey, Rasterizer};
use crate::rich_text::RichTextRun;
use crate::shaping::{is_newline, is_word_breaker, ShapeDirection, ShapedGlyph, ShapingEngine};

/// Vertical reading policy for a text block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum VertReadingDir {
    #[default]
    Disabled,
    /// Top-to-bottom only when the manager is configured to prefer it.
    IfNeededTtb,
    /// Top-to-bottom, columns progressing right to left.
    ForceTtb,
    /// Top-to-bottom, columns progressing left to right.
    ForceTtbLtr,
}

/// Direction actually produced by shaping one or more runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RunDirection {
    Ltr,
    Rtl,
    Mixed,
}

impl RunDirection {
    /// Fold another run's direction into this one.
    pub fn combine(self, other: RunDirection) -> RunDirection {
        if self == other {
            self
        } else {
            RunDirection::Mixed
        }
    }
}

impl From<BidiDirection> for RunDirection {
    fn from(direction: BidiDirection) -> Self {
        match direction {
            BidiDirection::Ltr => RunDirection::Ltr,
            BidiDirection::Rtl => RunDirection::Rtl,
        }
    }
}

/// Immutable shaping configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct ShaperConfig {
    /// Paragraph direction for runs whose reading direction is `Default`.
    pub default_direction: ParagraphDirection,
    /// Honour [`VertReadingDir::IfNeededTtb`].
    pub use_vertical_layout_when_available: bool,
    pub atlas: AtlasConfig,
}

impl Default for ShaperConfig {
    fn default() -> Self {
        Self {
            default_direction: ParagraphDirection::AutoLtr,
            use_vertical_layout_when_available: false,
            atlas: AtlasConfig::default(),
        }
    }
}

/// Turns rich-text runs into shaped glyph sequences.
pub struct ShaperManager<B> {
    backend: B,
    bidi: Box<dyn BidiAnalyzer>,
    cache: GlyphCache,
    config: ShaperConfig,
    log: SharedLogListener,
}

impl<B: ShapingEngine + Rasterizer> ShaperManager<B> {
    /// Create a manager using the `unicode-bidi` analyzer.
    pub fn new(backend: B, config: ShaperConfig, log: SharedLogListener) -> Self {
        Self::with_bidi(backend, Box::new(UnicodeBidiAnalyzer), config, log)
    }

    pub fn with_bidi(
        backend: B,
        bidi: Box<dyn BidiAnalyzer>,
        config: ShaperConfig,
        log: SharedLogListener,
    ) -> Self {
        let cache = GlyphCache::new(&config.atlas, log.clone());
        Self {
            backend,
            bidi,
            cache,
            config,
            log,
        }
    }

    pub fn config(&self) -> &ShaperConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn cache(&self) -> &GlyphCache {
        &self.cache
    }

    pub fn log(&self) -> &SharedLogListener {
        &self.log
    }

    /// Whether `vertical` results in top-to-bottom shaping.
    pub fn uses_vertical(&self, vertical: VertReadingDir) -> bool {
        match vertical {
            VertReadingDir::Disabled => false,
            VertReadingDir::IfNeededTtb => self.config.use_vertical_layout_when_available,
            VertReadingDir::ForceTtb | VertReadingDir::ForceTtbLtr => true,
        }
    }

    /// Shape `text[run]` and append the glyphs to `out` in visual order.
    ///
    /// A bidi failure is logged and the run contributes nothing. On atlas
    /// exhaustion every glyph acquired by this call is released and `out`
    /// is restored to its previous length.
    pub fn render_run(
        &mut self,
        text: &str,
        run: &RichTextRun,
        vertical: VertReadingDir,
        out: &mut Vec<ShapedGlyph>,
    ) -> Result<RunDirection, AtlasError> {
        let paragraph = run.reading_dir.resolve(self.config.default_direction);
        let fallback = RunDirection::from(paragraph.fallback());

        let Some(substring) = text.get(run.offset..run.end()) else {
            self.log.log(
                &format!(
                    "[ShaperManager::render_run] run {}..{} does not fit the string. String: {text}",
                    run.offset,
                    run.end()
                ),
                LogSeverity::Warning,
            );
            return Ok(fallback);
        };

        let visual_runs = match self.bidi.visual_runs(substring, paragraph) {
            Ok(runs) => runs,
            Err(err) => {
                self.log.log(
                    &format!(
                        "[{} error] Could not process string: {substring} errorCode: {} Desc: {}",
                        err.library, err.code, err.description
                    ),
                    LogSeverity::Warning,
                );
                return Ok(fallback);
            }
        };

        let vertical = self.uses_vertical(vertical);
        let first_new = out.len();
        let mut actual: Option<RunDirection> = None;

        for visual in &visual_runs {
            let Some(span) = substring.get(visual.range()) else {
                continue;
            };
            let direction = match (vertical, visual.direction) {
                (true, _) => ShapeDirection::Ttb,
                (false, BidiDirection::Ltr) => ShapeDirection::Ltr,
                (false, BidiDirection::Rtl) => ShapeDirection::Rtl,
            };
            let is_rtl = visual.direction == BidiDirection::Rtl;

            self.backend.set_font_size(run.font, run.pt_size);
            let clusters = self.backend.shape(span, direction);

            for cluster in clusters {
                let source = span.get(cluster.cluster..).and_then(|s| s.chars().next());
                let key = GlyphKey {
                    font: run.font,
                    codepoint: cluster.codepoint,
                    pt_size: run.pt_size,
                };
                let glyph = match self.cache.acquire(&mut self.backend, key) {
                    Ok(glyph) => glyph,
                    Err(err) => {
                        self.release_glyphs(&out[first_new..]);
                        out.truncate(first_new);
                        self.forget_evicted();
                        return Err(err);
                    }
                };
                out.push(ShapedGlyph {
                    glyph,
                    advance: cluster.advance,
                    offset: cluster.offset,
                    is_rtl,
                    is_newline: source.is_some_and(is_newline),
                    is_word_breaker: source.is_some_and(is_word_breaker),
                });
            }

            let direction = RunDirection::from(visual.direction);
            actual = Some(actual.map_or(direction, |a| a.combine(direction)));
        }

        self.forget_evicted();
        Ok(actual.unwrap_or(fallback))
    }

    /// Give back one reference per glyph.
    pub fn release_glyphs(&mut self, glyphs: &[ShapedGlyph]) {
        for glyph in glyphs {
            self.cache.release(glyph.glyph);
        }
    }

    /// Take one extra reference per glyph, for a sequence copied verbatim.
    pub fn share_glyphs(&mut self, glyphs: &[ShapedGlyph]) {
        for glyph in glyphs {
            self.cache.add_ref(glyph.glyph);
        }
    }

    pub fn flush_released_glyphs(&mut self) -> usize {
        let flushed = self.cache.flush_released_glyphs();
        self.forget_evicted();
        flushed
    }

    /// Dirty atlas ranges the caller must upload before drawing.
    pub fn take_pending_upload(&mut self) -> AtlasUpload {
        self.cache.take_pending_upload()
    }

    // ---------------------------------------------------------------
    // Internal helpers
    // ---------------------------------------------------------------

    /// Tell the backend about deleted glyphs. A key that was stolen and
    /// rasterized again within the same call is still resident and kept.
    fn forget_evicted(&mut self) {
        for key in self.cache.take_evicted() {
            if self.cache.find(key).is_none() {
                self.backend.forget(key);
            }
        }
    }
}

// ===================================================================
// Tests
// ===================================================================
