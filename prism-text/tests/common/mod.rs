//! Deterministic collaborators shared by the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec2;
use prism_text::{
    BackendError, FontId, GlyphKey, LogListener, LogSeverity, RasterizedGlyph, Rasterizer,
    ShapeDirection, ShapedCluster, ShaperConfig, ShaperManager, ShapingEngine,
};

/// Monospace font: every char advances 10px and inks an 8x10 box.
/// Whitespace and line separators have no ink. Line height is 10px.
#[derive(Default)]
pub struct MockBackend {
    pub shape_calls: usize,
    pub raster_calls: usize,
    pub current: (FontId, u32),
}

impl ShapingEngine for MockBackend {
    fn set_font_size(&mut self, font: FontId, pt_size: u32) {
        self.current = (font, pt_size);
    }

    fn shape(&mut self, text: &str, direction: ShapeDirection) -> Vec<ShapedCluster> {
        self.shape_calls += 1;
        let mut clusters: Vec<ShapedCluster> = text
            .char_indices()
            .map(|(cluster, c)| {
                let advance = if prism_text::shaping::is_newline(c) {
                    Vec2::ZERO
                } else if direction == ShapeDirection::Ttb {
                    Vec2::new(0.0, 10.0)
                } else {
                    Vec2::new(10.0, 0.0)
                };
                ShapedCluster {
                    codepoint: c as u32,
                    cluster,
                    advance,
                    offset: Vec2::ZERO,
                }
            })
            .collect();
        if direction == ShapeDirection::Rtl {
            clusters.reverse();
        }
        clusters
    }
}

impl Rasterizer for MockBackend {
    fn rasterize(&mut self, key: GlyphKey) -> Result<RasterizedGlyph, BackendError> {
        self.raster_calls += 1;
        let Some(c) = char::from_u32(key.codepoint) else {
            return Err(BackendError::new("Mock", 3, "not a char"));
        };
        if c.is_whitespace() {
            return Ok(RasterizedGlyph::empty(10.0));
        }
        Ok(RasterizedGlyph {
            bitmap: vec![key.codepoint as u8; 80],
            width: 8,
            height: 10,
            bearing_x: 0,
            bearing_y: 10,
            newline_size: 10.0,
        })
    }
}

/// Collects every diagnostic.
#[derive(Default)]
pub struct RecordingListener {
    pub entries: RefCell<Vec<(String, LogSeverity)>>,
}

impl RecordingListener {
    pub fn warnings(&self) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|(_, severity)| *severity == LogSeverity::Warning)
            .count()
    }
}

impl LogListener for RecordingListener {
    fn log(&self, message: &str, severity: LogSeverity) {
        self.entries.borrow_mut().push((message.to_owned(), severity));
    }
}

pub fn manager_with(config: ShaperConfig) -> (ShaperManager<MockBackend>, Rc<RecordingListener>) {
    let log = Rc::new(RecordingListener::default());
    let manager = ShaperManager::new(MockBackend::default(), config, log.clone());
    (manager, log)
}

pub fn manager() -> (ShaperManager<MockBackend>, Rc<RecordingListener>) {
    manager_with(ShaperConfig::default())
}
