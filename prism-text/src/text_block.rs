//! Multi-state text block.
//!
//! A widget label carries one string per interaction state. States whose
//! text and formatting match share one shaped sequence: the second state
//! copies the first one's glyphs and takes its own cache references instead
//! of shaping again.

use std::mem;

use crate::bidi::ParagraphDirection;
use crate::error::AtlasError;
use crate::glyph_cache::{GlyphCache, Rasterizer};
use crate::layout::{
    required_vertex_count, LayoutOutput, LayoutParams, TextFlow, TextHorizAlignment, TextLayout,
};
use crate::rich_text::{validate_rich_text, RichTextRun};
use crate::shaper_manager::{RunDirection, ShaperManager, VertReadingDir};
use crate::shaping::{ShapedGlyph, ShapingEngine};
use crate::vertex::GlyphVertex;

/// Interaction state a string belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextState {
    Disabled,
    Idle,
    HighlightedCursor,
    HighlightedButton,
    HighlightedButtonAndCursor,
    Pressed,
}

impl TextState {
    pub const ALL: [TextState; 6] = [
        TextState::Disabled,
        TextState::Idle,
        TextState::HighlightedCursor,
        TextState::HighlightedButton,
        TextState::HighlightedButtonAndCursor,
        TextState::Pressed,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Clone, Debug)]
struct StateText {
    text: String,
    runs: Vec<RichTextRun>,
    /// Runs came from `set_rich_text` rather than validation defaults.
    explicit_runs: bool,
    glyphs: Vec<ShapedGlyph>,
    direction: RunDirection,
    dirty: bool,
}

impl Default for StateText {
    fn default() -> Self {
        Self {
            text: String::new(),
            runs: Vec::new(),
            explicit_runs: false,
            glyphs: Vec::new(),
            direction: RunDirection::Ltr,
            dirty: true,
        }
    }
}

/// Text, formatting and shaped glyphs for every [`TextState`].
///
/// Glyph references are released through [`TextBlock::release_glyphs`];
/// dropping a block without it leaves its glyphs counted in the cache.
/// Copies go through [`TextBlock::clone_shared`] so every copy holds its
/// own references.
#[derive(Debug, Default)]
pub struct TextBlock {
    states: [StateText; 6],
    vertical: VertReadingDir,
}

impl TextBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the string of one state, or of all states when `state` is `None`.
    ///
    /// A new string drops the state's formatting runs; set them again with
    /// [`TextBlock::set_rich_text`] afterwards.
    pub fn set_text(&mut self, text: &str, state: Option<TextState>) {
        for index in Self::indices(state) {
            let entry = &mut self.states[index];
            if entry.text == text {
                continue;
            }
            entry.text.clear();
            entry.text.push_str(text);
            entry.runs.clear();
            entry.explicit_runs = false;
            entry.dirty = true;
        }
    }

    /// Set the formatting runs of one state, or of all states.
    ///
    /// An empty list goes back to a single default run.
    pub fn set_rich_text(&mut self, runs: &[RichTextRun], state: Option<TextState>) {
        for index in Self::indices(state) {
            let entry = &mut self.states[index];
            if entry.explicit_runs && entry.runs == runs {
                continue;
            }
            entry.runs.clear();
            entry.runs.extend_from_slice(runs);
            entry.explicit_runs = !runs.is_empty();
            entry.dirty = true;
        }
    }

    pub fn set_vertical_reading_dir(&mut self, vertical: VertReadingDir) {
        if self.vertical != vertical {
            self.vertical = vertical;
            for entry in &mut self.states {
                entry.dirty = true;
            }
        }
    }

    pub fn vertical_reading_dir(&self) -> VertReadingDir {
        self.vertical
    }

    pub fn text(&self, state: TextState) -> &str {
        &self.states[state.index()].text
    }

    pub fn rich_text(&self, state: TextState) -> &[RichTextRun] {
        &self.states[state.index()].runs
    }

    pub fn glyphs(&self, state: TextState) -> &[ShapedGlyph] {
        &self.states[state.index()].glyphs
    }

    /// Combined direction of the state's runs as of the last update.
    pub fn direction(&self, state: TextState) -> RunDirection {
        self.states[state.index()].direction
    }

    pub fn is_dirty(&self, state: TextState) -> bool {
        self.states[state.index()].dirty
    }

    /// Re-shape every dirty state.
    ///
    /// Returns whether any state now has more glyphs than before, in which
    /// case the caller's vertex buffer may need to grow.
    pub fn update_dirty_glyphs<B: ShapingEngine + Rasterizer>(
        &mut self,
        manager: &mut ShaperManager<B>,
    ) -> Result<bool, AtlasError> {
        let log = manager.log().clone();
        let vertical = self.vertical;
        let fallback = RunDirection::from(manager.config().default_direction.fallback());
        let mut grew = false;

        for index in 0..self.states.len() {
            if !self.states[index].dirty {
                continue;
            }

            let old = mem::take(&mut self.states[index].glyphs);
            manager.release_glyphs(&old);
            {
                let entry = &mut self.states[index];
                validate_rich_text(&entry.text, &mut entry.runs, &*log);
            }

            let shared = self.find_clean_twin(index).map(|twin| {
                let twin = &self.states[twin];
                (twin.glyphs.clone(), twin.direction)
            });

            let entry = &mut self.states[index];
            match shared {
                Some((glyphs, direction)) => {
                    manager.share_glyphs(&glyphs);
                    entry.glyphs = glyphs;
                    entry.direction = direction;
                }
                None => {
                    let mut glyphs = Vec::new();
                    let mut direction: Option<RunDirection> = None;
                    for run in &entry.runs {
                        match manager.render_run(&entry.text, run, vertical, &mut glyphs) {
                            Ok(run_direction) => {
                                direction =
                                    Some(direction.map_or(run_direction, |d| d.combine(run_direction)));
                            }
                            Err(err) => {
                                manager.release_glyphs(&glyphs);
                                return Err(err);
                            }
                        }
                    }
                    entry.glyphs = glyphs;
                    entry.direction = direction.unwrap_or(fallback);
                }
            }

            entry.dirty = false;
            grew |= entry.glyphs.len() > old.len();
        }

        Ok(grew)
    }

    /// What `Natural` alignment means for `state`.
    pub fn resolved_alignment(
        &self,
        state: TextState,
        default_direction: ParagraphDirection,
    ) -> TextHorizAlignment {
        let direction = match self.direction(state) {
            RunDirection::Mixed => RunDirection::from(default_direction.fallback()),
            direction => direction,
        };
        match direction {
            RunDirection::Rtl => TextHorizAlignment::Right,
            _ => TextHorizAlignment::Left,
        }
    }

    /// Line flow implied by the vertical reading policy.
    pub fn layout_flow<B: ShapingEngine + Rasterizer>(&self, manager: &ShaperManager<B>) -> TextFlow {
        if !manager.uses_vertical(self.vertical) {
            TextFlow::Horizontal
        } else if self.vertical == VertReadingDir::ForceTtbLtr {
            TextFlow::VerticalLtr
        } else {
            TextFlow::VerticalRtl
        }
    }

    /// Vertex count for the state with the most visible glyphs.
    pub fn required_vertex_count(&self, cache: &GlyphCache) -> usize {
        self.states
            .iter()
            .map(|entry| required_vertex_count(&entry.glyphs, cache))
            .max()
            .unwrap_or(0)
    }

    /// Lay out `state` into `out`, resolving `Natural` alignment and the
    /// line flow from this block.
    pub fn fill_vertices<B: ShapingEngine + Rasterizer>(
        &self,
        state: TextState,
        manager: &ShaperManager<B>,
        params: &LayoutParams,
        out: &mut [GlyphVertex],
    ) -> LayoutOutput {
        let mut params = *params;
        if params.alignment == TextHorizAlignment::Natural {
            params.alignment = self.resolved_alignment(state, manager.config().default_direction);
        }
        params.flow = self.layout_flow(manager);

        TextLayout::new(self.glyphs(state), manager.cache(), &params).fill_vertices(out)
    }

    /// Copy this block, taking a cache reference for every copied glyph.
    pub fn clone_shared<B: ShapingEngine + Rasterizer>(&self, manager: &mut ShaperManager<B>) -> Self {
        let copy = Self {
            states: self.states.clone(),
            vertical: self.vertical,
        };
        for entry in &copy.states {
            manager.share_glyphs(&entry.glyphs);
        }
        copy
    }

    /// Give back every state's glyph references and mark them dirty.
    pub fn release_glyphs<B: ShapingEngine + Rasterizer>(&mut self, manager: &mut ShaperManager<B>) {
        for entry in &mut self.states {
            let glyphs = mem::take(&mut entry.glyphs);
            manager.release_glyphs(&glyphs);
            entry.dirty = true;
        }
    }

    // ---------------------------------------------------------------
    // Internal helpers
    // ---------------------------------------------------------------

    fn indices(state: Option<TextState>) -> Vec<usize> {
        match state {
            Some(state) => vec![state.index()],
            None => (0..TextState::ALL.len()).collect(),
        }
    }

    /// A clean state with the same text and runs as `index`.
    fn find_clean_twin(&self, index: usize) -> Option<usize> {
        let target = &self.states[index];
        self.states
            .iter()
            .enumerate()
            .find(|(other, entry)| {
                *other != index
                    && !entry.dirty
                    && entry.text == target.text
                    && entry.runs == target.runs
            })
            .map(|(other, _)| other)
    }
}

// ===================================================================
// Tests
// ===================================================================
