//! Bidirectional segmentation.
//!
//! Splits a run of text into visual runs, each with a single direction,
//! returned in visual (left-to-right display) order. Offsets are UTF-8 byte
//! offsets into the analysed string.

use std::ops::Range;

use unicode_bidi::{bidi_class, BidiClass, BidiInfo, Level};

use crate::error::BackendError;

/// Resolved direction of a visual run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BidiDirection {
    Ltr,
    Rtl,
}

/// Paragraph base direction handed to the analyzer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParagraphDirection {
    /// First strong character decides; LTR when there is none.
    AutoLtr,
    /// First strong character decides; RTL when there is none.
    AutoRtl,
    Ltr,
    Rtl,
}

impl Default for ParagraphDirection {
    fn default() -> Self {
        Self::AutoLtr
    }
}

impl ParagraphDirection {
    /// Direction used when the text gives no hint of its own.
    pub fn fallback(self) -> BidiDirection {
        match self {
            Self::AutoLtr | Self::Ltr => BidiDirection::Ltr,
            Self::AutoRtl | Self::Rtl => BidiDirection::Rtl,
        }
    }
}

/// A maximal span rendered in one direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VisualRun {
    pub logical_start: usize,
    pub length: usize,
    pub direction: BidiDirection,
}

impl VisualRun {
    pub fn range(&self) -> Range<usize> {
        self.logical_start..self.logical_start + self.length
    }
}

/// External bidi algorithm.
pub trait BidiAnalyzer {
    fn visual_runs(
        &mut self,
        text: &str,
        direction: ParagraphDirection,
    ) -> Result<Vec<VisualRun>, BackendError>;
}

/// [`BidiAnalyzer`] backed by the `unicode-bidi` crate (UAX #9).
#[derive(Clone, Copy, Debug, Default)]
pub struct UnicodeBidiAnalyzer;

impl BidiAnalyzer for UnicodeBidiAnalyzer {
    fn visual_runs(
        &mut self,
        text: &str,
        direction: ParagraphDirection,
    ) -> Result<Vec<VisualRun>, BackendError> {
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let base = match direction {
            ParagraphDirection::Ltr => BidiDirection::Ltr,
            ParagraphDirection::Rtl => BidiDirection::Rtl,
            auto => first_strong_direction(text).unwrap_or_else(|| auto.fallback()),
        };
        let level = match base {
            BidiDirection::Ltr => Level::ltr(),
            BidiDirection::Rtl => Level::rtl(),
        };

        let info = BidiInfo::new(text, Some(level));
        let mut runs = Vec::new();
        for para in &info.paragraphs {
            let (levels, level_runs) = info.visual_runs(para, para.range.clone());
            for run in level_runs {
                let direction = if levels[run.start].is_rtl() {
                    BidiDirection::Rtl
                } else {
                    BidiDirection::Ltr
                };
                runs.push(VisualRun {
                    logical_start: run.start,
                    length: run.len(),
                    direction,
                });
            }
        }
        Ok(runs)
    }
}

/// Direction of the first strong character, if any.
pub fn first_strong_direction(text: &str) -> Option<BidiDirection> {
    text.chars().find_map(|c| match bidi_class(c) {
        BidiClass::L => Some(BidiDirection::Ltr),
        BidiClass::R | BidiClass::AL => Some(BidiDirection::Rtl),
        _ => None,
    })
}
