//! Rich-text runs: formatting spans over a UTF-8 string.

use crate::bidi::ParagraphDirection;
use crate::diagnostics::{LogListener, LogSeverity};
use crate::glyph_cache::FontId;

/// Default point size, 24pt in 26.6 fixed point.
pub const DEFAULT_PT_SIZE: u32 = 24 << 6;

/// Per-run horizontal reading direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum HorizReadingDir {
    /// Whatever the shaper manager is configured with.
    #[default]
    Default,
    AutoLtr,
    AutoRtl,
    Ltr,
    Rtl,
}

impl HorizReadingDir {
    pub fn resolve(self, default: ParagraphDirection) -> ParagraphDirection {
        match self {
            Self::Default => default,
            Self::AutoLtr => ParagraphDirection::AutoLtr,
            Self::AutoRtl => ParagraphDirection::AutoRtl,
            Self::Ltr => ParagraphDirection::Ltr,
            Self::Rtl => ParagraphDirection::Rtl,
        }
    }
}

/// One formatting span. `offset` and `length` are byte offsets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RichTextRun {
    /// 26.6 fixed point.
    pub pt_size: u32,
    pub offset: usize,
    pub length: usize,
    pub reading_dir: HorizReadingDir,
    pub font: FontId,
}

impl RichTextRun {
    /// A default-formatted run covering `text` entirely.
    pub fn whole(text: &str) -> Self {
        Self {
            pt_size: DEFAULT_PT_SIZE,
            offset: 0,
            length: text.len(),
            reading_dir: HorizReadingDir::Default,
            font: 0,
        }
    }

    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}

/// Make `runs` safe to slice `text` with.
///
/// An empty list gets one default run over the whole text. Runs that reach
/// past the end are clamped (and snapped to char boundaries). A single
/// warning is logged when anything had to be corrected. Returns whether
/// corrections were made.
pub fn validate_rich_text(
    text: &str,
    runs: &mut Vec<RichTextRun>,
    log: &dyn LogListener,
) -> bool {
    if runs.is_empty() {
        runs.push(RichTextRun::whole(text));
        return false;
    }

    let text_len = text.len();
    let mut corrected = false;
    for run in runs.iter_mut() {
        if run.offset > text_len {
            run.offset = text_len;
            corrected = true;
        }
        if run.offset + run.length > text_len {
            run.length = text_len - run.offset;
            corrected = true;
        }

        let start = floor_char_boundary(text, run.offset);
        let end = floor_char_boundary(text, run.offset + run.length);
        if start != run.offset || end != run.end() {
            run.offset = start;
            run.length = end - start;
            corrected = true;
        }
    }

    if corrected {
        log.log(
            &format!(
                "[validate_rich_text] Rich text goes out of bounds. We've corrected the \
                 situation. Text may not be drawn as expected. String: {text}"
            ),
            LogSeverity::Warning,
        );
    }
    corrected
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}
