//! Caller-visible diagnostics.
//!
//! Components that report recoverable problems (clamped rich text, a glyph
//! the rasterizer rejected, a run the bidi analyzer could not process) do so
//! through a [`LogListener`] handed to them at construction time. The
//! default listener forwards everything to the `log` facade.

use std::fmt;
use std::rc::Rc;

/// How bad a reported condition is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogSeverity {
    Info,
    Warning,
    Fatal,
}

impl fmt::Display for LogSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Fatal => "fatal",
        };
        f.write_str(name)
    }
}

/// Receives diagnostics from the text core.
pub trait LogListener {
    fn log(&self, message: &str, severity: LogSeverity);
}

/// Shared handle to a listener. The text core is single-threaded.
pub type SharedLogListener = Rc<dyn LogListener>;

/// Forwards diagnostics to the `log` crate under the `prism_text` target.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogCrateListener;

impl LogListener for LogCrateListener {
    fn log(&self, message: &str, severity: LogSeverity) {
        match severity {
            LogSeverity::Info => log::info!(target: "prism_text", "{message}"),
            LogSeverity::Warning => log::warn!(target: "prism_text", "{message}"),
            LogSeverity::Fatal => log::error!(target: "prism_text", "{message}"),
        }
    }
}

/// Listener used when the caller doesn't supply one.
pub fn default_listener() -> SharedLogListener {
    Rc::new(LogCrateListener)
}
