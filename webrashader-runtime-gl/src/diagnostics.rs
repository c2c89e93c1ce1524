use std::collections::VecDeque;
use std::fmt::{Display, Formatter};
use webrashader_common::{ImageFormat, Size};

/// The most diagnostics kept before the oldest are dropped.
pub const MAX_DIAGNOSTICS: usize = 64;

/// A recoverable problem found while rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameDiagnostic {
    /// The frame was dropped because its targets were not usable, a zero
    /// sized viewport or input, or a framebuffer that could not be completed.
    /// The frame is retried with the next call.
    ResizeRace {
        /// The frame that was dropped.
        frame: usize,
        /// The pass whose target failed, if any.
        pass: Option<usize>,
        /// The viewport size at the time.
        viewport: Size<u32>,
    },
    /// A pass renders to a different format than it asked for.
    FormatFallback {
        /// The pass.
        pass: usize,
        /// The requested format.
        requested: ImageFormat,
        /// The format used instead.
        used: ImageFormat,
    },
    /// A uniform value could not be converted to the type the shader declares
    /// and was left unset.
    UnboundUniform {
        /// The pass.
        pass: usize,
        /// The uniform name.
        name: String,
    },
}

impl Display for FrameDiagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameDiagnostic::ResizeRace {
                frame,
                pass: Some(pass),
                viewport,
            } => write!(
                f,
                "frame {frame} dropped, pass {pass} has no usable target at viewport {}x{}",
                viewport.width, viewport.height
            ),
            FrameDiagnostic::ResizeRace {
                frame, viewport, ..
            } => write!(
                f,
                "frame {frame} dropped at viewport {}x{}",
                viewport.width, viewport.height
            ),
            FrameDiagnostic::FormatFallback {
                pass,
                requested,
                used,
            } => write!(f, "pass {pass} renders {used:?} instead of {requested:?}"),
            FrameDiagnostic::UnboundUniform { pass, name } => {
                write!(f, "pass {pass} has no value of its type for `{name}`")
            }
        }
    }
}

/// A bounded queue of diagnostics, drained by the host.
#[derive(Debug, Default)]
pub struct DiagnosticQueue {
    queue: VecDeque<FrameDiagnostic>,
    dropped: usize,
}

impl DiagnosticQueue {
    /// Log and enqueue a diagnostic, dropping the oldest one if the queue is full.
    pub fn push(&mut self, diagnostic: FrameDiagnostic) {
        tracing::warn!(%diagnostic, "frame diagnostic");
        if self.queue.len() >= MAX_DIAGNOSTICS {
            self.queue.pop_front();
            self.dropped += 1;
        }
        self.queue.push_back(diagnostic);
    }

    /// Take every queued diagnostic, oldest first.
    pub fn drain(&mut self) -> Vec<FrameDiagnostic> {
        self.queue.drain(..).collect()
    }

    /// The number of diagnostics dropped because the queue was full.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// The number of queued diagnostics.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether no diagnostics are queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
