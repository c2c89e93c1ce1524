use crate::WebGlVersion;
use thiserror::Error;
use webrashader_preprocess::Provenance;

/// Error type for shader transpilation.
///
/// Every error names the line of the source as it was written, before any
/// include expansion or rewriting.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TranspileError {
    /// A block comment or string was never closed.
    #[error("unterminated {what} starting at {origin}")]
    Unterminated {
        /// What was left open.
        what: &'static str,
        /// Where it was opened.
        origin: Provenance,
    },
    /// A delimiter was closed without being opened, or never closed.
    #[error("unbalanced `{delimiter}` at {origin}")]
    Unbalanced {
        /// The delimiter.
        delimiter: char,
        /// Where the delimiter was found.
        origin: Provenance,
    },
    /// The construct can not be expressed in the target profile.
    #[error("{what} is not supported by {target} ({origin})")]
    Unsupported {
        /// A description of the construct.
        what: String,
        /// The profile being emitted.
        target: WebGlVersion,
        /// Where the construct was found.
        origin: Provenance,
    },
}
