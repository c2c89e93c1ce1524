use crate::Provenance;
use thiserror::Error;

/// Error type for source preprocessing.
#[derive(Error, Debug)]
pub enum PreprocessError {
    /// The version header was missing.
    #[error("the version header was missing from {0}")]
    MissingVersionHeader(String),
    /// The resolver had no file at the given path.
    #[error("the file {path} was not found during resolution")]
    NotFound {
        /// The normalized path that was requested.
        path: String,
        /// The `#include` that requested it, if any.
        included_from: Option<Provenance>,
    },
    /// A file includes itself, directly or through other includes.
    #[error("{0} includes itself")]
    IncludeCycle(String),
    /// Includes were nested deeper than the maximum depth.
    #[error("exceeded maximum include depth ({0})")]
    ExceededIncludeDepth(usize),
    /// Unexpected end of line, an `#include` without a path.
    #[error("unexpected end of line at {0}")]
    UnexpectedEol(Provenance),
    /// An error occurred when parsing a pragma statement.
    #[error("error parsing pragma `{text}` at {origin}")]
    PragmaParseError {
        /// The pragma as written.
        text: String,
        /// Where it was written.
        origin: Provenance,
    },
    /// A pragma was declared twice with conflicting values.
    #[error("duplicate pragma found: {0}")]
    DuplicatePragmaError(String),
    /// The image format requested by `#pragma format` is not known.
    #[error("shader format is unknown or not found: {0}")]
    UnknownImageFormat(String),
    /// A `#pragma stage` names something other than `vertex` or `fragment`.
    #[error("stage must be either vertex or fragment at {0}")]
    InvalidStage(Provenance),
    /// No stage markers were found, so the source cannot be split.
    #[error("{0} has no vertex or fragment stage markers")]
    MissingStage(String),
}
