//! Shader preset definition parsing for webrashader.
//!
//! This crate parses `.slangp` shader preset files. A preset names the ordered
//! chain of shader passes to apply, how each pass output is scaled, filtered
//! and wrapped, the lookup textures the passes may sample, and overrides for
//! shader parameters.
//!
//! Parsing is pure. Paths in the resulting [`ShaderPreset`] are normalized
//! relative to the preset file but never opened; `#reference` chains are
//! followed only through a caller supplied
//! [`Resolver`](webrashader_common::resolve::Resolver).
#![forbid(missing_docs)]

mod error;
mod parse;
mod preset;

pub use error::*;
pub use parse::MAX_REFERENCE_DEPTH;
pub use preset::*;
