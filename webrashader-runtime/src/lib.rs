//! Backend independent parts of the webrashader runtime.
//!
//! Compiles the passes of a preset, merges their parameters and resolves what
//! every sampler and uniform of every pass is bound to. The result is a
//! [`PassGraph`](graph::PassGraph) that a backend executes frame by frame.
#![forbid(missing_docs)]

/// Loading and transpiling the passes of a preset.
pub mod compile;

/// Errors raised while compiling and resolving a preset.
pub mod error;

/// Resolution of sampler and uniform bindings.
pub mod graph;

/// Lookup texture decoding.
pub mod image;

/// The parameter table of a loaded preset.
pub mod parameters;

/// Output size calculation.
pub mod scaling;

/// Builtin texture and uniform names.
pub mod semantics;

/// Conversion of bound values to uniform types.
pub mod uniforms;
