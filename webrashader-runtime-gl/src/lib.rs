//! RetroArch shader preset runtime for WebGL.
//!
//! A [`FilterChain`](crate::chain::FilterChain) renders a loaded preset with a
//! [`Device`](crate::device::Device). [`GlowDevice`](crate::webgl::GlowDevice)
//! renders with a WebGL context through `glow`, and
//! [`SoftwareDevice`](crate::software::SoftwareDevice) rasterizes on the CPU
//! for headless hosts and tests.
#![forbid(missing_docs)]

/// The filter chain and its lifecycle.
pub mod chain;
pub mod device;
/// Recoverable problems found while rendering.
pub mod diagnostics;
/// Error types for the filter chain.
pub mod error;
/// Render targets owned by the chain.
pub mod framebuffer;
pub mod options;
pub mod software;
pub mod webgl;

mod pass;

pub use chain::{ChainState, FilterChain, InputImage, PreparedChain};
pub use error::FilterChainError;
pub use options::{FilterChainOptions, FrameOptions};
