use crate::chain::ChainState;
use crate::device::DeviceError;
use thiserror::Error;
use webrashader_preprocess::Provenance;
use webrashader_presets::ParsePresetError;
use webrashader_runtime::error::{CompileError, ResolveError};
use webrashader_runtime::image::LutError;
use webrashader_transpile::ShaderStage;

/// Cumulative error type for WebGL filter chains.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum FilterChainError {
    /// The preset could not be parsed.
    #[error("shader preset parse error")]
    ShaderPresetError(#[from] ParsePresetError),
    /// A pass could not be loaded or transpiled.
    #[error(transparent)]
    Compile(#[from] CompileError),
    /// Parameters or texture references of the passes are inconsistent.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    /// A lookup texture could not be loaded.
    #[error(transparent)]
    Lut(#[from] LutError),
    /// The preset declares no passes.
    #[error("the preset has no passes")]
    EmptyPreset,
    /// The driver rejected a transpiled shader.
    #[error(
        "pass {pass}: the driver rejected the {stage} shader{}: {log}",
        .origin.as_ref().map(|o| format!(" at {o}")).unwrap_or_default()
    )]
    DriverCompile {
        /// The failing pass.
        pass: usize,
        /// The failing stage.
        stage: ShaderStage,
        /// The info log of the driver.
        log: String,
        /// The line of the source the log blames, as it was written.
        origin: Option<Provenance>,
    },
    /// The driver failed to link the program of a pass.
    #[error("pass {pass}: the driver failed to link the program: {log}")]
    DriverLink {
        /// The failing pass.
        pass: usize,
        /// The info log of the driver.
        log: String,
    },
    /// The device failed to allocate a resource.
    #[error(transparent)]
    Device(#[from] DeviceError),
    /// The chain has no pipeline to render with.
    #[error("the filter chain is {0} and can not render")]
    NotReady(ChainState),
}

/// Result type for WebGL filter chains.
pub type Result<T> = std::result::Result<T, FilterChainError>;
