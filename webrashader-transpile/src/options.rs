use std::fmt::{Display, Formatter};

/// The WebGL profile a shader is transpiled for.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WebGlVersion {
    /// WebGL 1, GLSL ES 1.00: `attribute`/`varying`, `texture2D`, no unsigned
    /// integers and only square matrices.
    WebGl1,
    /// WebGL 2, GLSL ES 3.00: `in`/`out`, `texture` and integer types.
    #[default]
    WebGl2,
}

impl WebGlVersion {
    /// The `#version` line of the profile.
    pub fn version_header(&self) -> &'static str {
        match self {
            WebGlVersion::WebGl1 => "#version 100",
            WebGlVersion::WebGl2 => "#version 300 es",
        }
    }
}

impl Display for WebGlVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            WebGlVersion::WebGl1 => f.write_str("WebGL 1"),
            WebGlVersion::WebGl2 => f.write_str("WebGL 2"),
        }
    }
}

/// The default float precision declared in fragment stages.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Precision {
    /// `highp`, falling back to `mediump` on WebGL 1 devices without high
    /// precision fragment shaders.
    #[default]
    Highp,
    /// `mediump`.
    Mediump,
}

/// Options for transpiling a shader.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TranspileOptions {
    /// The profile to emit.
    pub target: WebGlVersion,
    /// Synthesize neutral declarations for identifiers that are used but
    /// never declared.
    pub synthesize_stubs: bool,
    /// Turn globals written by the vertex stage and read by the fragment
    /// stage into varyings.
    pub promote_globals: bool,
    /// The default float precision of fragment stages that declare none.
    pub float_precision: Precision,
}

impl Default for TranspileOptions {
    fn default() -> Self {
        Self {
            target: WebGlVersion::WebGl2,
            synthesize_stubs: true,
            promote_globals: true,
            float_precision: Precision::Highp,
        }
    }
}

impl TranspileOptions {
    /// Default options for `target`.
    pub fn for_target(target: WebGlVersion) -> Self {
        Self {
            target,
            ..Default::default()
        }
    }
}

/// A programmable stage of a shader pass.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ShaderStage {
    /// The vertex stage.
    Vertex,
    /// The fragment stage.
    Fragment,
}

impl Display for ShaderStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}
