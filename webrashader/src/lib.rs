#![forbid(missing_docs)]
//! RetroArch shader presets for WebGL.
//!
//! webrashader renders RetroArch ['slang' shaders](https://github.com/libretro/slang-shaders)
//! and legacy GLSL shaders inside a WebGL1 or WebGL2 context. Presets are
//! parsed, their passes transpiled to GLSL ES, and the resulting pipeline is
//! run pass by pass on a [`Device`](crate::runtime::gl::device::Device).
//!
//! ## Usage
//! The entry point for hosts is the [`Renderer`](crate::Renderer), which owns
//! any number of loaded pipelines, each addressed by a
//! [`PipelineHandle`](crate::PipelineHandle).
//!
//! Files referenced by a preset (shader sources, includes, lookup textures and
//! referenced presets) are read through a [`Resolver`](crate::Resolver) the
//! host supplies, since browsers have no file system.
//!
//! | **Profile** | **Status** | **`webrashader` feature** |
//! |-------------|------------|---------------------------|
//! | WebGL2      | ✔         | `gl`                      |
//! | WebGL1      | ✔         | `gl`                      |
//! | wasm32 canvas contexts | ✔ | `web`                  |

#[cfg(feature = "presets")]
/// Parsing and usage of shader presets.
///
/// Shader presets contain shader and texture parameters, and the order in which to apply a set of shaders
/// in a filter chain.
pub mod presets {
    use webrashader_common::resolve::Resolver;
    use webrashader_preprocess::{PreprocessError, ShaderParameter, ShaderSource};
    pub use webrashader_presets::*;

    /// Get full parameter metadata from a shader preset.
    pub fn get_parameter_meta(
        preset: &ShaderPreset,
        resolver: &mut impl Resolver,
    ) -> Result<impl Iterator<Item = ShaderParameter>, PreprocessError> {
        let iters: Result<Vec<Vec<ShaderParameter>>, PreprocessError> = preset
            .shaders
            .iter()
            .map(|s| ShaderSource::load(&s.name, resolver).map(|s| s.parameters))
            .collect();
        let iters = iters?;
        Ok(iters.into_iter().flatten())
    }
}

#[cfg(feature = "preprocess")]
/// Loading and preprocessing of shader source files.
///
/// Shader sources files must be loaded with includes resolved before being able to be transpiled.
/// Shader parameters are also defined in `#pragma`s within shader source files which must be parsed.
pub mod preprocess {
    pub use webrashader_preprocess::*;
}

#[cfg(feature = "transpile")]
/// Transpilation of shader sources to GLSL ES, and reflection of the result.
pub mod transpile {
    pub use webrashader_transpile::*;
}

/// Shader runtimes to execute a filter chain on a WebGL surface.
#[cfg(feature = "runtime")]
pub mod runtime {
    pub use webrashader_runtime::compile::{compile_preset, CompiledPass};
    pub use webrashader_runtime::error::*;
    pub use webrashader_runtime::graph::PassGraph;
    pub use webrashader_runtime::parameters::{ParameterEntry, ParameterTable};

    /// Helpers to deal with image loading.
    pub mod image {
        pub use webrashader_runtime::image::*;
    }

    #[cfg(feature = "gl")]
    /// Shader runtime for WebGL.
    pub mod gl {
        pub use webrashader_runtime_gl::*;
    }
}

#[cfg(feature = "gl")]
mod renderer;

#[cfg(feature = "gl")]
pub use renderer::{LoadError, LoadTicket, PipelineHandle, RenderError, Renderer};

pub use webrashader_common::resolve::{MemoryResolver, Resolver};
pub use webrashader_common::{FilterMode, ImageFormat, Size, WrapMode};
