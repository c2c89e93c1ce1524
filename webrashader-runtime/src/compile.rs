use crate::error::CompileError;
use rayon::prelude::*;
use webrashader_common::resolve::Resolver;
use webrashader_preprocess::ShaderSource;
use webrashader_presets::{ShaderPassConfig, ShaderPreset};
use webrashader_transpile::{transpile, CompiledUnit, TranspileOptions};

/// A pass of a preset with its transpiled shader.
#[derive(Debug, Clone)]
pub struct CompiledPass {
    /// The pass configuration from the preset.
    pub config: ShaderPassConfig,
    /// The shader compiled for the target profile.
    pub unit: CompiledUnit,
}

impl CompiledPass {
    /// The name other passes use for this pass: the preset alias, or the
    /// `#pragma name` of the shader.
    pub fn alias(&self) -> Option<&str> {
        self.config
            .alias()
            .or(self.unit.name.as_deref())
            .map(str::trim)
            .filter(|alias| !alias.is_empty())
    }
}

/// Load and transpile every pass of `preset`.
///
/// Sources are read through `resolver` in pass order, then transpiled in
/// parallel. When several passes fail to transpile, any one of them is
/// reported.
pub fn compile_preset(
    preset: &ShaderPreset,
    resolver: &mut impl Resolver,
    options: &TranspileOptions,
) -> Result<Vec<CompiledPass>, CompileError> {
    let sources = preset
        .shaders
        .iter()
        .enumerate()
        .map(|(pass, config)| {
            ShaderSource::load(&config.name, resolver)
                .map_err(|source| CompileError::Preprocess { pass, source })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let units = sources
        .par_iter()
        .enumerate()
        .map(|(pass, source)| {
            transpile(source, options).map_err(|source| CompileError::Transpile { pass, source })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(preset
        .shaders
        .iter()
        .cloned()
        .zip(units)
        .map(|(config, unit)| CompiledPass { config, unit })
        .collect())
}
