use crate::device::{Device, ProgramError, VertexAttribute, VertexInput};
use crate::error::{FilterChainError, Result};
use webrashader_common::ImageFormat;
use webrashader_presets::ShaderPassConfig;
use webrashader_runtime::compile::CompiledPass;
use webrashader_runtime::graph::PassBindings;

/// A pass with its linked program and uniform locations.
#[derive(Debug)]
pub(crate) struct FilterPass<D: Device> {
    pub config: ShaderPassConfig,
    pub program: D::Program,
    pub bindings: PassBindings,
    /// Locations of `bindings.uniforms`, `None` where the linker removed the uniform.
    pub uniform_locations: Vec<Option<D::UniformLocation>>,
    /// Locations of the samplers of `bindings.textures`.
    pub sampler_locations: Vec<Option<D::UniformLocation>>,
    /// The format the pass asked for.
    pub format: ImageFormat,
}

impl<D: Device> FilterPass<D> {
    /// Compile and link the program of `pass` and look up its uniforms.
    pub fn compile(device: &mut D, pass: &CompiledPass, bindings: PassBindings) -> Result<Self> {
        let index = bindings.index;
        let attributes: Vec<VertexAttribute> = pass
            .unit
            .reflection
            .attributes
            .iter()
            .map(|attribute| VertexAttribute {
                name: &attribute.name,
                location: attribute.location,
                input: VertexInput::for_attribute(&attribute.name),
            })
            .collect();

        let program = device
            .compile_program(&pass.unit.vertex.source, &pass.unit.fragment.source, &attributes)
            .map_err(|err| match err {
                ProgramError::Compile { stage, log } => FilterChainError::DriverCompile {
                    pass: index,
                    stage,
                    origin: pass.unit.stage(stage).locate(&log),
                    log,
                },
                ProgramError::Link { log } | ProgramError::Create(log) => {
                    FilterChainError::DriverLink { pass: index, log }
                }
            })?;

        let uniform_locations = bindings
            .uniforms
            .iter()
            .map(|uniform| device.uniform_location(&program, &uniform.name))
            .collect();
        let sampler_locations = bindings
            .textures
            .iter()
            .map(|texture| device.uniform_location(&program, &texture.name))
            .collect();

        let format = pass
            .config
            .get_format_override()
            .unwrap_or(pass.unit.format);

        tracing::debug!(
            pass = index,
            path = %pass.unit.path,
            format = ?format,
            "linked pass program"
        );

        Ok(FilterPass {
            config: pass.config.clone(),
            program,
            bindings,
            uniform_locations,
            sampler_locations,
            format,
        })
    }

    /// The frame count this pass sees, taken modulo `frame_count_mod`.
    pub fn frame_count(&self, count: usize) -> u32 {
        let count = if self.config.frame_count_mod > 0 {
            count % self.config.frame_count_mod as usize
        } else {
            count
        };
        count as u32
    }

    pub fn delete(self, device: &mut D) {
        device.delete_program(self.program);
    }
}
