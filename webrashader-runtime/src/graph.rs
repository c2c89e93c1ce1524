use crate::compile::CompiledPass;
use crate::error::{ReferenceError, ResolveError};
use crate::parameters::ParameterTable;
use crate::semantics::{Semantic, SemanticMap, TextureSemantics, UniformSemantic, UniqueSemantics};
use std::collections::BTreeSet;
use webrashader_common::map::ShortString;
use webrashader_presets::TextureConfig;
use webrashader_transpile::UniformType;

/// A sampler of a pass and the texture bound to it.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureBinding {
    /// The name of the sampler uniform.
    pub name: String,
    /// The texture unit of the sampler.
    pub binding: u32,
    /// The texture to bind.
    pub source: Semantic<TextureSemantics>,
}

/// Where the value of a uniform comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformSource {
    /// A builtin value.
    Unique(UniqueSemantics),
    /// The size of a texture.
    TextureSize(Semantic<TextureSemantics>),
    /// A shader parameter.
    Parameter(ShortString),
}

/// A uniform of a pass and the value bound to it.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformBinding {
    /// The name of the uniform.
    pub name: String,
    /// The type the shader declares.
    pub ty: UniformType,
    /// The value to bind.
    pub source: UniformSource,
}

/// The resolved inputs of a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PassBindings {
    /// The index of the pass.
    pub index: usize,
    /// Samplers, in binding order.
    pub textures: Vec<TextureBinding>,
    /// Uniforms the pass reads.
    pub uniforms: Vec<UniformBinding>,
}

/// The validated inputs of every pass of a preset.
///
/// Built once per load. Every reference points to the input frame, a history
/// frame, a lookup texture, the output of an earlier pass or the previous
/// frame of a persistent pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PassGraph {
    /// The bindings of each pass, in pass order.
    pub passes: Vec<PassBindings>,
    /// The number of earlier input frames that are sampled.
    pub required_history: usize,
    /// The passes whose previous frame is sampled.
    pub feedback: BTreeSet<usize>,
}

impl PassGraph {
    /// Resolve the samplers and uniforms of every pass.
    pub fn build(
        passes: &[CompiledPass],
        textures: &[TextureConfig],
        parameters: &ParameterTable,
    ) -> Result<PassGraph, ResolveError> {
        let mut map = SemanticMap::new();
        for (index, pass) in passes.iter().enumerate() {
            map.insert_pass(pass.unit.name.as_deref(), index);
            map.insert_pass(pass.config.alias(), index);
        }
        map.insert_luts(textures);

        let mut graph = PassGraph {
            passes: Vec::with_capacity(passes.len()),
            required_history: 0,
            feedback: BTreeSet::new(),
        };

        for (index, pass) in passes.iter().enumerate() {
            let reflection = &pass.unit.reflection;
            let mut bindings = PassBindings {
                index,
                textures: Vec::with_capacity(reflection.samplers.len()),
                uniforms: Vec::with_capacity(reflection.uniforms.len()),
            };

            for sampler in &reflection.samplers {
                let source = map.texture(&sampler.name, index).ok_or_else(|| {
                    ResolveError::CyclicOrInvalidReference {
                        pass: index,
                        name: sampler.name.clone(),
                        reason: ReferenceError::UnknownTexture,
                    }
                })?;
                graph.check(passes, index, &sampler.name, source)?;
                bindings.textures.push(TextureBinding {
                    name: sampler.name.clone(),
                    binding: sampler.binding,
                    source,
                });
            }

            for uniform in &reflection.uniforms {
                let source = match map.uniform(&uniform.name, index) {
                    Some(UniformSemantic::Unique(unique)) => UniformSource::Unique(unique),
                    Some(UniformSemantic::Texture(texture)) => {
                        graph.check(passes, index, &uniform.name, texture)?;
                        UniformSource::TextureSize(texture)
                    }
                    None if parameters.contains(&uniform.name) => {
                        UniformSource::Parameter(ShortString::from(uniform.name.as_str()))
                    }
                    None => {
                        return Err(ResolveError::MissingParameter {
                            pass: index,
                            name: uniform.name.clone(),
                        })
                    }
                };
                bindings.uniforms.push(UniformBinding {
                    name: uniform.name.clone(),
                    ty: uniform.ty,
                    source,
                });
            }

            tracing::trace!(
                pass = index,
                textures = bindings.textures.len(),
                uniforms = bindings.uniforms.len(),
                "resolved pass bindings"
            );
            graph.passes.push(bindings);
        }

        tracing::debug!(
            passes = graph.passes.len(),
            history = graph.required_history,
            feedback = graph.feedback.len(),
            "built pass graph"
        );
        Ok(graph)
    }

    /// Check that `pass` may read `source`, and record what it needs.
    fn check(
        &mut self,
        passes: &[CompiledPass],
        pass: usize,
        name: &str,
        source: Semantic<TextureSemantics>,
    ) -> Result<(), ResolveError> {
        let reject = |reason| ResolveError::CyclicOrInvalidReference {
            pass,
            name: name.to_string(),
            reason,
        };

        match source.semantics {
            TextureSemantics::PassOutput if source.index >= pass => {
                return Err(reject(ReferenceError::ForwardReference {
                    target: source.index,
                }))
            }
            TextureSemantics::PassFeedback => {
                let Some(target) = passes.get(source.index) else {
                    return Err(reject(ReferenceError::UnknownTexture));
                };
                if !target.config.persistent {
                    return Err(reject(ReferenceError::NotPersistent {
                        target: source.index,
                    }));
                }
                self.feedback.insert(source.index);
            }
            TextureSemantics::OriginalHistory => {
                self.required_history = self.required_history.max(source.index);
            }
            _ => {}
        }
        Ok(())
    }
}
