use crate::builtins;
use crate::context::StageUnit;
use crate::error::TranspileError;
use crate::syntax::{self, Item, ItemKind};
use crate::token::{self, Token};
use bitflags::bitflags;
use rustc_hash::FxHashSet;

bitflags! {
    /// The stages a uniform or sampler is used in.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct BindingStage: u8 {
        /// The vertex stage.
        const VERTEX = 0b01;
        /// The fragment stage.
        const FRAGMENT = 0b10;
    }
}

/// The type of a uniform or vertex attribute.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UniformType {
    /// `float`
    Float,
    /// `vec2`, `vec3` or `vec4`.
    Vec(u8),
    /// `int`
    Int,
    /// `ivec2`, `ivec3` or `ivec4`.
    IVec(u8),
    /// `uint`
    UInt,
    /// `uvec2`, `uvec3` or `uvec4`.
    UVec(u8),
    /// `bool`
    Bool,
    /// `bvec2`, `bvec3` or `bvec4`.
    BVec(u8),
    /// A float matrix with the given columns and rows.
    Mat(u8, u8),
    /// A struct or any other type that can not be set as a whole.
    Other,
}

impl UniformType {
    /// The type of a GLSL type name.
    pub fn from_glsl(ty: &str) -> UniformType {
        match ty {
            "float" => return UniformType::Float,
            "int" => return UniformType::Int,
            "uint" => return UniformType::UInt,
            "bool" => return UniformType::Bool,
            _ => {}
        }
        if let Some((scalar, n)) = builtins::vector_parts(ty) {
            return match scalar {
                "int" => UniformType::IVec(n),
                "uint" => UniformType::UVec(n),
                "bool" => UniformType::BVec(n),
                _ => UniformType::Vec(n),
            };
        }
        match builtins::matrix_parts(ty) {
            Some((c, r, _)) => UniformType::Mat(c, r),
            None => UniformType::Other,
        }
    }

    /// The number of scalar components of the type.
    pub fn components(&self) -> usize {
        match *self {
            UniformType::Float | UniformType::Int | UniformType::UInt | UniformType::Bool => 1,
            UniformType::Vec(n) | UniformType::IVec(n) | UniformType::UVec(n) | UniformType::BVec(n) => {
                n as usize
            }
            UniformType::Mat(c, r) => c as usize * r as usize,
            UniformType::Other => 0,
        }
    }
}

/// A uniform the compiled shader reads.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UniformInfo {
    /// The name of the uniform.
    pub name: String,
    /// The type of the uniform.
    pub ty: UniformType,
    /// The stages the uniform is used in.
    pub stages: BindingStage,
}

/// A sampler the compiled shader reads, with the texture unit it is bound to.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SamplerBinding {
    /// The name of the sampler uniform.
    pub name: String,
    /// The texture unit, counted from 0 in order of first declaration.
    pub binding: u32,
    /// The stages the sampler is used in.
    pub stages: BindingStage,
}

/// A vertex attribute and the location it is bound to.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttributeBinding {
    /// The name of the attribute.
    pub name: String,
    /// The type of the attribute.
    pub ty: UniformType,
    /// The location to bind before linking.
    pub location: u32,
}

/// The interface of a compiled shader.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShaderReflection {
    /// Non-sampler uniforms, in order of declaration.
    pub uniforms: Vec<UniformInfo>,
    /// Sampler uniforms.
    pub samplers: Vec<SamplerBinding>,
    /// Vertex attributes.
    pub attributes: Vec<AttributeBinding>,
}

/// A top level declaration of one or more variables.
struct Declarators {
    qualifiers: Vec<String>,
    ty: String,
    names: Vec<String>,
}

/// The declarators of a declaration item. The type is the last identifier
/// before the first name, so precision macros in front of it are skipped.
fn declarators(tokens: &[Token], item: &Item, declared: &mut FxHashSet<usize>) -> Option<Declarators> {
    if item.kind != ItemKind::Declaration {
        return None;
    }
    let sig: Vec<usize> = item
        .range
        .clone()
        .filter(|&i| !tokens[i].is_trivia())
        .collect();
    let mut skip_until = None;
    let mut heads = Vec::new();
    for &i in &sig {
        if skip_until.is_some_and(|end| i <= end) {
            continue;
        }
        if tokens[i].is("layout") {
            skip_until = syntax::next_sig(tokens, i + 1).and_then(|open| syntax::matching(tokens, open));
            continue;
        }
        if matches!(tokens[i].text.as_str(), ";" | "," | "=" | "[") {
            break;
        }
        heads.push(i);
    }
    let [qualifiers @ .., ty, name] = heads.as_slice() else {
        return None;
    };
    if !tokens[*ty].is_ident() || !tokens[*name].is_ident() {
        return None;
    }

    let mut names = vec![tokens[*name].text.clone()];
    declared.insert(*name);
    for extra in syntax::comma_declarators(tokens, *name) {
        declared.insert(extra);
        names.push(tokens[extra].text.clone());
    }
    Some(Declarators {
        qualifiers: qualifiers.iter().map(|&q| tokens[q].text.clone()).collect(),
        ty: tokens[*ty].text.clone(),
        names,
    })
}

/// The declarations of a stage and every name it references.
struct Scanned {
    declarations: Vec<Declarators>,
    referenced: FxHashSet<String>,
}

fn scan(unit: &StageUnit) -> Result<Scanned, TranspileError> {
    let mut sources = vec![unit.tokens.clone()];
    for declaration in &unit.declarations {
        // synthesized declarations never hold comments
        if let Ok(tokens) = token::tokenize(declaration) {
            sources.push(tokens);
        }
    }

    let mut declarations = Vec::new();
    let mut referenced = FxHashSet::default();
    for (source, tokens) in sources.iter().enumerate() {
        let items = if source == 0 {
            unit.items()?
        } else {
            syntax::items(tokens).unwrap_or_default()
        };
        let mut declared = FxHashSet::default();
        for item in &items {
            if let Some(declaration) = declarators(tokens, item, &mut declared) {
                declarations.push(declaration);
            }
        }
        referenced.extend(
            (0..tokens.len())
                .filter(|idx| !declared.contains(idx) && syntax::is_reference(tokens, *idx))
                .map(|idx| tokens[idx].text.clone()),
        );
    }
    Ok(Scanned {
        declarations,
        referenced,
    })
}

/// Collect the uniforms, samplers and attributes of both stages.
pub(crate) fn reflect(vertex: &StageUnit, fragment: &StageUnit) -> Result<ShaderReflection, TranspileError> {
    let stages = [
        (vertex, scan(vertex)?, BindingStage::VERTEX),
        (fragment, scan(fragment)?, BindingStage::FRAGMENT),
    ];
    let referenced: FxHashSet<&String> = stages.iter().flat_map(|(_, s, _)| &s.referenced).collect();
    let mut reflection = ShaderReflection::default();

    for (unit, scanned, stage) in &stages {
        for declaration in &scanned.declarations {
            let is_uniform = declaration.qualifiers.iter().any(|q| q == "uniform");
            let is_attribute = unit.stage == crate::ShaderStage::Vertex
                && declaration.qualifiers.iter().any(|q| q == "attribute" || q == "in");

            for name in &declaration.names {
                if is_uniform && builtins::is_sampler_type(&declaration.ty) {
                    match reflection.samplers.iter_mut().find(|s| &s.name == name) {
                        Some(sampler) => sampler.stages |= *stage,
                        None => {
                            let binding = reflection.samplers.len() as u32;
                            reflection.samplers.push(SamplerBinding {
                                name: name.clone(),
                                binding,
                                stages: *stage,
                            })
                        }
                    }
                } else if is_uniform {
                    if !referenced.contains(name) {
                        continue;
                    }
                    match reflection.uniforms.iter_mut().find(|u| &u.name == name) {
                        Some(uniform) => uniform.stages |= *stage,
                        None => reflection.uniforms.push(UniformInfo {
                            name: name.clone(),
                            ty: UniformType::from_glsl(&declaration.ty),
                            stages: *stage,
                        }),
                    }
                } else if is_attribute {
                    reflection.attributes.push(AttributeBinding {
                        name: name.clone(),
                        ty: UniformType::from_glsl(&declaration.ty),
                        location: unit.input_locations.get(name).copied().unwrap_or(u32::MAX),
                    });
                }
            }
        }
    }

    // attributes without an explicit location take the lowest free ones
    let mut used: FxHashSet<u32> = reflection
        .attributes
        .iter()
        .map(|a| a.location)
        .filter(|&l| l != u32::MAX)
        .collect();
    let mut next = 0;
    for attribute in reflection.attributes.iter_mut().filter(|a| a.location == u32::MAX) {
        while used.contains(&next) {
            next += 1;
        }
        attribute.location = next;
        used.insert(next);
    }

    Ok(reflection)
}
