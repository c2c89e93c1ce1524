//! Shader source loading for webrashader.
//!
//! A shader pass is written as one file holding both stages, which may
//! `#include` other files. [`ShaderSource::load`] expands includes through the
//! host's [`Resolver`], splits the result into a vertex and a fragment stage,
//! and extracts the `#pragma` metadata (parameters, name, framebuffer format).
//!
//! Every line of each stage keeps a [`Provenance`] pointing at the file and
//! line it was written on, so errors found after rewriting can still be
//! reported against what the author wrote.
#![forbid(missing_docs)]

mod error;
mod include;
mod pragma;
mod stage;

pub use error::*;

use std::fmt::{Display, Formatter};
use std::sync::Arc;
use webrashader_common::map::ShortString;
use webrashader_common::resolve::Resolver;
use webrashader_common::ImageFormat;

/// The maximum depth of nested `#include` directives.
pub const MAX_INCLUDE_DEPTH: usize = 32;

/// Where a line of source was originally written.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Provenance {
    /// The normalized path of the file.
    pub file: Arc<str>,
    /// The 1-based line within the file.
    pub line: u32,
}

impl Display for Provenance {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Maps each line of a generated source back to where it came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceMap {
    lines: Vec<Provenance>,
}

impl SourceMap {
    /// Create a source map from per-line provenance, in line order.
    pub fn new(lines: Vec<Provenance>) -> Self {
        Self { lines }
    }

    /// The provenance of the 1-based `line`.
    pub fn get(&self, line: u32) -> Option<&Provenance> {
        line.checked_sub(1)
            .and_then(|idx| self.lines.get(idx as usize))
    }

    /// The number of mapped lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether no lines are mapped.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub(crate) fn push(&mut self, origin: Provenance) {
        self.lines.push(origin)
    }
}

/// The GLSL family a shader is written in.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ShaderDialect {
    /// Vulkan flavoured GLSL with `#pragma stage` markers (`.slang`).
    Slang,
    /// Desktop GLSL with `VERTEX`/`FRAGMENT` guards (legacy `.glsl`).
    LegacyGlsl,
    /// GLSL ES, already in a dialect WebGL understands.
    GlslEs,
}

/// The `#version` header of a shader.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VersionHeader {
    /// The version number, `450` for `#version 450`.
    pub version: u32,
    /// Whether the header names the `es` profile.
    pub es: bool,
}

/// One stage of a shader pass after include expansion.
#[derive(Debug, Clone, Default)]
pub struct StageSource {
    /// The stage body, without the `#version` header.
    pub text: String,
    /// Provenance for each line of `text`.
    pub map: SourceMap,
}

/// A shader parameter declared by `#pragma parameter`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShaderParameter {
    /// The name of the parameter.
    pub id: ShortString,
    /// The description of the parameter.
    pub description: String,
    /// The initial value the parameter is set to.
    pub initial: f32,
    /// The minimum value that the parameter can be set to.
    pub minimum: f32,
    /// The maximum value that the parameter can be set to.
    pub maximum: f32,
    /// The step by which this parameter can be incremented or decremented.
    pub step: f32,
    /// Whether the declaration is reachable without evaluating any
    /// conditional compilation block.
    ///
    /// Declarations inside `#if` blocks are kept, but marked inactive.
    pub active: bool,
}

impl ShaderParameter {
    /// Whether two declarations agree on the range of the parameter.
    pub fn same_bounds(&self, other: &ShaderParameter) -> bool {
        self.minimum == other.minimum && self.maximum == other.maximum && self.step == other.step
    }
}

/// A source file of a shader pass, split into its stages.
#[derive(Debug, Clone)]
pub struct ShaderSource {
    /// The normalized path the source was loaded from.
    pub path: String,
    /// The dialect of the source.
    pub dialect: ShaderDialect,
    /// The `#version` header.
    pub version: VersionHeader,
    /// Where the `#version` header was written.
    pub header: Provenance,
    /// The vertex stage.
    pub vertex: StageSource,
    /// The fragment stage.
    pub fragment: StageSource,
    /// The alias declared by `#pragma name`, if any.
    pub name: Option<ShortString>,
    /// The parameters declared in the source, in declaration order.
    pub parameters: Vec<ShaderParameter>,
    /// The framebuffer format requested by `#pragma format`.
    pub format: ImageFormat,
}

impl ShaderSource {
    /// Load the shader at `path`, reading it and any files it includes
    /// through `resolver`.
    pub fn load(path: &str, resolver: &mut impl Resolver) -> Result<ShaderSource, PreprocessError> {
        let text = resolver
            .read_text(path)
            .ok_or_else(|| PreprocessError::NotFound {
                path: path.to_string(),
                included_from: None,
            })?;
        Self::from_source(path, &text, resolver)
    }

    /// Preprocess already loaded source text. `path` names the file for
    /// provenance and is the base for relative includes.
    pub fn from_source(
        path: &str,
        text: &str,
        resolver: &mut impl Resolver,
    ) -> Result<ShaderSource, PreprocessError> {
        let expanded = include::read_source(path, text, resolver)?;
        let version = expanded.version;

        let dialect = if version.es || version.version == 100 {
            ShaderDialect::GlslEs
        } else if expanded.lines.iter().any(|l| stage::is_stage_pragma(&l.text)) {
            ShaderDialect::Slang
        } else {
            ShaderDialect::LegacyGlsl
        };

        let meta = pragma::parse_pragma_meta(&expanded.lines)?;
        let (vertex, fragment) = stage::split_stages(path, &expanded)?;

        tracing::trace!(
            path,
            ?dialect,
            parameters = meta.parameters.len(),
            "preprocessed shader source"
        );

        Ok(ShaderSource {
            path: path.to_string(),
            dialect,
            version,
            header: expanded.header_origin.clone(),
            vertex,
            fragment,
            name: meta.name,
            parameters: meta.parameters,
            format: meta.format,
        })
    }
}

#[cfg(test)]
mod test {
    use crate::{ShaderDialect, ShaderSource};
    use webrashader_common::resolve::MemoryResolver;

    #[test]
    pub fn preprocess_file() {
        let mut resolver = MemoryResolver::new()
            .with(
                "shaders/stock.slang",
                "#version 450\n#include \"include/common.inc\"\n#pragma stage vertex\nvoid main() {}\n#pragma stage fragment\nvoid main() { FragColor = tint(); }\n",
            )
            .with(
                "shaders/include/common.inc",
                "#pragma parameter BOOST \"Boost\" 1.0 0.0 4.0 0.05\nvec4 tint() { return vec4(BOOST); }\n",
            );

        let source = ShaderSource::load("shaders/stock.slang", &mut resolver).unwrap();
        assert_eq!(source.dialect, ShaderDialect::Slang);
        assert_eq!(source.version.version, 450);
        assert_eq!(source.parameters.len(), 1);
        assert!(source.vertex.text.contains("vec4 tint()"));
        assert!(source.fragment.text.contains("vec4 tint()"));
        assert!(!source.vertex.text.contains("FragColor"));
        assert!(!source.fragment.text.contains("#pragma"));

        let tint = source
            .fragment
            .text
            .lines()
            .position(|l| l.starts_with("vec4 tint"))
            .unwrap();
        let origin = source.fragment.map.get(tint as u32 + 1).unwrap();
        assert_eq!(&*origin.file, "shaders/include/common.inc");
        assert_eq!(origin.line, 2);
    }
}
