//! Shader transpilation for webrashader.
//!
//! Rewrites the stages of a [`ShaderSource`] written for desktop GLSL or
//! Vulkan flavoured slang into GLSL ES that a WebGL context accepts:
//!
//! 1. types, qualifiers and directives are normalized for the target profile,
//! 2. texture lookups are rewritten to the functions the profile has,
//! 3. definitions repeated by textual includes are removed and forward
//!    declarations fabricated,
//! 4. names that are used but never declared get neutral declarations,
//! 5. globals the vertex stage hands to the fragment stage become varyings.
//!
//! Rewrites work on a lossless token stream in which comments and directives
//! are opaque, and every line of the output maps back to the line it was
//! written on through [`CompiledStage::map`].
#![forbid(missing_docs)]

mod builtins;
mod calls;
mod context;
mod dedup;
mod driver;
mod emit;
mod error;
mod normalize;
mod options;
mod promote;
mod reflect;
mod stubs;
mod syntax;
mod token;
#[cfg(test)]
mod validate;

pub use driver::blamed_line;
pub use emit::CompiledStage;
pub use error::*;
pub use options::*;
pub use calls::TEXEL_SIZE_PREFIX;
pub use promote::PROMOTED_PREFIX;
pub use reflect::{
    AttributeBinding, BindingStage, SamplerBinding, ShaderReflection, UniformInfo, UniformType,
};

use context::{StageUnit, TranspileContext};
use rustc_hash::FxHashMap;
use webrashader_common::map::ShortString;
use webrashader_common::ImageFormat;
use webrashader_preprocess::{ShaderParameter, ShaderSource};

/// A shader pass compiled for a WebGL profile.
#[derive(Debug, Clone)]
pub struct CompiledUnit {
    /// The path the source was loaded from.
    pub path: String,
    /// The profile the stages were written for.
    pub target: WebGlVersion,
    /// The vertex stage.
    pub vertex: CompiledStage,
    /// The fragment stage.
    pub fragment: CompiledStage,
    /// The parameters the source declares, in declaration order.
    pub parameters: Vec<ShaderParameter>,
    /// Uniforms, samplers and attributes of the compiled stages.
    pub reflection: ShaderReflection,
    /// The framebuffer format requested by `#pragma format`.
    pub format: ImageFormat,
    /// The alias declared by `#pragma name`.
    pub name: Option<ShortString>,
}

impl CompiledUnit {
    /// The compiled source of `stage`.
    pub fn stage(&self, stage: ShaderStage) -> &CompiledStage {
        match stage {
            ShaderStage::Vertex => &self.vertex,
            ShaderStage::Fragment => &self.fragment,
        }
    }
}

/// Transpile both stages of `source` for the profile named in `options`.
pub fn transpile(
    source: &ShaderSource,
    options: &TranspileOptions,
) -> Result<CompiledUnit, TranspileError> {
    let mut ctx = TranspileContext::new(options);
    let mut vertex = StageUnit::new(ShaderStage::Vertex, &source.vertex, &source.header)?;
    let mut fragment = StageUnit::new(ShaderStage::Fragment, &source.fragment, &source.header)?;

    for unit in [&mut vertex, &mut fragment] {
        normalize::normalize(&mut ctx, unit)?;
    }
    normalize::link_locations(&vertex, &mut fragment);
    normalize::match_precision(&ctx, &mut vertex, &fragment)?;

    for unit in [&mut vertex, &mut fragment] {
        calls::rewrite_calls(&ctx, unit)?;
        dedup::deduplicate(&mut ctx, unit)?;
    }

    if options.synthesize_stubs {
        stubs::synthesize_stubs(&mut vertex, &FxHashMap::default())?;
    }
    // fragment stubs come after promotion, so shared globals that can not be
    // varyings still get a declaration, typed as in the vertex stage
    let shared = promote::written_global_types(&vertex)?;
    if options.promote_globals {
        promote::promote_globals(&ctx, &mut vertex, &mut fragment)?;
    }
    if options.synthesize_stubs {
        stubs::synthesize_stubs(&mut fragment, &shared)?;
    }

    let reflection = reflect::reflect(&vertex, &fragment)?;
    tracing::trace!(
        path = %source.path,
        target = %options.target,
        uniforms = reflection.uniforms.len(),
        samplers = reflection.samplers.len(),
        "transpiled shader"
    );

    Ok(CompiledUnit {
        path: source.path.clone(),
        target: options.target,
        vertex: emit::emit(&vertex, options.target),
        fragment: emit::emit(&fragment, options.target),
        parameters: source.parameters.clone(),
        reflection,
        format: source.format,
        name: source.name.clone(),
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use webrashader_common::resolve::MemoryResolver;

    fn compile(text: &str, target: WebGlVersion) -> CompiledUnit {
        let source = ShaderSource::from_source("test.glsl", text, &mut MemoryResolver::new()).unwrap();
        transpile(&source, &TranspileOptions::for_target(target)).unwrap()
    }

    fn assert_well_formed(unit: &CompiledUnit) {
        for stage in [ShaderStage::Vertex, ShaderStage::Fragment] {
            let source = &unit.stage(stage).source;
            let problems = validate::problems(source, unit.target);
            assert!(problems.is_empty(), "{stage} stage: {problems:?}\n{source}");
        }
    }

    const TEXEL_LOOKUPS: &str = "#version 130
uniform vec2 TextureSize;
#if defined(VERTEX)
in vec4 VertexCoord;
in vec4 TexCoord;
out vec4 TEX0;
uniform mat4 MVPMatrix;
void main() {
    gl_Position = MVPMatrix * VertexCoord;
    TEX0 = TexCoord;
}
#elif defined(FRAGMENT)
in vec4 TEX0;
uniform sampler2D Texture;
out vec4 FragColor;
void main() {
    vec2 texel = 1.0 / TextureSize;
    vec4 fetched = texelFetch(Texture, ivec2(1, 1), 0);
    vec4 shifted = textureOffset(Texture, TEX0.xy, ivec2(1, 0));
    vec4 lod = textureLodOffset(Texture, TEX0.xy, 0.0, ivec2(0, 1));
    vec2 size = vec2(textureSize(Texture, 0));
    FragColor = fetched + shifted + lod + vec4(size * texel, 0.0, 1.0);
}
#endif
";

    #[test]
    fn texel_lookups_are_well_formed() {
        for target in [WebGlVersion::WebGl1, WebGlVersion::WebGl2] {
            assert_well_formed(&compile(TEXEL_LOOKUPS, target));
        }

        let unit = compile(TEXEL_LOOKUPS, WebGlVersion::WebGl1);
        assert!(unit.fragment.source.contains("uniform vec4 _wr_TextureSize;"));
        assert!(unit.fragment.source.contains("uniform vec2 TextureSize;"));
        let sizes: Vec<(&str, UniformType)> = unit
            .reflection
            .uniforms
            .iter()
            .filter(|u| u.name.ends_with("TextureSize"))
            .map(|u| (u.name.as_str(), u.ty))
            .collect();
        assert!(sizes.contains(&("TextureSize", UniformType::Vec(2))));
        assert!(sizes.contains(&("_wr_TextureSize", UniformType::Vec(4))));
    }

    const SHARED_FLAGS: &str = "#version 130
#if defined(VERTEX)
in vec4 VertexCoord;
uniform mat4 MVPMatrix;
bool flag;
int mode;
float weight;
void main() {
    flag = true;
    mode = 2;
    weight = 0.5;
    gl_Position = MVPMatrix * VertexCoord;
}
#elif defined(FRAGMENT)
out vec4 FragColor;
void main() {
    FragColor = vec4(flag ? 1.0 : 0.0, float(mode), weight, 1.0);
}
#endif
";

    #[test]
    fn shared_globals_are_declared_in_both_stages() {
        let unit = compile(SHARED_FLAGS, WebGlVersion::WebGl2);
        assert_well_formed(&unit);
        let fragment = &unit.fragment.source;
        assert!(fragment.contains("const bool flag = false;"), "{fragment}");
        assert!(fragment.contains("flat in int _wr_v_mode;"), "{fragment}");
        assert!(fragment.contains("in float _wr_v_weight;"), "{fragment}");

        let unit = compile(SHARED_FLAGS, WebGlVersion::WebGl1);
        assert_well_formed(&unit);
        let fragment = &unit.fragment.source;
        assert!(fragment.contains("const bool flag = false;"), "{fragment}");
        assert!(fragment.contains("const int mode = 0;"), "{fragment}");
        assert!(fragment.contains("varying float _wr_v_weight;"), "{fragment}");
        assert!(unit.vertex.source.contains("int mode;"));
    }

    const SHARED_UNIFORMS: &str = "#version 450
layout(push_constant) uniform Push { vec4 OutputSize; uint FrameCount; } params;
#pragma stage vertex
layout(location = 0) in vec4 Position;
void main() { gl_Position = Position * params.OutputSize; }
#pragma stage fragment
layout(location = 0) out vec4 FragColor;
void main() { FragColor = vec4(float(params.FrameCount)); }
";

    #[test]
    fn shared_uniforms_have_one_precision() {
        let unit = compile(SHARED_UNIFORMS, WebGlVersion::WebGl1);
        assert_well_formed(&unit);
        let guarded = "#ifdef GL_FRAGMENT_PRECISION_HIGH\nprecision highp float;\n#else\nprecision mediump float;\n#endif";
        assert!(unit.vertex.source.contains(guarded), "{}", unit.vertex.source);
        assert!(unit.vertex.source.contains("precision mediump int;"));
        assert!(unit.fragment.source.contains(guarded));

        let source = ShaderSource::from_source("test.glsl", SHARED_UNIFORMS, &mut MemoryResolver::new()).unwrap();
        let options = TranspileOptions {
            float_precision: Precision::Mediump,
            ..TranspileOptions::for_target(WebGlVersion::WebGl2)
        };
        let unit = transpile(&source, &options).unwrap();
        assert_well_formed(&unit);
        assert!(unit.vertex.source.contains("precision mediump float;"));
        assert!(unit.fragment.source.contains("precision mediump float;"));
    }

    #[test]
    fn slang_passes_are_well_formed() {
        let text = "#version 450
layout(push_constant) uniform Push { vec4 SourceSize; float BOOST; } params;
#pragma parameter BOOST \"Red boost\" 2.0 0.0 4.0 0.05
layout(std140, set = 0, binding = 0) uniform UBO { mat4 MVP; } global;
#pragma stage vertex
layout(location = 0) in vec4 Position;
layout(location = 1) in vec2 TexCoord;
layout(location = 0) out vec2 vTexCoord;
void main() { gl_Position = global.MVP * Position; vTexCoord = TexCoord; }
#pragma stage fragment
layout(location = 0) in vec2 vTexCoord;
layout(location = 0) out vec4 FragColor;
layout(set = 0, binding = 2) uniform sampler2D Source;
void main() {
    vec4 color = texelFetch(Source, ivec2(vTexCoord * params.SourceSize.xy), 0);
    FragColor = vec4(color.r * params.BOOST, color.gba);
}
";
        for target in [WebGlVersion::WebGl1, WebGlVersion::WebGl2] {
            let unit = compile(text, target);
            assert_well_formed(&unit);
            assert!(!unit.fragment.source.contains("_wr_SourceSize"));
        }
    }
}
