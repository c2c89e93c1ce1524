use pretty_assertions::assert_eq;
use webrashader_common::resolve::MemoryResolver;
use webrashader_presets::ShaderPreset;
use webrashader_runtime::compile::compile_preset;
use webrashader_runtime::error::CompileError;
use webrashader_runtime::graph::{PassGraph, UniformSource};
use webrashader_runtime::parameters::ParameterTable;
use webrashader_runtime::semantics::TextureSemantics;
use webrashader_transpile::{TranspileOptions, WebGlVersion};

const STOCK: &str = r#"#version 450
layout(push_constant) uniform Push {
    vec4 SourceSize;
    float GAIN;
} params;
layout(std140, set = 0, binding = 0) uniform UBO { mat4 MVP; } global;
#pragma parameter GAIN "Gain" 1.0 0.0 2.0 0.1
#pragma stage vertex
layout(location = 0) in vec4 Position;
layout(location = 1) in vec2 TexCoord;
layout(location = 0) out vec2 vTexCoord;
void main() { gl_Position = global.MVP * Position; vTexCoord = TexCoord; }
#pragma stage fragment
layout(location = 0) in vec2 vTexCoord;
layout(location = 0) out vec4 FragColor;
layout(set = 0, binding = 2) uniform sampler2D Source;
void main() { FragColor = texture(Source, vTexCoord * params.SourceSize.xy * params.SourceSize.zw) * params.GAIN; }
"#;

const LEGACY: &str = r#"#version 130
#pragma parameter GAIN "Gain" 1.5 0.0 2.0 0.1
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
#ifdef PARAMETER_UNIFORM
uniform float GAIN;
#else
#define GAIN 1.5
#endif
in vec4 TEX0;
uniform sampler2D Texture;
uniform sampler2D PrevTexture;
uniform vec2 TextureSize;
out vec4 FragColor;
void main() {
    FragColor = mix(texture(Texture, TEX0.xy), texture(PrevTexture, TEX0.xy), 0.5) * GAIN + vec4(TextureSize, 0.0, 0.0) * 0.0;
}
#endif
"#;

fn resolver() -> MemoryResolver {
    MemoryResolver::new()
        .with("shaders/stock.slang", STOCK)
        .with("shaders/legacy.glsl", LEGACY)
        .with(
            "presets/base.slangp",
            "shaders = 2\nshader0 = ../shaders/stock.slang\nshader1 = ../shaders/legacy.glsl\nscale_type1 = viewport\n",
        )
}

#[test]
fn compiles_every_pass() {
    let mut resolver = resolver();
    let text = "#reference \"base.slangp\"\nGAIN = 0.5\n";
    let preset = ShaderPreset::parse_with_references("presets/mine.slangp", text, &mut resolver).unwrap();

    for target in [WebGlVersion::WebGl1, WebGlVersion::WebGl2] {
        let passes =
            compile_preset(&preset, &mut resolver, &TranspileOptions::for_target(target)).unwrap();
        assert_eq!(passes.len(), preset.shaders.len());
        assert!(passes.iter().all(|p| p.unit.target == target));

        let parameters = ParameterTable::resolve(
            passes.iter().map(|p| p.unit.parameters.as_slice()),
            &preset.parameters,
            &[],
        )
        .unwrap();
        // the first declaration keeps its initial value, the preset overrides it
        assert_eq!(parameters.len(), 1);
        assert_eq!(parameters.entry("GAIN").map(|e| e.meta.initial), Some(1.0));
        assert_eq!(parameters.get("GAIN"), Some(0.5));

        let graph = PassGraph::build(&passes, &preset.textures, &parameters).unwrap();
        assert_eq!(graph.passes.len(), 2);
        assert_eq!(graph.required_history, 1);

        let legacy = &graph.passes[1];
        let textures: Vec<_> = legacy
            .textures
            .iter()
            .map(|t| (t.name.as_str(), t.source))
            .collect();
        assert_eq!(
            textures,
            vec![
                ("Texture", TextureSemantics::Source.semantics(0)),
                ("PrevTexture", TextureSemantics::OriginalHistory.semantics(1)),
            ]
        );
        let texture_size = legacy
            .uniforms
            .iter()
            .find(|u| u.name == "TextureSize")
            .map(|u| u.source.clone());
        assert_eq!(
            texture_size,
            Some(UniformSource::TextureSize(TextureSemantics::Source.semantics(0)))
        );
    }
}

#[test]
fn reports_the_failing_pass() {
    let mut resolver = resolver();
    let preset = ShaderPreset::parse(
        "shaders = 2\nshader0 = shaders/stock.slang\nshader1 = shaders/missing.slang\n",
    )
    .unwrap();
    let err = compile_preset(&preset, &mut resolver, &TranspileOptions::default()).unwrap_err();
    assert!(matches!(err, CompileError::Preprocess { pass: 1, .. }));
}
