use pretty_assertions::assert_eq;
use webrashader_common::resolve::MemoryResolver;
use webrashader_preprocess::ShaderSource;
use webrashader_transpile::{
    transpile, BindingStage, TranspileError, TranspileOptions, UniformType, WebGlVersion,
};

const BOOST: &str = r#"#version 450

layout(push_constant) uniform Push {
    vec4 SourceSize;
    float BOOST;
} params;

#pragma parameter BOOST "Red boost" 2.0 0.0 4.0 0.05

layout(std140, set = 0, binding = 0) uniform UBO {
    mat4 MVP;
} global;

#pragma stage vertex
layout(location = 0) in vec4 Position;
layout(location = 1) in vec2 TexCoord;
layout(location = 0) out vec2 vTexCoord;

void main() {
    gl_Position = global.MVP * Position;
    vTexCoord = TexCoord;
}

#pragma stage fragment
layout(location = 0) in vec2 vTexCoord;
layout(location = 0) out vec4 FragColor;
layout(set = 0, binding = 2) uniform sampler2D Source;

void main() {
    vec4 color = texture(Source, vTexCoord);
    FragColor = vec4(color.r * params.BOOST, color.gba);
}
"#;

fn load(path: &str, text: &str, resolver: &mut MemoryResolver) -> ShaderSource {
    ShaderSource::from_source(path, text, resolver).unwrap()
}

fn words(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

#[test]
fn slang_for_webgl2() {
    let source = load("shaders/boost.slang", BOOST, &mut MemoryResolver::new());
    let unit = transpile(&source, &TranspileOptions::for_target(WebGlVersion::WebGl2)).unwrap();

    let vertex = &unit.vertex.source;
    assert!(vertex.starts_with("#version 300 es\n"));
    assert!(vertex.contains("uniform mat4 MVP;"));
    assert!(vertex.contains("gl_Position = MVP * Position;"));
    assert!(vertex.contains("layout(location = 0) in vec4 Position;"));
    assert!(!vertex.contains("global."));
    assert!(!vertex.contains("push_constant"));

    let fragment = &unit.fragment.source;
    assert!(fragment.contains("precision highp float;"));
    assert!(fragment.contains("uniform float BOOST;"));
    assert!(fragment.contains("in vec2 vTexCoord;"));
    assert!(fragment.contains("layout(location = 0) out vec4 FragColor;"));
    assert!(fragment.contains("FragColor = vec4(color.r * BOOST, color.gba);"));
    assert!(!fragment.contains("params."));

    assert_eq!(unit.parameters.len(), 1);
    assert_eq!(unit.parameters[0].id.as_str(), "BOOST");

    let uniform = |name: &str| {
        unit.reflection
            .uniforms
            .iter()
            .find(|u| u.name == name)
            .map(|u| (u.ty, u.stages))
    };
    assert_eq!(uniform("MVP"), Some((UniformType::Mat(4, 4), BindingStage::VERTEX)));
    assert_eq!(uniform("BOOST"), Some((UniformType::Float, BindingStage::FRAGMENT)));
    // declared by the block but never read
    assert_eq!(uniform("SourceSize"), None);

    assert_eq!(unit.reflection.samplers.len(), 1);
    assert_eq!(unit.reflection.samplers[0].name, "Source");
    assert_eq!(unit.reflection.samplers[0].binding, 0);

    let attributes: Vec<(&str, u32)> = unit
        .reflection
        .attributes
        .iter()
        .map(|a| (a.name.as_str(), a.location))
        .collect();
    assert_eq!(attributes, vec![("Position", 0), ("TexCoord", 1)]);
}

#[test]
fn slang_for_webgl1() {
    let source = load("shaders/boost.slang", BOOST, &mut MemoryResolver::new());
    let unit = transpile(&source, &TranspileOptions::for_target(WebGlVersion::WebGl1)).unwrap();

    let vertex = &unit.vertex.source;
    assert!(vertex.starts_with("#version 100\n"));
    assert!(vertex.contains("attribute vec4 Position;"));
    assert!(vertex.contains("attribute vec2 TexCoord;"));
    assert!(vertex.contains("varying vec2 vTexCoord;"));
    assert!(!vertex.contains("layout"));

    let fragment = &unit.fragment.source;
    assert!(fragment.contains("#ifdef GL_FRAGMENT_PRECISION_HIGH"));
    assert!(fragment.contains("varying vec2 vTexCoord;"));
    assert!(fragment.contains("vec4 color = texture2D(Source, vTexCoord);"));
    assert!(fragment.contains("gl_FragColor = vec4(color.r * BOOST, color.gba);"));
    assert!(!fragment.contains("out vec4"));
}

#[test]
fn target_dialect_is_unchanged() {
    let vertex = "layout(location = 0) in vec4 Position;\nin vec2 TexCoord;\nout vec2 uv;\nuniform mat4 MVP;\nvoid main() {\n    gl_Position = MVP * Position;\n    uv = TexCoord;\n}\n";
    let fragment = "precision mediump float;\nin vec2 uv;\nout vec4 color;\nuniform sampler2D Source;\nvoid main() {\n    color = texture(Source, uv);\n}\n";
    let text = format!(
        "#version 300 es\n#pragma stage vertex\n{vertex}#pragma stage fragment\n{fragment}"
    );
    let source = load("shaders/stock.glsl", &text, &mut MemoryResolver::new());
    let unit = transpile(&source, &TranspileOptions::for_target(WebGlVersion::WebGl2)).unwrap();

    let expected_vertex = format!("#version 300 es\n{vertex}");
    let expected_fragment = format!("#version 300 es\n{fragment}");
    assert_eq!(words(&unit.vertex.source), words(&expected_vertex));
    assert_eq!(words(&unit.fragment.source), words(&expected_fragment));
}

#[test]
fn deduplicates_included_definitions() {
    let mut resolver = MemoryResolver::new()
        .with(
            "shaders/inc/color.inc",
            "const float GAMMA = 2.2;\nvec3 luma(vec3 c) { return vec3(dot(c, vec3(0.3, 0.6, 0.1))); }\n",
        )
        .with(
            "shaders/inc/grade.inc",
            "const float GAMMA = 2.2;\nvec3 luma(vec3 c) { return vec3(dot(c, vec3(0.2, 0.7, 0.1))); }\nfloat luma(float x) { return x; }\nvec3 grade(vec3 c) { return pow(luma(c), vec3(GAMMA)); }\n",
        );
    let text = "#version 450\n#pragma stage vertex\nlayout(location = 0) in vec4 Position;\nvoid main() { gl_Position = Position; }\n#pragma stage fragment\n#include \"inc/color.inc\"\n#include \"inc/grade.inc\"\nlayout(location = 0) out vec4 FragColor;\nvoid main() { FragColor = vec4(grade(vec3(luma(0.5))), 1.0); }\n";
    let source = load("shaders/grade.slang", text, &mut resolver);
    let unit = transpile(&source, &TranspileOptions::default()).unwrap();

    let fragment = &unit.fragment.source;
    assert_eq!(fragment.matches("vec3 luma(vec3 c)").count(), 1);
    assert_eq!(fragment.matches("float luma(float x)").count(), 1);
    assert_eq!(fragment.matches("const float GAMMA").count(), 1);
    // the first definition is the one kept
    assert!(fragment.contains("vec3(0.3, 0.6, 0.1)"));
    assert!(!fragment.contains("vec3(0.2, 0.7, 0.1)"));
}

#[test]
fn synthesizes_missing_declarations() {
    let text = "#version 450\n#pragma stage vertex\nlayout(location = 0) in vec4 Position;\nlayout(location = 0) out vec2 uv;\nvoid main() { gl_Position = Position; uv = Position.xy; }\n#pragma stage fragment\nlayout(location = 0) in vec2 uv;\nlayout(location = 0) out vec4 FragColor;\nvoid main() {\n    float v = curve(uv);\n    float g = gain;\n    FragColor = vec4(v * g);\n}\n";
    let source = load("shaders/stub.slang", text, &mut MemoryResolver::new());

    let unit = transpile(&source, &TranspileOptions::default()).unwrap();
    let fragment = &unit.fragment.source;
    assert!(fragment.contains("float curve(vec2 a0) { return 0.0; }"));
    assert!(fragment.contains("const float gain = 0.0;"));

    let options = TranspileOptions {
        synthesize_stubs: false,
        ..TranspileOptions::default()
    };
    let unit = transpile(&source, &options).unwrap();
    assert!(!unit.fragment.source.contains("float curve("));
}

#[test]
fn promotes_shared_globals() {
    let text = "#version 130\nvec2 shift;\n#if defined(VERTEX)\nin vec4 VertexCoord;\nin vec4 TexCoord;\nout vec4 TEX0;\nuniform mat4 MVPMatrix;\nvoid main() {\n    shift = vec2(0.5);\n    gl_Position = MVPMatrix * VertexCoord;\n    TEX0 = TexCoord;\n}\n#elif defined(FRAGMENT)\nin vec4 TEX0;\nuniform sampler2D Texture;\nout vec4 FragColor;\nvoid main() {\n    FragColor = texture(Texture, TEX0.xy + shift);\n}\n#endif\n";
    let source = load("shaders/shift.glsl", text, &mut MemoryResolver::new());
    let unit = transpile(&source, &TranspileOptions::for_target(WebGlVersion::WebGl1)).unwrap();

    let vertex = &unit.vertex.source;
    assert!(vertex.contains("varying vec2 _wr_v_shift;"));
    assert!(vertex.contains("_wr_v_shift = vec2(0.5);"));
    assert!(vertex.contains("attribute vec4 VertexCoord;"));
    assert!(vertex.contains("varying vec4 TEX0;"));
    assert!(!vertex.contains("vec2 shift;"));

    let fragment = &unit.fragment.source;
    assert!(fragment.contains("varying vec2 _wr_v_shift;"));
    assert!(fragment.contains("gl_FragColor = texture2D(Texture, TEX0.xy + _wr_v_shift);"));
    assert!(!fragment.contains("vec2 shift;"));
}

#[test]
fn errors_name_the_written_line() {
    let mut resolver = MemoryResolver::new().with(
        "shaders/inc/mode.inc",
        "// selected mode\nlayout(location = 1) flat in int mode;\n",
    );
    let text = "#version 450\n#pragma stage vertex\nlayout(location = 0) in vec4 Position;\nvoid main() { gl_Position = Position; }\n#pragma stage fragment\n#include \"inc/mode.inc\"\nlayout(location = 0) out vec4 FragColor;\nvoid main() { FragColor = vec4(float(mode)); }\n";
    let source = load("shaders/mode.slang", text, &mut resolver);

    let err = transpile(&source, &TranspileOptions::for_target(WebGlVersion::WebGl1)).unwrap_err();
    let TranspileError::Unsupported { target, origin, .. } = err else {
        panic!("expected an unsupported construct, got {err:?}");
    };
    assert_eq!(target, WebGlVersion::WebGl1);
    assert_eq!(&*origin.file, "shaders/inc/mode.inc");
    assert_eq!(origin.line, 2);

    // WebGL 2 has flat integer varyings
    assert!(transpile(&source, &TranspileOptions::for_target(WebGlVersion::WebGl2)).is_ok());
}

#[test]
fn driver_logs_map_to_source() {
    let source = load("shaders/boost.slang", BOOST, &mut MemoryResolver::new());
    let unit = transpile(&source, &TranspileOptions::default()).unwrap();

    let compiled_line = unit
        .fragment
        .source
        .lines()
        .position(|l| l.contains("color.r * BOOST"))
        .unwrap() as u32
        + 1;
    let written_line = BOOST
        .lines()
        .position(|l| l.contains("color.r * params.BOOST"))
        .unwrap() as u32
        + 1;

    let log = format!("ERROR: 0:{compiled_line}: 'BOOST' : undeclared identifier\n");
    let origin = unit.fragment.locate(&log).unwrap();
    assert_eq!(&*origin.file, "shaders/boost.slang");
    assert_eq!(origin.line, written_line);
}
