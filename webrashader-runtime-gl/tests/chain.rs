use pretty_assertions::assert_eq;
use webrashader_common::resolve::MemoryResolver;
use webrashader_common::Size;
use webrashader_presets::ShaderPreset;
use webrashader_runtime::error::{ReferenceError, ResolveError};
use webrashader_runtime::image::Image;
use webrashader_runtime_gl::device::Device;
use webrashader_runtime_gl::diagnostics::FrameDiagnostic;
use webrashader_runtime_gl::software::{SoftwareDevice, SoftwareTexture};
use webrashader_runtime_gl::{
    ChainState, FilterChain, FilterChainError, FilterChainOptions, FrameOptions, InputImage,
};
use webrashader_transpile::ShaderStage;

const BOOST: &str = r#"#version 450
layout(push_constant) uniform Push {
    vec4 SourceSize;
    float BOOST;
} params;
layout(std140, set = 0, binding = 0) uniform UBO { mat4 MVP; } global;
#pragma parameter BOOST "Red boost" 2.0 0.0 4.0 0.05
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
    vec4 color = texture(Source, vTexCoord);
    FragColor = vec4(color.r * params.BOOST, color.gba);
}
"#;

const STOCK: &str = r#"#version 450
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
void main() { FragColor = texture(Source, vTexCoord); }
"#;

const COUNTER: &str = r#"#version 450
layout(push_constant) uniform Push { uint FrameCount; } params;
layout(std140, set = 0, binding = 0) uniform UBO { mat4 MVP; } global;
#pragma stage vertex
layout(location = 0) in vec4 Position;
layout(location = 1) in vec2 TexCoord;
layout(location = 0) out vec2 vTexCoord;
void main() { gl_Position = global.MVP * Position; vTexCoord = TexCoord; }
#pragma stage fragment
layout(location = 0) in vec2 vTexCoord;
layout(location = 0) out vec4 FragColor;
layout(set = 0, binding = 2) uniform sampler2D PassFeedback0;
void main() {
    float previous = texture(PassFeedback0, vTexCoord).r;
    FragColor = vec4(float(params.FrameCount) / 255.0, previous, 0.0, 1.0);
}
"#;

const HISTORY: &str = r#"#version 450
layout(std140, set = 0, binding = 0) uniform UBO { mat4 MVP; } global;
#pragma stage vertex
layout(location = 0) in vec4 Position;
layout(location = 1) in vec2 TexCoord;
layout(location = 0) out vec2 vTexCoord;
void main() { gl_Position = global.MVP * Position; vTexCoord = TexCoord; }
#pragma stage fragment
layout(location = 0) in vec2 vTexCoord;
layout(location = 0) out vec4 FragColor;
layout(set = 0, binding = 2) uniform sampler2D OriginalHistory1;
void main() { FragColor = texture(OriginalHistory1, vTexCoord); }
"#;

const AHEAD: &str = r#"#version 450
layout(std140, set = 0, binding = 0) uniform UBO { mat4 MVP; } global;
#pragma stage vertex
layout(location = 0) in vec4 Position;
layout(location = 1) in vec2 TexCoord;
layout(location = 0) out vec2 vTexCoord;
void main() { gl_Position = global.MVP * Position; vTexCoord = TexCoord; }
#pragma stage fragment
layout(location = 0) in vec2 vTexCoord;
layout(location = 0) out vec4 FragColor;
layout(set = 0, binding = 2) uniform sampler2D later;
void main() { FragColor = texture(later, vTexCoord); }
"#;

fn resolver() -> MemoryResolver {
    MemoryResolver::new()
        .with("shaders/boost.slang", BOOST)
        .with("shaders/stock.slang", STOCK)
        .with("shaders/counter.slang", COUNTER)
        .with("shaders/history.slang", HISTORY)
        .with("shaders/ahead.slang", AHEAD)
}

fn preset(text: &str, resolver: &mut MemoryResolver) -> ShaderPreset {
    ShaderPreset::parse_with_references("presets/test.slangp", text, resolver).unwrap()
}

const THREE_PASS: &str = "shaders = 3
shader0 = ../shaders/boost.slang
shader1 = ../shaders/stock.slang
shader2 = ../shaders/stock.slang
filter_linear0 = false
filter_linear1 = false
filter_linear2 = false
";

fn device() -> SoftwareDevice {
    let device = SoftwareDevice::default();
    device.register("BOOST", |context| {
        let color = context.sample("Source", context.uv);
        [color[0] * context.float("BOOST"), color[1], color[2], color[3]]
    });
    device.register("FrameCount", |context| {
        let previous = context.sample("PassFeedback0", context.uv);
        [context.float("FrameCount") / 255.0, previous[0], 0.0, 1.0]
    });
    device.register("OriginalHistory1", |context| {
        context.sample("OriginalHistory1", context.uv)
    });
    device
}

fn input(device: &mut SoftwareDevice, size: Size<u32>, color: [u8; 4]) -> InputImage<SoftwareTexture> {
    let bytes = color.repeat(size.width as usize * size.height as usize);
    let texture = device
        .create_input(&Image { bytes, size })
        .unwrap();
    InputImage { texture, size }
}

fn uniform(pixels: &[[u8; 4]]) -> [u8; 4] {
    assert!(!pixels.is_empty());
    assert!(pixels.iter().all(|pixel| *pixel == pixels[0]), "{pixels:?}");
    pixels[0]
}

fn chain(device: &SoftwareDevice, text: &str) -> FilterChain<SoftwareDevice> {
    let mut resolver = resolver();
    let preset = preset(text, &mut resolver);
    let mut chain = FilterChain::new(device.clone(), &FilterChainOptions::default());
    chain.load_preset(&preset, &mut resolver).unwrap();
    chain
}

#[test]
fn renders_every_pass_to_the_canvas() {
    let mut device = device();
    let source = input(&mut device, Size::new(4, 4), [50, 50, 50, 255]);
    let mut chain = chain(&device, THREE_PASS);
    assert_eq!(chain.pass_count(), 3);
    assert_eq!(chain.state(), ChainState::Ready);

    chain.resize(Size::new(8, 6));
    chain.frame(&source, &FrameOptions::default()).unwrap();
    assert_eq!(chain.state(), ChainState::Running);

    let (size, pixels) = device.canvas_pixels();
    assert_eq!(size, Size::new(8, 6));
    assert_eq!(uniform(&pixels), [100, 50, 50, 255]);
    assert!(chain.diagnostics().is_empty());
}

#[test]
fn renders_to_a_texture() {
    let mut device = device();
    let source = input(&mut device, Size::new(4, 4), [50, 50, 50, 255]);
    let mut chain = chain(&device, THREE_PASS);

    chain.resize(Size::new(2, 2));
    let output = chain
        .frame_to_texture(&source, &FrameOptions::default())
        .unwrap()
        .unwrap();
    let pixels = device.read_pixels(&output).unwrap();
    assert_eq!(pixels.len(), 4);
    assert_eq!(uniform(&pixels), [100, 50, 50, 255]);
}

#[test]
fn parameters_round_trip() {
    let mut device = device();
    let source = input(&mut device, Size::new(4, 4), [50, 50, 50, 255]);
    let mut chain = chain(&device, THREE_PASS);

    assert_eq!(chain.parameter("BOOST"), Some(2.0));
    assert_eq!(chain.set_parameter("BOOST", 1.0), Some(2.0));
    assert_eq!(chain.parameter("BOOST"), Some(1.0));
    assert_eq!(chain.set_parameter("MISSING", 1.0), None);

    chain.resize(Size::new(4, 4));
    chain.frame(&source, &FrameOptions::default()).unwrap();
    assert_eq!(uniform(&device.canvas_pixels().1), [50, 50, 50, 255]);
}

#[test]
fn preset_overrides_parameter_defaults() {
    let mut device = device();
    let source = input(&mut device, Size::new(4, 4), [50, 50, 50, 255]);
    let mut chain = chain(&device, &format!("{THREE_PASS}BOOST = 3.0\n"));

    assert_eq!(chain.parameter("BOOST"), Some(3.0));
    chain.resize(Size::new(4, 4));
    chain.frame(&source, &FrameOptions::default()).unwrap();
    assert_eq!(uniform(&device.canvas_pixels().1), [150, 50, 50, 255]);
}

#[test]
fn feedback_reads_the_previous_frame() {
    let mut device = device();
    let source = input(&mut device, Size::new(2, 2), [0, 0, 0, 255]);
    let mut chain = chain(
        &device,
        "shaders = 1\nshader0 = ../shaders/counter.slang\nfilter_linear0 = false\npersistent0 = true\n",
    );
    chain.resize(Size::new(2, 2));

    let mut frames = Vec::new();
    for _ in 0..3 {
        chain.frame(&source, &FrameOptions::default()).unwrap();
        frames.push(uniform(&device.canvas_pixels().1));
    }
    assert_eq!(
        frames,
        vec![[0, 0, 0, 255], [1, 0, 0, 255], [2, 1, 0, 255]]
    );
}

#[test]
fn history_holds_earlier_inputs() {
    let mut device = device();
    let first = input(&mut device, Size::new(2, 2), [10, 20, 30, 255]);
    let second = input(&mut device, Size::new(2, 2), [40, 50, 60, 255]);
    let mut chain = chain(
        &device,
        "shaders = 1\nshader0 = ../shaders/history.slang\nfilter_linear0 = false\n",
    );
    chain.resize(Size::new(2, 2));

    chain.frame(&first, &FrameOptions::default()).unwrap();
    assert_eq!(uniform(&device.canvas_pixels().1), [0, 0, 0, 0]);

    chain.frame(&second, &FrameOptions::default()).unwrap();
    assert_eq!(uniform(&device.canvas_pixels().1), [10, 20, 30, 255]);

    let options = FrameOptions {
        clear_history: true,
        ..FrameOptions::default()
    };
    chain.frame(&first, &options).unwrap();
    assert_eq!(uniform(&device.canvas_pixels().1), [0, 0, 0, 0]);
}

#[test]
fn rejects_forward_references() {
    let device = device();
    let mut resolver = resolver();
    let preset = preset(
        "shaders = 2\nshader0 = ../shaders/ahead.slang\nshader1 = ../shaders/stock.slang\nalias1 = later\n",
        &mut resolver,
    );
    let mut chain = FilterChain::new(device.clone(), &FilterChainOptions::default());
    let err = chain.load_preset(&preset, &mut resolver).unwrap_err();

    assert!(matches!(
        err,
        FilterChainError::Resolve(ResolveError::CyclicOrInvalidReference {
            pass: 0,
            reason: ReferenceError::ForwardReference { target: 1 },
            ..
        })
    ));
    assert_eq!(chain.state(), ChainState::Failed);
    assert_eq!(device.program_count(), 0);
}

#[test]
fn reports_driver_errors_with_their_origin() {
    let mut device = device();
    device.reject("BOOST", ShaderStage::Fragment, "0:12: error: rejected");
    let source = input(&mut device, Size::new(2, 2), [0, 0, 0, 255]);

    let mut resolver = resolver();
    let preset = preset(THREE_PASS, &mut resolver);
    let mut chain = FilterChain::new(device.clone(), &FilterChainOptions::default());
    let err = chain.load_preset(&preset, &mut resolver).unwrap_err();

    let FilterChainError::DriverCompile {
        pass, stage, log, ..
    } = err
    else {
        panic!("unexpected error {err:?}");
    };
    assert_eq!((pass, stage), (0, ShaderStage::Fragment));
    assert!(log.contains("rejected"));
    assert_eq!(chain.state(), ChainState::Failed);

    chain.resize(Size::new(2, 2));
    assert!(matches!(
        chain.frame(&source, &FrameOptions::default()),
        Err(FilterChainError::NotReady(ChainState::Failed))
    ));
}

#[test]
fn drops_frames_without_a_viewport() {
    let mut device = device();
    let source = input(&mut device, Size::new(2, 2), [0, 0, 0, 255]);
    let mut chain = chain(&device, THREE_PASS);

    chain.frame(&source, &FrameOptions::default()).unwrap();
    let diagnostics = chain.diagnostics();
    assert!(matches!(
        diagnostics.as_slice(),
        [FrameDiagnostic::ResizeRace { frame: 0, pass: None, .. }]
    ));
    assert_eq!(chain.state(), ChainState::Ready);

    chain.resize(Size::new(0, 4));
    chain.resize(Size::new(4, 4));
    assert_eq!(chain.viewport(), Size::new(4, 4));
    chain.frame(&source, &FrameOptions::default()).unwrap();
    assert!(chain.diagnostics().is_empty());
    assert_eq!(chain.state(), ChainState::Running);
}

#[test]
fn releases_resources_on_drop() {
    let mut device = device();
    let source = input(&mut device, Size::new(2, 2), [0, 0, 0, 255]);
    let mut chain = chain(&device, THREE_PASS);
    chain.resize(Size::new(4, 4));
    chain.frame(&source, &FrameOptions::default()).unwrap();
    assert!(device.texture_count() > 1);
    assert_eq!(device.program_count(), 3);

    drop(chain);
    assert_eq!(device.texture_count(), 1);
    assert_eq!(device.program_count(), 0);
}

#[test]
fn reloading_replaces_the_pipeline() {
    let mut device = device();
    let source = input(&mut device, Size::new(2, 2), [50, 50, 50, 255]);
    let mut chain = chain(&device, THREE_PASS);
    chain.resize(Size::new(2, 2));
    chain.frame(&source, &FrameOptions::default()).unwrap();

    let mut resolver = resolver();
    let single = preset(
        "shaders = 1\nshader0 = ../shaders/stock.slang\nfilter_linear0 = false\n",
        &mut resolver,
    );
    chain.load_preset(&single, &mut resolver).unwrap();
    assert_eq!(chain.pass_count(), 1);
    assert_eq!(device.program_count(), 1);
    assert_eq!(chain.parameter("BOOST"), None);

    chain.frame(&source, &FrameOptions::default()).unwrap();
    assert_eq!(uniform(&device.canvas_pixels().1), [50, 50, 50, 255]);
    assert!(chain.device().capabilities().float_render_targets);
}
