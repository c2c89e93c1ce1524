use pretty_assertions::assert_eq;
use webrashader_common::resolve::MemoryResolver;
use webrashader_presets::{
    FilterMode, MalformedReason, ParsePresetError, ScaleFactor, ScaleType, ShaderPreset, WrapMode,
};

const BOOST: &str = r#"
shaders = 3

shader0 = shaders/copy.slang
scale_type0 = source
scale0 = 1.0

shader1 = "shaders/boost.slang"
filter_linear1 = false
alias1 = BoostPass

shader2 = shaders/copy.slang // final
scale_type2 = viewport

BOOST = 2.0
"#;

#[test]
fn parses_boost_preset() {
    let preset = ShaderPreset::parse(BOOST).unwrap();
    assert_eq!(preset.shader_count, 3);
    assert_eq!(preset.shaders.len(), 3);
    assert_eq!(preset.shaders[1].name, "shaders/boost.slang");
    assert_eq!(preset.shaders[1].alias(), Some("BoostPass"));
    assert_eq!(preset.shaders[1].filter, FilterMode::Nearest);
    assert_eq!(preset.shaders[2].scaling.x.scale_type, ScaleType::Viewport);
    assert!(!preset.shaders[1].scaling.valid);
    assert_eq!(preset.parameters.len(), 1);
    assert_eq!(preset.parameters[0].name, "BOOST");
    assert_eq!(preset.parameters[0].value, 2.0);
}

#[test]
fn keys_may_appear_in_any_order() {
    let preset = ShaderPreset::parse(
        "scale_type_x0 = absolute\nscale_x0 = 640\nshader0 = a.slang\nshaders = 1\nscale_type_y0 = viewport\n",
    )
    .unwrap();
    let pass = &preset.shaders[0];
    assert!(pass.scaling.valid);
    assert_eq!(pass.scaling.x.scale_type, ScaleType::Absolute);
    assert_eq!(pass.scaling.x.factor, ScaleFactor::Absolute(640));
    assert_eq!(pass.scaling.y.scale_type, ScaleType::Viewport);
    assert_eq!(pass.scaling.y.factor, ScaleFactor::Float(1.0));
}

#[test]
fn scale_takes_priority_over_axes() {
    let preset = ShaderPreset::parse(
        "shaders = 1\nshader0 = a.slang\nscale_type0 = source\nscale_type_x0 = viewport\nscale0 = 2.0\nscale_x0 = 3.0\n",
    )
    .unwrap();
    let scaling = &preset.shaders[0].scaling;
    assert_eq!(scaling.x.scale_type, ScaleType::Input);
    assert_eq!(scaling.x.factor, ScaleFactor::Float(2.0));
    assert_eq!(scaling.y.factor, ScaleFactor::Float(2.0));
}

#[test]
fn rejects_fewer_shaders_than_declared() {
    let err = ShaderPreset::parse("shaders = 3\nshader0 = a.slang\nshader1 = b.slang\n").unwrap_err();
    match err {
        ParsePresetError::MalformedPreset { line, reason } => {
            assert_eq!(line, 1);
            assert_eq!(
                reason,
                MalformedReason::ShaderCountMismatch {
                    declared: 3,
                    found: 2
                }
            );
        }
        e => panic!("unexpected error {e:?}"),
    }
}

#[test]
fn rejects_indexed_keys_past_the_pass_count() {
    let err = ShaderPreset::parse("shaders = 1\nshader0 = a.slang\n\nscale1 = 2.0\n").unwrap_err();
    assert!(matches!(
        err,
        ParsePresetError::MalformedPreset {
            line: 4,
            reason: MalformedReason::IndexOutOfRange { index: 1, count: 1, .. }
        }
    ));

    let err = ShaderPreset::parse("shaders = 1\nshader0 = a.slang\nshader1 = b.slang\n").unwrap_err();
    assert!(matches!(
        err,
        ParsePresetError::MalformedPreset {
            line: 3,
            reason: MalformedReason::IndexOutOfRange { index: 1, .. }
        }
    ));
}

#[test]
fn rejects_missing_count_and_duplicates() {
    let err = ShaderPreset::parse("shader0 = a.slang\n").unwrap_err();
    assert!(matches!(
        err,
        ParsePresetError::MalformedPreset {
            reason: MalformedReason::MissingShaderCount,
            ..
        }
    ));

    let err =
        ShaderPreset::parse("shaders = 1\nshader0 = a.slang\nshader0 = b.slang\n").unwrap_err();
    assert!(matches!(
        err,
        ParsePresetError::MalformedPreset {
            line: 3,
            reason: MalformedReason::DuplicateShader(0)
        }
    ));
}

#[test]
fn reports_bad_values_with_their_line() {
    let err = ShaderPreset::parse("shaders = 1\nshader0 = a.slang\nscale_type0 = huge\n").unwrap_err();
    assert!(matches!(err, ParsePresetError::InvalidScaleType { row: 3, .. }));

    let err =
        ShaderPreset::parse("shaders = 1\nshader0 = a.slang\nfilter_linear0 = maybe\n").unwrap_err();
    assert!(matches!(err, ParsePresetError::ParserError { row: 3, .. }));
}

#[test]
fn parses_textures_and_pass_flags() {
    let preset = ShaderPreset::parse(
        r#"
shaders = 2
shader0 = passes/a.slang
float_framebuffer0 = true
frame_count_mod0 = 4
mipmap_input0 = 1
persistent0 = true
wrap_mode0 = repeat
shader1 = passes/b.slang
srgb_framebuffer1 = true

textures = "Mask;Noise"
Mask = ../luts/mask.png
Mask_linear = true
Mask_wrap_mode = mirrored_repeat
Noise = luts/noise.png
Noise_mipmap = true
"#,
    )
    .unwrap();
    let a = &preset.shaders[0];
    assert!(a.float_framebuffer && a.mipmap_input && a.persistent);
    assert_eq!(a.frame_count_mod, 4);
    assert_eq!(a.wrap_mode, WrapMode::Repeat);
    assert!(preset.shaders[1].srgb_framebuffer);
    assert!(!preset.shaders[1].persistent);

    assert_eq!(preset.textures.len(), 2);
    assert_eq!(preset.textures[0].name, "Mask");
    assert_eq!(preset.textures[0].path, "../luts/mask.png");
    assert_eq!(preset.textures[0].filter_mode, FilterMode::Linear);
    assert_eq!(preset.textures[0].wrap_mode, WrapMode::MirroredRepeat);
    assert_eq!(preset.textures[1].filter_mode, FilterMode::Nearest);
    assert!(preset.textures[1].mipmap);
    // texture options are not parameter overrides
    assert!(preset.parameters.is_empty());
}

#[test]
fn legacy_feedback_pass_marks_persistence() {
    let preset = ShaderPreset::parse(
        "shaders = 2\nshader0 = a.slang\nshader1 = b.slang\nfeedback_pass = 1\n",
    )
    .unwrap();
    assert!(!preset.shaders[0].persistent);
    assert!(preset.shaders[1].persistent);
}

#[test]
fn references_require_a_resolver() {
    let err = ShaderPreset::parse("#reference \"base.slangp\"\nBOOST = 1.5\n").unwrap_err();
    assert!(matches!(err, ParsePresetError::UnresolvedReference(1)));
}

#[test]
fn follows_references_with_local_precedence() {
    let mut resolver = MemoryResolver::new()
        .with("presets/base/crt.slangp", BOOST)
        .with("presets/base/shaders/boost.slang", "");

    let preset = ShaderPreset::parse_with_references(
        "presets/user/override.slangp",
        "#reference \"../base/crt.slangp\"\nBOOST = 1.5\nalias1 = Override\n",
        &mut resolver,
    )
    .unwrap();

    assert_eq!(preset.shader_count, 3);
    assert_eq!(preset.shaders[0].name, "presets/base/shaders/copy.slang");
    assert_eq!(preset.shaders[1].alias(), Some("Override"));
    assert_eq!(preset.parameters[0].value, 1.5);
}

#[test]
fn reference_cycles_are_bounded() {
    let mut resolver = MemoryResolver::new()
        .with("a.slangp", "#reference b.slangp\n")
        .with("b.slangp", "#reference a.slangp\n");
    let err = ShaderPreset::parse_with_references("root.slangp", "#reference a.slangp\n", &mut resolver)
        .unwrap_err();
    assert!(matches!(err, ParsePresetError::ExceededReferenceDepth(_)));

    let err = ShaderPreset::parse_with_references(
        "root.slangp",
        "#reference missing.slangp\n",
        &mut MemoryResolver::new(),
    )
    .unwrap_err();
    assert!(matches!(err, ParsePresetError::ReferenceNotFound(path) if path == "missing.slangp"));
}
