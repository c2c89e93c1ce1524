//! Texture lookup and derivative calls, rewritten to the functions the
//! target profile has.

use crate::builtins;
use crate::context::{SamplerInfo, SamplerKind, StageUnit, TranspileContext};
use crate::error::TranspileError;
use crate::syntax::{self, ItemKind};
use crate::token::{self, Token};
use crate::{ShaderStage, WebGlVersion};
use rustc_hash::{FxHashMap, FxHashSet};
use std::ops::Range;

/// The prefix of the `vec4` size uniforms declared for samplers whose
/// `<sampler>Size` name the shader already uses for something else.
pub const TEXEL_SIZE_PREFIX: &str = "_wr_";

const TEXTURE_LOD: &str = "GL_EXT_shader_texture_lod";
const DERIVATIVES: &str = "GL_OES_standard_derivatives";

/// Lookups with no GLSL ES 1.00 counterpart.
const WEBGL1_UNSUPPORTED: &[&str] = &[
    "textureProjOffset",
    "textureProjLodOffset",
    "textureGradOffset",
    "textureProjGrad",
    "textureProjGradOffset",
];

struct Call {
    name_idx: usize,
    close: usize,
    args: Vec<Range<usize>>,
    line: u32,
}

enum Rewrite {
    Keep,
    Rename(String),
    Replace(Vec<Token>),
}

#[derive(Default)]
struct Needs {
    extensions: Vec<&'static str>,
    /// Size uniforms the rewritten calls read that the stage does not declare.
    sizes: Vec<String>,
}

/// How the stage declares the names of texture size uniforms.
struct SizeNames {
    /// Globals declared as `uniform vec4`.
    uniform_vec4: FxHashSet<String>,
    /// The type of every declared variable.
    types: FxHashMap<String, String>,
}

impl SizeNames {
    fn new(unit: &StageUnit) -> Result<Self, TranspileError> {
        let items = unit.items()?;
        let structs: FxHashSet<String> = items
            .iter()
            .filter_map(|item| match &item.kind {
                ItemKind::Struct(name) => Some(name.clone()),
                _ => None,
            })
            .collect();
        let uniform_vec4 = items
            .iter()
            .filter_map(|item| syntax::declaration(&unit.tokens, item))
            .filter(|d| d.ty == "vec4" && !d.array && d.qualifiers.iter().any(|q| q == "uniform"))
            .map(|d| d.name)
            .collect();
        let is_type = |ty: &str| builtins::is_builtin_type(ty) || structs.contains(ty);
        let mut types = syntax::declared_types(&unit.tokens, is_type);
        for declaration in &unit.declarations {
            if let Ok(tokens) = token::tokenize(declaration) {
                types.extend(syntax::declared_types(&tokens, is_type));
            }
        }
        Ok(Self {
            uniform_vec4,
            types,
        })
    }

    /// The uniform holding `vec4(width, height, 1/width, 1/height)` of
    /// `sampler`, and whether the stage still has to declare it.
    fn resolve(&self, sampler: &str) -> (String, bool) {
        let size = format!("{sampler}Size");
        match self.types.get(&size) {
            None => (size, true),
            Some(ty) if ty == "vec4" && self.uniform_vec4.contains(&size) => (size, false),
            Some(_) => {
                let alias = format!("{TEXEL_SIZE_PREFIX}{size}");
                let declared = self.types.contains_key(&alias);
                (alias, !declared)
            }
        }
    }
}

impl Needs {
    fn extension(&mut self, name: &'static str) {
        if !self.extensions.contains(&name) {
            self.extensions.push(name);
        }
    }
}

/// Builds replacement tokens from generated text and cloned arguments.
struct Emit<'a> {
    source: &'a [Token],
    line: u32,
    tokens: Vec<Token>,
}

impl<'a> Emit<'a> {
    fn new(source: &'a [Token], line: u32) -> Self {
        Self {
            source,
            line,
            tokens: Vec::new(),
        }
    }

    fn text(&mut self, text: &str) -> &mut Self {
        self.tokens.extend(token::synthesize(text, self.line));
        self
    }

    fn arg(&mut self, range: &Range<usize>) -> &mut Self {
        self.tokens
            .extend(self.source[range.clone()].iter().cloned());
        self
    }

    /// The lookup coordinate of a sampler of `kind` read as a 2D texture.
    fn coord(&mut self, kind: SamplerKind, range: &Range<usize>) -> &mut Self {
        match kind {
            SamplerKind::Sampler3D | SamplerKind::Array2D => self.text("(").arg(range).text(").xy"),
            SamplerKind::Sampler1D => self.text("vec2(").arg(range).text(", 0.5)"),
            _ => self.arg(range),
        }
    }

    fn rest(&mut self, args: &[Range<usize>]) -> &mut Self {
        for arg in args {
            self.text(", ").arg(arg);
        }
        self
    }

    fn finish(&mut self) -> Rewrite {
        Rewrite::Replace(std::mem::take(&mut self.tokens))
    }
}

fn sampler_of(unit: &StageUnit, range: &Range<usize>) -> Option<(String, SamplerInfo)> {
    if range.len() != 1 {
        return None;
    }
    let name = &unit.tokens[range.start].text;
    unit.samplers.get(name).map(|info| (name.clone(), *info))
}

pub(crate) fn rewrite_calls(
    ctx: &TranspileContext,
    unit: &mut StageUnit,
) -> Result<(), TranspileError> {
    let mut needs = Needs::default();
    let size_names = SizeNames::new(unit)?;

    // innermost calls come last, so walking backwards rewrites them before
    // the calls that enclose them
    let mut idx = unit.tokens.len();
    while idx > 0 {
        idx -= 1;
        let token = &unit.tokens[idx];
        let candidate = token.text.starts_with("texture")
            || token.text.starts_with("texel")
            || token.text.starts_with("shadow")
            || matches!(token.text.as_str(), "dFdx" | "dFdy" | "fwidth");
        if !candidate || !syntax::is_call(&unit.tokens, idx) || !syntax::is_reference(&unit.tokens, idx) {
            continue;
        }
        let Some(open) = syntax::next_sig(&unit.tokens, idx + 1) else {
            continue;
        };
        let Some((args, close)) = syntax::call_args(&unit.tokens, open) else {
            continue;
        };
        let call = Call {
            name_idx: idx,
            close,
            args: args
                .into_iter()
                .map(|arg| syntax::trim(&unit.tokens, arg))
                .collect(),
            line: token.line,
        };

        let rewrite = match ctx.target() {
            WebGlVersion::WebGl1 => webgl1(unit, &call, &size_names, &mut needs)?,
            WebGlVersion::WebGl2 => webgl2(unit, &call),
        };
        match rewrite {
            Rewrite::Keep => {}
            Rewrite::Rename(name) => unit.tokens[idx].text = name,
            Rewrite::Replace(tokens) => {
                unit.tokens.splice(idx..call.close + 1, tokens);
            }
        }
    }

    for extension in needs.extensions {
        unit.require_extension(extension, "enable");
    }
    for size in needs.sizes {
        tracing::debug!(stage = %unit.stage, uniform = %size, "declared texture size uniform");
        unit.declare(format!("uniform vec4 {size};"));
    }
    Ok(())
}

/// The `texture2D` style lookup for a sampler kind.
fn lookup(kind: SamplerKind) -> &'static str {
    match kind {
        SamplerKind::Cube => "textureCube",
        _ => "texture2D",
    }
}

/// The explicit level of detail variant of `base`, which fragment shaders
/// only have through an extension.
fn lod_function(base: &str, stage: ShaderStage, needs: &mut Needs) -> String {
    match stage {
        ShaderStage::Fragment => {
            needs.extension(TEXTURE_LOD);
            format!("{base}LodEXT")
        }
        ShaderStage::Vertex => format!("{base}Lod"),
    }
}

/// The `vec4` size uniform a lookup by texel reads. Only uniform samplers
/// have one.
fn size_uniform(
    unit: &StageUnit,
    call: &Call,
    sampler: &Option<(String, SamplerInfo)>,
    names: &SizeNames,
    needs: &mut Needs,
) -> Result<String, TranspileError> {
    let name = &unit.tokens[call.name_idx].text;
    match sampler {
        Some((sampler, info)) if info.uniform => {
            let (size, undeclared) = names.resolve(sampler);
            if undeclared && !needs.sizes.contains(&size) {
                needs.sizes.push(size.clone());
            }
            Ok(size)
        }
        Some((sampler, _)) => Err(unit.unsupported(
            format!("`{name}` on the sampler parameter `{sampler}`"),
            WebGlVersion::WebGl1,
            call.line,
        )),
        None => Err(unit.unsupported(
            format!("`{name}` on a sampler expression"),
            WebGlVersion::WebGl1,
            call.line,
        )),
    }
}

fn webgl1(
    unit: &StageUnit,
    call: &Call,
    size_names: &SizeNames,
    needs: &mut Needs,
) -> Result<Rewrite, TranspileError> {
    let tokens = &unit.tokens;
    let name = tokens[call.name_idx].text.as_str();
    let stage = unit.stage;
    let fragment = stage == ShaderStage::Fragment;
    let args = call.args.as_slice();
    let unsupported = |what: String| unit.unsupported(what, WebGlVersion::WebGl1, call.line);

    match name {
        "dFdx" | "dFdy" | "fwidth" if fragment => {
            needs.extension(DERIVATIVES);
            return Ok(Rewrite::Keep);
        }
        "texture2DLodEXT" | "texture2DProjLodEXT" | "textureCubeLodEXT" | "texture2DGradEXT"
        | "texture2DProjGradEXT" | "textureCubeGradEXT"
            if fragment =>
        {
            needs.extension(TEXTURE_LOD);
            return Ok(Rewrite::Keep);
        }
        "texture2DLod" | "texture2DProjLod" | "textureCubeLod" if fragment => {
            needs.extension(TEXTURE_LOD);
            return Ok(Rewrite::Rename(format!("{name}EXT")));
        }
        _ if WEBGL1_UNSUPPORTED.contains(&name) => {
            return Err(unsupported(format!("`{name}`")));
        }
        _ => {}
    }

    let Some(first) = args.first() else {
        return Ok(Rewrite::Keep);
    };
    let sampler = sampler_of(unit, first);
    let kind = sampler
        .as_ref()
        .map_or(SamplerKind::Sampler2D, |(_, info)| info.kind);

    let size = |needs: &mut Needs| size_uniform(unit, call, &sampler, size_names, needs);

    let mut out = Emit::new(tokens, call.line);
    let rewrite = match (name, args.len()) {
        ("texture", 2 | 3) if kind == SamplerKind::Shadow2D => out
            .text("step((")
            .arg(&args[1])
            .text(").z, texture2D(")
            .arg(&args[0])
            .text(", (")
            .arg(&args[1])
            .text(").xy).r)")
            .finish(),
        ("texture", 2 | 3) => out
            .text(lookup(kind))
            .text("(")
            .arg(&args[0])
            .text(", ")
            .coord(kind, &args[1])
            .rest(&args[2..])
            .text(")")
            .finish(),
        ("textureLod", 3) if kind == SamplerKind::Shadow2D => {
            let function = lod_function("texture2D", stage, needs);
            out.text("step((")
                .arg(&args[1])
                .text(").z, ")
                .text(&function)
                .text("(")
                .arg(&args[0])
                .text(", (")
                .arg(&args[1])
                .text(").xy, ")
                .arg(&args[2])
                .text(").r)")
                .finish()
        }
        ("textureLod", 3) => {
            let function = lod_function(lookup(kind), stage, needs);
            out.text(&function)
                .text("(")
                .arg(&args[0])
                .text(", ")
                .coord(kind, &args[1])
                .rest(&args[2..])
                .text(")")
                .finish()
        }
        ("textureProj", 2 | 3) => Rewrite::Rename("texture2DProj".to_string()),
        ("textureProjLod", 3) => Rewrite::Rename(lod_function("texture2DProj", stage, needs)),
        ("textureGrad", 4) if fragment => {
            needs.extension(TEXTURE_LOD);
            out.text(lookup(kind))
                .text("GradEXT(")
                .arg(&args[0])
                .text(", ")
                .coord(kind, &args[1])
                .rest(&args[2..])
                .text(")")
                .finish()
        }
        ("textureGrad", _) => return Err(unsupported("`textureGrad` in a vertex shader".to_string())),
        ("textureOffset", 3 | 4) => {
            let size = size(needs)?;
            out.text("texture2D(")
                .arg(&args[0])
                .text(", (")
                .arg(&args[1])
                .text(") + vec2(")
                .arg(&args[2])
                .text(") * ")
                .text(&size)
                .text(".zw")
                .rest(&args[3..])
                .text(")")
                .finish()
        }
        ("textureLodOffset", 4) => {
            let size = size(needs)?;
            let function = lod_function("texture2D", stage, needs);
            out.text(&function)
                .text("(")
                .arg(&args[0])
                .text(", (")
                .arg(&args[1])
                .text(") + vec2(")
                .arg(&args[3])
                .text(") * ")
                .text(&size)
                .text(".zw, ")
                .arg(&args[2])
                .text(")")
                .finish()
        }
        ("texelFetch" | "texelFetchOffset", 3 | 4) => {
            let size = size(needs)?;
            let (function, level) = match stage {
                ShaderStage::Fragment => ("texture2D", ""),
                ShaderStage::Vertex => ("texture2DLod", ", 0.0"),
            };
            out.text(function).text("(").arg(&args[0]).text(", ");
            if kind == SamplerKind::Sampler1D {
                out.text("vec2((float(").arg(&args[1]).text(")");
                if let Some(offset) = args.get(3) {
                    out.text(" + float(").arg(offset).text(")");
                }
                out.text(" + 0.5) * ").text(&size).text(".z, 0.5)");
            } else {
                out.text("(vec2(").arg(&args[1]).text(")");
                if let Some(offset) = args.get(3) {
                    out.text(" + vec2(").arg(offset).text(")");
                }
                out.text(" + 0.5) * ").text(&size).text(".zw");
            }
            out.text(level).text(")").finish()
        }
        ("textureSize", 1 | 2) => {
            let size = size(needs)?;
            if kind == SamplerKind::Sampler1D {
                out.text("int(").text(&size).text(".x)").finish()
            } else {
                out.text("ivec2(").text(&size).text(".xy)").finish()
            }
        }
        ("texture1D", 2 | 3) => out
            .text("texture2D(")
            .arg(&args[0])
            .text(", ")
            .coord(SamplerKind::Sampler1D, &args[1])
            .rest(&args[2..])
            .text(")")
            .finish(),
        ("texture1DLod", 3) => {
            let function = lod_function("texture2D", stage, needs);
            out.text(&function)
                .text("(")
                .arg(&args[0])
                .text(", ")
                .coord(SamplerKind::Sampler1D, &args[1])
                .rest(&args[2..])
                .text(")")
                .finish()
        }
        ("texture3D", 2 | 3) => out
            .text("texture2D(")
            .arg(&args[0])
            .text(", ")
            .coord(SamplerKind::Sampler3D, &args[1])
            .rest(&args[2..])
            .text(")")
            .finish(),
        ("shadow2D", 2) => out
            .text("vec4(step((")
            .arg(&args[1])
            .text(").z, texture2D(")
            .arg(&args[0])
            .text(", (")
            .arg(&args[1])
            .text(").xy).r))")
            .finish(),
        ("shadow2DProj", 2) => out
            .text("vec4(step((")
            .arg(&args[1])
            .text(").z / (")
            .arg(&args[1])
            .text(").w, texture2DProj(")
            .arg(&args[0])
            .text(", (")
            .arg(&args[1])
            .text(").xyw).r))")
            .finish(),
        _ => Rewrite::Keep,
    };
    Ok(rewrite)
}

fn webgl2(unit: &StageUnit, call: &Call) -> Rewrite {
    let tokens = &unit.tokens;
    let name = tokens[call.name_idx].text.as_str();
    let args = call.args.as_slice();

    let renamed = match name {
        "texture2D" | "textureCube" | "texture3D" => Some("texture"),
        "texture2DLod" | "texture2DLodEXT" | "textureCubeLod" | "textureCubeLodEXT"
        | "texture3DLod" => Some("textureLod"),
        "texture2DProj" | "texture3DProj" => Some("textureProj"),
        "texture2DProjLod" | "texture2DProjLodEXT" | "texture3DProjLod" => Some("textureProjLod"),
        "texture2DGradEXT" | "textureCubeGradEXT" => Some("textureGrad"),
        "texture2DProjGradEXT" => Some("textureProjGrad"),
        _ => None,
    };
    if let Some(renamed) = renamed {
        return Rewrite::Rename(renamed.to_string());
    }

    let Some(first) = args.first() else {
        return Rewrite::Keep;
    };
    let one_dimensional = sampler_of(unit, first)
        .is_some_and(|(_, info)| info.kind == SamplerKind::Sampler1D);

    let mut out = Emit::new(tokens, call.line);
    match (name, args.len()) {
        ("texture1D", 2 | 3) => out
            .text("texture(")
            .arg(&args[0])
            .text(", ")
            .coord(SamplerKind::Sampler1D, &args[1])
            .rest(&args[2..])
            .text(")")
            .finish(),
        ("texture1DLod", 3) => out
            .text("textureLod(")
            .arg(&args[0])
            .text(", ")
            .coord(SamplerKind::Sampler1D, &args[1])
            .rest(&args[2..])
            .text(")")
            .finish(),
        ("texture" | "textureLod", 2..=3) if one_dimensional => out
            .text(name)
            .text("(")
            .arg(&args[0])
            .text(", ")
            .coord(SamplerKind::Sampler1D, &args[1])
            .rest(&args[2..])
            .text(")")
            .finish(),
        ("texelFetch", 3) if one_dimensional => out
            .text("texelFetch(")
            .arg(&args[0])
            .text(", ivec2(")
            .arg(&args[1])
            .text(", 0), ")
            .arg(&args[2])
            .text(")")
            .finish(),
        ("textureSize", 2) if one_dimensional => out
            .text("textureSize(")
            .arg(&args[0])
            .rest(&args[1..])
            .text(").x")
            .finish(),
        ("shadow2D", 2) => out
            .text("vec4(texture(")
            .arg(&args[0])
            .rest(&args[1..])
            .text("))")
            .finish(),
        ("shadow2DProj", 2) => out
            .text("vec4(textureProj(")
            .arg(&args[0])
            .rest(&args[1..])
            .text("))")
            .finish(),
        _ => Rewrite::Keep,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::TranspileOptions;
    use webrashader_preprocess::{Provenance, StageSource};

    fn rewrite(target: WebGlVersion, stage: ShaderStage, text: &str) -> (String, Vec<String>, Vec<String>) {
        let ctx = TranspileContext::new(&TranspileOptions::for_target(target));
        let source = StageSource::from_text("test.glsl", text);
        let header = Provenance {
            file: "test.glsl".into(),
            line: 1,
        };
        let mut unit = StageUnit::new(stage, &source, &header).unwrap();
        crate::normalize::normalize(&mut TranspileContext::new(&ctx.options), &mut unit).unwrap();
        rewrite_calls(&ctx, &mut unit).unwrap();
        (token::join(&unit.tokens), unit.extensions, unit.declarations)
    }

    #[test]
    fn maps_modern_lookups_to_webgl1() {
        let (text, extensions, declarations) = rewrite(
            WebGlVersion::WebGl1,
            ShaderStage::Fragment,
            "uniform sampler2D Source;\nvarying vec2 uv;\nvoid main() { gl_FragColor = texture(Source, uv) + textureLod(Source, uv, 0.0) + texelFetch(Source, ivec2(1, 2), 0); }\n",
        );
        assert!(text.contains("texture2D(Source, uv)"));
        assert!(text.contains("texture2DLodEXT(Source, uv, 0.0)"));
        assert!(text.contains("texture2D(Source, (vec2(ivec2(1, 2)) + 0.5) * SourceSize.zw)"));
        assert_eq!(extensions, vec!["#extension GL_EXT_shader_texture_lod : enable"]);
        assert!(declarations.contains(&"uniform vec4 SourceSize;".to_string()));
    }

    #[test]
    fn texel_lookups_use_a_vec4_size() {
        let (text, _, declarations) = rewrite(
            WebGlVersion::WebGl1,
            ShaderStage::Fragment,
            "uniform sampler2D Texture;\nuniform vec2 TextureSize;\nvoid main() { gl_FragColor = texelFetch(Texture, ivec2(1, 1), 0) * TextureSize.x + vec4(vec2(textureSize(Texture, 0)), 0.0, 0.0); }\n",
        );
        assert!(text.contains("uniform vec2 TextureSize;"));
        assert!(text.contains("texture2D(Texture, (vec2(ivec2(1, 1)) + 0.5) * _wr_TextureSize.zw)"));
        assert!(text.contains("ivec2(_wr_TextureSize.xy)"));
        assert!(declarations.contains(&"uniform vec4 _wr_TextureSize;".to_string()));
        assert!(!declarations.contains(&"uniform vec4 TextureSize;".to_string()));
    }

    #[test]
    fn texel_lookups_reuse_a_declared_vec4_size() {
        let (text, _, declarations) = rewrite(
            WebGlVersion::WebGl1,
            ShaderStage::Fragment,
            "uniform sampler2D Source;\nuniform vec4 SourceSize;\nvarying vec2 uv;\nvoid main() { gl_FragColor = textureOffset(Source, uv, ivec2(1, 0)); }\n",
        );
        assert!(text.contains("texture2D(Source, (uv) + vec2(ivec2(1, 0)) * SourceSize.zw)"));
        assert!(declarations.iter().all(|d| !d.contains("Size")));
    }

    #[test]
    fn rewrites_nested_calls() {
        let (text, _, _) = rewrite(
            WebGlVersion::WebGl1,
            ShaderStage::Fragment,
            "uniform sampler2D A;\nuniform sampler2D B;\nvarying vec2 uv;\nvoid main() { gl_FragColor = texture(A, texture(B, uv).xy); }\n",
        );
        assert!(text.contains("texture2D(A, texture2D(B, uv).xy)"));
    }

    #[test]
    fn maps_legacy_lookups_to_webgl2() {
        let (text, extensions, _) = rewrite(
            WebGlVersion::WebGl2,
            ShaderStage::Fragment,
            "#extension GL_EXT_shader_texture_lod : enable\nuniform sampler2D Source;\nin vec2 uv;\nvoid main() { gl_FragColor = texture2D(Source, uv) + texture2DLodEXT(Source, uv, 1.0); }\n",
        );
        assert!(text.contains("texture(Source, uv) + textureLod(Source, uv, 1.0)"));
        assert!(extensions.is_empty());
    }

    #[test]
    fn rejects_texel_fetch_on_parameters() {
        let ctx = TranspileContext::new(&TranspileOptions::for_target(WebGlVersion::WebGl1));
        let source = StageSource::from_text(
            "test.glsl",
            "vec4 f(sampler2D s) { return texelFetch(s, ivec2(0), 0); }\n",
        );
        let header = Provenance {
            file: "test.glsl".into(),
            line: 1,
        };
        let mut unit = StageUnit::new(ShaderStage::Fragment, &source, &header).unwrap();
        crate::normalize::normalize(&mut TranspileContext::new(&ctx.options), &mut unit).unwrap();
        let err = rewrite_calls(&ctx, &mut unit).unwrap_err();
        assert!(matches!(err, TranspileError::Unsupported { .. }));
    }
}
