//! Type and qualifier normalization.

use crate::builtins;
use crate::context::{Patch, SamplerInfo, SamplerKind, StageUnit, TranspileContext};
use crate::error::TranspileError;
use crate::syntax::{self, ItemKind};
use crate::token::{self, Token, TokenKind};
use crate::{Precision, ShaderStage, WebGlVersion};
use rustc_hash::FxHashSet;

/// Extensions WebGL 1 exposes that are part of GLSL ES 3.00.
const CORE_IN_ES3: &[&str] = &[
    "GL_OES_standard_derivatives",
    "GL_EXT_shader_texture_lod",
    "GL_EXT_frag_depth",
    "GL_EXT_draw_buffers",
];

/// Extension prefixes a browser may expose.
const WEB_EXTENSION_PREFIXES: &[&str] = &["GL_OES_", "GL_EXT_", "GL_ANGLE_", "GL_OVR_", "GL_WEBGL_"];

/// Sampler types without a default precision in GLSL ES 3.00.
const ES3_SAMPLERS_WITHOUT_PRECISION: &[&str] = &[
    "sampler3D",
    "samplerCubeShadow",
    "sampler2DShadow",
    "sampler2DArray",
    "sampler2DArrayShadow",
    "isampler2D",
    "isampler3D",
    "isamplerCube",
    "isampler2DArray",
    "usampler2D",
    "usampler3D",
    "usamplerCube",
    "usampler2DArray",
];

pub(crate) fn normalize(
    ctx: &mut TranspileContext,
    unit: &mut StageUnit,
) -> Result<(), TranspileError> {
    collect_samplers(unit);
    flatten_blocks(ctx, unit)?;
    rewrite_directives(ctx, unit);
    strip_layouts(ctx, unit)?;
    map_types(ctx, unit);
    remap_storage(ctx, unit)?;
    declare_precision(ctx, unit);
    Ok(())
}

/// The range of the token at `idx` and any spaces following it.
fn with_space(tokens: &[Token], idx: usize) -> std::ops::Range<usize> {
    let mut end = idx + 1;
    while end < tokens.len() && tokens[end].kind == TokenKind::Space {
        end += 1;
    }
    idx..end
}

/// The range of the directive at `idx` and its line break.
fn directive_line(tokens: &[Token], idx: usize) -> std::ops::Range<usize> {
    let mut range = with_space(tokens, idx);
    if range.end < tokens.len() && tokens[range.end].kind == TokenKind::Newline {
        range.end += 1;
    }
    range
}

/// Record every sampler by name with the kind it was declared as, before
/// the types are downgraded.
fn collect_samplers(unit: &mut StageUnit) {
    let mut braces = 0usize;
    let mut parens = 0usize;
    for (idx, token) in unit.tokens.iter().enumerate() {
        if token.kind == TokenKind::Punct {
            match token.text.as_str() {
                "{" => braces += 1,
                "}" => braces = braces.saturating_sub(1),
                "(" => parens += 1,
                ")" => parens = parens.saturating_sub(1),
                _ => {}
            }
            continue;
        }
        if !token.is_ident() {
            continue;
        }
        let Some(kind) = SamplerKind::from_type(&token.text) else {
            continue;
        };
        let Some(name) = syntax::next_sig(&unit.tokens, idx + 1) else {
            continue;
        };
        if unit.tokens[name].is_ident() {
            unit.samplers.insert(
                unit.tokens[name].text.clone(),
                SamplerInfo {
                    kind,
                    uniform: braces == 0 && parens == 0,
                },
            );
        }
    }
}

/// Replace uniform and push constant blocks with plain uniforms, and
/// accesses through the block instance with the bare member name.
fn flatten_blocks(ctx: &TranspileContext, unit: &mut StageUnit) -> Result<(), TranspileError> {
    let items = unit.items()?;
    let mut instances = Vec::new();
    let mut patch = Patch::default();

    for item in items.iter().filter(|i| i.kind == ItemKind::Block) {
        let tokens = &unit.tokens;
        let Some(open) = item.range.clone().find(|&i| tokens[i].is("{")) else {
            continue;
        };
        let Some(close) = syntax::matching(tokens, open) else {
            continue;
        };
        let qualifiers: Vec<&str> = (item.range.start..open)
            .filter(|&i| tokens[i].is_ident())
            .map(|i| tokens[i].text.as_str())
            .collect();
        if !qualifiers.contains(&"uniform") {
            let what = format!(
                "`{}` interface block",
                qualifiers.first().copied().unwrap_or("unknown")
            );
            return Err(unit.unsupported(what, ctx.target(), tokens[item.range.start].line));
        }

        if let Some(instance) = syntax::next_sig(tokens, close + 1).filter(|&i| tokens[i].is_ident())
        {
            instances.push(tokens[instance].text.clone());
        }

        let mut replacement = Vec::new();
        let mut start = open + 1;
        for idx in open + 1..close {
            if !tokens[idx].is(";") {
                continue;
            }
            let member = syntax::trim(tokens, start..idx);
            start = idx + 1;
            if member.is_empty() {
                continue;
            }
            let line = tokens[member.start].line;
            replacement.extend(token::synthesize("uniform ", line));
            replacement.extend(tokens[member].iter().cloned());
            replacement.extend(token::synthesize(";\n", line));
        }
        if let Some(last) = replacement.last_mut() {
            // the item's own line break follows
            if last.kind == TokenKind::Newline {
                replacement.pop();
            }
        }
        patch.replace(item.range.clone(), replacement);
    }
    unit.apply(patch);

    if instances.is_empty() {
        return Ok(());
    }

    let mut patch = Patch::default();
    for idx in 0..unit.tokens.len() {
        let token = &unit.tokens[idx];
        if token.is_directive() {
            if let Some(rewritten) = flatten_define(token, &instances) {
                match rewritten {
                    Some(text) => patch.replace(idx..idx + 1, vec![Token::new(TokenKind::Directive, text, token.line)]),
                    None => patch.remove(directive_line(&unit.tokens, idx)),
                }
            }
            continue;
        }
        if !instances.contains(&token.text) || !syntax::is_reference(&unit.tokens, idx) {
            continue;
        }
        let Some(dot) = syntax::next_sig(&unit.tokens, idx + 1).filter(|&d| unit.tokens[d].is(".")) else {
            continue;
        };
        let Some(member) = syntax::next_sig(&unit.tokens, dot + 1) else {
            continue;
        };
        patch.remove(idx..member);
    }
    unit.apply(patch);
    tracing::trace!(stage = %unit.stage, ?instances, "flattened uniform blocks");
    Ok(())
}

/// Rewrite block instance accesses in the body of a `#define`.
///
/// Returns `None` when the directive is not a define that mentions an
/// instance, `Some(None)` when the define became `#define X X` and should be
/// dropped, and the new directive text otherwise.
fn flatten_define(token: &Token, instances: &[String]) -> Option<Option<String>> {
    let (name, body) = syntax::directive(token)?;
    if name != "define" {
        return None;
    }
    let mut tokens = token::tokenize(body).ok()?;
    let mut changed = false;
    let mut idx = 0;
    while idx < tokens.len() {
        let is_access = instances.contains(&tokens[idx].text)
            && syntax::is_reference(&tokens, idx)
            && syntax::next_sig(&tokens, idx + 1).is_some_and(|d| tokens[d].is("."));
        if is_access {
            let dot = syntax::next_sig(&tokens, idx + 1).unwrap_or(idx);
            let member = syntax::next_sig(&tokens, dot + 1).unwrap_or(dot + 1);
            tokens.drain(idx..member);
            changed = true;
        }
        idx += 1;
    }
    if !changed {
        return None;
    }

    let significant: Vec<&str> = tokens
        .iter()
        .filter(|t| !t.is_trivia())
        .map(|t| t.text.as_str())
        .collect();
    if let [macro_name, value] = significant.as_slice() {
        if macro_name == value {
            return Some(None);
        }
    }
    Some(Some(format!("#define {}", token::join(&tokens))))
}

/// Drop `#version` lines and extensions the target does not know, and move
/// the extensions it does know below the version line.
fn rewrite_directives(ctx: &TranspileContext, unit: &mut StageUnit) {
    let mut patch = Patch::default();
    let mut extensions = Vec::new();
    for (idx, token) in unit.tokens.iter().enumerate() {
        let Some((name, args)) = syntax::directive(token) else {
            continue;
        };
        match name {
            "version" => patch.remove(directive_line(&unit.tokens, idx)),
            "extension" => {
                patch.remove(directive_line(&unit.tokens, idx));
                let mut parts = args.split(':');
                let extension = parts.next().unwrap_or_default().trim().to_string();
                let behavior = parts.next().unwrap_or("enable").trim().to_string();
                let web = WEB_EXTENSION_PREFIXES.iter().any(|p| extension.starts_with(p));
                let keep = match ctx.target() {
                    WebGlVersion::WebGl1 => CORE_IN_ES3.contains(&extension.as_str()),
                    WebGlVersion::WebGl2 => web && !CORE_IN_ES3.contains(&extension.as_str()),
                };
                if keep {
                    extensions.push((extension, behavior));
                } else {
                    tracing::trace!(stage = %unit.stage, extension = %extension, "dropped extension");
                }
            }
            _ => {}
        }
    }
    unit.apply(patch);
    for (extension, behavior) in extensions {
        unit.require_extension(&extension, &behavior);
    }
}

fn layout_location(tokens: &[Token], open: usize, close: usize) -> (Option<u32>, bool) {
    let sig: Vec<usize> = (open + 1..close).filter(|&i| !tokens[i].is_trivia()).collect();
    match sig.as_slice() {
        [key, eq, value] if tokens[*key].is("location") && tokens[*eq].is("=") => {
            (tokens[*value].text.parse().ok(), true)
        }
        _ => {
            let location = sig.windows(3).find_map(|w| {
                (tokens[w[0]].is("location") && tokens[w[1]].is("="))
                    .then(|| tokens[w[2]].text.parse().ok())
                    .flatten()
            });
            (location, false)
        }
    }
}

/// Remove `layout` qualifiers, keeping only those GLSL ES 3.00 accepts:
/// locations of vertex inputs and fragment outputs.
fn strip_layouts(ctx: &TranspileContext, unit: &mut StageUnit) -> Result<(), TranspileError> {
    let items = unit.items()?;
    let mut patch = Patch::default();

    for item in &items {
        if item.kind != ItemKind::Declaration {
            continue;
        }
        let tokens = &unit.tokens;
        let Some(layout) = item.range.clone().find(|&i| tokens[i].is("layout")) else {
            continue;
        };
        let Some(open) = syntax::next_sig(tokens, layout + 1).filter(|&o| tokens[o].is("(")) else {
            continue;
        };
        let Some(close) = syntax::matching(tokens, open) else {
            continue;
        };
        let (location, location_only) = layout_location(tokens, open, close);

        let Some(declaration) = syntax::declaration(tokens, item) else {
            // default block qualifiers like `layout(std140) uniform;`
            patch.remove(item.line_range(tokens));
            continue;
        };
        let input = declaration.qualifiers.iter().any(|q| q == "in" || q == "attribute");
        let output = declaration.qualifiers.iter().any(|q| q == "out" || q == "varying");
        if let Some(location) = location {
            if input {
                unit.input_locations.insert(declaration.name.clone(), location);
            } else if output {
                unit.output_locations.insert(declaration.name.clone(), location);
            }
        }

        let keep = ctx.target() == WebGlVersion::WebGl2
            && location_only
            && match unit.stage {
                ShaderStage::Vertex => input,
                ShaderStage::Fragment => output,
            };
        if !keep {
            patch.remove(layout..with_space(tokens, close).end);
        }
    }
    unit.apply(patch);
    Ok(())
}

/// The type GLSL ES accepts in place of `name` on `target`.
pub(crate) fn map_type(name: &str, target: WebGlVersion) -> Option<String> {
    if name == "double" {
        return Some("float".to_string());
    }
    if let Some(("double", n)) = builtins::vector_parts(name) {
        return Some(format!("vec{n}"));
    }
    if let Some((c, r, double)) = builtins::matrix_parts(name) {
        return match target {
            WebGlVersion::WebGl1 if c != r => Some(format!("mat{}", c.max(r))),
            _ if double && c == r => Some(format!("mat{c}")),
            _ if double => Some(format!("mat{c}x{r}")),
            _ => None,
        };
    }
    match target {
        WebGlVersion::WebGl1 => match name {
            "uint" => Some("int".to_string()),
            "samplerCubeShadow" | "isamplerCube" | "usamplerCube" => Some("samplerCube".to_string()),
            "sampler1D" | "sampler3D" | "sampler2DShadow" | "sampler2DArray"
            | "sampler2DArrayShadow" | "sampler2DRect" | "isampler2D" | "isampler3D"
            | "isampler2DArray" | "usampler2D" | "usampler3D" | "usampler2DArray" => {
                Some("sampler2D".to_string())
            }
            _ => match builtins::vector_parts(name) {
                Some(("uint", n)) => Some(format!("ivec{n}")),
                _ => None,
            },
        },
        WebGlVersion::WebGl2 => match name {
            "sampler1D" | "sampler2DRect" => Some("sampler2D".to_string()),
            _ => None,
        },
    }
}

/// Strip literal suffixes the target does not accept.
fn map_number(text: &str, target: WebGlVersion) -> Option<String> {
    let hex = text.starts_with("0x") || text.starts_with("0X");
    if let Some(stripped) = text
        .strip_suffix("lf")
        .or_else(|| text.strip_suffix("LF"))
        .filter(|_| !hex)
    {
        return Some(stripped.to_string());
    }
    if target == WebGlVersion::WebGl2 {
        return None;
    }
    if let Some(stripped) = text.strip_suffix(['u', 'U']) {
        return Some(stripped.to_string());
    }
    if !hex {
        if let Some(stripped) = text.strip_suffix(['f', 'F']) {
            return Some(stripped.to_string());
        }
    }
    None
}

fn map_types(ctx: &TranspileContext, unit: &mut StageUnit) {
    let target = ctx.target();
    let mut patch = Patch::default();
    for (idx, token) in unit.tokens.iter_mut().enumerate() {
        match token.kind {
            TokenKind::Ident => {
                let drop = match token.text.as_str() {
                    "noperspective" | "precise" => true,
                    "flat" | "smooth" | "centroid" => target == WebGlVersion::WebGl1,
                    _ => false,
                };
                if drop {
                    patch.remove(idx..idx + 1);
                    continue;
                }
                if let Some(mapped) = map_type(&token.text, target) {
                    token.text = mapped;
                }
            }
            TokenKind::Number => {
                if let Some(mapped) = map_number(&token.text, target) {
                    token.text = mapped;
                }
            }
            _ => {}
        }
    }
    if !patch.is_empty() {
        unit.apply(patch);
    }
}

/// Remap storage qualifiers to the target profile and route fragment
/// outputs.
fn remap_storage(ctx: &TranspileContext, unit: &mut StageUnit) -> Result<(), TranspileError> {
    let target = ctx.target();
    let mut braces = 0usize;
    let mut parens = 0usize;
    for token in unit.tokens.iter_mut() {
        if token.kind == TokenKind::Punct {
            match token.text.as_str() {
                "{" => braces += 1,
                "}" => braces = braces.saturating_sub(1),
                "(" => parens += 1,
                ")" => parens = parens.saturating_sub(1),
                _ => {}
            }
            continue;
        }
        if !token.is_ident() || braces != 0 || parens != 0 {
            continue;
        }
        let mapped = match (unit.stage, target, token.text.as_str()) {
            (ShaderStage::Vertex, WebGlVersion::WebGl1, "in") => "attribute",
            (ShaderStage::Vertex, WebGlVersion::WebGl1, "out") => "varying",
            (ShaderStage::Vertex, WebGlVersion::WebGl2, "attribute") => "in",
            (ShaderStage::Vertex, WebGlVersion::WebGl2, "varying") => "out",
            (ShaderStage::Fragment, WebGlVersion::WebGl1, "in") => "varying",
            (ShaderStage::Fragment, WebGlVersion::WebGl2, "varying") => "in",
            _ => continue,
        };
        token.text = mapped.to_string();
    }

    let items = unit.items()?;
    let mut patch = Patch::default();
    let mut outputs = Vec::new();
    for item in &items {
        let Some(declaration) = syntax::declaration(&unit.tokens, item) else {
            continue;
        };
        let line = unit.tokens[item.range.start].line;
        let varying = match unit.stage {
            ShaderStage::Vertex => declaration.qualifiers.iter().any(|q| q == "out" || q == "varying"),
            ShaderStage::Fragment => declaration.qualifiers.iter().any(|q| q == "in" || q == "varying"),
        };

        if varying && builtins::is_integer_type(&declaration.ty) {
            match target {
                WebGlVersion::WebGl1 => {
                    return Err(unit.unsupported(
                        format!("integer varying `{}`", declaration.name),
                        target,
                        line,
                    ))
                }
                WebGlVersion::WebGl2 if !declaration.qualifiers.iter().any(|q| q == "flat") => {
                    patch.insert(item.range.start, token::synthesize("flat ", line));
                }
                WebGlVersion::WebGl2 => {}
            }
        }

        let fragment_output = unit.stage == ShaderStage::Fragment
            && target == WebGlVersion::WebGl1
            && declaration.qualifiers.iter().any(|q| q == "out");
        if fragment_output {
            if !outputs.is_empty() {
                return Err(unit.unsupported("more than one fragment output", target, line));
            }
            outputs.push(declaration.name.clone());
            patch.remove(item.line_range(&unit.tokens));
        }
    }
    unit.apply(patch);

    for output in outputs {
        unit.rename(&output, "gl_FragColor");
    }

    if unit.stage == ShaderStage::Fragment && target == WebGlVersion::WebGl2 {
        route_frag_color(ctx, unit)?;
    }
    Ok(())
}

const FRAG_COLOR: &str = "_wr_FragColor";

/// GLSL ES 3.00 has no `gl_FragColor`, so declare an output in its place.
fn route_frag_color(ctx: &TranspileContext, unit: &mut StageUnit) -> Result<(), TranspileError> {
    let mut patch = Patch::default();
    let mut used = false;
    for idx in 0..unit.tokens.len() {
        let token = &unit.tokens[idx];
        if token.is("gl_FragColor") {
            patch.replace(idx..idx + 1, token::synthesize(FRAG_COLOR, token.line));
            used = true;
        } else if token.is("gl_FragData") {
            let open = syntax::next_sig(&unit.tokens, idx + 1).filter(|&o| unit.tokens[o].is("["));
            let close = open.and_then(|o| syntax::matching(&unit.tokens, o));
            let (Some(open), Some(close)) = (open, close) else {
                return Err(unit.unsupported("`gl_FragData` without an index", ctx.target(), token.line));
            };
            if syntax::normalized(&unit.tokens, open + 1..close) != "0" {
                return Err(unit.unsupported("more than one fragment output", ctx.target(), token.line));
            }
            patch.replace(idx..close + 1, token::synthesize(FRAG_COLOR, token.line));
            used = true;
        }
    }
    if used {
        unit.apply(patch);
        unit.declare(format!("out vec4 {FRAG_COLOR};"));
    }
    Ok(())
}

/// The qualifier of the first `precision <qualifier> <ty>;` statement.
fn stated_precision<'a>(tokens: &'a [Token], ty: &str) -> Option<&'a str> {
    (0..tokens.len()).find_map(|idx| {
        if !tokens[idx].is("precision") {
            return None;
        }
        let qualifier = syntax::next_sig(tokens, idx + 1)?;
        let target = syntax::next_sig(tokens, qualifier + 1)?;
        tokens[target].is(ty).then_some(tokens[qualifier].text.as_str())
    })
}

/// The default float precision a fragment stage that states none is given.
fn fragment_float_precision(ctx: &TranspileContext) -> &'static str {
    match (ctx.target(), ctx.options.float_precision) {
        (WebGlVersion::WebGl1, Precision::Highp) => "#ifdef GL_FRAGMENT_PRECISION_HIGH\nprecision highp float;\n#else\nprecision mediump float;\n#endif",
        (_, Precision::Highp) => "precision highp float;",
        (_, Precision::Mediump) => "precision mediump float;",
    }
}

/// Declare default precisions a GLSL ES stage needs but does not state.
fn declare_precision(ctx: &TranspileContext, unit: &mut StageUnit) {
    let tokens = &unit.tokens;
    let has_precision = |ty: &str| stated_precision(tokens, ty).is_some();

    let mut precision = Vec::new();
    if unit.stage == ShaderStage::Fragment && !has_precision("float") {
        precision.push(fragment_float_precision(ctx).to_string());
    }
    if ctx.target() == WebGlVersion::WebGl2 {
        for sampler in ES3_SAMPLERS_WITHOUT_PRECISION {
            if tokens.iter().any(|t| t.is(sampler)) && !has_precision(sampler) {
                precision.push(format!("precision mediump {sampler};"));
            }
        }
    }

    // precision statements go ahead of any synthesized declaration
    for (idx, statement) in precision.into_iter().enumerate() {
        unit.declarations.insert(idx, statement);
    }
}

/// Names of the non-sampler uniforms a stage declares.
fn uniform_names(unit: &StageUnit) -> Result<FxHashSet<String>, TranspileError> {
    let items = unit.items()?;
    let mut names = FxHashSet::default();
    for item in &items {
        let Some(declaration) = syntax::declaration(&unit.tokens, item) else {
            continue;
        };
        if declaration.qualifiers.iter().any(|q| q == "uniform")
            && !builtins::is_sampler_type(&declaration.ty)
        {
            names.insert(declaration.name);
        }
    }
    for declaration in &unit.declarations {
        if let Some(name) = declaration
            .strip_prefix("uniform ")
            .and_then(|rest| rest.trim_end_matches(';').split_whitespace().last())
        {
            names.insert(name.to_string());
        }
    }
    Ok(names)
}

/// Give the vertex stage the default precisions of the fragment stage when
/// both declare a uniform, since a uniform must have one precision in every
/// stage it is declared in. Precisions the vertex stage states are kept.
pub(crate) fn match_precision(
    ctx: &TranspileContext,
    vertex: &mut StageUnit,
    fragment: &StageUnit,
) -> Result<(), TranspileError> {
    let vertex_uniforms = uniform_names(vertex)?;
    let shared = uniform_names(fragment)?
        .into_iter()
        .any(|name| vertex_uniforms.contains(&name));
    if !shared {
        return Ok(());
    }

    let mut precision = Vec::new();
    if stated_precision(&vertex.tokens, "float").is_none() {
        precision.push(match stated_precision(&fragment.tokens, "float") {
            Some(qualifier) => format!("precision {qualifier} float;"),
            None => fragment_float_precision(ctx).to_string(),
        });
    }
    if stated_precision(&vertex.tokens, "int").is_none() {
        // fragment stages default to mediump integers
        let qualifier = stated_precision(&fragment.tokens, "int").unwrap_or("mediump");
        precision.push(format!("precision {qualifier} int;"));
    }
    tracing::trace!(stage = %vertex.stage, ?precision, "matched fragment precision");
    for (idx, statement) in precision.into_iter().enumerate() {
        vertex.declarations.insert(idx, statement);
    }
    Ok(())
}

/// Link vertex outputs to fragment inputs that share an explicit location
/// but not a name, by renaming the fragment input.
pub(crate) fn link_locations(vertex: &StageUnit, fragment: &mut StageUnit) {
    let mut renames = Vec::new();
    for (name, location) in &fragment.input_locations {
        let source = vertex
            .output_locations
            .iter()
            .find(|(_, l)| *l == location)
            .map(|(n, _)| n);
        if let Some(source) = source {
            if source != name {
                renames.push((name.clone(), source.clone()));
            }
        }
    }
    for (from, to) in renames {
        tracing::trace!(from = %from, to = %to, "linked fragment input by location");
        fragment.rename(&from, &to);
        if let Some(location) = fragment.input_locations.remove(&from) {
            fragment.input_locations.insert(to, location);
        }
    }
}
