//! Globals that carry a value from the vertex stage to the fragment stage.
//!
//! Shaders written for a single combined source sometimes assign a global in
//! the vertex stage and read it in the fragment stage. Each stage compiles
//! separately, so such a global becomes a varying in both.

use crate::builtins;
use crate::context::{Patch, StageUnit, TranspileContext};
use crate::error::TranspileError;
use crate::stubs;
use crate::syntax::{self, Declaration, Item, ItemKind};
use crate::token::{self, Token};
use crate::{ShaderStage, WebGlVersion};
use rustc_hash::FxHashMap;

/// The prefix of varyings made from globals.
pub const PROMOTED_PREFIX: &str = "_wr_v_";

const PRECISION_QUALIFIERS: &[&str] = &["highp", "mediump", "lowp"];

/// A mutable global without a storage qualifier.
fn plain_global(tokens: &[Token], item: &Item) -> Option<Declaration> {
    let declaration = syntax::declaration(tokens, item)?;
    let plain = declaration
        .qualifiers
        .iter()
        .all(|q| PRECISION_QUALIFIERS.contains(&q.as_str()));
    let value_type = builtins::is_builtin_type(&declaration.ty)
        && !builtins::is_sampler_type(&declaration.ty)
        && declaration.ty != "void";
    (plain && value_type && !declaration.array).then_some(declaration)
}

fn find_global(tokens: &[Token], items: &[Item], name: &str) -> Option<(usize, Declaration)> {
    items.iter().enumerate().find_map(|(idx, item)| {
        plain_global(tokens, item)
            .filter(|d| d.name == name)
            .map(|d| (idx, d))
    })
}

/// Names of the plain globals the stage's functions assign to.
pub(crate) fn written_globals(unit: &StageUnit) -> Result<Vec<String>, TranspileError> {
    let items = unit.items()?;
    Ok(items
        .iter()
        .filter_map(|item| plain_global(&unit.tokens, item))
        .filter(|d| stubs::is_written(&unit.tokens, &items, &d.name))
        .map(|d| d.name)
        .collect())
}

/// The types of the plain globals the stage's functions assign to, by name.
pub(crate) fn written_global_types(unit: &StageUnit) -> Result<FxHashMap<String, String>, TranspileError> {
    let items = unit.items()?;
    Ok(items
        .iter()
        .filter_map(|item| plain_global(&unit.tokens, item))
        .filter(|d| stubs::is_written(&unit.tokens, &items, &d.name))
        .map(|d| (d.name, d.ty))
        .collect())
}

fn is_read(tokens: &[Token], items: &[Item], name: &str) -> bool {
    items.iter().any(|item| match &item.kind {
        ItemKind::Function(_, body) => body
            .clone()
            .any(|idx| tokens[idx].is(name) && syntax::is_reference(tokens, idx)),
        _ => false,
    })
}

/// The interface declaration of a promoted global.
fn interface(target: WebGlVersion, stage: ShaderStage, ty: &str, name: &str) -> String {
    let storage = match (target, stage) {
        (WebGlVersion::WebGl1, _) => "varying",
        (WebGlVersion::WebGl2, ShaderStage::Vertex) => "out",
        (WebGlVersion::WebGl2, ShaderStage::Fragment) => "in",
    };
    let flat = if target == WebGlVersion::WebGl2 && builtins::is_integer_type(ty) {
        "flat "
    } else {
        ""
    };
    format!("{flat}{storage} {ty} {name};")
}

/// Promote every global the vertex stage writes and the fragment stage only
/// reads to a varying named [`PROMOTED_PREFIX`] followed by its name.
pub(crate) fn promote_globals(
    ctx: &TranspileContext,
    vertex: &mut StageUnit,
    fragment: &mut StageUnit,
) -> Result<Vec<String>, TranspileError> {
    let target = ctx.target();
    let mut promoted = Vec::new();

    for name in written_globals(vertex)? {
        let fragment_items = fragment.items()?;
        if !is_read(&fragment.tokens, &fragment_items, &name)
            || stubs::is_written(&fragment.tokens, &fragment_items, &name)
        {
            continue;
        }

        let vertex_items = vertex.items()?;
        let Some((item_idx, declaration)) = find_global(&vertex.tokens, &vertex_items, &name) else {
            continue;
        };
        let ty = declaration.ty.clone();
        let interpolable = match target {
            WebGlVersion::WebGl1 => builtins::is_float_type(&ty),
            WebGlVersion::WebGl2 => builtins::vector_parts(&ty).map_or(ty != "bool", |(s, _)| s != "bool"),
        };
        if !interpolable {
            tracing::warn!(
                name = %name,
                ty = %ty,
                %target,
                "global shared between stages can not be a varying"
            );
            continue;
        }
        let varying = format!("{PROMOTED_PREFIX}{name}");

        // the vertex declaration becomes the output, and its initializer the
        // first statement of main
        let item = &vertex_items[item_idx];
        let line = vertex.tokens[item.range.start].line;
        let mut patch = Patch::default();
        patch.replace(
            item.range.clone(),
            token::synthesize(&interface(target, ShaderStage::Vertex, &ty, &varying), line),
        );
        if let Some(initializer) = declaration.initializer.clone() {
            let main = vertex_items.iter().find_map(|item| match &item.kind {
                ItemKind::Function(signature, body) if signature.name == "main" => Some(body.start),
                _ => None,
            });
            match main {
                Some(open) => {
                    let mut assignment = token::synthesize(&format!("\n    {varying} = "), line);
                    assignment.extend(vertex.tokens[initializer].iter().cloned());
                    assignment.extend(token::synthesize(";", line));
                    patch.insert(open + 1, assignment);
                }
                None => tracing::warn!(name = %name, "no vertex main to move the initializer into"),
            }
        }
        vertex.apply(patch);
        vertex.rename(&name, &varying);

        let declaration = interface(target, ShaderStage::Fragment, &ty, &varying);
        match find_global(&fragment.tokens, &fragment_items, &name) {
            Some((idx, _)) => {
                let item = &fragment_items[idx];
                let line = fragment.tokens[item.range.start].line;
                let mut patch = Patch::default();
                patch.replace(item.range.clone(), token::synthesize(&declaration, line));
                fragment.apply(patch);
            }
            None => fragment.declare(declaration),
        }
        fragment.rename(&name, &varying);

        tracing::debug!(name = %name, varying = %varying, ty = %ty, "promoted global to varying");
        promoted.push(name);
    }
    Ok(promoted)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::TranspileOptions;
    use webrashader_preprocess::{Provenance, StageSource};

    fn unit(stage: ShaderStage, text: &str) -> StageUnit {
        let source = StageSource::from_text("test.glsl", text);
        let header = Provenance {
            file: "test.glsl".into(),
            line: 1,
        };
        StageUnit::new(stage, &source, &header).unwrap()
    }

    #[test]
    fn promotes_vertex_written_globals() {
        let ctx = TranspileContext::new(&TranspileOptions::for_target(WebGlVersion::WebGl1));
        let mut vertex = unit(
            ShaderStage::Vertex,
            "float scale = 0.5;\nvoid main() {\n    scale *= 2.0;\n}\n",
        );
        let mut fragment = unit(
            ShaderStage::Fragment,
            "float scale = 0.5;\nvoid main() {\n    gl_FragColor = vec4(scale);\n}\n",
        );
        let promoted = promote_globals(&ctx, &mut vertex, &mut fragment).unwrap();
        assert_eq!(promoted, vec!["scale"]);
        assert_eq!(
            token::join(&vertex.tokens),
            "varying float _wr_v_scale;\nvoid main() {\n    _wr_v_scale = 0.5;\n    _wr_v_scale *= 2.0;\n}\n"
        );
        assert_eq!(
            token::join(&fragment.tokens),
            "varying float _wr_v_scale;\nvoid main() {\n    gl_FragColor = vec4(_wr_v_scale);\n}\n"
        );
    }

    #[test]
    fn declares_missing_fragment_side() {
        let ctx = TranspileContext::new(&TranspileOptions::for_target(WebGlVersion::WebGl2));
        let mut vertex = unit(ShaderStage::Vertex, "int mode;\nvoid main() { mode = 2; }\n");
        let mut fragment = unit(ShaderStage::Fragment, "out vec4 c;\nvoid main() { c = vec4(float(mode)); }\n");
        promote_globals(&ctx, &mut vertex, &mut fragment).unwrap();
        assert!(token::join(&vertex.tokens).starts_with("flat out int _wr_v_mode;"));
        assert_eq!(fragment.declarations, vec!["flat in int _wr_v_mode;"]);
    }

    #[test]
    fn keeps_integers_on_webgl1() {
        let ctx = TranspileContext::new(&TranspileOptions::for_target(WebGlVersion::WebGl1));
        let mut vertex = unit(ShaderStage::Vertex, "int mode;\nvoid main() { mode = 2; }\n");
        let mut fragment = unit(ShaderStage::Fragment, "int mode;\nvoid main() { gl_FragColor = vec4(float(mode)); }\n");
        assert!(promote_globals(&ctx, &mut vertex, &mut fragment).unwrap().is_empty());
    }
}
