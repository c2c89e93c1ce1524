//! Structural checks on emitted GLSL ES, for tests.

use crate::builtins;
use crate::stubs;
use crate::syntax::{self, ItemKind};
use crate::token::{self, TokenKind};
use crate::WebGlVersion;
use rustc_hash::FxHashSet;

/// Lookups GLSL ES 1.00 does not have.
const WEBGL2_ONLY: &[&str] = &[
    "texture",
    "textureLod",
    "textureProj",
    "textureProjLod",
    "textureOffset",
    "textureLodOffset",
    "textureGrad",
    "texelFetch",
    "texelFetchOffset",
    "textureSize",
    "layout",
];

/// Names GLSL ES 3.00 removed.
const WEBGL1_ONLY: &[&str] = &[
    "texture2D",
    "texture2DProj",
    "texture2DLod",
    "textureCube",
    "textureCubeLod",
    "gl_FragColor",
    "attribute",
    "varying",
];

/// Everything wrong with `source` as a stage for `target`. Empty when the
/// stage is well formed.
pub(crate) fn problems(source: &str, target: WebGlVersion) -> Vec<String> {
    let mut problems = Vec::new();
    let version = match target {
        WebGlVersion::WebGl1 => "#version 100",
        WebGlVersion::WebGl2 => "#version 300 es",
    };
    if source.lines().next() != Some(version) {
        problems.push(format!("does not start with `{version}`"));
    }

    let tokens = match token::tokenize(source) {
        Ok(tokens) => tokens,
        Err(err) => return vec![format!("unterminated {} on line {}", err.what, err.line)],
    };
    let items = match syntax::items(&tokens) {
        Ok(items) => items,
        Err(err) => return vec![format!("unbalanced `{}` on line {}", err.delimiter, err.line)],
    };

    let structs: FxHashSet<String> = items
        .iter()
        .filter_map(|item| match &item.kind {
            ItemKind::Struct(name) => Some(name.clone()),
            _ => None,
        })
        .collect();
    let mut declared: FxHashSet<String> = items
        .iter()
        .filter_map(|item| match &item.kind {
            ItemKind::Function(signature, _) | ItemKind::Prototype(signature) => {
                Some(signature.name.clone())
            }
            ItemKind::Struct(name) => Some(name.clone()),
            ItemKind::Directive => match syntax::directive(&tokens[item.range.start]) {
                Some(("define", args)) => Some(
                    args.chars()
                        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
                        .collect(),
                ),
                _ => None,
            },
            _ => None,
        })
        .collect();
    if !declared.contains("main") {
        problems.push("no `main`".to_string());
    }
    let types = syntax::declared_types(&tokens, |ty| {
        builtins::is_builtin_type(ty) || structs.contains(ty)
    });
    declared.extend(types.keys().cloned());
    let layouts = stubs::layout_arguments(&tokens);

    let forbidden = match target {
        WebGlVersion::WebGl1 => WEBGL2_ONLY,
        WebGlVersion::WebGl2 => WEBGL1_ONLY,
    };

    for (idx, token) in tokens.iter().enumerate() {
        if token.kind != TokenKind::Ident || layouts.iter().any(|range| range.contains(&idx)) {
            continue;
        }
        let name = token.text.as_str();
        if forbidden.contains(&name) {
            problems.push(format!("line {}: `{name}` is not in the profile", token.line));
        }
        if !syntax::is_reference(&tokens, idx) {
            continue;
        }
        if !builtins::is_builtin(name) && !declared.contains(name) {
            problems.push(format!("line {}: `{name}` is never declared", token.line));
        }

        // swizzles of a builtin vector or scalar
        let Some(dot) = syntax::next_sig(&tokens, idx + 1).filter(|&d| tokens[d].is(".")) else {
            continue;
        };
        let Some(member) = syntax::next_sig(&tokens, dot + 1) else {
            continue;
        };
        let Some(ty) = types.get(name) else {
            continue;
        };
        let width = match builtins::vector_parts(ty) {
            Some((_, width)) => width,
            None if matches!(ty.as_str(), "float" | "int" | "uint" | "bool") => 0,
            None => continue,
        };
        let swizzle = &tokens[member].text;
        let fits = ["xyzw", "rgba", "stpq"].iter().any(|set| {
            swizzle
                .chars()
                .all(|c| set.find(c).is_some_and(|pos| pos < width as usize))
        });
        if !fits {
            problems.push(format!(
                "line {}: `.{swizzle}` does not fit `{name}`, a `{ty}`",
                token.line
            ));
        }
    }
    problems
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn finds_undeclared_names_and_bad_swizzles() {
        let source = "#version 100\nprecision mediump float;\nuniform vec2 TextureSize;\nvoid main() {\n    gl_FragColor = vec4(TextureSize.zw, missing, 1.0);\n}\n";
        let problems = problems(source, WebGlVersion::WebGl1);
        assert_eq!(problems.len(), 2, "{problems:?}");
        assert!(problems[0].contains("`.zw` does not fit `TextureSize`"));
        assert!(problems[1].contains("`missing` is never declared"));
    }

    #[test]
    fn finds_functions_of_the_other_profile() {
        let source = "#version 100\nuniform sampler2D Source;\nvarying vec2 uv;\nvoid main() {\n    gl_FragColor = texture(Source, uv);\n}\n";
        assert_eq!(problems(source, WebGlVersion::WebGl1).len(), 1);
        assert!(problems(&source.replace("texture(", "texture2D("), WebGlVersion::WebGl1).is_empty());
    }
}
