//! Declarations synthesized for names a stage uses but never declares, so
//! the stage compiles with a neutral value in their place.

use crate::builtins;
use crate::context::{Patch, StageUnit};
use crate::error::TranspileError;
use crate::syntax::{self, Item, ItemKind};
use crate::token::{self, Token};
use rustc_hash::{FxHashMap, FxHashSet};
use std::ops::Range;

const ASSIGNMENTS: &[&str] = &["=", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "<<=", ">>="];
const ARITHMETIC: &[&str] = &["+", "-", "*", "/", "%"];
const LOGICAL: &[&str] = &["&&", "||", "^^", "!"];

/// Every name the stage declares: functions, structs, macros, variables and
/// parameters, and anything the transpiler declared ahead of the body.
fn declared_names(unit: &StageUnit, items: &[Item], structs: &FxHashSet<String>) -> FxHashSet<String> {
    let mut names = FxHashSet::default();
    for item in items {
        match &item.kind {
            ItemKind::Function(signature, _) | ItemKind::Prototype(signature) => {
                names.insert(signature.name.clone());
            }
            ItemKind::Struct(name) => {
                names.insert(name.clone());
            }
            ItemKind::Directive => {
                let Some(("define", args)) = syntax::directive(&unit.tokens[item.range.start]) else {
                    continue;
                };
                let name: String = args
                    .chars()
                    .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
                    .collect();
                names.insert(name);
            }
            _ => {}
        }
    }

    let is_type = |ty: &str| builtins::is_builtin_type(ty) || structs.contains(ty);
    names.extend(syntax::declared_types(&unit.tokens, is_type).into_keys());
    for declaration in &unit.declarations {
        if let Ok(tokens) = token::tokenize(declaration) {
            names.extend(syntax::declared_types(&tokens, is_type).into_keys());
        }
    }
    names.extend(unit.samplers.keys().cloned());
    names.extend(unit.stubs.iter().cloned());
    names
}

/// Token ranges inside `layout(...)` qualifiers, whose keys are not names.
pub(crate) fn layout_arguments(tokens: &[Token]) -> Vec<Range<usize>> {
    (0..tokens.len())
        .filter(|&idx| tokens[idx].is("layout"))
        .filter_map(|idx| {
            let open = syntax::next_sig(tokens, idx + 1).filter(|&o| tokens[o].is("("))?;
            Some(open..syntax::matching(tokens, open)?)
        })
        .collect()
}

/// What is known about the code around a use of an undeclared name.
struct Scope<'a> {
    tokens: &'a [Token],
    items: &'a [Item],
    vars: FxHashMap<String, String>,
    functions: FxHashMap<String, String>,
    structs: &'a FxHashSet<String>,
}

impl Scope<'_> {
    fn text(&self, idx: Option<usize>) -> &str {
        idx.map_or(";", |idx| self.tokens[idx].text.as_str())
    }

    fn expression_type(&self, range: Range<usize>) -> Option<String> {
        syntax::expression_type(self.tokens, range, &self.vars, &self.functions)
            .filter(|ty| usable(ty))
    }

    /// The first token of the operand that ends right before `idx`.
    fn operand_start(&self, idx: usize) -> usize {
        let mut depth = 0usize;
        let mut cursor = idx;
        while let Some(prev) = syntax::prev_sig(self.tokens, cursor) {
            let token = &self.tokens[prev];
            match token.text.as_str() {
                ")" | "]" => depth += 1,
                "(" | "[" if depth > 0 => depth -= 1,
                "(" | "[" | "," | ";" | "{" | "}" | "return" | "?" | ":" => break,
                text if depth == 0 && (ASSIGNMENTS.contains(&text) || LOGICAL.contains(&text)) => {
                    break
                }
                _ => {}
            }
            cursor = prev;
        }
        cursor
    }

    /// The index after the last token of the operand that starts after `idx`.
    fn operand_end(&self, idx: usize) -> usize {
        let mut depth = 0usize;
        let mut cursor = idx + 1;
        while cursor < self.tokens.len() {
            let token = &self.tokens[cursor];
            match token.text.as_str() {
                "(" | "[" => depth += 1,
                ")" | "]" if depth > 0 => depth -= 1,
                ")" | "]" | "," | ";" | "{" | "}" | "?" | ":" => break,
                text if depth == 0 && LOGICAL.contains(&text) => break,
                _ => {}
            }
            cursor += 1;
        }
        cursor
    }

    /// The type the expression spanning `start..=end` is expected to have,
    /// or `void` for a call that is a statement of its own.
    fn expected_type(&self, start: usize, end: usize) -> String {
        let prev = syntax::prev_sig(self.tokens, start);
        let next = syntax::next_sig(self.tokens, end + 1);
        let (before, after) = (self.text(prev), self.text(next));

        if before == "return" {
            let function = self.items.iter().find_map(|item| match &item.kind {
                ItemKind::Function(signature, _) if item.range.contains(&start) => {
                    Some(signature.return_type.clone())
                }
                _ => None,
            });
            if let Some(ty) = function.filter(|ty| usable(ty)) {
                return ty;
            }
        }
        if let Some(prev) = prev.filter(|_| ASSIGNMENTS.contains(&before)) {
            if let Some(ty) = self.assignment_target(prev) {
                return ty;
            }
        }
        if LOGICAL.contains(&before) || LOGICAL.contains(&after) || after == "?" {
            return "bool".to_string();
        }
        if before == "(" {
            let keyword = prev.and_then(|p| syntax::prev_sig(self.tokens, p));
            if matches!(self.text(keyword), "if" | "while") {
                return "bool".to_string();
            }
        }
        if matches!(before, ";" | "{" | "}") && after == ";" {
            return "void".to_string();
        }
        if let Some(prev) = prev.filter(|_| ARITHMETIC.contains(&before)) {
            if let Some(ty) = self.expression_type(self.operand_start(prev)..prev) {
                return ty;
            }
        }
        if let Some(next) = next.filter(|_| ARITHMETIC.contains(&after)) {
            if let Some(ty) = self.expression_type(next + 1..self.operand_end(next)) {
                return ty;
            }
        }
        "float".to_string()
    }

    /// The type of the left hand side of the assignment operator at `op`.
    fn assignment_target(&self, op: usize) -> Option<String> {
        let start = self.operand_start(op);
        let sig: Vec<usize> = (start..op)
            .filter(|&i| !self.tokens[i].is_trivia())
            .filter(|&i| !matches!(self.tokens[i].text.as_str(), "const" | "highp" | "mediump" | "lowp"))
            .collect();
        if let [ty, name, ..] = sig.as_slice() {
            let ty = &self.tokens[*ty].text;
            if self.tokens[*name].is_ident() && (usable(ty) || self.structs.contains(ty)) {
                return usable(ty).then(|| ty.clone());
            }
        }
        self.expression_type(start..op)
    }
}

/// Whether a stub can have the type: a builtin with a neutral value.
fn usable(ty: &str) -> bool {
    builtins::is_builtin_type(ty) && !builtins::is_sampler_type(ty) && ty != "void"
}

/// The item before which a stub used by `items[idx]` is declared: the item
/// itself, or the first item of the conditional block it sits in.
fn insertion_item(items: &[Item], idx: usize) -> usize {
    let mut cursor = idx;
    while cursor > 0 && !items[cursor].region.is_empty() {
        cursor -= 1;
    }
    if cursor != idx && items[cursor].region.is_empty() {
        cursor + 1
    } else {
        cursor
    }
}

/// Declare every name the stage uses without declaring it.
///
/// Variables named in `known` are declared with the type given there rather
/// than the type their uses suggest.
pub(crate) fn synthesize_stubs(
    unit: &mut StageUnit,
    known: &FxHashMap<String, String>,
) -> Result<(), TranspileError> {
    let items = unit.items()?;
    let structs: FxHashSet<String> = items
        .iter()
        .filter_map(|item| match &item.kind {
            ItemKind::Struct(name) => Some(name.clone()),
            _ => None,
        })
        .collect();
    let mut declared = declared_names(unit, &items, &structs);
    let layouts = layout_arguments(&unit.tokens);

    let tokens = &unit.tokens;
    let is_type = |ty: &str| builtins::is_builtin_type(ty) || structs.contains(ty);
    let scope = Scope {
        tokens,
        items: &items,
        vars: syntax::declared_types(tokens, is_type),
        functions: items
            .iter()
            .filter_map(|item| match &item.kind {
                ItemKind::Function(s, _) | ItemKind::Prototype(s) => {
                    Some((s.name.clone(), s.return_type.clone()))
                }
                _ => None,
            })
            .collect(),
        structs: &structs,
    };

    let mut patch = Patch::default();
    let mut synthesized = Vec::new();
    for (item_idx, item) in items.iter().enumerate() {
        if item.kind == ItemKind::Directive {
            continue;
        }
        for idx in item.range.clone() {
            let token = &tokens[idx];
            if !syntax::is_reference(tokens, idx)
                || builtins::is_builtin(&token.text)
                || declared.contains(&token.text)
                || layouts.iter().any(|range| range.contains(&idx))
            {
                continue;
            }
            let name = token.text.clone();
            let line = tokens[item.range.start].line;

            let declaration = if syntax::is_call(tokens, idx) {
                let Some(open) = syntax::next_sig(tokens, idx + 1) else {
                    continue;
                };
                let Some((args, close)) = syntax::call_args(tokens, open) else {
                    continue;
                };
                let ret = scope.expected_type(idx, close);
                let params: Vec<String> = args
                    .into_iter()
                    .enumerate()
                    .map(|(i, arg)| {
                        let ty = scope.expression_type(arg).unwrap_or_else(|| "float".to_string());
                        format!("{ty} a{i}")
                    })
                    .collect();
                let body = if ret == "void" {
                    "{}".to_string()
                } else {
                    format!("{{ return {}; }}", builtins::neutral_value(&ret))
                };
                format!("{ret} {name}({}) {body}\n", params.join(", "))
            } else {
                if syntax::next_sig(tokens, idx + 1).is_some_and(|n| tokens[n].is("[")) {
                    tracing::warn!(stage = %unit.stage, name = %name, line, "not synthesizing an undeclared array");
                    declared.insert(name);
                    continue;
                }
                let ty = match known.get(&name) {
                    Some(ty) => ty.clone(),
                    None => match scope.expected_type(idx, idx) {
                        ty if ty == "void" => "float".to_string(),
                        ty => ty,
                    },
                };
                if is_written(tokens, &items, &name) {
                    format!("{ty} {name};\n")
                } else {
                    format!("const {ty} {name} = {};\n", builtins::neutral_value(&ty))
                }
            };

            tracing::debug!(
                stage = %unit.stage,
                name = %name,
                declaration = declaration.trim_end(),
                "synthesized declaration for undeclared name"
            );
            let at = items[insertion_item(&items, item_idx)].range.start;
            patch.insert(at, token::synthesize(&declaration, line));
            declared.insert(name.clone());
            synthesized.push(name);
        }
    }

    unit.stubs.extend(synthesized);
    unit.apply(patch);
    Ok(())
}

/// Whether any function body assigns to `name`.
pub(crate) fn is_written(tokens: &[Token], items: &[Item], name: &str) -> bool {
    items.iter().any(|item| {
        let ItemKind::Function(_, body) = &item.kind else {
            return false;
        };
        body.clone()
            .filter(|&idx| tokens[idx].is(name) && syntax::is_reference(tokens, idx))
            .any(|idx| writes(tokens, idx))
    })
}

/// Whether the reference at `idx` is the target of an assignment or an
/// increment, including through a swizzle or an index.
pub(crate) fn writes(tokens: &[Token], idx: usize) -> bool {
    if syntax::prev_sig(tokens, idx).is_some_and(|p| tokens[p].is("++") || tokens[p].is("--")) {
        return true;
    }
    let mut cursor = idx;
    loop {
        let Some(next) = syntax::next_sig(tokens, cursor + 1) else {
            return false;
        };
        let text = tokens[next].text.as_str();
        if ASSIGNMENTS.contains(&text) || text == "++" || text == "--" {
            return true;
        }
        cursor = match text {
            "." => match syntax::next_sig(tokens, next + 1) {
                Some(member) => member,
                None => return false,
            },
            "[" => match syntax::matching(tokens, next) {
                Some(close) => close,
                None => return false,
            },
            _ => return false,
        };
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ShaderStage;
    use webrashader_preprocess::{Provenance, StageSource};

    fn stub(text: &str) -> String {
        let source = StageSource::from_text("test.glsl", text);
        let header = Provenance {
            file: "test.glsl".into(),
            line: 1,
        };
        let mut unit = StageUnit::new(ShaderStage::Fragment, &source, &header).unwrap();
        synthesize_stubs(&mut unit, &FxHashMap::default()).unwrap();
        token::join(&unit.tokens)
    }

    #[test]
    fn stubs_functions_from_call_sites() {
        let output = stub("void main() {\n    vec3 c = tonemap(vec3(1.0), 2.0);\n    apply(c);\n}\n");
        assert!(output.starts_with(
            "vec3 tonemap(vec3 a0, float a1) { return vec3(0.0); }\nvoid apply(vec3 a0) {}\nvoid main()"
        ));
    }

    #[test]
    fn stubs_values_by_use() {
        let output = stub("float f(vec2 uv) {\n    if (ENABLED) { return uv.x * SCALE; }\n    return 0.0;\n}\n");
        assert!(output.contains("const bool ENABLED = false;\n"));
        assert!(output.contains("const float SCALE = 0.0;\n"));
    }

    #[test]
    fn leaves_declared_and_builtin_names() {
        let source = "#define GAIN 2.0\nuniform sampler2D Source;\nstruct S { float a; };\nvec4 f(S s) { return texture2D(Source, gl_FragCoord.xy) * GAIN * s.a; }\n";
        assert_eq!(stub(source), source);
    }

    #[test]
    fn known_types_win_over_uses() {
        let source = StageSource::from_text("test.glsl", "void main() {\n    float x = mode == 1 ? 1.0 : 0.0;\n}\n");
        let header = Provenance {
            file: "test.glsl".into(),
            line: 1,
        };
        let mut unit = StageUnit::new(ShaderStage::Fragment, &source, &header).unwrap();
        let known = FxHashMap::from_iter([("mode".to_string(), "int".to_string())]);
        synthesize_stubs(&mut unit, &known).unwrap();
        assert!(token::join(&unit.tokens).starts_with("const int mode = 0;\nvoid main()"));
    }

    #[test]
    fn skips_layout_keys() {
        let source = "layout(location = 0) out vec4 FragColor;\nvoid main() { FragColor = vec4(1.0); }\n";
        assert_eq!(stub(source), source);
    }
}
