//! Just enough structure over a token stream to find top level items,
//! function signatures and declarations without a full GLSL grammar.

use crate::builtins;
use crate::token::{Token, TokenKind};
use std::ops::Range;

pub(crate) fn next_sig(tokens: &[Token], from: usize) -> Option<usize> {
    (from..tokens.len()).find(|&i| !tokens[i].is_trivia())
}

pub(crate) fn prev_sig(tokens: &[Token], before: usize) -> Option<usize> {
    (0..before.min(tokens.len())).rev().find(|&i| !tokens[i].is_trivia())
}

/// The index of the delimiter closing the one at `open`.
pub(crate) fn matching(tokens: &[Token], open: usize) -> Option<usize> {
    let (opener, closer) = match tokens.get(open)?.text.as_str() {
        "(" => ("(", ")"),
        "[" => ("[", "]"),
        "{" => ("{", "}"),
        _ => return None,
    };
    let mut depth = 0usize;
    for (idx, token) in tokens.iter().enumerate().skip(open) {
        if token.kind != TokenKind::Punct {
            continue;
        }
        if token.text == opener {
            depth += 1;
        } else if token.text == closer {
            depth -= 1;
            if depth == 0 {
                return Some(idx);
            }
        }
    }
    None
}

/// Split the arguments of the call whose `(` is at `open`, returning the
/// token range of each argument and the index of the closing `)`.
pub(crate) fn call_args(tokens: &[Token], open: usize) -> Option<(Vec<Range<usize>>, usize)> {
    let close = matching(tokens, open)?;
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut start = open + 1;
    for idx in open + 1..close {
        let token = &tokens[idx];
        if token.kind != TokenKind::Punct {
            continue;
        }
        match token.text.as_str() {
            "(" | "[" | "{" => depth += 1,
            ")" | "]" | "}" => depth = depth.saturating_sub(1),
            "," if depth == 0 => {
                args.push(start..idx);
                start = idx + 1;
            }
            _ => {}
        }
    }
    if args.is_empty() && (start..close).all(|i| tokens[i].is_trivia()) {
        return Some((args, close));
    }
    args.push(start..close);
    Some((args, close))
}

/// The range with leading and trailing trivia removed.
pub(crate) fn trim(tokens: &[Token], range: Range<usize>) -> Range<usize> {
    let mut start = range.start;
    let mut end = range.end;
    while start < end && tokens[start].is_trivia() {
        start += 1;
    }
    while end > start && tokens[end - 1].is_trivia() {
        end -= 1;
    }
    start..end
}

/// Significant token texts of `range`, joined with single spaces.
pub(crate) fn normalized(tokens: &[Token], range: Range<usize>) -> String {
    let mut out = String::new();
    for token in &tokens[range] {
        if token.is_trivia() {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&token.text);
    }
    out
}

/// The conditional compilation directive a token opens, continues or closes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Conditional {
    Open,
    Branch,
    Close,
}

pub(crate) fn conditional(token: &Token) -> Option<Conditional> {
    if !token.is_directive() {
        return None;
    }
    let rest = token.text.trim_start().strip_prefix('#')?.trim_start();
    let word: String = rest.chars().take_while(char::is_ascii_alphabetic).collect();
    match word.as_str() {
        "if" | "ifdef" | "ifndef" => Some(Conditional::Open),
        "elif" | "else" => Some(Conditional::Branch),
        "endif" => Some(Conditional::Close),
        _ => None,
    }
}

/// The directive name and its arguments, `("define", "X 1")` for `#define X 1`.
pub(crate) fn directive(token: &Token) -> Option<(&str, &str)> {
    let rest = token.text.trim_start().strip_prefix('#')?.trim_start();
    let end = rest
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(rest.len());
    Some((&rest[..end], rest[end..].trim()))
}

/// The conditional compilation branches enclosing an item, outermost first.
/// Each entry is the index of the opening directive and the branch taken.
pub(crate) type Region = Vec<(u32, u32)>;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Param {
    pub ty: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Signature {
    pub name: String,
    pub return_type: String,
    pub params: Vec<Param>,
    /// Index of the name token.
    pub name_idx: usize,
    /// Index of the opening `(` of the parameter list.
    pub open: usize,
    /// Index of the closing `)` of the parameter list.
    pub close: usize,
}

impl Signature {
    pub fn param_types(&self) -> Vec<String> {
        self.params.iter().map(|p| p.ty.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ItemKind {
    Directive,
    /// A function definition and the range of its braces.
    Function(Signature, Range<usize>),
    Prototype(Signature),
    Struct(String),
    /// An interface block, `uniform Name { ... } instance;`.
    Block,
    Declaration,
}

#[derive(Debug, Clone)]
pub(crate) struct Item {
    /// Tokens of the item, from its first significant token to its
    /// terminator inclusive.
    pub range: Range<usize>,
    pub kind: ItemKind,
    pub region: Region,
}

impl Item {
    /// The item range extended over trailing spaces, a trailing comment and
    /// the line break, for removing the item without leaving a blank line.
    pub fn line_range(&self, tokens: &[Token]) -> Range<usize> {
        let mut end = self.range.end;
        while end < tokens.len() && matches!(tokens[end].kind, TokenKind::Space) {
            end += 1;
        }
        if end < tokens.len() && tokens[end].kind == TokenKind::Newline {
            end += 1;
        }
        self.range.start..end
    }

    pub fn is_function(&self) -> bool {
        matches!(self.kind, ItemKind::Function(..))
    }
}

/// An unbalanced delimiter at the given line.
#[derive(Debug)]
pub(crate) struct Unbalanced {
    pub delimiter: char,
    pub line: u32,
}

/// Split a stage into its top level items.
pub(crate) fn items(tokens: &[Token]) -> Result<Vec<Item>, Unbalanced> {
    let mut items = Vec::new();
    let mut region: Region = Vec::new();
    let mut idx = 0;

    while let Some(start) = next_sig(tokens, idx) {
        let token = &tokens[start];
        if token.is_directive() {
            match conditional(token) {
                Some(Conditional::Open) => region.push((start as u32, 0)),
                Some(Conditional::Branch) => {
                    if let Some(last) = region.last_mut() {
                        last.1 += 1;
                    }
                }
                Some(Conditional::Close) => {
                    region.pop();
                }
                None => {}
            }
            items.push(Item {
                range: start..start + 1,
                kind: ItemKind::Directive,
                region: region.clone(),
            });
            idx = start + 1;
            continue;
        }

        let mut cursor = start;
        let mut paren = 0usize;
        let mut end = None;
        let mut brace_open = None;
        while cursor < tokens.len() {
            let token = &tokens[cursor];
            if token.kind == TokenKind::Punct {
                match token.text.as_str() {
                    "(" | "[" => paren += 1,
                    ")" | "]" => {
                        paren = paren.checked_sub(1).ok_or(Unbalanced {
                            delimiter: token.text.chars().next().unwrap_or(')'),
                            line: token.line,
                        })?
                    }
                    "{" if paren == 0 => {
                        let close = matching(tokens, cursor).ok_or(Unbalanced {
                            delimiter: '{',
                            line: token.line,
                        })?;
                        let is_function =
                            prev_sig(tokens, cursor).is_some_and(|p| tokens[p].is(")"));
                        if is_function {
                            brace_open = Some(cursor..close + 1);
                            end = Some(close + 1);
                            break;
                        }
                        brace_open = Some(cursor..close + 1);
                        cursor = close + 1;
                        continue;
                    }
                    "}" => {
                        return Err(Unbalanced {
                            delimiter: '}',
                            line: token.line,
                        })
                    }
                    ";" if paren == 0 => {
                        end = Some(cursor + 1);
                        break;
                    }
                    _ => {}
                }
            }
            cursor += 1;
        }

        let end = match end {
            Some(end) => end,
            None => {
                // trailing tokens without a terminator
                let last = prev_sig(tokens, tokens.len()).unwrap_or(start);
                last + 1
            }
        };
        let range = start..end;
        let kind = classify(tokens, range.clone(), brace_open);
        items.push(Item {
            range,
            kind,
            region: region.clone(),
        });
        idx = end;
    }

    Ok(items)
}

const PARAM_QUALIFIERS: &[&str] = &[
    "in", "out", "inout", "const", "highp", "mediump", "lowp", "precise",
];

fn classify(tokens: &[Token], range: Range<usize>, braces: Option<Range<usize>>) -> ItemKind {
    let sig: Vec<usize> = range.clone().filter(|&i| !tokens[i].is_trivia()).collect();
    let Some(&first) = sig.first() else {
        return ItemKind::Declaration;
    };

    if tokens[first].is("struct") {
        let name = sig
            .get(1)
            .filter(|&&i| tokens[i].is_ident())
            .map(|&i| tokens[i].text.clone())
            .unwrap_or_default();
        return ItemKind::Struct(name);
    }

    if let Some(braces) = braces {
        let is_function = prev_sig(tokens, braces.start).is_some_and(|p| tokens[p].is(")"));
        if is_function {
            if let Some(signature) = signature(tokens, range.start..braces.start) {
                return ItemKind::Function(signature, braces);
            }
        }
        return ItemKind::Block;
    }

    // a prototype is `type name(params);` with nothing after the parameters
    let Some(open) = sig.iter().copied().find(|&i| tokens[i].is("(")) else {
        return ItemKind::Declaration;
    };
    if sig.iter().any(|&i| i < open && tokens[i].is("=")) {
        return ItemKind::Declaration;
    }
    let Some(close) = matching(tokens, open) else {
        return ItemKind::Declaration;
    };
    if next_sig(tokens, close + 1).is_some_and(|n| tokens[n].is(";")) {
        if let Some(signature) = signature(tokens, range.start..close + 1) {
            return ItemKind::Prototype(signature);
        }
    }
    ItemKind::Declaration
}

/// Parse a function header, `[qualifiers] type name(params)`.
pub(crate) fn signature(tokens: &[Token], range: Range<usize>) -> Option<Signature> {
    let open = range.clone().find(|&i| tokens[i].is("("))?;
    let close = matching(tokens, open)?;
    let name_idx = prev_sig(tokens, open)?;
    if !tokens[name_idx].is_ident() || name_idx < range.start {
        return None;
    }
    let return_type = range.start..name_idx;
    let return_sig: Vec<&Token> = tokens[return_type]
        .iter()
        .filter(|t| !t.is_trivia() && !PARAM_QUALIFIERS.contains(&t.text.as_str()))
        .collect();
    if return_sig.is_empty() || !return_sig.iter().all(|t| t.is_ident()) {
        return None;
    }
    let return_type = return_sig
        .last()
        .map(|t| t.text.clone())
        .unwrap_or_default();

    let (args, _) = call_args(tokens, open)?;
    let mut params = Vec::new();
    for arg in args {
        let sig: Vec<&Token> = tokens[arg]
            .iter()
            .filter(|t| !t.is_trivia() && !PARAM_QUALIFIERS.contains(&t.text.as_str()))
            .collect();
        match sig.as_slice() {
            [] => {}
            [only] if only.is("void") => {}
            [ty] => params.push(Param {
                ty: ty.text.clone(),
                name: None,
            }),
            [ty, name, rest @ ..] => {
                let array: String = rest.iter().map(|t| t.text.as_str()).collect();
                params.push(Param {
                    ty: format!("{}{}", ty.text, array),
                    name: Some(name.text.clone()),
                })
            }
        }
    }

    Some(Signature {
        name: tokens[name_idx].text.clone(),
        return_type,
        params,
        name_idx,
        open,
        close,
    })
}

/// A top level variable declaration with a single declarator.
#[derive(Debug, Clone)]
pub(crate) struct Declaration {
    /// Qualifier tokens in front of the type, like `uniform` or `highp`.
    pub qualifiers: Vec<String>,
    pub ty: String,
    pub name: String,
    pub name_idx: usize,
    /// Whether the name is followed by an array size.
    pub array: bool,
    /// The initializer expression after `=`, if any.
    pub initializer: Option<Range<usize>>,
}

const STORAGE_QUALIFIERS: &[&str] = &[
    "const",
    "uniform",
    "attribute",
    "varying",
    "in",
    "out",
    "buffer",
    "shared",
    "flat",
    "smooth",
    "noperspective",
    "centroid",
    "invariant",
    "precise",
    "highp",
    "mediump",
    "lowp",
];

/// Parse a declaration item with one declarator, `[qualifiers] type name
/// [array] [= initializer];`.
pub(crate) fn declaration(tokens: &[Token], item: &Item) -> Option<Declaration> {
    if item.kind != ItemKind::Declaration {
        return None;
    }
    let sig: Vec<usize> = item
        .range
        .clone()
        .filter(|&i| !tokens[i].is_trivia())
        .collect();
    let mut cursor = 0;
    let mut qualifiers = Vec::new();
    while let Some(&i) = sig.get(cursor) {
        if tokens[i].is("layout") {
            let close = matching(tokens, next_sig(tokens, i + 1)?)?;
            cursor = sig.iter().position(|&s| s > close)?;
            continue;
        }
        if !STORAGE_QUALIFIERS.contains(&tokens[i].text.as_str()) {
            break;
        }
        qualifiers.push(tokens[i].text.clone());
        cursor += 1;
    }
    let ty = *sig.get(cursor)?;
    let name_idx = *sig.get(cursor + 1)?;
    if !tokens[ty].is_ident() || !tokens[name_idx].is_ident() || tokens[ty].is("precision") {
        return None;
    }

    let mut array = false;
    let mut initializer = None;
    let mut next = next_sig(tokens, name_idx + 1)?;
    if tokens[next].is("[") {
        array = true;
        next = next_sig(tokens, matching(tokens, next)? + 1)?;
    }
    if tokens[next].is("=") {
        let end = item.range.end - 1;
        let mut depth = 0usize;
        for i in next + 1..end {
            match tokens[i].text.as_str() {
                "(" | "[" | "{" if tokens[i].kind == TokenKind::Punct => depth += 1,
                ")" | "]" | "}" if tokens[i].kind == TokenKind::Punct => {
                    depth = depth.saturating_sub(1)
                }
                "," if depth == 0 && tokens[i].kind == TokenKind::Punct => return None,
                _ => {}
            }
        }
        initializer = Some(trim(tokens, next + 1..end));
    } else if !tokens[next].is(";") {
        return None;
    }

    Some(Declaration {
        qualifiers,
        ty: tokens[ty].text.clone(),
        name: tokens[name_idx].text.clone(),
        name_idx,
        array,
        initializer,
    })
}

/// Whether the identifier at `idx` names something rather than selecting a
/// member of a struct or swizzling a vector.
pub(crate) fn is_reference(tokens: &[Token], idx: usize) -> bool {
    tokens[idx].is_ident() && !prev_sig(tokens, idx).is_some_and(|p| tokens[p].is("."))
}

/// Whether the identifier at `idx` is called as a function.
pub(crate) fn is_call(tokens: &[Token], idx: usize) -> bool {
    tokens[idx].is_ident() && next_sig(tokens, idx + 1).is_some_and(|n| tokens[n].is("("))
}

/// Collect the type of every variable and parameter declared in the stage,
/// by name. Later declarations replace earlier ones.
pub(crate) fn declared_types(
    tokens: &[Token],
    is_type: impl Fn(&str) -> bool,
) -> rustc_hash::FxHashMap<String, String> {
    let mut types = rustc_hash::FxHashMap::default();
    for (ty_idx, token) in tokens.iter().enumerate() {
        if !token.is_ident() || !is_type(&token.text) {
            continue;
        }
        if prev_sig(tokens, ty_idx).is_some_and(|p| tokens[p].is(".")) {
            continue;
        }
        let Some(name_idx) = next_sig(tokens, ty_idx + 1) else {
            continue;
        };
        let name = &tokens[name_idx];
        if !name.is_ident() || builtins::is_keyword(&name.text) || is_type(&name.text) {
            continue;
        }
        if is_call(tokens, name_idx) {
            // a function header names its return type, not a variable
            continue;
        }
        types.insert(name.text.clone(), token.text.clone());
        for extra in comma_declarators(tokens, name_idx) {
            types.insert(tokens[extra].text.clone(), token.text.clone());
        }
    }
    types
}

/// Further declarators of the declaration whose first name is at `name_idx`,
/// like `b` and `c` in `float a, b = 1.0, c;`.
pub(crate) fn comma_declarators(tokens: &[Token], name_idx: usize) -> Vec<usize> {
    let mut names = Vec::new();
    let mut depth = 0usize;
    let mut idx = name_idx + 1;
    while idx < tokens.len() {
        let token = &tokens[idx];
        if token.kind == TokenKind::Punct {
            match token.text.as_str() {
                "(" | "[" | "{" => depth += 1,
                ")" | "]" | "}" => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                }
                ";" => break,
                "," if depth == 0 => {
                    match next_sig(tokens, idx + 1) {
                        Some(n) if tokens[n].is_ident() && !builtins::is_builtin_type(&tokens[n].text) => {
                            names.push(n)
                        }
                        _ => break,
                    }
                }
                _ => {}
            }
        } else if token.is_directive() {
            break;
        }
        idx += 1;
    }
    names
}

fn swizzle_len(text: &str) -> Option<u8> {
    let sets = ["xyzw", "rgba", "stpq"];
    let len = text.len();
    ((1..=4).contains(&len) && sets.iter().any(|set| text.chars().all(|c| set.contains(c))))
        .then_some(len as u8)
}

fn with_components(ty: &str, count: u8) -> String {
    let scalar = builtins::vector_parts(ty).map_or(ty, |(scalar, _)| scalar);
    if count == 1 {
        return scalar.to_string();
    }
    match scalar {
        "int" => format!("ivec{count}"),
        "uint" => format!("uvec{count}"),
        "bool" => format!("bvec{count}"),
        _ => format!("vec{count}"),
    }
}

/// A best effort type for the expression in `range`.
///
/// The widest operand wins, so `color * 0.5` is the type of `color`.
pub(crate) fn expression_type(
    tokens: &[Token],
    range: Range<usize>,
    vars: &rustc_hash::FxHashMap<String, String>,
    functions: &rustc_hash::FxHashMap<String, String>,
) -> Option<String> {
    let mut best: Option<String> = None;
    let consider = |ty: String, best: &mut Option<String>| {
        let rank = |t: &str| {
            if builtins::matrix_parts(t).is_some() {
                3
            } else if builtins::vector_parts(t).is_some() {
                2
            } else if t == "float" {
                1
            } else {
                0
            }
        };
        if best.as_deref().map_or(true, |b| rank(&ty) > rank(b)) {
            *best = Some(ty);
        }
    };

    let mut idx = range.start;
    while idx < range.end {
        let token = &tokens[idx];
        if token.is_trivia() {
            idx += 1;
            continue;
        }
        match token.kind {
            TokenKind::Number => {
                let ty = if token.text.starts_with("0x") || token.text.starts_with("0X") {
                    "int"
                } else if token.text.contains('.')
                    || token.text.contains(['e', 'E'])
                    || token.text.ends_with(['f', 'F'])
                {
                    "float"
                } else if token.text.ends_with(['u', 'U']) {
                    "uint"
                } else {
                    "int"
                };
                consider(ty.to_string(), &mut best);
            }
            TokenKind::Ident if token.is("true") || token.is("false") => {
                consider("bool".to_string(), &mut best)
            }
            TokenKind::Ident if is_call(tokens, idx) => {
                let open = next_sig(tokens, idx + 1).unwrap_or(idx);
                let close = matching(tokens, open).unwrap_or(range.end.saturating_sub(1));
                let ty = if builtins::is_builtin_type(&token.text) {
                    Some(token.text.clone())
                } else if let Some(ty) = functions.get(&token.text) {
                    Some(ty.clone())
                } else if token.text.starts_with("texture") || token.text.starts_with("shadow") {
                    Some("vec4".to_string())
                } else if matches!(token.text.as_str(), "dot" | "length" | "distance" | "determinant") {
                    Some("float".to_string())
                } else {
                    // component wise builtins return the type of their arguments
                    expression_type(tokens, open + 1..close, vars, functions)
                };
                let (ty, after) = swizzled(tokens, close, ty);
                if let Some(ty) = ty {
                    consider(ty, &mut best);
                }
                idx = after;
                continue;
            }
            TokenKind::Ident => {
                let ty = vars.get(&token.text).cloned();
                let (ty, after) = swizzled(tokens, idx, ty);
                if let Some(ty) = ty {
                    consider(ty, &mut best);
                }
                idx = after;
                continue;
            }
            TokenKind::Punct if token.is("(") => {
                let close = matching(tokens, idx).unwrap_or(range.end.saturating_sub(1));
                let ty = expression_type(tokens, idx + 1..close, vars, functions);
                let (ty, after) = swizzled(tokens, close, ty);
                if let Some(ty) = ty {
                    consider(ty, &mut best);
                }
                idx = after;
                continue;
            }
            TokenKind::Punct
                if matches!(
                    token.text.as_str(),
                    "==" | "!=" | "<" | ">" | "<=" | ">=" | "&&" | "||" | "!" | "^^"
                ) =>
            {
                return Some("bool".to_string());
            }
            _ => {}
        }
        idx += 1;
    }
    best
}

/// Apply a trailing `.swizzle` after the token at `end` to `ty`, returning
/// the resulting type and the index following the expression.
fn swizzled(tokens: &[Token], end: usize, ty: Option<String>) -> (Option<String>, usize) {
    let Some(dot) = next_sig(tokens, end + 1).filter(|&d| tokens[d].is(".")) else {
        return (ty, end + 1);
    };
    let Some(member) = next_sig(tokens, dot + 1).filter(|&m| tokens[m].is_ident()) else {
        return (ty, end + 1);
    };
    match (ty, swizzle_len(&tokens[member].text)) {
        (Some(ty), Some(len)) if builtins::vector_parts(&ty).is_some() || ty == "float" => {
            (Some(with_components(&ty, len)), member + 1)
        }
        // struct members and unknown bases have unknown types
        _ => (None, member + 1),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::token::tokenize;
    use rustc_hash::FxHashMap;

    #[test]
    fn splits_items() {
        let tokens = tokenize(
            "#ifdef A\nstruct S { float a; };\n#endif\nuniform UBO { mat4 MVP; } global;\nvec2 f(in vec2 uv, float k[2]);\nvec2 f(vec2 uv, float k[2]) { return uv; }\nfloat x = max(1.0, 2.0);\n",
        )
        .unwrap();
        let items = items(&tokens).unwrap();
        let kinds: Vec<&ItemKind> = items.iter().map(|i| &i.kind).collect();
        assert_eq!(kinds[0], &ItemKind::Directive);
        assert_eq!(kinds[1], &ItemKind::Struct("S".into()));
        assert_eq!(items[1].region.len(), 1);
        assert_eq!(kinds[2], &ItemKind::Directive);
        assert_eq!(kinds[3], &ItemKind::Block);
        assert!(items[3].region.is_empty());
        match kinds[4] {
            ItemKind::Prototype(sig) => {
                assert_eq!(sig.name, "f");
                assert_eq!(sig.param_types(), vec!["vec2", "float[2]"]);
            }
            k => panic!("unexpected {k:?}"),
        }
        assert!(matches!(kinds[5], ItemKind::Function(sig, _) if sig.return_type == "vec2"));
        assert_eq!(kinds[6], &ItemKind::Declaration);
    }

    #[test]
    fn rejects_stray_braces() {
        let tokens = tokenize("void main() { }\n}\n").unwrap();
        let err = items(&tokens).unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn parses_declarations() {
        let tokens = tokenize("uniform highp vec4 SourceSize;\nvec3 tint = vec3(1.0, 0.5, 0.5);\nfloat a, b;\n").unwrap();
        let items = items(&tokens).unwrap();
        let decl = declaration(&tokens, &items[0]).unwrap();
        assert_eq!(decl.qualifiers, vec!["uniform", "highp"]);
        assert_eq!(decl.ty, "vec4");
        assert_eq!(decl.name, "SourceSize");
        let decl = declaration(&tokens, &items[1]).unwrap();
        assert_eq!(normalized(&tokens, decl.initializer.unwrap()), "vec3 ( 1.0 , 0.5 , 0.5 )");
        assert!(declaration(&tokens, &items[2]).is_none());
    }

    #[test]
    fn infers_expression_types() {
        let tokens = tokenize("color.rg * 2.0 + f(uv)").unwrap();
        let mut vars = FxHashMap::default();
        vars.insert("color".to_string(), "vec4".to_string());
        let functions = FxHashMap::default();
        assert_eq!(
            expression_type(&tokens, 0..tokens.len(), &vars, &functions).as_deref(),
            Some("vec2")
        );

        let tokens = tokenize("dot(a, b) > 0.5").unwrap();
        assert_eq!(
            expression_type(&tokens, 0..tokens.len(), &vars, &functions).as_deref(),
            Some("bool")
        );
    }
}
