use nom_locate::LocatedSpan;
use webrashader_common::resolve::{join_relative, Resolver};

mod resolve;
mod token;
mod value;

pub(crate) type Span<'a> = LocatedSpan<&'a str>;
pub(crate) use token::Token;

use crate::error::ParsePresetError;
use crate::parse::resolve::resolve_values;
use crate::parse::token::do_lex;
use crate::parse::value::parse_values;
use crate::ShaderPreset;

/// The maximum depth of nested `#reference` directives.
pub const MAX_REFERENCE_DEPTH: usize = 16;

const REFERENCE_KEY: &str = "#reference";

impl ShaderPreset {
    /// Parse the text of a shader preset.
    ///
    /// Shader and texture paths are normalized but stay relative to the
    /// preset. Presets that `#reference` other presets must be parsed with
    /// [`ShaderPreset::parse_with_references`].
    pub fn parse(text: &str) -> Result<ShaderPreset, ParsePresetError> {
        let tokens = do_lex(text)?;
        if let Some(reference) = tokens
            .iter()
            .find(|token| *token.key.fragment() == REFERENCE_KEY)
        {
            return Err(ParsePresetError::UnresolvedReference(reference.row()));
        }
        let values = parse_values(&[("", tokens)])?;
        resolve_values(values)
    }

    /// Parse the text of the shader preset located at `path`, loading
    /// any `#reference`d presets through `resolver`.
    ///
    /// Values in a preset take precedence over the values of the presets it
    /// references. Paths are resolved relative to the preset that names them
    /// and are returned relative to the same root as `path`.
    pub fn parse_with_references(
        path: &str,
        text: &str,
        resolver: &mut impl Resolver,
    ) -> Result<ShaderPreset, ParsePresetError> {
        let tokens = do_lex(text)?;
        let references = reference_paths(&tokens);

        // we need to lex twice because there's no way to know the references ahead of time.
        let mut children = Vec::new();
        load_child_references(path, references, resolver, 0, &mut children)?;

        let mut files: Vec<(&str, Vec<Token>)> = Vec::with_capacity(children.len() + 1);
        files.push((path, tokens));
        for (child_path, contents) in &children {
            files.push((child_path.as_str(), do_lex(contents)?));
        }

        tracing::debug!(path, references = children.len(), "parsed preset reference chain");
        let values = parse_values(&files)?;
        resolve_values(values)
    }
}

fn reference_paths(tokens: &[Token]) -> Vec<String> {
    tokens
        .iter()
        .filter(|token| *token.key.fragment() == REFERENCE_KEY)
        .map(|token| token.value.fragment().to_string())
        .collect()
}

fn load_child_references(
    base: &str,
    references: Vec<String>,
    resolver: &mut impl Resolver,
    depth: usize,
    children: &mut Vec<(String, String)>,
) -> Result<(), ParsePresetError> {
    if references.is_empty() {
        return Ok(());
    }
    if depth >= MAX_REFERENCE_DEPTH {
        return Err(ParsePresetError::ExceededReferenceDepth(MAX_REFERENCE_DEPTH));
    }

    for reference in references {
        let path = join_relative(base, &reference);
        let contents = resolver
            .read_text(&path)
            .ok_or_else(|| ParsePresetError::ReferenceNotFound(path.clone()))?;
        let nested = reference_paths(&do_lex(&contents)?);
        children.push((path.clone(), contents));
        load_child_references(&path, nested, resolver, depth + 1, children)?;
    }
    Ok(())
}
