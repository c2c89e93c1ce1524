use crate::context::StageUnit;
use crate::token::TokenKind;
use crate::WebGlVersion;
use webrashader_preprocess::{Provenance, SourceMap};

/// The GLSL source of one stage, ready to hand to the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStage {
    /// The GLSL ES source.
    pub source: String,
    /// Where each line of `source` was written.
    pub map: SourceMap,
}

pub(crate) fn emit(unit: &StageUnit, target: WebGlVersion) -> CompiledStage {
    let header = unit.header().clone();
    let mut source = String::new();
    let mut lines = Vec::new();

    let preamble = std::iter::once(target.version_header().to_string())
        .chain(unit.extensions.iter().cloned())
        .chain(unit.declarations.iter().cloned());
    for text in preamble {
        for line in text.lines() {
            source.push_str(line);
            source.push('\n');
            lines.push(header.clone());
        }
    }

    // a line maps to the first written token on it
    let mut current: Option<u32> = None;
    for token in &unit.tokens {
        source.push_str(&token.text);
        if current.is_none() && token.line > 0 && token.kind != TokenKind::Space {
            current = Some(token.line);
        }
        for (offset, _) in token.text.match_indices('\n').enumerate() {
            lines.push(current.map_or_else(|| header.clone(), |line| unit.origin(line)));
            // the rest of a multi-line token continues on the following lines
            current = (token.line > 0 && token.kind != TokenKind::Newline)
                .then(|| token.line + offset as u32 + 1);
        }
    }
    if !source.ends_with('\n') {
        lines.push(current.map_or_else(|| header.clone(), |line| unit.origin(line)));
        source.push('\n');
    }

    CompiledStage {
        source,
        map: SourceMap::new(lines),
    }
}
