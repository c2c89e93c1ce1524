use crate::error::TranspileError;
use crate::syntax::{self, Item, Region};
use crate::token::{self, Token};
use crate::{ShaderStage, TranspileOptions, WebGlVersion};
use rustc_hash::{FxHashMap, FxHashSet};
use std::ops::Range;
use webrashader_preprocess::{Provenance, SourceMap, StageSource};

/// The kind of texture a sampler reads, as declared before any type
/// downgrades.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum SamplerKind {
    Sampler1D,
    Sampler2D,
    Sampler3D,
    Cube,
    Shadow2D,
    Array2D,
}

impl SamplerKind {
    pub fn from_type(ty: &str) -> Option<SamplerKind> {
        Some(match ty {
            "sampler1D" => SamplerKind::Sampler1D,
            "sampler2D" | "isampler2D" | "usampler2D" | "sampler2DRect" | "samplerExternalOES" => {
                SamplerKind::Sampler2D
            }
            "sampler3D" | "isampler3D" | "usampler3D" => SamplerKind::Sampler3D,
            "samplerCube" | "samplerCubeShadow" | "isamplerCube" | "usamplerCube" => {
                SamplerKind::Cube
            }
            "sampler2DShadow" => SamplerKind::Shadow2D,
            "sampler2DArray" | "sampler2DArrayShadow" | "isampler2DArray" | "usampler2DArray" => {
                SamplerKind::Array2D
            }
            _ => return None,
        })
    }
}

/// A declared sampler.
#[derive(Debug, Copy, Clone)]
pub(crate) struct SamplerInfo {
    pub kind: SamplerKind,
    /// Whether the sampler is a uniform rather than a function parameter.
    pub uniform: bool,
}

/// One stage being transpiled.
pub(crate) struct StageUnit {
    pub stage: ShaderStage,
    pub tokens: Vec<Token>,
    map: SourceMap,
    header: Provenance,
    /// `#extension` lines emitted directly below the version line.
    pub extensions: Vec<String>,
    /// Declarations emitted ahead of the stage body, in order.
    pub declarations: Vec<String>,
    /// Explicit locations from `layout` qualifiers of stage inputs, by
    /// variable name.
    pub input_locations: FxHashMap<String, u32>,
    /// Explicit locations from `layout` qualifiers of stage outputs.
    pub output_locations: FxHashMap<String, u32>,
    pub samplers: FxHashMap<String, SamplerInfo>,
    /// Names introduced by stub synthesis.
    pub stubs: FxHashSet<String>,
}

impl StageUnit {
    pub fn new(
        stage: ShaderStage,
        source: &StageSource,
        header: &Provenance,
    ) -> Result<StageUnit, TranspileError> {
        let mut unit = StageUnit {
            stage,
            tokens: Vec::new(),
            map: source.map.clone(),
            header: header.clone(),
            extensions: Vec::new(),
            declarations: Vec::new(),
            input_locations: FxHashMap::default(),
            output_locations: FxHashMap::default(),
            samplers: FxHashMap::default(),
            stubs: FxHashSet::default(),
        };
        unit.tokens = token::tokenize(&source.text).map_err(|e| TranspileError::Unterminated {
            what: e.what,
            origin: unit.origin(e.line),
        })?;
        Ok(unit)
    }

    /// Where the given line of the stage text was written. Synthesized
    /// lines map to the version header.
    pub fn origin(&self, line: u32) -> Provenance {
        self.map
            .get(line)
            .cloned()
            .unwrap_or_else(|| self.header.clone())
    }

    pub fn header(&self) -> &Provenance {
        &self.header
    }

    pub fn map(&self) -> &SourceMap {
        &self.map
    }

    pub fn require_extension(&mut self, name: &str, behavior: &str) {
        let present = self
            .extensions
            .iter()
            .any(|line| line.split_whitespace().nth(1) == Some(name));
        if !present {
            self.extensions.push(format!("#extension {name} : {behavior}"));
        }
    }

    pub fn declare(&mut self, declaration: String) {
        if !self.declarations.contains(&declaration) {
            self.declarations.push(declaration);
        }
    }

    pub fn items(&self) -> Result<Vec<Item>, TranspileError> {
        syntax::items(&self.tokens).map_err(|e| TranspileError::Unbalanced {
            delimiter: e.delimiter,
            origin: self.origin(e.line),
        })
    }

    pub fn unsupported(&self, what: impl Into<String>, target: WebGlVersion, line: u32) -> TranspileError {
        TranspileError::Unsupported {
            what: what.into(),
            target,
            origin: self.origin(line),
        }
    }

    /// Rename every reference to `from`, leaving member selections alone.
    pub fn rename(&mut self, from: &str, to: &str) {
        for idx in 0..self.tokens.len() {
            if self.tokens[idx].is(from) && syntax::is_reference(&self.tokens, idx) {
                self.tokens[idx].text = to.to_string();
            }
        }
    }

    pub fn apply(&mut self, patch: Patch) {
        let tokens = std::mem::take(&mut self.tokens);
        self.tokens = patch.apply(tokens);
    }
}

/// A set of removals and insertions applied to a token stream in one go,
/// so indices stay valid while the patch is built.
#[derive(Debug, Default)]
pub(crate) struct Patch {
    removals: Vec<Range<usize>>,
    inserts: Vec<(usize, Vec<Token>)>,
}

impl Patch {
    pub fn remove(&mut self, range: Range<usize>) {
        self.removals.push(range);
    }

    pub fn insert(&mut self, at: usize, tokens: Vec<Token>) {
        self.inserts.push((at, tokens));
    }

    pub fn replace(&mut self, range: Range<usize>, tokens: Vec<Token>) {
        self.insert(range.start, tokens);
        self.remove(range);
    }

    pub fn is_empty(&self) -> bool {
        self.removals.is_empty() && self.inserts.is_empty()
    }

    fn apply(mut self, tokens: Vec<Token>) -> Vec<Token> {
        let mut removed = vec![false; tokens.len()];
        for range in &self.removals {
            for flag in &mut removed[range.start.min(tokens.len())..range.end.min(tokens.len())] {
                *flag = true;
            }
        }
        self.inserts.sort_by_key(|(at, _)| *at);
        let mut inserts = self.inserts.into_iter().peekable();

        let mut output = Vec::with_capacity(tokens.len());
        for (idx, token) in tokens.into_iter().enumerate() {
            while let Some((_, insert)) = inserts.next_if(|(at, _)| *at <= idx) {
                output.extend(insert);
            }
            if !removed[idx] {
                output.push(token);
            }
        }
        for (_, insert) in inserts {
            output.extend(insert);
        }
        output
    }
}

/// A function identified by name, parameter types and the conditional
/// compilation region it is defined in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct SignatureKey {
    pub name: String,
    pub params: Vec<String>,
    pub region: Region,
}

/// State threaded through every step of transpiling one shader.
pub(crate) struct TranspileContext {
    pub options: TranspileOptions,
    /// Function signatures already defined in the stage being deduplicated,
    /// with the item index of their first definition.
    seen: FxHashMap<SignatureKey, usize>,
}

impl TranspileContext {
    pub fn new(options: &TranspileOptions) -> Self {
        Self {
            options: options.clone(),
            seen: FxHashMap::default(),
        }
    }

    pub fn target(&self) -> WebGlVersion {
        self.options.target
    }

    /// Forget the signatures of the previous stage.
    pub fn begin_stage(&mut self) {
        self.seen.clear();
    }

    /// Record the definition of `key` at `item`, returning the item of an
    /// earlier definition if there is one.
    pub fn define(&mut self, key: SignatureKey, item: usize) -> Option<usize> {
        match self.seen.get(&key) {
            Some(first) => Some(*first),
            None => {
                self.seen.insert(key, item);
                None
            }
        }
    }
}
