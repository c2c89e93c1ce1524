use thiserror::Error;

/// Error type for preset parsing.
#[derive(Error, Debug)]
pub enum ParsePresetError {
    /// An error occurred when tokenizing the preset file.
    #[error("shader preset lexing error at line {row}, column {col}")]
    LexerError {
        /// The byte offset of the error.
        offset: usize,
        /// The line of the error.
        row: u32,
        /// The column of the error.
        col: usize,
    },
    /// A value in the preset could not be parsed.
    #[error("shader preset parse error at line {row}, column {col}: expected {kind}")]
    ParserError {
        /// The byte offset of the error.
        offset: usize,
        /// The line of the error.
        row: u32,
        /// The column of the error.
        col: usize,
        /// The kind of value that was expected.
        kind: ParseErrorKind,
    },
    /// The scale type was not one of `source`, `viewport` or `absolute`.
    #[error("invalid scale type `{value}` at line {row}")]
    InvalidScaleType {
        /// The unrecognized scale type.
        value: String,
        /// The line of the error.
        row: u32,
    },
    /// The preset parsed, but does not describe a consistent pass chain.
    #[error("malformed preset at line {line}: {reason}")]
    MalformedPreset {
        /// The line that caused the preset to be rejected.
        line: u32,
        /// Why the preset was rejected.
        reason: MalformedReason,
    },
    /// `#reference` chains nested deeper than [`MAX_REFERENCE_DEPTH`](crate::MAX_REFERENCE_DEPTH).
    #[error("exceeded maximum reference depth ({0})")]
    ExceededReferenceDepth(usize),
    /// The resolver did not return contents for a referenced preset.
    #[error("referenced preset `{0}` could not be resolved")]
    ReferenceNotFound(String),
    /// A `#reference` was found while parsing without a resolver.
    #[error("`#reference` at line {0} requires a resolver")]
    UnresolvedReference(u32),
}

/// The kind of value expected when a preset value failed to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// The key had an invalid pass index.
    Index(&'static str),
    /// Expected a signed integer.
    Int,
    /// Expected an unsigned integer.
    UnsignedInt,
    /// Expected a float.
    Float,
    /// Expected a boolean.
    Bool,
}

impl std::fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseErrorKind::Index(key) => write!(f, "a pass index after `{key}`"),
            ParseErrorKind::Int => f.write_str("an integer"),
            ParseErrorKind::UnsignedInt => f.write_str("an unsigned integer"),
            ParseErrorKind::Float => f.write_str("a float"),
            ParseErrorKind::Bool => f.write_str("a boolean"),
        }
    }
}

/// Reasons a syntactically valid preset is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedReason {
    /// There was no `shaders = N` declaration.
    #[error("missing `shaders` declaration")]
    MissingShaderCount,
    /// `shaders = N` declares no passes.
    #[error("a preset must declare at least one pass")]
    EmptyChain,
    /// `shaders = N` disagrees with the number of `shaderK` entries.
    #[error("`shaders = {declared}` but {found} shader entries are present")]
    ShaderCountMismatch {
        /// The declared pass count.
        declared: i32,
        /// The number of `shaderK` entries.
        found: usize,
    },
    /// A pass index in `0..N` has no `shaderK` entry.
    #[error("no `shader{0}` entry")]
    MissingShader(i32),
    /// An indexed key refers to a pass outside `0..N`.
    #[error("`{key}` refers to pass {index}, but only {count} passes are declared")]
    IndexOutOfRange {
        /// The offending key.
        key: String,
        /// The index in the key.
        index: i32,
        /// The declared pass count.
        count: i32,
    },
    /// The same `shaderK` appears twice in one file.
    #[error("`shader{0}` is declared more than once")]
    DuplicateShader(i32),
    /// A texture named in `textures` has no path.
    #[error("texture `{0}` has no path")]
    TextureWithoutPath(String),
}
