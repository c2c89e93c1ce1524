use std::fmt::{Display, Formatter};
use thiserror::Error;
use webrashader_preprocess::PreprocessError;
use webrashader_transpile::TranspileError;

/// Error type for resolving the parameters and bindings of a preset.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    /// Two passes declare the same parameter with different bounds.
    #[error("parameter `{name}` of pass {pass} conflicts with its declaration in pass {first_pass}")]
    ParameterConflict {
        /// The name of the parameter.
        name: String,
        /// The pass that declared the parameter first.
        first_pass: usize,
        /// The pass with the conflicting declaration.
        pass: usize,
    },
    /// A pass samples a texture it can not see when it runs.
    #[error("pass {pass} references `{name}`: {reason}")]
    CyclicOrInvalidReference {
        /// The pass holding the reference.
        pass: usize,
        /// The sampler or uniform name.
        name: String,
        /// Why the reference is rejected.
        reason: ReferenceError,
    },
    /// A pass reads a uniform that is neither a builtin nor a declared parameter.
    #[error("pass {pass} reads uniform `{name}`, which is not a builtin or a declared parameter")]
    MissingParameter {
        /// The pass reading the uniform.
        pass: usize,
        /// The name of the uniform.
        name: String,
    },
}

/// Why a texture reference is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceError {
    /// The output of a pass that has not run yet in this frame.
    ForwardReference {
        /// The referenced pass.
        target: usize,
    },
    /// The previous frame of a pass that keeps no previous frame.
    NotPersistent {
        /// The referenced pass.
        target: usize,
    },
    /// The name matches no builtin, pass, alias or lookup texture.
    UnknownTexture,
}

impl Display for ReferenceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceError::ForwardReference { target } => {
                write!(f, "pass {target} does not run before it")
            }
            ReferenceError::NotPersistent { target } => {
                write!(f, "pass {target} is not persistent, so it has no feedback")
            }
            ReferenceError::UnknownTexture => f.write_str("no texture has this name"),
        }
    }
}

/// Error type for compiling the passes of a preset.
#[derive(Error, Debug)]
pub enum CompileError {
    /// A pass source failed to load or preprocess.
    #[error("pass {pass}: {source}")]
    Preprocess {
        /// The failing pass.
        pass: usize,
        /// The preprocessing error.
        #[source]
        source: PreprocessError,
    },
    /// A pass source could not be rewritten for the target profile.
    #[error("pass {pass}: {source}")]
    Transpile {
        /// The failing pass.
        pass: usize,
        /// The transpilation error.
        #[source]
        source: TranspileError,
    },
    /// The parameters or texture bindings of the compiled passes are inconsistent.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}
