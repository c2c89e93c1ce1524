//! Names the GLSL language and its standard library define.

const KEYWORDS: &[&str] = &[
    "if", "else", "for", "while", "do", "return", "break", "continue", "discard", "struct",
    "true", "false", "switch", "case", "default", "const", "uniform", "attribute", "varying",
    "in", "out", "inout", "flat", "smooth", "noperspective", "centroid", "invariant", "precise",
    "highp", "mediump", "lowp", "precision", "layout", "buffer", "shared",
];

const SCALAR_TYPES: &[&str] = &["void", "bool", "int", "uint", "float", "double"];

const SAMPLER_TYPES: &[&str] = &[
    "sampler1D",
    "sampler2D",
    "sampler3D",
    "samplerCube",
    "sampler2DShadow",
    "samplerCubeShadow",
    "sampler2DArray",
    "sampler2DArrayShadow",
    "sampler2DRect",
    "samplerExternalOES",
    "isampler2D",
    "isampler3D",
    "isamplerCube",
    "isampler2DArray",
    "usampler2D",
    "usampler3D",
    "usamplerCube",
    "usampler2DArray",
];

const FUNCTIONS: &[&str] = &[
    "radians", "degrees", "sin", "cos", "tan", "asin", "acos", "atan", "sinh", "cosh", "tanh",
    "asinh", "acosh", "atanh", "pow", "exp", "log", "exp2", "log2", "sqrt", "inversesqrt", "abs",
    "sign", "floor", "trunc", "round", "roundEven", "ceil", "fract", "mod", "modf", "min", "max",
    "clamp", "mix", "step", "smoothstep", "isnan", "isinf", "floatBitsToInt", "floatBitsToUint",
    "intBitsToFloat", "uintBitsToFloat", "packSnorm2x16", "unpackSnorm2x16", "packUnorm2x16",
    "unpackUnorm2x16", "packHalf2x16", "unpackHalf2x16", "length", "distance", "dot", "cross",
    "normalize", "faceforward", "reflect", "refract", "matrixCompMult", "outerProduct",
    "transpose", "determinant", "inverse", "lessThan", "lessThanEqual", "greaterThan",
    "greaterThanEqual", "equal", "notEqual", "any", "all", "not", "dFdx", "dFdy", "fwidth",
    "texture", "textureProj", "textureLod", "textureOffset", "texelFetch", "texelFetchOffset",
    "textureProjOffset", "textureLodOffset", "textureProjLod", "textureProjLodOffset",
    "textureGrad", "textureGradOffset", "textureProjGrad", "textureProjGradOffset",
    "textureSize", "texture1D", "texture1DLod", "texture2D", "texture2DProj", "texture2DLod",
    "texture2DProjLod", "texture3D", "texture3DLod", "textureCube", "textureCubeLod",
    "texture2DLodEXT", "texture2DProjLodEXT", "textureCubeLodEXT", "texture2DGradEXT",
    "texture2DProjGradEXT", "textureCubeGradEXT", "shadow2D", "shadow2DProj",
];

pub(crate) fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

pub(crate) fn is_sampler_type(name: &str) -> bool {
    SAMPLER_TYPES.contains(&name)
}

/// The component count of a vector type name, with its scalar type.
pub(crate) fn vector_parts(name: &str) -> Option<(&'static str, u8)> {
    let (scalar, size) = match name.as_bytes() {
        [b'v', b'e', b'c', n] => ("float", *n),
        [b'b', b'v', b'e', b'c', n] => ("bool", *n),
        [b'i', b'v', b'e', b'c', n] => ("int", *n),
        [b'u', b'v', b'e', b'c', n] => ("uint", *n),
        [b'd', b'v', b'e', b'c', n] => ("double", *n),
        _ => return None,
    };
    match size {
        b'2'..=b'4' => Some((scalar, size - b'0')),
        _ => None,
    }
}

/// The column and row counts of a matrix type name, and whether it is a
/// double matrix.
pub(crate) fn matrix_parts(name: &str) -> Option<(u8, u8, bool)> {
    let (double, rest) = match name.strip_prefix("dmat") {
        Some(rest) => (true, rest),
        None => (false, name.strip_prefix("mat")?),
    };
    let dim = |b: u8| (b'2'..=b'4').contains(&b).then_some(b - b'0');
    match rest.as_bytes() {
        [n] => dim(*n).map(|n| (n, n, double)),
        [c, b'x', r] => Some((dim(*c)?, dim(*r)?, double)),
        _ => None,
    }
}

/// Whether `name` is a type the language defines.
pub(crate) fn is_builtin_type(name: &str) -> bool {
    SCALAR_TYPES.contains(&name)
        || is_sampler_type(name)
        || vector_parts(name).is_some()
        || matrix_parts(name).is_some()
}

pub(crate) fn is_builtin_function(name: &str) -> bool {
    FUNCTIONS.contains(&name) || is_builtin_type(name)
}

/// Whether `name` is reserved by the language and can never be user declared.
pub(crate) fn is_builtin(name: &str) -> bool {
    name.starts_with("gl_")
        || is_keyword(name)
        || is_builtin_function(name)
        || name.starts_with("__")
}

/// Whether values of the type are integers.
pub(crate) fn is_integer_type(name: &str) -> bool {
    matches!(name, "int" | "uint")
        || vector_parts(name).is_some_and(|(scalar, _)| matches!(scalar, "int" | "uint"))
}

/// Whether values of the type are floating point, which are the only types
/// an ES 1.00 varying may have.
pub(crate) fn is_float_type(name: &str) -> bool {
    name == "float"
        || vector_parts(name).is_some_and(|(scalar, _)| scalar == "float")
        || matrix_parts(name).is_some_and(|(c, r, double)| c == r && !double)
}

/// The neutral value a synthesized declaration of `ty` evaluates to.
pub(crate) fn neutral_value(ty: &str) -> String {
    match ty {
        "float" | "double" => "0.0".to_string(),
        "int" => "0".to_string(),
        "uint" => "0u".to_string(),
        "bool" => "false".to_string(),
        _ => {
            if let Some((scalar, _)) = vector_parts(ty) {
                let zero = match scalar {
                    "int" => "0",
                    "uint" => "0u",
                    "bool" => "false",
                    _ => "0.0",
                };
                format!("{ty}({zero})")
            } else if matrix_parts(ty).is_some() {
                format!("{ty}(1.0)")
            } else {
                "0.0".to_string()
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn classifies_types() {
        assert_eq!(vector_parts("uvec3"), Some(("uint", 3)));
        assert_eq!(vector_parts("vec5"), None);
        assert_eq!(matrix_parts("mat3x2"), Some((3, 2, false)));
        assert_eq!(matrix_parts("dmat4"), Some((4, 4, true)));
        assert!(is_builtin_type("sampler2DShadow"));
        assert!(!is_builtin_type("Source"));
        assert!(is_builtin("gl_FragCoord"));
        assert!(is_integer_type("ivec2"));
        assert!(!is_float_type("mat2x3"));
    }

    #[test]
    fn neutral_values() {
        assert_eq!(neutral_value("vec3"), "vec3(0.0)");
        assert_eq!(neutral_value("mat4"), "mat4(1.0)");
        assert_eq!(neutral_value("ivec2"), "ivec2(0)");
        assert_eq!(neutral_value("bool"), "false");
    }
}
