use crate::error::{MalformedReason, ParseErrorKind, ParsePresetError};
use crate::parse::{Span, Token};
use crate::{FilterMode, ScaleType, WrapMode};
use nom::bytes::complete::tag;
use nom::character::complete::digit1;
use nom::combinator::{eof, map_res};
use nom::IResult;
use std::str::FromStr;
use webrashader_common::resolve::join_relative;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Value {
    ShaderCount(i32),
    FeedbackPass(i32),
    Shader(i32, String),
    ScaleX(i32, f32),
    ScaleY(i32, f32),
    Scale(i32, f32),
    ScaleType(i32, ScaleType),
    ScaleTypeX(i32, ScaleType),
    ScaleTypeY(i32, ScaleType),
    FilterMode(i32, FilterMode),
    WrapMode(i32, WrapMode),
    FrameCountMod(i32, u32),
    FloatFramebuffer(i32, bool),
    SrgbFramebuffer(i32, bool),
    MipmapInput(i32, bool),
    Persistent(i32, bool),
    Alias(i32, String),
    Parameter(String, f32),
    Texture {
        name: String,
        filter_mode: FilterMode,
        wrap_mode: WrapMode,
        mipmap: bool,
        path: String,
    },
}

impl Value {
    pub(crate) fn shader_index(&self) -> Option<i32> {
        match self {
            Value::Shader(i, _)
            | Value::ScaleX(i, _)
            | Value::ScaleY(i, _)
            | Value::Scale(i, _)
            | Value::ScaleType(i, _)
            | Value::ScaleTypeX(i, _)
            | Value::ScaleTypeY(i, _)
            | Value::FilterMode(i, _)
            | Value::WrapMode(i, _)
            | Value::FrameCountMod(i, _)
            | Value::FloatFramebuffer(i, _)
            | Value::SrgbFramebuffer(i, _)
            | Value::MipmapInput(i, _)
            | Value::Persistent(i, _)
            | Value::Alias(i, _) => Some(*i),
            _ => None,
        }
    }
}

/// A parsed value together with where it came from.
#[derive(Debug, Clone)]
pub(crate) struct PresetValue {
    pub value: Value,
    /// The key as written, for error messages.
    pub key: String,
    pub row: u32,
    /// Index of the file in the reference chain, 0 is the root preset.
    pub file: usize,
}

fn parser_error(input: Span, kind: ParseErrorKind) -> ParsePresetError {
    ParsePresetError::ParserError {
        offset: input.location_offset(),
        row: input.location_line(),
        col: input.get_column(),
        kind,
    }
}

fn from_int(input: Span) -> Result<i32, ParsePresetError> {
    i32::from_str(input.trim()).map_err(|_| parser_error(input, ParseErrorKind::Int))
}

fn from_ul(input: Span) -> Result<u32, ParsePresetError> {
    u32::from_str(input.trim()).map_err(|_| parser_error(input, ParseErrorKind::UnsignedInt))
}

fn from_float(input: Span) -> Result<f32, ParsePresetError> {
    f32::from_str(input.trim()).map_err(|_| parser_error(input, ParseErrorKind::Float))
}

fn from_bool(input: Span) -> Result<bool, ParsePresetError> {
    if let Ok(i) = i32::from_str(input.trim()) {
        return match i {
            1 => Ok(true),
            0 => Ok(false),
            _ => Err(parser_error(input, ParseErrorKind::Bool)),
        };
    }
    bool::from_str(input.trim()).map_err(|_| parser_error(input, ParseErrorKind::Bool))
}

fn parse_indexed_key<'a>(key: &'static str, input: Span<'a>) -> IResult<Span<'a>, i32> {
    let (input, _) = tag(key)(input)?;
    let (input, idx) = map_res(digit1, |s: Span| i32::from_str(s.fragment()))(input)?;
    let (input, _) = eof(input)?;
    Ok((input, idx))
}

/// Keys that carry a pass index suffix. Order does not matter since an
/// indexed key must match exactly up to its digits.
const INDEXED_KEYS: &[&str] = &[
    "shader",
    "scale_type_x",
    "scale_type_y",
    "scale_type",
    "scale_x",
    "scale_y",
    "scale",
    "filter_linear",
    "wrap_mode",
    "alias",
    "frame_count_mod",
    "float_framebuffer",
    "srgb_framebuffer",
    "mipmap_input",
    "persistent",
];

fn parse_indexed_value(
    name: &'static str,
    index: i32,
    token: &Token,
    path: &str,
) -> Result<Value, ParsePresetError> {
    let value = token.value;
    Ok(match name {
        "shader" => Value::Shader(index, join_relative(path, value.fragment())),
        "scale_type_x" => Value::ScaleTypeX(index, ScaleType::parse(value.trim(), token.row())?),
        "scale_type_y" => Value::ScaleTypeY(index, ScaleType::parse(value.trim(), token.row())?),
        "scale_type" => Value::ScaleType(index, ScaleType::parse(value.trim(), token.row())?),
        "scale_x" => Value::ScaleX(index, from_float(value)?),
        "scale_y" => Value::ScaleY(index, from_float(value)?),
        "scale" => Value::Scale(index, from_float(value)?),
        "filter_linear" => Value::FilterMode(
            index,
            if from_bool(value)? {
                FilterMode::Linear
            } else {
                FilterMode::Nearest
            },
        ),
        "wrap_mode" => Value::WrapMode(
            index,
            WrapMode::from_str(value.trim()).unwrap_or_default(),
        ),
        "alias" => Value::Alias(index, value.trim().to_string()),
        "frame_count_mod" => Value::FrameCountMod(index, from_ul(value)?),
        "float_framebuffer" => Value::FloatFramebuffer(index, from_bool(value)?),
        "srgb_framebuffer" => Value::SrgbFramebuffer(index, from_bool(value)?),
        "mipmap_input" => Value::MipmapInput(index, from_bool(value)?),
        "persistent" => Value::Persistent(index, from_bool(value)?),
        _ => return Err(parser_error(token.key, ParseErrorKind::Index(name))),
    })
}

enum TextureKey<'a> {
    Path(&'a str),
    Linear(&'a str),
    WrapMode(&'a str),
    Mipmap(&'a str),
}

impl TextureKey<'_> {
    fn name(&self) -> &str {
        match self {
            TextureKey::Path(name)
            | TextureKey::Linear(name)
            | TextureKey::WrapMode(name)
            | TextureKey::Mipmap(name) => name,
        }
    }
}

fn texture_key<'a>(key: &'a str, texture_names: &[&str]) -> Option<TextureKey<'a>> {
    if texture_names.contains(&key) {
        return Some(TextureKey::Path(key));
    }
    let suffixed = |suffix: &str| {
        key.strip_suffix(suffix)
            .filter(|name| texture_names.contains(name))
    };
    if let Some(name) = suffixed("_linear") {
        return Some(TextureKey::Linear(name));
    }
    if let Some(name) = suffixed("_wrap_mode") {
        return Some(TextureKey::WrapMode(name));
    }
    if let Some(name) = suffixed("_mipmap") {
        return Some(TextureKey::Mipmap(name));
    }
    None
}

#[derive(Default)]
struct PendingTexture {
    path: Option<String>,
    linear: Option<bool>,
    wrap_mode: Option<WrapMode>,
    mipmap: Option<bool>,
}

/// Convert the tokens of every file in a reference chain into values.
///
/// Files are ordered by precedence, the root preset first. Where a key is
/// repeated, the first value wins when the values are resolved.
pub(crate) fn parse_values(
    files: &[(&str, Vec<Token>)],
) -> Result<Vec<PresetValue>, ParsePresetError> {
    // collect all possible texture names.
    let mut texture_names: Vec<&str> = Vec::new();
    let mut textures_row = 0;
    for (_, tokens) in files {
        for token in tokens.iter().filter(|t| *t.key.fragment() == "textures") {
            textures_row = token.row();
            for name in token.value.fragment().split(';') {
                let name = name.trim();
                if !name.is_empty() && !texture_names.contains(&name) {
                    texture_names.push(name);
                }
            }
        }
    }

    let mut values = Vec::new();
    let mut pending: Vec<PendingTexture> = texture_names
        .iter()
        .map(|_| PendingTexture::default())
        .collect();

    for (file, (path, tokens)) in files.iter().enumerate() {
        'tokens: for token in tokens {
            let key = *token.key.fragment();
            let located = |value: Value| PresetValue {
                value,
                key: key.to_string(),
                row: token.row(),
                file,
            };

            match key {
                "textures" | "parameters" | "#reference" => continue,
                "shaders" => {
                    values.push(located(Value::ShaderCount(from_int(token.value)?)));
                    continue;
                }
                "feedback_pass" => {
                    values.push(located(Value::FeedbackPass(from_int(token.value)?)));
                    continue;
                }
                _ => {}
            }

            if let Some(texture) = texture_key(key, &texture_names) {
                let Some(idx) = texture_names.iter().position(|n| *n == texture.name()) else {
                    continue;
                };
                let pending = &mut pending[idx];
                match texture {
                    TextureKey::Path(_) => {
                        if pending.path.is_none() {
                            pending.path = Some(join_relative(path, token.value.fragment()));
                        }
                    }
                    TextureKey::Linear(_) => {
                        let linear = from_bool(token.value)?;
                        pending.linear.get_or_insert(linear);
                    }
                    TextureKey::WrapMode(_) => {
                        let wrap_mode = WrapMode::from_str(token.value.trim()).unwrap_or_default();
                        pending.wrap_mode.get_or_insert(wrap_mode);
                    }
                    TextureKey::Mipmap(_) => {
                        let mipmap = from_bool(token.value)?;
                        pending.mipmap.get_or_insert(mipmap);
                    }
                }
                continue;
            }

            for &name in INDEXED_KEYS {
                if let Ok((_, index)) = parse_indexed_key(name, token.key) {
                    values.push(located(parse_indexed_value(name, index, token, path)?));
                    continue 'tokens;
                }
            }

            // handle undeclared parameters after parsing everything else as a last resort.
            match from_float(token.value) {
                Ok(value) => values.push(located(Value::Parameter(key.to_string(), value))),
                Err(_) => tracing::debug!(key, row = token.row(), "ignoring unknown preset key"),
            }
        }
    }

    for (name, texture) in texture_names.into_iter().zip(pending) {
        let Some(path) = texture.path else {
            return Err(ParsePresetError::MalformedPreset {
                line: textures_row,
                reason: MalformedReason::TextureWithoutPath(name.to_string()),
            });
        };
        values.push(PresetValue {
            value: Value::Texture {
                name: name.to_string(),
                filter_mode: if texture.linear.unwrap_or(false) {
                    FilterMode::Linear
                } else {
                    FilterMode::Nearest
                },
                wrap_mode: texture.wrap_mode.unwrap_or_default(),
                mipmap: texture.mipmap.unwrap_or(false),
                path,
            },
            key: name.to_string(),
            row: textures_row,
            file: 0,
        });
    }

    Ok(values)
}
