use crate::error::{MalformedReason, ParsePresetError};
use crate::parse::value::{PresetValue, Value};
use crate::{
    FilterMode, ParameterConfig, Scale2D, ScaleFactor, ScaleType, Scaling, ShaderPassConfig,
    ShaderPreset, TextureConfig, WrapMode,
};

fn malformed(line: u32, reason: MalformedReason) -> ParsePresetError {
    ParsePresetError::MalformedPreset { line, reason }
}

fn factor(scale_type: ScaleType, value: Option<f32>) -> ScaleFactor {
    match (scale_type, value) {
        (ScaleType::Absolute, Some(value)) => ScaleFactor::Absolute(value as i32),
        (_, Some(value)) => ScaleFactor::Float(value),
        (_, None) => ScaleFactor::default(),
    }
}

/// Resolve parsed values into a preset, validating the pass chain.
///
/// Values are in precedence order, so the first value for any key wins.
pub(crate) fn resolve_values(values: Vec<PresetValue>) -> Result<ShaderPreset, ParsePresetError> {
    let Some(count) = values.iter().find_map(|v| match v.value {
        Value::ShaderCount(count) => Some((count, v.row)),
        _ => None,
    }) else {
        let line = values.first().map_or(1, |v| v.row);
        return Err(malformed(line, MalformedReason::MissingShaderCount));
    };
    let (shader_count, count_row) = count;
    if shader_count <= 0 {
        return Err(malformed(count_row, MalformedReason::EmptyChain));
    }

    // Every indexed key must name a declared pass, and each file may only
    // declare a shader once.
    let mut shader_indices: Vec<i32> = Vec::new();
    for (position, v) in values.iter().enumerate() {
        if let Some(index) = v.value.shader_index() {
            if index >= shader_count {
                return Err(malformed(
                    v.row,
                    MalformedReason::IndexOutOfRange {
                        key: v.key.clone(),
                        index,
                        count: shader_count,
                    },
                ));
            }
        }
        if let Value::FeedbackPass(index) = v.value {
            if index < 0 || index >= shader_count {
                return Err(malformed(
                    v.row,
                    MalformedReason::IndexOutOfRange {
                        key: v.key.clone(),
                        index,
                        count: shader_count,
                    },
                ));
            }
        }
        if let Value::Shader(index, _) = v.value {
            let redeclared = values[..position]
                .iter()
                .any(|p| p.file == v.file && matches!(p.value, Value::Shader(i, _) if i == index));
            if redeclared {
                return Err(malformed(v.row, MalformedReason::DuplicateShader(index)));
            }
            if !shader_indices.contains(&index) {
                shader_indices.push(index);
            }
        }
    }

    if shader_indices.len() != shader_count as usize {
        return Err(malformed(
            count_row,
            MalformedReason::ShaderCountMismatch {
                declared: shader_count,
                found: shader_indices.len(),
            },
        ));
    }

    let feedback_pass = values.iter().find_map(|v| match v.value {
        Value::FeedbackPass(pass) => Some(pass),
        _ => None,
    });

    let mut shaders = Vec::with_capacity(shader_count as usize);
    for index in 0..shader_count {
        let pass_values: Vec<&Value> = values
            .iter()
            .map(|v| &v.value)
            .filter(|v| v.shader_index() == Some(index))
            .collect();

        macro_rules! first {
            ($variant:ident) => {
                pass_values.iter().find_map(|f| match f {
                    Value::$variant(_, value) => Some(value.clone()),
                    _ => None,
                })
            };
        }

        let Some(name) = first!(Shader) else {
            return Err(malformed(count_row, MalformedReason::MissingShader(index)));
        };

        let scale_type = first!(ScaleType);
        let mut scale_type_x = first!(ScaleTypeX);
        let mut scale_type_y = first!(ScaleTypeY);

        if scale_type.is_some() {
            // scale takes priority
            // https://github.com/libretro/RetroArch/blob/fcbd72dbf3579eb31721fbbf0d89a139834bcce9/gfx/video_shader_parse.c#L310
            scale_type_x = scale_type;
            scale_type_y = scale_type;
        }

        let scale_valid = scale_type_x.is_some() || scale_type_y.is_some();

        let scale = first!(Scale);
        let mut scale_x = first!(ScaleX);
        let mut scale_y = first!(ScaleY);

        if scale.is_some() {
            scale_x = scale;
            scale_y = scale;
        }

        let scale_type_x = scale_type_x.unwrap_or_default();
        let scale_type_y = scale_type_y.unwrap_or_default();

        shaders.push(ShaderPassConfig {
            id: index,
            name,
            alias: first!(Alias),
            filter: first!(FilterMode).unwrap_or(FilterMode::default()),
            wrap_mode: first!(WrapMode).unwrap_or(WrapMode::default()),
            frame_count_mod: first!(FrameCountMod).unwrap_or(0),
            srgb_framebuffer: first!(SrgbFramebuffer).unwrap_or(false),
            float_framebuffer: first!(FloatFramebuffer).unwrap_or(false),
            mipmap_input: first!(MipmapInput).unwrap_or(false),
            persistent: first!(Persistent).unwrap_or(false) || feedback_pass == Some(index),
            scaling: Scale2D {
                valid: scale_valid,
                x: Scaling {
                    scale_type: scale_type_x,
                    factor: factor(scale_type_x, scale_x),
                },
                y: Scaling {
                    scale_type: scale_type_y,
                    factor: factor(scale_type_y, scale_y),
                },
            },
        });
    }

    let textures = values
        .iter()
        .filter_map(|v| match &v.value {
            Value::Texture {
                name,
                filter_mode,
                wrap_mode,
                mipmap,
                path,
            } => Some(TextureConfig {
                name: name.clone(),
                path: path.clone(),
                wrap_mode: *wrap_mode,
                filter_mode: *filter_mode,
                mipmap: *mipmap,
            }),
            _ => None,
        })
        .collect();

    let mut parameters: Vec<ParameterConfig> = Vec::new();
    for v in &values {
        if let Value::Parameter(name, value) = &v.value {
            if !parameters.iter().any(|p| &p.name == name) {
                parameters.push(ParameterConfig {
                    name: name.clone(),
                    value: *value,
                });
            }
        }
    }

    Ok(ShaderPreset {
        shader_count,
        shaders,
        textures,
        parameters,
    })
}
