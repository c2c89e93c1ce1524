use crate::error::ParsePresetError;
pub use webrashader_common::{FilterMode, ImageFormat, WrapMode};
use std::str::FromStr;

/// The configuration for a single shader pass.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShaderPassConfig {
    /// The index of the shader pass relative to its parent preset.
    pub id: i32,
    /// The normalized path to the shader pass source, relative to the root preset.
    pub name: String,
    /// The alias of the shader pass if there is one.
    pub alias: Option<String>,
    /// The filtering mode that this shader pass should expect.
    pub filter: FilterMode,
    /// The texture addressing (wrap) mode that this shader pass expects.
    pub wrap_mode: WrapMode,
    /// The number to modulate the frame count by.
    pub frame_count_mod: u32,
    /// Whether or not this shader pass expects an SRGB framebuffer output.
    pub srgb_framebuffer: bool,
    /// Whether or not this shader pass expects a float framebuffer output.
    pub float_framebuffer: bool,
    /// Whether or not to generate mipmaps for the input texture before passing to the shader.
    pub mipmap_input: bool,
    /// Whether the output of this pass persists across frames, so that it can be
    /// read back as feedback on the next frame.
    pub persistent: bool,
    /// Specifies the scaling of the output framebuffer for this shader pass.
    pub scaling: Scale2D,
}

impl ShaderPassConfig {
    /// If the framebuffer expects a different format than what was defined in the
    /// shader source, returns such format.
    #[inline(always)]
    pub fn get_format_override(&self) -> Option<ImageFormat> {
        if self.srgb_framebuffer {
            return Some(ImageFormat::R8G8B8A8Srgb);
        } else if self.float_framebuffer {
            return Some(ImageFormat::R16G16B16A16Sfloat);
        }
        None
    }

    /// The alias of this pass, if it is set and not blank.
    pub fn alias(&self) -> Option<&str> {
        self.alias
            .as_deref()
            .map(str::trim)
            .filter(|alias| !alias.is_empty())
    }
}

/// The type to interpret a scaling factor as.
#[repr(i32)]
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScaleType {
    /// Scale by the size of the input quad.
    #[default]
    Input = 0,
    /// Scale the framebuffer in absolute units.
    Absolute,
    /// Scale by the size of the viewport.
    Viewport,
}

/// The scaling factor for framebuffer scaling.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScaleFactor {
    /// Scale by a fractional float factor.
    Float(f32),
    /// Scale by an absolute factor.
    Absolute(i32),
}

impl Default for ScaleFactor {
    fn default() -> Self {
        ScaleFactor::Float(1.0f32)
    }
}

impl From<ScaleFactor> for f32 {
    fn from(value: ScaleFactor) -> Self {
        match value {
            ScaleFactor::Float(f) => f,
            ScaleFactor::Absolute(f) => f as f32,
        }
    }
}

impl ScaleType {
    /// Parse a `scale_type` value, reporting `row` on failure.
    pub(crate) fn parse(s: &str, row: u32) -> Result<Self, ParsePresetError> {
        ScaleType::from_str(s).map_err(|_| ParsePresetError::InvalidScaleType {
            value: s.to_string(),
            row,
        })
    }
}

impl FromStr for ScaleType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "source" => Ok(ScaleType::Input),
            "viewport" => Ok(ScaleType::Viewport),
            "absolute" => Ok(ScaleType::Absolute),
            _ => Err(()),
        }
    }
}

/// Framebuffer scaling parameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Scaling {
    /// The method to scale the framebuffer with.
    pub scale_type: ScaleType,
    /// The factor to scale by.
    pub factor: ScaleFactor,
}

/// 2D quad scaling parameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Scale2D {
    /// Whether or not this combination of scaling factors is valid.
    ///
    /// A pass without any scale type is unscaled: it renders at source size,
    /// or at viewport size if it is the last pass.
    pub valid: bool,
    /// Scaling parameters for the X axis.
    pub x: Scaling,
    /// Scaling parameters for the Y axis.
    pub y: Scaling,
}

/// Configuration options for a lookup texture used in the shader.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TextureConfig {
    /// The name of the texture.
    pub name: String,
    /// The normalized path to the image, relative to the root preset.
    pub path: String,
    /// The wrap (addressing) mode to use when sampling the texture.
    pub wrap_mode: WrapMode,
    /// The filter mode to use when sampling the texture.
    pub filter_mode: FilterMode,
    /// Whether or not to generate mipmaps for this texture.
    pub mipmap: bool,
}

/// Configuration for a shader parameter.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParameterConfig {
    /// The name of the parameter.
    pub name: String,
    /// The value it is set to in the preset.
    pub value: f32,
}

/// A shader preset including all specified parameters, textures, and paths to specified shaders.
///
/// A shader preset can be used to create a filter chain runtime instance, or reflected to get
/// parameter metadata.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShaderPreset {
    /// The number of shaders enabled in the filter chain.
    pub shader_count: i32,
    // Everything is in Vecs because the expect number of values is well below 64.
    /// Preset information for each shader, ordered by pass index.
    pub shaders: Vec<ShaderPassConfig>,
    /// Preset information for each user texture.
    pub textures: Vec<TextureConfig>,
    /// Preset information for each user parameter.
    pub parameters: Vec<ParameterConfig>,
}
