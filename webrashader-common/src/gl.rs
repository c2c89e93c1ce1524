use crate::{FilterMode, ImageFormat, WrapMode};

impl ImageFormat {
    /// The sized internal format used to allocate a render target of this format
    /// on a WebGL2 context.
    ///
    /// Formats WebGL cannot render to map to `RGBA8`.
    pub fn webgl2_internal_format(self) -> u32 {
        match self {
            ImageFormat::R8G8B8A8Srgb => glow::SRGB8_ALPHA8,
            ImageFormat::R16G16B16A16Sfloat
            | ImageFormat::R16Sfloat
            | ImageFormat::R16G16Sfloat => glow::RGBA16F,
            ImageFormat::R32G32B32A32Sfloat | ImageFormat::R32Sfloat | ImageFormat::R32G32Sfloat => {
                glow::RGBA32F
            }
            _ => glow::RGBA8,
        }
    }
}

impl From<WrapMode> for i32 {
    fn from(value: WrapMode) -> Self {
        match value {
            // no border colour in GLES
            WrapMode::ClampToBorder | WrapMode::ClampToEdge => glow::CLAMP_TO_EDGE as i32,
            WrapMode::Repeat => glow::REPEAT as i32,
            WrapMode::MirroredRepeat => glow::MIRRORED_REPEAT as i32,
        }
    }
}

impl From<FilterMode> for i32 {
    fn from(value: FilterMode) -> Self {
        match value {
            FilterMode::Linear => glow::LINEAR as i32,
            FilterMode::Nearest => glow::NEAREST as i32,
        }
    }
}

impl FilterMode {
    /// Get the minification filter for the given mipmap filter.
    pub fn gl_mip(&self, mip: FilterMode) -> u32 {
        match (self, mip) {
            (FilterMode::Linear, FilterMode::Linear) => glow::LINEAR_MIPMAP_LINEAR,
            (FilterMode::Linear, FilterMode::Nearest) => glow::LINEAR_MIPMAP_NEAREST,
            (FilterMode::Nearest, FilterMode::Linear) => glow::NEAREST_MIPMAP_LINEAR,
            _ => glow::NEAREST_MIPMAP_NEAREST,
        }
    }
}
