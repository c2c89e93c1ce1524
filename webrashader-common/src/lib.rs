//! Common types and conversions shared by the webrashader crates.
#![forbid(missing_docs)]

/// OpenGL ES / WebGL constant conversions.
#[cfg(feature = "webgl")]
pub mod gl;

/// Hash map and string types used throughout webrashader.
pub mod map;

/// Path resolution for preset, shader and texture sources supplied by the host.
pub mod resolve;

use num_traits::AsPrimitive;
use std::convert::Infallible;
use std::str::FromStr;

/// Supported image formats for render targets.
///
/// `#pragma format` names every format a native runtime understands. WebGL
/// can only render into a handful of them, so the runtime falls back to
/// [`ImageFormat::R8G8B8A8Unorm`] for anything it cannot allocate.
#[repr(u32)]
#[derive(Default, Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ImageFormat {
    /// Format was not specified.
    #[default]
    Unknown = 0,

    /* 8-bit */
    /// `R8_UNORM`
    R8Unorm,
    /// `R8_UINT`
    R8Uint,
    /// `R8_SINT`
    R8Sint,
    /// `R8G8_UNORM`
    R8G8Unorm,
    /// `R8G8_UINT`
    R8G8Uint,
    /// `R8G8_SINT`
    R8G8Sint,
    /// `R8G8B8A8_UNORM`
    R8G8B8A8Unorm,
    /// `R8G8B8A8_UINT`
    R8G8B8A8Uint,
    /// `R8G8B8A8_SINT`
    R8G8B8A8Sint,
    /// `R8G8B8A8_SRGB`
    R8G8B8A8Srgb,

    /* 10-bit */
    /// `A2B10G10R10_UNORM_PACK32`
    A2B10G10R10UnormPack32,
    /// `A2B10G10R10_UINT_PACK32`
    A2B10G10R10UintPack32,

    /* 16-bit */
    /// `R16_UINT`
    R16Uint,
    /// `R16_SINT`
    R16Sint,
    /// `R16_SFLOAT`
    R16Sfloat,
    /// `R16G16_UINT`
    R16G16Uint,
    /// `R16G16_SINT`
    R16G16Sint,
    /// `R16G16_SFLOAT`
    R16G16Sfloat,
    /// `R16G16B16A16_UINT`
    R16G16B16A16Uint,
    /// `R16G16B16A16_SINT`
    R16G16B16A16Sint,
    /// `R16G16B16A16_SFLOAT`
    R16G16B16A16Sfloat,

    /* 32-bit */
    /// `R32_UINT`
    R32Uint,
    /// `R32_SINT`
    R32Sint,
    /// `R32_SFLOAT`
    R32Sfloat,
    /// `R32G32_UINT`
    R32G32Uint,
    /// `R32G32_SINT`
    R32G32Sint,
    /// `R32G32_SFLOAT`
    R32G32Sfloat,
    /// `R32G32B32A32_UINT`
    R32G32B32A32Uint,
    /// `R32G32B32A32_SINT`
    R32G32B32A32Sint,
    /// `R32G32B32A32_SFLOAT`
    R32G32B32A32Sfloat,
}

impl ImageFormat {
    /// Whether the format stores floating point texels.
    pub fn is_float(self) -> bool {
        matches!(
            self,
            ImageFormat::R16Sfloat
                | ImageFormat::R16G16Sfloat
                | ImageFormat::R16G16B16A16Sfloat
                | ImageFormat::R32Sfloat
                | ImageFormat::R32G32Sfloat
                | ImageFormat::R32G32B32A32Sfloat
        )
    }
}

/// The filtering mode for a texture sampler.
#[repr(i32)]
#[derive(Copy, Clone, Default, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FilterMode {
    /// Linear filtering.
    #[default]
    Linear = 0,
    /// Nearest-neighbour (point) filtering.
    Nearest,
}

/// The wrapping (address) mode for a texture sampler.
#[repr(i32)]
#[derive(Copy, Clone, Default, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WrapMode {
    /// Clamp texture to border.
    ///
    /// WebGL has no border colour, so this samples like [`WrapMode::ClampToEdge`].
    #[default]
    ClampToBorder = 0,
    /// Clamp texture to edge.
    ClampToEdge,
    /// Repeat addressing mode.
    Repeat,
    /// Mirrored repeat addressing mode.
    MirroredRepeat,
}

impl FromStr for WrapMode {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "clamp_to_border" => WrapMode::ClampToBorder,
            "clamp_to_edge" => WrapMode::ClampToEdge,
            "repeat" => WrapMode::Repeat,
            "mirrored_repeat" => WrapMode::MirroredRepeat,
            _ => WrapMode::ClampToBorder,
        })
    }
}

impl FromStr for ImageFormat {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "UNKNOWN" => Self::Unknown,

            "R8_UNORM" => Self::R8Unorm,
            "R8_UINT" => Self::R8Uint,
            "R8_SINT" => Self::R8Sint,
            "R8G8_UNORM" => Self::R8G8Unorm,
            "R8G8_UINT" => Self::R8G8Uint,
            "R8G8_SINT" => Self::R8G8Sint,
            "R8G8B8A8_UNORM" => Self::R8G8B8A8Unorm,
            "R8G8B8A8_UINT" => Self::R8G8B8A8Uint,
            "R8G8B8A8_SINT" => Self::R8G8B8A8Sint,
            "R8G8B8A8_SRGB" => Self::R8G8B8A8Srgb,

            "A2B10G10R10_UNORM_PACK32" => Self::A2B10G10R10UnormPack32,
            "A2B10G10R10_UINT_PACK32" => Self::A2B10G10R10UintPack32,

            "R16_UINT" => Self::R16Uint,
            "R16_SINT" => Self::R16Sint,
            "R16_SFLOAT" => Self::R16Sfloat,
            "R16G16_UINT" => Self::R16G16Uint,
            "R16G16_SINT" => Self::R16G16Sint,
            "R16G16_SFLOAT" => Self::R16G16Sfloat,
            "R16G16B16A16_UINT" => Self::R16G16B16A16Uint,
            "R16G16B16A16_SINT" => Self::R16G16B16A16Sint,
            "R16G16B16A16_SFLOAT" => Self::R16G16B16A16Sfloat,

            "R32_UINT" => Self::R32Uint,
            "R32_SINT" => Self::R32Sint,
            "R32_SFLOAT" => Self::R32Sfloat,
            "R32G32_UINT" => Self::R32G32Uint,
            "R32G32_SINT" => Self::R32G32Sint,
            "R32G32_SFLOAT" => Self::R32G32Sfloat,
            "R32G32B32A32_UINT" => Self::R32G32B32A32Uint,
            "R32G32B32A32_SINT" => Self::R32G32B32A32Sint,
            "R32G32B32A32_SFLOAT" => Self::R32G32B32A32Sfloat,
            _ => Self::Unknown,
        })
    }
}

/// A size with a width and height.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Size<T> {
    /// The width.
    pub width: T,
    /// The height.
    pub height: T,
}

impl<T> Size<T> {
    /// Create a new `Size<T>` with the given width and height.
    pub fn new(width: T, height: T) -> Self {
        Size { width, height }
    }
}

impl Size<u32> {
    /// Whether either dimension is zero.
    ///
    /// Zero sized textures and framebuffers are invalid in WebGL.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// The number of mip levels a full chain for this size has.
    pub fn calculate_miplevels(self) -> u32 {
        let mut size = std::cmp::max(self.width, self.height);
        let mut levels = 0;
        while size != 0 {
            levels += 1;
            size >>= 1;
        }
        levels
    }

    /// Whether both dimensions are powers of two.
    ///
    /// WebGL1 restricts wrapping and mipmapping of textures that are not.
    pub fn is_power_of_two(&self) -> bool {
        self.width.is_power_of_two() && self.height.is_power_of_two()
    }
}

impl<T> From<Size<T>> for [f32; 4]
where
    T: Copy + AsPrimitive<f32>,
{
    /// Convert a `Size<T>` to a `vec4` uniform of `[width, height, 1/width, 1/height]`.
    fn from(value: Size<T>) -> Self {
        [
            value.width.as_(),
            value.height.as_(),
            1.0 / value.width.as_(),
            1.0 / value.height.as_(),
        ]
    }
}

#[cfg(test)]
mod test {
    use crate::{ImageFormat, Size, WrapMode};
    use std::str::FromStr;

    #[test]
    fn size_uniform_layout() {
        let size: [f32; 4] = Size::new(4u32, 2u32).into();
        assert_eq!(size, [4.0, 2.0, 0.25, 0.5]);
    }

    #[test]
    fn miplevels() {
        assert_eq!(Size::new(1u32, 1).calculate_miplevels(), 1);
        assert_eq!(Size::new(256u32, 64).calculate_miplevels(), 9);
        assert!(Size::new(256u32, 64).is_power_of_two());
        assert!(!Size::new(320u32, 240).is_power_of_two());
    }

    #[test]
    fn parses_format_and_wrap() {
        assert_eq!(
            ImageFormat::from_str("R16G16B16A16_SFLOAT"),
            Ok(ImageFormat::R16G16B16A16Sfloat)
        );
        assert!(ImageFormat::R16G16B16A16Sfloat.is_float());
        assert_eq!(WrapMode::from_str("repeat"), Ok(WrapMode::Repeat));
        assert_eq!(WrapMode::from_str("bogus"), Ok(WrapMode::ClampToBorder));
    }
}
