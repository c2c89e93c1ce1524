pub use image::ImageError;
use rayon::prelude::*;
use thiserror::Error;
use webrashader_common::resolve::Resolver;
use webrashader_common::Size;
use webrashader_presets::TextureConfig;

/// A decoded RGBA8 image.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    /// Tightly packed RGBA8 texels, row by row.
    pub bytes: Vec<u8>,
    /// The size of the image.
    pub size: Size<u32>,
}

/// The direction of UV coordinates to load the image for.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UVDirection {
    /// Origin is at the top left, rows are stored as written.
    TopLeft,
    /// Origin is at the bottom left (OpenGL), rows are stored bottom up.
    BottomLeft,
}

/// Error type for loading lookup textures.
#[derive(Error, Debug)]
pub enum LutError {
    /// The resolver had no file at the texture path.
    #[error("lookup texture `{name}` was not found at {path}")]
    NotFound {
        /// The name of the texture in the preset.
        name: String,
        /// The path that was requested.
        path: String,
    },
    /// The file could not be decoded.
    #[error("lookup texture `{name}` at {path} could not be decoded")]
    Decode {
        /// The name of the texture in the preset.
        name: String,
        /// The path of the file.
        path: String,
        /// The decoder error.
        #[source]
        source: ImageError,
    },
}

impl Image {
    /// Decode an encoded image (PNG, JPEG, TGA or BMP) as RGBA8.
    pub fn decode(bytes: &[u8], direction: UVDirection) -> Result<Self, ImageError> {
        let mut image = image::load_from_memory(bytes)?;
        if direction == UVDirection::BottomLeft {
            image = image.flipv();
        }

        let image = image.to_rgba8();
        let size = Size::new(image.width(), image.height());
        Ok(Image {
            bytes: image.into_raw(),
            size,
        })
    }

    /// The texels of the image.
    pub fn pixels(&self) -> &[[u8; 4]] {
        bytemuck::cast_slice(&self.bytes)
    }

    /// The texel at `x`, `y` counted from the first stored row.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.size.width || y >= self.size.height {
            return None;
        }
        self.pixels()
            .get((y * self.size.width + x) as usize)
            .copied()
    }
}

/// Read and decode the lookup textures of a preset.
///
/// Files are read through `resolver` in order, then decoded in parallel.
pub fn load_luts(
    textures: &[TextureConfig],
    resolver: &mut impl Resolver,
    direction: UVDirection,
) -> Result<Vec<Image>, LutError> {
    let files = textures
        .iter()
        .map(|texture| {
            resolver
                .read_bytes(&texture.path)
                .ok_or_else(|| LutError::NotFound {
                    name: texture.name.clone(),
                    path: texture.path.clone(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let images = textures
        .par_iter()
        .zip(files.par_iter())
        .map(|(texture, bytes)| {
            Image::decode(bytes, direction).map_err(|source| LutError::Decode {
                name: texture.name.clone(),
                path: texture.path.clone(),
                source,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    for (texture, image) in textures.iter().zip(&images) {
        tracing::debug!(
            name = %texture.name,
            width = image.size.width,
            height = image.size.height,
            "decoded lookup texture"
        );
    }
    Ok(images)
}

#[cfg(test)]
mod test {
    use super::*;
    use image::{ImageFormat, RgbaImage};
    use std::io::Cursor;
    use webrashader_common::resolve::MemoryResolver;
    use webrashader_common::{FilterMode, WrapMode};

    fn png() -> Vec<u8> {
        let mut image = RgbaImage::new(2, 2);
        image.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
        image.put_pixel(1, 1, image::Rgba([0, 0, 255, 128]));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn lut(name: &str, path: &str) -> TextureConfig {
        TextureConfig {
            name: name.to_string(),
            path: path.to_string(),
            wrap_mode: WrapMode::ClampToEdge,
            filter_mode: FilterMode::Nearest,
            mipmap: false,
        }
    }

    #[test]
    fn decodes_in_either_direction() {
        let image = Image::decode(&png(), UVDirection::TopLeft).unwrap();
        assert_eq!(image.size, Size::new(2, 2));
        assert_eq!(image.pixel(0, 0), Some([255, 0, 0, 255]));
        assert_eq!(image.pixel(1, 1), Some([0, 0, 255, 128]));
        assert_eq!(image.pixel(2, 0), None);

        let flipped = Image::decode(&png(), UVDirection::BottomLeft).unwrap();
        assert_eq!(flipped.pixel(0, 1), Some([255, 0, 0, 255]));
        assert_eq!(flipped.pixel(1, 0), Some([0, 0, 255, 128]));
    }

    #[test]
    fn loads_luts_through_the_resolver() {
        let mut resolver = MemoryResolver::new()
            .with("luts/a.png", png())
            .with("luts/broken.png", b"not an image".to_vec());

        let images = load_luts(&[lut("A", "luts/a.png")], &mut resolver, UVDirection::TopLeft).unwrap();
        assert_eq!(images.len(), 1);

        let err = load_luts(&[lut("B", "luts/b.png")], &mut resolver, UVDirection::TopLeft)
            .unwrap_err();
        assert!(matches!(err, LutError::NotFound { name, .. } if name == "B"));

        let err = load_luts(&[lut("C", "luts/broken.png")], &mut resolver, UVDirection::TopLeft)
            .unwrap_err();
        assert!(matches!(err, LutError::Decode { name, .. } if name == "C"));
    }
}
