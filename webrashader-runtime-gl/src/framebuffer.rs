use crate::device::{Device, DeviceError};
use webrashader_common::{ImageFormat, Size};

/// A texture and a framebuffer rendering into it.
///
/// The size and format are fixed once allocated. A change of either
/// releases both objects and allocates new ones.
#[derive(Debug)]
pub struct OwnedFramebuffer<D: Device> {
    image: Option<(D::Texture, D::Framebuffer)>,
    /// The size of the texture.
    pub size: Size<u32>,
    /// The format of the texture.
    pub format: ImageFormat,
    /// The number of mip levels of the texture.
    pub levels: u32,
}

impl<D: Device> Default for OwnedFramebuffer<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Device> OwnedFramebuffer<D> {
    /// Create a framebuffer with nothing allocated.
    pub fn new() -> Self {
        OwnedFramebuffer {
            image: None,
            size: Size::default(),
            format: ImageFormat::Unknown,
            levels: 0,
        }
    }

    /// Whether a texture is allocated.
    pub fn is_allocated(&self) -> bool {
        self.image.is_some()
    }

    /// The texture rendered into.
    pub fn texture(&self) -> Option<&D::Texture> {
        self.image.as_ref().map(|(texture, _)| texture)
    }

    /// The framebuffer handle.
    pub fn handle(&self) -> Option<&D::Framebuffer> {
        self.image.as_ref().map(|(_, framebuffer)| framebuffer)
    }

    /// Make sure the framebuffer has the given size and format, reallocating
    /// it if it does not. Returns whether it was reallocated.
    ///
    /// A new texture is cleared before it is first sampled.
    pub fn ensure(
        &mut self,
        device: &mut D,
        size: Size<u32>,
        format: ImageFormat,
        mipmap: bool,
    ) -> Result<bool, DeviceError> {
        let levels = if mipmap { size.calculate_miplevels() } else { 1 };
        if self.is_allocated() && self.size == size && self.format == format && self.levels == levels {
            return Ok(false);
        }
        self.init(device, size, format, levels)?;
        Ok(true)
    }

    fn init(
        &mut self,
        device: &mut D,
        size: Size<u32>,
        format: ImageFormat,
        levels: u32,
    ) -> Result<(), DeviceError> {
        self.delete(device);

        let size = Size::new(size.width.max(1), size.height.max(1));
        let texture = device.create_texture(size, format, levels.max(1))?;
        let framebuffer = match device.create_framebuffer(&texture) {
            Ok(framebuffer) => framebuffer,
            Err(err) => {
                device.delete_texture(texture);
                return Err(err);
            }
        };
        device.clear(&framebuffer);

        tracing::debug!(
            width = size.width,
            height = size.height,
            format = ?format,
            levels,
            "allocated render target"
        );
        self.image = Some((texture, framebuffer));
        self.size = size;
        self.format = format;
        self.levels = levels.max(1);
        Ok(())
    }

    /// Clear the texture to transparent black.
    pub fn clear(&self, device: &mut D) {
        if let Some(framebuffer) = self.handle() {
            device.clear(framebuffer);
        }
    }

    /// Release the texture and framebuffer.
    pub fn delete(&mut self, device: &mut D) {
        if let Some((texture, framebuffer)) = self.image.take() {
            device.delete_framebuffer(framebuffer);
            device.delete_texture(texture);
        }
        self.levels = 0;
    }
}
