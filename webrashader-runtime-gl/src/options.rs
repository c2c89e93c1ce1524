//! Options for the WebGL filter chain.

use webrashader_transpile::WebGlVersion;

/// Options for each frame.
#[derive(Debug, Clone)]
pub struct FrameOptions {
    /// Whether or not to clear the history buffers.
    pub clear_history: bool,
    /// The direction of rendering.
    /// -1 indicates that the frames are played in reverse order.
    pub frame_direction: i32,
    /// The model view projection of the quad. Defaults to a projection of
    /// `[0, 1]` onto the whole target.
    pub mvp: Option<[f32; 16]>,
}

impl Default for FrameOptions {
    fn default() -> Self {
        Self {
            clear_history: false,
            frame_direction: 1,
            mvp: None,
        }
    }
}

/// Options for filter chain creation.
#[derive(Debug, Clone)]
pub struct FilterChainOptions {
    /// The profile to transpile for. Defaults to the profile of the device.
    pub target: Option<WebGlVersion>,
    /// Whether or not to explicitly disable mipmap generation regardless of
    /// shader preset settings.
    pub force_no_mipmaps: bool,
    /// Render float framebuffers as RGBA8 even when the device can render
    /// to half float textures.
    pub disable_float_framebuffers: bool,
    /// The most history frames kept, regardless of what the passes sample.
    pub max_history: usize,
}

impl Default for FilterChainOptions {
    fn default() -> Self {
        Self {
            target: None,
            force_no_mipmaps: false,
            disable_float_framebuffers: false,
            max_history: 16,
        }
    }
}
