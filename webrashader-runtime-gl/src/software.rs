//! A [`Device`] that rasterizes on the CPU.
//!
//! Programs are not executed. The fragment stage of each program is replaced
//! by a closure registered for a marker found in the fragment source, and the
//! vertex stage always covers the whole target. This is enough to check how
//! passes are chained, which textures and uniforms they see and what they
//! render, without a WebGL context.

use crate::device::{
    Device, DeviceCapabilities, DeviceError, DrawCall, ProgramError, RenderTarget, SamplerState,
    VertexAttribute,
};
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;
use webrashader_common::{FilterMode, ImageFormat, Size, WrapMode};
use webrashader_runtime::image::Image;
use webrashader_runtime::uniforms::UniformValue;
use webrashader_transpile::{ShaderStage, WebGlVersion};

/// A fragment stage, run once per pixel.
pub type FragmentFn = Rc<dyn Fn(&FragmentContext) -> [f32; 4]>;

/// A texture of a [`SoftwareDevice`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SoftwareTexture(u32);

/// A framebuffer of a [`SoftwareDevice`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SoftwareFramebuffer(u32);

/// A program of a [`SoftwareDevice`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SoftwareProgram(u32);

/// A uniform location of a [`SoftwareDevice`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SoftwareLocation(String);

#[derive(Debug, Clone)]
struct TextureData {
    size: Size<u32>,
    format: ImageFormat,
    texels: Vec<[f32; 4]>,
}

impl TextureData {
    fn new(size: Size<u32>, format: ImageFormat) -> Self {
        TextureData {
            size,
            format,
            texels: vec![[0.0; 4]; size.width as usize * size.height as usize],
        }
    }

    fn store(&mut self, x: u32, y: u32, texel: [f32; 4]) {
        let texel = if self.format.is_float() {
            texel
        } else {
            texel.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() / 255.0)
        };
        let index = (y * self.size.width + x) as usize;
        self.texels[index] = texel;
    }

    fn fetch(&self, x: i64, y: i64, wrap: WrapMode) -> [f32; 4] {
        let wrap_axis = |v: i64, len: u32| -> Option<u32> {
            let len = len as i64;
            match wrap {
                WrapMode::ClampToEdge => Some(v.clamp(0, len - 1) as u32),
                WrapMode::ClampToBorder => (0..len).contains(&v).then_some(v as u32),
                WrapMode::Repeat => Some(v.rem_euclid(len) as u32),
                WrapMode::MirroredRepeat => {
                    let period = v.rem_euclid(2 * len);
                    let v = if period < len { period } else { 2 * len - 1 - period };
                    Some(v as u32)
                }
            }
        };
        match (wrap_axis(x, self.size.width), wrap_axis(y, self.size.height)) {
            (Some(x), Some(y)) => self.texels[(y * self.size.width + x) as usize],
            _ => [0.0; 4],
        }
    }

    fn sample(&self, uv: [f32; 2], sampler: SamplerState) -> [f32; 4] {
        if self.size.is_empty() {
            return [0.0; 4];
        }
        let x = uv[0] * self.size.width as f32 - 0.5;
        let y = uv[1] * self.size.height as f32 - 0.5;
        match sampler.filter {
            FilterMode::Nearest => self.fetch(x.round() as i64, y.round() as i64, sampler.wrap),
            FilterMode::Linear => {
                let (x0, y0) = (x.floor(), y.floor());
                let (fx, fy) = (x - x0, y - y0);
                let (x0, y0) = (x0 as i64, y0 as i64);
                let a = self.fetch(x0, y0, sampler.wrap);
                let b = self.fetch(x0 + 1, y0, sampler.wrap);
                let c = self.fetch(x0, y0 + 1, sampler.wrap);
                let d = self.fetch(x0 + 1, y0 + 1, sampler.wrap);
                std::array::from_fn(|i| {
                    let top = a[i] + (b[i] - a[i]) * fx;
                    let bottom = c[i] + (d[i] - c[i]) * fx;
                    top + (bottom - top) * fy
                })
            }
        }
    }
}

struct ProgramData {
    fragment: FragmentFn,
    sources: [String; 2],
}

struct Rejection {
    marker: String,
    stage: ShaderStage,
    log: String,
}

struct State {
    next: u32,
    textures: FxHashMap<u32, TextureData>,
    framebuffers: FxHashMap<u32, u32>,
    programs: FxHashMap<u32, ProgramData>,
    shaders: Vec<(String, FragmentFn)>,
    rejections: Vec<Rejection>,
    canvas: TextureData,
    draws: usize,
}

impl State {
    fn id(&mut self) -> u32 {
        self.next += 1;
        self.next
    }

    fn target(&mut self, target: RenderTarget<'_, SoftwareFramebuffer>, size: Size<u32>) -> Option<&mut TextureData> {
        match target {
            RenderTarget::Framebuffer(framebuffer) => {
                let texture = *self.framebuffers.get(&framebuffer.0)?;
                self.textures.get_mut(&texture)
            }
            RenderTarget::Canvas => {
                if self.canvas.size != size {
                    self.canvas = TextureData::new(size, ImageFormat::R8G8B8A8Unorm);
                }
                Some(&mut self.canvas)
            }
        }
    }
}

/// The inputs of a fragment stage at one pixel.
pub struct FragmentContext<'a> {
    /// The texture coordinate of the pixel, `[0, 0]` at the first texel.
    pub uv: [f32; 2],
    /// The size of the target.
    pub size: Size<u32>,
    textures: &'a [(&'a str, &'a TextureData, SamplerState)],
    uniforms: &'a [(&'a str, UniformValue)],
}

impl FragmentContext<'_> {
    /// Sample the texture bound to the sampler `name`. Unbound samplers read
    /// transparent black.
    pub fn sample(&self, name: &str, uv: [f32; 2]) -> [f32; 4] {
        self.textures
            .iter()
            .find(|(bound, _, _)| *bound == name)
            .map_or([0.0; 4], |(_, texture, sampler)| texture.sample(uv, *sampler))
    }

    /// Whether a texture is bound to the sampler `name`.
    pub fn has_texture(&self, name: &str) -> bool {
        self.textures.iter().any(|(bound, _, _)| *bound == name)
    }

    /// The value written to the uniform `name` for this draw.
    pub fn uniform(&self, name: &str) -> Option<UniformValue> {
        self.uniforms
            .iter()
            .find(|(written, _)| *written == name)
            .map(|(_, value)| *value)
    }

    /// The first component of the uniform `name`, or `0.0`.
    pub fn float(&self, name: &str) -> f32 {
        match self.uniform(name) {
            Some(UniformValue::Float(v)) => v,
            Some(UniformValue::Vec2(v)) => v[0],
            Some(UniformValue::Vec3(v)) => v[0],
            Some(UniformValue::Vec4(v)) => v[0],
            Some(UniformValue::Int(v)) => v as f32,
            Some(UniformValue::UInt(v)) => v as f32,
            Some(UniformValue::Mat4(v)) => v[0],
            None => 0.0,
        }
    }
}

/// A device rendering into memory.
///
/// Clones share their resources, so a clone kept by the host can inspect what
/// a filter chain rendered.
#[derive(Clone)]
pub struct SoftwareDevice {
    capabilities: DeviceCapabilities,
    state: Rc<RefCell<State>>,
}

impl Default for SoftwareDevice {
    fn default() -> Self {
        Self::new(DeviceCapabilities {
            version: WebGlVersion::WebGl2,
            float_render_targets: true,
            srgb_render_targets: true,
        })
    }
}

impl SoftwareDevice {
    /// Create a device with the given capabilities.
    pub fn new(capabilities: DeviceCapabilities) -> Self {
        SoftwareDevice {
            capabilities,
            state: Rc::new(RefCell::new(State {
                next: 0,
                textures: FxHashMap::default(),
                framebuffers: FxHashMap::default(),
                programs: FxHashMap::default(),
                shaders: Vec::new(),
                rejections: Vec::new(),
                canvas: TextureData::new(Size::default(), ImageFormat::R8G8B8A8Unorm),
                draws: 0,
            })),
        }
    }

    /// Run `fragment` for programs whose fragment source contains `marker`.
    ///
    /// Programs that match no marker pass `Source` through.
    pub fn register(&self, marker: &str, fragment: impl Fn(&FragmentContext) -> [f32; 4] + 'static) {
        let fragment: FragmentFn = Rc::new(fragment);
        self.state
            .borrow_mut()
            .shaders
            .push((marker.to_string(), fragment));
    }

    /// Fail to compile `stage` of programs whose source of that stage contains
    /// `marker`, with `log` as the info log.
    pub fn reject(&self, marker: &str, stage: ShaderStage, log: &str) {
        self.state.borrow_mut().rejections.push(Rejection {
            marker: marker.to_string(),
            stage,
            log: log.to_string(),
        });
    }

    /// Create a texture holding `image`.
    pub fn create_input(&mut self, image: &Image) -> Result<SoftwareTexture, DeviceError> {
        let texture = self.create_texture(image.size, ImageFormat::R8G8B8A8Unorm, 1)?;
        self.upload_texture(&texture, image);
        Ok(texture)
    }

    /// The texels of a texture as RGBA8, bottom row first.
    pub fn read_pixels(&self, texture: &SoftwareTexture) -> Option<Vec<[u8; 4]>> {
        let state = self.state.borrow();
        state.textures.get(&texture.0).map(quantize)
    }

    /// The size of the canvas and its pixels as RGBA8, bottom row first.
    pub fn canvas_pixels(&self) -> (Size<u32>, Vec<[u8; 4]>) {
        let state = self.state.borrow();
        (state.canvas.size, quantize(&state.canvas))
    }

    /// The number of textures alive.
    pub fn texture_count(&self) -> usize {
        self.state.borrow().textures.len()
    }

    /// The number of programs alive.
    pub fn program_count(&self) -> usize {
        self.state.borrow().programs.len()
    }

    /// The number of draws made, copies included.
    pub fn draw_count(&self) -> usize {
        self.state.borrow().draws
    }
}

fn quantize(texture: &TextureData) -> Vec<[u8; 4]> {
    texture
        .texels
        .iter()
        .map(|texel| texel.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8))
        .collect()
}

fn passthrough(context: &FragmentContext) -> [f32; 4] {
    context.sample("Source", context.uv)
}

fn rasterize(
    target: &mut TextureData,
    size: Size<u32>,
    textures: &[(&str, &TextureData, SamplerState)],
    uniforms: &[(&str, UniformValue)],
    fragment: &dyn Fn(&FragmentContext) -> [f32; 4],
) {
    let width = size.width.min(target.size.width);
    let height = size.height.min(target.size.height);
    for y in 0..height {
        for x in 0..width {
            let context = FragmentContext {
                uv: [
                    (x as f32 + 0.5) / size.width as f32,
                    (y as f32 + 0.5) / size.height as f32,
                ],
                size,
                textures,
                uniforms,
            };
            target.store(x, y, fragment(&context));
        }
    }
}

impl Device for SoftwareDevice {
    type Texture = SoftwareTexture;
    type Framebuffer = SoftwareFramebuffer;
    type Program = SoftwareProgram;
    type UniformLocation = SoftwareLocation;

    fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    fn create_texture(
        &mut self,
        size: Size<u32>,
        format: ImageFormat,
        _levels: u32,
    ) -> Result<SoftwareTexture, DeviceError> {
        if size.is_empty() {
            return Err(DeviceError::Allocation {
                what: "texture",
                reason: "zero sized texture".to_string(),
            });
        }
        let mut state = self.state.borrow_mut();
        let id = state.id();
        state.textures.insert(id, TextureData::new(size, format));
        Ok(SoftwareTexture(id))
    }

    fn upload_texture(&mut self, texture: &SoftwareTexture, image: &Image) {
        let mut state = self.state.borrow_mut();
        let Some(data) = state.textures.get_mut(&texture.0) else {
            return;
        };
        for (texel, pixel) in data.texels.iter_mut().zip(image.pixels()) {
            *texel = pixel.map(|c| c as f32 / 255.0);
        }
    }

    fn generate_mipmaps(&mut self, _texture: &SoftwareTexture) {}

    fn delete_texture(&mut self, texture: SoftwareTexture) {
        self.state.borrow_mut().textures.remove(&texture.0);
    }

    fn create_framebuffer(&mut self, texture: &SoftwareTexture) -> Result<SoftwareFramebuffer, DeviceError> {
        let mut state = self.state.borrow_mut();
        if !state.textures.contains_key(&texture.0) {
            return Err(DeviceError::Incomplete(0));
        }
        let id = state.id();
        state.framebuffers.insert(id, texture.0);
        Ok(SoftwareFramebuffer(id))
    }

    fn delete_framebuffer(&mut self, framebuffer: SoftwareFramebuffer) {
        self.state.borrow_mut().framebuffers.remove(&framebuffer.0);
    }

    fn clear(&mut self, framebuffer: &SoftwareFramebuffer) {
        let mut state = self.state.borrow_mut();
        if let Some(target) = state.target(RenderTarget::Framebuffer(framebuffer), Size::default()) {
            target.texels.fill([0.0; 4]);
        }
    }

    fn copy_texture(
        &mut self,
        texture: &SoftwareTexture,
        target: RenderTarget<'_, SoftwareFramebuffer>,
        size: Size<u32>,
    ) {
        let mut state = self.state.borrow_mut();
        state.draws += 1;
        let Some(source) = state.textures.get(&texture.0).cloned() else {
            return;
        };
        let Some(target) = state.target(target, size) else {
            return;
        };
        let sampler = SamplerState {
            filter: FilterMode::Nearest,
            wrap: WrapMode::ClampToEdge,
            mipmap: false,
        };
        rasterize(target, size, &[("Source", &source, sampler)], &[], &passthrough);
    }

    fn compile_program(
        &mut self,
        vertex: &str,
        fragment: &str,
        _attributes: &[VertexAttribute],
    ) -> Result<SoftwareProgram, ProgramError> {
        let mut state = self.state.borrow_mut();
        for rejection in &state.rejections {
            let source = match rejection.stage {
                ShaderStage::Vertex => vertex,
                ShaderStage::Fragment => fragment,
            };
            if source.contains(&rejection.marker) {
                return Err(ProgramError::Compile {
                    stage: rejection.stage,
                    log: rejection.log.clone(),
                });
            }
        }

        let fragment_fn = state
            .shaders
            .iter()
            .find(|(marker, _)| fragment.contains(marker.as_str()))
            .map(|(_, fragment)| Rc::clone(fragment))
            .unwrap_or_else(|| Rc::new(passthrough));

        let id = state.id();
        state.programs.insert(
            id,
            ProgramData {
                fragment: fragment_fn,
                sources: [vertex.to_string(), fragment.to_string()],
            },
        );
        Ok(SoftwareProgram(id))
    }

    fn uniform_location(&mut self, program: &SoftwareProgram, name: &str) -> Option<SoftwareLocation> {
        let state = self.state.borrow();
        let program = state.programs.get(&program.0)?;
        program
            .sources
            .iter()
            .any(|source| source.contains(name))
            .then(|| SoftwareLocation(name.to_string()))
    }

    fn delete_program(&mut self, program: SoftwareProgram) {
        self.state.borrow_mut().programs.remove(&program.0);
    }

    fn draw(&mut self, call: &DrawCall<'_, Self>) {
        let mut state = self.state.borrow_mut();
        state.draws += 1;
        let Some(fragment) = state
            .programs
            .get(&call.program.0)
            .map(|program| Rc::clone(&program.fragment))
        else {
            return;
        };

        // Inputs are copied so the target can be borrowed mutably, a pass may
        // sample the texture it renders into.
        let inputs: Vec<(&str, TextureData, SamplerState)> = call
            .textures
            .iter()
            .filter_map(|bind| {
                let data = state.textures.get(&bind.texture.0)?.clone();
                Some((bind.name, data, bind.sampler))
            })
            .collect();
        let textures: Vec<(&str, &TextureData, SamplerState)> = inputs
            .iter()
            .map(|(name, data, sampler)| (*name, data, *sampler))
            .collect();
        let uniforms: Vec<(&str, UniformValue)> = call
            .uniforms
            .iter()
            .map(|write| (write.location.0.as_str(), write.value))
            .collect();

        let Some(target) = state.target(call.target, call.size) else {
            return;
        };
        rasterize(target, call.size, &textures, &uniforms, fragment.as_ref());
    }
}
