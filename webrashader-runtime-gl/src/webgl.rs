//! A [`Device`] backed by a [`glow`] context.

use crate::device::{
    Device, DeviceCapabilities, DeviceError, DrawCall, ProgramError, RenderTarget, SamplerState,
    VertexAttribute, VertexInput,
};
use glow::HasContext;
use std::sync::Arc;
use webrashader_common::{FilterMode, ImageFormat, Size, WrapMode};
use webrashader_runtime::image::Image;
use webrashader_runtime::uniforms::UniformValue;
use webrashader_transpile::{ShaderStage, WebGlVersion};

/// `HALF_FLOAT_OES` of `OES_texture_half_float`, which differs from the WebGL2 enum.
const HALF_FLOAT_OES: u32 = 0x8D61;

#[rustfmt::skip]
static QUAD_VBO_DATA: &[f32; 16] = &[
    0.0f32, 0.0f32, 0.0f32, 0.0f32,
    1.0f32, 0.0f32, 1.0f32, 0.0f32,
    0.0f32, 1.0f32, 0.0f32, 1.0f32,
    1.0f32, 1.0f32, 1.0f32, 1.0f32,
];

const COPY_VERTEX: &str = r#"#version 100
attribute vec2 Position;
attribute vec2 TexCoord;
varying vec2 vTexCoord;
void main() {
    vTexCoord = TexCoord;
    gl_Position = vec4(Position * 2.0 - 1.0, 0.0, 1.0);
}
"#;

const COPY_FRAGMENT: &str = r#"#version 100
precision mediump float;
uniform sampler2D Source;
varying vec2 vTexCoord;
void main() {
    gl_FragColor = texture2D(Source, vTexCoord);
}
"#;

const COPY_ATTRIBUTES: &[VertexAttribute<'static>] = &[
    VertexAttribute {
        name: "Position",
        location: 0,
        input: Some(VertexInput::Position),
    },
    VertexAttribute {
        name: "TexCoord",
        location: 1,
        input: Some(VertexInput::TexCoord),
    },
];

/// A linked program and the inputs of its vertex attributes.
#[derive(Debug)]
pub struct GlowProgram {
    program: glow::Program,
    attributes: Vec<(u32, VertexInput)>,
}

/// A texture created by a [`GlowDevice`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GlowTexture {
    /// The texture object.
    pub handle: glow::Texture,
    /// The size of the first level.
    pub size: Size<u32>,
    /// The storage format.
    pub format: ImageFormat,
    /// The number of levels.
    pub levels: u32,
}

/// Objects owned by a device, released when its last clone is dropped.
struct Shared {
    context: Arc<glow::Context>,
    quad: glow::Buffer,
    vao: Option<glow::VertexArray>,
    copy: GlowProgram,
    copy_source: Option<glow::UniformLocation>,
}

/// A WebGL context.
///
/// Clones render with the same context.
#[derive(Clone)]
pub struct GlowDevice {
    capabilities: DeviceCapabilities,
    shared: Arc<Shared>,
}

impl GlowDevice {
    /// Create a device rendering with `context`.
    ///
    /// # Safety
    /// The context must be current for as long as the device lives, and the
    /// shading language of `version` must be accepted by it.
    pub unsafe fn new(context: Arc<glow::Context>, version: WebGlVersion) -> Result<Self, DeviceError> {
        let extensions = context.supported_extensions();
        let has = |name: &str| {
            extensions.contains(name) || extensions.contains(&format!("GL_{name}"))
        };
        let capabilities = DeviceCapabilities {
            version,
            float_render_targets: match version {
                WebGlVersion::WebGl2 => has("EXT_color_buffer_float"),
                WebGlVersion::WebGl1 => {
                    has("OES_texture_half_float") && has("EXT_color_buffer_half_float")
                }
            },
            srgb_render_targets: version == WebGlVersion::WebGl2,
        };

        let quad = context.create_buffer().map_err(|reason| DeviceError::Allocation {
            what: "vertex buffer",
            reason,
        })?;
        context.bind_buffer(glow::ARRAY_BUFFER, Some(quad));
        context.buffer_data_u8_slice(
            glow::ARRAY_BUFFER,
            bytemuck::cast_slice::<f32, u8>(QUAD_VBO_DATA),
            glow::STATIC_DRAW,
        );
        context.bind_buffer(glow::ARRAY_BUFFER, None);

        let vao = match version {
            WebGlVersion::WebGl2 => Some(context.create_vertex_array().map_err(|reason| {
                DeviceError::Allocation {
                    what: "vertex array",
                    reason,
                }
            })?),
            WebGlVersion::WebGl1 => None,
        };

        let copy = link(&context, COPY_VERTEX, COPY_FRAGMENT, COPY_ATTRIBUTES).map_err(|err| {
            DeviceError::Allocation {
                what: "copy program",
                reason: err.to_string(),
            }
        })?;
        let copy_source = context.get_uniform_location(copy.program, "Source");

        tracing::debug!(
            version = %version,
            float = capabilities.float_render_targets,
            srgb = capabilities.srgb_render_targets,
            "created glow device"
        );

        Ok(GlowDevice {
            capabilities,
            shared: Arc::new(Shared {
                context,
                quad,
                vao,
                copy,
                copy_source,
            }),
        })
    }

    /// The context the device renders with.
    pub fn context(&self) -> &Arc<glow::Context> {
        &self.shared.context
    }

    /// Read back the RGBA8 pixels of the canvas, bottom row first.
    pub fn read_canvas(&self, size: Size<u32>) -> Vec<u8> {
        let mut pixels = vec![0u8; size.width as usize * size.height as usize * 4];
        unsafe {
            self.shared.context.bind_framebuffer(glow::FRAMEBUFFER, None);
            self.shared.context.read_pixels(
                0,
                0,
                size.width as i32,
                size.height as i32,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelPackData::Slice(Some(&mut pixels)),
            );
        }
        pixels
    }

    fn bind_target(&self, target: RenderTarget<'_, glow::Framebuffer>, size: Size<u32>) {
        let framebuffer = match target {
            RenderTarget::Framebuffer(framebuffer) => Some(*framebuffer),
            RenderTarget::Canvas => None,
        };
        unsafe {
            self.shared.context.bind_framebuffer(glow::FRAMEBUFFER, framebuffer);
            self.shared.context
                .viewport(0, 0, size.width as i32, size.height as i32);
        }
    }

    fn bind_texture(&self, unit: u32, texture: &GlowTexture, sampler: SamplerState) {
        let gl = &self.shared.context;
        // WebGL1 can neither mipmap nor repeat textures that are not a power of two.
        let restricted =
            self.capabilities.version == WebGlVersion::WebGl1 && !texture.size.is_power_of_two();
        let wrap = if restricted {
            WrapMode::ClampToEdge
        } else {
            sampler.wrap
        };
        let min = if sampler.mipmap && texture.levels > 1 && !restricted {
            sampler.filter.gl_mip(sampler.filter) as i32
        } else {
            i32::from(sampler.filter)
        };

        unsafe {
            gl.active_texture(glow::TEXTURE0 + unit);
            gl.bind_texture(glow::TEXTURE_2D, Some(texture.handle));
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, min);
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MAG_FILTER,
                i32::from(sampler.filter),
            );
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, i32::from(wrap));
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, i32::from(wrap));
        }
    }

    fn draw_quad(&self, program: &GlowProgram) {
        let gl = &self.shared.context;
        let stride = (4 * std::mem::size_of::<f32>()) as i32;
        unsafe {
            if self.shared.vao.is_some() {
                gl.bind_vertex_array(self.shared.vao);
            }
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(self.shared.quad));
            for &(location, input) in &program.attributes {
                let offset = match input {
                    VertexInput::Position => 0,
                    VertexInput::TexCoord => 2 * std::mem::size_of::<f32>() as i32,
                };
                gl.enable_vertex_attrib_array(location);
                gl.vertex_attrib_pointer_f32(location, 2, glow::FLOAT, false, stride, offset);
            }

            gl.draw_arrays(glow::TRIANGLE_STRIP, 0, 4);

            for &(location, _) in &program.attributes {
                gl.disable_vertex_attrib_array(location);
            }
            gl.bind_buffer(glow::ARRAY_BUFFER, None);
            if self.shared.vao.is_some() {
                gl.bind_vertex_array(None);
            }
        }
    }

    fn write_uniform(&self, location: &glow::UniformLocation, value: UniformValue) {
        let gl = &self.shared.context;
        let location = Some(location);
        unsafe {
            match value {
                UniformValue::Float(v) => gl.uniform_1_f32(location, v),
                UniformValue::Vec2([x, y]) => gl.uniform_2_f32(location, x, y),
                UniformValue::Vec3([x, y, z]) => gl.uniform_3_f32(location, x, y, z),
                UniformValue::Vec4([x, y, z, w]) => gl.uniform_4_f32(location, x, y, z, w),
                UniformValue::Int(v) => gl.uniform_1_i32(location, v),
                UniformValue::UInt(v) => match self.capabilities.version {
                    WebGlVersion::WebGl2 => gl.uniform_1_u32(location, v),
                    WebGlVersion::WebGl1 => gl.uniform_1_i32(location, v as i32),
                },
                UniformValue::Mat4(m) => gl.uniform_matrix_4_f32_slice(location, false, &m),
            }
        }
    }
}

/// Compile and link a program, binding attribute locations before linking.
unsafe fn link(
    gl: &glow::Context,
    vertex: &str,
    fragment: &str,
    attributes: &[VertexAttribute],
) -> Result<GlowProgram, ProgramError> {
    let compile = |stage: ShaderStage, source: &str| {
        let kind = match stage {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        };
        let shader = gl.create_shader(kind).map_err(ProgramError::Create)?;
        gl.shader_source(shader, source);
        gl.compile_shader(shader);
        if !gl.get_shader_compile_status(shader) {
            let log = gl.get_shader_info_log(shader);
            gl.delete_shader(shader);
            return Err(ProgramError::Compile { stage, log });
        }
        Ok(shader)
    };

    let vs = compile(ShaderStage::Vertex, vertex)?;
    let fs = match compile(ShaderStage::Fragment, fragment) {
        Ok(fs) => fs,
        Err(err) => {
            gl.delete_shader(vs);
            return Err(err);
        }
    };

    let program = match gl.create_program() {
        Ok(program) => program,
        Err(reason) => {
            gl.delete_shader(vs);
            gl.delete_shader(fs);
            return Err(ProgramError::Create(reason));
        }
    };
    gl.attach_shader(program, vs);
    gl.attach_shader(program, fs);
    for attribute in attributes {
        gl.bind_attrib_location(program, attribute.location, attribute.name);
    }
    gl.link_program(program);

    let linked = gl.get_program_link_status(program);
    let log = gl.get_program_info_log(program);
    gl.detach_shader(program, vs);
    gl.detach_shader(program, fs);
    gl.delete_shader(vs);
    gl.delete_shader(fs);

    if !linked {
        gl.delete_program(program);
        return Err(ProgramError::Link { log });
    }

    Ok(GlowProgram {
        program,
        attributes: attributes
            .iter()
            .filter_map(|attribute| Some((attribute.location, attribute.input?)))
            .collect(),
    })
}

impl Device for GlowDevice {
    type Texture = GlowTexture;
    type Framebuffer = glow::Framebuffer;
    type Program = GlowProgram;
    type UniformLocation = glow::UniformLocation;

    fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    fn create_texture(
        &mut self,
        size: Size<u32>,
        format: ImageFormat,
        levels: u32,
    ) -> Result<GlowTexture, DeviceError> {
        let gl = &self.shared.context;
        let version = self.capabilities.version;
        let levels = if version == WebGlVersion::WebGl1 && !size.is_power_of_two() {
            1
        } else {
            levels.max(1)
        };

        unsafe {
            let handle = gl.create_texture().map_err(|reason| DeviceError::Allocation {
                what: "texture",
                reason,
            })?;
            gl.bind_texture(glow::TEXTURE_2D, Some(handle));
            match version {
                WebGlVersion::WebGl2 => gl.tex_storage_2d(
                    glow::TEXTURE_2D,
                    levels as i32,
                    format.webgl2_internal_format(),
                    size.width as i32,
                    size.height as i32,
                ),
                WebGlVersion::WebGl1 => {
                    let ty = if format.is_float() && self.capabilities.float_render_targets {
                        HALF_FLOAT_OES
                    } else {
                        glow::UNSIGNED_BYTE
                    };
                    gl.tex_image_2d(
                        glow::TEXTURE_2D,
                        0,
                        glow::RGBA as i32,
                        size.width as i32,
                        size.height as i32,
                        0,
                        glow::RGBA,
                        ty,
                        glow::PixelUnpackData::Slice(None),
                    );
                }
            }
            if version == WebGlVersion::WebGl2 {
                gl.tex_parameter_i32(
                    glow::TEXTURE_2D,
                    glow::TEXTURE_MAX_LEVEL,
                    levels as i32 - 1,
                );
            }
            gl.bind_texture(glow::TEXTURE_2D, None);

            Ok(GlowTexture {
                handle,
                size,
                format,
                levels,
            })
        }
    }

    fn upload_texture(&mut self, texture: &GlowTexture, image: &Image) {
        let gl = &self.shared.context;
        unsafe {
            gl.bind_texture(glow::TEXTURE_2D, Some(texture.handle));
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 4);
            gl.tex_sub_image_2d(
                glow::TEXTURE_2D,
                0,
                0,
                0,
                image.size.width as i32,
                image.size.height as i32,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelUnpackData::Slice(Some(&image.bytes)),
            );
            gl.bind_texture(glow::TEXTURE_2D, None);
        }
    }

    fn generate_mipmaps(&mut self, texture: &GlowTexture) {
        if texture.levels <= 1 {
            return;
        }
        let gl = &self.shared.context;
        unsafe {
            gl.bind_texture(glow::TEXTURE_2D, Some(texture.handle));
            gl.generate_mipmap(glow::TEXTURE_2D);
            gl.bind_texture(glow::TEXTURE_2D, None);
        }
    }

    fn delete_texture(&mut self, texture: GlowTexture) {
        unsafe { self.shared.context.delete_texture(texture.handle) }
    }

    fn create_framebuffer(&mut self, texture: &GlowTexture) -> Result<glow::Framebuffer, DeviceError> {
        let gl = &self.shared.context;
        unsafe {
            let framebuffer = gl
                .create_framebuffer()
                .map_err(|reason| DeviceError::Allocation {
                    what: "framebuffer",
                    reason,
                })?;
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer));
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                Some(texture.handle),
                0,
            );
            let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            if status != glow::FRAMEBUFFER_COMPLETE {
                gl.delete_framebuffer(framebuffer);
                return Err(DeviceError::Incomplete(status));
            }
            Ok(framebuffer)
        }
    }

    fn delete_framebuffer(&mut self, framebuffer: glow::Framebuffer) {
        unsafe { self.shared.context.delete_framebuffer(framebuffer) }
    }

    fn clear(&mut self, framebuffer: &glow::Framebuffer) {
        let gl = &self.shared.context;
        unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(*framebuffer));
            gl.clear_color(0.0, 0.0, 0.0, 0.0);
            gl.clear(glow::COLOR_BUFFER_BIT);
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
        }
    }

    fn copy_texture(
        &mut self,
        texture: &GlowTexture,
        target: RenderTarget<'_, glow::Framebuffer>,
        size: Size<u32>,
    ) {
        self.bind_target(target, size);
        self.bind_texture(
            0,
            texture,
            SamplerState {
                filter: FilterMode::Linear,
                wrap: WrapMode::ClampToEdge,
                mipmap: false,
            },
        );
        unsafe {
            self.shared.context.use_program(Some(self.shared.copy.program));
            self.shared.context.uniform_1_i32(self.shared.copy_source.as_ref(), 0);
        }
        self.draw_quad(&self.shared.copy);
        unsafe {
            self.shared.context.use_program(None);
            self.shared.context.bind_texture(glow::TEXTURE_2D, None);
            self.shared.context.bind_framebuffer(glow::FRAMEBUFFER, None);
        }
    }

    fn compile_program(
        &mut self,
        vertex: &str,
        fragment: &str,
        attributes: &[VertexAttribute],
    ) -> Result<GlowProgram, ProgramError> {
        unsafe { link(&self.shared.context, vertex, fragment, attributes) }
    }

    fn uniform_location(&mut self, program: &GlowProgram, name: &str) -> Option<glow::UniformLocation> {
        unsafe { self.shared.context.get_uniform_location(program.program, name) }
    }

    fn delete_program(&mut self, program: GlowProgram) {
        unsafe { self.shared.context.delete_program(program.program) }
    }

    fn draw(&mut self, call: &DrawCall<'_, Self>) {
        self.bind_target(call.target, call.size);
        unsafe {
            self.shared.context.use_program(Some(call.program.program));
            self.shared.context.disable(glow::BLEND);
        }

        for bind in call.textures {
            self.bind_texture(bind.unit, bind.texture, bind.sampler);
            if let Some(location) = bind.location {
                unsafe { self.shared.context.uniform_1_i32(Some(location), bind.unit as i32) }
            }
        }
        for write in call.uniforms {
            self.write_uniform(write.location, write.value);
        }

        self.draw_quad(call.program);

        unsafe {
            for bind in call.textures {
                self.shared.context.active_texture(glow::TEXTURE0 + bind.unit);
                self.shared.context.bind_texture(glow::TEXTURE_2D, None);
            }
            self.shared.context.active_texture(glow::TEXTURE0);
            self.shared.context.use_program(None);
            self.shared.context.bind_framebuffer(glow::FRAMEBUFFER, None);
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        unsafe {
            self.context.delete_program(self.copy.program);
            self.context.delete_buffer(self.quad);
            if let Some(vao) = self.vao {
                self.context.delete_vertex_array(vao);
            }
        }
    }
}

#[cfg(all(feature = "web", target_arch = "wasm32"))]
mod web {
    use super::GlowDevice;
    use crate::device::DeviceError;
    use std::sync::Arc;
    use wasm_bindgen::JsCast;
    use webrashader_transpile::WebGlVersion;

    impl GlowDevice {
        /// Create a device rendering to a WebGL2 context.
        pub fn from_webgl2(context: web_sys::WebGl2RenderingContext) -> Result<Self, DeviceError> {
            let context = glow::Context::from_webgl2_context(context);
            // SAFETY: a WebGL context is always current on its own thread.
            unsafe { Self::new(Arc::new(context), WebGlVersion::WebGl2) }
        }

        /// Create a device rendering to a WebGL1 context.
        pub fn from_webgl1(context: web_sys::WebGlRenderingContext) -> Result<Self, DeviceError> {
            let context = glow::Context::from_webgl1_context(context);
            // SAFETY: a WebGL context is always current on its own thread.
            unsafe { Self::new(Arc::new(context), WebGlVersion::WebGl1) }
        }

        /// Create a device rendering to `canvas`, preferring WebGL2.
        pub fn from_canvas(canvas: &web_sys::HtmlCanvasElement) -> Result<Self, DeviceError> {
            if let Ok(Some(context)) = canvas.get_context("webgl2") {
                if let Ok(context) = context.dyn_into::<web_sys::WebGl2RenderingContext>() {
                    return Self::from_webgl2(context);
                }
            }

            tracing::debug!("WebGL2 is unavailable, falling back to WebGL1");
            match canvas.get_context("webgl") {
                Ok(Some(context)) => match context.dyn_into::<web_sys::WebGlRenderingContext>() {
                    Ok(context) => Self::from_webgl1(context),
                    Err(_) => Err(DeviceError::Allocation {
                        what: "context",
                        reason: "the canvas returned an unexpected context".to_string(),
                    }),
                },
                _ => Err(DeviceError::Allocation {
                    what: "context",
                    reason: "the canvas has no WebGL context".to_string(),
                }),
            }
        }
    }
}
