//! The operations the filter chain needs from a graphics context.

use std::fmt::Debug;
use thiserror::Error;
use webrashader_common::{FilterMode, ImageFormat, Size, WrapMode};
use webrashader_runtime::image::Image;
use webrashader_runtime::uniforms::UniformValue;
use webrashader_transpile::{ShaderStage, WebGlVersion};

/// Error type for device operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    /// A texture, framebuffer or buffer could not be created.
    #[error("failed to allocate {what}: {reason}")]
    Allocation {
        /// The kind of resource.
        what: &'static str,
        /// The reason given by the context.
        reason: String,
    },
    /// A framebuffer is not complete.
    #[error("framebuffer is incomplete ({0:#x})")]
    Incomplete(u32),
}

/// Error type for compiling and linking a program.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProgramError {
    /// A stage failed to compile.
    #[error("{stage} shader failed to compile: {log}")]
    Compile {
        /// The failing stage.
        stage: ShaderStage,
        /// The info log of the driver.
        log: String,
    },
    /// The stages compiled but failed to link.
    #[error("program failed to link: {log}")]
    Link {
        /// The info log of the driver.
        log: String,
    },
    /// The context could not create a shader or program object.
    #[error("failed to create program: {0}")]
    Create(String),
}

/// What a device can render.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DeviceCapabilities {
    /// The shading language profile of the context.
    pub version: WebGlVersion,
    /// Whether half float textures can be rendered to.
    pub float_render_targets: bool,
    /// Whether sRGB textures can be rendered to.
    pub srgb_render_targets: bool,
}

/// The data a vertex attribute is fed with.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum VertexInput {
    /// The corner of the quad, `[0, 1]` on both axes.
    Position,
    /// The texture coordinate of the corner.
    TexCoord,
}

impl VertexInput {
    /// The input an attribute of the given name is fed with.
    ///
    /// Slang shaders name them `Position` and `TexCoord`, legacy shaders use
    /// `VertexCoord` and `TexCoord`. Other attributes keep their default value.
    pub fn for_attribute(name: &str) -> Option<VertexInput> {
        match name {
            "Position" | "VertexCoord" | "POSITION" => Some(VertexInput::Position),
            "TexCoord" | "TEXCOORD" | "TexCoord0" => Some(VertexInput::TexCoord),
            _ => None,
        }
    }
}

/// A vertex attribute of a program.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexAttribute<'a> {
    /// The attribute name.
    pub name: &'a str,
    /// The location to bind before linking.
    pub location: u32,
    /// The data the attribute is fed with.
    pub input: Option<VertexInput>,
}

/// How a texture is sampled.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SamplerState {
    /// Magnification and minification filter.
    pub filter: FilterMode,
    /// Wrapping on both axes.
    pub wrap: WrapMode,
    /// Whether the texture has mipmaps to sample.
    pub mipmap: bool,
}

/// Where a draw renders to.
#[derive(Debug)]
pub enum RenderTarget<'a, F> {
    /// An owned framebuffer.
    Framebuffer(&'a F),
    /// The default framebuffer of the context.
    Canvas,
}

impl<F> Clone for RenderTarget<'_, F> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<F> Copy for RenderTarget<'_, F> {}

/// A texture bound to a texture unit for a draw.
#[derive(Debug)]
pub struct TextureBind<'a, T, L> {
    /// The texture unit.
    pub unit: u32,
    /// The sampler uniform the unit is read through.
    pub name: &'a str,
    /// The location of the sampler uniform, set to `unit`.
    pub location: Option<&'a L>,
    /// The texture.
    pub texture: &'a T,
    /// How the texture is sampled.
    pub sampler: SamplerState,
}

/// A uniform written for a draw.
#[derive(Debug)]
pub struct UniformWrite<'a, L> {
    /// The uniform name.
    pub name: &'a str,
    /// The location of the uniform.
    pub location: &'a L,
    /// The value to write.
    pub value: UniformValue,
}

/// A full screen quad draw.
#[derive(Debug)]
pub struct DrawCall<'a, D: Device + ?Sized> {
    /// The program to draw with.
    pub program: &'a D::Program,
    /// The target to draw into.
    pub target: RenderTarget<'a, D::Framebuffer>,
    /// The size of the area drawn, starting at the origin.
    pub size: Size<u32>,
    /// The textures to bind.
    pub textures: &'a [TextureBind<'a, D::Texture, D::UniformLocation>],
    /// The uniforms to write.
    pub uniforms: &'a [UniformWrite<'a, D::UniformLocation>],
}

/// A graphics context the filter chain renders with.
///
/// Resources are released explicitly, the chain owns every resource it
/// creates and deletes them when they are reallocated or the chain is dropped.
pub trait Device {
    /// A texture handle.
    type Texture: Clone + Debug;
    /// A framebuffer handle.
    type Framebuffer: Debug;
    /// A linked program.
    type Program: Debug;
    /// The location of a uniform in a program.
    type UniformLocation: Debug;

    /// What the device can render.
    fn capabilities(&self) -> DeviceCapabilities;

    /// Allocate an uninitialized texture.
    fn create_texture(
        &mut self,
        size: Size<u32>,
        format: ImageFormat,
        levels: u32,
    ) -> Result<Self::Texture, DeviceError>;

    /// Upload RGBA8 texels to the first level of a texture.
    fn upload_texture(&mut self, texture: &Self::Texture, image: &Image);

    /// Regenerate the mipmaps of a texture from its first level.
    fn generate_mipmaps(&mut self, texture: &Self::Texture);

    /// Release a texture.
    fn delete_texture(&mut self, texture: Self::Texture);

    /// Create a framebuffer rendering into `texture`, failing if it is not
    /// complete.
    fn create_framebuffer(&mut self, texture: &Self::Texture) -> Result<Self::Framebuffer, DeviceError>;

    /// Release a framebuffer.
    fn delete_framebuffer(&mut self, framebuffer: Self::Framebuffer);

    /// Clear a framebuffer to transparent black.
    fn clear(&mut self, framebuffer: &Self::Framebuffer);

    /// Copy `texture` into `target`, scaling it to `size`.
    fn copy_texture(
        &mut self,
        texture: &Self::Texture,
        target: RenderTarget<'_, Self::Framebuffer>,
        size: Size<u32>,
    );

    /// Compile and link a program.
    fn compile_program(
        &mut self,
        vertex: &str,
        fragment: &str,
        attributes: &[VertexAttribute],
    ) -> Result<Self::Program, ProgramError>;

    /// The location of the uniform `name`, or `None` if the linker removed it.
    fn uniform_location(&mut self, program: &Self::Program, name: &str) -> Option<Self::UniformLocation>;

    /// Release a program.
    fn delete_program(&mut self, program: Self::Program);

    /// Draw a full screen quad.
    fn draw(&mut self, call: &DrawCall<'_, Self>);
}
