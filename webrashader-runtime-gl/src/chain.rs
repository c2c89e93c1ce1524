use crate::device::{Device, DrawCall, RenderTarget, SamplerState, TextureBind, UniformWrite};
use crate::diagnostics::{DiagnosticQueue, FrameDiagnostic};
use crate::error::{FilterChainError, Result};
use crate::framebuffer::OwnedFramebuffer;
use crate::options::{FilterChainOptions, FrameOptions};
use crate::pass::FilterPass;
use rustc_hash::FxHashSet;
use std::collections::VecDeque;
use std::fmt::{Display, Formatter};
use webrashader_common::resolve::Resolver;
use webrashader_common::{ImageFormat, Size};
use webrashader_presets::{ShaderPreset, TextureConfig};
use webrashader_runtime::compile::{compile_preset, CompiledPass};
use webrashader_runtime::graph::PassGraph;
use webrashader_runtime::image::{load_luts, Image, UVDirection};
use webrashader_runtime::parameters::ParameterTable;
use webrashader_runtime::scaling::scale;
use webrashader_runtime::semantics::{Semantic, TextureSemantics};
use webrashader_runtime::uniforms::FrameUniforms;
use webrashader_transpile::TranspileOptions;

/// Projects the `[0, 1]` quad onto the whole target.
#[rustfmt::skip]
pub const DEFAULT_MVP: [f32; 16] = [
    2.0, 0.0, 0.0, 0.0,
    0.0, 2.0, 0.0, 0.0,
    0.0, 0.0, 0.0, 0.0,
    -1.0, -1.0, 0.0, 1.0,
];

/// The lifecycle of a filter chain.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ChainState {
    /// Nothing was loaded yet.
    Idle,
    /// A preset is being compiled.
    Compiling,
    /// A preset is loaded and no frame was rendered with it yet.
    Ready,
    /// Frames are being rendered.
    Running,
    /// The last load failed, there is nothing to render with.
    Failed,
}

impl Display for ChainState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ChainState::Idle => "idle",
            ChainState::Compiling => "compiling",
            ChainState::Ready => "ready",
            ChainState::Running => "running",
            ChainState::Failed => "failed",
        })
    }
}

/// An input frame supplied by the host.
#[derive(Debug, Clone)]
pub struct InputImage<T> {
    /// The texture holding the frame.
    pub texture: T,
    /// The size of the frame.
    pub size: Size<u32>,
}

/// A preset compiled and resolved, ready to be installed on a device.
#[derive(Debug, Clone)]
pub struct PreparedChain {
    /// The transpiled passes.
    pub passes: Vec<CompiledPass>,
    /// The resolved bindings of the passes.
    pub graph: PassGraph,
    /// The parameters of the passes.
    pub parameters: ParameterTable,
    /// The lookup textures declared by the preset.
    pub textures: Vec<TextureConfig>,
    /// The decoded lookup textures, in declaration order.
    pub luts: Vec<Image>,
}

impl PreparedChain {
    /// Compile every pass of `preset`, resolve parameters and bindings and
    /// decode the lookup textures.
    pub fn prepare(
        preset: &ShaderPreset,
        resolver: &mut impl Resolver,
        options: &TranspileOptions,
    ) -> Result<Self> {
        if preset.shaders.is_empty() {
            return Err(FilterChainError::EmptyPreset);
        }

        let passes = compile_preset(preset, resolver, options)?;
        let parameters = ParameterTable::resolve(
            passes.iter().map(|pass| pass.unit.parameters.as_slice()),
            &preset.parameters,
            &[],
        )?;
        let graph = PassGraph::build(&passes, &preset.textures, &parameters)?;
        let luts = load_luts(&preset.textures, resolver, UVDirection::TopLeft)?;

        Ok(PreparedChain {
            passes,
            graph,
            parameters,
            textures: preset.textures.clone(),
            luts,
        })
    }
}

struct LutTexture<T> {
    texture: T,
    size: Size<u32>,
    sampler: SamplerState,
}

/// The device resources of a loaded preset.
struct Pipeline<D: Device> {
    passes: Vec<FilterPass<D>>,
    parameters: ParameterTable,
    formats: Vec<ImageFormat>,
    outputs: Vec<OwnedFramebuffer<D>>,
    feedback: Vec<OwnedFramebuffer<D>>,
    history: VecDeque<OwnedFramebuffer<D>>,
    luts: Vec<LutTexture<D::Texture>>,
    unbound: FxHashSet<(usize, String)>,
    frame_count: usize,
}

/// Why a frame was dropped.
struct DroppedFrame {
    pass: Option<usize>,
}

/// A multi pass shader pipeline rendering with a [`Device`].
pub struct FilterChain<D: Device> {
    device: D,
    options: FilterChainOptions,
    state: ChainState,
    pipeline: Option<Pipeline<D>>,
    pending_resize: Option<Size<u32>>,
    viewport: Size<u32>,
    diagnostics: DiagnosticQueue,
}

impl<D: Device> FilterChain<D> {
    /// Create an idle filter chain.
    pub fn new(device: D, options: &FilterChainOptions) -> Self {
        FilterChain {
            device,
            options: options.clone(),
            state: ChainState::Idle,
            pipeline: None,
            pending_resize: None,
            viewport: Size::default(),
            diagnostics: DiagnosticQueue::default(),
        }
    }

    /// The options passes are transpiled with.
    pub fn transpile_options(&self) -> TranspileOptions {
        let target = self
            .options
            .target
            .unwrap_or_else(|| self.device.capabilities().version);
        TranspileOptions::for_target(target)
    }

    /// Compile `preset` and install it, replacing the loaded preset.
    ///
    /// Blocks until every pass is compiled and linked. On failure the chain
    /// is [`ChainState::Failed`] until the next successful load.
    pub fn load_preset(&mut self, preset: &ShaderPreset, resolver: &mut impl Resolver) -> Result<()> {
        self.transition(ChainState::Compiling);
        tracing::debug!(passes = preset.shaders.len(), "loading preset");
        let options = self.transpile_options();
        match PreparedChain::prepare(preset, resolver, &options) {
            Ok(prepared) => self.install(prepared),
            Err(err) => {
                self.fail();
                Err(err)
            }
        }
    }

    /// Install a prepared preset, replacing the loaded preset.
    pub fn install(&mut self, prepared: PreparedChain) -> Result<()> {
        self.transition(ChainState::Compiling);
        if let Some(previous) = self.pipeline.take() {
            previous.delete(&mut self.device);
        }

        match Pipeline::new(&mut self.device, prepared, &self.options, &mut self.diagnostics) {
            Ok(pipeline) => {
                self.pipeline = Some(pipeline);
                self.transition(ChainState::Ready);
                Ok(())
            }
            Err(err) => {
                self.fail();
                Err(err)
            }
        }
    }

    /// Release the loaded preset after a load that failed before reaching the
    /// chain. The chain is [`ChainState::Failed`] until the next install.
    pub fn discard(&mut self) {
        self.fail();
    }

    fn fail(&mut self) {
        if let Some(previous) = self.pipeline.take() {
            previous.delete(&mut self.device);
        }
        self.transition(ChainState::Failed);
    }

    fn transition(&mut self, state: ChainState) {
        if self.state != state {
            tracing::debug!(from = %self.state, to = %state, "filter chain state");
            self.state = state;
        }
    }

    /// The state of the chain.
    pub fn state(&self) -> ChainState {
        self.state
    }

    /// Record a new viewport size.
    ///
    /// Sizes are applied at the start of the next frame, only the last one
    /// recorded before it takes effect.
    pub fn resize(&mut self, size: Size<u32>) {
        self.pending_resize = Some(size);
    }

    /// The viewport size frames are rendered at.
    pub fn viewport(&self) -> Size<u32> {
        self.pending_resize.unwrap_or(self.viewport)
    }

    /// The number of passes of the loaded preset.
    pub fn pass_count(&self) -> usize {
        self.pipeline.as_ref().map_or(0, |p| p.passes.len())
    }

    /// The parameters of the loaded preset.
    pub fn parameters(&self) -> Option<&ParameterTable> {
        self.pipeline.as_ref().map(|p| &p.parameters)
    }

    /// The current value of a parameter.
    pub fn parameter(&self, name: &str) -> Option<f32> {
        self.parameters()?.get(name)
    }

    /// Set a parameter, returning its previous value, or `None` if the loaded
    /// preset does not declare it.
    pub fn set_parameter(&mut self, name: &str, value: f32) -> Option<f32> {
        self.pipeline.as_mut()?.parameters.set(name, value)
    }

    /// Take the diagnostics queued since the last call.
    pub fn diagnostics(&mut self) -> Vec<FrameDiagnostic> {
        self.diagnostics.drain()
    }

    /// The device the chain renders with.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// The device the chain renders with.
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Render a frame to the canvas.
    ///
    /// Frames that can not be rendered because of a zero sized viewport or an
    /// incomplete framebuffer are dropped with a [`FrameDiagnostic::ResizeRace`]
    /// rather than an error.
    pub fn frame(&mut self, input: &InputImage<D::Texture>, options: &FrameOptions) -> Result<()> {
        self.render(input, options, false).map(|_| ())
    }

    /// Render a frame into a texture owned by the chain and return it.
    ///
    /// The texture stays valid until the next frame. Returns `None` when the
    /// frame was dropped.
    pub fn frame_to_texture(
        &mut self,
        input: &InputImage<D::Texture>,
        options: &FrameOptions,
    ) -> Result<Option<D::Texture>> {
        self.render(input, options, true)
    }

    fn render(
        &mut self,
        input: &InputImage<D::Texture>,
        options: &FrameOptions,
        to_texture: bool,
    ) -> Result<Option<D::Texture>> {
        if let Some(size) = self.pending_resize.take() {
            if size != self.viewport {
                tracing::debug!(width = size.width, height = size.height, "applying resize");
            }
            self.viewport = size;
        }

        let Some(pipeline) = self.pipeline.as_mut() else {
            return Err(FilterChainError::NotReady(self.state));
        };

        if self.viewport.is_empty() || input.size.is_empty() {
            self.diagnostics.push(FrameDiagnostic::ResizeRace {
                frame: pipeline.frame_count,
                pass: None,
                viewport: self.viewport,
            });
            return Ok(None);
        }

        let frame = pipeline.frame_count;
        match pipeline.draw(
            &mut self.device,
            input,
            self.viewport,
            options,
            to_texture,
            &self.options,
            &mut self.diagnostics,
        ) {
            Ok(texture) => {
                self.transition(ChainState::Running);
                Ok(texture)
            }
            Err(DroppedFrame { pass }) => {
                self.diagnostics.push(FrameDiagnostic::ResizeRace {
                    frame,
                    pass,
                    viewport: self.viewport,
                });
                Ok(None)
            }
        }
    }
}

impl<D: Device> Drop for FilterChain<D> {
    fn drop(&mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            pipeline.delete(&mut self.device);
        }
    }
}

/// The format a pass renders to on `device`.
fn target_format<D: Device>(
    device: &D,
    options: &FilterChainOptions,
    requested: ImageFormat,
) -> ImageFormat {
    let capabilities = device.capabilities();
    match requested {
        ImageFormat::R8G8B8A8Srgb if capabilities.srgb_render_targets => requested,
        format if format.is_float()
            && capabilities.float_render_targets
            && !options.disable_float_framebuffers =>
        {
            ImageFormat::R16G16B16A16Sfloat
        }
        _ => ImageFormat::R8G8B8A8Unorm,
    }
}

impl<D: Device> Pipeline<D> {
    fn new(
        device: &mut D,
        prepared: PreparedChain,
        options: &FilterChainOptions,
        diagnostics: &mut DiagnosticQueue,
    ) -> Result<Self> {
        let PreparedChain {
            passes: compiled,
            graph,
            parameters,
            textures,
            luts: images,
        } = prepared;

        let mut passes: Vec<FilterPass<D>> = Vec::with_capacity(compiled.len());
        for (pass, bindings) in compiled.iter().zip(graph.passes) {
            match FilterPass::compile(device, pass, bindings) {
                Ok(pass) => passes.push(pass),
                Err(err) => {
                    for pass in passes {
                        pass.delete(device);
                    }
                    return Err(err);
                }
            }
        }

        let mut formats = Vec::with_capacity(passes.len());
        for (index, pass) in passes.iter().enumerate() {
            let used = target_format(device, options, pass.format);
            if pass.format != ImageFormat::Unknown && pass.format != used {
                diagnostics.push(FrameDiagnostic::FormatFallback {
                    pass: index,
                    requested: pass.format,
                    used,
                });
            }
            formats.push(used);
        }

        let mut luts = Vec::with_capacity(images.len());
        for (config, image) in textures.iter().zip(&images) {
            let mipmap = config.mipmap && !options.force_no_mipmaps;
            let levels = if mipmap { image.size.calculate_miplevels() } else { 1 };
            let texture = match device.create_texture(image.size, ImageFormat::R8G8B8A8Unorm, levels) {
                Ok(texture) => texture,
                Err(err) => {
                    for lut in luts {
                        let LutTexture { texture, .. } = lut;
                        device.delete_texture(texture);
                    }
                    for pass in passes {
                        pass.delete(device);
                    }
                    return Err(err.into());
                }
            };
            device.upload_texture(&texture, image);
            if mipmap {
                device.generate_mipmaps(&texture);
            }
            luts.push(LutTexture {
                texture,
                size: image.size,
                sampler: SamplerState {
                    filter: config.filter_mode,
                    wrap: config.wrap_mode,
                    mipmap,
                },
            });
        }

        let history_len = graph.required_history.min(options.max_history);
        let mut history = VecDeque::with_capacity(history_len);
        history.resize_with(history_len, OwnedFramebuffer::new);

        let mut outputs = Vec::with_capacity(passes.len());
        outputs.resize_with(passes.len(), OwnedFramebuffer::new);
        let mut feedback = Vec::with_capacity(passes.len());
        feedback.resize_with(passes.len(), OwnedFramebuffer::new);

        tracing::debug!(
            passes = passes.len(),
            history = history_len,
            luts = luts.len(),
            parameters = parameters.len(),
            "installed pipeline"
        );

        Ok(Pipeline {
            passes,
            parameters,
            formats,
            outputs,
            feedback,
            history,
            luts,
            unbound: FxHashSet::default(),
            frame_count: 0,
        })
    }

    /// The texture bound to `semantic` in `pass`, with its size.
    fn texture<'a>(
        &'a self,
        input: &'a InputImage<D::Texture>,
        pass: usize,
        semantic: Semantic<TextureSemantics>,
    ) -> Option<(&'a D::Texture, Size<u32>)> {
        let owned = |framebuffer: &'a OwnedFramebuffer<D>| {
            framebuffer
                .texture()
                .map(|texture| (texture, framebuffer.size))
        };
        match semantic.semantics {
            TextureSemantics::Original => Some((&input.texture, input.size)),
            TextureSemantics::OriginalHistory if semantic.index == 0 => {
                Some((&input.texture, input.size))
            }
            TextureSemantics::Source if pass == 0 => Some((&input.texture, input.size)),
            TextureSemantics::Source => owned(&self.outputs[pass - 1]),
            TextureSemantics::OriginalHistory => owned(self.history.get(semantic.index - 1)?),
            TextureSemantics::PassOutput => owned(self.outputs.get(semantic.index)?),
            TextureSemantics::PassFeedback => owned(self.feedback.get(semantic.index)?),
            TextureSemantics::User => self
                .luts
                .get(semantic.index)
                .map(|lut| (&lut.texture, lut.size)),
        }
    }

    /// Allocate every target the frame renders into.
    fn allocate(
        &mut self,
        device: &mut D,
        input: &InputImage<D::Texture>,
        viewport: Size<u32>,
        to_texture: bool,
        options: &FilterChainOptions,
    ) -> std::result::Result<Vec<Size<u32>>, DroppedFrame> {
        for framebuffer in self.history.iter_mut() {
            framebuffer
                .ensure(device, input.size, ImageFormat::R8G8B8A8Unorm, false)
                .map_err(|_| DroppedFrame { pass: None })?;
        }

        let last = self.passes.len() - 1;
        let mut sizes = Vec::with_capacity(self.passes.len());
        let mut source = input.size;
        for (index, pass) in self.passes.iter().enumerate() {
            let size = if index == last {
                viewport
            } else {
                scale(&pass.config.scaling, source, viewport, false)
            };
            let mipmap = !options.force_no_mipmaps
                && self
                    .passes
                    .get(index + 1)
                    .is_some_and(|next| next.config.mipmap_input);

            if index != last || to_texture || pass.config.persistent {
                let format = self.formats[index];
                let dropped = |_| DroppedFrame { pass: Some(index) };
                self.outputs[index]
                    .ensure(device, size, format, mipmap)
                    .map_err(dropped)?;
                if pass.config.persistent {
                    self.feedback[index]
                        .ensure(device, size, format, mipmap)
                        .map_err(dropped)?;
                }
            }
            sizes.push(size);
            source = size;
        }
        Ok(sizes)
    }

    #[allow(clippy::too_many_arguments)]
    fn draw(
        &mut self,
        device: &mut D,
        input: &InputImage<D::Texture>,
        viewport: Size<u32>,
        frame_options: &FrameOptions,
        to_texture: bool,
        options: &FilterChainOptions,
        diagnostics: &mut DiagnosticQueue,
    ) -> std::result::Result<Option<D::Texture>, DroppedFrame> {
        if frame_options.clear_history {
            for framebuffer in &self.history {
                framebuffer.clear(device);
            }
        }

        let sizes = self.allocate(device, input, viewport, to_texture, options)?;
        let mvp = frame_options.mvp.unwrap_or(DEFAULT_MVP);
        let last = self.passes.len() - 1;
        let mut unbound = Vec::new();

        for (index, pass) in self.passes.iter().enumerate() {
            let frame = FrameUniforms {
                mvp: &mvp,
                frame_count: pass.frame_count(self.frame_count),
                frame_direction: frame_options.frame_direction,
                output: sizes[index],
                viewport,
                parameters: &self.parameters,
            };

            let mut textures = Vec::with_capacity(pass.bindings.textures.len());
            for (binding, location) in pass.bindings.textures.iter().zip(&pass.sampler_locations) {
                let Some((texture, _)) = self.texture(input, index, binding.source) else {
                    continue;
                };
                let sampler = match binding.source.semantics {
                    TextureSemantics::User => self.luts[binding.source.index].sampler,
                    _ => SamplerState {
                        filter: pass.config.filter,
                        wrap: pass.config.wrap_mode,
                        mipmap: pass.config.mipmap_input && !options.force_no_mipmaps,
                    },
                };
                textures.push(TextureBind {
                    unit: binding.binding,
                    name: &binding.name,
                    location: location.as_ref(),
                    texture,
                    sampler,
                });
            }

            let mut uniforms = Vec::with_capacity(pass.bindings.uniforms.len());
            for (binding, location) in pass.bindings.uniforms.iter().zip(&pass.uniform_locations) {
                let Some(location) = location else {
                    continue;
                };
                let value = binding.value(&frame, |semantic| {
                    self.texture(input, index, semantic).map(|(_, size)| size)
                });
                match value {
                    Some(value) => uniforms.push(UniformWrite {
                        name: &binding.name,
                        location,
                        value,
                    }),
                    None => unbound.push((index, binding.name.clone())),
                }
            }

            let owned = index != last || to_texture || pass.config.persistent;
            let target = match self.outputs[index].handle() {
                Some(framebuffer) if owned => RenderTarget::Framebuffer(framebuffer),
                _ => RenderTarget::Canvas,
            };

            device.draw(&DrawCall {
                program: &pass.program,
                target,
                size: sizes[index],
                textures: &textures,
                uniforms: &uniforms,
            });

            if owned && self.outputs[index].levels > 1 {
                if let Some(texture) = self.outputs[index].texture() {
                    device.generate_mipmaps(texture);
                }
            }
        }

        for key in unbound {
            if self.unbound.insert(key.clone()) {
                diagnostics.push(FrameDiagnostic::UnboundUniform {
                    pass: key.0,
                    name: key.1,
                });
            }
        }

        let persistent_last = self.passes[last].config.persistent;
        if persistent_last && !to_texture {
            if let Some(texture) = self.outputs[last].texture() {
                device.copy_texture(texture, RenderTarget::Canvas, viewport);
            }
        }
        let output = if to_texture {
            self.outputs[last].texture().cloned()
        } else {
            None
        };

        for (index, pass) in self.passes.iter().enumerate() {
            if pass.config.persistent {
                std::mem::swap(&mut self.outputs[index], &mut self.feedback[index]);
            }
        }

        self.push_history(device, input);
        self.frame_count += 1;
        Ok(output)
    }

    fn push_history(&mut self, device: &mut D, input: &InputImage<D::Texture>) {
        let Some(back) = self.history.pop_back() else {
            return;
        };
        if let Some(framebuffer) = back.handle() {
            device.copy_texture(&input.texture, RenderTarget::Framebuffer(framebuffer), back.size);
        }
        self.history.push_front(back);
    }

    fn delete(self, device: &mut D) {
        for pass in self.passes {
            pass.delete(device);
        }
        for mut framebuffer in self
            .outputs
            .into_iter()
            .chain(self.feedback)
            .chain(self.history)
        {
            framebuffer.delete(device);
        }
        for lut in self.luts {
            device.delete_texture(lut.texture);
        }
    }
}
