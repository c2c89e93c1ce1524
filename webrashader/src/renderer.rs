use rustc_hash::FxHashMap;
use std::fmt::{Display, Formatter};
use thiserror::Error;
use webrashader_common::resolve::Resolver;
use webrashader_common::Size;
use webrashader_presets::{ParsePresetError, ShaderPreset};
use webrashader_runtime::parameters::ParameterTable;
use webrashader_runtime_gl::chain::{ChainState, FilterChain, InputImage, PreparedChain};
use webrashader_runtime_gl::device::Device;
use webrashader_runtime_gl::diagnostics::FrameDiagnostic;
use webrashader_runtime_gl::error::FilterChainError;
use webrashader_runtime_gl::options::{FilterChainOptions, FrameOptions};

/// Identifies a pipeline loaded by a [`Renderer`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipelineHandle(u32);

impl Display for PipelineHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "pipeline#{}", self.0)
    }
}

/// Error type for loading presets.
#[derive(Error, Debug)]
pub enum LoadError {
    /// The preset could not be parsed.
    #[error(transparent)]
    Preset(#[from] ParsePresetError),
    /// The preset could not be compiled, resolved or installed.
    #[error(transparent)]
    FilterChain(#[from] FilterChainError),
    /// A later load of the same pipeline was started before this one finished.
    #[error("the load of {0} was superseded by a later load")]
    Superseded(PipelineHandle),
    /// The handle names no loaded pipeline.
    #[error("{0} is not loaded")]
    InvalidHandle(PipelineHandle),
}

/// Error type for rendering frames.
#[derive(Error, Debug)]
pub enum RenderError {
    /// The pipeline could not render.
    #[error(transparent)]
    FilterChain(#[from] FilterChainError),
    /// The handle names no loaded pipeline.
    #[error("{0} is not loaded")]
    InvalidHandle(PipelineHandle),
}

/// A preset prepared for a pipeline, waiting to be installed with
/// [`Renderer::finish_load`].
#[derive(Debug)]
pub struct LoadTicket {
    handle: PipelineHandle,
    generation: u64,
    prepared: Result<PreparedChain, LoadError>,
}

impl LoadTicket {
    /// The pipeline the ticket loads into.
    pub fn handle(&self) -> PipelineHandle {
        self.handle
    }
}

struct Slot<D: Device> {
    chain: FilterChain<D>,
    generation: u64,
}

/// Loads presets into pipelines and renders frames with them.
///
/// Each pipeline owns a filter chain with its own render targets. Devices are
/// cloned into each pipeline, so clones must render to the same context.
pub struct Renderer<D: Device + Clone> {
    device: D,
    options: FilterChainOptions,
    pipelines: FxHashMap<PipelineHandle, Slot<D>>,
    next_handle: u32,
}

impl<D: Device + Clone> Renderer<D> {
    /// Create a renderer drawing with `device`.
    pub fn new(device: D, options: FilterChainOptions) -> Self {
        Renderer {
            device,
            options,
            pipelines: FxHashMap::default(),
            next_handle: 0,
        }
    }

    /// Parse the preset located at `path` with the contents `text`, compile it
    /// and install it into a new pipeline.
    ///
    /// Everything the preset references is read through `resolver`, relative
    /// to `path`.
    pub fn load_preset(
        &mut self,
        path: &str,
        text: &str,
        resolver: &mut impl Resolver,
    ) -> Result<PipelineHandle, LoadError> {
        let preset = ShaderPreset::parse_with_references(path, text, resolver)?;
        let mut chain = FilterChain::new(self.device.clone(), &self.options);
        chain.load_preset(&preset, resolver)?;

        self.next_handle += 1;
        let handle = PipelineHandle(self.next_handle);
        tracing::debug!(%handle, %path, passes = chain.pass_count(), "loaded pipeline");
        self.pipelines.insert(handle, Slot { chain, generation: 0 });
        Ok(handle)
    }

    /// Replace the preset of a pipeline.
    ///
    /// On failure the pipeline is left without a preset and renders nothing
    /// until a later load succeeds.
    pub fn reload_preset(
        &mut self,
        handle: PipelineHandle,
        path: &str,
        text: &str,
        resolver: &mut impl Resolver,
    ) -> Result<(), LoadError> {
        let ticket = self.begin_load(handle, path, text, resolver)?;
        self.finish_load(ticket)
    }

    /// Parse and compile a preset for a pipeline without installing it.
    ///
    /// Only the most recently started load of a pipeline can be finished, any
    /// ticket issued before it is superseded.
    pub fn begin_load(
        &mut self,
        handle: PipelineHandle,
        path: &str,
        text: &str,
        resolver: &mut impl Resolver,
    ) -> Result<LoadTicket, LoadError> {
        let slot = self
            .pipelines
            .get_mut(&handle)
            .ok_or(LoadError::InvalidHandle(handle))?;
        slot.generation += 1;

        let options = slot.chain.transpile_options();
        let prepared = ShaderPreset::parse_with_references(path, text, resolver)
            .map_err(LoadError::from)
            .and_then(|preset| {
                PreparedChain::prepare(&preset, resolver, &options).map_err(LoadError::from)
            });

        tracing::debug!(%handle, %path, generation = slot.generation, "began load");
        Ok(LoadTicket {
            handle,
            generation: slot.generation,
            prepared,
        })
    }

    /// Install the preset of a ticket, unless a later load of the same
    /// pipeline was started.
    pub fn finish_load(&mut self, ticket: LoadTicket) -> Result<(), LoadError> {
        let LoadTicket {
            handle,
            generation,
            prepared,
        } = ticket;
        let slot = self
            .pipelines
            .get_mut(&handle)
            .ok_or(LoadError::InvalidHandle(handle))?;

        if generation != slot.generation {
            tracing::debug!(%handle, generation, latest = slot.generation, "discarding superseded load");
            return Err(LoadError::Superseded(handle));
        }

        match prepared {
            Ok(prepared) => Ok(slot.chain.install(prepared)?),
            Err(err) => {
                slot.chain.discard();
                Err(err)
            }
        }
    }

    /// Release a pipeline and everything it owns. Returns whether it was loaded.
    pub fn unload(&mut self, handle: PipelineHandle) -> bool {
        self.pipelines.remove(&handle).is_some()
    }

    /// Set a parameter of a pipeline, returning its previous value, or `None`
    /// if the pipeline does not declare it.
    pub fn set_parameter(&mut self, handle: PipelineHandle, name: &str, value: f32) -> Option<f32> {
        self.pipelines.get_mut(&handle)?.chain.set_parameter(name, value)
    }

    /// The parameters of a pipeline.
    pub fn parameters(&self, handle: PipelineHandle) -> Option<&ParameterTable> {
        self.pipelines.get(&handle)?.chain.parameters()
    }

    /// Render a frame of `input` to the canvas.
    pub fn render_frame(
        &mut self,
        handle: PipelineHandle,
        input: &InputImage<D::Texture>,
        options: &FrameOptions,
    ) -> Result<(), RenderError> {
        let slot = self
            .pipelines
            .get_mut(&handle)
            .ok_or(RenderError::InvalidHandle(handle))?;
        Ok(slot.chain.frame(input, options)?)
    }

    /// Render a frame of `input` into a texture owned by the pipeline.
    ///
    /// The texture stays valid until the next frame of the pipeline. Returns
    /// `None` when the frame was dropped.
    pub fn render_frame_to_texture(
        &mut self,
        handle: PipelineHandle,
        input: &InputImage<D::Texture>,
        options: &FrameOptions,
    ) -> Result<Option<D::Texture>, RenderError> {
        let slot = self
            .pipelines
            .get_mut(&handle)
            .ok_or(RenderError::InvalidHandle(handle))?;
        Ok(slot.chain.frame_to_texture(input, options)?)
    }

    /// Record the new size of the canvas, applied at the next frame.
    pub fn on_resize(&mut self, handle: PipelineHandle, width: u32, height: u32) -> bool {
        match self.pipelines.get_mut(&handle) {
            Some(slot) => {
                slot.chain.resize(Size::new(width, height));
                true
            }
            None => false,
        }
    }

    /// Take the diagnostics a pipeline queued since the last call.
    pub fn diagnostics(&mut self, handle: PipelineHandle) -> Vec<FrameDiagnostic> {
        self.pipelines
            .get_mut(&handle)
            .map(|slot| slot.chain.diagnostics())
            .unwrap_or_default()
    }

    /// The state of a pipeline.
    pub fn state(&self, handle: PipelineHandle) -> Option<ChainState> {
        self.pipelines.get(&handle).map(|slot| slot.chain.state())
    }

    /// The handles of every loaded pipeline.
    pub fn pipelines(&self) -> impl Iterator<Item = PipelineHandle> + '_ {
        self.pipelines.keys().copied()
    }

    /// The device pipelines render with.
    pub fn device(&self) -> &D {
        &self.device
    }
}
