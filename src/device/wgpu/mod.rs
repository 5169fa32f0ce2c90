//! wgpu Backend
//!
//! [`WgpuDevice`] implements [`GpuDevice`] on a headless `wgpu` device. The
//! engine issues GL-shaped commands (a current program, loose uniforms,
//! numbered texture slots); this backend records them and encodes every
//! render pass as one wgpu render pass when it ends.
//!
//! ```text
//! begin_render_pass ─► { use_program | set_uniform | bind_* | draw }* ─► end_render_pass
//!                                                                          │
//!                        PipelineCache ◄── PipelineKey ◄── RecordedDraw ◄──┘
//!                                                                          │
//! finish_frame ◄── CommandEncoder ◄── wgpu::RenderPass ◄── PreparedDraw ◄──┘
//! ```
//!
//! GLSL reaches naga through [`glsl::prepare_program`]. Translation limits:
//! - there is no geometry stage
//! - vertex inputs are read interleaved, in location order, from the draw's
//!   vertex buffer; instance buffers are not bound
//! - mismatches between stages only surface when the first draw builds a
//!   pipeline

mod glsl;
mod pipelines;

use std::borrow::Cow;
use std::sync::mpsc;

use glam::{UVec2, UVec3, Vec4};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use xxhash_rust::xxh3::xxh3_128_with_seed;

use self::glsl::{ImageAccess, PreparedStage, ProgramLayout, SampleKind};
use self::pipelines::{PipelineCache, PipelineKey, StateKey};
use super::{
    BufferDescriptor, BufferId, BufferUsage, ColorAttachments, DepthStencilClear,
    DeviceCapabilities, DrawCall, FramebufferDescriptor, FramebufferId, FramebufferStatus,
    GpuDevice, MemoryBarrier, PrimitiveTopology, ProgramDescriptor, ProgramId, ProgramStages,
    RenderPassDescriptor, TextureDescriptor, TextureFormat, TextureId, TextureKind,
};
use crate::errors::{CompileError, DeviceError};
use crate::pipeline::state::CullFace;
use crate::pipeline::{RenderState, UniformValue};
use crate::shader::ShaderStage;

/// Features used when the adapter offers them.
fn optional_features() -> wgpu::Features {
    wgpu::Features::POLYGON_MODE_LINE
        | wgpu::Features::POLYGON_MODE_POINT
        | wgpu::Features::DEPTH_CLIP_CONTROL
        | wgpu::Features::FLOAT32_FILTERABLE
}

// ─── Resources ───────────────────────────────────────────────────────────────

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    format: TextureFormat,
    kind: TextureKind,
    size: UVec2,
    samples: u32,
}

struct GpuFramebuffer {
    colors: ColorAttachments,
    depth_stencil: Option<TextureId>,
    status: FramebufferStatus,
}

/// A shader module shared through the module cache.
struct CachedModule {
    hash: u128,
    module: wgpu::ShaderModule,
}

enum ProgramModules {
    Graphics {
        vertex: CachedModule,
        fragment: CachedModule,
    },
    Compute {
        module: CachedModule,
        pipeline: wgpu::ComputePipeline,
    },
}

pub(super) struct GpuProgram {
    label: Option<String>,
    modules: ProgramModules,
    layout: ProgramLayout,
    bind_group_layouts: Vec<wgpu::BindGroupLayout>,
    pipeline_layout: wgpu::PipelineLayout,
    /// Current values of the globals block.
    uniforms: Vec<u8>,
}

impl GpuProgram {
    fn graphics_modules(&self) -> Option<(&wgpu::ShaderModule, &wgpu::ShaderModule)> {
        match &self.modules {
            ProgramModules::Graphics { vertex, fragment } => Some((&vertex.module, &fragment.module)),
            ProgramModules::Compute { .. } => None,
        }
    }

    fn module_hashes(&self) -> SmallVec<[u128; 2]> {
        match &self.modules {
            ProgramModules::Graphics { vertex, fragment } => {
                smallvec::smallvec![vertex.hash, fragment.hash]
            }
            ProgramModules::Compute { module, .. } => smallvec::smallvec![module.hash],
        }
    }
}

/// 1x1 textures sampled when a slot is left empty.
struct Placeholders {
    d2: wgpu::TextureView,
    cube: wgpu::TextureView,
    d3: wgpu::TextureView,
}

impl Placeholders {
    fn new(device: &wgpu::Device) -> Self {
        let create = |kind: TextureKind| {
            let (dimension, layers, view_dimension) = texture_dimensions(kind);
            device
                .create_texture(&wgpu::TextureDescriptor {
                    label: Some("Prism Placeholder"),
                    size: wgpu::Extent3d {
                        width: 1,
                        height: 1,
                        depth_or_array_layers: layers,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension,
                    format: wgpu::TextureFormat::Rgba8Unorm,
                    usage: wgpu::TextureUsages::TEXTURE_BINDING,
                    view_formats: &[],
                })
                .create_view(&wgpu::TextureViewDescriptor {
                    dimension: Some(view_dimension),
                    ..Default::default()
                })
        };
        Self {
            d2: create(TextureKind::D2),
            cube: create(TextureKind::Cube),
            d3: create(TextureKind::D3),
        }
    }

    fn view(&self, kind: TextureKind) -> &wgpu::TextureView {
        match kind {
            TextureKind::D2 => &self.d2,
            TextureKind::Cube => &self.cube,
            TextureKind::D3 => &self.d3,
        }
    }
}

// ─── Recording ───────────────────────────────────────────────────────────────

/// Resources bound to numbered slots, GL style.
#[derive(Debug, Clone, Default)]
struct Bindings {
    textures: FxHashMap<u32, TextureId>,
    uniform_buffers: FxHashMap<u32, BufferId>,
    storage_buffers: FxHashMap<u32, BufferId>,
    images: FxHashMap<u32, TextureId>,
}

struct RecordedDraw {
    program: ProgramId,
    state: RenderState,
    viewport: UVec2,
    uniforms: Vec<u8>,
    bindings: Bindings,
    call: DrawCall,
}

struct RecordedPass {
    label: Option<String>,
    framebuffer: FramebufferId,
    color_clears: SmallVec<[Option<Vec4>; 4]>,
    depth_stencil_clear: Option<DepthStencilClear>,
    draws: Vec<RecordedDraw>,
}

/// Attachments of a complete framebuffer.
struct TargetInfo {
    colors: SmallVec<[Option<(wgpu::TextureView, wgpu::TextureFormat)>; 4]>,
    depth: Option<(wgpu::TextureView, wgpu::TextureFormat)>,
    samples: u32,
    size: UVec2,
}

struct PreparedDraw {
    pipeline: wgpu::RenderPipeline,
    bind_groups: Vec<wgpu::BindGroup>,
    vertex_buffer: Option<wgpu::Buffer>,
    viewport: UVec2,
    blend_constant: Vec4,
    stencil_reference: u32,
    vertex_count: u32,
    instance_count: u32,
}

// ─── Device ──────────────────────────────────────────────────────────────────

/// A [`GpuDevice`] backed by `wgpu`.
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    features: wgpu::Features,
    capabilities: DeviceCapabilities,
    next_handle: u32,

    textures: FxHashMap<TextureId, GpuTexture>,
    buffers: FxHashMap<BufferId, wgpu::Buffer>,
    programs: FxHashMap<ProgramId, GpuProgram>,
    framebuffers: FxHashMap<FramebufferId, GpuFramebuffer>,
    /// xxh3 of the prepared source → module and reference count.
    shader_modules: FxHashMap<u128, (wgpu::ShaderModule, usize)>,
    pipelines: PipelineCache,

    placeholders: Placeholders,
    linear_sampler: wgpu::Sampler,
    nearest_sampler: wgpu::Sampler,

    encoder: Option<wgpu::CommandEncoder>,
    pass: Option<RecordedPass>,
    current_program: Option<ProgramId>,
    render_state: RenderState,
    viewport: UVec2,
    bindings: Bindings,
}

impl WgpuDevice {
    /// Creates a device on the default high-performance adapter, blocking
    /// until it is ready.
    pub fn new() -> Result<Self, DeviceError> {
        pollster::block_on(Self::request(wgpu::PowerPreference::HighPerformance))
    }

    pub async fn request(power_preference: wgpu::PowerPreference) -> Result<Self, DeviceError> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| DeviceError::AdapterRequestFailed(e.to_string()))?;
        Self::from_adapter(&adapter).await
    }

    pub async fn from_adapter(adapter: &wgpu::Adapter) -> Result<Self, DeviceError> {
        let info = adapter.get_info();
        log::info!("Using adapter \"{}\" ({:?})", info.name, info.backend);

        let features = adapter.features() & optional_features();
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Prism Device"),
                required_features: features,
                required_limits: adapter.limits(),
                memory_hints: wgpu::MemoryHints::Performance,
                ..Default::default()
            })
            .await
            .map_err(|e| DeviceError::DeviceCreateFailed(e.to_string()))?;

        let capabilities = DeviceCapabilities {
            compute: adapter
                .get_downlevel_capabilities()
                .flags
                .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS),
            geometry_stage: false,
            max_samples: max_samples(adapter),
        };
        Ok(Self::from_parts(device, queue, features, capabilities))
    }

    /// Wraps an existing device, e.g. one shared with a windowing layer.
    #[must_use]
    pub fn from_parts(
        device: wgpu::Device,
        queue: wgpu::Queue,
        features: wgpu::Features,
        capabilities: DeviceCapabilities,
    ) -> Self {
        device.on_uncaptured_error(std::sync::Arc::new(|e| {
            log::error!("wgpu error: {e}");
        }));
        log::info!("wgpu device ready ({capabilities:?})");

        let linear_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Prism Linear Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let nearest_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Prism Nearest Sampler"),
            ..Default::default()
        });

        Self {
            placeholders: Placeholders::new(&device),
            device,
            queue,
            features,
            capabilities,
            next_handle: 0,
            textures: FxHashMap::default(),
            buffers: FxHashMap::default(),
            programs: FxHashMap::default(),
            framebuffers: FxHashMap::default(),
            shader_modules: FxHashMap::default(),
            pipelines: PipelineCache::default(),
            linear_sampler,
            nearest_sampler,
            encoder: None,
            pass: None,
            current_program: None,
            render_state: RenderState::default(),
            viewport: UVec2::ZERO,
            bindings: Bindings::default(),
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// The wgpu texture behind a handle, for presenting or copying it.
    pub fn texture(&self, texture: TextureId) -> Option<&wgpu::Texture> {
        self.textures.get(&texture).map(|t| &t.texture)
    }

    fn next_handle(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }

    /// Submits everything recorded so far.
    fn submit(&mut self) {
        if self.pass.is_some() {
            self.end_render_pass();
        }
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(std::iter::once(encoder.finish()));
        }
    }

    // ── Programs ─────────────────────────────────────────────────────────────

    /// Compiles one prepared stage, sharing modules with identical source.
    fn shader_module(&mut self, stage: &PreparedStage) -> Result<CachedModule, CompileError> {
        let hash = xxh3_128_with_seed(stage.source.as_bytes(), stage.stage as u64);
        if let Some((module, references)) = self.shader_modules.get_mut(&hash) {
            *references += 1;
            return Ok(CachedModule {
                hash,
                module: module.clone(),
            });
        }

        let naga_stage = match stage.stage {
            ShaderStage::Vertex => wgpu::naga::ShaderStage::Vertex,
            ShaderStage::Fragment => wgpu::naga::ShaderStage::Fragment,
            ShaderStage::Compute | ShaderStage::Geometry => wgpu::naga::ShaderStage::Compute,
        };
        let label = format!("Prism {} stage", stage.stage);
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&label),
            source: wgpu::ShaderSource::Glsl {
                shader: Cow::Borrowed(&stage.source),
                stage: naga_stage,
                defines: Default::default(),
            },
        });

        let info = pollster::block_on(module.get_compilation_info());
        let errors: Vec<String> = info
            .messages
            .iter()
            .filter(|m| matches!(m.message_type, wgpu::CompilationMessageType::Error))
            .map(|m| {
                let line = m
                    .location
                    .map_or(0, |location| stage.original_line(location.line_number));
                format!("ERROR: 0:{line}: {}", m.message)
            })
            .collect();
        if !errors.is_empty() {
            return Err(CompileError::new(stage.stage, errors.join("\n")));
        }

        self.shader_modules.insert(hash, (module.clone(), 1));
        Ok(CachedModule { hash, module })
    }

    fn release_module(&mut self, hash: u128) {
        if let Some((_, references)) = self.shader_modules.get_mut(&hash) {
            *references -= 1;
            if *references == 0 {
                self.shader_modules.remove(&hash);
            }
        }
    }

    // ── Frame recording ──────────────────────────────────────────────────────

    fn target_info(&self, framebuffer: FramebufferId) -> Option<TargetInfo> {
        let framebuffer = self.framebuffers.get(&framebuffer)?;
        if !framebuffer.status.is_complete() {
            return None;
        }
        let attachment = |id: &TextureId| {
            self.textures
                .get(id)
                .map(|t| (t.view.clone(), texture_format(t.format), t.size, t.samples))
        };

        let mut size = UVec2::ZERO;
        let mut samples = 1;
        let mut colors = SmallVec::new();
        for slot in &framebuffer.colors {
            colors.push(match slot {
                Some(id) => {
                    let (view, format, texture_size, texture_samples) = attachment(id)?;
                    size = texture_size;
                    samples = texture_samples;
                    Some((view, format))
                }
                None => None,
            });
        }
        let depth = match &framebuffer.depth_stencil {
            Some(id) => {
                let (view, format, texture_size, texture_samples) = attachment(id)?;
                size = texture_size;
                samples = texture_samples;
                Some((view, format))
            }
            None => None,
        };

        Some(TargetInfo {
            colors,
            depth,
            samples,
            size,
        })
    }

    fn prepare_draw(&mut self, target: &TargetInfo, draw: &RecordedDraw) -> Option<PreparedDraw> {
        let triangles = matches!(
            draw.call.topology,
            PrimitiveTopology::TriangleList | PrimitiveTopology::TriangleStrip
        );
        if draw.call.vertex_count == 0
            || (triangles && draw.state.cull && draw.state.cull_face == CullFace::FrontAndBack)
        {
            return None;
        }

        let Some(program) = self.programs.get(&draw.program) else {
            log::warn!("Draw with a destroyed program");
            return None;
        };
        let key = PipelineKey {
            program: draw.program,
            state: StateKey::from(&draw.state),
            colors: target.colors.iter().map(|c| c.as_ref().map(|(_, f)| *f)).collect(),
            depth: target.depth.as_ref().map(|(_, f)| *f),
            samples: target.samples,
            topology: draw.call.topology,
        };
        let pipeline = self
            .pipelines
            .get_or_create(&self.device, self.features, key, program)?;

        let vertex_buffer = if program.layout.vertex_inputs.is_empty() {
            None
        } else {
            let Some(buffer) = draw.call.vertex_buffer.and_then(|b| self.buffers.get(&b)) else {
                log::warn!("Program expects vertex inputs but the draw has no vertex buffer");
                return None;
            };
            Some(buffer.clone())
        };
        let bind_groups = self.bind_groups(program, &draw.uniforms, &draw.bindings)?;

        let viewport = if draw.viewport == UVec2::ZERO {
            target.size
        } else {
            draw.viewport.min(target.size)
        };
        Some(PreparedDraw {
            pipeline,
            bind_groups,
            vertex_buffer,
            viewport,
            blend_constant: draw.state.blend_constant,
            stencil_reference: draw.state.stencil_reference,
            vertex_count: draw.call.vertex_count,
            instance_count: draw.call.instance_count.unwrap_or(1),
        })
    }

    /// Builds the four bind groups of a draw or dispatch. Returns `None` when
    /// a block or image the program declares has nothing bound.
    fn bind_groups(
        &self,
        program: &GpuProgram,
        uniforms: &[u8],
        bindings: &Bindings,
    ) -> Option<Vec<wgpu::BindGroup>> {
        let layout = &program.layout;

        let globals = (layout.uniform_size > 0).then(|| {
            let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Prism Globals"),
                size: layout.uniform_size,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            self.queue.write_buffer(&buffer, 0, uniforms);
            buffer
        });

        let mut sets: [Vec<wgpu::BindGroupEntry<'_>>; 4] = Default::default();
        if let Some(buffer) = &globals {
            sets[0].push(wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            });
        }
        for block in &layout.uniform_blocks {
            let buffer = self.bound_buffer(&bindings.uniform_buffers, &block.name, block.slot)?;
            sets[0].push(wgpu::BindGroupEntry {
                binding: block.slot + 1,
                resource: buffer.as_entire_binding(),
            });
        }

        for sampler in &layout.samplers {
            let bound = bindings
                .textures
                .get(&sampler.slot)
                .and_then(|id| self.textures.get(id))
                .filter(|t| t.kind == sampler.kind && t.samples == 1);
            let view = match bound {
                Some(texture) => &texture.view,
                None if sampler.sample == SampleKind::Float => self.placeholders.view(sampler.kind),
                None => {
                    log::warn!("No texture bound to integer sampler '{}'", sampler.name);
                    return None;
                }
            };
            let filter = if sampler.sample == SampleKind::Float {
                &self.linear_sampler
            } else {
                &self.nearest_sampler
            };
            sets[1].push(wgpu::BindGroupEntry {
                binding: sampler.slot * 2,
                resource: wgpu::BindingResource::TextureView(view),
            });
            sets[1].push(wgpu::BindGroupEntry {
                binding: sampler.slot * 2 + 1,
                resource: wgpu::BindingResource::Sampler(filter),
            });
        }

        for block in &layout.storage_blocks {
            let buffer = self.bound_buffer(&bindings.storage_buffers, &block.name, block.slot)?;
            sets[2].push(wgpu::BindGroupEntry {
                binding: block.slot,
                resource: buffer.as_entire_binding(),
            });
        }

        for image in &layout.images {
            let Some(texture) = bindings
                .images
                .get(&image.slot)
                .and_then(|id| self.textures.get(id))
                .filter(|t| t.format == image.format && t.kind == image.kind)
            else {
                log::warn!("No matching image bound to '{}'", image.name);
                return None;
            };
            sets[3].push(wgpu::BindGroupEntry {
                binding: image.slot,
                resource: wgpu::BindingResource::TextureView(&texture.view),
            });
        }

        Some(
            sets.iter()
                .zip(&program.bind_group_layouts)
                .map(|(entries, layout)| {
                    self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                        label: None,
                        layout,
                        entries,
                    })
                })
                .collect(),
        )
    }

    fn bound_buffer(
        &self,
        slots: &FxHashMap<u32, BufferId>,
        name: &str,
        slot: u32,
    ) -> Option<&wgpu::Buffer> {
        let buffer = slots.get(&slot).and_then(|id| self.buffers.get(id));
        if buffer.is_none() {
            log::warn!("No buffer bound to block '{name}' (slot {slot})");
        }
        buffer
    }
}

impl GpuDevice for WgpuDevice {
    fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    // ── Resources ────────────────────────────────────────────────────────────

    fn create_texture(&mut self, desc: &TextureDescriptor<'_>) -> Result<TextureId, DeviceError> {
        if desc.size.x == 0 || desc.size.y == 0 {
            return Err(DeviceError::ResourceCreation {
                kind: "texture",
                reason: format!("zero-sized texture {:?}", desc.label),
            });
        }
        if desc.samples > 1 && (desc.kind != TextureKind::D2 || desc.samples > self.capabilities.max_samples) {
            return Err(DeviceError::ResourceCreation {
                kind: "texture",
                reason: format!("{} samples are not supported here", desc.samples),
            });
        }

        let format = texture_format(desc.format);
        let (dimension, layers, view_dimension) = texture_dimensions(desc.kind);
        let usage = if desc.samples > 1 {
            wgpu::TextureUsages::RENDER_ATTACHMENT
        } else if desc.format.is_depth_stencil() {
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING
        } else {
            let mut usage = wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST;
            if desc.kind == TextureKind::D2 {
                usage |= wgpu::TextureUsages::RENDER_ATTACHMENT;
            }
            if supports_storage(desc.format) {
                usage |= wgpu::TextureUsages::STORAGE_BINDING;
            }
            usage
        };

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: desc.label,
            size: wgpu::Extent3d {
                width: desc.size.x,
                height: desc.size.y,
                depth_or_array_layers: layers,
            },
            mip_level_count: 1,
            sample_count: desc.samples.max(1),
            dimension,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: desc.label,
            dimension: Some(view_dimension),
            ..Default::default()
        });

        let id = TextureId::from_raw(self.next_handle());
        self.textures.insert(
            id,
            GpuTexture {
                texture,
                view,
                format: desc.format,
                kind: desc.kind,
                size: desc.size,
                samples: desc.samples.max(1),
            },
        );
        Ok(id)
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        if let Some(gpu) = self.textures.remove(&texture) {
            gpu.texture.destroy();
        }
    }

    fn create_buffer(
        &mut self,
        desc: &BufferDescriptor<'_>,
        contents: &[u8],
    ) -> Result<BufferId, DeviceError> {
        let size = (contents.len() as u64)
            .max(wgpu::COPY_BUFFER_ALIGNMENT)
            .next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);
        if size > self.device.limits().max_buffer_size {
            return Err(DeviceError::ResourceCreation {
                kind: "buffer",
                reason: format!("{size} bytes exceed the device limit"),
            });
        }

        let mut usage = wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC;
        if desc.usage.contains(BufferUsage::VERTEX) {
            usage |= wgpu::BufferUsages::VERTEX;
        }
        if desc.usage.contains(BufferUsage::UNIFORM) {
            usage |= wgpu::BufferUsages::UNIFORM;
        }
        if desc.usage.contains(BufferUsage::STORAGE) {
            usage |= wgpu::BufferUsages::STORAGE;
        }

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: desc.label,
            size,
            usage,
            mapped_at_creation: false,
        });
        if !contents.is_empty() {
            let mut padded = contents.to_vec();
            padded.resize(size as usize, 0);
            self.queue.write_buffer(&buffer, 0, &padded);
        }

        let id = BufferId::from_raw(self.next_handle());
        self.buffers.insert(id, buffer);
        Ok(id)
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        if let Some(buffer) = self.buffers.remove(&buffer) {
            buffer.destroy();
        }
    }

    fn create_program(&mut self, desc: &ProgramDescriptor<'_>) -> Result<ProgramId, CompileError> {
        let stages: SmallVec<[(ShaderStage, &str); 2]> = match desc.stages {
            ProgramStages::Graphics {
                geometry: Some(_), ..
            } => {
                return Err(CompileError::new(
                    ShaderStage::Geometry,
                    "ERROR: 0:0: geometry shaders are not supported by this device",
                ));
            }
            ProgramStages::Graphics {
                vertex, fragment, ..
            } => smallvec::smallvec![
                (ShaderStage::Vertex, vertex.source),
                (ShaderStage::Fragment, fragment.source)
            ],
            ProgramStages::Compute(_) if !self.capabilities.compute => {
                return Err(CompileError::new(
                    ShaderStage::Compute,
                    "ERROR: 0:0: compute shaders are not supported by this device",
                ));
            }
            ProgramStages::Compute(stage) => {
                smallvec::smallvec![(ShaderStage::Compute, stage.source)]
            }
        };

        let (layout, prepared) = glsl::prepare_program(&stages)?;
        if let Some(input) = layout
            .vertex_inputs
            .iter()
            .find(|i| pipelines::vertex_format(i.ty).is_none())
        {
            return Err(CompileError::new(
                ShaderStage::Vertex,
                format!("ERROR: 0:0: unsupported type of vertex input '{}'", input.name),
            ));
        }

        let mut modules = Vec::with_capacity(prepared.len());
        for stage in &prepared {
            match self.shader_module(stage) {
                Ok(module) => modules.push(module),
                Err(error) => {
                    for module in modules {
                        self.release_module(module.hash);
                    }
                    return Err(error);
                }
            }
        }

        let compute = matches!(desc.stages, ProgramStages::Compute(_));
        let bind_group_layouts = bind_group_layouts(&self.device, &layout, compute);
        let layout_refs: Vec<Option<&wgpu::BindGroupLayout>> = bind_group_layouts.iter().map(Some).collect();
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: desc.label,
                bind_group_layouts: &layout_refs,
                immediate_size: 0,
            });

        let mut modules = modules.into_iter();
        let program_modules = match (modules.next(), modules.next()) {
            (Some(module), None) if compute => {
                let pipeline = self
                    .device
                    .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                        label: desc.label,
                        layout: Some(&pipeline_layout),
                        module: &module.module,
                        entry_point: Some("main"),
                        compilation_options: wgpu::PipelineCompilationOptions::default(),
                        cache: None,
                    });
                ProgramModules::Compute { module, pipeline }
            }
            (Some(vertex), Some(fragment)) => ProgramModules::Graphics { vertex, fragment },
            _ => {
                return Err(CompileError::new(
                    ShaderStage::Fragment,
                    "ERROR: 0:0: program has no stages",
                ));
            }
        };

        let id = ProgramId::from_raw(self.next_handle());
        log::debug!(
            "Created program {id:?} ({:?}, {} uniforms, {} samplers)",
            desc.label,
            layout.uniforms.len(),
            layout.samplers.len()
        );
        self.programs.insert(
            id,
            GpuProgram {
                label: desc.label.map(str::to_owned),
                modules: program_modules,
                uniforms: vec![0; layout.uniform_size as usize],
                layout,
                bind_group_layouts,
                pipeline_layout,
            },
        );
        Ok(id)
    }

    fn destroy_program(&mut self, program: ProgramId) {
        if let Some(removed) = self.programs.remove(&program) {
            for hash in removed.module_hashes() {
                self.release_module(hash);
            }
            self.pipelines.evict_program(program);
        }
        if self.current_program == Some(program) {
            self.current_program = None;
        }
    }

    fn create_framebuffer(
        &mut self,
        desc: &FramebufferDescriptor<'_>,
    ) -> Result<FramebufferId, DeviceError> {
        let mut problem: Option<&str> = None;
        let mut shape: Option<(UVec2, u32)> = None;

        for (id, depth) in desc
            .color_attachments
            .iter()
            .flatten()
            .map(|id| (id, false))
            .chain(desc.depth_stencil.iter().map(|id| (id, true)))
        {
            let texture = self
                .textures
                .get(id)
                .ok_or(DeviceError::InvalidHandle("texture"))?;
            if texture.format.is_depth_stencil() != depth {
                problem = Some("attachment format does not match its slot");
            }
            if texture.kind != TextureKind::D2 {
                problem = Some("only 2D textures can be attached");
            }
            match shape {
                None => shape = Some((texture.size, texture.samples)),
                Some(expected) if expected != (texture.size, texture.samples) => {
                    problem = Some("attachments differ in size or sample count");
                }
                Some(_) => {}
            }
        }
        if shape.is_none() {
            problem = Some("no attachments");
        }

        let status = match problem {
            Some(reason) => {
                log::warn!("Framebuffer {:?} is incomplete: {reason}", desc.label);
                FramebufferStatus::Incomplete(reason.to_owned())
            }
            None => FramebufferStatus::Complete,
        };
        let id = FramebufferId::from_raw(self.next_handle());
        self.framebuffers.insert(
            id,
            GpuFramebuffer {
                colors: desc.color_attachments.clone(),
                depth_stencil: desc.depth_stencil,
                status,
            },
        );
        Ok(id)
    }

    fn framebuffer_status(&self, framebuffer: FramebufferId) -> FramebufferStatus {
        self.framebuffers.get(&framebuffer).map_or_else(
            || FramebufferStatus::Incomplete("unknown framebuffer".to_owned()),
            |f| f.status.clone(),
        )
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferId) {
        self.framebuffers.remove(&framebuffer);
    }

    // ── Render passes ────────────────────────────────────────────────────────

    fn begin_render_pass(&mut self, desc: &RenderPassDescriptor<'_>) {
        if self.pass.is_some() {
            self.end_render_pass();
        }
        self.pass = Some(RecordedPass {
            label: desc.label.map(str::to_owned),
            framebuffer: desc.framebuffer,
            color_clears: desc.color_clears.clone(),
            depth_stencil_clear: desc.depth_stencil_clear,
            draws: Vec::new(),
        });
    }

    fn end_render_pass(&mut self) {
        let Some(pass) = self.pass.take() else {
            return;
        };
        let Some(target) = self.target_info(pass.framebuffer) else {
            log::warn!("Skipping pass {:?}: framebuffer is not usable", pass.label);
            return;
        };
        let draws: Vec<PreparedDraw> = pass
            .draws
            .iter()
            .filter_map(|draw| self.prepare_draw(&target, draw))
            .collect();

        let color_attachments: SmallVec<[Option<wgpu::RenderPassColorAttachment<'_>>; 4]> = target
            .colors
            .iter()
            .enumerate()
            .map(|(i, slot)| {
                slot.as_ref().map(|(view, _)| wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: match pass.color_clears.get(i).copied().flatten() {
                            Some(color) => wgpu::LoadOp::Clear(clear_color(color)),
                            None => wgpu::LoadOp::Load,
                        },
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })
            })
            .collect();
        let clear = pass.depth_stencil_clear;
        let depth_stencil_attachment =
            target
                .depth
                .as_ref()
                .map(|(view, _)| wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations {
                        load: clear.map_or(wgpu::LoadOp::Load, |c| wgpu::LoadOp::Clear(c.depth)),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: Some(wgpu::Operations {
                        load: clear.map_or(wgpu::LoadOp::Load, |c| wgpu::LoadOp::Clear(c.stencil)),
                        store: wgpu::StoreOp::Store,
                    }),
                });

        let mut encoder = self
            .encoder
            .take()
            .unwrap_or_else(|| new_encoder(&self.device));
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: pass.label.as_deref(),
                color_attachments: &color_attachments,
                depth_stencil_attachment,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            for draw in &draws {
                render_pass.set_pipeline(&draw.pipeline);
                for (index, group) in draw.bind_groups.iter().enumerate() {
                    render_pass.set_bind_group(index as u32, group, &[]);
                }
                render_pass.set_viewport(
                    0.0,
                    0.0,
                    draw.viewport.x as f32,
                    draw.viewport.y as f32,
                    0.0,
                    1.0,
                );
                render_pass.set_blend_constant(clear_color(draw.blend_constant));
                render_pass.set_stencil_reference(draw.stencil_reference);
                if let Some(buffer) = &draw.vertex_buffer {
                    render_pass.set_vertex_buffer(0, buffer.slice(..));
                }
                render_pass.draw(0..draw.vertex_count, 0..draw.instance_count);
            }
        }
        self.encoder = Some(encoder);
        log::trace!("Encoded pass {:?} with {} draws", pass.label, draws.len());
    }

    fn set_viewport(&mut self, size: UVec2) {
        self.viewport = size;
    }

    fn use_program(&mut self, program: ProgramId) {
        self.current_program = Some(program);
    }

    fn set_uniform(&mut self, name: &str, value: &UniformValue) {
        let Some(program) = self
            .current_program
            .and_then(|id| self.programs.get_mut(&id))
        else {
            return;
        };
        let GpuProgram {
            layout, uniforms, ..
        } = program;
        layout.write_uniform(uniforms, name, value);
    }

    fn bind_texture(&mut self, slot: u32, texture: TextureId, _kind: TextureKind) {
        self.bindings.textures.insert(slot, texture);
    }

    fn bind_uniform_buffer(&mut self, slot: u32, buffer: BufferId) {
        self.bindings.uniform_buffers.insert(slot, buffer);
    }

    fn bind_storage_buffer(&mut self, slot: u32, buffer: BufferId) {
        self.bindings.storage_buffers.insert(slot, buffer);
    }

    fn bind_image(&mut self, slot: u32, texture: TextureId, _format: TextureFormat, _layered: bool) {
        self.bindings.images.insert(slot, texture);
    }

    fn reset_render_state(&mut self) {
        self.render_state = RenderState::default();
    }

    fn apply_render_state(&mut self, state: &RenderState) {
        self.render_state = state.clone();
    }

    fn draw(&mut self, call: &DrawCall) {
        let Some(program) = self.current_program else {
            log::debug!("Draw without a program");
            return;
        };
        let uniforms = self
            .programs
            .get(&program)
            .map(|p| p.uniforms.clone())
            .unwrap_or_default();
        let Some(pass) = self.pass.as_mut() else {
            log::debug!("Draw outside of a render pass");
            return;
        };
        pass.draws.push(RecordedDraw {
            program,
            state: self.render_state.clone(),
            viewport: self.viewport,
            uniforms,
            bindings: self.bindings.clone(),
            call: *call,
        });
    }

    fn resolve_framebuffer(
        &mut self,
        source: FramebufferId,
        destination: FramebufferId,
        attachments: u32,
        _size: UVec2,
    ) {
        if self.pass.is_some() {
            self.end_render_pass();
        }
        let (Some(source), Some(destination)) =
            (self.target_info(source), self.target_info(destination))
        else {
            log::warn!("Cannot resolve between incomplete framebuffers");
            return;
        };
        if source.samples == 1 || destination.samples != 1 {
            return;
        }

        let color_attachments: SmallVec<[Option<wgpu::RenderPassColorAttachment<'_>>; 4]> = (0
            ..attachments as usize)
            .map(|i| {
                match (
                    source.colors.get(i).and_then(Option::as_ref),
                    destination.colors.get(i).and_then(Option::as_ref),
                ) {
                    (Some((view, _)), Some((resolve, _))) => Some(wgpu::RenderPassColorAttachment {
                        view,
                        resolve_target: Some(resolve),
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                        depth_slice: None,
                    }),
                    _ => None,
                }
            })
            .collect();
        if color_attachments.iter().all(Option::is_none) {
            return;
        }

        let mut encoder = self
            .encoder
            .take()
            .unwrap_or_else(|| new_encoder(&self.device));
        drop(encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Prism Resolve"),
            color_attachments: &color_attachments,
            ..Default::default()
        }));
        self.encoder = Some(encoder);
    }

    // ── Compute ──────────────────────────────────────────────────────────────

    fn dispatch_compute(&mut self, groups: UVec3) {
        if self.pass.is_some() {
            self.end_render_pass();
        }
        let Some(program) = self.current_program.and_then(|id| self.programs.get(&id)) else {
            log::debug!("Dispatch without a program");
            return;
        };
        let ProgramModules::Compute { pipeline, .. } = &program.modules else {
            log::warn!("Dispatch with a graphics program");
            return;
        };
        let Some(bind_groups) = self.bind_groups(program, &program.uniforms, &self.bindings) else {
            return;
        };

        let mut encoder = self
            .encoder
            .take()
            .unwrap_or_else(|| new_encoder(&self.device));
        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: program.label.as_deref(),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(pipeline);
            for (index, group) in bind_groups.iter().enumerate() {
                compute_pass.set_bind_group(index as u32, group, &[]);
            }
            compute_pass.dispatch_workgroups(groups.x, groups.y, groups.z);
        }
        self.encoder = Some(encoder);
    }

    fn memory_barrier(&mut self, barriers: MemoryBarrier) {
        // wgpu tracks hazards between passes itself
        log::trace!("memory barrier {barriers:?}");
    }

    // ── Frame ────────────────────────────────────────────────────────────────

    fn read_pixel(&mut self, texture: TextureId, position: UVec2) -> Result<[u8; 4], DeviceError> {
        self.submit();

        let gpu = self
            .textures
            .get(&texture)
            .ok_or(DeviceError::InvalidHandle("texture"))?;
        if gpu.samples > 1 || gpu.format.is_depth_stencil() {
            return Err(DeviceError::Readback(format!(
                "{:?} with {} samples cannot be read back",
                gpu.format, gpu.samples
            )));
        }
        if position.x >= gpu.size.x || position.y >= gpu.size.y {
            return Err(DeviceError::Readback(format!(
                "{position} is outside of {}",
                gpu.size
            )));
        }

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Prism Readback"),
            size: u64::from(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = new_encoder(&self.device);
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &gpu.texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: position.x,
                    y: flip_row(position.y, gpu.size.y),
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT),
                    rows_per_image: Some(1),
                },
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| DeviceError::Readback(e.to_string()))?;
        receiver
            .recv()
            .map_err(|_| DeviceError::Readback("map_async channel closed".to_owned()))?
            .map_err(|e| DeviceError::Readback(e.to_string()))?;

        let texel = {
            let data = slice.get_mapped_range();
            decode_texel(gpu.format, &data)
        };
        staging.unmap();
        Ok(texel)
    }

    fn finish_frame(&mut self) {
        self.submit();
        self.current_program = None;
        self.render_state = RenderState::default();
        self.bindings = Bindings::default();
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn new_encoder(device: &wgpu::Device) -> wgpu::CommandEncoder {
    device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Prism Frame"),
    })
}

fn texture_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        // wgpu has no three-channel 8-bit format
        TextureFormat::Rgb8Unorm | TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        TextureFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
        TextureFormat::R32Float => wgpu::TextureFormat::R32Float,
        TextureFormat::R32Uint => wgpu::TextureFormat::R32Uint,
        TextureFormat::Depth24PlusStencil8 => wgpu::TextureFormat::Depth24PlusStencil8,
    }
}

fn supports_storage(format: TextureFormat) -> bool {
    !matches!(
        format,
        TextureFormat::Rgb8Unorm | TextureFormat::Depth24PlusStencil8
    )
}

fn texture_dimensions(
    kind: TextureKind,
) -> (wgpu::TextureDimension, u32, wgpu::TextureViewDimension) {
    match kind {
        TextureKind::D2 => (wgpu::TextureDimension::D2, 1, wgpu::TextureViewDimension::D2),
        TextureKind::Cube => (wgpu::TextureDimension::D2, 6, wgpu::TextureViewDimension::Cube),
        TextureKind::D3 => (wgpu::TextureDimension::D3, 1, wgpu::TextureViewDimension::D3),
    }
}

fn clear_color(color: Vec4) -> wgpu::Color {
    wgpu::Color {
        r: f64::from(color.x),
        g: f64::from(color.y),
        b: f64::from(color.z),
        a: f64::from(color.w),
    }
}

/// Highest sample count both the color and the depth formats support.
fn max_samples(adapter: &wgpu::Adapter) -> u32 {
    let color = adapter
        .get_texture_format_features(wgpu::TextureFormat::Rgba8Unorm)
        .flags;
    let depth = adapter
        .get_texture_format_features(wgpu::TextureFormat::Depth24PlusStencil8)
        .flags;
    [16, 8, 4, 2]
        .into_iter()
        .find(|&count| color.sample_count_supported(count) && depth.sample_count_supported(count))
        .unwrap_or(1)
}

fn bind_group_layouts(
    device: &wgpu::Device,
    layout: &ProgramLayout,
    compute: bool,
) -> Vec<wgpu::BindGroupLayout> {
    let visibility = if compute {
        wgpu::ShaderStages::COMPUTE
    } else {
        wgpu::ShaderStages::VERTEX_FRAGMENT
    };
    // writable storage is not allowed in vertex shaders
    let writable = if compute {
        wgpu::ShaderStages::COMPUTE
    } else {
        wgpu::ShaderStages::FRAGMENT
    };
    let uniform = |binding: u32| wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    };

    let mut sets: [Vec<wgpu::BindGroupLayoutEntry>; 4] = Default::default();
    if layout.uniform_size > 0 {
        sets[0].push(uniform(0));
    }
    for block in &layout.uniform_blocks {
        sets[0].push(uniform(block.slot + 1));
    }

    for sampler in &layout.samplers {
        let (_, _, view_dimension) = texture_dimensions(sampler.kind);
        let (sample_type, sampler_type) = match sampler.sample {
            SampleKind::Float => (
                wgpu::TextureSampleType::Float { filterable: true },
                wgpu::SamplerBindingType::Filtering,
            ),
            SampleKind::Sint => (
                wgpu::TextureSampleType::Sint,
                wgpu::SamplerBindingType::NonFiltering,
            ),
            SampleKind::Uint => (
                wgpu::TextureSampleType::Uint,
                wgpu::SamplerBindingType::NonFiltering,
            ),
        };
        sets[1].push(wgpu::BindGroupLayoutEntry {
            binding: sampler.slot * 2,
            visibility,
            ty: wgpu::BindingType::Texture {
                sample_type,
                view_dimension,
                multisampled: false,
            },
            count: None,
        });
        sets[1].push(wgpu::BindGroupLayoutEntry {
            binding: sampler.slot * 2 + 1,
            visibility,
            ty: wgpu::BindingType::Sampler(sampler_type),
            count: None,
        });
    }

    for block in &layout.storage_blocks {
        sets[2].push(wgpu::BindGroupLayoutEntry {
            binding: block.slot,
            visibility: writable,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: false },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        });
    }

    for image in &layout.images {
        let (_, _, view_dimension) = texture_dimensions(image.kind);
        sets[3].push(wgpu::BindGroupLayoutEntry {
            binding: image.slot,
            visibility: writable,
            ty: wgpu::BindingType::StorageTexture {
                access: match image.access {
                    ImageAccess::ReadOnly => wgpu::StorageTextureAccess::ReadOnly,
                    ImageAccess::WriteOnly => wgpu::StorageTextureAccess::WriteOnly,
                    ImageAccess::ReadWrite => wgpu::StorageTextureAccess::ReadWrite,
                },
                format: texture_format(image.format),
                view_dimension,
            },
            count: None,
        });
    }

    sets.iter()
        .map(|entries| {
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: None,
                entries,
            })
        })
        .collect()
}

/// GL counts rows from the bottom, wgpu from the top.
fn flip_row(row: u32, height: u32) -> u32 {
    height - 1 - row
}

fn unorm8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Converts the first texel of `data` to RGBA8.
fn decode_texel(format: TextureFormat, data: &[u8]) -> [u8; 4] {
    let word = |i: usize| [data[i * 4], data[i * 4 + 1], data[i * 4 + 2], data[i * 4 + 3]];
    match format {
        TextureFormat::Rgb8Unorm | TextureFormat::Rgba8Unorm => word(0),
        TextureFormat::Rgba16Float => std::array::from_fn(|i| {
            unorm8(half::f16::from_le_bytes([data[i * 2], data[i * 2 + 1]]).to_f32())
        }),
        TextureFormat::Rgba32Float => std::array::from_fn(|i| unorm8(f32::from_le_bytes(word(i)))),
        TextureFormat::R32Float => [unorm8(f32::from_le_bytes(word(0))), 0, 0, 255],
        TextureFormat::R32Uint => u32::from_le_bytes(word(0)).to_le_bytes(),
        TextureFormat::Depth24PlusStencil8 => [0; 4],
    }
}
