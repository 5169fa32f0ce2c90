//! Shared fixtures for the integration tests.
//!
//! - `MockDevice`: records every command and simulates one pixel per texture,
//!   so id readbacks behave like a real device that drew the whole target
//! - `MemoryProject`: shader files served from memory, editable after the
//!   engine took ownership
//! - `TestRegistry`: render textures and bind lists

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use glam::{UVec2, UVec3, Vec2, Vec4};

use prism::device::{
    BufferDescriptor, BufferId, DeviceCapabilities, DrawCall, FramebufferDescriptor,
    FramebufferId, FramebufferStatus, GpuDevice, MemoryBarrier, ProgramDescriptor, ProgramId,
    ProgramStages, RenderPassDescriptor, TextureDescriptor, TextureFormat, TextureId, TextureKind,
};
use prism::engine::RenderEngine;
use prism::errors::{CompileError, DeviceError};
use prism::pipeline::{
    GeometryItem, GeometryShape, ItemId, ItemKind, Pipeline, RenderState, RenderTargetRef,
    ShaderPass, ShaderStageDesc, UniformValue,
};
use prism::services::{
    EngineServices, ObjectRegistry, ProjectFiles, RenderTexture, RenderTextureId, ResourceBinding,
};
use prism::settings::EngineSettings;
use prism::shader::{DEBUG_ID_FRAGMENT, PICK_COLOR_UNIFORM, PICK_INDEX_FRAGMENT, ShaderStage};
use prism::utils::normalize_path;

/// Color written by every regular draw.
pub const DRAW_COLOR: [u8; 4] = [200, 100, 50, 255];

/// Any stage containing this text fails to compile.
pub const FAIL_MARKER: &str = "FORCE_COMPILE_ERROR";

pub const VERTEX_SHADER: &str = "#version 330\n\
layout(location = 0) in vec3 pos;\n\
uniform mat4 matGeo;\n\
void main()\n\
{\n\
    gl_Position = matGeo * vec4(pos, 1.0);\n\
}\n";

pub const FRAGMENT_SHADER: &str = "#version 330\n\
out vec4 color;\n\
void main()\n\
{\n\
    color = vec4(1.0);\n\
}\n";

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// MockDevice
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    BeginRenderPass {
        framebuffer: FramebufferId,
        color_clears: Vec<Option<Vec4>>,
        depth_clear: bool,
    },
    EndRenderPass,
    Viewport(UVec2),
    UseProgram(ProgramId),
    Uniform(String, UniformValue),
    BindTexture(u32, TextureId),
    BindUniformBuffer(u32, BufferId),
    BindStorageBuffer(u32, BufferId),
    ResetState,
    ApplyState(RenderState),
    Draw(DrawCall),
    Resolve {
        source: FramebufferId,
        destination: FramebufferId,
        attachments: u32,
    },
    Dispatch(UVec3),
    Barrier(MemoryBarrier),
    FinishFrame,
}

#[derive(Debug, Clone)]
pub struct MockTexture {
    pub label: String,
    pub size: UVec2,
    pub samples: u32,
    /// The single simulated pixel.
    pub color: [u8; 4],
}

#[derive(Debug, Clone)]
pub struct MockProgram {
    pub vertex: String,
    pub fragment: String,
    pub geometry: Option<String>,
    pub compute: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MockFramebuffer {
    pub colors: Vec<Option<TextureId>>,
    pub depth: Option<TextureId>,
}

#[derive(Debug, Default)]
pub struct MockDevice {
    next_handle: u32,
    pub capabilities: DeviceCapabilities,
    pub textures: HashMap<TextureId, MockTexture>,
    pub programs: HashMap<ProgramId, MockProgram>,
    pub framebuffers: HashMap<FramebufferId, MockFramebuffer>,
    pub buffers: HashMap<BufferId, usize>,
    pub commands: Vec<Command>,
    /// Number of successful `create_program` calls.
    pub programs_created: usize,
    /// Index written by vertex/instance pick programs.
    pub pick_index: u32,
    current_program: Option<ProgramId>,
    current_framebuffer: Option<FramebufferId>,
    uniforms: HashMap<String, UniformValue>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self {
            next_handle: 1,
            ..Default::default()
        }
    }

    pub fn with_capabilities(capabilities: DeviceCapabilities) -> Self {
        Self {
            capabilities,
            ..Self::new()
        }
    }

    fn handle(&mut self) -> u32 {
        self.next_handle = self.next_handle.max(1);
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::Draw(_)))
            .count()
    }

    pub fn count(&self, predicate: impl Fn(&Command) -> bool) -> usize {
        self.commands.iter().filter(|c| predicate(c)).count()
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    pub fn pixel(&self, texture: TextureId) -> Option<[u8; 4]> {
        self.textures.get(&texture).map(|t| t.color)
    }

    /// Render passes recorded since the last `clear_commands`.
    pub fn render_passes(&self) -> Vec<(FramebufferId, Vec<Option<Vec4>>, bool)> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                Command::BeginRenderPass {
                    framebuffer,
                    color_clears,
                    depth_clear,
                } => Some((*framebuffer, color_clears.clone(), *depth_clear)),
                _ => None,
            })
            .collect()
    }

    fn paint_color(&self) -> [u8; 4] {
        let Some(program) = self.current_program.and_then(|p| self.programs.get(&p)) else {
            return DRAW_COLOR;
        };
        if program.fragment == DEBUG_ID_FRAGMENT {
            match self.uniforms.get(PICK_COLOR_UNIFORM) {
                Some(UniformValue::Vec3(c)) => [to_byte(c.x), to_byte(c.y), to_byte(c.z), 255],
                _ => [0, 0, 0, 255],
            }
        } else if program.fragment == PICK_INDEX_FRAGMENT {
            let encoded = self.pick_index + 1;
            [
                (encoded & 0xFF) as u8,
                ((encoded >> 8) & 0xFF) as u8,
                ((encoded >> 16) & 0xFF) as u8,
                255,
            ]
        } else {
            DRAW_COLOR
        }
    }

    fn fail_line(source: &str) -> Option<usize> {
        source
            .lines()
            .position(|l| l.contains(FAIL_MARKER))
            .map(|i| i + 1)
    }
}

fn to_byte(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

impl GpuDevice for MockDevice {
    fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    fn create_texture(&mut self, desc: &TextureDescriptor<'_>) -> Result<TextureId, DeviceError> {
        let id = TextureId::from_raw(self.handle());
        self.textures.insert(
            id,
            MockTexture {
                label: desc.label.unwrap_or_default().to_owned(),
                size: desc.size,
                samples: desc.samples,
                color: [0; 4],
            },
        );
        Ok(id)
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        self.textures.remove(&texture);
    }

    fn create_buffer(&mut self, _desc: &BufferDescriptor<'_>, contents: &[u8]) -> Result<BufferId, DeviceError> {
        let id = BufferId::from_raw(self.handle());
        self.buffers.insert(id, contents.len());
        Ok(id)
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        self.buffers.remove(&buffer);
    }

    fn create_program(&mut self, desc: &ProgramDescriptor<'_>) -> Result<ProgramId, CompileError> {
        let program = match desc.stages {
            ProgramStages::Graphics {
                vertex,
                fragment,
                geometry,
            } => {
                let stages = [
                    (ShaderStage::Vertex, Some(vertex.source)),
                    (ShaderStage::Fragment, Some(fragment.source)),
                    (ShaderStage::Geometry, geometry.map(|g| g.source)),
                ];
                for (stage, source) in stages {
                    if let Some(line) = source.and_then(Self::fail_line) {
                        return Err(CompileError::new(stage, format!("ERROR: 0:{line}: forced failure")));
                    }
                }
                MockProgram {
                    vertex: vertex.source.to_owned(),
                    fragment: fragment.source.to_owned(),
                    geometry: geometry.map(|g| g.source.to_owned()),
                    compute: None,
                }
            }
            ProgramStages::Compute(stage) => {
                if let Some(line) = Self::fail_line(stage.source) {
                    return Err(CompileError::new(
                        ShaderStage::Compute,
                        format!("ERROR: 0:{line}: forced failure"),
                    ));
                }
                MockProgram {
                    vertex: String::new(),
                    fragment: String::new(),
                    geometry: None,
                    compute: Some(stage.source.to_owned()),
                }
            }
        };

        let id = ProgramId::from_raw(self.handle());
        self.programs.insert(id, program);
        self.programs_created += 1;
        Ok(id)
    }

    fn destroy_program(&mut self, program: ProgramId) {
        self.programs.remove(&program);
    }

    fn create_framebuffer(&mut self, desc: &FramebufferDescriptor<'_>) -> Result<FramebufferId, DeviceError> {
        let id = FramebufferId::from_raw(self.handle());
        self.framebuffers.insert(
            id,
            MockFramebuffer {
                colors: desc.color_attachments.to_vec(),
                depth: desc.depth_stencil,
            },
        );
        Ok(id)
    }

    fn framebuffer_status(&self, framebuffer: FramebufferId) -> FramebufferStatus {
        match self.framebuffers.get(&framebuffer) {
            Some(fb) if fb.colors.iter().flatten().all(|t| self.textures.contains_key(t)) => {
                FramebufferStatus::Complete
            }
            _ => FramebufferStatus::Incomplete("missing attachment".into()),
        }
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferId) {
        self.framebuffers.remove(&framebuffer);
    }

    fn begin_render_pass(&mut self, desc: &RenderPassDescriptor<'_>) {
        self.current_framebuffer = Some(desc.framebuffer);
        if let Some(fb) = self.framebuffers.get(&desc.framebuffer) {
            for (attachment, clear) in fb.colors.iter().zip(&desc.color_clears) {
                if let (Some(texture), Some(color)) = (attachment, clear)
                    && let Some(texture) = self.textures.get_mut(texture)
                {
                    texture.color = [to_byte(color.x), to_byte(color.y), to_byte(color.z), to_byte(color.w)];
                }
            }
        }
        self.commands.push(Command::BeginRenderPass {
            framebuffer: desc.framebuffer,
            color_clears: desc.color_clears.to_vec(),
            depth_clear: desc.depth_stencil_clear.is_some(),
        });
    }

    fn end_render_pass(&mut self) {
        self.current_framebuffer = None;
        self.commands.push(Command::EndRenderPass);
    }

    fn set_viewport(&mut self, size: UVec2) {
        self.commands.push(Command::Viewport(size));
    }

    fn use_program(&mut self, program: ProgramId) {
        self.current_program = Some(program);
        self.uniforms.clear();
        self.commands.push(Command::UseProgram(program));
    }

    fn set_uniform(&mut self, name: &str, value: &UniformValue) {
        self.uniforms.insert(name.to_owned(), *value);
        self.commands.push(Command::Uniform(name.to_owned(), *value));
    }

    fn bind_texture(&mut self, slot: u32, texture: TextureId, _kind: TextureKind) {
        self.commands.push(Command::BindTexture(slot, texture));
    }

    fn bind_uniform_buffer(&mut self, slot: u32, buffer: BufferId) {
        self.commands.push(Command::BindUniformBuffer(slot, buffer));
    }

    fn bind_storage_buffer(&mut self, slot: u32, buffer: BufferId) {
        self.commands.push(Command::BindStorageBuffer(slot, buffer));
    }

    fn bind_image(&mut self, slot: u32, texture: TextureId, _format: TextureFormat, _layered: bool) {
        self.commands.push(Command::BindTexture(slot, texture));
    }

    fn reset_render_state(&mut self) {
        self.commands.push(Command::ResetState);
    }

    fn apply_render_state(&mut self, state: &RenderState) {
        self.commands.push(Command::ApplyState(state.clone()));
    }

    fn draw(&mut self, call: &DrawCall) {
        let color = self.paint_color();
        if let Some(fb) = self.current_framebuffer.and_then(|f| self.framebuffers.get(&f)) {
            for texture in fb.colors.iter().flatten() {
                if let Some(texture) = self.textures.get_mut(texture) {
                    texture.color = color;
                }
            }
        }
        self.commands.push(Command::Draw(*call));
    }

    fn resolve_framebuffer(
        &mut self,
        source: FramebufferId,
        destination: FramebufferId,
        attachments: u32,
        _size: UVec2,
    ) {
        if let (Some(src), Some(dst)) = (
            self.framebuffers.get(&source).cloned(),
            self.framebuffers.get(&destination).cloned(),
        ) {
            for i in 0..attachments as usize {
                let color = src.colors.get(i).copied().flatten().and_then(|t| self.pixel(t));
                let target = dst.colors.get(i).copied().flatten();
                if let (Some(color), Some(target)) = (color, target)
                    && let Some(texture) = self.textures.get_mut(&target)
                {
                    texture.color = color;
                }
            }
        }
        self.commands.push(Command::Resolve {
            source,
            destination,
            attachments,
        });
    }

    fn dispatch_compute(&mut self, groups: UVec3) {
        self.commands.push(Command::Dispatch(groups));
    }

    fn memory_barrier(&mut self, barriers: MemoryBarrier) {
        self.commands.push(Command::Barrier(barriers));
    }

    fn read_pixel(&mut self, texture: TextureId, _position: UVec2) -> Result<[u8; 4], DeviceError> {
        self.pixel(texture).ok_or(DeviceError::InvalidHandle("texture"))
    }

    fn finish_frame(&mut self) {
        self.current_framebuffer = None;
        self.commands.push(Command::FinishFrame);
    }
}

// ============================================================================
// MemoryProject
// ============================================================================

/// Shader files kept in memory. Clones share the same files.
#[derive(Debug, Clone, Default)]
pub struct MemoryProject {
    files: Rc<RefCell<HashMap<PathBuf, String>>>,
}

impl MemoryProject {
    pub fn with_files(files: &[(&str, &str)]) -> Self {
        let project = Self::default();
        for (path, source) in files {
            project.write(path, source);
        }
        project
    }

    pub fn write(&self, path: &str, source: &str) {
        self.files
            .borrow_mut()
            .insert(normalize_path(Path::new(path)), source.to_owned());
    }
}

impl ProjectFiles for MemoryProject {
    fn resolve(&self, path: &Path) -> PathBuf {
        normalize_path(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.borrow().contains_key(&normalize_path(path))
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files
            .borrow()
            .get(&normalize_path(path))
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))
    }
}

// ============================================================================
// TestRegistry
// ============================================================================

const PLACEHOLDER: TextureId = TextureId::from_raw(u32::MAX);

#[derive(Debug, Default)]
pub struct TestRegistry {
    textures: Vec<(RenderTextureId, RenderTexture)>,
    bindings: HashMap<ItemId, Vec<ResourceBinding>>,
    uniform_buffers: HashMap<ItemId, Vec<BufferId>>,
}

impl TestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a window-sized render texture. Its images are created by the
    /// engine's first resize.
    pub fn add_render_texture(&mut self, name: &str, clear: bool, clear_color: Vec4) -> RenderTextureId {
        let id = RenderTextureId(self.textures.len() as u32 + 1);
        self.textures.push((
            id,
            RenderTexture {
                name: name.to_owned(),
                color: PLACEHOLDER,
                depth: PLACEHOLDER,
                color_ms: None,
                depth_ms: None,
                format: TextureFormat::Rgba8Unorm,
                fixed_size: None,
                ratio: Vec2::ONE,
                clear,
                clear_color,
            },
        ));
        id
    }

    pub fn bind(&mut self, item: ItemId, binding: ResourceBinding) {
        self.bindings.entry(item).or_default().push(binding);
    }

    pub fn bind_uniform_buffer(&mut self, item: ItemId, buffer: BufferId) {
        self.uniform_buffers.entry(item).or_default().push(buffer);
    }
}

impl ObjectRegistry for TestRegistry {
    fn render_texture(&self, id: RenderTextureId) -> Option<&RenderTexture> {
        self.textures.iter().find(|(i, _)| *i == id).map(|(_, rt)| rt)
    }

    fn render_textures(&self) -> Vec<RenderTextureId> {
        self.textures.iter().map(|(id, _)| *id).collect()
    }

    fn resize_render_texture(
        &mut self,
        device: &mut dyn GpuDevice,
        id: RenderTextureId,
        size: UVec2,
        samples: u32,
    ) -> Result<(), DeviceError> {
        let Some((_, rt)) = self.textures.iter_mut().find(|(i, _)| *i == id) else {
            return Err(DeviceError::InvalidHandle("render texture"));
        };

        for texture in [Some(rt.color), Some(rt.depth), rt.color_ms, rt.depth_ms]
            .into_iter()
            .flatten()
        {
            device.destroy_texture(texture);
        }

        rt.color = device.create_texture(&TextureDescriptor::attachment(&rt.name, size, rt.format))?;
        rt.depth = device.create_texture(&TextureDescriptor::attachment(
            &rt.name,
            size,
            TextureFormat::Depth24PlusStencil8,
        ))?;
        if samples > 1 {
            rt.color_ms = Some(device.create_texture(
                &TextureDescriptor::attachment(&rt.name, size, rt.format).with_samples(samples),
            )?);
            rt.depth_ms = Some(device.create_texture(
                &TextureDescriptor::attachment(&rt.name, size, TextureFormat::Depth24PlusStencil8)
                    .with_samples(samples),
            )?);
        } else {
            rt.color_ms = None;
            rt.depth_ms = None;
        }
        Ok(())
    }

    fn bind_list(&self, item: ItemId) -> Vec<ResourceBinding> {
        self.bindings.get(&item).cloned().unwrap_or_default()
    }

    fn uniform_bind_list(&self, item: ItemId) -> Vec<BufferId> {
        self.uniform_buffers.get(&item).cloned().unwrap_or_default()
    }
}

// ============================================================================
// Harness
// ============================================================================

/// Settings used by most tests: reconcile on every frame.
pub fn test_settings() -> EngineSettings {
    EngineSettings {
        cache_debounce: Duration::ZERO,
        ..Default::default()
    }
}

pub fn default_project() -> MemoryProject {
    MemoryProject::with_files(&[("simple.vert", VERTEX_SHADER), ("simple.frag", FRAGMENT_SHADER)])
}

pub fn engine_with(
    project: &MemoryProject,
    registry: TestRegistry,
    settings: EngineSettings,
) -> RenderEngine<MockDevice> {
    init_logger();
    let services = EngineServices::new(Box::new(project.clone()), Box::new(registry));
    RenderEngine::new(MockDevice::new(), services, settings)
}

pub fn engine() -> (RenderEngine<MockDevice>, MemoryProject) {
    let project = default_project();
    let engine = engine_with(&project, TestRegistry::new(), test_settings());
    (engine, project)
}

/// Adds a pass reading `simple.vert` / `simple.frag` and rendering into
/// `targets`.
pub fn add_pass(pipeline: &mut Pipeline, name: &str, targets: &[RenderTargetRef]) -> ItemId {
    let mut pass = ShaderPass::new(
        ShaderStageDesc::new("simple.vert", "main"),
        ShaderStageDesc::new("simple.frag", "main"),
    );
    pass.set_targets(targets);
    pipeline.add(name, ItemKind::ShaderPass(pass))
}

pub fn add_cube(pipeline: &mut Pipeline, pass: ItemId, name: &str, position: glam::Vec3) -> ItemId {
    pipeline
        .add_child(
            pass,
            name,
            ItemKind::Geometry(GeometryItem::new(GeometryShape::Cube, glam::Vec3::ONE).with_position(position)),
        )
        .expect("pass accepts children")
}
