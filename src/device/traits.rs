use glam::{UVec2, UVec3};

use super::handles::{BufferId, FramebufferId, ProgramId, TextureId};
use super::types::{
    BufferDescriptor, DeviceCapabilities, DrawCall, FramebufferDescriptor, FramebufferStatus,
    MemoryBarrier, ProgramDescriptor, RenderPassDescriptor, TextureDescriptor, TextureFormat,
    TextureKind,
};
use crate::errors::{CompileError, DeviceError};
use crate::pipeline::{RenderState, UniformValue};

/// The GPU seam of the engine.
///
/// The engine records every frame through this trait and never touches a
/// graphics API directly. Implementations own all GPU objects and hand out
/// opaque handles for them.
///
/// Commands are issued in this order within a frame:
///
/// ```text
/// begin_render_pass ─► set_viewport ─► use_program ─► bind_* ─► reset_render_state
///      ─► { apply_render_state | set_uniform | draw }* ─► end_render_pass
///      ─► resolve_framebuffer?
/// use_program ─► bind_* ─► dispatch_compute ─► memory_barrier
/// ...
/// finish_frame
/// ```
///
/// The trait is object safe: plugins and registries receive
/// `&mut dyn GpuDevice`.
pub trait GpuDevice {
    /// Optional features this device supports.
    fn capabilities(&self) -> DeviceCapabilities;

    // ── Resources ────────────────────────────────────────────────────────────

    fn create_texture(&mut self, desc: &TextureDescriptor<'_>) -> Result<TextureId, DeviceError>;

    fn destroy_texture(&mut self, texture: TextureId);

    /// Creates a buffer initialized with `contents`.
    fn create_buffer(
        &mut self,
        desc: &BufferDescriptor<'_>,
        contents: &[u8],
    ) -> Result<BufferId, DeviceError>;

    fn destroy_buffer(&mut self, buffer: BufferId);

    /// Compiles and links all stages of a program.
    ///
    /// # Returns
    ///
    /// The program handle, or the first failing stage with its compiler log.
    fn create_program(&mut self, desc: &ProgramDescriptor<'_>) -> Result<ProgramId, CompileError>;

    fn destroy_program(&mut self, program: ProgramId);

    fn create_framebuffer(
        &mut self,
        desc: &FramebufferDescriptor<'_>,
    ) -> Result<FramebufferId, DeviceError>;

    /// Completeness check. Incomplete framebuffers can still be bound; draws
    /// into them are undefined.
    fn framebuffer_status(&self, framebuffer: FramebufferId) -> FramebufferStatus;

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferId);

    // ── Render passes ────────────────────────────────────────────────────────

    /// Binds a framebuffer and applies the requested clears.
    fn begin_render_pass(&mut self, desc: &RenderPassDescriptor<'_>);

    fn end_render_pass(&mut self);

    fn set_viewport(&mut self, size: UVec2);

    /// Makes `program` current for subsequent binds, uniforms, draws and
    /// dispatches.
    fn use_program(&mut self, program: ProgramId);

    /// Sets a uniform of the current program by name. Unknown names are
    /// ignored.
    fn set_uniform(&mut self, name: &str, value: &UniformValue);

    fn bind_texture(&mut self, slot: u32, texture: TextureId, kind: TextureKind);

    fn bind_uniform_buffer(&mut self, slot: u32, buffer: BufferId);

    fn bind_storage_buffer(&mut self, slot: u32, buffer: BufferId);

    /// Binds a texture for image load/store. `layered` binds every layer of a
    /// volume texture.
    fn bind_image(&mut self, slot: u32, texture: TextureId, format: TextureFormat, layered: bool);

    /// Restores the default fixed-function state.
    fn reset_render_state(&mut self);

    fn apply_render_state(&mut self, state: &RenderState);

    fn draw(&mut self, call: &DrawCall);

    /// Copies the first `attachments` color attachments of a multisampled
    /// framebuffer into the matching attachments of a single-sampled one.
    fn resolve_framebuffer(
        &mut self,
        source: FramebufferId,
        destination: FramebufferId,
        attachments: u32,
        size: UVec2,
    );

    // ── Compute ──────────────────────────────────────────────────────────────

    /// Dispatches the current compute program.
    fn dispatch_compute(&mut self, groups: UVec3);

    fn memory_barrier(&mut self, barriers: MemoryBarrier);

    // ── Frame ────────────────────────────────────────────────────────────────

    /// Reads one texel, blocking until all previously issued work completed.
    /// Rows count from the bottom of the texture, as in GL.
    fn read_pixel(&mut self, texture: TextureId, position: UVec2) -> Result<[u8; 4], DeviceError>;

    /// Submits the frame's work and unbinds every framebuffer.
    fn finish_frame(&mut self);
}
