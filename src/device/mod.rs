//! GPU Device Abstraction
//!
//! The engine talks to the GPU exclusively through [`GpuDevice`]. Handles are
//! small `Copy` newtypes; descriptors borrow their labels so call sites do not
//! allocate.
//!
//! The `wgpu` feature adds [`wgpu::WgpuDevice`], a backend built on `wgpu`
//! that accepts GL-style GLSL through naga.

pub mod handles;
pub mod traits;
pub mod types;

#[cfg(feature = "wgpu")]
pub mod wgpu;

pub use handles::{BufferId, FramebufferId, ProgramId, TextureId};
pub use traits::GpuDevice;
pub use types::{
    BufferDescriptor, BufferUsage, ColorAttachments, DepthStencilClear, DeviceCapabilities,
    DrawCall, FramebufferDescriptor, FramebufferStatus, MemoryBarrier, PrimitiveTopology,
    ProgramDescriptor, ProgramStages, RenderPassDescriptor, StageSource, TextureDescriptor,
    TextureFormat, TextureKind,
};
