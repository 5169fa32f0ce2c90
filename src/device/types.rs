//! Backend-agnostic resource and command descriptors.

use bitflags::bitflags;
use glam::{UVec2, Vec4};
use smallvec::SmallVec;

use super::handles::{BufferId, FramebufferId, TextureId};

// ─── Capabilities ────────────────────────────────────────────────────────────

/// Optional features of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCapabilities {
    pub compute: bool,
    pub geometry_stage: bool,
    pub max_samples: u32,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            compute: true,
            geometry_stage: true,
            max_samples: 8,
        }
    }
}

// ─── Textures ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgb8Unorm,
    Rgba8Unorm,
    Rgba16Float,
    Rgba32Float,
    R32Float,
    R32Uint,
    Depth24PlusStencil8,
}

impl TextureFormat {
    #[must_use]
    pub fn is_depth_stencil(self) -> bool {
        matches!(self, Self::Depth24PlusStencil8)
    }
}

/// How a texture is sampled when bound to a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    D2,
    Cube,
    D3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureDescriptor<'a> {
    pub label: Option<&'a str>,
    pub size: UVec2,
    pub format: TextureFormat,
    pub kind: TextureKind,
    /// Multisample count; `1` for regular textures.
    pub samples: u32,
}

impl<'a> TextureDescriptor<'a> {
    /// A single-sampled 2D render attachment.
    #[must_use]
    pub fn attachment(label: &'a str, size: UVec2, format: TextureFormat) -> Self {
        Self {
            label: Some(label),
            size,
            format,
            kind: TextureKind::D2,
            samples: 1,
        }
    }

    #[must_use]
    pub fn with_samples(mut self, samples: u32) -> Self {
        self.samples = samples;
        self
    }
}

// ─── Buffers ─────────────────────────────────────────────────────────────────

bitflags! {
    /// Intended uses of a buffer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const VERTEX  = 1 << 0;
        const UNIFORM = 1 << 1;
        const STORAGE = 1 << 2;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BufferDescriptor<'a> {
    pub label: Option<&'a str>,
    pub usage: BufferUsage,
}

// ─── Programs ────────────────────────────────────────────────────────────────

/// Final source text of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageSource<'a> {
    pub source: &'a str,
    pub entry: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramStages<'a> {
    Graphics {
        vertex: StageSource<'a>,
        fragment: StageSource<'a>,
        geometry: Option<StageSource<'a>>,
    },
    Compute(StageSource<'a>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramDescriptor<'a> {
    pub label: Option<&'a str>,
    pub stages: ProgramStages<'a>,
}

// ─── Framebuffers ────────────────────────────────────────────────────────────

/// Color attachments indexed by attachment slot; `None` leaves a slot empty.
pub type ColorAttachments = SmallVec<[Option<TextureId>; 4]>;

#[derive(Debug, Clone, PartialEq)]
pub struct FramebufferDescriptor<'a> {
    pub label: Option<&'a str>,
    pub color_attachments: ColorAttachments,
    pub depth_stencil: Option<TextureId>,
}

/// Result of a framebuffer completeness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramebufferStatus {
    Complete,
    Incomplete(String),
}

impl FramebufferStatus {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

// ─── Commands ────────────────────────────────────────────────────────────────

/// Depth/stencil clear values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthStencilClear {
    pub depth: f32,
    pub stencil: u32,
}

impl Default for DepthStencilClear {
    fn default() -> Self {
        Self {
            depth: 1.0,
            stencil: 0,
        }
    }
}

/// Opens a render pass on a framebuffer.
///
/// `color_clears[i]` clears attachment `i` when set; attachments without a
/// clear keep their previous contents.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPassDescriptor<'a> {
    pub label: Option<&'a str>,
    pub framebuffer: FramebufferId,
    pub color_clears: SmallVec<[Option<Vec4>; 4]>,
    pub depth_stencil_clear: Option<DepthStencilClear>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    #[default]
    TriangleList,
    TriangleStrip,
}

/// A non-indexed draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCall {
    pub vertex_buffer: Option<BufferId>,
    pub instance_buffer: Option<BufferId>,
    pub topology: PrimitiveTopology,
    pub vertex_count: u32,
    /// `None` issues a non-instanced draw.
    pub instance_count: Option<u32>,
}

bitflags! {
    /// Hazards a memory barrier waits on.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemoryBarrier: u32 {
        const VERTEX_ATTRIB_ARRAY = 1 << 0;
        const UNIFORM             = 1 << 1;
        const SHADER_STORAGE      = 1 << 2;
        const SHADER_IMAGE_ACCESS = 1 << 3;

        /// Everything a compute dispatch can write and a later pass can read.
        const COMPUTE_WRITES = Self::VERTEX_ATTRIB_ARRAY.bits()
            | Self::UNIFORM.bits()
            | Self::SHADER_STORAGE.bits()
            | Self::SHADER_IMAGE_ACCESS.bits();
    }
}
