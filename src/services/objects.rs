//! Object registry interface.
//!
//! Render textures, sampled textures, buffers and plugin objects are owned by
//! the host's object manager. The engine only needs to resolve the render
//! textures a pass writes to and the objects bound to a pass before drawing.

use glam::{UVec2, Vec2, Vec4};

use super::plugin::PluginRef;
use crate::device::{BufferId, GpuDevice, TextureFormat, TextureId};
use crate::errors::DeviceError;
use crate::pipeline::ItemId;

/// Registry handle of a render texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderTextureId(pub u32);

/// A texture a shader pass can render into.
///
/// `color` and `depth` are the single-sampled images sampled by later passes;
/// `color_ms` and `depth_ms` are their multisampled companions, present when
/// MSAA is enabled.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTexture {
    pub name: String,
    pub color: TextureId,
    pub depth: TextureId,
    pub color_ms: Option<TextureId>,
    pub depth_ms: Option<TextureId>,
    pub format: TextureFormat,
    /// Fixed pixel size. `None` sizes the texture relative to the window.
    pub fixed_size: Option<UVec2>,
    /// Fraction of the window size used when `fixed_size` is `None`.
    pub ratio: Vec2,
    /// Whether the texture is cleared when a pass starts writing to it.
    pub clear: bool,
    pub clear_color: Vec4,
}

impl RenderTexture {
    /// Pixel size of the texture for a window of `window` pixels.
    #[must_use]
    pub fn calculate_size(&self, window: UVec2) -> UVec2 {
        match self.fixed_size {
            Some(size) => size,
            None => (self.ratio * window.as_vec2()).as_uvec2().max(UVec2::ONE),
        }
    }

    /// Whether the texture follows the window size.
    #[inline]
    #[must_use]
    pub fn is_auto_sized(&self) -> bool {
        self.fixed_size.is_none()
    }
}

/// A plugin-owned object bound to a pass.
#[derive(Debug, Clone)]
pub struct PluginObject {
    pub owner: PluginRef,
    pub object_type: String,
    pub id: u64,
}

/// An object bound to a pass, in slot order.
#[derive(Debug, Clone)]
pub enum ResourceBinding {
    Texture(TextureId),
    CubeMap(TextureId),
    Texture3D(TextureId),
    /// Image load/store binding of a 2D texture.
    Image {
        texture: TextureId,
        format: TextureFormat,
    },
    /// Image load/store binding of every layer of a volume texture.
    Image3D {
        texture: TextureId,
        format: TextureFormat,
    },
    /// Shader storage buffer.
    Buffer(BufferId),
    Plugin(PluginObject),
}

/// Host-side registry of every project object.
pub trait ObjectRegistry {
    fn render_texture(&self, id: RenderTextureId) -> Option<&RenderTexture>;

    /// Every render texture, in creation order.
    fn render_textures(&self) -> Vec<RenderTextureId>;

    /// Recreates the images of a render texture at `size`, with MSAA
    /// companions of `samples` samples when `samples > 1`.
    fn resize_render_texture(
        &mut self,
        device: &mut dyn GpuDevice,
        id: RenderTextureId,
        size: UVec2,
        samples: u32,
    ) -> Result<(), DeviceError>;

    /// Objects bound to `item`, in slot order.
    fn bind_list(&self, item: ItemId) -> Vec<ResourceBinding>;

    /// Uniform buffers bound to `item`, in slot order.
    fn uniform_bind_list(&self, item: ItemId) -> Vec<BufferId>;
}
