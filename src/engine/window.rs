use glam::UVec2;

use crate::device::{GpuDevice, TextureDescriptor, TextureFormat, TextureId};
use crate::errors::DeviceError;
use crate::settings::EngineSettings;

/// Format of the shared depth/stencil buffers.
pub const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth24PlusStencil8;

/// The shared window surface: the textures a pass renders to when one of
/// its targets is [`RenderTargetRef::Window`](crate::pipeline::RenderTargetRef::Window).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowTargets {
    pub size: UVec2,
    pub format: TextureFormat,
    pub color: TextureId,
    pub depth: TextureId,
    /// Multisampled companions, present when MSAA is enabled.
    pub color_ms: Option<TextureId>,
    pub depth_ms: Option<TextureId>,
}

impl WindowTargets {
    /// Creates the window textures at `size`.
    pub fn create(
        device: &mut dyn GpuDevice,
        size: UVec2,
        settings: &EngineSettings,
    ) -> Result<Self, DeviceError> {
        let size = size.max(UVec2::ONE);
        let format = if settings.use_alpha_channel {
            TextureFormat::Rgba8Unorm
        } else {
            TextureFormat::Rgb8Unorm
        };

        let color = device.create_texture(&TextureDescriptor::attachment("Window Color", size, format))?;
        let depth = device.create_texture(&TextureDescriptor::attachment("Window Depth", size, DEPTH_FORMAT))?;

        let (color_ms, depth_ms) = if settings.msaa_enabled() {
            let samples = settings.msaa_samples.min(device.capabilities().max_samples);
            let color_ms = device.create_texture(
                &TextureDescriptor::attachment("Window Color MS", size, format).with_samples(samples),
            )?;
            let depth_ms = device.create_texture(
                &TextureDescriptor::attachment("Window Depth MS", size, DEPTH_FORMAT).with_samples(samples),
            )?;
            (Some(color_ms), Some(depth_ms))
        } else {
            (None, None)
        };

        log::debug!("Window targets created at {}x{}", size.x, size.y);

        Ok(Self {
            size,
            format,
            color,
            depth,
            color_ms,
            depth_ms,
        })
    }

    pub fn destroy(self, device: &mut dyn GpuDevice) {
        device.destroy_texture(self.color);
        device.destroy_texture(self.depth);
        if let Some(texture) = self.color_ms {
            device.destroy_texture(texture);
        }
        if let Some(texture) = self.depth_ms {
            device.destroy_texture(texture);
        }
    }
}
