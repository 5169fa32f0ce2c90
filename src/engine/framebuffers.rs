//! Framebuffer Manager
//!
//! Keeps the framebuffers of every shader pass in line with its render
//! target array. A pass owns a primary framebuffer and, when every target
//! has a multisampled companion, a multisampled one that is resolved into
//! the primary after drawing.
//!
//! A pass is rebuilt when any of these changed since its last build:
//!
//! - the bound targets or their count
//! - the textures the targets resolve to (a render texture was resized)
//! - the manager generation (bumped by a window resize or a cache flush)

use glam::UVec2;

use super::window::WindowTargets;
use crate::device::{
    ColorAttachments, FramebufferDescriptor, FramebufferId, GpuDevice, TextureId,
};
use crate::pipeline::{RenderTargetRef, RenderTargets, ShaderPass};
use crate::services::ObjectRegistry;

/// Textures backing one color target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub color: TextureId,
    pub depth: TextureId,
    pub color_ms: Option<TextureId>,
    pub depth_ms: Option<TextureId>,
    pub size: UVec2,
}

/// Looks up the textures behind a target.
#[must_use]
pub fn resolve_target(
    target: RenderTargetRef,
    window: &WindowTargets,
    objects: &dyn ObjectRegistry,
) -> Option<ResolvedTarget> {
    match target {
        RenderTargetRef::Window => Some(ResolvedTarget {
            color: window.color,
            depth: window.depth,
            color_ms: window.color_ms,
            depth_ms: window.depth_ms,
            size: window.size,
        }),
        RenderTargetRef::Texture(id) => objects.render_texture(id).map(|rt| ResolvedTarget {
            color: rt.color,
            depth: rt.depth,
            color_ms: rt.color_ms,
            depth_ms: rt.depth_ms,
            size: rt.calculate_size(window.size),
        }),
    }
}

/// Framebuffers of one shader pass and the state they were built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassFramebuffers {
    pub primary: FramebufferId,
    pub multisampled: Option<FramebufferId>,
    /// Depth buffer attached to the primary framebuffer.
    pub depth: Option<TextureId>,
    pub targets: RenderTargets,
    pub count: usize,
    /// Color textures the targets resolved to.
    pub attachments: ColorAttachments,
    pub generation: u64,
}

impl PassFramebuffers {
    pub fn release(self, device: &mut dyn GpuDevice) {
        device.destroy_framebuffer(self.primary);
        if let Some(framebuffer) = self.multisampled {
            device.destroy_framebuffer(framebuffer);
        }
    }
}

#[derive(Debug, Default)]
pub struct FramebufferManager {
    generation: u64,
}

impl FramebufferManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forces every pass to rebuild before its next draw.
    pub fn invalidate(&mut self) {
        self.generation += 1;
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Rebuilds `slot` if it no longer matches `pass`. Returns whether a
    /// rebuild happened.
    pub fn ensure(
        &self,
        device: &mut dyn GpuDevice,
        objects: &dyn ObjectRegistry,
        window: &WindowTargets,
        label: &str,
        pass: &ShaderPass,
        slot: &mut Option<PassFramebuffers>,
    ) -> bool {
        let resolved: Vec<Option<ResolvedTarget>> = pass
            .targets()
            .map(|t| resolve_target(t, window, objects))
            .collect();
        let attachments: ColorAttachments = resolved.iter().map(|r| r.map(|r| r.color)).collect();

        let up_to_date = slot.as_ref().is_some_and(|fb| {
            fb.generation == self.generation
                && fb.count == pass.target_count()
                && fb.targets == pass.render_targets
                && fb.attachments == attachments
        });
        if up_to_date {
            return false;
        }

        if let Some(old) = slot.take() {
            old.release(device);
        }
        *slot = self.build(device, label, pass, &resolved, attachments);
        true
    }

    fn build(
        &self,
        device: &mut dyn GpuDevice,
        label: &str,
        pass: &ShaderPass,
        resolved: &[Option<ResolvedTarget>],
        attachments: ColorAttachments,
    ) -> Option<PassFramebuffers> {
        let last = resolved.last().copied().flatten();
        let depth = last.map(|t| t.depth);

        let desc = FramebufferDescriptor {
            label: Some(label),
            color_attachments: attachments.clone(),
            depth_stencil: depth,
        };
        let primary = match device.create_framebuffer(&desc) {
            Ok(framebuffer) => framebuffer,
            Err(err) => {
                log::error!("Failed to create framebuffer for '{label}': {err}");
                return None;
            }
        };
        check_status(device, primary, label);

        let ms_attachments: Option<ColorAttachments> = resolved
            .iter()
            .map(|r| r.and_then(|r| r.color_ms).map(Some))
            .collect();
        let multisampled = match (ms_attachments, last.and_then(|t| t.depth_ms)) {
            (Some(color_attachments), Some(depth_ms)) => {
                let desc = FramebufferDescriptor {
                    label: Some(label),
                    color_attachments,
                    depth_stencil: Some(depth_ms),
                };
                match device.create_framebuffer(&desc) {
                    Ok(framebuffer) => {
                        check_status(device, framebuffer, label);
                        Some(framebuffer)
                    }
                    Err(err) => {
                        log::error!("Failed to create multisampled framebuffer for '{label}': {err}");
                        None
                    }
                }
            }
            _ => None,
        };

        log::debug!(
            "Framebuffers of '{label}' rebuilt with {} target(s){}",
            pass.target_count(),
            if multisampled.is_some() { ", multisampled" } else { "" }
        );

        Some(PassFramebuffers {
            primary,
            multisampled,
            depth,
            targets: pass.render_targets,
            count: pass.target_count(),
            attachments,
            generation: self.generation,
        })
    }
}

fn check_status(device: &dyn GpuDevice, framebuffer: FramebufferId, label: &str) {
    if let crate::device::FramebufferStatus::Incomplete(reason) = device.framebuffer_status(framebuffer) {
        log::warn!("Framebuffer of '{label}' is incomplete: {reason}");
    }
}
