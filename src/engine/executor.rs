//! Frame Executor
//!
//! Walks the cached records in pipeline order and records one frame through
//! the [`GpuDevice`]. The executor borrows everything it touches for the
//! duration of a single frame; all persistent state lives in the engine.
//!
//! ```text
//! record ─► ShaderPass ─► framebuffers ─► clears ─► bind ─► { state | draw }* ─► resolve
//!        ├► ComputePass ─► bind ─► dispatch ─► barrier
//!        ├► AudioPass ─► bind ─► stream.render
//!        └► Plugin ─► owner.execute_item
//! ```

use glam::{Mat4, UVec2, Vec4};
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use super::cache::{CachedResources, ComputeResources, PassResources, ResourceCache};
use super::context::FrameContext;
use super::framebuffers::FramebufferManager;
use super::window::WindowTargets;
use crate::device::{
    DepthStencilClear, DeviceCapabilities, DrawCall, GpuDevice, MemoryBarrier,
    RenderPassDescriptor, TextureId, TextureKind,
};
use crate::picking::{DebugIdMap, PickSession, Selection, encode_id};
use crate::pipeline::variables::{apply_overrides, restore_overrides};
use crate::pipeline::{
    AudioPass, ComputePass, ItemId, ItemKind, ItemVariableValue, MAX_RENDER_TARGETS, Pipeline,
    PipelineItem, RenderTargetRef, RenderTargets, ShaderPass, UniformValue, VariableTable,
};
use crate::services::{ObjectRegistry, ResourceBinding};
use crate::settings::EngineSettings;
use crate::shader::PICK_COLOR_UNIFORM;

/// Clear bookkeeping for one frame.
#[derive(Debug)]
struct ClearState {
    window_cleared: bool,
    cleared_depths: FxHashSet<TextureId>,
    /// Targets of the last shader pass that rendered.
    previous_targets: RenderTargets,
}

impl Default for ClearState {
    fn default() -> Self {
        Self {
            window_cleared: false,
            cleared_depths: FxHashSet::default(),
            previous_targets: [None; MAX_RENDER_TARGETS],
        }
    }
}

/// Borrowed engine state for one frame.
pub(crate) struct FrameExecutor<'a> {
    pub device: &'a mut dyn GpuDevice,
    pub objects: &'a dyn ObjectRegistry,
    pub settings: &'a EngineSettings,
    pub capabilities: DeviceCapabilities,
    pub window: &'a WindowTargets,
    pub framebuffers: &'a FramebufferManager,
    pub context: &'a mut FrameContext,
    pub selection: &'a Selection,
    pub overrides: &'a [ItemVariableValue],
    pub debug_ids: &'a mut DebugIdMap,
    /// Targets whose last writer this frame was a geometry-stage pass.
    pub geometry_targets: &'a mut FxHashSet<RenderTargetRef>,
    pub pick: Option<&'a mut PickSession>,
    pub debug: bool,
    pub paused: bool,
}

impl FrameExecutor<'_> {
    /// Executes every record in order.
    pub fn execute(&mut self, cache: &mut ResourceCache, pipeline: &mut Pipeline) {
        let mut clears = ClearState::default();
        self.geometry_targets.clear();
        if self.debug {
            self.debug_ids.clear();
        }

        let keys = cache.keys().to_vec();
        for key in keys {
            let Some(record) = cache.get_mut(key) else {
                continue;
            };
            let Some(item) = pipeline.get_mut(record.id) else {
                continue;
            };
            let PipelineItem { id, name, kind } = item;

            match (kind, &mut record.resources) {
                (ItemKind::ShaderPass(pass), CachedResources::ShaderPass(resources)) => {
                    self.shader_pass(*id, name, pass, resources, &mut clears);
                }
                (ItemKind::ComputePass(pass), CachedResources::ComputePass(resources)) => {
                    self.compute_pass(*id, pass, resources);
                }
                (ItemKind::AudioPass(pass), _) => self.audio_pass(*id, pass),
                (ItemKind::Plugin(plugin), _) if !self.debug => {
                    plugin.owner.execute_item(&mut *self.device, plugin);
                }
                _ => {}
            }
        }
    }

    // ── Shader passes ────────────────────────────────────────────────────────

    fn shader_pass(
        &mut self,
        pass_id: ItemId,
        name: &str,
        pass: &mut ShaderPass,
        resources: &mut PassResources,
        clears: &mut ClearState,
    ) {
        for target in pass.targets() {
            if pass.geometry_used {
                self.geometry_targets.insert(target);
            } else {
                self.geometry_targets.remove(&target);
            }
        }

        if !pass.active
            || pass.items.is_empty()
            || pass.target_count() == 0
            || (self.debug && pass.geometry_used)
        {
            return;
        }

        self.framebuffers.ensure(
            &mut *self.device,
            self.objects,
            self.window,
            name,
            pass,
            &mut resources.framebuffers,
        );

        let program = if self.debug {
            resources.debug_program
        } else {
            resources.program
        };
        let (Some(program), Some(framebuffers)) = (program, resources.framebuffers.as_ref()) else {
            return;
        };

        let multisampled = framebuffers
            .multisampled
            .filter(|_| self.settings.msaa_enabled() && !self.debug);

        // the window depth buffer is cleared together with the window
        let depth_stencil_clear = match framebuffers.depth {
            Some(depth)
                if !(depth == self.window.depth && clears.window_cleared)
                    && clears.cleared_depths.insert(depth) =>
            {
                Some(DepthStencilClear::default())
            }
            _ => None,
        };

        let mut color_clears: SmallVec<[Option<Vec4>; 4]> = SmallVec::new();
        let mut viewport = self.window.size;
        for target in pass.targets() {
            let clear = match target {
                RenderTargetRef::Window => {
                    if clears.window_cleared {
                        None
                    } else {
                        clears.window_cleared = true;
                        Some(self.clear_color(self.settings.clear_color))
                    }
                }
                RenderTargetRef::Texture(id) => match self.objects.render_texture(id) {
                    Some(texture) => {
                        viewport = texture.calculate_size(self.window.size);
                        let bound_before = clears.previous_targets.contains(&Some(target));
                        (texture.clear && !bound_before).then(|| self.clear_color(texture.clear_color))
                    }
                    None => {
                        log::debug!("Pass '{name}' targets a missing render texture {id:?}");
                        None
                    }
                },
            };
            color_clears.push(clear);
        }
        clears.previous_targets = pass.render_targets;

        self.context.viewport_size = viewport.as_vec2();

        self.device.begin_render_pass(&RenderPassDescriptor {
            label: Some(name),
            framebuffer: multisampled.unwrap_or(framebuffers.primary),
            color_clears,
            depth_stencil_clear,
        });
        self.device.set_viewport(viewport);
        self.device.use_program(program);
        bind_pass_resources(&mut *self.device, self.objects, pass_id);
        self.device.reset_render_state();

        let ShaderPass {
            items, variables, ..
        } = pass;
        for child in items.iter() {
            self.draw_child(pass_id, name, child, variables);
        }

        self.device.end_render_pass();

        if let Some(multisampled) = multisampled {
            self.device.resolve_framebuffer(
                multisampled,
                framebuffers.primary,
                framebuffers.count as u32,
                viewport,
            );
        }
    }

    fn clear_color(&self, color: Vec4) -> Vec4 {
        if self.debug { Vec4::ZERO } else { color }
    }

    fn draw_child(
        &mut self,
        pass_id: ItemId,
        pass_name: &str,
        child: &PipelineItem,
        variables: &mut VariableTable,
    ) {
        self.context.picked = false;

        match &child.kind {
            ItemKind::RenderState(state) => self.device.apply_render_state(state),
            ItemKind::Geometry(_) | ItemKind::Model(_) => {
                if let Some(pick) = self.pick.as_deref_mut() {
                    pick.test(child);
                }

                let swapped = apply_overrides(variables, self.overrides, child.id);

                self.context.geometry_transform = world_transform(child, self.context.viewport_size);
                self.context.picked = self.selection.contains(child.id);
                variables.bind(&mut *self.device, &*self.context);

                if self.debug {
                    let id = self.debug_ids.assign(pass_id, child.id);
                    self.device
                        .set_uniform(PICK_COLOR_UNIFORM, &UniformValue::Vec3(encode_id(id)));
                }

                draw_item(&mut *self.device, child);

                restore_overrides(variables, swapped);
            }
            ItemKind::Plugin(plugin) => {
                let pickable = plugin.owner.is_item_pickable(&plugin.item_type);
                if pickable && let Some(pick) = self.pick.as_deref_mut() {
                    pick.test(child);
                }
                self.context.picked = pickable && self.selection.contains(child.id);
                plugin
                    .owner
                    .execute_pass_item(&mut *self.device, pass_name, plugin, &*self.context);
            }
            _ => {}
        }
    }

    // ── Compute and audio ────────────────────────────────────────────────────

    fn compute_pass(&mut self, id: ItemId, pass: &ComputePass, resources: &ComputeResources) {
        if !self.capabilities.compute || self.debug || self.paused {
            return;
        }
        let Some(program) = resources.program else {
            return;
        };

        self.device.use_program(program);

        for (slot, binding) in self.objects.bind_list(id).iter().enumerate() {
            let slot = slot as u32;
            match binding {
                ResourceBinding::Texture(texture) => {
                    self.device.bind_texture(slot, *texture, TextureKind::D2);
                }
                ResourceBinding::CubeMap(texture) => {
                    self.device.bind_texture(slot, *texture, TextureKind::Cube);
                }
                ResourceBinding::Texture3D(texture) => {
                    self.device.bind_texture(slot, *texture, TextureKind::D3);
                }
                ResourceBinding::Image { texture, format } => {
                    self.device.bind_image(slot, *texture, *format, false);
                }
                ResourceBinding::Image3D { texture, format } => {
                    self.device.bind_image(slot, *texture, *format, true);
                }
                ResourceBinding::Buffer(buffer) => self.device.bind_storage_buffer(slot, *buffer),
                ResourceBinding::Plugin(object) => {
                    object.owner.bind_object(&mut *self.device, object, slot);
                }
            }
        }
        for (slot, buffer) in self.objects.uniform_bind_list(id).into_iter().enumerate() {
            self.device.bind_uniform_buffer(slot as u32, buffer);
        }

        pass.variables.bind(&mut *self.device, &*self.context);

        self.device.dispatch_compute(pass.work_groups);
        self.device.memory_barrier(MemoryBarrier::COMPUTE_WRITES);
    }

    fn audio_pass(&mut self, id: ItemId, pass: &mut AudioPass) {
        if self.debug {
            return;
        }
        let Some(stream) = pass.stream.as_mut() else {
            return;
        };

        if let Some(program) = stream.program() {
            self.device.use_program(program);
        }

        for (slot, binding) in self.objects.bind_list(id).iter().enumerate() {
            let slot = slot as u32;
            match binding {
                ResourceBinding::Texture(texture) => {
                    self.device.bind_texture(slot, *texture, TextureKind::D2);
                }
                ResourceBinding::CubeMap(texture) => {
                    self.device.bind_texture(slot, *texture, TextureKind::Cube);
                }
                ResourceBinding::Texture3D(texture) => {
                    self.device.bind_texture(slot, *texture, TextureKind::D3);
                }
                ResourceBinding::Buffer(buffer) => self.device.bind_storage_buffer(slot, *buffer),
                ResourceBinding::Plugin(object) => {
                    object.owner.bind_object(&mut *self.device, object, slot);
                }
                ResourceBinding::Image { .. } | ResourceBinding::Image3D { .. } => {}
            }
        }

        pass.variables.bind(&mut *self.device, &*self.context);
        stream.render(&mut *self.device);
    }
}

/// Binds the resource views and uniform buffers listed for a shader pass.
pub(crate) fn bind_pass_resources(device: &mut dyn GpuDevice, objects: &dyn ObjectRegistry, item: ItemId) {
    for (slot, binding) in objects.bind_list(item).iter().enumerate() {
        let slot = slot as u32;
        match binding {
            ResourceBinding::Texture(texture) | ResourceBinding::Image { texture, .. } => {
                device.bind_texture(slot, *texture, TextureKind::D2);
            }
            ResourceBinding::CubeMap(texture) => {
                device.bind_texture(slot, *texture, TextureKind::Cube);
            }
            ResourceBinding::Texture3D(texture) | ResourceBinding::Image3D { texture, .. } => {
                device.bind_texture(slot, *texture, TextureKind::D3);
            }
            ResourceBinding::Plugin(object) => {
                object.owner.bind_object(device, object, slot);
            }
            // storage buffers are not visible to raster passes
            ResourceBinding::Buffer(_) => {}
        }
    }

    for (slot, buffer) in objects.uniform_bind_list(item).into_iter().enumerate() {
        device.bind_uniform_buffer(slot as u32, buffer);
    }
}

/// World transform handed to shaders for a drawable item.
pub(crate) fn world_transform(item: &PipelineItem, viewport: glam::Vec2) -> Mat4 {
    match &item.kind {
        ItemKind::Geometry(geometry) => geometry.draw_matrix(viewport),
        ItemKind::Model(model) => model.draw_matrix(),
        _ => Mat4::IDENTITY,
    }
}

/// Issues the draw calls of a geometry or model item.
pub(crate) fn draw_item(device: &mut dyn GpuDevice, item: &PipelineItem) {
    match &item.kind {
        ItemKind::Geometry(geometry) => device.draw(&DrawCall {
            vertex_buffer: geometry.vertex_buffer,
            instance_buffer: geometry.instance_buffer,
            topology: geometry.topology,
            vertex_count: geometry.vertex_count,
            instance_count: geometry.instanced.then_some(geometry.instance_count),
        }),
        ItemKind::Model(model) => {
            for mesh in &model.model.meshes {
                device.draw(&DrawCall {
                    vertex_buffer: mesh.vertex_buffer,
                    instance_buffer: model.instance_buffer,
                    topology: model.topology,
                    vertex_count: mesh.vertex_count,
                    instance_count: model.instanced.then_some(model.instance_count),
                });
            }
        }
        _ => {}
    }
}

/// Size of the viewport a pass renders at: the last render texture target,
/// or the window.
pub(crate) fn pass_viewport(pass: &ShaderPass, window: &WindowTargets, objects: &dyn ObjectRegistry) -> UVec2 {
    pass.targets()
        .filter_map(|t| match t {
            RenderTargetRef::Window => None,
            RenderTargetRef::Texture(id) => objects.render_texture(id),
        })
        .last()
        .map_or(window.size, |rt| rt.calculate_size(window.size))
}
