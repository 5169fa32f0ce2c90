//! Render Engine
//!
//! [`RenderEngine`] keeps a [`Pipeline`] in sync with live GPU objects and
//! renders it. Each call to [`render`](RenderEngine::render) runs:
//!
//! ```text
//! tick clock ─► resize window targets? ─► reconcile cache (debounced)
//!     ─► plugins.begin_render ─► FrameExecutor ─► plugins.end_render
//!     ─► snapshot + frame index ─► finish_frame ─► resolve pending pick
//! ```
//!
//! The engine never holds on to the pipeline between calls. Every method that
//! needs it takes it by reference, and GPU resources are matched to items by
//! [`ItemId`].
//!
//! | Module           | Responsibility                                     |
//! |------------------|----------------------------------------------------|
//! | [`cache`]        | Records of top-level items and their reconciliation |
//! | [`framebuffers`] | Per-pass framebuffers and their invalidation         |
//! | [`context`]      | Per-frame values read by shaders and plugins         |
//! | `executor`       | Recording one frame through the device               |
//! | [`window`]       | The shared window surface                            |

pub mod cache;
pub mod context;
pub(crate) mod executor;
pub mod framebuffers;
pub mod window;

use std::path::Path;
use std::time::Instant;

use glam::{UVec2, Vec2, Vec4};
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

pub use cache::{CacheKey, CachedItem, CachedResources, ReconcilePlan, ResourceCache};
pub use context::{FrameContext, FrameSnapshot};
pub use framebuffers::{FramebufferManager, PassFramebuffers};
pub use window::WindowTargets;

use executor::{FrameExecutor, bind_pass_resources, draw_item, pass_viewport, world_transform};
use framebuffers::resolve_target;

use crate::device::{
    DepthStencilClear, DeviceCapabilities, GpuDevice, ProgramDescriptor, ProgramId,
    ProgramStages, RenderPassDescriptor, StageSource, TextureId,
};
use crate::errors::{CompileError, DeviceError, Result};
use crate::picking::pixel::{normalize_color, pixel_coordinate};
use crate::picking::{
    DebugIdMap, PickCallback, PickSession, PixelInfo, PixelTarget, Ray, Selection, decode_id,
};
use crate::pipeline::variables::{apply_overrides, restore_overrides};
use crate::pipeline::{
    ItemId, ItemKind, ItemVariableValue, Pipeline, PipelineItem, RenderTargetRef, ShaderPass,
};
use crate::services::{EngineServices, Severity};
use crate::settings::EngineSettings;
use crate::shader::{
    ComputeSource, PICK_INDEX_FRAGMENT, PassSources, PickIndexSource, ShaderCompiler, ShaderStage,
    StageCode, inject_pick_index,
};
use crate::utils::{FrameClock, normalize_path};

/// Synchronizes a pipeline with GPU resources and renders it.
pub struct RenderEngine<D: GpuDevice> {
    device: D,
    services: EngineServices,
    settings: EngineSettings,
    capabilities: DeviceCapabilities,

    cache: ResourceCache,
    framebuffers: FramebufferManager,
    window: Option<WindowTargets>,
    last_size: Option<UVec2>,
    /// Set when settings or a cache flush require new window targets even
    /// though the size is unchanged.
    recreate_window: bool,

    context: FrameContext,
    clock: FrameClock,

    selection: Selection,
    pending_pick: Option<PickSession>,
    item_variable_values: Vec<ItemVariableValue>,
    debug_ids: DebugIdMap,
    geometry_targets: FxHashSet<RenderTargetRef>,
}

impl<D: GpuDevice> RenderEngine<D> {
    pub fn new(device: D, services: EngineServices, settings: EngineSettings) -> Self {
        let capabilities = device.capabilities();
        log::info!(
            "Render engine created (compute: {}, geometry stage: {}, max samples: {})",
            capabilities.compute,
            capabilities.geometry_stage,
            capabilities.max_samples
        );

        Self {
            device,
            services,
            settings,
            capabilities,
            cache: ResourceCache::new(),
            framebuffers: FramebufferManager::new(),
            window: None,
            last_size: None,
            recreate_window: false,
            context: FrameContext::new(),
            clock: FrameClock::new(),
            selection: Selection::new(),
            pending_pick: None,
            item_variable_values: Vec::new(),
            debug_ids: DebugIdMap::new(),
            geometry_targets: FxHashSet::default(),
        }
    }

    // ========================================================================
    // Frame
    // ========================================================================

    /// Renders one frame of `pipeline` into a `width` × `height` window
    /// surface. Debug frames draw every item with its id color.
    pub fn render(&mut self, pipeline: &mut Pipeline, width: u32, height: u32, debug: bool) {
        self.clock.tick();
        self.context.time = self.clock.elapsed_seconds();
        self.context.time_delta = self.clock.dt_seconds();

        let size = UVec2::new(width, height).max(UVec2::ONE);
        if self.recreate_window || self.last_size != Some(size) || self.window.is_none() {
            if let Err(err) = self.resize(size) {
                log::error!("Failed to create window targets: {err}");
                return;
            }
        }

        self.sync(pipeline);

        let Some(window) = self.window.as_ref() else {
            return;
        };

        self.services.plugins.begin_render();

        let paused = self.clock.is_paused();
        let mut executor = FrameExecutor {
            device: &mut self.device,
            objects: &*self.services.objects,
            settings: &self.settings,
            capabilities: self.capabilities,
            window,
            framebuffers: &self.framebuffers,
            context: &mut self.context,
            selection: &self.selection,
            overrides: &self.item_variable_values,
            debug_ids: &mut self.debug_ids,
            geometry_targets: &mut self.geometry_targets,
            pick: self.pending_pick.as_mut(),
            debug,
            paused,
        };
        executor.execute(&mut self.cache, pipeline);

        self.services.plugins.end_render();

        if !paused {
            self.context.snapshot();
            self.context.frame_index = self.context.frame_index.wrapping_add(1);
        }

        self.device.finish_frame();

        if let Some(session) = self.pending_pick.take() {
            session.finish(&mut self.selection);
        }
    }

    /// Recreates the window targets and every auto-sized render texture.
    fn resize(&mut self, size: UVec2) -> std::result::Result<(), DeviceError> {
        if let Some(old) = self.window.take() {
            old.destroy(&mut self.device);
        }
        self.window = Some(WindowTargets::create(&mut self.device, size, &self.settings)?);
        self.last_size = Some(size);
        self.recreate_window = false;

        let samples = if self.settings.msaa_enabled() {
            self.settings.msaa_samples.min(self.capabilities.max_samples)
        } else {
            1
        };
        let objects = &mut self.services.objects;
        for id in objects.render_textures() {
            let Some(target_size) = objects
                .render_texture(id)
                .filter(|rt| rt.is_auto_sized())
                .map(|rt| rt.calculate_size(size))
            else {
                continue;
            };
            if let Err(err) = objects.resize_render_texture(&mut self.device, id, target_size, samples) {
                log::error!("Failed to resize render texture {id:?}: {err}");
            }
        }

        self.framebuffers.invalidate();
        log::debug!("Window resized to {}x{}", size.x, size.y);
        Ok(())
    }

    // ========================================================================
    // Cache
    // ========================================================================

    /// Reconciles the cache with the top-level items of `pipeline`.
    fn sync(&mut self, pipeline: &mut Pipeline) {
        let candidates = pipeline.items();
        if !self
            .cache
            .should_sync(candidates.len(), self.settings.cache_debounce, Instant::now())
        {
            return;
        }

        let plan = self.cache.plan(candidates);
        if plan.is_noop() {
            return;
        }
        log::debug!(
            "Reconciling cache: {} added, {} removed, reordered: {}",
            plan.added.len(),
            plan.removed.len(),
            plan.reordered
        );

        for key in plan.removed {
            if let Some(mut record) = self.cache.remove(key) {
                log::info!("Releasing resources of '{}'", record.name);
                record.release(&mut self.device);
            }
        }

        for index in plan.added {
            let Some(item) = pipeline.items_mut().get_mut(index) else {
                continue;
            };
            let mut record = CachedItem::new(item);
            build_record(
                &mut self.device,
                &self.settings,
                &mut self.services,
                self.capabilities,
                &mut record,
                item,
            );
            log::info!("Cached '{}' ({:?})", record.name, record.item_type);
            self.cache.insert(record);
        }

        self.cache.reorder(pipeline.items());
    }

    /// Releases every cached resource. The next render rebuilds everything,
    /// window targets included.
    pub fn flush_cache(&mut self) {
        for mut record in self.cache.drain() {
            record.release(&mut self.device);
        }
        self.framebuffers.invalidate();
        self.debug_ids.clear();
        self.recreate_window = true;
        log::info!("Cache flushed");
    }

    /// Forces every pass to rebuild its framebuffers before the next draw.
    pub fn invalidate_framebuffers(&mut self) {
        self.framebuffers.invalidate();
    }

    // ========================================================================
    // Recompilation
    // ========================================================================

    /// Rebuilds the programs of the top-level item called `name` from its
    /// files. Items not cached yet are built by the next render.
    pub fn recompile(&mut self, pipeline: &mut Pipeline, name: &str) {
        log::info!("Recompiling '{name}'");
        for plugin in self.services.plugins.iter() {
            plugin.handle_recompile(name);
        }

        let Some(item) = pipeline.items_mut().iter_mut().find(|i| i.name == name) else {
            log::warn!("Cannot recompile '{name}': no such item");
            return;
        };
        let Some(record) = self.cache.record_mut(item.id) else {
            return;
        };

        record.release_programs(&mut self.device);
        build_record(
            &mut self.device,
            &self.settings,
            &mut self.services,
            self.capabilities,
            record,
            item,
        );
    }

    /// Rebuilds the programs of `name` from source text.
    ///
    /// An empty string keeps the stage of the last build. Compute passes take
    /// their source in `vertex`, audio passes as well.
    pub fn recompile_from_source(
        &mut self,
        pipeline: &mut Pipeline,
        name: &str,
        vertex: &str,
        fragment: &str,
        geometry: &str,
    ) {
        let Some(item) = pipeline.items_mut().iter_mut().find(|i| i.name == name) else {
            log::warn!("Cannot recompile '{name}': no such item");
            return;
        };
        let Some(record) = self.cache.record_mut(item.id) else {
            return;
        };

        let mut compiler = ShaderCompiler::new(&self.settings, &mut self.services);

        match (&mut item.kind, &mut record.resources) {
            (ItemKind::ShaderPass(pass), CachedResources::ShaderPass(resources)) => {
                compiler.clear_messages(name);
                let stage = |text: &str, old: Option<&StageCode>| {
                    if text.is_empty() {
                        old.cloned()
                    } else {
                        Some(StageCode::raw(text))
                    }
                };
                let old = resources.sources.as_ref();
                let vertex = stage(vertex, old.map(|s| &s.vertex));
                let fragment = stage(fragment, old.map(|s| &s.fragment));
                let geometry = if pass.geometry_used {
                    stage(geometry, old.and_then(|s| s.geometry.as_ref())).map(Some)
                } else {
                    Some(None)
                };
                let files = old.map(|s| s.files.clone()).unwrap_or_default();

                if let Some(program) = resources.program.take() {
                    self.device.destroy_program(program);
                }
                if let Some(program) = resources.debug_program.take() {
                    self.device.destroy_program(program);
                }

                let (Some(vertex), Some(fragment), Some(geometry)) = (vertex, fragment, geometry) else {
                    compiler.report(name, Severity::Error, "Failed to compile the shader(s)");
                    return;
                };
                let sources = PassSources {
                    vertex,
                    fragment,
                    geometry,
                    files,
                };
                let programs = compiler.link_pass(&mut self.device, name, &sources);
                resources.program = programs.program;
                resources.debug_program = programs.debug_program;
                resources.sources = Some(sources);
            }
            (ItemKind::ComputePass(_), CachedResources::ComputePass(resources)) if self.capabilities.compute => {
                compiler.clear_messages(name);
                if let Some(program) = resources.program.take() {
                    self.device.destroy_program(program);
                }
                if vertex.is_empty() {
                    compiler.report(name, Severity::Error, "Failed to compile the compute shader");
                    return;
                }
                let code = StageCode::raw(vertex);
                resources.program = compiler.link_compute(&mut self.device, name, &code);
                let files = resources.source.take().map(|s| s.files).unwrap_or_default();
                resources.source = Some(ComputeSource { code, files });
            }
            (ItemKind::AudioPass(pass), CachedResources::AudioPass(_)) => {
                compiler.clear_messages(name);
                if vertex.is_empty() {
                    return;
                }
                if let Some(stream) = pass.stream.as_mut() {
                    let language = self.settings.language_of(&pass.path);
                    match stream.compile(&mut self.device, vertex, language) {
                        Ok(()) => compiler.report(name, Severity::Message, "Compiled the shaders."),
                        Err(log) => {
                            compiler.report_compile_error(
                                name,
                                &CompileError::new(ShaderStage::Fragment, log),
                                0,
                            );
                            compiler.report(name, Severity::Error, "Failed to compile the shader(s)");
                        }
                    }
                }
            }
            _ => {}
        }
    }

    /// Recompiles every top-level item reading `path`, directly or through
    /// an `#include`.
    pub fn recompile_file(&mut self, pipeline: &mut Pipeline, path: &Path) {
        let path = normalize_path(path);
        let same = |other: &Path| normalize_path(other) == path;

        let names: Vec<String> = pipeline
            .items()
            .iter()
            .filter(|item| {
                let cached = self.cache.record(item.id).is_some_and(|r| r.depends_on(&path));
                let direct = match &item.kind {
                    ItemKind::ShaderPass(pass) => {
                        same(&pass.vertex.path)
                            || same(&pass.fragment.path)
                            || (pass.geometry_used && same(&pass.geometry.path))
                    }
                    ItemKind::ComputePass(pass) => self.capabilities.compute && same(&pass.shader.path),
                    ItemKind::AudioPass(pass) => same(&pass.path),
                    _ => false,
                };
                cached || direct
            })
            .map(|item| item.name.clone())
            .collect();

        for name in names {
            self.recompile(pipeline, &name);
        }
    }

    // ========================================================================
    // Picking
    // ========================================================================

    /// Queues a ray pick at pixel `(x, y)` (bottom-left origin) of the last
    /// rendered frame. It resolves at the end of the next render.
    pub fn pick(&mut self, x: f32, y: f32, multi: bool, callback: Option<PickCallback>) {
        let viewport = self.last_size.unwrap_or(UVec2::ONE).as_vec2();
        let ray = Ray::from_screen(
            Vec2::new(x, y),
            viewport,
            self.context.view_projection(),
            self.context.camera_position,
        );
        self.pending_pick = Some(PickSession::new(ray, multi, callback));
    }

    /// Drops a queued pick without running its callback.
    pub fn cancel_pick(&mut self) {
        self.pending_pick = None;
    }

    #[must_use]
    pub fn is_picking(&self) -> bool {
        self.pending_pick.is_some()
    }

    /// Selects `item` as if it had been picked. `None` clears the selection.
    pub fn select(&mut self, item: Option<ItemId>, add: bool) {
        self.selection.select(item, add);
    }

    #[must_use]
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Finds what every target shows at `point`, given relative to the
    /// target size.
    ///
    /// Renders one debug frame and one regular frame. Targets last written by
    /// a geometry-stage pass are not reported.
    pub fn debug_pixel_pick(&mut self, pipeline: &mut Pipeline, point: Vec2) -> Result<Vec<PixelInfo>> {
        let Some(size) = self.last_size else {
            return Ok(Vec::new());
        };

        let targets = self.pixel_targets();
        let mut colors = Vec::with_capacity(targets.len());
        for target in &targets {
            let coordinate = pixel_coordinate(point, target.size);
            colors.push(normalize_color(self.device.read_pixel(target.texture, coordinate)?));
        }

        self.render(pipeline, size.x, size.y, true);

        let mut hits = Vec::new();
        let targets = self.pixel_targets();
        for (target, color) in targets.iter().zip(colors) {
            let reference = match target.target {
                PixelTarget::Window => RenderTargetRef::Window,
                PixelTarget::Texture(id) => RenderTargetRef::Texture(id),
            };
            if self.geometry_targets.contains(&reference) {
                continue;
            }

            let coordinate = pixel_coordinate(point, target.size);
            let id = decode_id(self.device.read_pixel(target.texture, coordinate)?);
            let Some(entry) = self.debug_ids.resolve(id) else {
                continue;
            };

            let target_index = pipeline
                .get(entry.pass)
                .and_then(PipelineItem::as_shader_pass)
                .and_then(|pass| pass.targets().position(|t| t == reference));

            hits.push(PixelInfo {
                color,
                target: target.target,
                target_name: target.name.clone(),
                target_index,
                item: entry.item,
                pass: entry.pass,
                coordinate,
                relative_coordinate: point,
            });
        }

        self.render(pipeline, size.x, size.y, false);
        Ok(hits)
    }

    /// Index of the vertex of `item` drawn at `point` of the first target of
    /// `pass`.
    pub fn debug_vertex_pick(
        &mut self,
        pipeline: &mut Pipeline,
        pass: ItemId,
        item: ItemId,
        point: Vec2,
    ) -> Result<Option<u32>> {
        self.debug_index_pick(pipeline, pass, item, point, PickIndexSource::Vertex)
    }

    /// Index of the instance of `item` drawn at `point` of the first target
    /// of `pass`.
    pub fn debug_instance_pick(
        &mut self,
        pipeline: &mut Pipeline,
        pass: ItemId,
        item: ItemId,
        point: Vec2,
    ) -> Result<Option<u32>> {
        self.debug_index_pick(pipeline, pass, item, point, PickIndexSource::Instance)
    }

    fn debug_index_pick(
        &mut self,
        pipeline: &mut Pipeline,
        pass: ItemId,
        item: ItemId,
        point: Vec2,
        source: PickIndexSource,
    ) -> Result<Option<u32>> {
        let Some(size) = self.last_size else {
            return Ok(None);
        };
        let Some(sources) = self
            .cache
            .record(pass)
            .and_then(CachedItem::pass)
            .and_then(|p| p.sources.as_ref())
        else {
            return Ok(None);
        };
        let Some(vertex) = inject_pick_index(&sources.vertex.source, source) else {
            log::warn!("Vertex stage of {pass} has no main function to rewrite");
            return Ok(None);
        };

        let program = self.device.create_program(&ProgramDescriptor {
            label: Some("Index Pick"),
            stages: ProgramStages::Graphics {
                vertex: StageSource {
                    source: &vertex,
                    entry: "main",
                },
                fragment: StageSource {
                    source: PICK_INDEX_FRAGMENT,
                    entry: "main",
                },
                geometry: None,
            },
        })?;

        let result = self.draw_index_pick(pipeline, pass, item, point, program);
        self.device.destroy_program(program);

        self.render(pipeline, size.x, size.y, false);
        result
    }

    /// Draws only `item` of `pass` with `program` and decodes one pixel.
    fn draw_index_pick(
        &mut self,
        pipeline: &mut Pipeline,
        pass_id: ItemId,
        item_id: ItemId,
        point: Vec2,
        program: ProgramId,
    ) -> Result<Option<u32>> {
        let Some(window) = self.window.as_ref() else {
            return Ok(None);
        };
        let Some(PipelineItem {
            name,
            kind: ItemKind::ShaderPass(pass),
            ..
        }) = pipeline.get_mut(pass_id)
        else {
            return Ok(None);
        };
        let Some(resources) = self.cache.record_mut(pass_id).and_then(CachedItem::pass_mut) else {
            return Ok(None);
        };
        let objects = &*self.services.objects;

        self.framebuffers.ensure(
            &mut self.device,
            objects,
            window,
            name,
            pass,
            &mut resources.framebuffers,
        );
        let Some(framebuffers) = resources.framebuffers.as_ref() else {
            return Ok(None);
        };
        let Some(first) = pass
            .targets()
            .next()
            .and_then(|t| resolve_target(t, window, objects))
        else {
            return Ok(None);
        };

        let viewport = pass_viewport(pass, window, objects);
        self.context.viewport_size = viewport.as_vec2();

        self.device.begin_render_pass(&RenderPassDescriptor {
            label: Some("Index Pick"),
            framebuffer: framebuffers.primary,
            color_clears: SmallVec::from_elem(Some(Vec4::ZERO), pass.target_count()),
            depth_stencil_clear: Some(DepthStencilClear::default()),
        });
        self.device.set_viewport(viewport);
        self.device.use_program(program);
        bind_pass_resources(&mut self.device, objects, pass_id);
        self.device.reset_render_state();

        let ShaderPass {
            items, variables, ..
        } = pass;
        for child in items.iter() {
            match &child.kind {
                ItemKind::RenderState(state) => {
                    self.device.apply_render_state(&state.culling_only());
                }
                _ if child.id == item_id => {
                    let swapped = apply_overrides(variables, &self.item_variable_values, child.id);
                    self.context.geometry_transform = world_transform(child, self.context.viewport_size);
                    self.context.picked = self.selection.contains(child.id);
                    variables.bind(&mut self.device, &self.context);
                    draw_item(&mut self.device, child);
                    restore_overrides(variables, swapped);
                    break;
                }
                _ => {}
            }
        }

        self.device.end_render_pass();
        self.device.finish_frame();

        let coordinate = pixel_coordinate(point, first.size);
        let encoded = decode_id(self.device.read_pixel(first.color, coordinate)?);
        Ok(encoded.checked_sub(1))
    }

    /// The window and every render texture, with their current sizes.
    fn pixel_targets(&self) -> Vec<PixelTargetInfo> {
        let Some(window) = self.window.as_ref() else {
            return Vec::new();
        };

        let mut targets = vec![PixelTargetInfo {
            target: PixelTarget::Window,
            name: "Window".to_owned(),
            texture: window.color,
            size: window.size,
        }];
        let objects = &self.services.objects;
        for id in objects.render_textures() {
            if let Some(rt) = objects.render_texture(id) {
                targets.push(PixelTargetInfo {
                    target: PixelTarget::Texture(id),
                    name: rt.name.clone(),
                    texture: rt.color,
                    size: rt.calculate_size(window.size),
                });
            }
        }
        targets
    }

    // ========================================================================
    // State
    // ========================================================================

    /// Freezes or resumes time. Paused frames still render but keep the
    /// frame index and skip compute passes.
    pub fn pause(&mut self, paused: bool) {
        self.clock.set_paused(paused);
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.clock.is_paused()
    }

    #[must_use]
    pub fn context(&self) -> &FrameContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut FrameContext {
        &mut self.context
    }

    pub fn item_variable_values_mut(&mut self) -> &mut Vec<ItemVariableValue> {
        &mut self.item_variable_values
    }

    /// Window size of the last render.
    #[must_use]
    pub fn last_size(&self) -> Option<UVec2> {
        self.last_size
    }

    /// Color texture of the window surface.
    #[must_use]
    pub fn window_texture(&self) -> Option<TextureId> {
        self.window.as_ref().map(|w| w.color)
    }

    #[must_use]
    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    #[must_use]
    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    #[must_use]
    pub fn services(&self) -> &EngineServices {
        &self.services
    }

    pub fn services_mut(&mut self) -> &mut EngineServices {
        &mut self.services
    }

    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Mutable settings. Window targets are recreated on the next render so
    /// sample count and format changes apply.
    pub fn settings_mut(&mut self) -> &mut EngineSettings {
        self.recreate_window = true;
        &mut self.settings
    }

    /// Releases every GPU resource owned by the engine.
    pub fn shutdown(&mut self) {
        self.flush_cache();
        if let Some(window) = self.window.take() {
            window.destroy(&mut self.device);
        }
        self.pending_pick = None;
    }
}

impl<D: GpuDevice> Drop for RenderEngine<D> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// A target read back by [`RenderEngine::debug_pixel_pick`].
struct PixelTargetInfo {
    target: PixelTarget,
    name: String,
    texture: TextureId,
    size: UVec2,
}

/// Compiles whatever the record of `item` needs.
fn build_record(
    device: &mut dyn GpuDevice,
    settings: &EngineSettings,
    services: &mut EngineServices,
    capabilities: DeviceCapabilities,
    record: &mut CachedItem,
    item: &mut PipelineItem,
) {
    let mut compiler = ShaderCompiler::new(settings, services);
    let PipelineItem { name, kind, .. } = item;

    match (kind, &mut record.resources) {
        (ItemKind::ShaderPass(pass), CachedResources::ShaderPass(resources)) => {
            let (sources, programs) = compiler.build_pass(device, name, pass);
            resources.sources = sources;
            resources.program = programs.program;
            resources.debug_program = programs.debug_program;
        }
        // compute passes stay empty on devices without compute support
        (ItemKind::ComputePass(pass), CachedResources::ComputePass(resources)) if capabilities.compute => {
            let (source, program) = compiler.build_compute(device, name, pass);
            resources.source = source;
            resources.program = program;
        }
        (ItemKind::AudioPass(pass), CachedResources::AudioPass(resources)) => {
            resources.files = compiler.build_audio(device, name, pass);
        }
        _ => {}
    }
}
