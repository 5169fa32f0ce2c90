//! Render Engine Tests
//!
//! Tests for:
//! - Cache reconciliation (additions, removals, reordering, debounce, flush)
//! - Frame recording (clears, viewport, frame index, pause)
//! - Compile failures degrading a single pass
//! - MSAA resolve
//! - Compute and audio passes

mod common;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use glam::{UVec2, UVec3, Vec3, Vec4};

use common::{
    Command, DRAW_COLOR, FAIL_MARKER, FRAGMENT_SHADER, MemoryProject, MockDevice, TestRegistry,
    add_cube, add_pass, default_project, engine, engine_with, test_settings,
};
use prism::device::{BufferId, DeviceCapabilities, GpuDevice, MemoryBarrier, ProgramId};
use prism::engine::RenderEngine;
use prism::pipeline::{
    AudioPass, ComputePass, ItemKind, ItemVariableValue, Pipeline, RenderTargetRef, ShaderMacro,
    ShaderStageDesc, ShaderVariable, UniformValue,
};
use prism::services::{AudioStream, EngineServices, ResourceBinding, Severity};
use prism::settings::EngineSettings;
use prism::shader::{ShaderLanguage, ShaderStage};

fn single_pass() -> Pipeline {
    let mut pipeline = Pipeline::new();
    let pass = add_pass(&mut pipeline, "Simple", &[RenderTargetRef::Window]);
    add_cube(&mut pipeline, pass, "Box", Vec3::ZERO);
    pipeline
}

// ============================================================================
// Frame Tests
// ============================================================================

#[test]
fn first_render_builds_and_draws() {
    let (mut engine, _) = engine();
    let mut pipeline = single_pass();

    engine.render(&mut pipeline, 800, 600, false);

    let device = engine.device();
    assert_eq!(device.draw_count(), 1);
    // regular program and debug program
    assert_eq!(device.programs.len(), 2);
    assert_eq!(device.framebuffers.len(), 1);
    assert_eq!(engine.context().frame_index, 1);
    assert_eq!(engine.last_size(), Some(UVec2::new(800, 600)));
    assert!(device.commands.contains(&Command::Viewport(UVec2::new(800, 600))));
    assert_eq!(device.commands.last(), Some(&Command::FinishFrame));
}

#[test]
fn window_is_painted_by_the_pass() {
    let (mut engine, _) = engine();
    let mut pipeline = single_pass();

    engine.render(&mut pipeline, 64, 64, false);

    let window = engine.window_texture().unwrap();
    assert_eq!(engine.device().pixel(window), Some(DRAW_COLOR));
}

#[test]
fn frame_index_advances_once_per_frame() {
    let (mut engine, _) = engine();
    let mut pipeline = single_pass();

    for _ in 0..3 {
        engine.render(&mut pipeline, 320, 240, false);
    }

    assert_eq!(engine.context().frame_index, 3);
    assert_eq!(engine.device().draw_count(), 3);
}

#[test]
fn paused_frames_keep_the_index() {
    let (mut engine, _) = engine();
    let mut pipeline = single_pass();

    engine.render(&mut pipeline, 320, 240, false);
    engine.pause(true);
    engine.render(&mut pipeline, 320, 240, false);
    engine.render(&mut pipeline, 320, 240, false);

    assert!(engine.is_paused());
    assert_eq!(engine.context().frame_index, 1);
    // still rendering
    assert_eq!(engine.device().draw_count(), 3);

    engine.pause(false);
    engine.render(&mut pipeline, 320, 240, false);
    assert_eq!(engine.context().frame_index, 2);
}

#[test]
fn window_cleared_once_per_frame() {
    let (mut engine, _) = engine();
    let mut pipeline = Pipeline::new();
    let first = add_pass(&mut pipeline, "First", &[RenderTargetRef::Window]);
    add_cube(&mut pipeline, first, "A", Vec3::ZERO);
    let second = add_pass(&mut pipeline, "Second", &[RenderTargetRef::Window]);
    add_cube(&mut pipeline, second, "B", Vec3::ZERO);

    engine.render(&mut pipeline, 100, 100, false);

    let passes = engine.device().render_passes();
    assert_eq!(passes.len(), 2);

    let (_, clears, depth) = &passes[0];
    assert_eq!(clears.as_slice(), &[Some(Vec4::new(0.0, 0.0, 0.0, 1.0))]);
    assert!(*depth);

    let (_, clears, depth) = &passes[1];
    assert_eq!(clears.as_slice(), &[None]);
    assert!(!*depth);
}

#[test]
fn each_depth_buffer_cleared_once_per_frame() {
    let project = default_project();
    let mut registry = TestRegistry::new();
    let rt = registry.add_render_texture("Offscreen", false, Vec4::ZERO);
    let mut engine = engine_with(&project, registry, test_settings());

    let mut pipeline = Pipeline::new();
    for (name, target) in [
        ("Window", RenderTargetRef::Window),
        ("First", RenderTargetRef::Texture(rt)),
        ("Second", RenderTargetRef::Texture(rt)),
        ("Overlay", RenderTargetRef::Window),
    ] {
        let pass = add_pass(&mut pipeline, name, &[target]);
        add_cube(&mut pipeline, pass, &format!("{name} Box"), Vec3::ZERO);
    }

    for _ in 0..2 {
        engine.device_mut().clear_commands();
        engine.render(&mut pipeline, 100, 100, false);

        let depth_clears: Vec<_> = engine
            .device()
            .render_passes()
            .into_iter()
            .map(|(_, _, depth)| depth)
            .collect();
        assert_eq!(depth_clears, vec![true, true, false, false]);
    }
}

#[test]
fn render_texture_clear_skipped_when_rebound() {
    let project = default_project();
    let mut registry = TestRegistry::new();
    let red = Vec4::new(1.0, 0.0, 0.0, 1.0);
    let rt = registry.add_render_texture("Color", true, red);
    let mut engine = engine_with(&project, registry, test_settings());

    let mut pipeline = Pipeline::new();
    let first = add_pass(&mut pipeline, "First", &[RenderTargetRef::Texture(rt)]);
    add_cube(&mut pipeline, first, "A", Vec3::ZERO);
    let second = add_pass(&mut pipeline, "Second", &[RenderTargetRef::Texture(rt)]);
    add_cube(&mut pipeline, second, "B", Vec3::ZERO);
    let third = add_pass(&mut pipeline, "Third", &[RenderTargetRef::Window]);
    add_cube(&mut pipeline, third, "C", Vec3::ZERO);
    let fourth = add_pass(&mut pipeline, "Fourth", &[RenderTargetRef::Texture(rt)]);
    add_cube(&mut pipeline, fourth, "D", Vec3::ZERO);

    engine.render(&mut pipeline, 128, 128, false);

    let clears: Vec<_> = engine
        .device()
        .render_passes()
        .into_iter()
        .map(|(_, clears, _)| clears)
        .collect();
    assert_eq!(clears[0], vec![Some(red)]);
    assert_eq!(clears[1], vec![None]);
    // a window pass in between makes the texture eligible again
    assert_eq!(clears[3], vec![Some(red)]);
}

#[test]
fn viewport_follows_last_render_texture() {
    let project = default_project();
    let mut registry = TestRegistry::new();
    let rt = registry.add_render_texture("Half", false, Vec4::ZERO);
    let mut engine = engine_with(&project, registry, test_settings());

    let mut pipeline = Pipeline::new();
    let pass = add_pass(
        &mut pipeline,
        "Offscreen",
        &[RenderTargetRef::Window, RenderTargetRef::Texture(rt)],
    );
    add_cube(&mut pipeline, pass, "Box", Vec3::ZERO);

    engine.render(&mut pipeline, 200, 100, false);

    // the test registry sizes textures like the window
    assert!(engine.device().commands.contains(&Command::Viewport(UVec2::new(200, 100))));
    let texture = engine.services().objects.render_texture(rt).unwrap();
    assert_eq!(engine.device().textures[&texture.color].size, UVec2::new(200, 100));
}

#[test]
fn item_variable_override_is_restored() {
    let (mut engine, _) = engine();
    let mut pipeline = Pipeline::new();
    let pass = add_pass(&mut pipeline, "Simple", &[RenderTargetRef::Window]);
    let a = add_cube(&mut pipeline, pass, "A", Vec3::ZERO);
    add_cube(&mut pipeline, pass, "B", Vec3::ZERO);
    if let Some(ItemKind::ShaderPass(shader)) = pipeline.get_mut(pass).map(|i| &mut i.kind) {
        shader
            .variables
            .add(ShaderVariable::new("tint", UniformValue::Float(1.0)));
    }
    engine
        .item_variable_values_mut()
        .push(ItemVariableValue::new(a, "tint", UniformValue::Float(0.25)));

    engine.render(&mut pipeline, 64, 64, false);

    let tints: Vec<_> = engine
        .device()
        .commands
        .iter()
        .filter_map(|c| match c {
            Command::Uniform(name, value) if name == "tint" => Some(*value),
            _ => None,
        })
        .collect();
    assert_eq!(tints, vec![UniformValue::Float(0.25), UniformValue::Float(1.0)]);
}

// ============================================================================
// Cache Tests
// ============================================================================

#[test]
fn reorder_keeps_programs() {
    let (mut engine, _) = engine();
    let mut pipeline = Pipeline::new();
    let first = add_pass(&mut pipeline, "First", &[RenderTargetRef::Window]);
    add_cube(&mut pipeline, first, "A", Vec3::ZERO);
    let second = add_pass(&mut pipeline, "Second", &[RenderTargetRef::Window]);
    add_cube(&mut pipeline, second, "B", Vec3::ZERO);

    engine.render(&mut pipeline, 64, 64, false);
    let created = engine.device().programs_created;

    pipeline.move_item(1, 0);
    engine.device_mut().clear_commands();
    engine.render(&mut pipeline, 64, 64, false);

    assert_eq!(engine.device().programs_created, created);
    assert_eq!(engine.cache().ids().collect::<Vec<_>>(), vec![second, first]);

    // the first pass drawn this frame is the one that clears the window
    let passes = engine.device().render_passes();
    let record = engine.cache().record(second).unwrap();
    let framebuffer = record.pass().unwrap().framebuffers.as_ref().unwrap().primary;
    assert_eq!(passes[0].0, framebuffer);
    assert!(passes[0].1[0].is_some());
}

#[test]
fn removed_item_releases_resources() {
    let (mut engine, _) = engine();
    let mut pipeline = Pipeline::new();
    let first = add_pass(&mut pipeline, "First", &[RenderTargetRef::Window]);
    add_cube(&mut pipeline, first, "A", Vec3::ZERO);
    let second = add_pass(&mut pipeline, "Second", &[RenderTargetRef::Window]);
    add_cube(&mut pipeline, second, "B", Vec3::ZERO);

    engine.render(&mut pipeline, 64, 64, false);
    assert_eq!(engine.device().programs.len(), 4);
    assert_eq!(engine.device().framebuffers.len(), 2);

    pipeline.remove(first);
    engine.render(&mut pipeline, 64, 64, false);

    assert_eq!(engine.device().programs.len(), 2);
    assert_eq!(engine.device().framebuffers.len(), 1);
    assert!(engine.cache().record(first).is_none());
    assert_eq!(engine.cache().len(), 1);
}

#[test]
fn same_size_edits_wait_for_debounce() {
    let project = default_project();
    let settings = EngineSettings {
        cache_debounce: Duration::from_secs(3600),
        ..Default::default()
    };
    let mut engine = engine_with(&project, TestRegistry::new(), settings);

    let mut pipeline = Pipeline::new();
    let first = add_pass(&mut pipeline, "First", &[RenderTargetRef::Window]);
    add_cube(&mut pipeline, first, "A", Vec3::ZERO);
    engine.render(&mut pipeline, 64, 64, false);
    assert_eq!(engine.device().programs_created, 2);

    // swap the pass for a new one: same item count
    pipeline.remove(first);
    let replacement = add_pass(&mut pipeline, "Replacement", &[RenderTargetRef::Window]);
    add_cube(&mut pipeline, replacement, "B", Vec3::ZERO);
    engine.device_mut().clear_commands();
    engine.render(&mut pipeline, 64, 64, false);

    assert_eq!(engine.device().programs_created, 2);
    assert!(engine.cache().record(replacement).is_none());
    assert_eq!(engine.device().draw_count(), 0);

    // a count change is picked up immediately
    let extra = add_pass(&mut pipeline, "Extra", &[RenderTargetRef::Window]);
    add_cube(&mut pipeline, extra, "C", Vec3::ZERO);
    engine.render(&mut pipeline, 64, 64, false);

    assert_eq!(engine.device().programs_created, 6);
    assert!(engine.cache().record(first).is_none());
    assert!(engine.cache().record(replacement).is_some());
    assert_eq!(engine.device().programs.len(), 4);
}

#[test]
fn flush_cache_rebuilds_everything() {
    let (mut engine, _) = engine();
    let mut pipeline = single_pass();

    engine.render(&mut pipeline, 64, 64, false);
    let window = engine.window_texture().unwrap();

    engine.flush_cache();
    assert!(engine.cache().is_empty());
    assert!(engine.device().programs.is_empty());
    assert!(engine.device().framebuffers.is_empty());
    // picks issued before the next frame still see the window size
    assert_eq!(engine.last_size(), Some(UVec2::new(64, 64)));

    engine.render(&mut pipeline, 64, 64, false);
    assert_eq!(engine.device().programs_created, 4);
    assert_eq!(engine.device().programs.len(), 2);
    assert_ne!(engine.window_texture(), Some(window));
    assert!(!engine.device().textures.contains_key(&window));
}

#[test]
fn settings_change_recreates_window_targets() {
    let (mut engine, _) = engine();
    let mut pipeline = single_pass();

    engine.render(&mut pipeline, 64, 64, false);
    let window = engine.window_texture().unwrap();

    engine.settings_mut().use_alpha_channel = true;
    assert_eq!(engine.last_size(), Some(UVec2::new(64, 64)));

    engine.render(&mut pipeline, 64, 64, false);
    let recreated = engine.window_texture().unwrap();
    assert_ne!(recreated, window);
    assert!(!engine.device().textures.contains_key(&window));

    // only once
    engine.render(&mut pipeline, 64, 64, false);
    assert_eq!(engine.window_texture(), Some(recreated));
}

#[test]
fn resize_rebuilds_framebuffers() {
    let (mut engine, _) = engine();
    let mut pipeline = single_pass();

    engine.render(&mut pipeline, 64, 64, false);
    let id = pipeline.items()[0].id;
    let before = engine
        .cache()
        .record(id)
        .and_then(|r| r.pass())
        .and_then(|p| p.framebuffers.clone())
        .unwrap();

    engine.render(&mut pipeline, 128, 64, false);
    let after = engine
        .cache()
        .record(id)
        .and_then(|r| r.pass())
        .and_then(|p| p.framebuffers.clone())
        .unwrap();

    assert_ne!(before.primary, after.primary);
    assert!(after.generation > before.generation);
    assert_eq!(engine.device().framebuffers.len(), 1);
    assert_eq!(engine.device().programs_created, 2);
}

#[test]
fn shutdown_releases_device_objects() {
    let (mut engine, _) = engine();
    let mut pipeline = single_pass();
    engine.render(&mut pipeline, 64, 64, false);

    engine.shutdown();

    let device = engine.device();
    assert!(device.programs.is_empty());
    assert!(device.framebuffers.is_empty());
    assert!(device.textures.is_empty());
}

// ============================================================================
// Compile Failure Tests
// ============================================================================

#[test]
fn compile_failure_degrades_one_pass() {
    let broken = FRAGMENT_SHADER.replace("color = vec4(1.0);", FAIL_MARKER);
    let project = default_project();
    project.write("broken.frag", &broken);
    let mut engine = engine_with(&project, TestRegistry::new(), test_settings());

    let mut pipeline = Pipeline::new();
    let bad = pipeline.add(
        "Broken",
        ItemKind::ShaderPass(prism::pipeline::ShaderPass::new(
            ShaderStageDesc::new("simple.vert", "main"),
            ShaderStageDesc::new("broken.frag", "main"),
        )),
    );
    add_cube(&mut pipeline, bad, "A", Vec3::ZERO);
    let good = add_pass(&mut pipeline, "Good", &[RenderTargetRef::Window]);
    add_cube(&mut pipeline, good, "B", Vec3::ZERO);

    engine.render(&mut pipeline, 64, 64, false);

    assert_eq!(engine.device().draw_count(), 1);
    assert!(engine.cache().record(bad).unwrap().pass().unwrap().program.is_none());

    let messages: Vec<_> = engine.services().messages.group("Broken").collect();
    assert!(messages.iter().any(|m| m.text == "Failed to compile the shader(s)"));
    let diagnostic = messages.iter().find(|m| m.text == "forced failure").unwrap();
    assert_eq!(diagnostic.severity, Severity::Error);
    assert_eq!(diagnostic.line, Some(5));
    assert_eq!(engine.services().messages.group("Good").count(), 1);
}

#[test]
fn macro_lines_are_subtracted_from_diagnostics() {
    let broken = FRAGMENT_SHADER.replace("color = vec4(1.0);", FAIL_MARKER);
    let project = default_project();
    project.write("broken.frag", &broken);
    let mut engine = engine_with(&project, TestRegistry::new(), test_settings());

    let mut pipeline = Pipeline::new();
    let mut pass = prism::pipeline::ShaderPass::new(
        ShaderStageDesc::new("simple.vert", "main"),
        ShaderStageDesc::new("broken.frag", "main"),
    );
    pass.macros = vec![ShaderMacro::new("QUALITY", "2"), ShaderMacro::new("SHADOWS", "")];
    let id = pipeline.add("Broken", ItemKind::ShaderPass(pass));
    add_cube(&mut pipeline, id, "A", Vec3::ZERO);

    engine.render(&mut pipeline, 64, 64, false);

    let line = engine
        .services()
        .messages
        .group("Broken")
        .find(|m| m.text == "forced failure")
        .and_then(|m| m.line);
    assert_eq!(line, Some(5));
}

#[test]
fn missing_stage_paths_are_reported() {
    let (mut engine, _) = engine();
    let mut pipeline = Pipeline::new();
    let id = pipeline.add(
        "Empty",
        ItemKind::ShaderPass(prism::pipeline::ShaderPass::new(
            ShaderStageDesc::new("simple.vert", "main"),
            ShaderStageDesc::default(),
        )),
    );
    add_cube(&mut pipeline, id, "A", Vec3::ZERO);

    engine.render(&mut pipeline, 64, 64, false);

    assert_eq!(engine.device().programs_created, 0);
    assert!(
        engine
            .services()
            .messages
            .group("Empty")
            .any(|m| m.text == "No shader paths are set")
    );
}

#[test]
fn failed_geometry_stage_disables_pass() {
    let (mut engine, _) = engine();
    let mut pipeline = Pipeline::new();
    let mut pass = prism::pipeline::ShaderPass::new(
        ShaderStageDesc::new("simple.vert", "main"),
        ShaderStageDesc::new("simple.frag", "main"),
    );
    pass.geometry = ShaderStageDesc::new("missing.geom", "main");
    pass.geometry_used = true;
    pass.set_targets(&[RenderTargetRef::Window]);
    let id = pipeline.add("Extruded", ItemKind::ShaderPass(pass));
    add_cube(&mut pipeline, id, "A", Vec3::ZERO);

    engine.render(&mut pipeline, 64, 64, false);

    assert_eq!(engine.device().programs_created, 0);
    assert_eq!(engine.device().draw_count(), 0);
    assert!(engine.cache().record(id).unwrap().pass().unwrap().program.is_none());

    let messages: Vec<_> = engine.services().messages.group("Extruded").collect();
    assert!(messages.iter().any(|m| m.text == "Failed to compile the shader(s)"));
    let load = messages
        .iter()
        .find(|m| m.text.starts_with("Failed to load \"missing.geom\""))
        .unwrap();
    assert_eq!(load.stage, Some(ShaderStage::Geometry));
}

#[test]
fn unused_geometry_stage_is_ignored() {
    let (mut engine, _) = engine();
    let mut pipeline = Pipeline::new();
    let mut pass = prism::pipeline::ShaderPass::new(
        ShaderStageDesc::new("simple.vert", "main"),
        ShaderStageDesc::new("simple.frag", "main"),
    );
    pass.geometry = ShaderStageDesc::new("missing.geom", "main");
    pass.set_targets(&[RenderTargetRef::Window]);
    let id = pipeline.add("Plain", ItemKind::ShaderPass(pass));
    add_cube(&mut pipeline, id, "A", Vec3::ZERO);

    engine.render(&mut pipeline, 64, 64, false);

    assert!(engine.cache().record(id).unwrap().pass().unwrap().program.is_some());
    assert_eq!(engine.device().draw_count(), 1);
}

// ============================================================================
// MSAA Tests
// ============================================================================

#[test]
fn msaa_resolves_every_attachment() {
    let project = default_project();
    let mut registry = TestRegistry::new();
    let rt = registry.add_render_texture("Normals", false, Vec4::ZERO);
    let settings = EngineSettings {
        msaa_samples: 4,
        ..test_settings()
    };
    let mut engine = engine_with(&project, registry, settings);

    let mut pipeline = Pipeline::new();
    let pass = add_pass(
        &mut pipeline,
        "Deferred",
        &[RenderTargetRef::Window, RenderTargetRef::Texture(rt)],
    );
    add_cube(&mut pipeline, pass, "Box", Vec3::ZERO);

    engine.render(&mut pipeline, 64, 64, false);

    let framebuffers = engine
        .cache()
        .record(pass)
        .and_then(|r| r.pass())
        .and_then(|p| p.framebuffers.clone())
        .unwrap();
    let multisampled = framebuffers.multisampled.unwrap();

    let device = engine.device();
    assert_eq!(device.render_passes()[0].0, multisampled);
    assert!(device.commands.contains(&Command::Resolve {
        source: multisampled,
        destination: framebuffers.primary,
        attachments: 2,
    }));

    let window = engine.window_texture().unwrap();
    let texture = engine.services().objects.render_texture(rt).unwrap();
    assert_eq!(device.pixel(window), Some(DRAW_COLOR));
    assert_eq!(device.pixel(texture.color), Some(DRAW_COLOR));
    assert_eq!(device.textures[&texture.color_ms.unwrap()].samples, 4);
}

#[test]
fn msaa_needs_every_target_multisampled() {
    let project = default_project();
    let mut engine = engine_with(
        &project,
        TestRegistry::new(),
        EngineSettings {
            msaa_samples: 4,
            ..test_settings()
        },
    );
    let mut pipeline = single_pass();
    engine.render(&mut pipeline, 64, 64, false);

    // toggling MSAA off recreates the window without companions
    engine.settings_mut().msaa_samples = 1;
    engine.device_mut().clear_commands();
    engine.render(&mut pipeline, 64, 64, false);

    let id = pipeline.items()[0].id;
    let framebuffers = engine
        .cache()
        .record(id)
        .and_then(|r| r.pass())
        .and_then(|p| p.framebuffers.clone())
        .unwrap();
    assert!(framebuffers.multisampled.is_none());
    assert_eq!(engine.device().count(|c| matches!(c, Command::Resolve { .. })), 0);
}

// ============================================================================
// Compute Tests
// ============================================================================

fn compute_engine(capabilities: DeviceCapabilities) -> (RenderEngine<MockDevice>, Pipeline) {
    common::init_logger();
    let project = MemoryProject::with_files(&[(
        "particles.comp",
        "#version 430\nlayout(local_size_x = 64) in;\nvoid main()\n{\n}\n",
    )]);
    let services = EngineServices::new(Box::new(project), Box::new(TestRegistry::new()));
    let engine = RenderEngine::new(MockDevice::with_capabilities(capabilities), services, test_settings());

    let mut pipeline = Pipeline::new();
    pipeline.add(
        "Particles",
        ItemKind::ComputePass(ComputePass::new(
            ShaderStageDesc::new("particles.comp", "main"),
            UVec3::new(16, 1, 1),
        )),
    );
    (engine, pipeline)
}

#[test]
fn compute_dispatch_is_followed_by_barrier() {
    let (mut engine, mut pipeline) = compute_engine(DeviceCapabilities::default());

    engine.render(&mut pipeline, 64, 64, false);

    let commands = &engine.device().commands;
    let dispatch = commands
        .iter()
        .position(|c| *c == Command::Dispatch(UVec3::new(16, 1, 1)))
        .unwrap();
    assert_eq!(commands[dispatch + 1], Command::Barrier(MemoryBarrier::COMPUTE_WRITES));
}

#[test]
fn compute_skipped_when_paused_or_debugging() {
    let (mut engine, mut pipeline) = compute_engine(DeviceCapabilities::default());

    engine.render(&mut pipeline, 64, 64, true);
    engine.pause(true);
    engine.render(&mut pipeline, 64, 64, false);

    assert_eq!(engine.device().count(|c| matches!(c, Command::Dispatch(_))), 0);
}

#[test]
fn compute_skipped_without_support() {
    let (mut engine, mut pipeline) = compute_engine(DeviceCapabilities {
        compute: false,
        ..Default::default()
    });

    engine.render(&mut pipeline, 64, 64, false);

    assert_eq!(engine.device().programs_created, 0);
    assert_eq!(engine.device().count(|c| matches!(c, Command::Dispatch(_))), 0);
}

// ============================================================================
// Audio Tests
// ============================================================================

const AUDIO_PROGRAM: ProgramId = ProgramId::from_raw(900);

struct CountingStream {
    renders: Rc<RefCell<usize>>,
    program: Option<ProgramId>,
}

impl AudioStream for CountingStream {
    fn compile(
        &mut self,
        _device: &mut dyn GpuDevice,
        _source: &str,
        _language: ShaderLanguage,
    ) -> Result<(), String> {
        self.program = Some(AUDIO_PROGRAM);
        Ok(())
    }

    fn program(&self) -> Option<ProgramId> {
        self.program
    }

    fn render(&mut self, _device: &mut dyn GpuDevice) {
        *self.renders.borrow_mut() += 1;
    }
}

fn audio_engine() -> (RenderEngine<MockDevice>, Pipeline, Rc<RefCell<usize>>) {
    let renders = Rc::new(RefCell::new(0));
    let stream = CountingStream {
        renders: Rc::clone(&renders),
        program: None,
    };

    let mut pipeline = Pipeline::new();
    let id = pipeline.add("Noise", ItemKind::AudioPass(AudioPass::new("noise.glsl", Box::new(stream))));

    let project = default_project();
    project.write("noise.glsl", FRAGMENT_SHADER);
    let mut registry = TestRegistry::new();
    registry.bind(id, ResourceBinding::Buffer(BufferId::from_raw(5)));
    let engine = engine_with(&project, registry, test_settings());
    (engine, pipeline, renders)
}

#[test]
fn audio_pass_binds_then_renders_stream() {
    let (mut engine, mut pipeline, renders) = audio_engine();

    engine.render(&mut pipeline, 64, 64, false);

    assert_eq!(*renders.borrow(), 1);
    let commands = &engine.device().commands;
    let program = commands
        .iter()
        .position(|c| *c == Command::UseProgram(AUDIO_PROGRAM))
        .unwrap();
    let buffer = commands
        .iter()
        .position(|c| *c == Command::BindStorageBuffer(0, BufferId::from_raw(5)))
        .unwrap();
    assert!(program < buffer);
    assert!(
        engine
            .services()
            .messages
            .group("Noise")
            .any(|m| m.text == "Compiled the shaders.")
    );
}

#[test]
fn audio_pass_skipped_in_debug_frames() {
    let (mut engine, mut pipeline, renders) = audio_engine();

    engine.render(&mut pipeline, 64, 64, true);
    assert_eq!(*renders.borrow(), 0);
    assert_eq!(
        engine
            .device()
            .count(|c| matches!(c, Command::BindStorageBuffer(..))),
        0
    );

    engine.render(&mut pipeline, 64, 64, false);
    assert_eq!(*renders.borrow(), 1);
}
