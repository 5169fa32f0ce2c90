use std::path::{Path, PathBuf};

use glam::UVec3;

use super::item::PipelineItem;
use super::macros::ShaderMacro;
use super::variables::VariableTable;
use crate::services::{AudioStream, PluginRef, RenderTextureId};

/// Maximum number of color targets a shader pass can bind.
pub const MAX_RENDER_TARGETS: usize = 16;

/// Fixed-capacity render target array. The first `None` terminates the list.
pub type RenderTargets = [Option<RenderTargetRef>; MAX_RENDER_TARGETS];

/// A color target bound by a shader pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderTargetRef {
    /// The shared window surface owned by the engine.
    Window,
    /// A render texture owned by the object registry.
    Texture(RenderTextureId),
}

/// Source file and entry point of one shader stage.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShaderStageDesc {
    pub path: PathBuf,
    pub entry: String,
}

impl ShaderStageDesc {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, entry: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            entry: entry.into(),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.path.as_os_str().is_empty()
    }
}

// ─── ShaderPass ──────────────────────────────────────────────────────────────

/// A raster pass: a vertex/fragment(/geometry) program plus the draw and
/// state items it executes, rendered into up to [`MAX_RENDER_TARGETS`] color
/// targets.
#[derive(Debug)]
pub struct ShaderPass {
    pub active: bool,
    /// Draw calls and state blocks, executed in order.
    pub items: Vec<PipelineItem>,
    pub render_targets: RenderTargets,
    pub macros: Vec<ShaderMacro>,
    pub vertex: ShaderStageDesc,
    pub fragment: ShaderStageDesc,
    pub geometry: ShaderStageDesc,
    /// Whether the geometry stage takes part in the program.
    pub geometry_used: bool,
    pub variables: VariableTable,
}

impl Default for ShaderPass {
    fn default() -> Self {
        Self {
            active: true,
            items: Vec::new(),
            render_targets: [None; MAX_RENDER_TARGETS],
            macros: Vec::new(),
            vertex: ShaderStageDesc::default(),
            fragment: ShaderStageDesc::default(),
            geometry: ShaderStageDesc::default(),
            geometry_used: false,
            variables: VariableTable::default(),
        }
    }
}

impl ShaderPass {
    /// Creates an active pass rendering to the window surface.
    #[must_use]
    pub fn new(vertex: ShaderStageDesc, fragment: ShaderStageDesc) -> Self {
        let mut pass = Self {
            vertex,
            fragment,
            ..Default::default()
        };
        pass.render_targets[0] = Some(RenderTargetRef::Window);
        pass
    }

    /// Number of bound color targets (position of the first empty slot).
    #[must_use]
    pub fn target_count(&self) -> usize {
        self.render_targets
            .iter()
            .position(Option::is_none)
            .unwrap_or(MAX_RENDER_TARGETS)
    }

    /// Bound color targets in attachment order.
    pub fn targets(&self) -> impl Iterator<Item = RenderTargetRef> + '_ {
        self.render_targets.iter().map_while(|t| *t)
    }

    /// Replaces the bound targets. Extra entries beyond capacity are ignored.
    pub fn set_targets(&mut self, targets: &[RenderTargetRef]) {
        self.render_targets = [None; MAX_RENDER_TARGETS];
        for (slot, target) in self.render_targets.iter_mut().zip(targets) {
            *slot = Some(*target);
        }
    }

    /// Whether any stage of this pass is read from `path`.
    #[must_use]
    pub fn uses_file(&self, path: &Path) -> bool {
        self.vertex.path == path
            || self.fragment.path == path
            || (self.geometry_used && self.geometry.path == path)
    }
}

// ─── ComputePass ─────────────────────────────────────────────────────────────

/// A compute dispatch with its work-group counts.
#[derive(Debug)]
pub struct ComputePass {
    pub work_groups: UVec3,
    pub shader: ShaderStageDesc,
    pub macros: Vec<ShaderMacro>,
    pub variables: VariableTable,
}

impl ComputePass {
    #[must_use]
    pub fn new(shader: ShaderStageDesc, work_groups: UVec3) -> Self {
        Self {
            work_groups,
            shader,
            macros: Vec::new(),
            variables: VariableTable::default(),
        }
    }
}

// ─── AudioPass ───────────────────────────────────────────────────────────────

/// A shader-driven audio pass. Synthesis itself is done by the stream.
pub struct AudioPass {
    pub path: PathBuf,
    pub macros: Vec<ShaderMacro>,
    pub variables: VariableTable,
    pub stream: Option<Box<dyn AudioStream>>,
}

impl AudioPass {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, stream: Box<dyn AudioStream>) -> Self {
        Self {
            path: path.into(),
            macros: Vec::new(),
            variables: VariableTable::default(),
            stream: Some(stream),
        }
    }
}

// ─── PluginItem ──────────────────────────────────────────────────────────────

/// An item whose behavior is implemented by a plugin.
pub struct PluginItem {
    pub owner: PluginRef,
    /// Plugin-defined type name.
    pub item_type: String,
    /// Opaque plugin-side handle.
    pub user_data: u64,
    pub items: Vec<PipelineItem>,
}

impl PluginItem {
    #[must_use]
    pub fn new(owner: PluginRef, item_type: impl Into<String>, user_data: u64) -> Self {
        Self {
            owner,
            item_type: item_type.into(),
            user_data,
            items: Vec::new(),
        }
    }
}
