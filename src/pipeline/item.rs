use std::fmt;

use super::geometry::{GeometryItem, ModelItem};
use super::pass::{AudioPass, ComputePass, PluginItem, ShaderPass};
use super::state::RenderState;

/// Stable identity of a pipeline item.
///
/// Ids survive renames and reorders; they are what the engine's resource
/// cache is keyed by. [`Pipeline`](super::Pipeline) hands out fresh ids from a
/// monotonically increasing counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(u64);

impl ItemId {
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Type tag of a pipeline item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemType {
    ShaderPass,
    ComputePass,
    AudioPass,
    RenderState,
    Geometry,
    Model,
    PluginItem,
}

/// Type-specific payload of a pipeline item.
pub enum ItemKind {
    ShaderPass(ShaderPass),
    ComputePass(ComputePass),
    AudioPass(AudioPass),
    RenderState(RenderState),
    Geometry(GeometryItem),
    Model(ModelItem),
    Plugin(PluginItem),
}

impl ItemKind {
    #[must_use]
    pub fn item_type(&self) -> ItemType {
        match self {
            Self::ShaderPass(_) => ItemType::ShaderPass,
            Self::ComputePass(_) => ItemType::ComputePass,
            Self::AudioPass(_) => ItemType::AudioPass,
            Self::RenderState(_) => ItemType::RenderState,
            Self::Geometry(_) => ItemType::Geometry,
            Self::Model(_) => ItemType::Model,
            Self::Plugin(_) => ItemType::PluginItem,
        }
    }
}

impl fmt::Debug for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShaderPass(p) => f.debug_tuple("ShaderPass").field(p).finish(),
            Self::ComputePass(p) => f.debug_tuple("ComputePass").field(p).finish(),
            Self::AudioPass(p) => f.debug_tuple("AudioPass").field(&p.path).finish(),
            Self::RenderState(s) => f.debug_tuple("RenderState").field(s).finish(),
            Self::Geometry(g) => f.debug_tuple("Geometry").field(g).finish(),
            Self::Model(m) => f.debug_tuple("Model").field(m).finish(),
            Self::Plugin(p) => f.debug_tuple("Plugin").field(&p.item_type).finish(),
        }
    }
}

/// One entry of a pipeline: a top-level pass, or a draw/state item inside a
/// pass.
#[derive(Debug)]
pub struct PipelineItem {
    pub id: ItemId,
    pub name: String,
    pub kind: ItemKind,
}

impl PipelineItem {
    #[must_use]
    pub fn new(id: ItemId, name: impl Into<String>, kind: ItemKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
        }
    }

    #[inline]
    #[must_use]
    pub fn item_type(&self) -> ItemType {
        self.kind.item_type()
    }

    #[must_use]
    pub fn as_shader_pass(&self) -> Option<&ShaderPass> {
        match &self.kind {
            ItemKind::ShaderPass(pass) => Some(pass),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_shader_pass_mut(&mut self) -> Option<&mut ShaderPass> {
        match &mut self.kind {
            ItemKind::ShaderPass(pass) => Some(pass),
            _ => None,
        }
    }

    /// Items that can be hit by a pick: geometry, models, and plugin items.
    #[must_use]
    pub fn is_drawable(&self) -> bool {
        matches!(
            self.kind,
            ItemKind::Geometry(_) | ItemKind::Model(_) | ItemKind::Plugin(_)
        )
    }

    /// Child items of a pass or plugin item. Empty for leaf items.
    #[must_use]
    pub fn children(&self) -> &[PipelineItem] {
        match &self.kind {
            ItemKind::ShaderPass(pass) => &pass.items,
            ItemKind::Plugin(plugin) => &plugin.items,
            _ => &[],
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut Vec<PipelineItem>> {
        match &mut self.kind {
            ItemKind::ShaderPass(pass) => Some(&mut pass.items),
            ItemKind::Plugin(plugin) => Some(&mut plugin.items),
            _ => None,
        }
    }
}
