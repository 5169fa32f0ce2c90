//! Plugin interface.
//!
//! Plugins contribute their own pipeline item types and bindable objects. The
//! engine never interprets plugin data: it hands the owning plugin the item
//! and lets it draw, bind, or intersect.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use glam::Mat4;

use super::objects::PluginObject;
use crate::device::GpuDevice;
use crate::engine::FrameContext;
use crate::picking::Ray;
use crate::pipeline::PluginItem;

/// Hooks a plugin implements. Every method has a no-op default.
///
/// Methods take `&self`: a plugin is shared between every item and object it
/// owns, so it keeps its own mutable state behind interior mutability.
pub trait Plugin {
    fn name(&self) -> &str;

    /// Called once per frame before the first pass.
    fn begin_render(&self) {}

    /// Called once per frame after the last pass.
    fn end_render(&self) {}

    /// Binds a plugin object to resource `slot` of the current program.
    fn bind_object(&self, _device: &mut dyn GpuDevice, _object: &PluginObject, _slot: u32) {}

    /// Executes a top-level plugin item together with its sub-items.
    fn execute_item(&self, _device: &mut dyn GpuDevice, _item: &PluginItem) {}

    /// Draws a plugin item placed inside the shader pass named `pass`.
    fn execute_pass_item(
        &self,
        _device: &mut dyn GpuDevice,
        _pass: &str,
        _item: &PluginItem,
        _context: &FrameContext,
    ) {
    }

    /// Whether items of `item_type` can be hit by a ray pick.
    fn is_item_pickable(&self, _item_type: &str) -> bool {
        false
    }

    /// Distance along `ray` (already in the item's local space) to the item,
    /// if hit.
    fn intersect_item(&self, _item: &PluginItem, _ray: &Ray) -> Option<f32> {
        None
    }

    /// World transform of the item named `name`.
    fn item_world_matrix(&self, _name: &str) -> Mat4 {
        Mat4::IDENTITY
    }

    /// The item named `name` was asked to recompile.
    fn handle_recompile(&self, _name: &str) {}
}

/// Shared reference to a plugin.
#[derive(Clone)]
pub struct PluginRef(Arc<dyn Plugin>);

impl PluginRef {
    pub fn new(plugin: impl Plugin + 'static) -> Self {
        Self(Arc::new(plugin))
    }

    /// Whether both references point at the same plugin instance.
    #[must_use]
    pub fn ptr_eq(&self, other: &PluginRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<Arc<dyn Plugin>> for PluginRef {
    fn from(plugin: Arc<dyn Plugin>) -> Self {
        Self(plugin)
    }
}

impl Deref for PluginRef {
    type Target = dyn Plugin;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

impl fmt::Debug for PluginRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PluginRef").field(&self.0.name()).finish()
    }
}

/// Every loaded plugin, in load order.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    plugins: Vec<PluginRef>,
}

impl PluginRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: PluginRef) {
        log::info!("Registered plugin '{}'", plugin.name());
        self.plugins.push(plugin);
    }

    pub fn iter(&self) -> impl Iterator<Item = &PluginRef> {
        self.plugins.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn begin_render(&self) {
        for plugin in &self.plugins {
            plugin.begin_render();
        }
    }

    pub fn end_render(&self) {
        for plugin in &self.plugins {
            plugin.end_render();
        }
    }
}
