//! Pipeline Model
//!
//! The declarative, user-edited description of what gets rendered. A
//! [`Pipeline`] is an ordered list of top-level passes; shader passes own
//! their draw and state items. The engine never stores references into a
//! pipeline: it keys its GPU resources by [`ItemId`] and reconciles against
//! whatever list it is handed on each frame.
//!
//! ```rust,ignore
//! use prism::pipeline::*;
//!
//! let mut pipeline = Pipeline::new();
//! let pass = pipeline.add("Simple", ItemKind::ShaderPass(ShaderPass::new(
//!     ShaderStageDesc::new("simple.vert", "main"),
//!     ShaderStageDesc::new("simple.frag", "main"),
//! )));
//! pipeline.add_child(pass, "Box", ItemKind::Geometry(GeometryItem::new(GeometryShape::Cube, Vec3::ONE)));
//! ```

pub mod geometry;
pub mod item;
pub mod macros;
pub mod pass;
pub mod state;
pub mod variables;

pub use geometry::{BoundingBox, GeometryItem, GeometryShape, MeshData, ModelData, ModelItem};
pub use item::{ItemId, ItemKind, ItemType, PipelineItem};
pub use macros::ShaderMacro;
pub use pass::{
    AudioPass, ComputePass, MAX_RENDER_TARGETS, PluginItem, RenderTargetRef, RenderTargets,
    ShaderPass, ShaderStageDesc,
};
pub use state::RenderState;
pub use variables::{ItemVariableValue, ShaderVariable, SystemValue, UniformValue, VariableTable};

/// The authoritative, ordered list of top-level pipeline items.
#[derive(Debug, Default)]
pub struct Pipeline {
    items: Vec<PipelineItem>,
    next_id: u64,
}

impl Pipeline {
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            next_id: 1,
        }
    }

    /// Hands out a fresh identity.
    pub fn allocate_id(&mut self) -> ItemId {
        // `Default` starts at 0; keep ids nonzero either way.
        self.next_id = self.next_id.max(1);
        let id = ItemId::from_raw(self.next_id);
        self.next_id += 1;
        id
    }

    /// Appends a top-level item.
    pub fn add(&mut self, name: impl Into<String>, kind: ItemKind) -> ItemId {
        let index = self.items.len();
        self.insert(index, name, kind)
    }

    /// Inserts a top-level item at `index` (clamped to the list length).
    pub fn insert(&mut self, index: usize, name: impl Into<String>, kind: ItemKind) -> ItemId {
        let id = self.allocate_id();
        let index = index.min(self.items.len());
        self.items.insert(index, PipelineItem::new(id, name, kind));
        id
    }

    /// Appends an already built item, keeping its id.
    ///
    /// The id allocator is advanced past `item.id`. Pushing two items with the
    /// same id is allowed here; the engine only honors the first of them.
    pub fn push_item(&mut self, item: PipelineItem) {
        self.next_id = self.next_id.max(item.id.raw() + 1);
        self.items.push(item);
    }

    /// Appends a child to a shader pass or plugin item. Returns `None` when
    /// `parent` is not a top-level item that can own children.
    pub fn add_child(
        &mut self,
        parent: ItemId,
        name: impl Into<String>,
        kind: ItemKind,
    ) -> Option<ItemId> {
        let id = self.allocate_id();
        let parent = self.items.iter_mut().find(|i| i.id == parent)?;
        parent
            .children_mut()?
            .push(PipelineItem::new(id, name, kind));
        Some(id)
    }

    /// Removes a top-level item or a child item.
    pub fn remove(&mut self, id: ItemId) -> Option<PipelineItem> {
        if let Some(index) = self.position(id) {
            return Some(self.items.remove(index));
        }
        self.items.iter_mut().find_map(|parent| {
            let children = parent.children_mut()?;
            let index = children.iter().position(|c| c.id == id)?;
            Some(children.remove(index))
        })
    }

    /// Moves the top-level item at `from` so that it ends up at `to`.
    pub fn move_item(&mut self, from: usize, to: usize) {
        if from >= self.items.len() {
            return;
        }
        let item = self.items.remove(from);
        let to = to.min(self.items.len());
        self.items.insert(to, item);
    }

    #[must_use]
    pub fn items(&self) -> &[PipelineItem] {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut [PipelineItem] {
        &mut self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn position(&self, id: ItemId) -> Option<usize> {
        self.items.iter().position(|i| i.id == id)
    }

    #[must_use]
    pub fn get(&self, id: ItemId) -> Option<&PipelineItem> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn get_mut(&mut self, id: ItemId) -> Option<&mut PipelineItem> {
        self.items.iter_mut().find(|i| i.id == id)
    }

    /// Finds a top-level item by name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&PipelineItem> {
        self.items.iter().find(|i| i.name == name)
    }

    /// Finds a child item and the top-level item owning it.
    #[must_use]
    pub fn find_child(&self, id: ItemId) -> Option<(&PipelineItem, &PipelineItem)> {
        self.items.iter().find_map(|parent| {
            parent
                .children()
                .iter()
                .find(|c| c.id == id)
                .map(|child| (parent, child))
        })
    }

    /// Returns a child item by id, searching every pass.
    pub fn child_mut(&mut self, id: ItemId) -> Option<&mut PipelineItem> {
        self.items.iter_mut().find_map(|parent| {
            parent
                .children_mut()?
                .iter_mut()
                .find(|c| c.id == id)
        })
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;

    fn pass() -> ItemKind {
        ItemKind::ShaderPass(ShaderPass::new(
            ShaderStageDesc::new("a.vert", "main"),
            ShaderStageDesc::new("a.frag", "main"),
        ))
    }

    #[test]
    fn test_ids_are_unique_and_stable() {
        let mut pipeline = Pipeline::new();
        let a = pipeline.add("A", pass());
        let b = pipeline.add("B", pass());
        assert_ne!(a, b);

        pipeline.move_item(1, 0);
        assert_eq!(pipeline.items()[0].id, b);
        assert_eq!(pipeline.items()[1].id, a);
    }

    #[test]
    fn test_children() {
        let mut pipeline = Pipeline::new();
        let p = pipeline.add("P", pass());
        let cube = pipeline
            .add_child(p, "Cube", ItemKind::Geometry(GeometryItem::new(GeometryShape::Cube, Vec3::ONE)))
            .unwrap();

        let (parent, child) = pipeline.find_child(cube).unwrap();
        assert_eq!(parent.id, p);
        assert_eq!(child.name, "Cube");

        assert!(pipeline.add_child(cube, "Nested", ItemKind::RenderState(RenderState::default())).is_none());

        let removed = pipeline.remove(cube).unwrap();
        assert_eq!(removed.id, cube);
        assert!(pipeline.get(p).unwrap().children().is_empty());
    }

    #[test]
    fn test_push_item_advances_allocator() {
        let mut pipeline = Pipeline::new();
        pipeline.push_item(PipelineItem::new(ItemId::from_raw(41), "X", pass()));
        let next = pipeline.add("Y", pass());
        assert_eq!(next.raw(), 42);
    }
}
