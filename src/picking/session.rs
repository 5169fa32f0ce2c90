use std::fmt;

use super::ray::Ray;
use super::shapes::intersect_item;
use crate::pipeline::{ItemId, PipelineItem};

/// Receives the last selected item once a pick resolves, or `None` when
/// nothing was hit.
pub type PickCallback = Box<dyn FnOnce(Option<ItemId>)>;

/// Ordered list of selected items, last entry most recent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    items: Vec<ItemId>,
}

impl Selection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an item.
    ///
    /// An item that is already selected stays selected; a single pick then
    /// drops everything else. A new item is appended by a multi pick and
    /// replaces the selection otherwise.
    pub fn add(&mut self, item: ItemId, multi: bool) {
        if self.items.contains(&item) {
            if !multi {
                self.items.clear();
                self.items.push(item);
            }
            return;
        }

        if !multi {
            self.items.clear();
        }
        self.items.push(item);
    }

    /// Programmatic selection: `None` clears, otherwise same rules as
    /// [`add`](Self::add).
    pub fn select(&mut self, item: Option<ItemId>, add: bool) {
        match item {
            Some(item) => self.add(item, add),
            None => self.items.clear(),
        }
    }

    pub fn remove(&mut self, item: ItemId) {
        self.items.retain(|&i| i != item);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    #[must_use]
    pub fn contains(&self, item: ItemId) -> bool {
        self.items.contains(&item)
    }

    #[must_use]
    pub fn last(&self) -> Option<ItemId> {
        self.items.last().copied()
    }

    #[must_use]
    pub fn items(&self) -> &[ItemId] {
        &self.items
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A ray pick waiting for the next frame.
///
/// Created by [`RenderEngine::pick`](crate::engine::RenderEngine::pick),
/// fed every pickable item the next render draws, and resolved when that
/// render finishes.
pub struct PickSession {
    ray: Ray,
    multi: bool,
    closest: f32,
    hit: Option<ItemId>,
    callback: Option<PickCallback>,
}

impl PickSession {
    #[must_use]
    pub fn new(ray: Ray, multi: bool, callback: Option<PickCallback>) -> Self {
        Self {
            ray,
            multi,
            closest: f32::INFINITY,
            hit: None,
            callback,
        }
    }

    #[must_use]
    pub fn ray(&self) -> &Ray {
        &self.ray
    }

    #[must_use]
    pub fn is_multi(&self) -> bool {
        self.multi
    }

    /// Distance of the closest hit so far, infinite before any hit.
    #[must_use]
    pub fn closest(&self) -> f32 {
        self.closest
    }

    #[must_use]
    pub fn hit(&self) -> Option<ItemId> {
        self.hit
    }

    /// Tests one item. Only a strictly closer hit replaces the current one,
    /// so the earlier item wins ties.
    pub fn test(&mut self, item: &PipelineItem) -> bool {
        match intersect_item(item, &self.ray, self.closest) {
            Some(t) if t < self.closest => {
                self.closest = t;
                self.hit = Some(item.id);
                true
            }
            _ => false,
        }
    }

    /// Applies the result to `selection` and runs the callback.
    pub fn finish(self, selection: &mut Selection) {
        match self.hit {
            Some(item) => selection.add(item, self.multi),
            None => selection.clear(),
        }

        if let Some(callback) = self.callback {
            callback(selection.last());
        }
    }
}

impl fmt::Debug for PickSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PickSession")
            .field("ray", &self.ray)
            .field("multi", &self.multi)
            .field("closest", &self.closest)
            .field("hit", &self.hit)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use glam::Vec3;

    use super::*;
    use crate::pipeline::{GeometryItem, GeometryShape, ItemKind};

    fn id(n: u64) -> ItemId {
        ItemId::from_raw(n)
    }

    #[test]
    fn test_selection_rules() {
        let mut sel = Selection::new();
        sel.add(id(1), false);
        sel.add(id(2), true);
        assert_eq!(sel.items(), &[id(1), id(2)]);

        // re-adding in multi mode keeps membership
        sel.add(id(1), true);
        assert_eq!(sel.items(), &[id(1), id(2)]);

        // re-adding in single mode resets to that item
        sel.add(id(2), false);
        assert_eq!(sel.items(), &[id(2)]);

        sel.add(id(3), false);
        assert_eq!(sel.items(), &[id(3)]);

        sel.select(None, true);
        assert!(sel.is_empty());
    }

    fn cube_at(n: u64, z: f32) -> PipelineItem {
        PipelineItem::new(
            id(n),
            "cube",
            ItemKind::Geometry(GeometryItem::new(GeometryShape::Cube, Vec3::ONE).with_position(Vec3::new(0.0, 0.0, z))),
        )
    }

    #[test]
    fn test_closest_hit_wins_regardless_of_order() {
        let ray = Ray::new(Vec3::new(0.0, 0.0, 10.0), Vec3::NEG_Z);
        let near = cube_at(1, 2.0);
        let far = cube_at(2, -2.0);

        let mut session = PickSession::new(ray, false, None);
        session.test(&far);
        session.test(&near);
        assert_eq!(session.hit(), Some(id(1)));

        let mut session = PickSession::new(ray, false, None);
        session.test(&near);
        session.test(&far);
        assert_eq!(session.hit(), Some(id(1)));
    }

    #[test]
    fn test_ties_keep_first_item() {
        let ray = Ray::new(Vec3::new(0.0, 0.0, 10.0), Vec3::NEG_Z);
        let mut session = PickSession::new(ray, false, None);
        session.test(&cube_at(1, 0.0));
        session.test(&cube_at(2, 0.0));
        assert_eq!(session.hit(), Some(id(1)));
    }

    #[test]
    fn test_finish_reports_last_selected() {
        let seen = Rc::new(Cell::new(None));
        let sink = Rc::clone(&seen);

        let mut selection = Selection::new();
        selection.add(id(9), false);

        let ray = Ray::new(Vec3::new(0.0, 0.0, 10.0), Vec3::NEG_Z);
        let mut session = PickSession::new(ray, true, Some(Box::new(move |hit| sink.set(Some(hit)))));
        session.test(&cube_at(4, 0.0));
        session.finish(&mut selection);

        assert_eq!(selection.items(), &[id(9), id(4)]);
        assert_eq!(seen.get(), Some(Some(id(4))));
    }

    #[test]
    fn test_miss_clears_selection() {
        let mut selection = Selection::new();
        selection.add(id(9), false);

        let ray = Ray::new(Vec3::new(50.0, 0.0, 10.0), Vec3::NEG_Z);
        let mut session = PickSession::new(ray, false, None);
        session.test(&cube_at(4, 0.0));
        session.finish(&mut selection);
        assert!(selection.is_empty());
    }
}
