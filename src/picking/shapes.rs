//! Per-shape ray tests used by the geometric pick.
//!
//! Every test receives the ray already transformed into the item's local
//! space. Built-in shapes are tested against analytic stand-ins sized by
//! `size * scale`; models are tested triangle by triangle.

use glam::Vec3;

use super::ray::Ray;
use crate::pipeline::{GeometryItem, GeometryShape, ItemKind, ModelData, PipelineItem};

/// Half thickness of the boxes standing in for flat shapes.
const FLAT_HALF_DEPTH: f32 = 0.0001;

/// Intersects a built-in shape. Screen-space shapes never hit.
#[must_use]
pub fn intersect_geometry(geometry: &GeometryItem, ray: &Ray) -> Option<f32> {
    let extent = geometry.size * geometry.scale;

    match geometry.shape {
        GeometryShape::Cube => ray.intersect_aabb(-extent * 0.5, extent * 0.5),
        GeometryShape::Plane => {
            let half = Vec3::new(extent.x * 0.5, extent.y * 0.5, FLAT_HALF_DEPTH);
            ray.intersect_aabb(-half, half)
        }
        GeometryShape::Circle => {
            let half = Vec3::new(extent.x, extent.y, FLAT_HALF_DEPTH);
            ray.intersect_aabb(-half, half)
        }
        GeometryShape::Sphere => ray.intersect_sphere(Vec3::ZERO, extent.x),
        GeometryShape::Triangle => {
            let s = extent.x;
            let right = s / 30f32.to_radians().tan();
            ray.intersect_triangle(
                Vec3::new(0.0, -s, 0.0),
                Vec3::new(-right, s, 0.0),
                Vec3::new(right, s, 0.0),
            )
        }
        GeometryShape::Rectangle | GeometryShape::ScreenQuadNdc => None,
    }
}

/// Intersects a model's triangles.
///
/// The bounding box is tested first; triangles are only tested when the box
/// is hit closer than `closest`, since nothing inside it could win otherwise.
#[must_use]
pub fn intersect_model(model: &ModelData, ray: &Ray, closest: f32) -> Option<f32> {
    if model.bounds.is_empty() {
        return None;
    }

    let box_hit = ray.intersect_aabb(model.bounds.min, model.bounds.max)?;
    if box_hit >= closest {
        return None;
    }

    model
        .triangles()
        .filter_map(|[v0, v1, v2]| ray.intersect_triangle(v0, v1, v2))
        .min_by(f32::total_cmp)
}

/// Tests any pickable pipeline item against a world-space ray.
///
/// `closest` is the best distance found so far; it only prunes work and is
/// not compared against the returned hit.
#[must_use]
pub fn intersect_item(item: &PipelineItem, ray: &Ray, closest: f32) -> Option<f32> {
    match &item.kind {
        ItemKind::Geometry(geometry) => {
            if !geometry.shape.is_pickable() {
                return None;
            }
            intersect_geometry(geometry, &ray.transformed(geometry.pick_matrix()))
        }
        ItemKind::Model(model) => {
            intersect_model(&model.model, &ray.transformed(model.pick_matrix()), closest)
        }
        ItemKind::Plugin(plugin) => {
            if !plugin.owner.is_item_pickable(&plugin.item_type) {
                return None;
            }
            let world = plugin.owner.item_world_matrix(&item.name);
            plugin.owner.intersect_item(plugin, &ray.transformed(world))
        }
        _ => None,
    }
}
