use glam::{Mat4, Vec2, Vec3, Vec4};

const EPSILON: f32 = 1e-6;

/// A ray `origin + t * direction`.
///
/// Intersection tests return the parameter `t` of the nearest hit in front
/// of the origin. World-space pick rays have a unit direction, and
/// [`transformed`](Self::transformed) keeps the direction unnormalized, so
/// `t` measured against a local-space ray is still a world-space distance
/// and hits on differently scaled items compare directly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    #[must_use]
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// Builds a world-space pick ray through a screen point.
    ///
    /// `screen` is in pixels with the origin at the bottom-left corner of a
    /// `viewport`-sized target. The point is unprojected onto the far plane
    /// and divided by `w`; the ray starts at `camera_position` and points along
    /// `normalize(far - camera_position)`. With the camera at the origin this
    /// is the normalized unprojected point.
    #[must_use]
    pub fn from_screen(
        screen: Vec2,
        viewport: Vec2,
        view_projection: Mat4,
        camera_position: Vec3,
    ) -> Self {
        let ndc = Vec2::new(
            screen.x / (viewport.x * 0.5) - 1.0,
            screen.y / (viewport.y * 0.5) - 1.0,
        );

        let world = view_projection.inverse() * Vec4::new(ndc.x, ndc.y, 1.0, 1.0);
        let far = if world.w.abs() > EPSILON {
            world.truncate() / world.w
        } else {
            world.truncate()
        };

        Self {
            origin: camera_position,
            direction: (far - camera_position).normalize_or_zero(),
        }
    }

    /// Moves the ray into the local space of an object placed by `world`.
    #[must_use]
    pub fn transformed(&self, world: Mat4) -> Self {
        let inverse = world.inverse();
        Self {
            origin: inverse.transform_point3(self.origin),
            direction: inverse.transform_vector3(self.direction),
        }
    }

    #[inline]
    #[must_use]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Slab test against an axis-aligned box.
    #[must_use]
    pub fn intersect_aabb(&self, min: Vec3, max: Vec3) -> Option<f32> {
        let inv = self.direction.recip();
        let t1 = (min - self.origin) * inv;
        let t2 = (max - self.origin) * inv;

        // NaN from 0 * inf on a slab boundary falls through max/min below
        let t_near = t1.min(t2).max_element();
        let t_far = t1.max(t2).min_element();

        if t_far < t_near.max(0.0) {
            return None;
        }
        Some(if t_near >= 0.0 { t_near } else { t_far })
    }

    /// Solves the ray-sphere quadratic.
    #[must_use]
    pub fn intersect_sphere(&self, center: Vec3, radius: f32) -> Option<f32> {
        let oc = self.origin - center;
        let a = self.direction.length_squared();
        if a < EPSILON {
            return None;
        }
        let b = oc.dot(self.direction);
        let c = oc.length_squared() - radius * radius;
        let discriminant = b * b - a * c;
        if discriminant < 0.0 {
            return None;
        }

        let sqrt_d = discriminant.sqrt();
        let near = (-b - sqrt_d) / a;
        if near >= 0.0 {
            return Some(near);
        }
        let far = (-b + sqrt_d) / a;
        (far >= 0.0).then_some(far)
    }

    /// Möller–Trumbore, both faces.
    #[must_use]
    pub fn intersect_triangle(&self, v0: Vec3, v1: Vec3, v2: Vec3) -> Option<f32> {
        let edge1 = v1 - v0;
        let edge2 = v2 - v0;
        let p = self.direction.cross(edge2);
        let det = edge1.dot(p);
        if det.abs() < EPSILON {
            return None;
        }

        let inv_det = 1.0 / det;
        let s = self.origin - v0;
        let u = s.dot(p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(edge1);
        let v = self.direction.dot(q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = edge2.dot(q) * inv_det;
        (t > EPSILON).then_some(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screen_center_looks_forward() {
        let proj = Mat4::perspective_rh_gl(60f32.to_radians(), 1.0, 0.1, 100.0);
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        let ray = Ray::from_screen(
            Vec2::new(400.0, 400.0),
            Vec2::new(800.0, 800.0),
            proj * view,
            Vec3::new(0.0, 0.0, 5.0),
        );
        assert!((ray.direction - Vec3::NEG_Z).length() < 1e-4);
    }

    #[test]
    fn test_bottom_left_origin() {
        let proj = Mat4::perspective_rh_gl(90f32.to_radians(), 1.0, 0.1, 100.0);
        let ray = Ray::from_screen(Vec2::new(0.0, 0.0), Vec2::new(100.0, 100.0), proj, Vec3::ZERO);
        assert!(ray.direction.x < 0.0);
        assert!(ray.direction.y < 0.0);
    }

    #[test]
    fn test_direction_starts_at_offset_camera() {
        let eye = Vec3::new(12.0, 4.0, 20.0);
        let view_projection = Mat4::perspective_rh_gl(60f32.to_radians(), 1.0, 0.1, 100.0)
            * Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y);
        let ray = Ray::from_screen(Vec2::new(20.0, 70.0), Vec2::new(100.0, 100.0), view_projection, eye);

        let far = view_projection.inverse().project_point3(Vec3::new(-0.6, 0.4, 1.0));
        assert_eq!(ray.origin, eye);
        assert!((ray.direction - (far - eye).normalize()).length() < 1e-4);
        assert!((ray.direction - far.normalize()).length() > 1e-2);
    }

    #[test]
    fn test_aabb_hit_and_miss() {
        let ray = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z);
        let t = ray.intersect_aabb(Vec3::splat(-1.0), Vec3::splat(1.0)).unwrap();
        assert!((t - 4.0).abs() < 1e-5);

        let miss = Ray::new(Vec3::new(3.0, 0.0, 5.0), Vec3::NEG_Z);
        assert!(miss.intersect_aabb(Vec3::splat(-1.0), Vec3::splat(1.0)).is_none());

        let behind = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::Z);
        assert!(behind.intersect_aabb(Vec3::splat(-1.0), Vec3::splat(1.0)).is_none());
    }

    #[test]
    fn test_sphere() {
        let ray = Ray::new(Vec3::new(0.0, 0.0, 10.0), Vec3::NEG_Z);
        let t = ray.intersect_sphere(Vec3::ZERO, 2.0).unwrap();
        assert!((t - 8.0).abs() < 1e-5);
        assert!(Ray::new(Vec3::new(5.0, 0.0, 10.0), Vec3::NEG_Z)
            .intersect_sphere(Vec3::ZERO, 2.0)
            .is_none());
    }

    #[test]
    fn test_triangle() {
        let ray = Ray::new(Vec3::new(0.2, 0.2, 1.0), Vec3::NEG_Z);
        let t = ray
            .intersect_triangle(Vec3::ZERO, Vec3::X, Vec3::Y)
            .unwrap();
        assert!((t - 1.0).abs() < 1e-5);
        assert!(Ray::new(Vec3::new(0.9, 0.9, 1.0), Vec3::NEG_Z)
            .intersect_triangle(Vec3::ZERO, Vec3::X, Vec3::Y)
            .is_none());
    }

    #[test]
    fn test_transformed_keeps_world_distance() {
        let world = Mat4::from_translation(Vec3::new(0.0, 0.0, -3.0)) * Mat4::from_scale(Vec3::splat(2.0));
        let ray = Ray::new(Vec3::ZERO, Vec3::NEG_Z).transformed(world);
        // local box of half extent 1 is a world box of half extent 2 at z = -3
        let t = ray.intersect_aabb(Vec3::splat(-1.0), Vec3::splat(1.0)).unwrap();
        assert!((t - 1.0).abs() < 1e-5);
    }
}
