use std::fmt;
use std::sync::Arc;

use glam::{EulerRot, Mat4, Quat, Vec2, Vec3};

use crate::device::{BufferId, PrimitiveTopology};

/// Segments of the standard circle mesh.
pub const CIRCLE_SEGMENTS: u32 = 32;
/// Rings and sectors of the standard sphere mesh.
pub const SPHERE_RINGS: u32 = 16;
pub const SPHERE_SECTORS: u32 = 32;

/// Built-in primitive shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryShape {
    Cube,
    /// Screen-space rectangle, sized and placed in viewport fractions.
    Rectangle,
    Circle,
    Triangle,
    Sphere,
    Plane,
    /// Full-screen quad already in normalized device coordinates.
    ScreenQuadNdc,
}

impl GeometryShape {
    /// Vertex count of the standard mesh generated for this shape.
    #[must_use]
    pub fn default_vertex_count(self) -> u32 {
        match self {
            Self::Cube => 36,
            Self::Rectangle | Self::Plane | Self::ScreenQuadNdc => 6,
            Self::Circle => CIRCLE_SEGMENTS * 3,
            Self::Triangle => 3,
            Self::Sphere => SPHERE_RINGS * SPHERE_SECTORS * 6,
        }
    }

    /// Rectangles and NDC quads live in screen space and cannot be hit by a
    /// world-space ray.
    #[must_use]
    pub fn is_pickable(self) -> bool {
        !matches!(self, Self::Rectangle | Self::ScreenQuadNdc)
    }
}

/// Rotation matrix from pitch/yaw/roll stored in `x`/`y`/`z` (radians),
/// applied yaw first.
#[inline]
#[must_use]
pub fn rotation_matrix(rotation: Vec3) -> Mat4 {
    Mat4::from_quat(Quat::from_euler(EulerRot::YXZ, rotation.y, rotation.x, rotation.z))
}

// ─── GeometryItem ────────────────────────────────────────────────────────────

/// A built-in primitive drawn by a shader pass.
#[derive(Debug, Clone)]
pub struct GeometryItem {
    pub shape: GeometryShape,
    pub size: Vec3,
    pub position: Vec3,
    /// Pitch, yaw, roll in radians.
    pub rotation: Vec3,
    pub scale: Vec3,
    pub topology: PrimitiveTopology,
    pub vertex_buffer: Option<BufferId>,
    pub vertex_count: u32,
    pub instanced: bool,
    pub instance_count: u32,
    pub instance_buffer: Option<BufferId>,
}

impl GeometryItem {
    #[must_use]
    pub fn new(shape: GeometryShape, size: Vec3) -> Self {
        Self {
            shape,
            size,
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
            topology: PrimitiveTopology::TriangleList,
            vertex_buffer: None,
            vertex_count: shape.default_vertex_count(),
            instanced: false,
            instance_count: 1,
            instance_buffer: None,
        }
    }

    #[must_use]
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    #[must_use]
    pub fn with_vertices(mut self, buffer: BufferId, count: u32) -> Self {
        self.vertex_buffer = Some(buffer);
        self.vertex_count = count;
        self
    }

    /// World transform used for picking: translation and rotation only, the
    /// shape tests apply size and scale themselves.
    #[must_use]
    pub fn pick_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position) * rotation_matrix(self.rotation)
    }

    /// World transform handed to shaders while drawing.
    ///
    /// Rectangles are laid out in pixels of the viewport: the scale is a
    /// fraction of the viewport and the position is offset so that `0`
    /// centers the rectangle.
    #[must_use]
    pub fn draw_matrix(&self, viewport: Vec2) -> Mat4 {
        let (scale, position) = if self.shape == GeometryShape::Rectangle {
            (
                Vec3::new(self.scale.x * viewport.x, self.scale.y * viewport.y, 1.0),
                Vec3::new(
                    (self.position.x + 0.5) * viewport.x,
                    (self.position.y + 0.5) * viewport.y,
                    -1000.0,
                ),
            )
        } else {
            (self.scale, self.position)
        };
        Mat4::from_translation(position) * rotation_matrix(self.rotation) * Mat4::from_scale(scale)
    }
}

// ─── Models ──────────────────────────────────────────────────────────────────

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[must_use]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    #[must_use]
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    #[must_use]
    pub fn from_points(points: &[Vec3]) -> Self {
        points.iter().fold(Self::EMPTY, |bb, p| BoundingBox {
            min: bb.min.min(*p),
            max: bb.max.max(*p),
        })
    }
}

/// One mesh of a loaded model.
#[derive(Debug, Clone)]
pub struct MeshData {
    pub name: String,
    pub vertex_buffer: Option<BufferId>,
    pub vertex_count: u32,
    /// Triangle-list positions in model space, three per triangle.
    pub positions: Vec<Vec3>,
}

/// A loaded model shared between every item that draws it.
#[derive(Debug, Clone)]
pub struct ModelData {
    pub meshes: Vec<MeshData>,
    pub bounds: BoundingBox,
}

impl ModelData {
    #[must_use]
    pub fn new(meshes: Vec<MeshData>) -> Self {
        let bounds = meshes
            .iter()
            .map(|m| BoundingBox::from_points(&m.positions))
            .fold(BoundingBox::EMPTY, |acc, bb| acc.union(&bb));
        Self { meshes, bounds }
    }

    /// All triangles of all meshes.
    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.meshes
            .iter()
            .flat_map(|m| m.positions.chunks_exact(3).map(|t| [t[0], t[1], t[2]]))
    }
}

/// A model instance drawn by a shader pass.
#[derive(Clone)]
pub struct ModelItem {
    pub model: Arc<ModelData>,
    pub position: Vec3,
    /// Pitch, yaw, roll in radians.
    pub rotation: Vec3,
    pub scale: Vec3,
    pub topology: PrimitiveTopology,
    pub instanced: bool,
    pub instance_count: u32,
    pub instance_buffer: Option<BufferId>,
}

impl fmt::Debug for ModelItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelItem")
            .field("meshes", &self.model.meshes.len())
            .field("position", &self.position)
            .field("rotation", &self.rotation)
            .field("scale", &self.scale)
            .finish_non_exhaustive()
    }
}

impl ModelItem {
    #[must_use]
    pub fn new(model: Arc<ModelData>) -> Self {
        Self {
            model,
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
            topology: PrimitiveTopology::TriangleList,
            instanced: false,
            instance_count: 1,
            instance_buffer: None,
        }
    }

    /// World transform used for picking.
    #[must_use]
    pub fn pick_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position)
            * Mat4::from_scale(self.scale)
            * rotation_matrix(self.rotation)
    }

    /// World transform handed to shaders while drawing.
    #[must_use]
    pub fn draw_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position)
            * rotation_matrix(self.rotation)
            * Mat4::from_scale(self.scale)
    }
}
