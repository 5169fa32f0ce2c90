use glam::{Mat4, Vec2, Vec3};

use crate::pipeline::{SystemValue, UniformValue};

/// Time-dependent values captured at the end of a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSnapshot {
    pub time: f32,
    pub view_projection: Mat4,
}

impl Default for FrameSnapshot {
    fn default() -> Self {
        Self {
            time: 0.0,
            view_projection: Mat4::IDENTITY,
        }
    }
}

/// Per-frame state shared by everything drawn in a frame.
///
/// The engine owns one context and writes it while executing a frame: the
/// viewport per pass, the transform and picked flag per draw. Pass variables
/// bound to a [`SystemValue`] read from it, and plugins receive it by
/// reference.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameContext {
    pub viewport_size: Vec2,
    /// Frames rendered while not paused.
    pub frame_index: u32,
    /// Seconds of unpaused time.
    pub time: f32,
    pub time_delta: f32,
    /// Whether the item currently being drawn is selected.
    pub picked: bool,
    /// World transform of the item currently being drawn.
    pub geometry_transform: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
    pub camera_position: Vec3,
    /// State of the previous unpaused frame.
    pub previous: FrameSnapshot,
}

impl Default for FrameContext {
    fn default() -> Self {
        Self {
            viewport_size: Vec2::ONE,
            frame_index: 0,
            time: 0.0,
            time_delta: 0.0,
            picked: false,
            geometry_transform: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            camera_position: Vec3::ZERO,
            previous: FrameSnapshot::default(),
        }
    }
}

impl FrameContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_camera(&mut self, view: Mat4, projection: Mat4, position: Vec3) {
        self.view = view;
        self.projection = projection;
        self.camera_position = position;
    }

    #[inline]
    #[must_use]
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    /// Captures the time-dependent state read as "previous frame" values.
    pub fn snapshot(&mut self) {
        self.previous = FrameSnapshot {
            time: self.time,
            view_projection: self.view_projection(),
        };
    }

    /// Current value of an engine-provided variable.
    #[must_use]
    pub fn system_value(&self, value: SystemValue) -> UniformValue {
        match value {
            SystemValue::Time => UniformValue::Float(self.time),
            SystemValue::TimeDelta => UniformValue::Float(self.time_delta),
            SystemValue::FrameIndex => UniformValue::UInt(self.frame_index),
            SystemValue::ViewportSize => UniformValue::Vec2(self.viewport_size),
            SystemValue::View => UniformValue::Mat4(self.view),
            SystemValue::Projection => UniformValue::Mat4(self.projection),
            SystemValue::ViewProjection => UniformValue::Mat4(self.view_projection()),
            SystemValue::GeometryTransform => UniformValue::Mat4(self.geometry_transform),
            SystemValue::IsPicked => UniformValue::Bool(self.picked),
            SystemValue::CameraPosition => UniformValue::Vec3(self.camera_position),
            SystemValue::PreviousViewProjection => {
                UniformValue::Mat4(self.previous.view_projection)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_feeds_previous_values() {
        let mut ctx = FrameContext::new();
        let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0));
        ctx.set_camera(view, Mat4::IDENTITY, Vec3::new(0.0, 0.0, 5.0));
        ctx.time = 2.5;
        ctx.snapshot();

        ctx.set_camera(Mat4::IDENTITY, Mat4::IDENTITY, Vec3::ZERO);
        assert_eq!(
            ctx.system_value(SystemValue::PreviousViewProjection),
            UniformValue::Mat4(view)
        );
        assert_eq!(ctx.system_value(SystemValue::ViewProjection), UniformValue::Mat4(Mat4::IDENTITY));
        assert_eq!(ctx.previous.time, 2.5);
    }
}
