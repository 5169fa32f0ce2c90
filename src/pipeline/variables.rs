//! Shader variables
//!
//! Every pass owns a [`VariableTable`] mapping uniform names to values. A
//! variable either carries a user value or is bound to a [`SystemValue`]
//! that is read from the [`FrameContext`] each time the table is bound.

use glam::{IVec2, IVec3, IVec4, Mat3, Mat4, Vec2, Vec3, Vec4};

use super::item::ItemId;
use crate::device::GpuDevice;
use crate::engine::FrameContext;

/// A value that can be uploaded to a shader uniform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Bool(bool),
    Int(i32),
    IVec2(IVec2),
    IVec3(IVec3),
    IVec4(IVec4),
    UInt(u32),
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat3(Mat3),
    Mat4(Mat4),
}

impl UniformValue {
    /// Size of the value in bytes when tightly packed.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        match self {
            Self::Bool(_) | Self::Int(_) | Self::UInt(_) | Self::Float(_) => 4,
            Self::IVec2(_) | Self::Vec2(_) => 8,
            Self::IVec3(_) | Self::Vec3(_) => 12,
            Self::IVec4(_) | Self::Vec4(_) => 16,
            Self::Mat3(_) => 36,
            Self::Mat4(_) => 64,
        }
    }
}

/// Engine-provided values a variable can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemValue {
    /// Seconds since start, frozen while paused.
    Time,
    TimeDelta,
    FrameIndex,
    ViewportSize,
    View,
    Projection,
    ViewProjection,
    /// World transform of the item being drawn.
    GeometryTransform,
    /// Whether the item being drawn is selected.
    IsPicked,
    CameraPosition,
    /// View-projection of the previous frame.
    PreviousViewProjection,
}

/// A named uniform of a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderVariable {
    pub name: String,
    pub value: UniformValue,
    pub system: Option<SystemValue>,
}

impl ShaderVariable {
    #[must_use]
    pub fn new(name: impl Into<String>, value: UniformValue) -> Self {
        Self {
            name: name.into(),
            value,
            system: None,
        }
    }

    #[must_use]
    pub fn system(name: impl Into<String>, system: SystemValue) -> Self {
        let value = match system {
            SystemValue::Time | SystemValue::TimeDelta => UniformValue::Float(0.0),
            SystemValue::FrameIndex => UniformValue::UInt(0),
            SystemValue::ViewportSize => UniformValue::Vec2(Vec2::ZERO),
            SystemValue::IsPicked => UniformValue::Bool(false),
            SystemValue::CameraPosition => UniformValue::Vec3(Vec3::ZERO),
            SystemValue::View
            | SystemValue::Projection
            | SystemValue::ViewProjection
            | SystemValue::GeometryTransform
            | SystemValue::PreviousViewProjection => UniformValue::Mat4(Mat4::IDENTITY),
        };
        Self {
            name: name.into(),
            value,
            system: Some(system),
        }
    }
}

/// Ordered uniform table owned by a pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableTable {
    variables: Vec<ShaderVariable>,
}

impl VariableTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a variable, replacing any existing one with the same name.
    pub fn add(&mut self, variable: ShaderVariable) {
        match self.variables.iter_mut().find(|v| v.name == variable.name) {
            Some(existing) => *existing = variable,
            None => self.variables.push(variable),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ShaderVariable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ShaderVariable> {
        self.variables.iter_mut().find(|v| v.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ShaderVariable> {
        self.variables.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Replaces the value of `name`, returning the previous one.
    pub fn swap_value(&mut self, name: &str, value: UniformValue) -> Option<UniformValue> {
        self.get_mut(name)
            .map(|v| std::mem::replace(&mut v.value, value))
    }

    /// Uploads every variable to the currently used program.
    pub fn bind(&self, device: &mut dyn GpuDevice, context: &FrameContext) {
        for variable in &self.variables {
            let value = match variable.system {
                Some(system) => context.system_value(system),
                None => variable.value,
            };
            device.set_uniform(&variable.name, &value);
        }
    }
}

/// A live-edited variable value applied to one item only.
///
/// While the item is drawn, `value` replaces the pass variable named
/// `variable`; the original value is restored right after the draw.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemVariableValue {
    pub item: ItemId,
    pub variable: String,
    pub value: UniformValue,
}

impl ItemVariableValue {
    #[must_use]
    pub fn new(item: ItemId, variable: impl Into<String>, value: UniformValue) -> Self {
        Self {
            item,
            variable: variable.into(),
            value,
        }
    }
}

/// Swaps every override of `item` into `table`, returning what was replaced.
pub(crate) fn apply_overrides(
    table: &mut VariableTable,
    overrides: &[ItemVariableValue],
    item: ItemId,
) -> Vec<(String, UniformValue)> {
    overrides
        .iter()
        .filter(|o| o.item == item)
        .filter_map(|o| {
            table
                .swap_value(&o.variable, o.value)
                .map(|old| (o.variable.clone(), old))
        })
        .collect()
}

/// Restores values returned by [`apply_overrides`], last swap first.
pub(crate) fn restore_overrides(table: &mut VariableTable, swapped: Vec<(String, UniformValue)>) {
    for (name, value) in swapped.into_iter().rev() {
        table.swap_value(&name, value);
    }
}
