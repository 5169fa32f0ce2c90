use glam::{UVec2, Vec2, Vec4};

use crate::pipeline::ItemId;
use crate::services::RenderTextureId;

/// A target an id pick reads back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelTarget {
    Window,
    Texture(RenderTextureId),
}

/// What was drawn at one pixel of one target.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelInfo {
    /// Color of the pixel in the last regular render.
    pub color: Vec4,
    pub target: PixelTarget,
    /// `"Window"` or the render texture's name.
    pub target_name: String,
    /// Attachment slot of the target in the pass that drew the item.
    pub target_index: Option<usize>,
    pub item: ItemId,
    /// The shader pass that drew `item`.
    pub pass: ItemId,
    /// Pixel position in the target.
    pub coordinate: UVec2,
    /// Position relative to the target size, as requested.
    pub relative_coordinate: Vec2,
}

/// Converts an 8-bit readback to a normalized color.
#[must_use]
pub fn normalize_color(rgba: [u8; 4]) -> Vec4 {
    Vec4::new(
        f32::from(rgba[0]),
        f32::from(rgba[1]),
        f32::from(rgba[2]),
        f32::from(rgba[3]),
    ) / 255.0
}

/// Pixel under a relative position, clamped into the target.
#[must_use]
pub fn pixel_coordinate(relative: Vec2, size: UVec2) -> UVec2 {
    let max = size.saturating_sub(UVec2::ONE);
    (relative * size.as_vec2()).as_uvec2().min(max)
}
