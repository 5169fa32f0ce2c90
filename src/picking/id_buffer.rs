//! Color-encoded item ids.
//!
//! A debug render draws every geometry and model item with a flat color
//! encoding a sequential id. Ids are handed out in draw order starting at
//! [`DEBUG_ID_START`], leaving 0 for the cleared background. The order is
//! recorded in a [`DebugIdMap`] while drawing, so decoding a pixel is a plain
//! lookup into the traversal that wrote it.

use glam::Vec3;

use crate::pipeline::ItemId;

/// First id assigned in a debug render.
pub const DEBUG_ID_START: u32 = 1;

/// Largest id that fits in the three 8-bit color channels.
pub const MAX_DEBUG_ID: u32 = 0x00FF_FFFF;

/// Encodes an id as an RGB color, low byte in red.
#[must_use]
pub fn encode_id(id: u32) -> Vec3 {
    Vec3::new(
        (id & 0xFF) as f32 / 255.0,
        ((id >> 8) & 0xFF) as f32 / 255.0,
        ((id >> 16) & 0xFF) as f32 / 255.0,
    )
}

/// Decodes a pixel read back from an id target. Alpha is ignored.
#[must_use]
pub fn decode_id(rgba: [u8; 4]) -> u32 {
    u32::from(rgba[0]) | (u32::from(rgba[1]) << 8) | (u32::from(rgba[2]) << 16)
}

/// Where an id was drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DebugIdEntry {
    /// The shader pass that drew the item.
    pub pass: ItemId,
    pub item: ItemId,
}

/// Ids handed out during one debug render, in draw order.
#[derive(Debug, Clone, Default)]
pub struct DebugIdMap {
    entries: Vec<DebugIdEntry>,
}

impl DebugIdMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Hands out the next id for `item` drawn by `pass`.
    pub fn assign(&mut self, pass: ItemId, item: ItemId) -> u32 {
        self.entries.push(DebugIdEntry { pass, item });
        let index = u32::try_from(self.entries.len() - 1).unwrap_or(MAX_DEBUG_ID);
        (DEBUG_ID_START + index).min(MAX_DEBUG_ID)
    }

    /// Looks up a decoded id. `0` and unknown ids resolve to `None`.
    #[must_use]
    pub fn resolve(&self, id: u32) -> Option<DebugIdEntry> {
        let index = id.checked_sub(DEBUG_ID_START)?;
        self.entries.get(index as usize).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_matches_readback() {
        for id in [1u32, 255, 256, 0x0001_0203, MAX_DEBUG_ID] {
            let color = encode_id(id);
            let rgba = [
                (color.x * 255.0).round() as u8,
                (color.y * 255.0).round() as u8,
                (color.z * 255.0).round() as u8,
                255,
            ];
            assert_eq!(decode_id(rgba), id);
        }
    }

    #[test]
    fn test_resolve_is_left_inverse_of_assign() {
        let mut map = DebugIdMap::new();
        let pass = ItemId::from_raw(1);
        let ids: Vec<_> = (10..15)
            .map(|n| (n, map.assign(pass, ItemId::from_raw(n))))
            .collect();

        for (n, id) in ids {
            assert_eq!(map.resolve(id).map(|e| e.item), Some(ItemId::from_raw(n)));
        }
        assert_eq!(map.resolve(0), None);
        assert_eq!(map.resolve(99), None);
    }
}
