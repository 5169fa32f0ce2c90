//! Strongly-typed GPU handles.
//!
//! Thin `Copy` wrappers around a `u32` slot index handed out by a
//! [`GpuDevice`](super::GpuDevice) implementation. Using distinct newtypes
//! prevents accidentally binding a texture where a framebuffer is expected.
//! The engine stores `Option<Handle>` wherever a resource may be missing, so
//! there is no reserved "null" value.

macro_rules! gpu_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            /// Wraps a backend slot index.
            #[inline]
            #[must_use]
            pub const fn from_raw(raw: u32) -> Self {
                Self(raw)
            }

            /// Raw index into the backend's storage.
            #[inline]
            #[must_use]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

gpu_handle!(
    /// Handle to a linked program (all stages of a pass, or one compute stage).
    ProgramId
);

gpu_handle!(
    /// Handle to a framebuffer: a fixed set of color attachments plus an
    /// optional depth/stencil attachment.
    FramebufferId
);

gpu_handle!(
    /// Handle to a texture (color, depth/stencil, or multisampled).
    TextureId
);

gpu_handle!(
    /// Handle to a vertex, uniform or storage buffer.
    BufferId
);
