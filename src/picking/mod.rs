//! Picking
//!
//! Two independent ways of finding out what is under the cursor:
//!
//! - **Ray pick**: a world-space [`Ray`] is intersected with analytic
//!   stand-ins of every pickable item during the next frame. Cheap, and
//!   works without reading anything back from the GPU. See [`PickSession`].
//! - **Id pick**: the frame is rendered again with every item drawn in a
//!   flat color encoding its id, and the pixel is read back. Exact, and also
//!   used to find single vertices or instances. See [`id_buffer`].

pub mod id_buffer;
pub mod pixel;
pub mod ray;
pub mod session;
pub mod shapes;

pub use id_buffer::{DEBUG_ID_START, DebugIdEntry, DebugIdMap, decode_id, encode_id};
pub use pixel::{PixelInfo, PixelTarget};
pub use ray::Ray;
pub use session::{PickCallback, PickSession, Selection};
