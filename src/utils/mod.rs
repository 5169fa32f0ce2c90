//! Utility Module
//!
//! - [`time`]: pausable frame clock
//! - [`paths`]: lexical path normalization used by the include resolver

pub mod paths;
pub mod time;

pub use paths::normalize_path;
pub use time::FrameClock;
