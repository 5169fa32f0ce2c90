//! Engine Settings
//!
//! [`EngineSettings`] is the host-facing configuration of the render engine.
//! It is read on every frame, so changes made through
//! [`RenderEngine::settings_mut`](crate::engine::RenderEngine::settings_mut)
//! take effect on the next [`render`](crate::engine::RenderEngine::render).
//!
//! # Fields
//!
//! | Field               | Description                                     | Default          |
//! |---------------------|-------------------------------------------------|------------------|
//! | `msaa_samples`      | Sample count of the window MSAA companions       | `1` (off)        |
//! | `clear_color`       | Clear color of the window target                | Black (0,0,0,1)  |
//! | `use_alpha_channel` | Window color target keeps an alpha channel       | `false`          |
//! | `include_paths`     | Directories searched by `#include`              | Empty            |
//! | `cache_debounce`    | Minimum delay between same-size reconciliations | 0.5 s            |
//! | `hlsl_extensions`   | File extensions treated as HLSL                 | `["hlsl"]`       |
//! | `vulkan_extensions` | File extensions treated as Vulkan GLSL          | `["vk"]`         |
//!
//! Settings derive `serde` traits so hosts can persist them with the project.
//!
//! ```rust,ignore
//! use prism::settings::EngineSettings;
//!
//! let settings = EngineSettings {
//!     msaa_samples: 4,
//!     include_paths: vec!["shaders/common".into()],
//!     ..Default::default()
//! };
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use glam::Vec4;
use serde::{Deserialize, Serialize};

use crate::shader::ShaderLanguage;

/// Default delay between two reconciliations of a pipeline whose item count
/// did not change.
pub const DEFAULT_CACHE_DEBOUNCE: Duration = Duration::from_millis(500);

/// Global configuration for the render engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    // === Targets ===
    /// MSAA sample count used for the multisampled companions of the window
    /// target. `1` disables multisampling and the resolve step.
    pub msaa_samples: u32,

    /// Clear color of the window target.
    pub clear_color: Vec4,

    /// Whether the window color target is created with an alpha channel.
    pub use_alpha_channel: bool,

    // === Shaders ===
    /// Directories searched, in order, when resolving `#include` directives.
    /// The including file's own directory is always searched last.
    pub include_paths: Vec<PathBuf>,

    /// File extensions (without the dot) compiled as HLSL.
    pub hlsl_extensions: Vec<String>,

    /// File extensions (without the dot) compiled as Vulkan GLSL.
    pub vulkan_extensions: Vec<String>,

    // === Cache ===
    /// Minimum time between two reconciliations when the item count is
    /// unchanged. Structural edits that change the count are picked up on the
    /// next frame regardless.
    pub cache_debounce: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            msaa_samples: 1,
            clear_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            use_alpha_channel: false,
            include_paths: Vec::new(),
            hlsl_extensions: vec!["hlsl".to_string()],
            vulkan_extensions: vec!["vk".to_string()],
            cache_debounce: DEFAULT_CACHE_DEBOUNCE,
        }
    }
}

impl EngineSettings {
    /// Returns `true` when the window target renders through MSAA companions.
    #[inline]
    #[must_use]
    pub fn msaa_enabled(&self) -> bool {
        self.msaa_samples > 1
    }

    /// Detects the shading language of a source file from its extension.
    #[must_use]
    pub fn language_of(&self, path: &Path) -> ShaderLanguage {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return ShaderLanguage::Glsl;
        };

        let matches = |list: &[String]| list.iter().any(|e| e.eq_ignore_ascii_case(ext));
        if matches(&self.hlsl_extensions) {
            ShaderLanguage::Hlsl
        } else if matches(&self.vulkan_extensions) {
            ShaderLanguage::VulkanGlsl
        } else {
            ShaderLanguage::Glsl
        }
    }
}
