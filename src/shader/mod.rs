//! Shader Sources
//!
//! Everything between a shader file on disk and a linked program:
//!
//! | Module           | Responsibility                                        |
//! |------------------|-------------------------------------------------------|
//! | [`preprocessor`] | `#define` injection and recursive `#include` splicing  |
//! | [`compiler`]     | Source loading, transcompilation, program builds, diagnostics |
//! | [`rewrite`]      | Built-in pick shaders and vertex/instance index injection |

pub mod compiler;
pub mod preprocessor;
pub mod rewrite;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use compiler::{
    CompileDiagnostic, ComputeSource, PassPrograms, PassSources, ShaderCompiler, StageCode,
    parse_compile_log,
};
pub use preprocessor::{IncludeResolver, PreprocessDiagnostic, PreprocessedSource, inject_macros};
pub use rewrite::{
    DEBUG_ID_FRAGMENT, PICK_COLOR_UNIFORM, PICK_INDEX_FRAGMENT, PickIndexSource, inject_pick_index,
};

/// A programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Geometry,
    Compute,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Vertex => "vertex",
            Self::Fragment => "fragment",
            Self::Geometry => "geometry",
            Self::Compute => "compute",
        })
    }
}

/// Source language of a shader file, detected from its extension
/// (see [`EngineSettings::language_of`](crate::settings::EngineSettings::language_of)).
///
/// Only [`Glsl`](Self::Glsl) is compiled directly; the others go through the
/// [`ShaderTranscompiler`](crate::services::ShaderTranscompiler).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShaderLanguage {
    Glsl,
    VulkanGlsl,
    Hlsl,
}

impl ShaderLanguage {
    #[inline]
    #[must_use]
    pub fn is_native(self) -> bool {
        matches!(self, Self::Glsl)
    }
}
