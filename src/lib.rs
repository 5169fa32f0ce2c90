//! # Prism
//!
//! Keeps a declarative, user-edited rendering pipeline in sync with live GPU
//! objects and renders it every frame.
//!
//! A [`Pipeline`] is an ordered list of shader, compute, audio and plugin
//! passes. [`RenderEngine`] compiles their programs, builds their
//! framebuffers, reconciles both against structural edits and records each
//! frame through a [`GpuDevice`]. On top of that it answers "what is under
//! the cursor" with two picking methods: analytic ray intersection and an
//! id-colored readback.
//!
//! ```rust,ignore
//! use prism::prelude::*;
//!
//! let mut pipeline = Pipeline::new();
//! let pass = pipeline.add("Simple", ItemKind::ShaderPass(ShaderPass::new(
//!     ShaderStageDesc::new("simple.vert", "main"),
//!     ShaderStageDesc::new("simple.frag", "main"),
//! )));
//! pipeline.add_child(pass, "Box", ItemKind::Geometry(GeometryItem::new(GeometryShape::Cube, Vec3::ONE)));
//!
//! let services = EngineServices::new(Box::new(DiskProject::new("project")), Box::new(registry));
//! let mut engine = RenderEngine::new(device, services, EngineSettings::default());
//! engine.render(&mut pipeline, 1280, 720, false);
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod device;
pub mod engine;
pub mod errors;
pub mod picking;
pub mod pipeline;
pub mod services;
pub mod settings;
pub mod shader;
pub mod utils;

pub use device::GpuDevice;
pub use engine::{FrameContext, RenderEngine};
pub use errors::{PrismError, Result};
pub use picking::{PixelInfo, Ray, Selection};
pub use pipeline::{ItemId, ItemKind, Pipeline, PipelineItem};
pub use services::EngineServices;
pub use settings::EngineSettings;

/// Everything needed to build a pipeline and drive the engine.
pub mod prelude {
    pub use crate::device::{GpuDevice, TextureId};
    pub use crate::engine::{FrameContext, RenderEngine};
    pub use crate::errors::{PrismError, Result};
    pub use crate::picking::{PixelInfo, PixelTarget, Selection};
    pub use crate::pipeline::{
        AudioPass, ComputePass, GeometryItem, GeometryShape, ItemId, ItemKind, ModelItem, Pipeline,
        PipelineItem, RenderState, RenderTargetRef, ShaderMacro, ShaderPass, ShaderStageDesc,
        ShaderVariable, SystemValue, UniformValue,
    };
    pub use crate::services::{
        DiskProject, EngineServices, ObjectRegistry, ProjectFiles, RenderTexture, RenderTextureId,
    };
    pub use crate::settings::EngineSettings;
    pub use glam::{UVec2, UVec3, Vec2, Vec3, Vec4};
}
