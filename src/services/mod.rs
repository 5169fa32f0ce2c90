//! Collaborator Interfaces
//!
//! The engine renders a pipeline but does not own the project around it.
//! Files, render textures, diagnostics, plugins and audio live with the host
//! and are reached through the traits in this module.
//!
//! [`EngineServices`] bundles them for the engine. Only the project files and
//! the object registry are mandatory; the message stack and plugin registry
//! are owned by the bundle.

pub mod audio;
pub mod messages;
pub mod objects;
pub mod plugin;
pub mod project;

pub use audio::AudioStream;
pub use messages::{Message, MessageStack, Severity};
pub use objects::{ObjectRegistry, PluginObject, RenderTexture, RenderTextureId, ResourceBinding};
pub use plugin::{Plugin, PluginRef, PluginRegistry};
pub use project::{DiskProject, ProjectFiles, ShaderTranscompiler, TranscompileRequest};

/// Everything the engine consults besides the GPU device.
pub struct EngineServices {
    pub project: Box<dyn ProjectFiles>,
    pub objects: Box<dyn ObjectRegistry>,
    pub messages: MessageStack,
    pub plugins: PluginRegistry,
    pub transcompiler: Option<Box<dyn ShaderTranscompiler>>,
}

impl EngineServices {
    pub fn new(project: Box<dyn ProjectFiles>, objects: Box<dyn ObjectRegistry>) -> Self {
        Self {
            project,
            objects,
            messages: MessageStack::new(),
            plugins: PluginRegistry::new(),
            transcompiler: None,
        }
    }

    #[must_use]
    pub fn with_transcompiler(mut self, transcompiler: Box<dyn ShaderTranscompiler>) -> Self {
        self.transcompiler = Some(transcompiler);
        self
    }
}
