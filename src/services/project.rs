use std::io;
use std::path::{Path, PathBuf};

use crate::pipeline::ShaderMacro;
use crate::shader::{ShaderLanguage, ShaderStage};
use crate::utils::normalize_path;

/// Access to the files of the open project.
///
/// Pipeline items store paths relative to the project directory; the engine
/// resolves them through this trait so hosts can serve files from memory or
/// an archive as well as from disk.
pub trait ProjectFiles {
    /// Turns a project-relative path into the path used for reads.
    fn resolve(&self, path: &Path) -> PathBuf;

    fn exists(&self, path: &Path) -> bool;

    fn read_to_string(&self, path: &Path) -> io::Result<String>;
}

/// A project stored in a directory on disk.
#[derive(Debug, Clone)]
pub struct DiskProject {
    root: PathBuf,
}

impl DiskProject {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ProjectFiles for DiskProject {
    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            normalize_path(path)
        } else {
            normalize_path(&self.root.join(path))
        }
    }

    fn exists(&self, path: &Path) -> bool {
        self.resolve(path).is_file()
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(self.resolve(path))
    }
}

/// A stage that must be translated to GLSL before it can be compiled.
#[derive(Debug, Clone, Copy)]
pub struct TranscompileRequest<'a> {
    pub source: &'a str,
    pub language: ShaderLanguage,
    pub stage: ShaderStage,
    pub entry: &'a str,
    pub macros: &'a [ShaderMacro],
}

/// Translates HLSL and Vulkan GLSL to GLSL.
pub trait ShaderTranscompiler {
    /// Returns the GLSL source, or the translator's log on failure.
    fn transcompile(&self, request: &TranscompileRequest<'_>) -> Result<String, String>;
}
