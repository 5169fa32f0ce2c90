use crate::device::{GpuDevice, ProgramId};
use crate::shader::ShaderLanguage;

/// A shader-driven audio stream owned by an audio pass.
///
/// The stream compiles and owns its program and renders samples on the GPU;
/// the engine binds the pass's objects and variables to that program before
/// calling [`render`](Self::render).
pub trait AudioStream {
    /// Compiles the stream's shader from preprocessed source. Returns the
    /// compiler log on failure.
    fn compile(
        &mut self,
        device: &mut dyn GpuDevice,
        source: &str,
        language: ShaderLanguage,
    ) -> Result<(), String>;

    /// The program built by the last successful [`compile`](Self::compile).
    fn program(&self) -> Option<ProgramId>;

    /// Renders the next block of samples with the currently bound state.
    fn render(&mut self, device: &mut dyn GpuDevice);
}
