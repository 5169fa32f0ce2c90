//! Error Types
//!
//! This module defines the error types used throughout the engine.
//!
//! # Overview
//!
//! Most failures inside a frame never surface as errors: a shader that does not
//! compile degrades its pass to the "no program" state and reports through the
//! [`MessageStack`](crate::services::MessageStack). The types here cover the
//! remaining cases:
//! - GPU device failures (resource creation, readback)
//! - Shader compilation failures reported by a device
//! - Backend initialization
//!
//! # Usage
//!
//! ```rust,ignore
//! use prism::errors::{PrismError, Result};
//!
//! fn pick(engine: &mut RenderEngine<impl GpuDevice>) -> Result<()> {
//!     let hits = engine.debug_pixel_pick(&mut pipeline, Vec2::new(0.5, 0.5))?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::shader::ShaderStage;

/// The main error type for the engine.
#[derive(Error, Debug)]
pub enum PrismError {
    // ========================================================================
    // GPU Errors
    // ========================================================================
    /// A device operation failed.
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// A program failed to compile or link.
    #[error(transparent)]
    Compile(#[from] CompileError),

    // ========================================================================
    // Pipeline Errors
    // ========================================================================
    /// The referenced pipeline item does not exist or has the wrong type.
    #[error("Pipeline item not found: {0}")]
    ItemNotFound(String),

    // ========================================================================
    // I/O Errors
    // ========================================================================
    /// File I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Failure reported by a [`GpuDevice`](crate::device::GpuDevice) implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// Failed to request a compatible GPU adapter.
    #[error("Failed to request GPU adapter: {0}")]
    AdapterRequestFailed(String),

    /// Failed to create the GPU device.
    #[error("Failed to create GPU device: {0}")]
    DeviceCreateFailed(String),

    /// Resource creation failed.
    #[error("Failed to create {kind}: {reason}")]
    ResourceCreation {
        /// Kind of resource ("texture", "framebuffer", ...)
        kind: &'static str,
        /// Backend-provided reason
        reason: String,
    },

    /// A handle did not refer to a live resource.
    #[error("Invalid {0} handle")]
    InvalidHandle(&'static str),

    /// Reading data back from the GPU failed.
    #[error("GPU readback failed: {0}")]
    Readback(String),
}

/// A shader stage or program link failure with the raw compiler log.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{stage} stage failed to compile")]
pub struct CompileError {
    /// Stage that failed. Link errors are attributed to the fragment stage.
    pub stage: ShaderStage,
    /// Compiler output, one diagnostic per line.
    pub log: String,
}

impl CompileError {
    #[must_use]
    pub fn new(stage: ShaderStage, log: impl Into<String>) -> Self {
        Self {
            stage,
            log: log.into(),
        }
    }
}

/// Alias for `Result<T, PrismError>`.
pub type Result<T> = std::result::Result<T, PrismError>;
