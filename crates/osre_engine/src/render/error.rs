//! Render core error types

use super::PassId;

/// Errors reported by the render core
///
/// Setup-time problems (shader compilation, pipeline structure) are reported
/// before the frame loop starts; per-frame failures come from the device.
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    /// A shader could not be compiled by the device
    ///
    /// Surfaces from pipeline setup and deferred shader reloads so the caller
    /// can decide on a fallback shader.
    #[error("Shader '{name}' failed to compile: {reason}")]
    ShaderCompilationFailed {
        /// Shader name
        name: String,
        /// Device-provided reason
        reason: String,
    },

    /// GPU resource creation failed
    #[error("Resource creation failed: {0}")]
    ResourceCreationFailed(String),

    /// A pipeline already contains a pass with this id
    #[error("Pipeline already contains a pass with id {0}")]
    DuplicatePass(PassId),

    /// The pass id is at or above the pipeline's pass ceiling
    #[error("Pass id {id} is outside the pipeline limit of {limit} passes")]
    PassIdOutOfRange {
        /// Offending pass id
        id: PassId,
        /// Exclusive ceiling
        limit: u32,
    },

    /// No pipeline was installed before the frame was executed
    #[error("No pipeline installed in the render backend")]
    NoPipeline,

    /// Frame bracket misuse detected at runtime
    #[error("Invalid frame state: {0}")]
    InvalidFrameState(String),

    /// Device-specific failure while executing commands
    #[error("Device error: {0}")]
    Device(String),
}

/// Result type for render core operations
pub type RenderResult<T> = Result<T, RenderError>;
