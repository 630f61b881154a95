//! Error types for the library

use std::path::PathBuf;

use thiserror::Error;
#[cfg(feature = "vulkano")]
use vulkano::{
    buffer::AllocateBufferError, command_buffer::CommandBufferExecError, Validated,
};

use crate::runtime::{ArgKind, DataType};

/// Error types for GraphiT-Template
#[derive(Error, Debug)]
pub enum GraphitError {
    #[error("Module bundle not found: {0}")]
    ModuleNotFound(PathBuf),

    #[error("Invalid module bundle {path}: {reason}")]
    InvalidModule { path: PathBuf, reason: String },

    #[error("Invalid SPIR-V in {path}: {reason}")]
    InvalidSpirv { path: PathBuf, reason: String },

    #[error("Kernel '{0}' not found in module")]
    KernelNotFound(String),

    #[error("Compute graph '{0}' not found in module")]
    GraphNotFound(String),

    #[error("Entry point '{0}' not found in shader module")]
    EntryPointNotFound(String),

    #[error("'{callee}' takes {expected} arguments, got {got}")]
    ArgumentCount {
        callee: String,
        expected: usize,
        got: usize,
    },

    #[error("Argument '{name}': expected {expected:?}, got {got:?}")]
    ArgumentKind {
        name: String,
        expected: ArgKind,
        got: ArgKind,
    },

    #[error("Argument '{name}': expected dtype {expected:?}, got {got:?}")]
    ArgumentType {
        name: String,
        expected: DataType,
        got: DataType,
    },

    #[error("Argument '{name}': expected rank {expected}, got {got}")]
    ArgumentRank {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("Missing named argument '{0}'")]
    MissingArgument(String),

    #[error("Launch arguments need {0} push constant words, at most {1} are available")]
    PushConstantOverflow(usize, usize),

    #[error("Invalid ndarray shape {0:?}")]
    InvalidShape(Vec<u32>),

    #[error("Buffer size overflow: {0} elements × {1} bytes per element")]
    BufferSizeOverflow(usize, usize),

    #[error("No suitable Vulkan device found among {0} devices")]
    NoVulkanDevice(usize),

    #[error("Backend '{0}' is not available in this build")]
    BackendUnavailable(&'static str),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Graphics error: {0}")]
    Graphics(#[from] crate::graphics::error::GraphicsError),

    #[cfg(feature = "vulkano")]
    #[error("vulkano LoadingError: {0}")]
    VulkanoLoadingError(#[from] vulkano::LoadingError),

    #[cfg(feature = "vulkano")]
    #[error("vulkano VulkanError: {0}")]
    VulkanoVulkanError(#[from] vulkano::VulkanError),

    #[cfg(feature = "vulkano")]
    #[error("vulkano CommandBufferExecError: {0}")]
    VulkanoCommandBufferExecError(#[from] CommandBufferExecError),

    #[cfg(feature = "vulkano")]
    #[error("vulkano ValidatedAllocateBufferError: {0}")]
    VulkanoValidatedAllocateBufferError(#[from] Validated<AllocateBufferError>),

    #[cfg(feature = "vulkano")]
    #[error("vulkano ValidationError: {0}")]
    VulkanoBoxedValidationError(#[from] Box<vulkano::ValidationError>),

    #[cfg(feature = "vulkano")]
    #[error("vulkano VulkanoValidatedVulkanError: {0}")]
    VulkanoValidatedVulkanError(#[from] Validated<vulkano::VulkanError>),

    #[cfg(feature = "vulkano")]
    #[error("winit EventLoopError: {0}")]
    WinitEventLoopError(#[from] winit::error::EventLoopError),

    #[cfg(feature = "vulkano")]
    #[error("winit OsError: {0}")]
    WinitOsError(#[from] winit::error::OsError),

    #[error("Other error: {0}")]
    Other(String),
}

/// Convenience type alias for Results with [`GraphitError`]
pub type CrateResult<T> = std::result::Result<T, GraphitError>;
