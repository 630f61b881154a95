use thiserror::Error;

/// Presentation side failures
#[derive(Error, Debug)]
pub enum GraphicsError {
    #[error("No device supports compute, graphics and presentation to this surface")]
    NoSuitableDevice,

    #[error("Pipeline has no descriptor set layout at index {0}")]
    NoDescriptorSetLayout(usize),

    #[error("Surface reports no formats")]
    NoSurfaceFormats,

    #[error("No surface format can be used as a storage image")]
    NoStorageFormat,

    #[error("Swapchain is out of date and the window has no area to recreate it at")]
    NoDrawableExtent,

    #[error("Surface does not support storage image usage")]
    StorageUsageUnsupported,

    #[error("No composite alpha modes available")]
    NoCompositeAlpha,

    #[error("Surface creation failed: {0}")]
    Surface(String),

    #[error("Shader module creation failed: {0}")]
    ShaderModule(String),

    #[error("Copy task '{entry_point}' expects bindings {expected}, got {got}")]
    BindingSignature {
        entry_point: String,
        expected: String,
        got: String,
    },
}
