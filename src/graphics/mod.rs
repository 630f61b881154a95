//! Presentation: the copy/blit task and the swapchain it writes into.
//!
//! A [`Presenter`] owns the swapchain side. Every frame it hands out an
//! image, uploads the blit uniforms, and runs the blit from an exported
//! compute buffer into that image before presenting it.

pub mod copy_task;
pub mod error;
pub mod headless;

#[cfg(feature = "vulkano")]
pub mod blit;
#[cfg(feature = "vulkano")]
pub mod context;
#[cfg(feature = "vulkano")]
pub mod device;

use shared::BlitUniforms;

pub use copy_task::{BindingKind, CopyTaskDesc};

use crate::error::CrateResult;

/// `extent` if both dimensions are non-zero. A minimized window reports a
/// zero size and has no swapchain that can be created for it.
pub fn drawable_extent(extent: [u32; 2]) -> Option<[u32; 2]> {
    (extent[0] > 0 && extent[1] > 0).then_some(extent)
}

/// A swapchain image acquired for one frame
pub trait PresentableImage {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
}

/// Everything one blit dispatch needs, built fresh each frame
pub struct BlitInvocation<'a, P: Presenter + ?Sized> {
    pub task: &'a P::Task,
    pub uniform: P::Uniform,
    pub storage: P::Storage,
    pub image: P::Image,
    pub workgroups: [u32; 3],
}

pub trait Presenter {
    /// Compiled copy task
    type Task;
    type Image: PresentableImage;
    /// Uploaded uniform buffer
    type Uniform;
    /// Exported compute memory the blit reads from
    type Storage;

    /// Build the copy task once, before the first frame
    fn build_task(&mut self, desc: &CopyTaskDesc) -> CrateResult<Self::Task>;

    fn acquire_next_image(&mut self) -> CrateResult<Self::Image>;

    /// Upload `uniforms` into a buffer that lives for this frame only
    fn upload_uniform(&mut self, uniforms: BlitUniforms) -> CrateResult<Self::Uniform>;

    /// Run the blit and present the image in one submission, then block until
    /// it has completed
    fn submit_and_present(&mut self, invocation: BlitInvocation<'_, Self>) -> CrateResult<()>;
}
