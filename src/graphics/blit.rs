//! Blit into the swapchain image and present, on the vulkano backend

use std::sync::Arc;

use log::{debug, warn};
use shared::BlitUniforms;
use vulkano::{
    buffer::Subbuffer,
    command_buffer::{AutoCommandBufferBuilder, CommandBufferUsage},
    descriptor_set::{layout::DescriptorType, DescriptorSet, WriteDescriptorSet},
    image::view::ImageView,
    pipeline::{ComputePipeline, Pipeline},
    swapchain::{self, SwapchainAcquireFuture, SwapchainPresentInfo},
    sync::{self, GpuFuture},
    Validated, VulkanError,
};

use crate::{
    error::{CrateResult, GraphitError},
    graphics::{
        context::GraphicsContext, copy_task::BindingKind, drawable_extent, error::GraphicsError,
        BlitInvocation, CopyTaskDesc, PresentableImage, Presenter,
    },
    runtime::{
        module::read_spirv,
        vulkano::{
            buffer::build_uniform_buffer,
            dispatch::bind_and_dispatch,
            pipeline::{build_pipeline, descriptor_set_layout, entry_point, shader_module},
            VulkanoExport,
        },
    },
};

pub struct VulkanoBlitTask {
    pipeline: Arc<ComputePipeline>,
}

/// Swapchain image acquired for one frame. Holds the acquire future until
/// the blit submission joins it.
pub struct VulkanoImage {
    index: u32,
    extent: [u32; 2],
    view: Arc<ImageView>,
    acquire: SwapchainAcquireFuture,
}

impl PresentableImage for VulkanoImage {
    fn width(&self) -> u32 {
        self.extent[0]
    }

    fn height(&self) -> u32 {
        self.extent[1]
    }
}

fn descriptor_type(kind: BindingKind) -> DescriptorType {
    match kind {
        BindingKind::UniformBuffer => DescriptorType::UniformBuffer,
        BindingKind::StorageBuffer => DescriptorType::StorageBuffer,
        BindingKind::StorageImage => DescriptorType::StorageImage,
    }
}

pub struct VulkanoPresenter {
    context: GraphicsContext,
    /// Extent to recreate the swapchain at before the next acquire
    pending_extent: Option<[u32; 2]>,
}

impl VulkanoPresenter {
    pub fn new(context: GraphicsContext) -> Self {
        Self {
            context,
            pending_extent: None,
        }
    }

    /// Whether the window currently has an area to present into
    pub fn drawable(&self) -> bool {
        drawable_extent(self.context.window_extent()).is_some()
    }

    /// Recreate the swapchain at `extent` before the next frame. Zero-area
    /// extents are ignored.
    pub fn request_recreate(&mut self, extent: [u32; 2]) {
        if let Some(extent) = drawable_extent(extent) {
            self.pending_extent = Some(extent);
        }
    }

    /// Queue a recreate at the window's current size
    fn recreate_at_window_extent(&mut self) {
        self.request_recreate(self.context.window_extent());
    }
}

impl Presenter for VulkanoPresenter {
    type Task = VulkanoBlitTask;
    type Image = VulkanoImage;
    type Uniform = Subbuffer<BlitUniforms>;
    type Storage = VulkanoExport;

    fn build_task(&mut self, desc: &CopyTaskDesc) -> CrateResult<VulkanoBlitTask> {
        let words = read_spirv(&desc.spirv_path)?;
        let device = self.context.device().clone();
        let shader = shader_module(device.clone(), &words)?;
        let entry = entry_point(&shader, &desc.entry_point)?;

        let types: Vec<DescriptorType> = desc.bindings.iter().copied().map(descriptor_type).collect();
        let set_layout = descriptor_set_layout(device.clone(), &types)?;
        let pipeline = build_pipeline(device, set_layout, entry, 0)?;

        debug!(
            "copy task '{}' from {} with bindings {:?}",
            desc.entry_point,
            desc.spirv_path.display(),
            desc.bindings
        );
        Ok(VulkanoBlitTask { pipeline })
    }

    fn acquire_next_image(&mut self) -> CrateResult<VulkanoImage> {
        loop {
            if let Some(extent) = self.pending_extent.take() {
                self.context.recreate_swapchain(extent)?;
            }

            let swapchain = self.context.swapchain().clone();
            let (index, suboptimal, acquire) =
                match swapchain::acquire_next_image(swapchain.clone(), None)
                    .map_err(Validated::unwrap)
                {
                    Ok(r) => r,
                    Err(VulkanError::OutOfDate) => {
                        self.recreate_at_window_extent();
                        if self.pending_extent.is_none() {
                            return Err(GraphicsError::NoDrawableExtent.into());
                        }
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                };
            if suboptimal {
                self.recreate_at_window_extent();
            }

            let view = self
                .context
                .image_view(index)
                .ok_or_else(|| GraphitError::Other(format!("no view for swapchain image {index}")))?
                .clone();
            return Ok(VulkanoImage {
                index,
                extent: swapchain.image_extent(),
                view,
                acquire,
            });
        }
    }

    fn upload_uniform(&mut self, uniforms: BlitUniforms) -> CrateResult<Subbuffer<BlitUniforms>> {
        build_uniform_buffer(self.context.memory_allocator().clone(), uniforms)
    }

    fn submit_and_present(&mut self, invocation: BlitInvocation<'_, Self>) -> CrateResult<()> {
        let BlitInvocation {
            task,
            uniform,
            storage,
            image,
            workgroups,
        } = invocation;

        let layout = task
            .pipeline
            .layout()
            .set_layouts()
            .first()
            .ok_or(GraphicsError::NoDescriptorSetLayout(0))?;
        let descriptor_set = DescriptorSet::new(
            self.context.descriptor_set_allocator().clone(),
            layout.clone(),
            [
                WriteDescriptorSet::buffer(shared::BLIT_UNIFORM_BINDING, uniform),
                WriteDescriptorSet::buffer(shared::BLIT_SOURCE_BINDING, storage.buffer),
                WriteDescriptorSet::image_view(shared::BLIT_TARGET_BINDING, image.view),
            ],
            [],
        )?;

        let queue = self.context.queue().clone();
        let mut builder = AutoCommandBufferBuilder::primary(
            self.context.command_buffer_allocator().clone(),
            queue.queue_family_index(),
            CommandBufferUsage::OneTimeSubmit,
        )?;
        bind_and_dispatch(
            &mut builder,
            task.pipeline.clone(),
            None,
            Some(descriptor_set),
            workgroups,
        )?;
        let command_buffer = builder.build()?;

        let swapchain = self.context.swapchain().clone();
        let future = sync::now(self.context.device().clone())
            .join(image.acquire)
            .then_execute(queue.clone(), command_buffer)?
            .then_swapchain_present(
                queue,
                SwapchainPresentInfo::swapchain_image_index(swapchain.clone(), image.index),
            )
            .then_signal_fence_and_flush();

        match future.map_err(Validated::unwrap) {
            Ok(future) => future.wait(None)?,
            Err(VulkanError::OutOfDate) => {
                warn!("swapchain out of date at present, recreating");
                self.recreate_at_window_extent();
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}
