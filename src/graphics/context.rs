//! Vulkan context bound to one window: device, queue, allocators, swapchain
//!
//! The compute runtime is created from this context so compute and
//! presentation share one logical device and queue.

use std::sync::Arc;

use log::{debug, info};
use vulkano::{
    command_buffer::allocator::StandardCommandBufferAllocator,
    descriptor_set::allocator::StandardDescriptorSetAllocator,
    device::{Device, Queue},
    format::{Format, FormatFeatures},
    image::{view::ImageView, Image, ImageUsage},
    memory::allocator::StandardMemoryAllocator,
    swapchain::{ColorSpace, Surface, Swapchain, SwapchainCreateInfo},
};
use winit::{event_loop::ActiveEventLoop, window::Window};

use crate::{
    error::CrateResult,
    graphics::{
        device::{create_device, create_instance_for_windowing},
        error::GraphicsError,
    },
};

pub struct GraphicsContext {
    window: Arc<Window>,
    device: Arc<Device>,
    queue: Arc<Queue>,
    memory_allocator: Arc<StandardMemoryAllocator>,
    descriptor_set_allocator: Arc<StandardDescriptorSetAllocator>,
    command_buffer_allocator: Arc<StandardCommandBufferAllocator>,
    swapchain: Arc<Swapchain>,
    image_views: Vec<Arc<ImageView>>,
}

/// First surface format the device can write as a storage image
fn storage_format(
    device: &Arc<Device>,
    surface: &Arc<Surface>,
) -> CrateResult<(Format, ColorSpace)> {
    let physical = device.physical_device();
    let formats = physical.surface_formats(surface, Default::default())?;
    if formats.is_empty() {
        return Err(GraphicsError::NoSurfaceFormats.into());
    }
    for (format, color_space) in formats {
        let properties = physical.format_properties(format)?;
        if properties
            .optimal_tiling_features
            .intersects(FormatFeatures::STORAGE_IMAGE)
        {
            return Ok((format, color_space));
        }
    }
    Err(GraphicsError::NoStorageFormat.into())
}

fn image_views(images: Vec<Arc<Image>>) -> CrateResult<Vec<Arc<ImageView>>> {
    images
        .into_iter()
        .map(|image| Ok(ImageView::new_default(image)?))
        .collect()
}

impl GraphicsContext {
    /// Create the instance, surface, device and a storage-capable swapchain
    /// for `window`
    pub fn new(event_loop: &ActiveEventLoop, window: Arc<Window>) -> CrateResult<Self> {
        let required = Surface::required_extensions(event_loop)
            .map_err(|e| GraphicsError::Surface(format!("{e:?}")))?;
        let instance = create_instance_for_windowing(required)?;
        let surface = Surface::from_window(instance.clone(), window.clone())
            .map_err(|e| GraphicsError::Surface(format!("{e:?}")))?;

        let (device, queue) = create_device(&instance, &surface)?;

        let caps = device
            .physical_device()
            .surface_capabilities(&surface, Default::default())?;
        if !caps.supported_usage_flags.contains(ImageUsage::STORAGE) {
            return Err(GraphicsError::StorageUsageUnsupported.into());
        }
        let composite_alpha = caps
            .supported_composite_alpha
            .into_iter()
            .next()
            .ok_or(GraphicsError::NoCompositeAlpha)?;
        let (image_format, image_color_space) = storage_format(&device, &surface)?;

        let extent: [u32; 2] = window.inner_size().into();
        let (swapchain, images) = Swapchain::new(
            device.clone(),
            surface,
            SwapchainCreateInfo {
                min_image_count: caps.min_image_count.max(2),
                image_format,
                image_color_space,
                image_extent: extent,
                // written by the blit, never rendered to
                image_usage: ImageUsage::STORAGE,
                composite_alpha,
                ..Default::default()
            },
        )?;
        info!(
            "Swapchain: {} images, {:?}, {}x{}",
            images.len(),
            image_format,
            extent[0],
            extent[1]
        );

        let memory_allocator = Arc::new(StandardMemoryAllocator::new_default(device.clone()));
        let descriptor_set_allocator = Arc::new(StandardDescriptorSetAllocator::new(
            device.clone(),
            Default::default(),
        ));
        let command_buffer_allocator = Arc::new(StandardCommandBufferAllocator::new(
            device.clone(),
            Default::default(),
        ));

        Ok(Self {
            window,
            device,
            queue,
            memory_allocator,
            descriptor_set_allocator,
            command_buffer_allocator,
            swapchain,
            image_views: image_views(images)?,
        })
    }

    /// Recreate the swapchain at `extent`, e.g. after a resize or an
    /// out-of-date acquire
    pub fn recreate_swapchain(&mut self, extent: [u32; 2]) -> CrateResult<()> {
        let (swapchain, images) = self.swapchain.recreate(SwapchainCreateInfo {
            image_extent: extent,
            ..self.swapchain.create_info()
        })?;
        debug!("swapchain recreated at {}x{}", extent[0], extent[1]);
        self.swapchain = swapchain;
        self.image_views = image_views(images)?;
        Ok(())
    }

    /// Current inner size of the window, zero while it is minimized
    pub fn window_extent(&self) -> [u32; 2] {
        self.window.inner_size().into()
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn queue(&self) -> &Arc<Queue> {
        &self.queue
    }

    pub fn memory_allocator(&self) -> &Arc<StandardMemoryAllocator> {
        &self.memory_allocator
    }

    pub fn descriptor_set_allocator(&self) -> &Arc<StandardDescriptorSetAllocator> {
        &self.descriptor_set_allocator
    }

    pub fn command_buffer_allocator(&self) -> &Arc<StandardCommandBufferAllocator> {
        &self.command_buffer_allocator
    }

    pub fn swapchain(&self) -> &Arc<Swapchain> {
        &self.swapchain
    }

    pub fn image_view(&self, index: u32) -> Option<&Arc<ImageView>> {
        self.image_views.get(index as usize)
    }
}
